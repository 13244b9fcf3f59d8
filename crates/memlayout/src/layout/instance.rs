use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::{CompositeLayout, LayoutField};
use crate::error::{Error, Result};
use crate::field::Value;
use crate::platform::ByteOrder;
use crate::state::AbstractState;

/// Cursor over one composite value in the target address space.
///
/// Holds no copy of the memory: every [`get`](Self::get) and
/// [`set`](Self::set) goes through the state at the moment of the call.
#[derive(Clone)]
pub struct Instance<'s> {
    state: &'s dyn AbstractState,
    address: u64,
    layout: Arc<CompositeLayout>,
    order: ByteOrder,
}

impl<'s> Instance<'s> {
    /// Instance whose origin (offset 0) is at `address`
    pub fn new(state: &'s dyn AbstractState, address: u64, layout: Arc<CompositeLayout>) -> Self {
        Self {
            state,
            address,
            layout,
            order: ByteOrder::Native,
        }
    }

    /// Instance occupying the slot that starts at `slot`.
    ///
    /// Differs from [`new`](Self::new) only for layouts with an origin field,
    /// whose first byte lies before the origin.
    pub fn from_slot(state: &'s dyn AbstractState, slot: u64, layout: Arc<CompositeLayout>) -> Self {
        let address = slot.wrapping_add_signed(-layout.start());
        Self::new(state, address, layout)
    }

    pub fn with_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    /// Address of the first byte of the instance
    pub fn slot_address(&self) -> u64 {
        self.address.wrapping_add_signed(self.layout.start())
    }

    pub fn layout(&self) -> &CompositeLayout {
        &self.layout
    }

    pub fn type_name(&self) -> &str {
        self.layout.name()
    }

    pub fn size(&self) -> usize {
        self.layout.size()
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn state(&self) -> &'s dyn AbstractState {
        self.state
    }

    pub fn field_address(&self, name: &str) -> Result<u64> {
        let field = self.layout.get(name)?;
        Ok(self.address.wrapping_add_signed(field.offset))
    }

    pub fn get(&self, name: &str) -> Result<Value<'s>> {
        let field = self.layout.get(name)?;
        self.read_field(field)
    }

    /// Read a field and convert it, e.g. `instance.get_as::<u32>("length")`
    pub fn get_as<T>(&self, name: &str) -> Result<T>
    where
        T: TryFrom<Value<'s>, Error = Error>,
    {
        T::try_from(self.get(name)?)
    }

    pub fn set<'v>(&self, name: &str, value: impl Into<Value<'v>>) -> Result<()> {
        let field = self.layout.get(name)?;
        let address = self.address.wrapping_add_signed(field.offset);
        trace!("{}.{} <- 0x{:X}", self.type_name(), name, address);
        field.field.write(self.state, address, &value.into(), self.order)
    }

    /// Iterate `(name, value)` pairs in layout order
    pub fn fields(&self) -> FieldIter<'_, 's> {
        FieldIter {
            instance: self,
            position: 0,
        }
    }

    /// Raw bytes of the whole instance
    pub fn read_raw(&self) -> Result<Vec<u8>> {
        self.state.read_bytes(self.slot_address(), self.size())
    }

    fn read_field(&self, field: &LayoutField) -> Result<Value<'s>> {
        let address = self.address.wrapping_add_signed(field.offset);
        trace!("{}.{} @ 0x{:X}", self.type_name(), field.name, address);
        field.field.read(self.state, address, self.order)
    }
}

impl fmt::Debug for Instance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name())
            .field("address", &format_args!("0x{:X}", self.address))
            .field("order", &self.order)
            .finish()
    }
}

/// Iterator over the fields of an [`Instance`]
pub struct FieldIter<'i, 's> {
    instance: &'i Instance<'s>,
    position: usize,
}

impl<'i, 's> Iterator for FieldIter<'i, 's> {
    type Item = (&'i str, Result<Value<'s>>);

    fn next(&mut self) -> Option<Self::Item> {
        let field = self.instance.layout.fields().get(self.position)?;
        self.position += 1;
        Some((field.name.as_str(), self.instance.read_field(field)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.instance.layout.fields().len() - self.position;
        (remaining, Some(remaining))
    }
}
