//! Cursor over a pointer slot.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::field::{Field, Value};
use crate::platform::ByteOrder;
use crate::state::AbstractState;

/// A pointer-sized slot at `address` whose value is the address of a `target`.
///
/// Dereferencing reads the slot first, so a cursor always follows whatever the
/// target process currently stores there.
#[derive(Clone)]
pub struct PointerCursor<'s> {
    state: &'s dyn AbstractState,
    address: u64,
    target: Arc<Field>,
    order: ByteOrder,
}

impl<'s> PointerCursor<'s> {
    pub fn new(state: &'s dyn AbstractState, address: u64, target: Arc<Field>) -> Self {
        Self {
            state,
            address,
            target,
            order: ByteOrder::Native,
        }
    }

    pub fn with_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    /// Address of the pointer slot itself
    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn target(&self) -> &Field {
        &self.target
    }

    /// Address stored in the slot
    pub fn value_address(&self) -> Result<u64> {
        self.state.read_usize(self.address, self.order)
    }

    pub fn set_value_address(&self, target: u64) -> Result<()> {
        self.state.write_usize(self.address, target, self.order)
    }

    pub fn is_null(&self) -> Result<bool> {
        Ok(self.value_address()? == 0)
    }

    fn dereference(&self) -> Result<u64> {
        match self.value_address()? {
            0 => Err(Error::NullPointer {
                address: self.address,
            }),
            target => Ok(target),
        }
    }

    /// Slot holding the pointee. Pointers to a composite address its origin.
    fn slot(&self, target: u64) -> Result<u64> {
        match self.target.as_ref() {
            Field::Composite(ty) => {
                let layout = ty.compute_layout(&self.state.config())?;
                Ok(target.wrapping_add_signed(layout.start()))
            }
            _ => Ok(target),
        }
    }

    /// Read the pointee
    pub fn value(&self) -> Result<Value<'s>> {
        let slot = self.slot(self.dereference()?)?;
        self.target.read(self.state, slot, self.order)
    }

    pub fn value_as<T>(&self) -> Result<T>
    where
        T: TryFrom<Value<'s>, Error = Error>,
    {
        T::try_from(self.value()?)
    }

    /// Overwrite the pointee (not the pointer)
    pub fn set_value<'v>(&self, value: impl Into<Value<'v>>) -> Result<()> {
        let slot = self.slot(self.dereference()?)?;
        self.target.write(self.state, slot, &value.into(), self.order)
    }

    /// Target address moved by `delta` elements, like `p + delta` in C
    pub fn offset(&self, delta: i64) -> Result<u64> {
        let stride = self.target.compute_size(&self.state.config())?;
        let target = self.dereference()?;
        i64::try_from(stride)
            .ok()
            .and_then(|stride| delta.checked_mul(stride))
            .and_then(|bytes| target.checked_add_signed(bytes))
            .ok_or_else(|| Error::MemoryAccess {
                address: target,
                length: stride,
                message: format!("moving by {} elements leaves the address space", delta),
            })
    }

    /// Read element `index` past the target, like `p[index]` in C
    pub fn index(&self, index: i64) -> Result<Value<'s>> {
        let slot = self.slot(self.offset(index)?)?;
        self.target.read(self.state, slot, self.order)
    }

    /// Same slot, reinterpreted as pointing at `target`
    pub fn cast(&self, target: Field) -> PointerCursor<'s> {
        Self {
            target: Arc::new(target),
            ..self.clone()
        }
    }
}

impl fmt::Debug for PointerCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerCursor")
            .field("address", &format_args!("0x{:X}", self.address))
            .field("target", &self.target)
            .field("order", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{CompositeType, Definition};
    use crate::platform::{Bits, OsFamily, PlatformConfig};
    use crate::state::BufferState;

    fn config() -> PlatformConfig {
        PlatformConfig::new(Bits::B64, OsFamily::Linux).with_byte_order(ByteOrder::Little)
    }

    #[test]
    fn test_dereference() {
        let state = BufferState::builder(config())
            .usize_at(0x1000, 0x1010)
            .u32_at(0x1010, 1234)
            .u32_at(0x1014, 5678)
            .build();
        let pointer = PointerCursor::new(&state, 0x1000, Arc::new(Field::U32));

        assert_eq!(pointer.value_address().unwrap(), 0x1010);
        assert!(!pointer.is_null().unwrap());
        assert_eq!(pointer.value_as::<u32>().unwrap(), 1234);
        assert_eq!(pointer.index(1).unwrap(), Value::U32(5678));
        assert_eq!(pointer.offset(-1).unwrap(), 0x100C);

        pointer.set_value(4321u32).unwrap();
        assert_eq!(state.read_u32(0x1010, ByteOrder::Little).unwrap(), 4321);
    }

    #[test]
    fn test_offset_past_address_space() {
        let state = BufferState::builder(config()).usize_at(0x1000, 0x1010).size(0x20).build();
        let pointer = PointerCursor::new(&state, 0x1000, Arc::new(Field::U64));

        assert!(matches!(pointer.offset(i64::MAX / 4), Err(Error::MemoryAccess { .. })));
        assert!(matches!(pointer.offset(-0x1000), Err(Error::MemoryAccess { .. })));
        assert!(pointer.index(i64::MIN).unwrap_err().is_memory_access());
        assert_eq!(pointer.offset(2).unwrap(), 0x1020);
    }

    #[test]
    fn test_null_pointer() {
        let state = BufferState::new(config(), 0x1000, 0x20);
        let pointer = PointerCursor::new(&state, 0x1008, Arc::new(Field::U8));

        assert!(pointer.is_null().unwrap());
        assert!(matches!(pointer.value(), Err(Error::NullPointer { address: 0x1008 })));
        assert!(matches!(pointer.set_value(1u8), Err(Error::NullPointer { .. })));
    }

    #[test]
    fn test_retarget_and_cast() {
        let state = BufferState::builder(config())
            .u16_at(0x1010, 0x0201)
            .size(0x20)
            .build();
        let pointer = PointerCursor::new(&state, 0x1000, Arc::new(Field::U16));

        pointer.set_value_address(0x1010).unwrap();
        assert_eq!(state.read_pointer(0x1000).unwrap(), 0x1010);
        assert_eq!(pointer.value().unwrap(), Value::U16(0x0201));

        let bytes = pointer.cast(Field::U8);
        assert_eq!(bytes.value().unwrap(), Value::U8(1));
        assert_eq!(bytes.index(1).unwrap(), Value::U8(2));
    }

    #[test]
    fn test_pointer_to_composite() {
        let node = CompositeType::cyclic_struct("Node", |this| {
            Definition::new()
                .field("value", Field::I32)
                .field("next", Field::pointer(Field::composite(this)))
        });
        let state = BufferState::builder(config())
            .i32_at(0x1000, 1)
            .usize_at(0x1008, 0x1010)
            .i32_at(0x1010, 2)
            .usize_at(0x1018, 0)
            .build();

        let head = node.instance(&state, 0x1000).unwrap();
        let next = head.get("next").unwrap().into_pointer().unwrap();
        let second = next.value().unwrap().into_instance().unwrap();

        assert_eq!(second.get_as::<i32>("value").unwrap(), 2);
        let tail = second.get("next").unwrap().into_pointer().unwrap();
        assert!(tail.is_null().unwrap());
    }
}
