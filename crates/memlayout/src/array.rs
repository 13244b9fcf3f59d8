//! Lazy views over repeated elements.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::field::{Field, Value};
use crate::platform::ByteOrder;
use crate::state::AbstractState;

/// Indexable view over `length` consecutive elements at `address`.
///
/// Nothing is read until an element is requested. A proxy without a length
/// indexes without bounds checks and refuses to iterate; use
/// [`take`](Self::take) to bound it.
#[derive(Clone)]
pub struct ArrayProxy<'s> {
    state: &'s dyn AbstractState,
    address: u64,
    element: Arc<Field>,
    length: Option<usize>,
    order: ByteOrder,
}

impl<'s> ArrayProxy<'s> {
    pub fn new(
        state: &'s dyn AbstractState,
        address: u64,
        element: Arc<Field>,
        length: Option<usize>,
    ) -> Self {
        Self {
            state,
            address,
            element,
            length,
            order: ByteOrder::Native,
        }
    }

    pub fn with_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn element(&self) -> &Field {
        &self.element
    }

    /// Declared length; `None` for unbounded arrays
    pub fn len(&self) -> Option<usize> {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == Some(0)
    }

    pub fn is_unbounded(&self) -> bool {
        self.length.is_none()
    }

    fn check_bounds(&self, index: usize) -> Result<()> {
        match self.length {
            Some(length) if index >= length => Err(Error::Bounds { index, length }),
            _ => Ok(()),
        }
    }

    /// Address of element `index`, bounds-checked
    pub fn element_address(&self, index: usize) -> Result<u64> {
        self.check_bounds(index)?;
        let stride = self.element.compute_size(&self.state.config())?;
        index
            .checked_mul(stride)
            .and_then(|offset| u64::try_from(offset).ok())
            .and_then(|offset| self.address.checked_add(offset))
            .ok_or_else(|| Error::MemoryAccess {
                address: self.address,
                length: stride,
                message: format!("element {} lies past the end of the address space", index),
            })
    }

    pub fn get(&self, index: usize) -> Result<Value<'s>> {
        let address = self.element_address(index)?;
        trace!("[{}] @ 0x{:X}", index, address);
        self.element.read(self.state, address, self.order)
    }

    pub fn get_as<T>(&self, index: usize) -> Result<T>
    where
        T: TryFrom<Value<'s>, Error = Error>,
    {
        T::try_from(self.get(index)?)
    }

    pub fn set<'v>(&self, index: usize, value: impl Into<Value<'v>>) -> Result<()> {
        let address = self.element_address(index)?;
        self.element.write(self.state, address, &value.into(), self.order)
    }

    /// Write consecutive elements starting at index 0
    pub fn write_all<'v, I, V>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value<'v>>,
    {
        for (index, value) in values.into_iter().enumerate() {
            self.set(index, value)?;
        }
        Ok(())
    }

    /// Iterate all elements. Fails up front for unbounded arrays.
    pub fn iter(&self) -> Result<ArrayIter<'s>> {
        let length = self.length.ok_or(Error::UnboundedIteration)?;
        Ok(ArrayIter {
            proxy: self.clone(),
            index: 0,
            length,
        })
    }

    /// Bounded view of the first `n` elements
    pub fn take(&self, n: usize) -> ArrayProxy<'s> {
        let length = match self.length {
            Some(length) => length.min(n),
            None => n,
        };
        Self {
            length: Some(length),
            ..self.clone()
        }
    }

    /// Raw bytes of the first `count` elements
    pub fn read_bytes(&self, count: usize) -> Result<Vec<u8>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.check_bounds(count - 1)?;
        let stride = self.element.compute_size(&self.state.config())?;
        self.state.read_bytes(self.address, count * stride)
    }
}

impl fmt::Debug for ArrayProxy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayProxy")
            .field("address", &format_args!("0x{:X}", self.address))
            .field("element", &self.element)
            .field("length", &self.length)
            .field("order", &self.order)
            .finish()
    }
}

/// Iterator over the elements of a bounded [`ArrayProxy`]
#[derive(Debug, Clone)]
pub struct ArrayIter<'s> {
    proxy: ArrayProxy<'s>,
    index: usize,
    length: usize,
}

impl<'s> Iterator for ArrayIter<'s> {
    type Item = Result<Value<'s>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.length {
            return None;
        }
        let value = self.proxy.get(self.index);
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.length - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ArrayIter<'_> {}
