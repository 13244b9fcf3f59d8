//! Short-string optimized `std::string`.
//!
//! ```text
//! union { u8 inline[16]; u8 *pointer; } content;
//! size_t length;
//! size_t capacity;
//! ```
//!
//! Strings whose capacity fits the inline buffer live in `content.inline`,
//! longer ones on the heap behind `content.pointer`.

use std::sync::LazyLock;

use tracing::{debug, warn};

use super::{decode, decode_or_empty, terminated};
use crate::error::Result;
use crate::field::Field;
use crate::layout::{CompositeType, Definition, Instance};
use crate::platform::ByteOrder;
use crate::state::AbstractState;
use crate::util::closest_power_of_two;

/// Size of the inline buffer, terminator included
pub const INLINE_CAPACITY: usize = 16;

static CONTENT: LazyLock<CompositeType> = LazyLock::new(|| {
    CompositeType::new_union(
        "std_string_content",
        Definition::new()
            .field("inline", Field::array(Field::UBYTE, INLINE_CAPACITY))
            .field("pointer", Field::pointer(Field::unsized_array(Field::UBYTE))),
    )
});

static STD_STRING: LazyLock<CompositeType> = LazyLock::new(|| {
    CompositeType::new_struct(
        "std_string",
        Definition::new()
            .field("content", Field::composite(&CONTENT))
            .field("length", Field::USIZE)
            .field("capacity", Field::USIZE),
    )
});

pub fn std_string_type() -> &'static CompositeType {
    &STD_STRING
}

pub fn content_type() -> &'static CompositeType {
    &CONTENT
}

/// Cursor-level view of one string object
struct SsoString<'s> {
    string: Instance<'s>,
    inline: u64,
    heap_slot: u64,
}

impl<'s> SsoString<'s> {
    fn open(state: &'s dyn AbstractState, address: u64, order: ByteOrder) -> Result<Self> {
        let string = STD_STRING.instance(state, address)?.with_order(order);
        let content = string.get("content")?.into_instance()?;
        Ok(Self {
            inline: content.field_address("inline")?,
            heap_slot: content.field_address("pointer")?,
            string,
        })
    }

    fn state(&self) -> &'s dyn AbstractState {
        self.string.state()
    }

    fn length(&self) -> Result<usize> {
        self.string.get_as("length")
    }

    fn capacity(&self) -> Result<usize> {
        self.string.get_as("capacity")
    }

    fn heap_address(&self) -> Result<u64> {
        self.state().read_usize(self.heap_slot, self.string.order())
    }

    /// Heap contents, `None` for a null buffer or undecodable bytes
    fn read_heap(&self, length: usize) -> Result<Option<String>> {
        let heap = self.heap_address()?;
        if heap == 0 {
            return Ok(None);
        }
        let bytes = self.state().read_bytes(heap, length)?;
        Ok(decode(heap, &bytes).ok())
    }

    fn allocate_heap(&self, data: &[u8]) -> Result<()> {
        let size = closest_power_of_two(data.len());
        let heap = self.state().allocate(size)?;
        debug!(
            "Allocated {} byte string buffer at 0x{:X} for string at 0x{:X}",
            size,
            heap,
            self.string.address()
        );

        self.state()
            .write_usize(self.heap_slot, heap, self.string.order())?;
        self.state().write_bytes(heap, data)?;
        self.string.set("capacity", size - 1)
    }
}

pub(crate) fn read(state: &dyn AbstractState, address: u64, order: ByteOrder) -> Result<String> {
    let string = SsoString::open(state, address, order)?;
    let length = string.length()?;
    let capacity = string.capacity()?;

    if capacity < INLINE_CAPACITY {
        let bytes = state.read_bytes(string.inline, length.min(INLINE_CAPACITY))?;
        if let Ok(text) = decode(string.inline, &bytes) {
            return Ok(text);
        }
        // the buffer may still be on the heap; give up quietly if it is not
        return Ok(match string.read_heap(length) {
            Ok(Some(text)) => text,
            _ => {
                warn!("Undecodable string at 0x{:X}, reading as empty", address);
                String::new()
            }
        });
    }

    let heap = string.heap_address()?;
    if heap == 0 {
        warn!("String at 0x{:X} has capacity {} but no buffer", address, capacity);
        return Ok(String::new());
    }
    let bytes = state.read_bytes(heap, length)?;
    Ok(decode_or_empty(heap, &bytes))
}

pub(crate) fn write(
    state: &dyn AbstractState,
    address: u64,
    text: &str,
    order: ByteOrder,
) -> Result<()> {
    let string = SsoString::open(state, address, order)?;
    let capacity = string.capacity()?;
    let data = terminated(text);
    let length = text.len();

    if length <= capacity {
        if capacity < INLINE_CAPACITY {
            state.write_bytes(string.inline, &data)?;
        } else {
            match string.heap_address()? {
                0 => string.allocate_heap(&data)?,
                heap => state.write_bytes(heap, &data)?,
            }
        }
    } else if length < INLINE_CAPACITY {
        state.write_bytes(string.inline, &data)?;
        string.string.set("capacity", INLINE_CAPACITY - 1)?;
    } else {
        string.allocate_heap(&data)?;
    }

    string.string.set("length", length)
}
