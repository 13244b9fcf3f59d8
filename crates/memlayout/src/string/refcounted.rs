//! Reference-counted `std::string` (pre-C++11 libstdc++).
//!
//! The string object is a single pointer to its characters. The bookkeeping
//! header sits immediately before the characters:
//!
//! ```text
//! [capacity][length][ref_count][c h a r s \0]
//!                              ^ pointer
//! ```

use std::sync::LazyLock;

use tracing::debug;

use super::{decode_or_empty, terminated};
use crate::error::Result;
use crate::field::Field;
use crate::layout::{CompositeType, Definition, Instance};
use crate::platform::ByteOrder;
use crate::state::AbstractState;
use crate::util::closest_power_of_two;

static HEADER: LazyLock<CompositeType> = LazyLock::new(|| {
    CompositeType::new_struct(
        "std_string_header",
        Definition::new()
            .field("capacity", Field::USIZE)
            .field("length", Field::USIZE)
            .field("ref_count", Field::ISIZE)
            .field("content", Field::unsized_array(Field::UBYTE))
            .origin("content"),
    )
});

static OLD_STD_STRING: LazyLock<CompositeType> = LazyLock::new(|| {
    CompositeType::new_struct(
        "old_std_string",
        Definition::new().field("pointer", Field::pointer(Field::composite(&HEADER))),
    )
});

pub fn header_type() -> &'static CompositeType {
    &HEADER
}

pub fn old_std_string_type() -> &'static CompositeType {
    &OLD_STD_STRING
}

fn header<'s>(
    state: &'s dyn AbstractState,
    address: u64,
    order: ByteOrder,
) -> Result<(Instance<'s>, Option<Instance<'s>>)> {
    let string = OLD_STD_STRING.instance(state, address)?.with_order(order);
    let pointer = string.get("pointer")?.into_pointer()?;
    if pointer.is_null()? {
        return Ok((string, None));
    }
    let header = pointer.value()?.into_instance()?;
    Ok((string, Some(header)))
}

pub(crate) fn read(state: &dyn AbstractState, address: u64, order: ByteOrder) -> Result<String> {
    let (_, Some(header)) = header(state, address, order)? else {
        return Ok(String::new());
    };

    let length: usize = header.get_as("length")?;
    let content = header.field_address("content")?;
    let bytes = state.read_bytes(content, length)?;
    Ok(decode_or_empty(content, &bytes))
}

pub(crate) fn write(
    state: &dyn AbstractState,
    address: u64,
    text: &str,
    order: ByteOrder,
) -> Result<()> {
    let (string, existing) = header(state, address, order)?;
    let data = terminated(text);
    let length = text.len();

    let (capacity, ref_count) = match &existing {
        Some(header) => (
            header.get_as::<usize>("capacity")?,
            header.get_as::<i64>("ref_count")?,
        ),
        None => (0, 0),
    };

    let header = match existing {
        Some(header) if length <= capacity => header,
        _ => {
            let layout = HEADER.compute_layout(&state.config())?;
            let header_size = layout.start().unsigned_abs() as usize;
            let size = closest_power_of_two(data.len() + header_size);

            let block = state.allocate(size)?;
            let origin = block + header_size as u64;
            debug!(
                "Allocated {} byte string block at 0x{:X} for string at 0x{:X}",
                size, block, address
            );

            string.set("pointer", origin)?;
            let header = Instance::new(state, origin, layout).with_order(order);
            header.set("capacity", size - header_size - 1)?;
            header.set("ref_count", ref_count)?;
            header
        }
    };

    header.set("length", length)?;
    state.write_bytes(header.field_address("content")?, &data)
}
