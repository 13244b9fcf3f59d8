//! Sizing helpers and field collection for composite definitions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::field::Field;
use crate::layout::CompositeType;

/// Name of the hidden slot placed first in types with virtual dispatch
pub const VTABLE_FIELD: &str = "__vtable__";

/// Smallest power of two that is `>= n`.
///
/// `0` is treated as needing one byte, so the result is never zero.
///
/// ```
/// use memlayout::util::closest_power_of_two;
///
/// assert_eq!(closest_power_of_two(16), 16);
/// assert_eq!(closest_power_of_two(17), 32);
/// assert_eq!(closest_power_of_two(0), 1);
/// ```
pub fn closest_power_of_two(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// Exponent of [`closest_power_of_two`], i.e. `ceil(log2(n))`
pub fn closest_power_of_two_bits(n: usize) -> u32 {
    closest_power_of_two(n).trailing_zeros()
}

/// Round `value` up to a multiple of `alignment`; alignments of 0 and 1 are no-ops
pub fn round_up(value: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

/// [`round_up`] that returns `None` instead of overflowing
pub fn checked_round_up(value: usize, alignment: usize) -> Option<usize> {
    if alignment <= 1 {
        return Some(value);
    }
    value.checked_next_multiple_of(alignment)
}

/// Gather the fields of a composite type and its base chain, most-base first.
///
/// A field redeclared by a derived type keeps the position of the first
/// declaration and takes the derived descriptor. If any type in the chain asks
/// for a vtable, a pointer-sized [`VTABLE_FIELD`] slot leads the list.
///
/// Fails with [`Error::Layout`] when a type in the chain is only declared or
/// when the base chain loops back on itself.
pub fn collect_fields(ty: &CompositeType) -> Result<Vec<(String, Field)>> {
    let mut chain: Vec<&CompositeType> = Vec::new();
    let mut current = Some(ty);

    while let Some(link) = current {
        if chain.iter().any(|seen| seen.same_type(link)) {
            return Err(Error::Layout(format!(
                "base chain of {} loops back to {}",
                ty.name(),
                link.name()
            )));
        }
        chain.push(link);
        current = link.definition()?.base_type();
    }

    let mut fields: Vec<(String, Field)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut vtable = false;

    for link in chain.iter().rev() {
        let definition = link.definition()?;
        vtable |= definition.has_vtable();

        for (name, field) in definition.fields() {
            match positions.get(name) {
                Some(&position) => fields[position].1 = field.clone(),
                None => {
                    positions.insert(name.clone(), fields.len());
                    fields.push((name.clone(), field.clone()));
                }
            }
        }
    }

    if vtable && !positions.contains_key(VTABLE_FIELD) {
        fields.insert(
            0,
            (VTABLE_FIELD.to_string(), Field::Pointer(Arc::new(Field::Void))),
        );
    }

    Ok(fields)
}
