//! Struct and union placement.
//!
//! Structs place each member at the next offset that satisfies its alignment
//! and round the total size up to the largest member alignment. Unions place
//! every member at offset 0. Both are computed from the field list produced by
//! [`collect_fields`], so inherited members come first.

use std::collections::HashMap;

use tracing::debug;

use super::{CompositeKind, CompositeLayout, CompositeType, LayoutField};
use crate::error::{Error, Result};
use crate::field::Field;
use crate::platform::PlatformConfig;
use crate::util::{checked_round_up, collect_fields};

/// Composite types whose layout is currently being resolved.
///
/// A type that is entered again before it leaves contains itself by value.
#[derive(Debug, Default)]
pub(crate) struct Visiting(Vec<(usize, String)>);

impl Visiting {
    pub(crate) fn enter(&mut self, ty: &CompositeType) -> Result<()> {
        if self.0.iter().any(|(id, _)| *id == ty.id()) {
            let path: Vec<&str> = self.0.iter().map(|(_, name)| name.as_str()).collect();
            return Err(Error::Layout(format!(
                "{} contains itself by value ({} -> {})",
                ty.name(),
                path.join(" -> "),
                ty.name()
            )));
        }
        self.0.push((ty.id(), ty.name().to_string()));
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.0.pop();
    }
}

struct Measured {
    name: String,
    field: Field,
    size: Option<usize>,
    alignment: usize,
}

struct Placement {
    offsets: Vec<i64>,
    size: usize,
    alignment: usize,
    start: i64,
}

pub(crate) fn compute(
    ty: &CompositeType,
    config: &PlatformConfig,
    visiting: &mut Visiting,
) -> Result<CompositeLayout> {
    let definition = ty.definition()?;
    let entries = collect_fields(ty)?;

    let mut measured = Vec::with_capacity(entries.len());
    for (name, field) in entries {
        let alignment = field.alignment_in(config, visiting)?;
        let size = if field.is_unsized() {
            None
        } else {
            Some(field.size_in(config, visiting)?)
        };
        measured.push(Measured {
            name,
            field,
            size,
            alignment,
        });
    }

    let placement = match ty.kind() {
        CompositeKind::Struct => place_struct(
            ty.name(),
            &measured,
            definition.is_packed(),
            definition.origin_field(),
        )?,
        CompositeKind::Union => {
            if let Some(origin) = definition.origin_field() {
                return Err(Error::Layout(format!(
                    "union {} can not have an origin field ({})",
                    ty.name(),
                    origin
                )));
            }
            place_union(ty.name(), &measured, definition.is_packed())?
        }
    };

    let mut fields = Vec::with_capacity(measured.len());
    let mut index = HashMap::with_capacity(measured.len());
    for (position, (member, offset)) in measured.into_iter().zip(placement.offsets).enumerate() {
        index.insert(member.name.clone(), position);
        fields.push(LayoutField {
            name: member.name,
            field: member.field,
            offset,
            size: member.size.unwrap_or(0),
            alignment: member.alignment,
        });
    }

    debug!(
        "Computed layout of {} {} for {}: size={}, alignment={}, fields={}",
        ty.kind(),
        ty.name(),
        config,
        placement.size,
        placement.alignment,
        fields.len()
    );

    Ok(CompositeLayout {
        name: ty.name().to_string(),
        kind: ty.kind(),
        config: *config,
        size: placement.size,
        alignment: placement.alignment,
        start: placement.start,
        fields,
        index,
    })
}

fn unsized_member(type_name: &str, member: &Measured) -> Error {
    Error::UnsizedType(format!(
        "{}.{}: {}",
        type_name,
        member.name,
        member.field.describe()
    ))
}

fn too_large(type_name: &str) -> Error {
    Error::Layout(format!("{} does not fit in memory", type_name))
}

fn place_struct(
    name: &str,
    members: &[Measured],
    packed: bool,
    origin: Option<&str>,
) -> Result<Placement> {
    let origin_index = match origin {
        Some(origin) => members
            .iter()
            .position(|member| member.name == origin)
            .ok_or_else(|| {
                Error::Layout(format!("origin field {} is not a member of {}", origin, name))
            })?,
        None => 0,
    };

    let mut offsets = vec![0i64; members.len()];
    let mut alignment = 1;

    // members before the origin are packed backwards from it
    let mut start = 0i64;
    for position in (0..origin_index).rev() {
        let member = &members[position];
        let size = member.size.ok_or_else(|| {
            Error::Layout(format!(
                "{}.{} is unsized and precedes the origin field",
                name, member.name
            ))
        })?;
        start = i64::try_from(size)
            .ok()
            .and_then(|size| start.checked_sub(size))
            .ok_or_else(|| too_large(name))?;
        offsets[position] = start;
        if !packed {
            alignment = alignment.max(member.alignment);
        }
    }

    let last = members.len().saturating_sub(1);
    let mut cursor = 0usize;
    for (position, member) in members.iter().enumerate().skip(origin_index) {
        let member_alignment = if packed { 1 } else { member.alignment };
        let size = match member.size {
            Some(size) => size,
            None if position == last => 0,
            None => return Err(unsized_member(name, member)),
        };

        let offset = checked_round_up(cursor, member_alignment).ok_or_else(|| too_large(name))?;
        offsets[position] = i64::try_from(offset).map_err(|_| too_large(name))?;
        cursor = offset.checked_add(size).ok_or_else(|| too_large(name))?;
        alignment = alignment.max(member_alignment);
    }

    let extent = usize::try_from(start.unsigned_abs())
        .ok()
        .and_then(|before| cursor.checked_add(before))
        .and_then(|extent| checked_round_up(extent, alignment))
        .ok_or_else(|| too_large(name))?;
    Ok(Placement {
        offsets,
        size: extent,
        alignment,
        start,
    })
}

fn place_union(name: &str, members: &[Measured], packed: bool) -> Result<Placement> {
    let mut size = 0;
    let mut alignment = 1;

    for member in members {
        size = size.max(member.size.ok_or_else(|| unsized_member(name, member))?);
        if !packed {
            alignment = alignment.max(member.alignment);
        }
    }

    Ok(Placement {
        offsets: vec![0; members.len()],
        size,
        alignment,
        start: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Definition;
    use crate::platform::{Bits, ByteOrder, OsFamily};
    use crate::string::StringAbi;
    use crate::util::VTABLE_FIELD;
    use strum::IntoEnumIterator;

    fn config(bits: Bits) -> PlatformConfig {
        PlatformConfig::new(bits, OsFamily::Linux).with_byte_order(ByteOrder::Little)
    }

    fn offsets(layout: &CompositeLayout) -> Vec<i64> {
        layout.fields().iter().map(|field| field.offset).collect()
    }

    #[test]
    fn test_struct_padding() {
        let ty = CompositeType::new_struct(
            "Padded",
            Definition::new()
                .field("a", Field::U8)
                .field("b", Field::U32)
                .field("c", Field::U16),
        );
        let layout = ty.compute_layout(&config(Bits::B32)).unwrap();

        assert_eq!(offsets(&layout), vec![0, 4, 8]);
        assert_eq!(layout.size(), 12);
        assert_eq!(layout.alignment(), 4);
    }

    #[test]
    fn test_struct_invariants_across_platforms() {
        let inner = CompositeType::new_struct(
            "Inner",
            Definition::new().field("flag", Field::BYTE).field("value", Field::DOUBLE),
        );
        let ty = CompositeType::new_struct(
            "Mixed",
            Definition::new()
                .field("a", Field::U8)
                .field("b", Field::LONG)
                .field("c", Field::SHORT)
                .field("d", Field::pointer(Field::Void))
                .field("e", Field::array(Field::U16, 3))
                .field("f", Field::composite(&inner))
                .field("g", Field::INT),
        );

        for bits in Bits::iter() {
            for os in OsFamily::iter() {
                let config = PlatformConfig::new(bits, os);
                let layout = ty.compute_layout(&config).unwrap();

                assert_eq!(layout.size() % layout.alignment(), 0, "{}", config);
                for field in layout.fields() {
                    assert!(field.offset >= 0);
                    assert_eq!(field.offset as usize % field.alignment.max(1), 0, "{} on {}", field.name, config);
                }
                for pair in layout.fields().windows(2) {
                    assert!(pair[1].offset >= pair[0].offset + pair[0].size as i64);
                }
            }
        }
    }

    #[test]
    fn test_union_overlay() {
        let ty = CompositeType::new_union(
            "Overlay",
            Definition::new()
                .field("byte", Field::U8)
                .field("words", Field::array(Field::U16, 3))
                .field("wide", Field::U32),
        );
        let layout = ty.compute_layout(&config(Bits::B64)).unwrap();

        assert_eq!(offsets(&layout), vec![0, 0, 0]);
        assert_eq!(layout.size(), 6);
        assert_eq!(layout.alignment(), 4);
    }

    #[test]
    fn test_empty_composites() {
        for ty in [
            CompositeType::new_struct("Empty", Definition::new()),
            CompositeType::new_union("EmptyUnion", Definition::new()),
        ] {
            let layout = ty.compute_layout(&config(Bits::B32)).unwrap();
            assert_eq!(layout.size(), 0);
            assert_eq!(layout.alignment(), 1);
        }
    }

    #[test]
    fn test_packed_struct() {
        let ty = CompositeType::new_struct(
            "Packed",
            Definition::new()
                .packed()
                .field("a", Field::U8)
                .field("b", Field::U32)
                .field("c", Field::U16),
        );
        let layout = ty.compute_layout(&config(Bits::B32)).unwrap();

        assert_eq!(offsets(&layout), vec![0, 1, 5]);
        assert_eq!(layout.size(), 7);
        assert_eq!(layout.alignment(), 1);
    }

    #[test]
    fn test_inherited_fields_come_first() {
        let base = CompositeType::new_struct("Base", Definition::new().field("id", Field::U32));
        let derived = CompositeType::new_struct(
            "Derived",
            Definition::new().base(&base).field("tag", Field::U8),
        );
        let layout = derived.compute_layout(&config(Bits::B64)).unwrap();

        assert_eq!(layout.get("id").unwrap().offset, 0);
        assert_eq!(layout.get("tag").unwrap().offset, 4);
        assert_eq!(layout.size(), 8);
    }

    #[test]
    fn test_vtable_slot() {
        let ty = CompositeType::new_struct(
            "Object",
            Definition::new().vtable().field("id", Field::U32),
        );

        let layout = ty.compute_layout(&config(Bits::B64)).unwrap();
        assert_eq!(layout.get(VTABLE_FIELD).unwrap().offset, 0);
        assert_eq!(layout.get("id").unwrap().offset, 8);
        assert_eq!(layout.size(), 16);

        let layout = ty.compute_layout(&config(Bits::B32)).unwrap();
        assert_eq!(layout.get("id").unwrap().offset, 4);
        assert_eq!(layout.size(), 8);
    }

    #[test]
    fn test_trailing_unsized_array() {
        let ty = CompositeType::new_struct(
            "Buffer",
            Definition::new()
                .field("length", Field::U16)
                .field("data", Field::unsized_array(Field::U32)),
        );
        let layout = ty.compute_layout(&config(Bits::B32)).unwrap();

        assert_eq!(layout.get("data").unwrap().offset, 4);
        assert_eq!(layout.get("data").unwrap().size, 0);
        assert_eq!(layout.size(), 4);
    }

    #[test]
    fn test_unsized_array_not_last() {
        let ty = CompositeType::new_struct(
            "Broken",
            Definition::new()
                .field("data", Field::unsized_array(Field::U8))
                .field("length", Field::U32),
        );
        let err = ty.compute_layout(&config(Bits::B32)).unwrap_err();
        assert!(matches!(err, Error::UnsizedType(_)));
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_unsized_array_in_union() {
        let ty = CompositeType::new_union(
            "Broken",
            Definition::new().field("data", Field::unsized_array(Field::U8)),
        );
        assert!(matches!(
            ty.compute_layout(&config(Bits::B32)),
            Err(Error::UnsizedType(_))
        ));
    }

    #[test]
    fn test_origin_field() {
        let ty = CompositeType::new_struct(
            "Header",
            Definition::new()
                .field("capacity", Field::USIZE)
                .field("length", Field::USIZE)
                .field("ref_count", Field::ISIZE)
                .field("content", Field::unsized_array(Field::UBYTE))
                .origin("content"),
        );

        let layout = ty.compute_layout(&config(Bits::B64)).unwrap();
        assert_eq!(offsets(&layout), vec![-24, -16, -8, 0]);
        assert_eq!(layout.start(), -24);
        assert_eq!(layout.size(), 24);

        let layout = ty.compute_layout(&config(Bits::B32)).unwrap();
        assert_eq!(offsets(&layout), vec![-12, -8, -4, 0]);
    }

    #[test]
    fn test_struct_past_address_space() {
        let overflowing_end = CompositeType::new_struct(
            "Huge",
            Definition::new()
                .field("bulk", Field::array(Field::U8, usize::MAX))
                .field("tail", Field::U8),
        );
        let overflowing_padding = CompositeType::new_struct(
            "Misaligned",
            Definition::new()
                .field("bulk", Field::array(Field::U8, usize::MAX - 2))
                .field("tail", Field::U32),
        );
        let overflowing_origin = CompositeType::new_struct(
            "Behind",
            Definition::new()
                .field("bulk", Field::array(Field::U8, usize::MAX))
                .field("anchor", Field::U8)
                .origin("anchor"),
        );

        for ty in [overflowing_end, overflowing_padding, overflowing_origin] {
            let err = ty.compute_layout(&config(Bits::B64)).unwrap_err();
            assert!(matches!(err, Error::Layout(_)), "{}: {}", ty.name(), err);
        }
    }

    #[test]
    fn test_origin_fields_after_are_aligned() {
        let ty = CompositeType::new_struct(
            "Shifted",
            Definition::new()
                .field("before", Field::U8)
                .field("anchor", Field::U8)
                .field("after", Field::U32)
                .origin("anchor"),
        );
        let layout = ty.compute_layout(&config(Bits::B32)).unwrap();

        assert_eq!(offsets(&layout), vec![-1, 0, 4]);
        assert_eq!(layout.size(), 12);
    }

    #[test]
    fn test_origin_errors() {
        let unknown = CompositeType::new_struct(
            "Unknown",
            Definition::new().field("a", Field::U8).origin("b"),
        );
        assert!(matches!(
            unknown.compute_layout(&config(Bits::B32)),
            Err(Error::Layout(_))
        ));

        let unsized_before = CompositeType::new_struct(
            "UnsizedBefore",
            Definition::new()
                .field("data", Field::unsized_array(Field::U8))
                .field("anchor", Field::U8)
                .origin("anchor"),
        );
        assert!(matches!(
            unsized_before.compute_layout(&config(Bits::B32)),
            Err(Error::Layout(_))
        ));

        let union = CompositeType::new_union(
            "Anchored",
            Definition::new().field("a", Field::U8).origin("a"),
        );
        assert!(matches!(
            union.compute_layout(&config(Bits::B32)),
            Err(Error::Layout(_))
        ));
    }

    #[test]
    fn test_platform_fill() {
        let windows32 = PlatformConfig::new(Bits::B32, OsFamily::Windows);
        let android64 = PlatformConfig::new(Bits::B64, OsFamily::Android);
        let ty = CompositeType::new_struct(
            "Padded",
            Definition::new()
                .field("tag", Field::U8)
                .fill("reserved", HashMap::from([(windows32, 3), (android64, 7)]))
                .field("value", Field::U8),
        );

        let layout = ty.compute_layout(&windows32).unwrap();
        assert_eq!(offsets(&layout), vec![0, 1, 4]);
        assert_eq!(layout.size(), 5);

        let layout = ty.compute_layout(&android64).unwrap();
        assert_eq!(offsets(&layout), vec![0, 1, 8]);

        let layout = ty.compute_layout(&config(Bits::B64)).unwrap();
        assert_eq!(offsets(&layout), vec![0, 1, 1]);
        assert_eq!(layout.get("reserved").unwrap().size, 0);
    }

    #[test]
    fn test_self_containing_struct() {
        let ty = CompositeType::cyclic_struct("Loop", |this| {
            Definition::new()
                .field("value", Field::U32)
                .field("next", Field::composite(this))
        });
        let err = ty.compute_layout(&config(Bits::B32)).unwrap_err();
        assert!(matches!(err, Error::Layout(_)));
    }

    #[test]
    fn test_mutually_containing_structs() {
        let a = CompositeType::declare_struct("A");
        let b = CompositeType::new_struct("B", Definition::new().field("a", Field::composite(&a)));
        a.define(Definition::new().field("b", Field::array(Field::composite(&b), 2)))
            .unwrap();

        assert!(matches!(
            a.compute_layout(&config(Bits::B32)),
            Err(Error::Layout(_))
        ));
    }

    #[test]
    fn test_self_pointer_is_fine() {
        let ty = CompositeType::cyclic_struct("List", |this| {
            Definition::new()
                .field("value", Field::U32)
                .field("next", Field::pointer(Field::composite(this)))
        });
        let layout = ty.compute_layout(&config(Bits::B64)).unwrap();
        assert_eq!(layout.get("next").unwrap().offset, 8);
        assert_eq!(layout.size(), 16);
    }

    #[test]
    fn test_string_fields_use_abi_layout() {
        let ty = CompositeType::new_struct(
            "Named",
            Definition::new()
                .field("id", Field::U32)
                .field("name", Field::string(StringAbi::Sso))
                .field("legacy", Field::string(StringAbi::RefCounted)),
        );
        let layout = ty.compute_layout(&config(Bits::B64)).unwrap();

        assert_eq!(layout.get("name").unwrap().offset, 8);
        assert_eq!(layout.get("name").unwrap().size, 32);
        assert_eq!(layout.get("legacy").unwrap().offset, 40);
        assert_eq!(layout.size(), 48);
    }
}
