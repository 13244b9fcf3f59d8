//! Field descriptors.
//!
//! A [`Field`] is schema, not data: it knows its size and alignment for a
//! given [`PlatformConfig`] and how to read or write a value at an address,
//! but holds no address or state itself. Offsets live in the
//! [`CompositeLayout`](crate::layout::CompositeLayout) that places a field.

pub mod primitive;
pub mod value;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

pub use primitive::Primitive;
pub use value::Value;

use crate::array::ArrayProxy;
use crate::error::{Error, Result};
use crate::layout::engine::Visiting;
use crate::layout::{CompositeType, Instance};
use crate::platform::{ByteOrder, PlatformConfig};
use crate::pointer::PointerCursor;
use crate::state::AbstractState;
use crate::string::StringAbi;

/// Typed descriptor of one memory slot
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Zero-sized marker (functions, opaque targets)
    Void,
    Scalar(Primitive),
    /// Repeated elements; `None` length means unsized
    Array {
        element: Arc<Field>,
        length: Option<usize>,
    },
    Pointer(Arc<Field>),
    Composite(CompositeType),
    String(StringAbi),
    /// Padding bytes whose count depends on the platform; reads as a `char` array
    Fill(Arc<HashMap<PlatformConfig, usize>>),
}

impl Field {
    pub const BOOL: Field = Field::Scalar(Primitive::Bool);
    pub const CHAR: Field = Field::Scalar(Primitive::Char);
    pub const I8: Field = Field::Scalar(Primitive::I8);
    pub const U8: Field = Field::Scalar(Primitive::U8);
    pub const I16: Field = Field::Scalar(Primitive::I16);
    pub const U16: Field = Field::Scalar(Primitive::U16);
    pub const I32: Field = Field::Scalar(Primitive::I32);
    pub const U32: Field = Field::Scalar(Primitive::U32);
    pub const I64: Field = Field::Scalar(Primitive::I64);
    pub const U64: Field = Field::Scalar(Primitive::U64);
    pub const F32: Field = Field::Scalar(Primitive::F32);
    pub const F64: Field = Field::Scalar(Primitive::F64);
    pub const ISIZE: Field = Field::Scalar(Primitive::ISize);
    pub const USIZE: Field = Field::Scalar(Primitive::USize);
    pub const SIZE: Field = Field::Scalar(Primitive::Size);
    pub const BYTE: Field = Field::Scalar(Primitive::Byte);
    pub const UBYTE: Field = Field::Scalar(Primitive::UByte);
    pub const SHORT: Field = Field::Scalar(Primitive::Short);
    pub const USHORT: Field = Field::Scalar(Primitive::UShort);
    pub const INT: Field = Field::Scalar(Primitive::Int);
    pub const UINT: Field = Field::Scalar(Primitive::UInt);
    pub const LONG: Field = Field::Scalar(Primitive::Long);
    pub const ULONG: Field = Field::Scalar(Primitive::ULong);
    pub const LONGLONG: Field = Field::Scalar(Primitive::LongLong);
    pub const ULONGLONG: Field = Field::Scalar(Primitive::ULongLong);
    pub const FLOAT: Field = Field::Scalar(Primitive::Float);
    pub const DOUBLE: Field = Field::Scalar(Primitive::Double);

    pub fn array(element: Field, length: usize) -> Self {
        Field::Array {
            element: Arc::new(element),
            length: Some(length),
        }
    }

    /// Array with no known length; only valid as the last field of a struct
    /// or behind a pointer
    pub fn unsized_array(element: Field) -> Self {
        Field::Array {
            element: Arc::new(element),
            length: None,
        }
    }

    pub fn pointer(target: Field) -> Self {
        Field::Pointer(Arc::new(target))
    }

    pub fn composite(ty: &CompositeType) -> Self {
        Field::Composite(ty.clone())
    }

    pub fn string(abi: StringAbi) -> Self {
        Field::String(abi)
    }

    /// Platform-dependent padding; platforms missing from `fills` get none
    pub fn fill(fills: HashMap<PlatformConfig, usize>) -> Self {
        Field::Fill(Arc::new(fills))
    }

    fn fill_length(fills: &HashMap<PlatformConfig, usize>, config: &PlatformConfig) -> usize {
        fills.get(config).copied().unwrap_or(0)
    }

    pub fn is_unsized(&self) -> bool {
        matches!(self, Field::Array { length: None, .. })
    }

    /// Short human-readable type name, e.g. `[u16; 4]` or `*CCNode`
    pub fn describe(&self) -> String {
        match self {
            Field::Void => "void".to_string(),
            Field::Scalar(primitive) => primitive.to_string(),
            Field::Array {
                element,
                length: Some(length),
            } => format!("[{}; {}]", element.describe(), length),
            Field::Array {
                element,
                length: None,
            } => format!("[{}]", element.describe()),
            Field::Pointer(target) => format!("*{}", target.describe()),
            Field::Composite(ty) => format!("{} {}", ty.kind(), ty.name()),
            Field::String(abi) => format!("std::string<{}>", abi),
            Field::Fill(_) => "fill".to_string(),
        }
    }

    /// Size in bytes on the given platform.
    ///
    /// Fails with [`Error::UnsizedType`] for arrays without a length, and with
    /// [`Error::Layout`] for composites that are undefined or contain themselves.
    pub fn compute_size(&self, config: &PlatformConfig) -> Result<usize> {
        self.size_in(config, &mut Visiting::default())
    }

    pub fn compute_alignment(&self, config: &PlatformConfig) -> Result<usize> {
        self.alignment_in(config, &mut Visiting::default())
    }

    pub(crate) fn size_in(&self, config: &PlatformConfig, visiting: &mut Visiting) -> Result<usize> {
        match self {
            Field::Void => Ok(0),
            Field::Scalar(primitive) => Ok(primitive.compute_size(config)),
            Field::Array {
                element,
                length: Some(length),
            } => element
                .size_in(config, visiting)?
                .checked_mul(*length)
                .ok_or_else(|| Error::Layout(format!("{} does not fit in memory", self.describe()))),
            Field::Array { length: None, .. } => Err(Error::UnsizedType(self.describe())),
            Field::Pointer(_) => Ok(config.pointer_size()),
            Field::Composite(ty) => Ok(ty.layout_in(config, visiting)?.size()),
            Field::String(abi) => Ok(abi.layout_type(config).layout_in(config, visiting)?.size()),
            Field::Fill(fills) => Ok(Self::fill_length(fills, config)),
        }
    }

    pub(crate) fn alignment_in(
        &self,
        config: &PlatformConfig,
        visiting: &mut Visiting,
    ) -> Result<usize> {
        match self {
            Field::Void => Ok(0),
            Field::Scalar(primitive) => Ok(primitive.compute_alignment(config)),
            Field::Array { element, .. } => element.alignment_in(config, visiting),
            Field::Pointer(_) => Ok(config.pointer_size()),
            Field::Composite(ty) => Ok(ty.layout_in(config, visiting)?.alignment()),
            Field::String(abi) => Ok(abi
                .layout_type(config)
                .layout_in(config, visiting)?
                .alignment()),
            Field::Fill(_) => Ok(1),
        }
    }

    /// Read the slot at `address`.
    ///
    /// Arrays, pointers and composites come back as cursors bound to `state`;
    /// no element or target memory is touched.
    pub fn read<'s>(
        &self,
        state: &'s dyn AbstractState,
        address: u64,
        order: ByteOrder,
    ) -> Result<Value<'s>> {
        match self {
            Field::Void => Ok(Value::Void),
            Field::Scalar(primitive) => primitive.read(state, address, order),
            Field::Array { element, length } => Ok(Value::Array(
                ArrayProxy::new(state, address, element.clone(), *length).with_order(order),
            )),
            Field::Pointer(target) => Ok(Value::Pointer(
                PointerCursor::new(state, address, target.clone()).with_order(order),
            )),
            Field::Composite(ty) => {
                let layout = ty.compute_layout(&state.config())?;
                Ok(Value::Composite(
                    Instance::from_slot(state, address, layout).with_order(order),
                ))
            }
            Field::String(abi) => Ok(Value::Text(abi.read(state, address, order)?)),
            Field::Fill(fills) => {
                let length = Self::fill_length(fills, &state.config());
                Ok(Value::Array(
                    ArrayProxy::new(state, address, Arc::new(Field::CHAR), Some(length))
                        .with_order(order),
                ))
            }
        }
    }

    /// Write `value` into the slot at `address`.
    ///
    /// Arrays are never replaced wholesale, so writing one is a no-op; mutate
    /// elements through the [`ArrayProxy`] instead.
    pub fn write(
        &self,
        state: &dyn AbstractState,
        address: u64,
        value: &Value<'_>,
        order: ByteOrder,
    ) -> Result<()> {
        match self {
            Field::Void => Ok(()),
            Field::Scalar(primitive) => primitive.write(state, address, value, order),
            Field::Array { .. } | Field::Fill(_) => {
                trace!("Ignoring whole-array write at 0x{:X}", address);
                Ok(())
            }
            Field::Pointer(_) => {
                let target = match value {
                    Value::Pointer(cursor) => cursor.value_address()?,
                    other => {
                        let integer = other
                            .as_i128()
                            .ok_or_else(|| Error::mismatch("pointer", other.kind_name()))?;
                        u64::try_from(integer).map_err(|_| Error::ValueOutOfRange {
                            value: integer,
                            size: state.config().pointer_size(),
                        })?
                    }
                };
                state.write_usize(address, target, order)
            }
            Field::Composite(ty) => {
                let Value::Composite(source) = value else {
                    return Err(Error::mismatch("composite", value.kind_name()));
                };
                if source.type_name() != ty.name() {
                    return Err(Error::CompositeMismatch {
                        expected: ty.name().to_string(),
                        found: source.type_name().to_string(),
                    });
                }
                let bytes = source.read_raw()?;
                state.write_bytes(address, &bytes)
            }
            Field::String(abi) => {
                let text = value
                    .as_str()
                    .ok_or_else(|| Error::mismatch("text", value.kind_name()))?;
                abi.write(state, address, text, order)
            }
        }
    }
}

impl From<Primitive> for Field {
    fn from(primitive: Primitive) -> Self {
        Field::Scalar(primitive)
    }
}
