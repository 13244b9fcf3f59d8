//! Scalar field kinds and their ABI sizing.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::value::Value;
use crate::error::{Error, Result};
use crate::platform::{ByteOrder, PlatformConfig};
use crate::state::AbstractState;

/// Scalar kinds a field can hold.
///
/// Fixed-width kinds have the same size everywhere. The C-named kinds follow
/// the target ABI through [`PlatformConfig`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    /// One byte, zero is false
    Bool,
    /// One raw byte of character data
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    #[strum(serialize = "isize")]
    ISize,
    #[strum(serialize = "usize")]
    USize,
    Size,
    Byte,
    #[strum(serialize = "ubyte")]
    UByte,
    Short,
    #[strum(serialize = "ushort")]
    UShort,
    Int,
    #[strum(serialize = "uint")]
    UInt,
    Long,
    #[strum(serialize = "ulong")]
    ULong,
    #[strum(serialize = "longlong")]
    LongLong,
    #[strum(serialize = "ulonglong")]
    ULongLong,
    Float,
    Double,
}

impl Primitive {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            Primitive::F32 | Primitive::F64 | Primitive::Float | Primitive::Double
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::I8
                | Primitive::I16
                | Primitive::I32
                | Primitive::I64
                | Primitive::ISize
                | Primitive::Byte
                | Primitive::Short
                | Primitive::Int
                | Primitive::Long
                | Primitive::LongLong
        ) || self.is_float()
    }

    /// Size in bytes on the given platform
    pub fn compute_size(self, config: &PlatformConfig) -> usize {
        match self {
            Primitive::Bool
            | Primitive::Char
            | Primitive::I8
            | Primitive::U8
            | Primitive::Byte
            | Primitive::UByte => 1,
            Primitive::I16 | Primitive::U16 | Primitive::Short | Primitive::UShort => 2,
            Primitive::I32 | Primitive::U32 | Primitive::F32 | Primitive::Float => 4,
            Primitive::I64
            | Primitive::U64
            | Primitive::F64
            | Primitive::Double
            | Primitive::LongLong
            | Primitive::ULongLong => 8,
            Primitive::ISize | Primitive::USize | Primitive::Size => config.pointer_size(),
            Primitive::Int | Primitive::UInt => config.int_size(),
            Primitive::Long | Primitive::ULong => config.long_size(),
        }
    }

    /// Natural alignment: always equal to the size
    pub fn compute_alignment(self, config: &PlatformConfig) -> usize {
        self.compute_size(config)
    }

    pub fn read<'s>(
        self,
        state: &'s dyn AbstractState,
        address: u64,
        order: ByteOrder,
    ) -> Result<Value<'s>> {
        let value = match self {
            Primitive::Bool => Value::Bool(state.read_bool(address, order)?),
            Primitive::Char => Value::U8(state.read_char(address, order)?),
            Primitive::I8 => Value::I8(state.read_i8(address, order)?),
            Primitive::Byte => Value::I8(state.read_byte(address, order)?),
            Primitive::U8 => Value::U8(state.read_u8(address, order)?),
            Primitive::UByte => Value::U8(state.read_ubyte(address, order)?),
            Primitive::I16 => Value::I16(state.read_i16(address, order)?),
            Primitive::Short => Value::I16(state.read_short(address, order)?),
            Primitive::U16 => Value::U16(state.read_u16(address, order)?),
            Primitive::UShort => Value::U16(state.read_ushort(address, order)?),
            Primitive::I32 => Value::I32(state.read_i32(address, order)?),
            Primitive::Int => Value::I32(state.read_int(address, order)?),
            Primitive::U32 => Value::U32(state.read_u32(address, order)?),
            Primitive::UInt => Value::U32(state.read_uint(address, order)?),
            Primitive::I64 => Value::I64(state.read_i64(address, order)?),
            Primitive::LongLong => Value::I64(state.read_longlong(address, order)?),
            Primitive::Long => Value::I64(state.read_long(address, order)?),
            Primitive::ISize => Value::I64(state.read_isize(address, order)?),
            Primitive::U64 => Value::U64(state.read_u64(address, order)?),
            Primitive::ULongLong => Value::U64(state.read_ulonglong(address, order)?),
            Primitive::ULong => Value::U64(state.read_ulong(address, order)?),
            Primitive::USize => Value::U64(state.read_usize(address, order)?),
            Primitive::Size => Value::U64(state.read_size(address, order)?),
            Primitive::F32 => Value::F32(state.read_f32(address, order)?),
            Primitive::Float => Value::F32(state.read_float(address, order)?),
            Primitive::F64 => Value::F64(state.read_f64(address, order)?),
            Primitive::Double => Value::F64(state.read_double(address, order)?),
        };
        Ok(value)
    }

    pub fn write(
        self,
        state: &dyn AbstractState,
        address: u64,
        value: &Value<'_>,
        order: ByteOrder,
    ) -> Result<()> {
        if self == Primitive::Bool {
            let flag = value
                .as_bool()
                .ok_or_else(|| Error::mismatch(self.as_str(), value.kind_name()))?;
            return state.write_bool(address, flag, order);
        }

        if self.is_float() {
            let float = value
                .as_f64()
                .ok_or_else(|| Error::mismatch(self.as_str(), value.kind_name()))?;
            return match self {
                Primitive::F32 => state.write_f32(address, float as f32, order),
                Primitive::Float => state.write_float(address, float as f32, order),
                Primitive::F64 => state.write_f64(address, float, order),
                _ => state.write_double(address, float, order),
            };
        }

        let integer = value
            .as_i128()
            .ok_or_else(|| Error::mismatch(self.as_str(), value.kind_name()))?;
        let size = self.compute_size(&state.config());
        let out_of_range = || Error::ValueOutOfRange {
            value: integer,
            size,
        };

        if self.is_signed() {
            let signed = i64::try_from(integer).map_err(|_| out_of_range())?;
            state.write_signed(address, size, signed, order)
        } else {
            let unsigned = u64::try_from(integer).map_err(|_| out_of_range())?;
            state.write_unsigned(address, size, unsigned, order)
        }
    }
}
