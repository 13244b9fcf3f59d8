//! Decoded field values.

use std::fmt;

use strum::IntoStaticStr;

use crate::array::ArrayProxy;
use crate::error::{Error, Result};
use crate::layout::Instance;
use crate::pointer::PointerCursor;

/// A value read from, or about to be written to, a field.
///
/// Scalars and text are decoded eagerly. Arrays, pointers and composites stay
/// lazy cursors bound to the state they were read from.
#[derive(Debug, Clone, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Value<'s> {
    Void,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(String),
    Array(ArrayProxy<'s>),
    Pointer(PointerCursor<'s>),
    Composite(Instance<'s>),
}

impl<'s> Value<'s> {
    pub fn kind_name(&self) -> &'static str {
        self.into()
    }

    /// Integer payload, widened. `None` for non-integers.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::I8(v) => Some(i128::from(v)),
            Value::U8(v) => Some(i128::from(v)),
            Value::I16(v) => Some(i128::from(v)),
            Value::U16(v) => Some(i128::from(v)),
            Value::I32(v) => Some(i128::from(v)),
            Value::U32(v) => Some(i128::from(v)),
            Value::I64(v) => Some(i128::from(v)),
            Value::U64(v) => Some(i128::from(v)),
            _ => None,
        }
    }

    /// Numeric payload as a double; integers are converted
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(f64::from(v)),
            Value::F64(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    /// Boolean payload. `None` for everything else, integers included.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    pub fn into_array(self) -> Result<ArrayProxy<'s>> {
        self.try_into()
    }

    pub fn into_pointer(self) -> Result<PointerCursor<'s>> {
        self.try_into()
    }

    pub fn into_instance(self) -> Result<Instance<'s>> {
        self.try_into()
    }
}

/// Scalars compare by value, cursors by what they point at
impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.address() == b.address() && a.len() == b.len()
            }
            (Value::Pointer(a), Value::Pointer(b)) => a.address() == b.address(),
            (Value::Composite(a), Value::Composite(b)) => {
                a.address() == b.address() && a.type_name() == b.type_name()
            }
            _ => match (self.as_i128(), other.as_i128()) {
                (Some(a), Some(b)) => {
                    std::mem::discriminant(self) == std::mem::discriminant(other) && a == b
                }
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("void"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I8(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Text(text) => write!(f, "{:?}", text),
            Value::Array(array) => match array.len() {
                Some(length) => write!(f, "[{}; {}] @ 0x{:X}", array.element().describe(), length, array.address()),
                None => write!(f, "[{}] @ 0x{:X}", array.element().describe(), array.address()),
            },
            Value::Pointer(pointer) => match pointer.value_address() {
                Ok(0) => f.write_str("NULL"),
                Ok(target) => write!(f, "0x{:X}", target),
                Err(_) => write!(f, "<unreadable pointer @ 0x{:X}>", pointer.address()),
            },
            Value::Composite(instance) => {
                write!(f, "{} @ 0x{:X}", instance.type_name(), instance.address())
            }
        }
    }
}

macro_rules! integer_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value<'_> {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }

            impl TryFrom<Value<'_>> for $ty {
                type Error = Error;

                fn try_from(value: Value<'_>) -> Result<Self> {
                    let integer = value
                        .as_i128()
                        .ok_or_else(|| Error::mismatch(stringify!($ty), value.kind_name()))?;
                    <$ty>::try_from(integer).map_err(|_| Error::ValueOutOfRange {
                        value: integer,
                        size: std::mem::size_of::<$ty>(),
                    })
                }
            }
        )*
    };
}

integer_conversions! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
}

impl From<bool> for Value<'_> {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl TryFrom<Value<'_>> for bool {
    type Error = Error;

    fn try_from(value: Value<'_>) -> Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| Error::mismatch("bool", value.kind_name()))
    }
}

impl From<usize> for Value<'_> {
    fn from(value: usize) -> Self {
        Value::U64(value as u64)
    }
}

impl TryFrom<Value<'_>> for usize {
    type Error = Error;

    fn try_from(value: Value<'_>) -> Result<Self> {
        let wide = u64::try_from(value)?;
        usize::try_from(wide).map_err(|_| Error::ValueOutOfRange {
            value: i128::from(wide),
            size: std::mem::size_of::<usize>(),
        })
    }
}

impl From<f32> for Value<'_> {
    fn from(value: f32) -> Self {
        Value::F32(value)
    }
}

impl From<f64> for Value<'_> {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl TryFrom<Value<'_>> for f32 {
    type Error = Error;

    fn try_from(value: Value<'_>) -> Result<Self> {
        value
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| Error::mismatch("f32", value.kind_name()))
    }
}

impl TryFrom<Value<'_>> for f64 {
    type Error = Error;

    fn try_from(value: Value<'_>) -> Result<Self> {
        value
            .as_f64()
            .ok_or_else(|| Error::mismatch("f64", value.kind_name()))
    }
}

impl From<String> for Value<'_> {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value<'_> {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl TryFrom<Value<'_>> for String {
    type Error = Error;

    fn try_from(value: Value<'_>) -> Result<Self> {
        match value {
            Value::Text(text) => Ok(text),
            other => Err(Error::mismatch("text", other.kind_name())),
        }
    }
}

macro_rules! cursor_conversions {
    ($($ty:ident => $variant:ident, $name:literal);* $(;)?) => {
        $(
            impl<'s> From<$ty<'s>> for Value<'s> {
                fn from(value: $ty<'s>) -> Self {
                    Value::$variant(value)
                }
            }

            impl<'s> TryFrom<Value<'s>> for $ty<'s> {
                type Error = Error;

                fn try_from(value: Value<'s>) -> Result<Self> {
                    match value {
                        Value::$variant(inner) => Ok(inner),
                        other => Err(Error::mismatch($name, other.kind_name())),
                    }
                }
            }
        )*
    };
}

cursor_conversions! {
    ArrayProxy => Array, "array";
    PointerCursor => Pointer, "pointer";
    Instance => Composite, "composite";
}
