//! The memory port.
//!
//! [`AbstractState`] is the only boundary between the layout engine and the
//! target address space. Implementors provide raw byte access and remote
//! allocation; every typed accessor is derived from those, so fields never
//! pack bytes themselves.
//!
//! [`BufferState`] is an in-memory implementation used for snapshots and tests.

pub mod buffer;
pub mod bytes;

use tracing::trace;

use crate::error::Result;
use crate::platform::{ByteOrder, PlatformConfig};

pub use buffer::{Allocation, BufferState, BufferStateBuilder};
use bytes::{check_scalar_size, check_signed, check_unsigned, short_read};

macro_rules! fixed_accessors {
    ($($read:ident, $write:ident => $ty:ty;)*) => {
        $(
            fn $read(&self, address: u64, order: ByteOrder) -> Result<$ty> {
                const SIZE: usize = std::mem::size_of::<$ty>();
                let bytes = self.read_bytes(address, SIZE)?;
                let raw: [u8; SIZE] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| short_read(address, SIZE, bytes.len()))?;
                Ok(if order.is_big_endian(&self.config()) {
                    <$ty>::from_be_bytes(raw)
                } else {
                    <$ty>::from_le_bytes(raw)
                })
            }

            fn $write(&self, address: u64, value: $ty, order: ByteOrder) -> Result<()> {
                let raw = if order.is_big_endian(&self.config()) {
                    value.to_be_bytes()
                } else {
                    value.to_le_bytes()
                };
                self.write_bytes(address, &raw)
            }
        )*
    };
}

/// Byte-level access to a target address space.
///
/// Failures of the underlying transport surface as [`Error::MemoryAccess`](crate::Error::MemoryAccess) or
/// [`Error::AllocationFailed`](crate::Error::AllocationFailed); nothing here retries.
pub trait AbstractState {
    /// Architecture of the target process
    fn config(&self) -> PlatformConfig;

    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>>;

    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()>;

    /// Reserve `size` bytes in the target process and return their address.
    ///
    /// The memory may be zeroed or uninitialized.
    fn allocate(&self, size: usize) -> Result<u64>;

    /// Read an unsigned integer of `size` bytes (1..=8)
    fn read_unsigned(&self, address: u64, size: usize, order: ByteOrder) -> Result<u64> {
        check_scalar_size(address, size)?;
        let bytes = self.read_bytes(address, size)?;
        if bytes.len() != size {
            return Err(short_read(address, size, bytes.len()));
        }
        Ok(bytes::decode_unsigned(
            &bytes,
            order.is_big_endian(&self.config()),
        ))
    }

    /// Read a sign-extended integer of `size` bytes (1..=8)
    fn read_signed(&self, address: u64, size: usize, order: ByteOrder) -> Result<i64> {
        let raw = self.read_unsigned(address, size, order)?;
        Ok(bytes::sign_extend(raw, size))
    }

    fn write_unsigned(&self, address: u64, size: usize, value: u64, order: ByteOrder) -> Result<()> {
        check_scalar_size(address, size)?;
        check_unsigned(value, size)?;
        let raw = bytes::encode_unsigned(value, size, order.is_big_endian(&self.config()));
        self.write_bytes(address, &raw)
    }

    fn write_signed(&self, address: u64, size: usize, value: i64, order: ByteOrder) -> Result<()> {
        check_scalar_size(address, size)?;
        check_signed(value, size)?;
        let raw = bytes::encode_unsigned(value as u64, size, order.is_big_endian(&self.config()));
        self.write_bytes(address, &raw)
    }

    fixed_accessors! {
        read_i8, write_i8 => i8;
        read_u8, write_u8 => u8;
        read_i16, write_i16 => i16;
        read_u16, write_u16 => u16;
        read_i32, write_i32 => i32;
        read_u32, write_u32 => u32;
        read_i64, write_i64 => i64;
        read_u64, write_u64 => u64;
        read_f32, write_f32 => f32;
        read_f64, write_f64 => f64;
    }

    fn read_isize(&self, address: u64, order: ByteOrder) -> Result<i64> {
        self.read_signed(address, self.config().pointer_size(), order)
    }

    fn write_isize(&self, address: u64, value: i64, order: ByteOrder) -> Result<()> {
        self.write_signed(address, self.config().pointer_size(), value, order)
    }

    fn read_usize(&self, address: u64, order: ByteOrder) -> Result<u64> {
        self.read_unsigned(address, self.config().pointer_size(), order)
    }

    fn write_usize(&self, address: u64, value: u64, order: ByteOrder) -> Result<()> {
        self.write_unsigned(address, self.config().pointer_size(), value, order)
    }

    fn read_size(&self, address: u64, order: ByteOrder) -> Result<u64> {
        self.read_usize(address, order)
    }

    fn write_size(&self, address: u64, value: u64, order: ByteOrder) -> Result<()> {
        self.write_usize(address, value, order)
    }

    /// Any nonzero byte reads as `true`
    fn read_bool(&self, address: u64, order: ByteOrder) -> Result<bool> {
        Ok(self.read_u8(address, order)? != 0)
    }

    fn write_bool(&self, address: u64, value: bool, order: ByteOrder) -> Result<()> {
        self.write_u8(address, u8::from(value), order)
    }

    fn read_char(&self, address: u64, order: ByteOrder) -> Result<u8> {
        self.read_u8(address, order)
    }

    fn write_char(&self, address: u64, value: u8, order: ByteOrder) -> Result<()> {
        self.write_u8(address, value, order)
    }

    fn read_byte(&self, address: u64, order: ByteOrder) -> Result<i8> {
        self.read_i8(address, order)
    }

    fn write_byte(&self, address: u64, value: i8, order: ByteOrder) -> Result<()> {
        self.write_i8(address, value, order)
    }

    fn read_ubyte(&self, address: u64, order: ByteOrder) -> Result<u8> {
        self.read_u8(address, order)
    }

    fn write_ubyte(&self, address: u64, value: u8, order: ByteOrder) -> Result<()> {
        self.write_u8(address, value, order)
    }

    fn read_short(&self, address: u64, order: ByteOrder) -> Result<i16> {
        self.read_i16(address, order)
    }

    fn write_short(&self, address: u64, value: i16, order: ByteOrder) -> Result<()> {
        self.write_i16(address, value, order)
    }

    fn read_ushort(&self, address: u64, order: ByteOrder) -> Result<u16> {
        self.read_u16(address, order)
    }

    fn write_ushort(&self, address: u64, value: u16, order: ByteOrder) -> Result<()> {
        self.write_u16(address, value, order)
    }

    fn read_int(&self, address: u64, order: ByteOrder) -> Result<i32> {
        let value = self.read_signed(address, self.config().int_size(), order)?;
        Ok(value as i32)
    }

    fn write_int(&self, address: u64, value: i32, order: ByteOrder) -> Result<()> {
        self.write_signed(address, self.config().int_size(), i64::from(value), order)
    }

    fn read_uint(&self, address: u64, order: ByteOrder) -> Result<u32> {
        let value = self.read_unsigned(address, self.config().int_size(), order)?;
        Ok(value as u32)
    }

    fn write_uint(&self, address: u64, value: u32, order: ByteOrder) -> Result<()> {
        self.write_unsigned(address, self.config().int_size(), u64::from(value), order)
    }

    fn read_long(&self, address: u64, order: ByteOrder) -> Result<i64> {
        self.read_signed(address, self.config().long_size(), order)
    }

    fn write_long(&self, address: u64, value: i64, order: ByteOrder) -> Result<()> {
        self.write_signed(address, self.config().long_size(), value, order)
    }

    fn read_ulong(&self, address: u64, order: ByteOrder) -> Result<u64> {
        self.read_unsigned(address, self.config().long_size(), order)
    }

    fn write_ulong(&self, address: u64, value: u64, order: ByteOrder) -> Result<()> {
        self.write_unsigned(address, self.config().long_size(), value, order)
    }

    fn read_longlong(&self, address: u64, order: ByteOrder) -> Result<i64> {
        self.read_i64(address, order)
    }

    fn write_longlong(&self, address: u64, value: i64, order: ByteOrder) -> Result<()> {
        self.write_i64(address, value, order)
    }

    fn read_ulonglong(&self, address: u64, order: ByteOrder) -> Result<u64> {
        self.read_u64(address, order)
    }

    fn write_ulonglong(&self, address: u64, value: u64, order: ByteOrder) -> Result<()> {
        self.write_u64(address, value, order)
    }

    fn read_float(&self, address: u64, order: ByteOrder) -> Result<f32> {
        self.read_f32(address, order)
    }

    fn write_float(&self, address: u64, value: f32, order: ByteOrder) -> Result<()> {
        self.write_f32(address, value, order)
    }

    fn read_double(&self, address: u64, order: ByteOrder) -> Result<f64> {
        self.read_f64(address, order)
    }

    fn write_double(&self, address: u64, value: f64, order: ByteOrder) -> Result<()> {
        self.write_f64(address, value, order)
    }

    /// Read a pointer-sized address in the target's native byte order
    fn read_pointer(&self, address: u64) -> Result<u64> {
        self.read_usize(address, ByteOrder::Native)
    }

    fn write_pointer(&self, address: u64, value: u64) -> Result<()> {
        self.write_usize(address, value, ByteOrder::Native)
    }

    /// Read a NUL-terminated string of at most `max_len` bytes.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected.
    fn read_c_string(&self, address: u64, max_len: usize) -> Result<String> {
        let bytes = self.read_bytes(address, max_len)?;
        let end = memchr::memchr(0, &bytes).unwrap_or(bytes.len());
        trace!("C string at 0x{:X}: {} bytes", address, end);
        let (text, _, _) = encoding_rs::UTF_8.decode(&bytes[..end]);
        Ok(text.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::platform::{Bits, OsFamily};

    fn state(config: PlatformConfig) -> BufferState {
        BufferState::new(config, 0x1000, 0x100)
    }

    #[test]
    fn test_fixed_accessors_little_endian() {
        let config = PlatformConfig::new(Bits::B32, OsFamily::Linux).with_byte_order(ByteOrder::Little);
        let state = state(config);

        state.write_u32(0x1000, 0xDEAD_BEEF, ByteOrder::Native).unwrap();
        assert_eq!(state.read_bytes(0x1000, 4).unwrap(), vec![0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(state.read_u32(0x1000, ByteOrder::Native).unwrap(), 0xDEAD_BEEF);
        assert_eq!(state.read_u32(0x1000, ByteOrder::Big).unwrap(), 0xEFBE_ADDE);
    }

    #[test]
    fn test_bool_and_char_accessors() {
        let state = state(PlatformConfig::new(Bits::B32, OsFamily::Linux));

        state.write_u8(0x1000, 0x80, ByteOrder::Native).unwrap();
        assert!(state.read_bool(0x1000, ByteOrder::Native).unwrap());

        state.write_bool(0x1000, false, ByteOrder::Native).unwrap();
        assert!(!state.read_bool(0x1000, ByteOrder::Native).unwrap());
        state.write_bool(0x1001, true, ByteOrder::Native).unwrap();
        assert_eq!(state.read_u8(0x1001, ByteOrder::Native).unwrap(), 1);

        state.write_char(0x1002, b'A', ByteOrder::Native).unwrap();
        assert_eq!(state.read_char(0x1002, ByteOrder::Native).unwrap(), b'A');
    }

    #[test]
    fn test_fixed_accessors_big_endian_config() {
        let config = PlatformConfig::new(Bits::B32, OsFamily::Linux).with_byte_order(ByteOrder::Big);
        let state = state(config);

        state.write_i16(0x1010, -2, ByteOrder::Native).unwrap();
        assert_eq!(state.read_bytes(0x1010, 2).unwrap(), vec![0xFF, 0xFE]);
        assert_eq!(state.read_i16(0x1010, ByteOrder::Native).unwrap(), -2);
    }

    #[test]
    fn test_float_accessors() {
        let state = state(PlatformConfig::new(Bits::B64, OsFamily::Linux));

        state.write_float(0x1000, 1.5, ByteOrder::Little).unwrap();
        state.write_double(0x1008, -0.25, ByteOrder::Little).unwrap();
        assert_eq!(state.read_float(0x1000, ByteOrder::Little).unwrap(), 1.5);
        assert_eq!(state.read_double(0x1008, ByteOrder::Little).unwrap(), -0.25);
    }

    #[test]
    fn test_abi_sized_accessors_follow_config() {
        let windows = state(PlatformConfig::new(Bits::B64, OsFamily::Windows));
        windows.write_long(0x1000, -1, ByteOrder::Little).unwrap();
        // LLP64: long is 4 bytes, the next 4 stay untouched
        assert_eq!(windows.read_bytes(0x1000, 8).unwrap(), vec![0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]);

        let linux = state(PlatformConfig::new(Bits::B64, OsFamily::Linux));
        linux.write_long(0x1000, -1, ByteOrder::Little).unwrap();
        assert_eq!(linux.read_bytes(0x1000, 8).unwrap(), vec![0xFF; 8]);
        assert_eq!(linux.read_long(0x1000, ByteOrder::Little).unwrap(), -1);
    }

    #[test]
    fn test_int_on_16_bit_target() {
        let state = state(PlatformConfig::new(Bits::B16, OsFamily::Unknown));

        state.write_int(0x1000, -300, ByteOrder::Little).unwrap();
        assert_eq!(state.read_int(0x1000, ByteOrder::Little).unwrap(), -300);
        assert_eq!(state.read_u16(0x1000, ByteOrder::Little).unwrap(), (-300i16) as u16);

        let err = state.write_int(0x1000, 70_000, ByteOrder::Little).unwrap_err();
        assert!(matches!(err, Error::ValueOutOfRange { size: 2, .. }));
    }

    #[test]
    fn test_pointer_accessors() {
        let state = state(PlatformConfig::new(Bits::B32, OsFamily::Linux));

        state.write_pointer(0x1004, 0x1080).unwrap();
        assert_eq!(state.read_pointer(0x1004).unwrap(), 0x1080);
        assert_eq!(state.read_usize(0x1004, ByteOrder::Native).unwrap(), 0x1080);
    }

    #[test]
    fn test_read_c_string_stops_at_nul() {
        let state = state(PlatformConfig::new(Bits::B64, OsFamily::Linux));
        state.write_bytes(0x1020, b"GeometryDash\0garbage").unwrap();

        assert_eq!(state.read_c_string(0x1020, 32).unwrap(), "GeometryDash");
        assert_eq!(state.read_c_string(0x1020, 8).unwrap(), "Geometry");
    }

    #[test]
    fn test_unmapped_read_is_memory_error() {
        let state = state(PlatformConfig::new(Bits::B64, OsFamily::Linux));
        let err = state.read_u64(0x10FC, ByteOrder::Native).unwrap_err();
        assert!(matches!(err, Error::MemoryAccess { address: 0x10FC, .. }));
    }
}
