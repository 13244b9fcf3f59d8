//! Integer packing helpers shared by the memory port.

use crate::error::{Error, Result};

/// Widest integer the port packs in one access
pub const MAX_SCALAR_SIZE: usize = 8;

/// Decode an unsigned integer of `bytes.len()` bytes (at most 8)
pub fn decode_unsigned(bytes: &[u8], big_endian: bool) -> u64 {
    let fold = |value: u64, byte: &u8| (value << 8) | u64::from(*byte);
    if big_endian {
        bytes.iter().fold(0, fold)
    } else {
        bytes.iter().rev().fold(0, fold)
    }
}

/// Encode the low `size` bytes of `value`
pub fn encode_unsigned(value: u64, size: usize, big_endian: bool) -> Vec<u8> {
    let le = value.to_le_bytes();
    let mut bytes = le[..size.min(MAX_SCALAR_SIZE)].to_vec();
    if big_endian {
        bytes.reverse();
    }
    bytes
}

/// Sign-extend the low `size` bytes of `value`
pub fn sign_extend(value: u64, size: usize) -> i64 {
    if size == 0 || size >= MAX_SCALAR_SIZE {
        return value as i64;
    }
    let shift = 64 - size * 8;
    ((value << shift) as i64) >> shift
}

/// Check that `value` is representable as a signed integer of `size` bytes
pub fn check_signed(value: i64, size: usize) -> Result<()> {
    if size >= MAX_SCALAR_SIZE || sign_extend(value as u64, size) == value {
        Ok(())
    } else {
        Err(Error::ValueOutOfRange {
            value: i128::from(value),
            size,
        })
    }
}

/// Check that `value` is representable as an unsigned integer of `size` bytes
pub fn check_unsigned(value: u64, size: usize) -> Result<()> {
    if size >= MAX_SCALAR_SIZE || value >> (size * 8) == 0 {
        Ok(())
    } else {
        Err(Error::ValueOutOfRange {
            value: i128::from(value),
            size,
        })
    }
}

pub(crate) fn check_scalar_size(address: u64, size: usize) -> Result<()> {
    if size == 0 || size > MAX_SCALAR_SIZE {
        return Err(Error::MemoryAccess {
            address,
            length: size,
            message: format!("scalar access must be 1..={} bytes", MAX_SCALAR_SIZE),
        });
    }
    Ok(())
}

pub(crate) fn short_read(address: u64, expected: usize, actual: usize) -> Error {
    Error::MemoryAccess {
        address,
        length: expected,
        message: format!("short read: got {} bytes", actual),
    }
}
