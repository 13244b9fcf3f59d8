//! In-memory implementation of the memory port.
//!
//! A [`BufferState`] maps a byte vector at a fixed base address. Remote
//! allocations are served by a bump allocator that grows the buffer past its
//! current end, and every allocation is recorded so callers can inspect what
//! string marshalling did.
//!
//! ```
//! use memlayout::{AbstractState, BufferState, ByteOrder, PlatformConfig};
//!
//! let state = BufferState::builder(PlatformConfig::host())
//!     .base(0x4000)
//!     .u32_at(0x4010, 7)
//!     .build();
//!
//! assert_eq!(state.read_u32(0x4010, ByteOrder::Native).unwrap(), 7);
//! ```

use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::AbstractState;
use super::bytes::encode_unsigned;
use crate::error::{Error, Result};
use crate::platform::PlatformConfig;
use crate::util::round_up;

/// Alignment of addresses returned by [`BufferState::allocate`]
pub const ALLOCATION_ALIGNMENT: usize = 16;

/// Default base address for builders; keeps address 0 unmapped
pub const DEFAULT_BASE: u64 = 0x1000;

/// One allocation served by a [`BufferState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub address: u64,
    pub size: usize,
}

#[derive(Debug, Default)]
struct BufferInner {
    memory: Vec<u8>,
    allocations: Vec<Allocation>,
}

/// Byte-vector backed address space
#[derive(Debug)]
pub struct BufferState {
    config: PlatformConfig,
    base: u64,
    inner: Mutex<BufferInner>,
}

impl BufferState {
    /// Create a zero-filled state of `size` bytes mapped at `base`
    pub fn new(config: PlatformConfig, base: u64, size: usize) -> Self {
        Self::from_bytes(config, base, vec![0; size])
    }

    pub fn from_bytes(config: PlatformConfig, base: u64, memory: Vec<u8>) -> Self {
        Self {
            config,
            base,
            inner: Mutex::new(BufferInner {
                memory,
                allocations: Vec::new(),
            }),
        }
    }

    /// Load a raw memory snapshot from disk and map it at `base`
    pub fn from_file<P: AsRef<Path>>(config: PlatformConfig, base: u64, path: P) -> Result<Self> {
        let memory = fs::read(&path)?;
        info!(
            "Loaded {} byte snapshot from {} at 0x{:X}",
            memory.len(),
            path.as_ref().display(),
            base
        );
        Ok(Self::from_bytes(config, base, memory))
    }

    pub fn builder(config: PlatformConfig) -> BufferStateBuilder {
        BufferStateBuilder::new(config)
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Number of mapped bytes, allocations included
    pub fn len(&self) -> usize {
        self.lock().memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().memory.is_empty()
    }

    /// All allocations served so far, oldest first
    pub fn allocations(&self) -> Vec<Allocation> {
        self.lock().allocations.clone()
    }

    pub fn allocation_count(&self) -> usize {
        self.lock().allocations.len()
    }

    /// Copy of the whole mapped buffer
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().memory.clone()
    }

    fn lock(&self) -> MutexGuard<'_, BufferInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn range(&self, memory_len: usize, address: u64, length: usize) -> Result<Range<usize>> {
        let out_of_range = |message: &str| Error::MemoryAccess {
            address,
            length,
            message: message.to_string(),
        };

        let start = address
            .checked_sub(self.base)
            .ok_or_else(|| out_of_range("address below mapped region"))?;
        let start = usize::try_from(start).map_err(|_| out_of_range("address out of range"))?;
        let end = start
            .checked_add(length)
            .ok_or_else(|| out_of_range("address overflow"))?;

        if end > memory_len {
            return Err(out_of_range("address past end of mapped region"));
        }
        Ok(start..end)
    }
}

impl AbstractState for BufferState {
    fn config(&self) -> PlatformConfig {
        self.config
    }

    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>> {
        let inner = self.lock();
        let range = self.range(inner.memory.len(), address, length)?;
        Ok(inner.memory[range].to_vec())
    }

    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        let range = self.range(inner.memory.len(), address, data.len())?;
        inner.memory[range].copy_from_slice(data);
        Ok(())
    }

    fn allocate(&self, size: usize) -> Result<u64> {
        if size == 0 {
            return Err(Error::AllocationFailed {
                size,
                message: "zero-sized allocation".to_string(),
            });
        }

        let mut inner = self.lock();
        let start = round_up(inner.memory.len(), ALLOCATION_ALIGNMENT);
        inner.memory.resize(start + size, 0);

        let address = self.base + start as u64;
        inner.allocations.push(Allocation { address, size });
        debug!("Allocated {} bytes at 0x{:X}", size, address);

        Ok(address)
    }
}

/// Builder for [`BufferState`] with pre-populated memory.
///
/// Writes past the current end grow the buffer; addresses are absolute.
#[derive(Debug, Clone)]
pub struct BufferStateBuilder {
    config: PlatformConfig,
    base: u64,
    memory: Vec<u8>,
}

impl BufferStateBuilder {
    pub fn new(config: PlatformConfig) -> Self {
        Self {
            config,
            base: DEFAULT_BASE,
            memory: Vec::new(),
        }
    }

    /// Set the base address (call before writing values)
    pub fn base(mut self, base: u64) -> Self {
        self.base = base;
        self
    }

    /// Grow the mapped region to at least `size` bytes
    pub fn size(mut self, size: usize) -> Self {
        if self.memory.len() < size {
            self.memory.resize(size, 0);
        }
        self
    }

    pub fn bytes_at(mut self, address: u64, data: &[u8]) -> Self {
        let start = address.checked_sub(self.base).unwrap_or_else(|| {
            panic!(
                "address 0x{:X} is below the buffer base 0x{:X}",
                address, self.base
            )
        }) as usize;
        let end = start + data.len();
        if self.memory.len() < end {
            self.memory.resize(end, 0);
        }
        self.memory[start..end].copy_from_slice(data);
        self
    }

    /// Write an unsigned integer of `size` bytes in the config's byte order
    pub fn unsigned_at(self, address: u64, size: usize, value: u64) -> Self {
        let big_endian = crate::platform::ByteOrder::Native.is_big_endian(&self.config);
        let data = encode_unsigned(value, size, big_endian);
        self.bytes_at(address, &data)
    }

    pub fn u8_at(self, address: u64, value: u8) -> Self {
        self.unsigned_at(address, 1, u64::from(value))
    }

    pub fn u16_at(self, address: u64, value: u16) -> Self {
        self.unsigned_at(address, 2, u64::from(value))
    }

    pub fn u32_at(self, address: u64, value: u32) -> Self {
        self.unsigned_at(address, 4, u64::from(value))
    }

    pub fn i32_at(self, address: u64, value: i32) -> Self {
        self.unsigned_at(address, 4, u64::from(value as u32))
    }

    pub fn u64_at(self, address: u64, value: u64) -> Self {
        self.unsigned_at(address, 8, value)
    }

    pub fn f32_at(self, address: u64, value: f32) -> Self {
        self.u32_at(address, value.to_bits())
    }

    /// Write a pointer-sized value (`size_t`, pointers)
    pub fn usize_at(self, address: u64, value: u64) -> Self {
        let size = self.config.pointer_size();
        self.unsigned_at(address, size, value)
    }

    pub fn build(self) -> BufferState {
        BufferState::from_bytes(self.config, self.base, self.memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Bits, ByteOrder, OsFamily};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config() -> PlatformConfig {
        PlatformConfig::new(Bits::B64, OsFamily::Linux).with_byte_order(ByteOrder::Little)
    }

    #[test]
    fn test_read_write_roundtrip() {
        let state = BufferState::new(config(), 0x2000, 64);
        state.write_bytes(0x2010, &[1, 2, 3, 4]).unwrap();
        assert_eq!(state.read_bytes(0x200F, 6).unwrap(), vec![0, 1, 2, 3, 4, 0]);
    }

    #[test]
    #[should_panic(expected = "below the buffer base")]
    fn test_builder_rejects_address_below_base() {
        BufferState::builder(config()).base(0x2000).u32_at(0x1FFC, 1);
    }

    #[test]
    fn test_out_of_range_access() {
        let state = BufferState::new(config(), 0x2000, 16);

        assert!(state.read_bytes(0x1FFF, 1).is_err());
        assert!(state.read_bytes(0x200C, 8).is_err());
        assert!(state.write_bytes(0x2010, &[0]).is_err());
        assert!(state.read_bytes(0x2000, 16).is_ok());
    }

    #[test]
    fn test_allocate_is_aligned_and_recorded() {
        let state = BufferState::new(config(), 0x2000, 10);

        let first = state.allocate(5).unwrap();
        let second = state.allocate(32).unwrap();

        assert_eq!(first, 0x2010);
        assert_eq!(second, 0x2020);
        assert_eq!(
            state.allocations(),
            vec![
                Allocation { address: 0x2010, size: 5 },
                Allocation { address: 0x2020, size: 32 },
            ]
        );
        assert_eq!(state.len(), 0x40);

        // freshly allocated memory is writable
        state.write_bytes(second + 31, &[0xAA]).unwrap();
    }

    #[test]
    fn test_allocate_zero_fails() {
        let state = BufferState::new(config(), 0x2000, 16);
        let err = state.allocate(0).unwrap_err();
        assert!(err.is_memory_access());
        assert_eq!(state.allocation_count(), 0);
    }

    #[test]
    fn test_builder_values() {
        let state = BufferState::builder(config())
            .base(0x3000)
            .u16_at(0x3000, 0xBEEF)
            .usize_at(0x3008, 0x3000)
            .f32_at(0x3010, 2.0)
            .size(0x40)
            .build();

        assert_eq!(state.base(), 0x3000);
        assert_eq!(state.len(), 0x40);
        assert_eq!(state.read_u16(0x3000, ByteOrder::Native).unwrap(), 0xBEEF);
        assert_eq!(state.read_pointer(0x3008).unwrap(), 0x3000);
        assert_eq!(state.read_f32(0x3010, ByteOrder::Native).unwrap(), 2.0);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x78, 0x56, 0x34, 0x12]).unwrap();
        file.flush().unwrap();

        let state = BufferState::from_file(config(), 0x400000, file.path()).unwrap();
        assert_eq!(state.read_u32(0x400000, ByteOrder::Native).unwrap(), 0x12345678);
    }

    #[test]
    fn test_from_missing_file() {
        let result = BufferState::from_file(config(), 0, "/nonexistent/snapshot.bin");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
