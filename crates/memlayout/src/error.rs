use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Type has no known size: {0}")]
    UnsizedType(String),

    #[error("Invalid layout: {0}")]
    Layout(String),

    #[error("Failed to decode string at address {address:#x}: {message}")]
    Decode { address: u64, message: String },

    #[error("Failed to access {length} bytes of process memory at address {address:#x}: {message}")]
    MemoryAccess {
        address: u64,
        length: usize,
        message: String,
    },

    #[error("Failed to allocate {size} bytes in target process: {message}")]
    AllocationFailed { size: usize, message: String },

    #[error("Index {index} is out of bounds for array of length {length}")]
    Bounds { index: usize, length: usize },

    #[error("Can not iterate an array of unknown length")]
    UnboundedIteration,

    #[error("Null pointer dereference (pointer stored at {address:#x})")]
    NullPointer { address: u64 },

    #[error("Type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Value {value} does not fit in {size} bytes")]
    ValueOutOfRange { value: i128, size: usize },

    #[error("Can not assign a {found} value to a {expected} slot")]
    CompositeMismatch { expected: String, found: String },

    #[error("Type {type_name} has no field named {field}")]
    UnknownField { type_name: String, field: String },

    #[error("Unsupported bit width: {0}")]
    UnsupportedBits(u32),

    #[error("Invalid platform: {0}")]
    InvalidPlatform(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if the memory port failed (read, write or allocation)
    pub fn is_memory_access(&self) -> bool {
        matches!(
            self,
            Error::MemoryAccess { .. } | Error::AllocationFailed { .. }
        )
    }

    /// Check if this error comes from a malformed type definition.
    ///
    /// Schema errors are raised while computing layouts, before any memory is touched.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Error::UnsizedType(_) | Error::Layout(_))
    }

    pub(crate) fn mismatch(expected: &'static str, found: &'static str) -> Self {
        Error::TypeMismatch { expected, found }
    }
}
