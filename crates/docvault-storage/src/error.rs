//! Storage error types

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failures surfaced by every [`ObjectStorage`](crate::ObjectStorage) backend.
///
/// Callers branch on these: `NotFound` maps to 404, `InvalidKey` to 400,
/// `RangeNotSatisfiable` to 416 and `BackendUnavailable` to 503.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Range not satisfiable for object of {size} bytes")]
    RangeNotSatisfiable { size: u64 },

    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
