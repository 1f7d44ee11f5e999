//! Storage trait definitions

use std::pin::Pin;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::StorageResult;
use crate::key::StorageKey;

/// Streaming object body, used for both uploads and downloads
pub type ObjectBody = Pin<Box<dyn AsyncRead + Send>>;

/// Wrap an in-memory buffer as an [`ObjectBody`]
pub fn body_from_bytes(data: impl Into<bytes::Bytes>) -> ObjectBody {
    Box::pin(std::io::Cursor::new(data.into()))
}

/// A requested byte range, not yet resolved against an object's size
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteRange {
    /// `start..=end`, or `start..` to the end of the object
    From { start: u64, end: Option<u64> },
    /// The last `n` bytes
    Suffix(u64),
}

impl ByteRange {
    /// Inclusive `(first, last)` offsets within an object of `size` bytes,
    /// or `None` if no byte of the range exists
    pub fn resolve(&self, size: u64) -> Option<(u64, u64)> {
        if size == 0 {
            return None;
        }
        match *self {
            ByteRange::From { start, end } => {
                if start >= size || end.is_some_and(|end| end < start) {
                    return None;
                }
                Some((start, end.map_or(size - 1, |end| end.min(size - 1))))
            }
            ByteRange::Suffix(0) => None,
            ByteRange::Suffix(n) => Some((size.saturating_sub(n), size - 1)),
        }
    }
}

/// An object opened for reading
///
/// `size` is always the full object size. When `range` is set the body
/// yields only the inclusive `(first, last)` slice, which is what a caller
/// needs for `Content-Range`.
pub struct StoredObject {
    pub body: ObjectBody,
    pub size: u64,
    pub last_modified: SystemTime,
    pub range: Option<(u64, u64)>,
}

impl StoredObject {
    /// Number of bytes the body will yield
    pub fn body_len(&self) -> u64 {
        match self.range {
            Some((first, last)) => last - first + 1,
            None => self.size,
        }
    }

    /// Drain the body into memory (tests and small objects only)
    pub async fn into_bytes(mut self) -> StorageResult<Vec<u8>> {
        use tokio::io::AsyncReadExt;

        let mut buf = Vec::with_capacity(self.body_len() as usize);
        self.body.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl std::fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredObject")
            .field("size", &self.size)
            .field("last_modified", &self.last_modified)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

/// Byte storage addressed by opaque keys
///
/// The rest of the system is written against this trait only; the concrete
/// backend is picked once at startup.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store an object, replacing any previous content under `key`
    ///
    /// Returns the number of bytes written. If the caller is cancelled midway
    /// a partially written object may remain; it is not rolled back.
    async fn put(&self, key: &StorageKey, body: ObjectBody) -> StorageResult<u64>;

    /// Open an object for streaming
    ///
    /// Returns `StorageError::NotFound` if nothing is stored under `key`.
    async fn get(&self, key: &StorageKey) -> StorageResult<StoredObject>;

    /// Open part of an object for streaming
    ///
    /// Returns `StorageError::RangeNotSatisfiable` if the range lies wholly
    /// past the end of the object.
    async fn get_range(&self, key: &StorageKey, range: ByteRange) -> StorageResult<StoredObject>;

    /// Remove an object
    ///
    /// Returns `StorageError::NotFound` if nothing is stored under `key`.
    async fn delete(&self, key: &StorageKey) -> StorageResult<()>;
}
