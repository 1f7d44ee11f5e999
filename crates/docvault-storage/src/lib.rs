//! docvault-storage: Byte storage for uploaded documents
//!
//! Provides async storage backends addressed by opaque [`StorageKey`]s.
//! No authorization logic; callers decide who may touch a key before
//! calling in.
//!
//! ## Backends
//!
//! | Backend            | Use Case                | Feature Flag |
//! |--------------------|-------------------------|--------------|
//! | `InMemoryStorage`  | Unit tests              | (always)     |
//! | `LocalFileStorage` | Single-node deployments | (always)     |
//! | `S3Storage`        | Production (Minio/S3)   | `s3`         |
//!
//! `LocalFileStorage` canonicalises every resolved path and refuses keys
//! that would land outside its root (`..`, absolute paths, symlinks).
//!
//! ## Example
//!
//! ```rust,ignore
//! use docvault_storage::{InMemoryStorage, ObjectStorage, StorageKey, body_from_bytes};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = InMemoryStorage::new();
//!     let key = StorageKey::generate("pdf");
//!
//!     storage.put(&key, body_from_bytes("%PDF-1.7")).await?;
//!     let object = storage.get(&key).await?;
//!     assert_eq!(object.size, 8);
//!
//!     Ok(())
//! }
//! ```

mod error;
mod key;
mod traits;

mod local;
mod memory;

#[cfg(feature = "s3")]
mod s3;

// Re-exports
pub use error::{StorageError, StorageResult};
pub use key::StorageKey;
pub use traits::{ByteRange, ObjectBody, ObjectStorage, StoredObject, body_from_bytes};

pub use local::LocalFileStorage;
pub use memory::InMemoryStorage;

#[cfg(feature = "s3")]
pub use s3::{S3Settings, S3Storage};
