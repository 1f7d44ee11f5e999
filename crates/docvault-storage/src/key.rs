//! Opaque object keys

use std::fmt;

use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Key addressing an object inside a backend's namespace.
///
/// Construction only rejects keys no backend could ever accept (empty, NUL
/// bytes). Whether a key stays inside the namespace is decided by the backend
/// that resolves it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> StorageResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".into()));
        }
        if key.contains('\0') {
            return Err(StorageError::InvalidKey("key contains NUL byte".into()));
        }
        Ok(Self(key))
    }

    /// Fresh `<uuid>.<extension>` key for a newly created object
    pub fn generate(extension: &str) -> Self {
        Self(format!("{}.{}", Uuid::new_v4(), extension))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({})", self.0)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
