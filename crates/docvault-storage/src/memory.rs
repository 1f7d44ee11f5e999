//! In-memory storage backend (for testing)

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::error::{StorageError, StorageResult};
use crate::key::StorageKey;
use crate::traits::{ByteRange, ObjectBody, ObjectStorage, StoredObject, body_from_bytes};

struct Entry {
    data: Bytes,
    modified: SystemTime,
}

/// In-memory storage for unit tests
///
/// Thread-safe via `RwLock`. Not persistent: data is lost on drop. Keys form a
/// flat namespace, so there is nothing to escape from.
#[derive(Default)]
pub struct InMemoryStorage {
    objects: RwLock<HashMap<StorageKey, Entry>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes stored
    pub fn total_size(&self) -> usize {
        self.objects.read().unwrap().values().map(|e| e.data.len()).sum()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn put(&self, key: &StorageKey, mut body: ObjectBody) -> StorageResult<u64> {
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        let written = data.len() as u64;

        self.objects.write().unwrap().insert(
            key.clone(),
            Entry {
                data: data.into(),
                modified: SystemTime::now(),
            },
        );
        Ok(written)
    }

    async fn get(&self, key: &StorageKey) -> StorageResult<StoredObject> {
        let objects = self.objects.read().unwrap();
        let entry = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        Ok(StoredObject {
            body: body_from_bytes(entry.data.clone()),
            size: entry.data.len() as u64,
            last_modified: entry.modified,
            range: None,
        })
    }

    async fn get_range(&self, key: &StorageKey, range: ByteRange) -> StorageResult<StoredObject> {
        let objects = self.objects.read().unwrap();
        let entry = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let size = entry.data.len() as u64;
        let (first, last) = range
            .resolve(size)
            .ok_or(StorageError::RangeNotSatisfiable { size })?;

        Ok(StoredObject {
            body: body_from_bytes(entry.data.slice(first as usize..=last as usize)),
            size,
            last_modified: entry.modified,
            range: Some((first, last)),
        })
    }

    async fn delete(&self, key: &StorageKey) -> StorageResult<()> {
        self.objects
            .write()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> StorageKey {
        StorageKey::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let storage = InMemoryStorage::new();
        let data = b"%PDF-1.7 hello";

        let written = storage
            .put(&key("a.pdf"), body_from_bytes(&data[..]))
            .await
            .unwrap();
        assert_eq!(written, data.len() as u64);

        let object = storage.get(&key("a.pdf")).await.unwrap();
        assert_eq!(object.size, data.len() as u64);
        assert_eq!(object.into_bytes().await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let storage = InMemoryStorage::new();
        storage.put(&key("a.pdf"), body_from_bytes("first")).await.unwrap();
        storage.put(&key("a.pdf"), body_from_bytes("second")).await.unwrap();

        assert_eq!(storage.len(), 1);
        let object = storage.get(&key("a.pdf")).await.unwrap();
        assert_eq!(object.into_bytes().await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_not_found() {
        let storage = InMemoryStorage::new();

        let result = storage.get(&key("missing.pdf")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let storage = InMemoryStorage::new();
        storage.put(&key("gone.pdf"), body_from_bytes("x")).await.unwrap();

        storage.delete(&key("gone.pdf")).await.unwrap();
        assert!(storage.is_empty());

        // Deleting twice reports the missing object
        let result = storage.delete(&key("gone.pdf")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_range() {
        let storage = InMemoryStorage::new();
        storage.put(&key("r.pdf"), body_from_bytes("0123456789")).await.unwrap();

        let object = storage
            .get_range(&key("r.pdf"), ByteRange::From { start: 2, end: Some(5) })
            .await
            .unwrap();
        assert_eq!(object.size, 10);
        assert_eq!(object.range, Some((2, 5)));
        assert_eq!(object.into_bytes().await.unwrap(), b"2345");

        let result = storage
            .get_range(&key("r.pdf"), ByteRange::From { start: 10, end: None })
            .await;
        assert!(matches!(
            result,
            Err(StorageError::RangeNotSatisfiable { size: 10 })
        ));
    }

    #[tokio::test]
    async fn test_total_size() {
        let storage = InMemoryStorage::new();
        storage.put(&key("a"), body_from_bytes("abc")).await.unwrap();
        storage.put(&key("b"), body_from_bytes("de")).await.unwrap();
        assert_eq!(storage.total_size(), 5);
    }
}
