//! Local filesystem storage backend

use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::key::StorageKey;
use crate::traits::{ByteRange, ObjectBody, ObjectStorage, StoredObject};

/// Local filesystem storage
///
/// Objects are stored as plain files at `{root}/{key}`; keys may contain `/`
/// to nest objects in subdirectories. Every key is resolved and checked to
/// stay below the canonical root before the filesystem is touched.
#[derive(Debug)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Create storage at the given root directory
    ///
    /// Creates the directory if it doesn't exist and pins its canonical form.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).await?;
        let root = fs::canonicalize(root).await?;
        debug!(root = %root.display(), "local storage ready");
        Ok(Self { root })
    }

    /// Canonical root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path below the root, or reject it
    ///
    /// Keys are rejected if they are absolute, contain `..`, resolve to the
    /// root itself, or pass through a symlink that leaves the root.
    async fn resolve(&self, key: &StorageKey) -> StorageResult<PathBuf> {
        let mut path = self.root.clone();
        for component in Path::new(key.as_str()).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    warn!(%key, "rejected storage key escaping root");
                    return Err(StorageError::InvalidKey(key.to_string()));
                }
            }
        }
        if path == self.root {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        // The deepest entry that already exists decides where the path really
        // lands once symlinks are followed. `symlink_metadata` sees dangling
        // links too; those fail to canonicalize and are rejected.
        for ancestor in path.ancestors() {
            if ancestor == self.root {
                break;
            }
            if fs::symlink_metadata(ancestor).await.is_err() {
                continue;
            }
            match fs::canonicalize(ancestor).await {
                Ok(real) if real.starts_with(&self.root) => break,
                Ok(real) => {
                    warn!(%key, target = %real.display(), "rejected storage key escaping root via symlink");
                    return Err(StorageError::InvalidKey(key.to_string()));
                }
                Err(e) => {
                    warn!(%key, error = %e, "rejected storage key through unresolvable symlink");
                    return Err(StorageError::InvalidKey(key.to_string()));
                }
            }
        }

        Ok(path)
    }

    /// Open an existing object for reading
    async fn open(&self, key: &StorageKey) -> StorageResult<(fs::File, std::fs::Metadata)> {
        let path = self.resolve(key).await?;
        let meta = Self::file_metadata(&path, key).await?;

        match fs::File::open(&path).await {
            Ok(file) => Ok((file, meta)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Metadata for an existing regular file, `NotFound` for anything else
    async fn file_metadata(path: &Path, key: &StorageKey) -> StorageResult<std::fs::Metadata> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(meta),
            Ok(_) => Err(StorageError::NotFound(key.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn modified(meta: &std::fs::Metadata) -> SystemTime {
    meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.partial", Uuid::new_v4()))
}

async fn write_file(path: &Path, body: &mut ObjectBody) -> StorageResult<u64> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    let written = tokio::io::copy(body, &mut file).await?;
    file.flush().await?;
    Ok(written)
}

#[async_trait]
impl ObjectStorage for LocalFileStorage {
    async fn put(&self, key: &StorageKey, mut body: ObjectBody) -> StorageResult<u64> {
        let path = self.resolve(key).await?;

        if let Some(parent) = path.parent()
            && parent != self.root
        {
            fs::create_dir_all(parent).await?;
        }

        // Stream into a sibling file and rename over the target, so a failed
        // upload leaves the previous object intact
        let partial = partial_path(&path);
        let written = match write_file(&partial, &mut body).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }

        debug!(%key, bytes = written, "stored object");
        Ok(written)
    }

    async fn get(&self, key: &StorageKey) -> StorageResult<StoredObject> {
        let (file, meta) = self.open(key).await?;

        Ok(StoredObject {
            body: Box::pin(file),
            size: meta.len(),
            last_modified: modified(&meta),
            range: None,
        })
    }

    async fn get_range(&self, key: &StorageKey, range: ByteRange) -> StorageResult<StoredObject> {
        let (mut file, meta) = self.open(key).await?;
        let size = meta.len();
        let (first, last) = range
            .resolve(size)
            .ok_or(StorageError::RangeNotSatisfiable { size })?;

        file.seek(SeekFrom::Start(first)).await?;

        Ok(StoredObject {
            body: Box::pin(file.take(last - first + 1)),
            size,
            last_modified: modified(&meta),
            range: Some((first, last)),
        })
    }

    async fn delete(&self, key: &StorageKey) -> StorageResult<()> {
        let path = self.resolve(key).await?;
        Self::file_metadata(&path, key).await?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%key, "deleted object");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
