use crate::config::{Config, StorageConfig};
use docvault_auth::{
    CredentialHasher, IdentityId, IdentityStore, InMemoryIdentityStore, PasswordHash,
    SessionAuthenticator, SigningSecret, TokenService,
};
use docvault_storage::{InMemoryStorage, LocalFileStorage, ObjectStorage, StorageKey};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Shared application state
///
/// Everything here is built once at startup; only the metadata stores are
/// mutated afterwards.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn ObjectStorage>,
    pub identities: Arc<dyn IdentityStore>,
    pub files: Arc<RwLock<FileStore>>,
    pub sessions: SessionAuthenticator,
    pub hasher: Arc<CredentialHasher>,
    /// Verified against when a login names an unknown email, so both
    /// failure paths cost one hash
    pub decoy_hash: PasswordHash,
    pub config: Arc<Config>,
}

/// Metadata for an uploaded document
#[derive(Clone, Debug)]
pub struct FileRecord {
    pub id: Uuid,
    pub owner_id: IdentityId,
    pub name: String,
    pub size: u64,
    pub storage_key: StorageKey,
    pub created_at: u64,
}

/// In-memory file metadata
#[derive(Default)]
pub struct FileStore {
    pub files: HashMap<Uuid, FileRecord>, // file id -> record
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: FileRecord) {
        self.files.insert(record.id, record);
    }

    pub fn get(&self, id: &Uuid) -> Option<&FileRecord> {
        self.files.get(id)
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<FileRecord> {
        self.files.remove(id)
    }

    /// Records visible to `owner`, or every record when `owner` is `None`,
    /// oldest first
    pub fn list(&self, owner: Option<&IdentityId>) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> = self
            .files
            .values()
            .filter(|r| owner.is_none_or(|o| r.owner_id == *o))
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.created_at, r.id));
        records
    }
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        // Resolve storage backend once; everything else sees only the trait
        let storage = build_storage(&config.storage).await?;

        let secret = match &config.auth.jwt_secret {
            Some(secret) => SigningSecret::new(secret.clone().into_bytes())
                .map_err(|e| anyhow::anyhow!("invalid auth.jwt_secret: {e}"))?,
            None => {
                tracing::warn!(
                    "auth.jwt_secret not set; using an ephemeral secret, tokens will not survive a restart"
                );
                SigningSecret::generate()?
            }
        };
        let tokens = TokenService::new(secret, Duration::from_secs(config.auth.token_ttl_secs));

        let hasher = CredentialHasher::new(config.auth.hash_cost)
            .map_err(|e| anyhow::anyhow!("invalid auth.hash_cost: {e}"))?;
        let decoy_hash = hasher.hash(&Uuid::new_v4().to_string())?;

        // Accounts and file metadata stay in memory; a relational store can
        // replace them behind the same interfaces
        let identities: Arc<dyn IdentityStore> = Arc::new(InMemoryIdentityStore::new());

        Ok(Self {
            storage,
            sessions: SessionAuthenticator::new(tokens, identities.clone()),
            identities,
            files: Arc::new(RwLock::new(FileStore::new())),
            hasher: Arc::new(hasher),
            decoy_hash,
            config: Arc::new(config.clone()),
        })
    }
}

async fn build_storage(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStorage>> {
    let storage: Arc<dyn ObjectStorage> = match config.backend.to_lowercase().as_str() {
        "local" => {
            let storage = LocalFileStorage::new(&config.local_path).await?;
            tracing::info!("Using local storage at {}", storage.root().display());
            Arc::new(storage)
        }
        "memory" => {
            tracing::warn!("Using in-memory storage - uploads are lost on restart");
            Arc::new(InMemoryStorage::new())
        }
        "s3" => build_s3(config).await?,
        other => {
            anyhow::bail!(
                "Unknown storage backend '{}'. Valid options: 'local', 's3', 'memory'",
                other
            );
        }
    };
    Ok(storage)
}

#[cfg(feature = "s3")]
async fn build_s3(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStorage>> {
    use docvault_storage::{S3Settings, S3Storage};

    let required = |value: &Option<String>, name: &str| {
        value
            .clone()
            .ok_or_else(|| anyhow::anyhow!("s3 storage requires storage.{name}"))
    };

    let settings = S3Settings {
        endpoint: required(&config.s3_endpoint, "s3_endpoint")?,
        region: config.s3_region.clone().unwrap_or_else(|| "us-east-1".into()),
        access_key: required(&config.s3_access_key, "s3_access_key")?,
        secret_key: required(&config.s3_secret_key, "s3_secret_key")?,
        bucket: required(&config.s3_bucket, "s3_bucket")?,
        prefix: config.s3_prefix.clone(),
    };
    tracing::info!(
        "Using S3 storage at {} (bucket {})",
        settings.endpoint,
        settings.bucket
    );

    let storage = S3Storage::connect(settings);
    storage.ensure_bucket().await?;
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "s3"))]
async fn build_s3(_config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStorage>> {
    anyhow::bail!("S3 storage requested but docvault-server was built without the `s3` feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(owner: IdentityId, created_at: u64) -> FileRecord {
        FileRecord {
            id: Uuid::new_v4(),
            owner_id: owner,
            name: "doc.pdf".into(),
            size: 0,
            storage_key: StorageKey::generate("pdf"),
            created_at,
        }
    }

    #[test]
    fn test_file_store_list_scoping() {
        let alice = IdentityId::new();
        let bob = IdentityId::new();
        let mut store = FileStore::new();
        store.insert(record(alice, 2));
        store.insert(record(alice, 1));
        store.insert(record(bob, 3));

        let owned = store.list(Some(&alice));
        assert_eq!(owned.len(), 2);
        assert!(owned[0].created_at <= owned[1].created_at);
        assert_eq!(store.list(None).len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_backend_rejected() {
        let config = StorageConfig {
            backend: "ftp".into(),
            ..Default::default()
        };
        assert!(build_storage(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_decoy_hash_uses_configured_cost() {
        let mut config: Config = figment::Figment::new().extract().unwrap();
        config.storage.backend = "memory".into();
        config.auth.jwt_secret = Some("secret".into());
        config.auth.hash_cost = docvault_auth::HashCost {
            memory_kib: 1024,
            iterations: 3,
            parallelism: 1,
        };
        let state = AppState::new(&config).await.unwrap();

        assert!(state.decoy_hash.as_str().contains("m=1024,t=3,p=1"));
        for guess in ["", "password123", state.decoy_hash.as_str()] {
            assert!(!state.hasher.verify(&state.decoy_hash, guess));
        }
    }

    #[tokio::test]
    async fn test_empty_secret_rejected() {
        let mut config: Config = figment::Figment::new().extract().unwrap();
        config.storage.backend = "memory".into();
        config.auth.jwt_secret = Some(String::new());
        assert!(AppState::new(&config).await.is_err());
    }
}
