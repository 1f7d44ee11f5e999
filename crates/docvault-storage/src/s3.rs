//! S3-compatible storage backend (Minio, AWS S3, Backblaze, etc.)

use std::time::SystemTime;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::key::StorageKey;
use crate::traits::{ByteRange, ObjectBody, ObjectStorage, StoredObject};

/// Connection settings for [`S3Storage::connect`]
#[derive(Clone, Debug)]
pub struct S3Settings {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Optional namespace prepended to every key
    pub prefix: Option<String>,
}

/// S3-compatible storage
///
/// Bucket structure:
/// ```text
/// {bucket}/
///   [{prefix}/]{key}
/// ```
///
/// Keys are opaque names in a flat namespace, so there is no traversal
/// concern here. Transport failures surface as `BackendUnavailable`, never as
/// `NotFound`.
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Storage {
    /// Create from existing AWS SDK client
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: None,
        }
    }

    /// Create with custom prefix (for namespacing)
    pub fn with_prefix(
        client: Client,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: Some(prefix.into()),
        }
    }

    /// Build a path-style client for an explicit endpoint
    pub fn connect(settings: S3Settings) -> Self {
        let creds = aws_sdk_s3::config::Credentials::new(
            settings.access_key,
            settings.secret_key,
            None,
            None,
            "docvault",
        );

        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(settings.endpoint)
            .region(aws_sdk_s3::config::Region::new(settings.region))
            .credentials_provider(creds)
            .force_path_style(true) // Required for Minio
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .build();

        Self {
            client: Client::from_conf(config),
            bucket: settings.bucket,
            prefix: settings.prefix.filter(|p| !p.is_empty()),
        }
    }

    /// Create configured for local Minio
    ///
    /// Expects environment variables:
    /// - `MINIO_ENDPOINT` (default: http://localhost:9000)
    /// - `MINIO_ACCESS_KEY` (default: minioadmin)
    /// - `MINIO_SECRET_KEY` (default: minioadmin)
    pub fn minio(bucket: impl Into<String>) -> Self {
        Self::connect(S3Settings {
            endpoint: std::env::var("MINIO_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:9000".into()),
            region: "us-east-1".into(),
            access_key: std::env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".into()),
            secret_key: std::env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".into()),
            bucket: bucket.into(),
            prefix: None,
        })
    }

    /// Ensure bucket exists (call on startup)
    pub async fn ensure_bucket(&self) -> StorageResult<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| classify("CREATE BUCKET", &self.bucket, e))?;
        Ok(())
    }

    fn object_key(&self, key: &StorageKey) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(&self, key: &StorageKey, mut body: ObjectBody) -> StorageResult<u64> {
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        let written = data.len() as u64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| classify("PUT", key.as_str(), e))?;

        debug!(%key, bytes = written, bucket = %self.bucket, "stored object");
        Ok(written)
    }

    async fn get(&self, key: &StorageKey) -> StorageResult<StoredObject> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| classify("GET", key.as_str(), e))?;

        Ok(StoredObject {
            size: object_size("GET", key, response.content_length())?,
            last_modified: system_time(response.last_modified()),
            body: Box::pin(response.body.into_async_read()),
            range: None,
        })
    }

    async fn get_range(&self, key: &StorageKey, range: ByteRange) -> StorageResult<StoredObject> {
        let object_key = self.object_key(key);

        // Resolve against the real size first so unsatisfiable ranges are
        // reported the same way as by the other backends
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| classify("HEAD", key.as_str(), e))?;
        let size = object_size("HEAD", key, head.content_length())?;
        let (first, last) = range
            .resolve(size)
            .ok_or(StorageError::RangeNotSatisfiable { size })?;

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .range(format!("bytes={first}-{last}"))
            .send()
            .await
            .map_err(|e| classify("GET", key.as_str(), e))?;

        Ok(StoredObject {
            size,
            last_modified: system_time(response.last_modified()),
            body: Box::pin(response.body.into_async_read()),
            range: Some((first, last)),
        })
    }

    async fn delete(&self, key: &StorageKey) -> StorageResult<()> {
        let object_key = self.object_key(key);

        // S3 DELETE succeeds for missing keys; HEAD first to report NotFound
        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| classify("HEAD", key.as_str(), e))?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| classify("DELETE", key.as_str(), e))?;

        debug!(%key, bucket = %self.bucket, "deleted object");
        Ok(())
    }
}

/// Object size from a response; a missing length would desync `Content-Length`
fn object_size(op: &str, key: &StorageKey, length: Option<i64>) -> StorageResult<u64> {
    length
        .and_then(|len| u64::try_from(len).ok())
        .ok_or_else(|| StorageError::Backend(format!("S3 {op} for {key} returned no content length")))
}

fn system_time(time: Option<&aws_sdk_s3::primitives::DateTime>) -> SystemTime {
    time.and_then(|t| SystemTime::try_from(*t).ok())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Sort an SDK failure into the storage error taxonomy
fn classify<E>(op: &str, key: &str, err: SdkError<E>) -> StorageError
where
    SdkError<E>: std::fmt::Display,
{
    match &err {
        SdkError::ServiceError(e) => match e.raw().status().as_u16() {
            404 => StorageError::NotFound(key.to_string()),
            code if code < 500 => StorageError::Backend(format!("S3 {op} failed: {err}")),
            _ => StorageError::BackendUnavailable(format!("S3 {op} failed: {err}")),
        },
        // Dispatch failures, timeouts and unparseable responses
        _ => StorageError::BackendUnavailable(format!("S3 {op} failed: {err}")),
    }
}
