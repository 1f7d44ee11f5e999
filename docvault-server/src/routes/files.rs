use crate::error::{ServerError, ServerResult};
use crate::state::{AppState, FileRecord};
use axum::{
    Extension, Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use chrono::{DateTime, Utc};
use docvault_auth::{Identity, IdentityId, authorize};
use docvault_storage::{ByteRange, StorageError, StorageKey};
use futures_util::TryStreamExt;
use http_body_util::LengthLimitError;
use serde::{Deserialize, Serialize};
use tokio_util::io::{ReaderStream, StreamReader};
use uuid::Uuid;

const PDF_EXTENSION: &str = "pdf";
const PDF_CONTENT_TYPE: &str = "application/pdf";
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Parse a `Range` header naming a single byte range
///
/// Anything else (other units, several ranges, bad syntax) yields `None`
/// and the whole object is served.
fn parse_range(value: &str) -> Option<ByteRange> {
    let spec = value.trim().strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }

    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());
    if start.is_empty() {
        return end.parse().ok().map(ByteRange::Suffix);
    }

    let start = start.parse().ok()?;
    let end = if end.is_empty() {
        None
    } else {
        Some(end.parse().ok()?)
    };
    Some(ByteRange::From { start, end })
}

fn not_modified_since(headers: &HeaderMap, modified: &DateTime<Utc>) -> bool {
    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .is_some_and(|since| modified.timestamp() <= since.timestamp())
}

/// Whether a failed upload was cut off by the request body limit
fn exceeds_body_limit(err: &std::io::Error) -> bool {
    let mut source = err
        .get_ref()
        .map(|e| e as &(dyn std::error::Error + 'static));
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

#[derive(Deserialize)]
pub struct CreateFileRequest {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Serialize)]
pub struct CreateFileResponse {
    #[serde(rename = "fileId")]
    pub file_id: Uuid,
    #[serde(rename = "uploadUrl")]
    pub upload_url: String,
    pub storage_key: String,
}

#[derive(Serialize)]
pub struct FileResponse {
    pub id: Uuid,
    pub owner_id: IdentityId,
    pub name: String,
    pub size: u64,
    pub storage_key: String,
    pub created_at: u64,
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
}

impl From<&FileRecord> for FileResponse {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id,
            owner_id: record.owner_id,
            name: record.name.clone(),
            size: record.size,
            storage_key: record.storage_key.to_string(),
            created_at: record.created_at,
            download_url: content_url(&record.id),
        }
    }
}

fn content_url(id: &Uuid) -> String {
    format!("/files/{id}/content")
}

/// Load a record and check the caller may touch it
async fn load_authorized(
    state: &AppState,
    identity: &Identity,
    id: &Uuid,
) -> ServerResult<FileRecord> {
    let record = state
        .files
        .read()
        .await
        .get(id)
        .cloned()
        .ok_or_else(|| ServerError::NotFound("file not found".into()))?;

    if let Err(e) = authorize(identity, &record.owner_id).require() {
        tracing::info!(file = %id, identity = %identity.id, "access denied");
        return Err(e.into());
    }
    Ok(record)
}

/// GET /files
///
/// Admins see every file; everyone else their own.
pub async fn list_files(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Json<Vec<FileResponse>> {
    let owner = (!identity.is_admin()).then_some(&identity.id);
    let files = state.files.read().await.list(owner);
    Json(files.iter().map(FileResponse::from).collect())
}

/// POST /files
/// Create metadata for a new document; content is uploaded separately
pub async fn create_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateFileRequest>,
) -> ServerResult<(StatusCode, Json<CreateFileResponse>)> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ServerError::BadRequest("name is required".into()));
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let record = FileRecord {
        id: Uuid::new_v4(),
        owner_id: identity.id,
        name: name.to_string(),
        size: body.size,
        storage_key: StorageKey::generate(PDF_EXTENSION),
        created_at: now,
    };
    let response = CreateFileResponse {
        file_id: record.id,
        upload_url: content_url(&record.id),
        storage_key: record.storage_key.to_string(),
    };

    tracing::info!(file = %record.id, owner = %identity.id, "file created");
    state.files.write().await.insert(record);

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /files/{id}
pub async fn get_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ServerResult<Json<FileResponse>> {
    let record = load_authorized(&state, &identity, &id).await?;
    Ok(Json(FileResponse::from(&record)))
}

/// PUT /files/{id}/content
/// Stream the request body into storage under the file's key
pub async fn upload_content(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    body: Body,
) -> ServerResult<StatusCode> {
    let record = load_authorized(&state, &identity, &id).await?;

    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let reader = StreamReader::new(stream);
    let written = match state.storage.put(&record.storage_key, Box::pin(reader)).await {
        Ok(written) => written,
        Err(StorageError::Io(e)) if exceeds_body_limit(&e) => {
            tracing::info!(file = %id, "upload rejected: body over limit");
            return Err(ServerError::PayloadTooLarge(format!(
                "upload exceeds {} bytes",
                state.config.max_upload_bytes
            )));
        }
        Err(e) => return Err(e.into()),
    };

    // Bytes and metadata are not committed atomically; a failure here leaves
    // the stored object without an updated size.
    if let Some(stored) = state.files.write().await.files.get_mut(&id) {
        stored.size = written;
    }

    tracing::info!(file = %id, bytes = written, "content uploaded");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /files/{id}/content
/// Stream the stored PDF back, honouring a single `Range` and
/// `If-Modified-Since`
pub async fn download_content(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let record = load_authorized(&state, &identity, &id).await?;

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range);
    let object = match range {
        Some(range) => state.storage.get_range(&record.storage_key, range).await?,
        None => state.storage.get(&record.storage_key).await?,
    };

    let modified = DateTime::<Utc>::from(object.last_modified);
    let last_modified = modified.format(HTTP_DATE).to_string();

    if not_modified_since(&headers, &modified) {
        return Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::LAST_MODIFIED, last_modified)
            .body(Body::empty())
            .map_err(|e| ServerError::Internal(e.to_string()));
    }

    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, PDF_CONTENT_TYPE)
        .header(header::CONTENT_LENGTH, object.body_len())
        .header(header::LAST_MODIFIED, last_modified)
        .header(header::ACCEPT_RANGES, "bytes");
    response = match object.range {
        Some((first, last)) => response.status(StatusCode::PARTIAL_CONTENT).header(
            header::CONTENT_RANGE,
            format!("bytes {first}-{last}/{}", object.size),
        ),
        None => response.status(StatusCode::OK),
    };

    response
        .body(Body::from_stream(ReaderStream::new(object.body)))
        .map_err(|e| ServerError::Internal(e.to_string()))
}

/// DELETE /files/{id}
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ServerResult<StatusCode> {
    let record = load_authorized(&state, &identity, &id).await?;

    // Content may never have been uploaded
    match state.storage.delete(&record.storage_key).await {
        Ok(()) | Err(StorageError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    state.files.write().await.remove(&id);

    tracing::info!(file = %id, identity = %identity.id, "file deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_ranges() {
        assert_eq!(
            parse_range("bytes=0-499"),
            Some(ByteRange::From { start: 0, end: Some(499) })
        );
        assert_eq!(
            parse_range("bytes=500-"),
            Some(ByteRange::From { start: 500, end: None })
        );
        assert_eq!(parse_range("bytes=-200"), Some(ByteRange::Suffix(200)));
    }

    #[test]
    fn test_unsupported_ranges_ignored() {
        for value in ["bytes=0-1,5-6", "items=0-1", "bytes=abc", "bytes=-", "bytes=1-x", ""] {
            assert_eq!(parse_range(value), None, "parsed {value:?}");
        }
    }

    #[tokio::test]
    async fn test_body_limit_detected_through_wrapping() {
        let body = Body::new(http_body_util::Limited::new(Body::from("0123456789"), 4));
        let err = body
            .into_data_stream()
            .map_err(std::io::Error::other)
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(exceeds_body_limit(&err));

        let other = axum::Error::new(std::io::Error::other("reset"));
        assert!(!exceeds_body_limit(&std::io::Error::other(other)));
    }

    #[test]
    fn test_not_modified_since() {
        let modified = DateTime::parse_from_rfc2822("Tue, 15 Nov 1994 08:12:31 GMT")
            .unwrap()
            .with_timezone(&Utc);

        let mut headers = HeaderMap::new();
        assert!(!not_modified_since(&headers, &modified));

        headers.insert(
            header::IF_MODIFIED_SINCE,
            "Tue, 15 Nov 1994 08:12:31 GMT".parse().unwrap(),
        );
        assert!(not_modified_since(&headers, &modified));

        headers.insert(
            header::IF_MODIFIED_SINCE,
            "Tue, 15 Nov 1994 08:12:30 GMT".parse().unwrap(),
        );
        assert!(!not_modified_since(&headers, &modified));
    }
}
