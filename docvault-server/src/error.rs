use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use docvault_auth::{AuthzError, SessionError};
use docvault_storage::StorageError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Carries the full object size for `Content-Range: bytes */{size}`
    #[error("Range not satisfiable")]
    RangeNotSatisfiable(u64),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ServerError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".into()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            ServerError::RangeNotSatisfiable(size) => {
                return (
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    [(header::CONTENT_RANGE, format!("bytes */{size}"))],
                    Json(json!({ "error": "range not satisfiable" })),
                )
                    .into_response();
            }
            ServerError::Unavailable(msg) => {
                tracing::warn!("Backend unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Storage backend unavailable".into(),
                )
            }
            ServerError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ServerError::NotFound("content not found".into()),
            StorageError::InvalidKey(_) => ServerError::BadRequest("invalid storage key".into()),
            StorageError::RangeNotSatisfiable { size } => ServerError::RangeNotSatisfiable(size),
            StorageError::BackendUnavailable(msg) => ServerError::Unavailable(msg),
            other => ServerError::Internal(format!("Storage error: {other}")),
        }
    }
}

impl From<SessionError> for ServerError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MissingCredential => ServerError::Unauthorized("missing token".into()),
            SessionError::InvalidCredential => ServerError::Unauthorized("invalid token".into()),
            SessionError::StaleCredential => ServerError::Unauthorized("user not found".into()),
            SessionError::IdentityStore(msg) => ServerError::Internal(msg),
        }
    }
}

impl From<AuthzError> for ServerError {
    fn from(_: AuthzError) -> Self {
        ServerError::Forbidden
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_map_to_distinct_statuses() {
        let cases = [
            (StorageError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (StorageError::InvalidKey("k".into()), StatusCode::BAD_REQUEST),
            (
                StorageError::BackendUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                StorageError::RangeNotSatisfiable { size: 10 },
                StatusCode::RANGE_NOT_SATISFIABLE,
            ),
            (
                StorageError::Backend("denied".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_session_errors_are_unauthorized() {
        for err in [
            SessionError::MissingCredential,
            SessionError::InvalidCredential,
            SessionError::StaleCredential,
        ] {
            assert_eq!(
                ServerError::from(err).into_response().status(),
                StatusCode::UNAUTHORIZED
            );
        }
    }

    #[test]
    fn test_unsatisfiable_range_reports_size() {
        let response = ServerError::RangeNotSatisfiable(1234).into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1234");
    }
}
