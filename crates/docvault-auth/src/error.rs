//! Auth error types
//!
//! Each component has its own error enum. Token failures keep their precise
//! reason here for logs and tests; [`SessionError`] is the only shape that
//! reaches a caller.

use thiserror::Error;

pub type CredentialResult<T> = Result<T, CredentialError>;
pub type TokenResult<T> = Result<T, TokenError>;
pub type SessionResult<T> = Result<T, SessionError>;
pub type IdentityStoreResult<T> = Result<T, IdentityStoreError>;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password does not meet policy: {0}")]
    WeakPassword(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token signature invalid")]
    InvalidSignature,

    #[error("Token algorithm not accepted: {0}")]
    AlgorithmMismatch(String),

    #[error("Token expired")]
    Expired,

    #[error("Malformed token: {0}")]
    Malformed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Forbidden")]
    Forbidden,
}

/// Why a request ended up unauthenticated
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Missing credential")]
    MissingCredential,

    /// Any token verification failure; the reason is logged, not returned
    #[error("Invalid credential")]
    InvalidCredential,

    /// Token is genuine but its subject no longer exists
    #[error("Stale credential")]
    StaleCredential,

    #[error("Identity lookup failed: {0}")]
    IdentityStore(String),
}

#[derive(Debug, Error)]
pub enum IdentityStoreError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Identity store error: {0}")]
    Storage(String),
}
