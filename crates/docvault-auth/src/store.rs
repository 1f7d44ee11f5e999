//! Identity lookup

use async_trait::async_trait;

use crate::error::IdentityStoreResult;
use crate::identity::{Identity, IdentityId};

/// Account persistence as seen by the auth core
///
/// Implementations back onto whatever store holds accounts; the core only
/// needs lookups by id (sessions) and by email (login).
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Register a new identity
    ///
    /// Returns `IdentityStoreError::AlreadyExists` if the email is taken.
    async fn insert(&self, identity: Identity) -> IdentityStoreResult<()>;

    async fn find_by_id(&self, id: &IdentityId) -> IdentityStoreResult<Option<Identity>>;

    /// Lookup by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> IdentityStoreResult<Option<Identity>>;

    /// Remove an identity; tokens issued to it become stale
    ///
    /// Returns whether an identity was removed.
    async fn remove(&self, id: &IdentityId) -> IdentityStoreResult<bool>;
}
