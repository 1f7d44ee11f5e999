//! docvault-auth: Authentication and authorization core
//!
//! Components, leaves first:
//!
//! | Module         | Role                                                    |
//! |----------------|---------------------------------------------------------|
//! | [`password`]   | Argon2id credential hashing, fail-closed verification   |
//! | [`token`]      | HMAC-SHA256 bearer tokens with algorithm pinning        |
//! | [`authz`]      | Owner-or-admin access decisions                         |
//! | [`session`]    | Token + identity lookup -> authenticated identity       |
//!
//! All of these are stateless apart from the signing secret and cost
//! parameters fixed at startup, so they can be shared freely across tasks.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::{sync::Arc, time::Duration};
//! use docvault_auth::{
//!     CredentialHasher, Identity, IdentityStore, InMemoryIdentityStore,
//!     SessionAuthenticator, SigningSecret, TokenService, authorize,
//! };
//!
//! let store = Arc::new(InMemoryIdentityStore::new());
//! let hasher = CredentialHasher::default();
//! let alice = Identity::new("alice@example.com", hasher.hash("correct horse")?);
//! store.insert(alice.clone()).await?;
//!
//! let sessions = SessionAuthenticator::new(
//!     TokenService::new(SigningSecret::generate()?, Duration::from_secs(3600)),
//!     store,
//! );
//! let token = sessions.issue_token(&alice.id)?;
//! let identity = sessions.authenticate(Some(&token)).await?;
//! authorize(&identity, &alice.id).require()?;
//! ```

pub mod authz;
mod error;
mod identity;
pub mod memory;
pub mod password;
pub mod session;
mod store;
pub mod token;

// Re-exports
pub use authz::{Decision, authorize};
pub use error::{
    AuthzError, CredentialError, CredentialResult, IdentityStoreError, IdentityStoreResult,
    SessionError, SessionResult, TokenError, TokenResult,
};
pub use identity::{Identity, IdentityId, Role, normalize_email};
pub use memory::InMemoryIdentityStore;
pub use password::{CredentialHasher, HashCost, PasswordHash, check_password_policy};
pub use session::SessionAuthenticator;
pub use store::IdentityStore;
pub use token::{Claims, SigningSecret, TokenService};
