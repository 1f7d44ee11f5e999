//! Resource access decisions

use crate::error::AuthzError;
use crate::identity::{Identity, IdentityId, Role};

/// Outcome of an access check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }

    /// `Deny` as `AuthzError::Forbidden`, for `?` at call sites
    pub fn require(self) -> Result<(), AuthzError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(AuthzError::Forbidden),
        }
    }
}

/// Admins may touch anything; everyone else only what they own.
///
/// Must be consulted before any resource-scoped metadata or storage access.
pub fn authorize(identity: &Identity, resource_owner: &IdentityId) -> Decision {
    if identity.role == Role::Admin || identity.id == *resource_owner {
        Decision::Allow
    } else {
        Decision::Deny
    }
}
