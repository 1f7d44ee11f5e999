//! Request authentication: token -> identity
//!
//! Each request is evaluated on its own. Nothing is cached between requests,
//! so a deleted identity is locked out on its very next request.

use std::sync::Arc;

use tracing::debug;

use crate::error::{SessionError, SessionResult, TokenResult};
use crate::identity::{Identity, IdentityId};
use crate::store::IdentityStore;
use crate::token::TokenService;

/// Resolves bearer tokens to identities for the transport layer
#[derive(Clone)]
pub struct SessionAuthenticator {
    tokens: TokenService,
    identities: Arc<dyn IdentityStore>,
}

impl SessionAuthenticator {
    pub fn new(tokens: TokenService, identities: Arc<dyn IdentityStore>) -> Self {
        Self { tokens, identities }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Token for a freshly authenticated identity
    pub fn issue_token(&self, id: &IdentityId) -> TokenResult<String> {
        self.tokens.issue_token(&id.to_string())
    }

    /// Authenticate a request from the token it presented (if any)
    ///
    /// Every token verification failure comes back as
    /// `SessionError::InvalidCredential`; the precise reason is only logged.
    pub async fn authenticate(&self, token: Option<&str>) -> SessionResult<Identity> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Err(SessionError::MissingCredential);
        };

        let subject = self.tokens.verify(token).map_err(|reason| {
            debug!(%reason, "bearer token rejected");
            SessionError::InvalidCredential
        })?;

        let id: IdentityId = subject.parse().map_err(|_| {
            debug!(%subject, "token subject is not an identity id");
            SessionError::InvalidCredential
        })?;

        match self.identities.find_by_id(&id).await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => {
                debug!(%id, "token subject no longer exists");
                Err(SessionError::StaleCredential)
            }
            Err(e) => Err(SessionError::IdentityStore(e.to_string())),
        }
    }
}
