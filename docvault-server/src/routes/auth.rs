use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use docvault_auth::{
    CredentialError, Identity, IdentityId, IdentityStoreError, Role, check_password_policy,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct IdentityResponse {
    pub id: IdentityId,
    pub email: String,
    pub role: Role,
    pub created_at: u64,
}

impl From<&Identity> for IdentityResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            role: identity.role,
            created_at: identity.created_at,
        }
    }
}

fn looks_like_email(email: &str) -> bool {
    matches!(email.trim().split_once('@'), Some((local, domain)) if !local.is_empty() && domain.contains('.'))
}

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> ServerResult<(StatusCode, Json<serde_json::Value>)> {
    if !looks_like_email(&body.email) {
        return Err(ServerError::BadRequest("invalid email".into()));
    }
    check_password_policy(&body.password).map_err(|e| ServerError::BadRequest(e.to_string()))?;

    // Argon2 is CPU-bound; keep it off the async workers
    let hasher = state.hasher.clone();
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&body.password))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(|e| ServerError::Internal(format!("unable to create user: {e}")))?;

    let identity = Identity::new(&body.email, password_hash);
    let id = identity.id;
    state.identities.insert(identity).await.map_err(|e| match e {
        IdentityStoreError::AlreadyExists(_) => {
            ServerError::Conflict("email already registered".into())
        }
        other => ServerError::Internal(other.to_string()),
    })?;

    tracing::info!(%id, "account created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "user created", "id": id })),
    ))
}

/// POST /auth/login
///
/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> ServerResult<impl IntoResponse> {
    let invalid = || ServerError::Unauthorized("invalid credentials".into());

    let identity = state
        .identities
        .find_by_email(&body.email)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    // Unknown emails are checked against the decoy so both failures take
    // one hash's worth of time
    let hasher = state.hasher.clone();
    let stored = identity
        .as_ref()
        .map_or_else(|| state.decoy_hash.clone(), |i| i.password_hash.clone());
    let verified = tokio::task::spawn_blocking(move || hasher.check(&stored, &body.password))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    let identity = match (identity, verified) {
        (Some(identity), Ok(())) => identity,
        (None, Ok(())) | (None, Err(CredentialError::InvalidCredentials)) => {
            tracing::debug!("login for unknown email");
            return Err(invalid());
        }
        (Some(identity), Err(CredentialError::InvalidCredentials)) => {
            tracing::debug!(id = %identity.id, "password mismatch");
            return Err(invalid());
        }
        (_, Err(e)) => return Err(ServerError::Internal(e.to_string())),
    };

    let token = state
        .sessions
        .issue_token(&identity.id)
        .map_err(|e| ServerError::Internal(format!("failed to create token: {e}")))?;

    let auth = &state.config.auth;
    let cookie = session_cookie(&auth.cookie_name, &token, auth.token_ttl_secs, auth.cookie_secure);

    tracing::info!(id = %identity.id, "logged in");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "message": "logged in", "token": token })),
    ))
}

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let auth = &state.config.auth;
    let cookie = session_cookie(&auth.cookie_name, "", 0, auth.cookie_secure);
    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "message": "logged out" })),
    )
}

/// GET /me
pub async fn me(Extension(identity): Extension<Identity>) -> Json<IdentityResponse> {
    Json(IdentityResponse::from(&identity))
}

fn session_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
