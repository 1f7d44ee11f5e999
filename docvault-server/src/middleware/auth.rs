use crate::error::ServerError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header::{AUTHORIZATION, COOKIE, HeaderMap},
    middleware::Next,
    response::Response,
};

const BEARER_PREFIX: &str = "Bearer ";

/// Bearer token presented by the client, if any
///
/// `Authorization: Bearer <token>` wins over the session cookie.
pub fn extract_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer.or_else(|| cookie_value(headers, cookie_name))
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// Middleware that authenticates the request and attaches the caller's
/// [`Identity`](docvault_auth::Identity) as a request extension
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let token = extract_token(request.headers(), &state.config.auth.cookie_name).map(str::to_owned);

    let identity = state.sessions.authenticate(token.as_deref()).await?;
    tracing::debug!(identity = %identity.id, "request authenticated");

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; token=abc.def.ghi"));
        assert_eq!(extract_token(&headers, "token"), Some("abc.def.ghi"));
        assert_eq!(extract_token(&headers, "session"), None);
    }

    #[test]
    fn test_bearer_header_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("token=from-cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_token(&headers, "token"), Some("from-header"));
    }

    #[test]
    fn test_empty_values_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        headers.insert(COOKIE, HeaderValue::from_static("token="));
        assert_eq!(extract_token(&headers, "token"), None);
    }
}
