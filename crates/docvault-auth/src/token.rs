//! Bearer tokens: HMAC-SHA256 signed, self-contained, time-bounded
//!
//! Wire format (JWT compatible):
//!
//! ```text
//! base64url(header) "." base64url(claims) "." base64url(HMAC-SHA256(secret, header "." claims))
//! ```
//!
//! The header is always `{"alg":"HS256","typ":"JWT"}`. Verification pins the
//! algorithm before touching the MAC, so `none` or asymmetric headers are
//! rejected outright.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD as B64};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{TokenError, TokenResult};

type HmacSha256 = Hmac<Sha256>;

/// The only accepted algorithm identifier
pub const ALGORITHM: &str = "HS256";

const TOKEN_TYPE: &str = "JWT";
const SEGMENT_DELIMITER: char = '.';

/// Process-wide signing key
///
/// `Debug` never prints the key material.
#[derive(Clone)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> TokenResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(TokenError::Malformed("signing secret must not be empty".into()));
        }
        Ok(Self(secret))
    }

    /// 32 random bytes from the OS
    pub fn generate() -> TokenResult<Self> {
        let mut bytes = vec![0u8; 32];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| TokenError::Malformed(format!("secret generation failed: {e}")))?;
        Ok(Self(bytes))
    }

    fn mac(&self) -> TokenResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.0)
            .map_err(|e| TokenError::Malformed(format!("unusable signing secret: {e}")))
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Token payload; times are Unix seconds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Sign a token for `subject`, issued now and valid until `expires_at`
pub fn issue(subject: &str, secret: &SigningSecret, expires_at: u64) -> TokenResult<String> {
    issue_at(subject, secret, unix_now(), expires_at)
}

/// [`issue`] with an explicit issue time
pub fn issue_at(
    subject: &str,
    secret: &SigningSecret,
    issued_at: u64,
    expires_at: u64,
) -> TokenResult<String> {
    if subject.is_empty() {
        return Err(TokenError::Malformed("empty subject".into()));
    }

    let header = Header {
        alg: ALGORITHM.into(),
        typ: TOKEN_TYPE.into(),
    };
    let claims = Claims {
        sub: subject.into(),
        iat: issued_at,
        exp: expires_at,
    };

    let header = encode_segment(&header)?;
    let claims = encode_segment(&claims)?;
    let signing_input = format!("{header}{SEGMENT_DELIMITER}{claims}");

    let mut mac = secret.mac()?;
    mac.update(signing_input.as_bytes());
    let signature = B64.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}{SEGMENT_DELIMITER}{signature}"))
}

/// Verify a token and return its subject
pub fn verify(token: &str, secret: &SigningSecret) -> TokenResult<String> {
    verify_at(token, secret, unix_now()).map(|claims| claims.sub)
}

/// Verify a token against an explicit clock and return all claims
///
/// Checks, in order: structure, algorithm pin, MAC, claims, expiry. A token
/// is expired once `now >= exp`.
pub fn verify_at(token: &str, secret: &SigningSecret, now: u64) -> TokenResult<Claims> {
    let mut segments = token.split(SEGMENT_DELIMITER);
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed("expected three segments".into()));
    };

    let header: Header = decode_segment(header_b64)?;
    if header.alg != ALGORITHM {
        return Err(TokenError::AlgorithmMismatch(header.alg));
    }

    let signature = B64
        .decode(signature_b64)
        .map_err(|_| TokenError::InvalidSignature)?;
    let signing_input_len = header_b64.len() + 1 + claims_b64.len();
    let mut mac = secret.mac()?;
    mac.update(&token.as_bytes()[..signing_input_len]);
    // Constant-time comparison
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let claims: Claims = decode_segment(claims_b64)?;
    if claims.sub.is_empty() {
        return Err(TokenError::Malformed("empty subject".into()));
    }
    if now >= claims.exp {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

fn encode_segment<T: Serialize>(value: &T) -> TokenResult<String> {
    let json = serde_json::to_vec(value).map_err(|e| TokenError::Malformed(e.to_string()))?;
    Ok(B64.encode(json))
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> TokenResult<T> {
    let bytes = B64
        .decode(segment)
        .map_err(|e| TokenError::Malformed(format!("bad base64: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(format!("bad json: {e}")))
}

/// Issues and verifies tokens with the process-wide secret and lifetime
#[derive(Clone, Debug)]
pub struct TokenService {
    secret: SigningSecret,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: SigningSecret, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Token for `subject` expiring `ttl` from now
    pub fn issue_token(&self, subject: &str) -> TokenResult<String> {
        let now = unix_now();
        issue_at(subject, &self.secret, now, now.saturating_add(self.ttl.as_secs()))
    }

    pub fn verify(&self, token: &str) -> TokenResult<String> {
        verify(token, &self.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SigningSecret {
        SigningSecret::new(s.as_bytes()).unwrap()
    }

    const NOW: u64 = 1_700_000_000;

    #[test]
    fn test_issue_verify() {
        let token = issue_at("1234", &secret("testsecret"), NOW, NOW + 60).unwrap();
        let claims = verify_at(&token, &secret("testsecret"), NOW + 1).unwrap();

        assert_eq!(claims.sub, "1234");
        assert_eq!(claims.iat, NOW);
        assert_eq!(claims.exp, NOW + 60);
    }

    #[test]
    fn test_verify_with_system_clock() {
        let token = issue("u1", &secret("s"), unix_now() + 60).unwrap();
        assert_eq!(verify(&token, &secret("s")).unwrap(), "u1");
    }

    #[test]
    fn test_wire_format() {
        let token = issue_at("u1", &secret("s"), NOW, NOW + 60).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        assert!(!token.contains('=') && !token.contains('+') && !token.contains('/'));

        let header: serde_json::Value =
            serde_json::from_slice(&B64.decode(segments[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");

        let claims: serde_json::Value =
            serde_json::from_slice(&B64.decode(segments[1]).unwrap()).unwrap();
        assert_eq!(claims["sub"], "u1");
        assert!(claims["iat"].is_u64());
        assert!(claims["exp"].is_u64());
    }

    #[test]
    fn test_wrong_secret() {
        let token = issue_at("u1", &secret("one"), NOW, NOW + 60).unwrap();
        assert_eq!(
            verify_at(&token, &secret("two"), NOW),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_expired_after_one_minute() {
        let token = issue_at("u1", &secret("s"), NOW, NOW + 60).unwrap();
        assert!(verify_at(&token, &secret("s"), NOW + 59).is_ok());
        assert_eq!(
            verify_at(&token, &secret("s"), NOW + 60),
            Err(TokenError::Expired)
        );
        assert_eq!(
            verify_at(&token, &secret("s"), NOW + 3600),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_tampered_claims() {
        let token = issue_at("u1", &secret("s"), NOW, NOW + 60).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        let forged_claims = B64.encode(br#"{"sub":"admin","iat":0,"exp":99999999999}"#);
        let forged = format!("{}.{}.{}", segments[0], forged_claims, segments[2]);

        assert_eq!(
            verify_at(&forged, &secret("s"), NOW),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_algorithm_none_rejected() {
        let header = B64.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = B64.encode(br#"{"sub":"u1","iat":0,"exp":99999999999}"#);
        let token = format!("{header}.{claims}.");

        assert_eq!(
            verify_at(&token, &secret("s"), NOW),
            Err(TokenError::AlgorithmMismatch("none".into()))
        );
    }

    #[test]
    fn test_other_algorithms_rejected() {
        for alg in ["RS256", "HS512", "hs256"] {
            let header = B64.encode(format!(r#"{{"alg":"{alg}","typ":"JWT"}}"#));
            let claims = B64.encode(br#"{"sub":"u1","iat":0,"exp":99999999999}"#);
            let token = format!("{header}.{claims}.AAAA");
            assert!(matches!(
                verify_at(&token, &secret("s"), NOW),
                Err(TokenError::AlgorithmMismatch(_))
            ));
        }
    }

    #[test]
    fn test_malformed_tokens() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.e30.sig"] {
            assert!(
                matches!(
                    verify_at(token, &secret("s"), NOW),
                    Err(TokenError::Malformed(_))
                ),
                "accepted {token:?}"
            );
        }
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(SigningSecret::new(Vec::<u8>::new()).is_err());
        assert!(SigningSecret::generate().is_ok());
    }

    #[test]
    fn test_token_service() {
        let service = TokenService::new(secret("svc"), Duration::from_secs(300));
        let token = service.issue_token("u42").unwrap();
        assert_eq!(service.verify(&token).unwrap(), "u42");

        let claims = verify_at(&token, &secret("svc"), unix_now()).unwrap();
        assert_eq!(claims.exp - claims.iat, 300);
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        assert_eq!(format!("{:?}", secret("hunter2")), "SigningSecret(<redacted>)");
    }
}
