//! Credential hashing: salted Argon2id PHC strings

use std::fmt;

use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use password_hash::SaltString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CredentialError, CredentialResult};

/// Minimum accepted password length at signup
pub const MIN_PASSWORD_LEN: usize = 8;

/// Stored password digest (PHC string format)
///
/// `Debug` never prints the digest.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap a PHC string loaded from storage
    ///
    /// Not validated here: malformed values simply never verify.
    pub fn from_phc(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// Argon2 cost parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashCost {
    /// Memory in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// One-way password hashing and verification
///
/// The cost only applies to new hashes; verification reads the parameters
/// embedded in the stored hash, so raising the cost keeps old accounts valid.
#[derive(Clone, Debug)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    pub fn new(cost: HashCost) -> CredentialResult<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| CredentialError::Hashing(format!("invalid cost parameters: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> CredentialResult<PasswordHash> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;

        let phc = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?
            .to_string();
        Ok(PasswordHash(phc))
    }

    /// Check a password against a stored hash
    ///
    /// Fails closed: a malformed or unsupported stored hash returns `false`.
    pub fn verify(&self, hash: &PasswordHash, password: &str) -> bool {
        match password_hash::PasswordHash::new(hash.as_str()) {
            Ok(parsed) => self
                .argon2()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                debug!("stored password hash unparseable: {e}");
                false
            }
        }
    }

    /// [`verify`](Self::verify) as a `Result`, for `?` at call sites
    pub fn check(&self, hash: &PasswordHash, password: &str) -> CredentialResult<()> {
        if self.verify(hash, password) {
            Ok(())
        } else {
            Err(CredentialError::InvalidCredentials)
        }
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

/// Signup password rule
pub fn check_password_policy(password: &str) -> CredentialResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CredentialError::WeakPassword(format!(
            "must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cheap parameters so the suite stays fast
    fn hasher() -> CredentialHasher {
        CredentialHasher::new(HashCost {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_hash_verify() {
        let hasher = hasher();
        let hash = hasher.hash("correct horse").unwrap();

        assert!(hash.as_str().starts_with("$argon2id$"));
        assert!(hasher.verify(&hash, "correct horse"));
        assert!(!hasher.verify(&hash, "correct horsf"));
        assert!(hasher.check(&hash, "wrong").is_err());
    }

    #[test]
    fn test_salts_differ() {
        let hasher = hasher();
        let a = hasher.hash("same password").unwrap();
        let b = hasher.hash("same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_fails_closed() {
        let hasher = hasher();
        for stored in ["", "plaintext", "$argon2id$v=19$m=bad", "$2b$10$abcdefghijklmnopqrstuv"] {
            assert!(!hasher.verify(&PasswordHash::from_phc(stored), "plaintext"));
        }
    }

    #[test]
    fn test_verify_uses_embedded_cost() {
        let cheap = hasher();
        let hash = cheap.hash("password123").unwrap();

        let stronger = CredentialHasher::new(HashCost {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(stronger.verify(&hash, "password123"));
    }

    #[test]
    fn test_invalid_cost_rejected() {
        let result = CredentialHasher::new(HashCost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 0,
        });
        assert!(matches!(result, Err(CredentialError::Hashing(_))));
    }

    #[test]
    fn test_debug_is_redacted() {
        let hash = hasher().hash("secret-password").unwrap();
        assert_eq!(format!("{hash:?}"), "PasswordHash(<redacted>)");
    }

    #[test]
    fn test_password_policy() {
        assert!(check_password_policy("short").is_err());
        assert!(check_password_policy("longenough").is_ok());
    }
}
