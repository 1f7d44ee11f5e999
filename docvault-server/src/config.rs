use std::fmt;

use docvault_auth::HashCost;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Deserialize, Clone)]
pub struct AuthConfig {
    /// HMAC signing secret; a random one is generated when unset
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub cookie_secure: bool,
    #[serde(default)]
    pub hash_cost: HashCost,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: default_token_ttl_secs(),
            cookie_name: default_cookie_name(),
            cookie_secure: false,
            hash_cost: HashCost::default(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_secure", &self.cookie_secure)
            .field("hash_cost", &self.hash_cost)
            .finish()
    }
}

#[derive(Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: String, // "memory", "local", "s3"
    #[serde(default = "default_local_path")]
    pub local_path: String,
    pub s3_bucket: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_region: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub s3_prefix: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local_path: default_local_path(),
            s3_bucket: None,
            s3_endpoint: None,
            s3_region: None,
            s3_access_key: None,
            s3_secret_key: None,
            s3_prefix: None,
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("local_path", &self.local_path)
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("s3_region", &self.s3_region)
            .field("s3_access_key", &self.s3_access_key)
            .field("s3_secret_key", &self.s3_secret_key.as_ref().map(|_| "<redacted>"))
            .field("s3_prefix", &self.s3_prefix)
            .finish()
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}
fn default_token_ttl_secs() -> u64 {
    24 * 60 * 60
}
fn default_cookie_name() -> String {
    "token".into()
}
fn default_backend() -> String {
    "local".into()
}
fn default_local_path() -> String {
    "./uploads".into()
}

impl Config {
    /// `docvault-server.toml`, overridden by `DOCVAULT_*` env vars
    /// (`DOCVAULT_STORAGE__BACKEND=s3` sets `storage.backend`)
    pub fn load() -> anyhow::Result<Self> {
        let config: Config = Figment::new()
            .merge(Toml::file("docvault-server.toml"))
            .merge(Env::prefixed("DOCVAULT_").split("__"))
            .extract()?;
        Ok(config)
    }
}
