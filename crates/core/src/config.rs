//! Configuration management for Tessera.
//!
//! Configuration is read once at startup (TOML file, then environment
//! overrides), validated, and then treated as immutable for the lifetime of
//! the process.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Argon2 memory cost ceiling (4 GiB expressed in KiB).
const MAX_MEMORY_KIB: u32 = 4 * 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub issuer: IssuerConfig,
    pub store: StoreConfig,
    pub notifier: NotifierConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Take the client address from `X-Forwarded-For` when present.
    ///
    /// Only enable behind a reverse proxy that overwrites the header; a
    /// directly reachable client could otherwise claim any bound address.
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            trust_forwarded_for: false,
        }
    }
}

/// Longest accepted access or renewal lifetime (100 years).
///
/// Keeps `issued_at + ttl` in milliseconds well inside `i64`, the column
/// type of the durable store.
pub const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Settings shared by every credential the issuer mints.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// HMAC key for access credentials
    pub access_secret: String,
    /// Argon2 keyed secret (pepper) for renewal credential hashes
    pub renewal_secret: String,
    pub access_ttl_secs: u64,
    pub renewal_ttl_secs: u64,
    /// Verify the renewal secret before reporting consumed/expired state.
    pub verify_secret_first: bool,
    pub hashing: HashingConfig,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            renewal_secret: String::new(),
            access_ttl_secs: 15 * 60,
            renewal_ttl_secs: 7 * 24 * 60 * 60,
            verify_secret_first: true,
            hashing: HashingConfig::default(),
        }
    }
}

// Secrets stay out of Debug output.
impl std::fmt::Debug for IssuerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerConfig")
            .field("access_secret", &"<redacted>")
            .field("renewal_secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("renewal_ttl_secs", &self.renewal_ttl_secs)
            .field("verify_secret_first", &self.verify_secret_first)
            .field("hashing", &self.hashing)
            .finish()
    }
}

impl IssuerConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn renewal_ttl(&self) -> Duration {
        Duration::from_secs(self.renewal_ttl_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.access_secret.is_empty() {
            return Err(CoreError::Config("issuer.access_secret must not be empty".into()));
        }
        if self.renewal_secret.is_empty() {
            return Err(CoreError::Config("issuer.renewal_secret must not be empty".into()));
        }
        if self.access_ttl_secs == 0 {
            return Err(CoreError::Config("issuer.access_ttl_secs must be positive".into()));
        }
        if self.renewal_ttl_secs == 0 {
            return Err(CoreError::Config("issuer.renewal_ttl_secs must be positive".into()));
        }
        if self.access_ttl_secs > MAX_TTL_SECS {
            return Err(CoreError::Config(format!(
                "issuer.access_ttl_secs must not exceed {MAX_TTL_SECS}"
            )));
        }
        if self.renewal_ttl_secs > MAX_TTL_SECS {
            return Err(CoreError::Config(format!(
                "issuer.renewal_ttl_secs must not exceed {MAX_TTL_SECS}"
            )));
        }
        self.hashing.validate()
    }
}

/// Argon2id cost parameters for renewal credential hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        // OWASP baseline for Argon2id
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl HashingConfig {
    /// Minimal cost, for tests only.
    pub fn for_tests() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 || self.iterations == 0 {
            return Err(CoreError::Config(
                "issuer.hashing iterations and parallelism must be positive".into(),
            ));
        }
        // Argon2 requires at least 8 KiB per lane.
        if self.memory_kib < 8 * self.parallelism || self.memory_kib > MAX_MEMORY_KIB {
            return Err(CoreError::Config(format!(
                "issuer.hashing.memory_kib out of range: {}",
                self.memory_kib
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from("data/tessera.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub enabled: bool,
    /// Contact used when no directory entry exists for a subject.
    pub fallback_contact: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fallback_contact: "security@example.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl Config {
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))
    }

    pub fn default_config() -> Self {
        Self::default()
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary lookup. TTL variables are in minutes.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("SERVER_PORT") {
            self.server.port = parse_env("SERVER_PORT", &port)?;
        }
        if let Some(secret) = lookup("JWT_ACCESS_SECRET") {
            self.issuer.access_secret = secret;
        }
        if let Some(secret) = lookup("JWT_REFRESH_SECRET") {
            self.issuer.renewal_secret = secret;
        }
        if let Some(minutes) = lookup("JWT_ACCESS_TTL") {
            let minutes: u64 = parse_env("JWT_ACCESS_TTL", &minutes)?;
            self.issuer.access_ttl_secs = minutes.saturating_mul(60);
        }
        if let Some(minutes) = lookup("JWT_REFRESH_TTL") {
            let minutes: u64 = parse_env("JWT_REFRESH_TTL", &minutes)?;
            self.issuer.renewal_ttl_secs = minutes.saturating_mul(60);
        }
        if let Some(path) = lookup("TESSERA_DB_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(contact) = lookup("TESSERA_ALERT_CONTACT") {
            self.notifier.fallback_contact = contact;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.issuer.validate()?;
        if self.notifier.enabled && self.notifier.fallback_contact.is_empty() {
            return Err(CoreError::Config(
                "notifier.fallback_contact must be set when notifications are enabled".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::Config(format!("{key} has an invalid value: {value:?}")))
}
