//! Blob store configuration.
//!
//! Selects a backend and, for Walrus, the publisher and aggregator base URLs.
//! Defaults point to the public Walrus testnet. Override via environment
//! variables or explicit construction for local runs and tests.

use std::path::PathBuf;

use url::Url;
use zeroize::Zeroizing;

/// Public Walrus testnet publisher.
pub const DEFAULT_PUBLISHER_URL: &str = "https://publisher.walrus-testnet.walrus.space";
/// Public Walrus testnet aggregator.
pub const DEFAULT_AGGREGATOR_URL: &str = "https://aggregator.walrus-testnet.walrus.space";

/// Which blob store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobBackend {
    /// Walrus publisher/aggregator over HTTP.
    Walrus,
    /// Content-addressed files under `data_dir`.
    Local,
    /// Process memory. Lost on restart.
    Memory,
}

impl BlobBackend {
    /// Parse a backend name (`walrus`, `local`, `memory`), case-insensitive.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walrus" => Ok(Self::Walrus),
            "local" => Ok(Self::Local),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Configuration for connecting to a blob store.
///
/// Custom `Debug` implementation redacts the `publisher_token` field.
#[derive(Clone)]
pub struct BlobStoreConfig {
    /// Backend selection.
    pub backend: BlobBackend,
    /// Base URL of the Walrus publisher (writes).
    pub publisher_url: Url,
    /// Base URL of the Walrus aggregator (reads).
    pub aggregator_url: Url,
    /// Storage duration requested for each blob, in epochs.
    pub epochs: u32,
    /// Bearer token for publishers that require one.
    pub publisher_token: Option<Zeroizing<String>>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Root directory for the local backend.
    pub data_dir: PathBuf,
}

impl std::fmt::Debug for BlobStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStoreConfig")
            .field("backend", &self.backend)
            .field("publisher_url", &self.publisher_url)
            .field("aggregator_url", &self.aggregator_url)
            .field("epochs", &self.epochs)
            .field(
                "publisher_token",
                &self.publisher_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout_secs", &self.timeout_secs)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

impl BlobStoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `BLOB_BACKEND` (`walrus` | `local` | `memory`, default: `walrus`)
    /// - `BLOB_PUBLISHER_URL` (default: Walrus testnet publisher)
    /// - `BLOB_AGGREGATOR_URL` (default: Walrus testnet aggregator)
    /// - `BLOB_EPOCHS` (default: 1)
    /// - `BLOB_PUBLISHER_TOKEN` (optional)
    /// - `BLOB_TIMEOUT_SECS` (default: 60)
    /// - `DATA_DIR` (default: `./data`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match std::env::var("BLOB_BACKEND") {
            Ok(v) => BlobBackend::parse(&v)?,
            Err(_) => BlobBackend::Walrus,
        };
        Ok(Self {
            backend,
            publisher_url: env_url("BLOB_PUBLISHER_URL", DEFAULT_PUBLISHER_URL)?,
            aggregator_url: env_url("BLOB_AGGREGATOR_URL", DEFAULT_AGGREGATOR_URL)?,
            epochs: env_parse("BLOB_EPOCHS", 1)?,
            publisher_token: std::env::var("BLOB_PUBLISHER_TOKEN")
                .ok()
                .filter(|t| !t.is_empty())
                .map(Zeroizing::new),
            timeout_secs: env_parse("BLOB_TIMEOUT_SECS", 60)?,
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
        })
    }

    /// A Walrus configuration with publisher and aggregator both at `base`
    /// (for testing against a mock server).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `base` cannot be parsed.
    pub fn local_mock(base: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(base)
            .map_err(|e| ConfigError::InvalidUrl("mock".to_string(), e.to_string()))?;
        Ok(Self {
            backend: BlobBackend::Walrus,
            publisher_url: url.clone(),
            aggregator_url: url,
            epochs: 1,
            publisher_token: None,
            timeout_secs: 5,
            data_dir: PathBuf::from("./data"),
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(var.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid number for {0}: {1:?}")]
    InvalidNumber(String, String),
    #[error("unknown blob backend {0:?} (expected walrus, local or memory)")]
    UnknownBackend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_builds_valid_config() {
        let cfg = BlobStoreConfig::local_mock("http://127.0.0.1:9000").unwrap();
        assert_eq!(cfg.backend, BlobBackend::Walrus);
        assert_eq!(cfg.publisher_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(cfg.aggregator_url, cfg.publisher_url);
        assert_eq!(cfg.timeout_secs, 5);
    }

    #[test]
    fn backend_names() {
        assert_eq!(BlobBackend::parse("Walrus").unwrap(), BlobBackend::Walrus);
        assert_eq!(BlobBackend::parse(" local ").unwrap(), BlobBackend::Local);
        assert_eq!(BlobBackend::parse("memory").unwrap(), BlobBackend::Memory);
        assert!(matches!(
            BlobBackend::parse("s3"),
            Err(ConfigError::UnknownBackend(_))
        ));
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("NONEXISTENT_VAR_BLOB_12345", "https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn env_url_rejects_invalid_url() {
        std::env::set_var("TEST_BAD_URL_BLOB", "not a url");
        let result = env_url("TEST_BAD_URL_BLOB", "https://example.com");
        std::env::remove_var("TEST_BAD_URL_BLOB");
        assert!(result.is_err());
    }

    #[test]
    fn env_parse_rejects_garbage() {
        std::env::set_var("TEST_BAD_EPOCHS_BLOB", "many");
        let result: Result<u32, _> = env_parse("TEST_BAD_EPOCHS_BLOB", 1);
        std::env::remove_var("TEST_BAD_EPOCHS_BLOB");
        assert!(matches!(result, Err(ConfigError::InvalidNumber(..))));
    }

    #[test]
    fn debug_redacts_token() {
        let mut cfg = BlobStoreConfig::local_mock("http://127.0.0.1:9000").unwrap();
        cfg.publisher_token = Some(Zeroizing::new("super-secret".to_string()));
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
