//! # Server Configuration
//!
//! Every knob comes from an environment variable with a default suited to a
//! local run next to the dashboard:
//!
//! | Variable                | Default                      |
//! |-------------------------|------------------------------|
//! | `PORT`                  | `8000`                       |
//! | `BIND_ADDR`             | `127.0.0.1`                  |
//! | `AUTH_TOKEN`            | unset (auth disabled)        |
//! | `MAX_UPLOAD_BYTES`      | 256 MiB                      |
//! | `CORS_ORIGINS`          | the dashboard dev origins    |
//! | `DATASET_ROOT`          | `./datasets`                 |
//! | `DATA_DIR`              | `./data`                     |
//! | `DATABASE_URL`          | unset (file catalog)         |
//! | `FINALITY_TIMEOUT_SECS` | `30`                         |
//! | `SIGNING_KEY_HEX`       | unset (ephemeral key)        |
//! | `CHUNK_SIZE`            | 1 MiB                        |
//! | `UPLOAD_CONCURRENCY`    | `4`                          |
//! | `PROOF_SAMPLES`         | `16`                         |
//!
//! Blob store variables (`BLOB_*`) are read by
//! [`BlobStoreConfig::from_env`].

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use chaintrain_blob::BlobStoreConfig;
use chaintrain_registry::RegistryConfig;
use thiserror::Error;

use crate::auth::SecretString;

/// Origins the dashboard is served from during development.
pub const DEFAULT_CORS_ORIGINS: [&str; 5] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:3001",
    "http://127.0.0.1:8000",
    "http://localhost",
];

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Blob(#[from] chaintrain_blob::ConfigError),
}

/// Server configuration.
///
/// Custom `Debug` redacts every secret.
#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub bind_addr: IpAddr,
    /// Static bearer token. `None` disables authentication.
    pub auth_token: Option<SecretString>,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
    /// Directory `datasetPath` form fields are resolved against.
    pub dataset_root: PathBuf,
    /// Catalog files and the ledger journal live here.
    pub data_dir: PathBuf,
    pub database_url: Option<SecretString>,
    /// Hex Ed25519 seed for the training signer.
    pub signing_key_hex: Option<SecretString>,
    pub registry: RegistryConfig,
    pub blob: BlobStoreConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("bind_addr", &self.bind_addr)
            .field("auth_token", &self.auth_token)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("cors_origins", &self.cors_origins)
            .field("dataset_root", &self.dataset_root)
            .field("data_dir", &self.data_dir)
            .field("database_url", &self.database_url)
            .field("signing_key_hex", &self.signing_key_hex)
            .field("registry", &self.registry)
            .field("blob", &self.blob)
            .finish()
    }
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let blob = BlobStoreConfig::from_env()?;
        Self::from_lookup(|var| std::env::var(var).ok(), blob)
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F, blob: BlobStoreConfig) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let mut registry = RegistryConfig::default();
        registry.chunk_size = parse(&get, "CHUNK_SIZE", registry.chunk_size)?;
        registry.upload_concurrency =
            parse(&get, "UPLOAD_CONCURRENCY", registry.upload_concurrency)?;
        registry.proof_samples = parse(&get, "PROOF_SAMPLES", registry.proof_samples)?;
        let finality_secs = parse(
            &get,
            "FINALITY_TIMEOUT_SECS",
            registry.finality.timeout.as_secs(),
        )?;
        registry.finality.timeout = Duration::from_secs(finality_secs);

        for (var, value) in [
            ("CHUNK_SIZE", registry.chunk_size),
            ("UPLOAD_CONCURRENCY", registry.upload_concurrency),
            ("PROOF_SAMPLES", registry.proof_samples),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    var,
                    value: "0".into(),
                    reason: "must be positive".into(),
                });
            }
        }

        let cors_origins = match get("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        Ok(Self {
            port: parse(&get, "PORT", 8000)?,
            bind_addr: parse(&get, "BIND_ADDR", IpAddr::from([127, 0, 0, 1]))?,
            auth_token: get("AUTH_TOKEN").map(SecretString::new),
            max_upload_bytes: parse(&get, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            cors_origins,
            dataset_root: get("DATASET_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./datasets")),
            data_dir: get("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            database_url: get("DATABASE_URL").map(SecretString::new),
            signing_key_hex: get("SIGNING_KEY_HEX").map(SecretString::new),
            registry,
            blob,
        })
    }
}

fn parse<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
