//! # Startup Wiring
//!
//! Turns an [`AppConfig`] into a ready [`AppState`]: opens the blob store,
//! the ledger journal and the catalog backend, loads the signing key, and
//! hydrates the catalog.

use std::sync::Arc;

use chaintrain_blob::BlobError;
use chaintrain_crypto::{CryptoError, Ed25519KeyPair};
use chaintrain_ledger::{JournalLedger, LedgerError};
use chaintrain_registry::{Catalog, FileKv, KeyValueStore, KvError, Registry, RegistryError};
use thiserror::Error;

use crate::config::AppConfig;
use crate::db::{self, PgKv};
use crate::state::AppState;

/// Ledger journal chain identifier.
pub const CHAIN_ID: &str = "chaintrain-local";

/// Startup failures.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("cannot create data directory {path}: {source}")]
    DataDir {
        path: String,
        source: std::io::Error,
    },
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("catalog store: {0}")]
    Kv(#[from] KvError),
    #[error("catalog: {0}")]
    Catalog(#[from] RegistryError),
    #[error("blob store: {0}")]
    Blob(#[from] BlobError),
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
    #[error("SIGNING_KEY_HEX: {0}")]
    SigningKey(#[from] CryptoError),
}

/// Build application state from configuration.
pub async fn bootstrap(config: AppConfig) -> Result<AppState, BootstrapError> {
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .map_err(|source| BootstrapError::DataDir {
            path: config.data_dir.display().to_string(),
            source,
        })?;

    let kv: Arc<dyn KeyValueStore> = match &config.database_url {
        Some(url) => Arc::new(PgKv::new(db::init_pool(url.expose()).await?)),
        None => {
            tracing::warn!(
                data_dir = %config.data_dir.display(),
                "DATABASE_URL not set; catalog kept in JSON files"
            );
            Arc::new(FileKv::open(config.data_dir.join("catalog"))?)
        }
    };
    let catalog = Catalog::load(kv).await?;

    let blobs = chaintrain_blob::open(&config.blob)?;
    let ledger = Arc::new(JournalLedger::open(
        CHAIN_ID,
        config.data_dir.join("ledger.jsonl"),
    )?);

    let signer = match &config.signing_key_hex {
        Some(hex) => Ed25519KeyPair::from_seed_hex(hex.expose())?,
        None => {
            tracing::warn!(
                "SIGNING_KEY_HEX not set; using an ephemeral training key. \
                 Training records signed now will not verify after a restart."
            );
            Ed25519KeyPair::generate()
        }
    };

    let registry = Registry::new(blobs, ledger, catalog, signer, config.registry);
    Ok(AppState::new(registry, config))
}
