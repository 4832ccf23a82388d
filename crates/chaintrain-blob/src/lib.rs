//! # chaintrain-blob -- Blob store clients
//!
//! Dataset chunks and manifests are stored as opaque blobs addressed by the
//! id the store returns. Three backends implement [`BlobStore`]:
//!
//! - [`WalrusClient`]: a Walrus publisher (writes) and aggregator (reads)
//!   over HTTP, with retry on transport failures.
//! - [`LocalBlobStore`]: content-addressed files under a data directory.
//! - [`MemoryBlobStore`]: a map in process memory, with fault injection for
//!   tests.
//!
//! [`open`] picks one from a [`BlobStoreConfig`].

pub mod config;
pub mod error;
pub mod local;
pub mod memory;
pub(crate) mod retry;
pub mod walrus;

pub use config::{BlobBackend, BlobStoreConfig, ConfigError};
pub use error::BlobError;
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use walrus::WalrusClient;

use std::sync::Arc;

use async_trait::async_trait;
use chaintrain_core::{BlobId, BlobStorageInfo};

/// Result of storing one blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Id to read the blob back with.
    pub blob_id: BlobId,
    /// Storage metadata, where the backend reports any.
    pub storage: BlobStorageInfo,
    /// The store already held these bytes.
    pub already_certified: bool,
}

/// A blob store.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Store bytes and return their id.
    async fn put(&self, bytes: &[u8]) -> Result<StoredBlob, BlobError>;

    /// Read a blob. [`BlobError::NotFound`] when the store has no such id.
    async fn get(&self, blob_id: &BlobId) -> Result<Vec<u8>, BlobError>;
}

/// Build the configured backend.
pub fn open(config: &BlobStoreConfig) -> Result<Arc<dyn BlobStore>, BlobError> {
    let store: Arc<dyn BlobStore> = match config.backend {
        BlobBackend::Walrus => Arc::new(WalrusClient::new(config)?),
        BlobBackend::Local => Arc::new(LocalBlobStore::new(&config.data_dir)),
        BlobBackend::Memory => Arc::new(MemoryBlobStore::new()),
    };
    tracing::info!(backend = store.backend(), "blob store configured");
    Ok(store)
}
