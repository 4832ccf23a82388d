//! The [`Registry`] service object and its run bookkeeping.

use std::sync::Arc;

use chaintrain_blob::BlobStore;
use chaintrain_core::{ContentDigest, RequestHash, UploadId};
use chaintrain_crypto::{Ed25519KeyPair, Ed25519PublicKey};
use chaintrain_ledger::Ledger;
use chaintrain_state::{RegistrationRun, RegistrationState};

use crate::catalog::Catalog;
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::locks::KeyedLocks;
use crate::store::Store;

/// Finished upload runs kept for polling before the oldest are evicted.
pub const DEFAULT_RETAINED_RUNS: usize = 1024;

/// Registry service: owns the backends and the catalog.
///
/// Cheap to share behind an `Arc`; every field is itself shareable.
#[derive(Debug)]
pub struct Registry {
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) catalog: Catalog,
    pub(crate) config: RegistryConfig,
    pub(crate) signer: Ed25519KeyPair,
    pub(crate) runs: Store<RegistrationRun>,
    retained_runs: usize,
    /// Keyed by `(content digest, chunk size)`.
    pub(crate) inflight: KeyedLocks<(ContentDigest, u64)>,
    pub(crate) training_locks: KeyedLocks<RequestHash>,
}

impl Registry {
    /// Assemble a registry from its backends.
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        ledger: Arc<dyn Ledger>,
        catalog: Catalog,
        signer: Ed25519KeyPair,
        config: RegistryConfig,
    ) -> Self {
        tracing::info!(
            blob_backend = blobs.backend(),
            ledger = ledger.chain_id(),
            catalog_backend = catalog.backend(),
            chunk_size = config.chunk_size,
            upload_concurrency = config.upload_concurrency,
            "registry initialized"
        );
        Self {
            blobs,
            ledger,
            catalog,
            config,
            signer,
            runs: Store::new(),
            retained_runs: DEFAULT_RETAINED_RUNS,
            inflight: KeyedLocks::new(),
            training_locks: KeyedLocks::new(),
        }
    }

    /// Keep at most `n` finished runs pollable.
    pub fn with_retained_runs(mut self, n: usize) -> Self {
        self.retained_runs = n;
        self
    }

    /// Record index.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Blob store backend.
    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Ledger backend.
    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Active configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Public half of the service signing key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.signer.public_key()
    }

    /// Snapshot of an upload's pipeline run.
    pub fn upload_run(&self, id: &UploadId) -> Option<RegistrationRun> {
        self.runs.get(id.as_str())
    }

    /// Number of registrations currently holding or waiting on a
    /// fingerprint lock.
    pub fn inflight_registrations(&self) -> usize {
        self.inflight.active()
    }

    /// Start a fresh run. A run that is still going under the same id is a
    /// conflict; a finished one is replaced.
    pub(crate) fn begin_run(&self, id: &UploadId) -> Result<(), RegistryError> {
        let mut run = RegistrationRun::new(id.clone());
        run.try_transition(RegistrationState::Chunking)?;
        self.runs
            .insert_unless(id.as_str(), run, |existing| !existing.is_terminal())
            .map_err(|_| RegistryError::Conflict(format!("upload {id} is already in progress")))?;
        let evicted = self.runs.evict_oldest(
            self.retained_runs,
            RegistrationRun::is_terminal,
            |run| run.started_at,
        );
        if evicted > 0 {
            tracing::debug!(evicted, "finished upload runs evicted");
        }
        Ok(())
    }

    pub(crate) fn advance(
        &self,
        id: &UploadId,
        to: RegistrationState,
    ) -> Result<(), RegistryError> {
        match self.runs.modify(id.as_str(), |run| run.try_transition(to)) {
            Some(result) => {
                result?;
                tracing::debug!(upload_id = %id, state = %to, "registration advanced");
                Ok(())
            }
            None => Err(RegistryError::Internal(format!("run {id} disappeared"))),
        }
    }

    pub(crate) fn progress(&self, id: &UploadId, message: impl Into<String>, percent: Option<u8>) {
        let message = message.into();
        self.runs
            .modify(id.as_str(), |run| run.record_progress(message, percent));
    }
}

/// Marks a run failed if dropped while armed, which covers both error
/// returns and a dropped future.
pub(crate) struct RunGuard {
    runs: Store<RegistrationRun>,
    id: UploadId,
    armed: bool,
}

impl RunGuard {
    pub(crate) fn new(runs: Store<RegistrationRun>, id: UploadId) -> Self {
        Self {
            runs,
            id,
            armed: true,
        }
    }

    pub(crate) fn fail(mut self, reason: &str) {
        self.mark_failed(reason);
        self.armed = false;
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }

    fn mark_failed(&self, reason: &str) {
        self.runs.modify(self.id.as_str(), |run| {
            if let Err(e) = run.fail(reason) {
                tracing::debug!(upload_id = %run.upload_id, error = %e, "run already finished");
            }
        });
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.armed {
            self.mark_failed("registration cancelled");
        }
    }
}
