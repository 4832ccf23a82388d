//! Registry tuning knobs.

use chaintrain_crypto::DEFAULT_CHUNK_SIZE;
use chaintrain_ledger::FinalityOptions;
use chaintrain_zkp::DEFAULT_PROOF_SAMPLES;

/// Default number of chunk uploads in flight per registration.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;

/// Registry configuration.
#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    /// Chunk size for new registrations.
    pub chunk_size: usize,
    /// Concurrent chunk uploads per registration.
    pub upload_concurrency: usize,
    /// Leaves opened by each dataset proof.
    pub proof_samples: usize,
    /// Ledger finality polling.
    pub finality: FinalityOptions,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            proof_samples: DEFAULT_PROOF_SAMPLES,
            finality: FinalityOptions::default(),
        }
    }
}
