//! # chaintrain-registry -- Registration Orchestration
//!
//! Ties the chunker, blob store, Merkle builder, proof system and ledger into
//! the dataset registration pipeline, and serves the read side: catalog,
//! training, verification and lineage.
//!
//! ## Concurrency
//!
//! - At most one registration runs per `(content digest, chunk size)`.
//!   Duplicates wait on a keyed lock and then return the registered record.
//!   The ledger's idempotency on Merkle root is the second guard.
//! - Chunk uploads run on a `JoinSet` bounded by a semaphore. All
//!   acknowledgements are collected before the Merkle stage starts.
//! - Chunking, Merkle construction and proving run on the blocking pool.
//!   Proving polls the caller's `CancellationToken`.
//!
//! ## Persistence
//!
//! The [`Catalog`] keeps records in memory and writes them through to an
//! injected [`KeyValueStore`]. Catalog writes happen only after ledger
//! finality, so a failed or cancelled run leaves no dataset record.

pub mod catalog;
pub mod config;
pub mod error;
pub mod governance;
pub mod kv;
pub mod locks;
pub mod manifest;
pub mod pipeline;
pub mod registry;
pub mod store;
pub mod trainer;
pub mod verifier;

pub use catalog::Catalog;
pub use config::{RegistryConfig, DEFAULT_UPLOAD_CONCURRENCY};
pub use error::RegistryError;
pub use governance::GovernanceSummary;
pub use kv::{FileKv, KeyValueStore, KvError, MemoryKv};
pub use locks::KeyedLocks;
pub use manifest::{DatasetManifest, ManifestChunk};
pub use pipeline::{DatasetDownload, DatasetUpload, RegistrationOutcome};
pub use registry::{Registry, DEFAULT_RETAINED_RUNS};
pub use store::Store;
pub use trainer::{load_dataset_path, resolve_dataset_path, DatasetSource, TrainingOutcome};
pub use verifier::{DatasetVerification, ProofVerification, VerificationResult};
