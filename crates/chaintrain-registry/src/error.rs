//! Registry error types.

use chaintrain_blob::BlobError;
use chaintrain_core::{CanonicalizationError, ValidationError};
use chaintrain_crypto::CryptoError;
use chaintrain_ledger::LedgerError;
use chaintrain_state::StateError;
use chaintrain_zkp::{ProofError, VerifyError};
use thiserror::Error;

use crate::kv::KvError;

/// Errors from registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Input failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind, e.g. `dataset`.
        kind: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// The request conflicts with current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Served bytes do not match their recorded digest.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Chunking or Merkle construction failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Blob store failure.
    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),

    /// Ledger failure.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Proof generation failed.
    #[error("proof error: {0}")]
    Proof(#[from] ProofError),

    /// A stored proof could not be checked.
    #[error("proof verification error: {0}")]
    Verify(#[from] VerifyError),

    /// Catalog backend failure.
    #[error("catalog error: {0}")]
    Kv(#[from] KvError),

    /// Illegal pipeline transition.
    #[error("pipeline state error: {0}")]
    State(#[from] StateError),

    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// The caller went away.
    #[error("registration cancelled")]
    Cancelled,

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    pub(crate) fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
