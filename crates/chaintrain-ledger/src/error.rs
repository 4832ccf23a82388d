//! Ledger error types.

use chaintrain_core::{CanonicalizationError, ValidationError};
use thiserror::Error;

/// Errors from ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The submission is incomplete or malformed.
    #[error("invalid ledger submission: {0}")]
    Validation(#[from] ValidationError),

    /// The ledger refused the submission.
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// The ledger cannot be reached.
    #[error("ledger unavailable: {chain_id}")]
    Unavailable {
        /// Ledger identifier.
        chain_id: String,
    },

    /// No transaction with this digest.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    /// The transaction failed after submission.
    #[error("transaction {tx} failed: {reason}")]
    TransactionFailed {
        /// Transaction digest.
        tx: String,
        /// Failure reason.
        reason: String,
    },

    /// Finality was not reached in time.
    #[error("transaction {tx} not final after {waited_ms}ms")]
    FinalityTimeout {
        /// Transaction digest.
        tx: String,
        /// How long the caller waited.
        waited_ms: u64,
    },

    /// A journal entry does not link to its predecessor.
    #[error("journal broken at sequence {sequence}: {reason}")]
    ChainBroken {
        /// Sequence of the offending entry.
        sequence: u64,
        /// What did not match.
        reason: String,
    },

    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Journal file could not be parsed.
    #[error("journal decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Journal IO failed.
    #[error("journal io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Whether the failure is on the ledger's side rather than the
    /// submission's.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::FinalityTimeout { .. } | Self::Io(_)
        )
    }
}
