//! # chaintrain-ledger -- Dataset Ledger Registration
//!
//! Anchors a registered dataset's `{dataset_id, blob_id, merkle_root,
//! proof_digest, size, chunks}` on a ledger. Registration succeeds only once
//! the entry is final; submission alone is not enough.
//!
//! ## Invariants
//!
//! - Entries are append-only. Each carries the digest of its predecessor and
//!   its own digest over the canonical entry body, so any edit breaks the
//!   chain.
//! - Submission is idempotent on Merkle root: submitting a root that is
//!   already registered returns the existing entry with
//!   `already_registered = true` and appends nothing.
//! - A submission without a blob id or Merkle root is a validation error.
//!
//! [`JournalLedger`] is the in-process implementation, optionally persisted
//! as a JSON-lines file. [`await_finality`] polls any [`Ledger`] until the
//! entry is final or a deadline passes.

pub mod error;
pub mod finality;
pub mod journal;

pub use error::LedgerError;
pub use finality::{await_finality, FinalityOptions};
pub use journal::{verify_chain, JournalLedger};

use async_trait::async_trait;
use chaintrain_core::{
    sha256_digest, BlobId, CanonicalBytes, ContentDigest, DatasetId, Timestamp, TxDigest,
    ValidationError,
};
use serde::{Deserialize, Serialize};

/// A dataset registration submission.
///
/// `blob_id` and `merkle_root` are optional on the wire so that an incomplete
/// submission is reported as a validation error rather than a decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Dataset being registered.
    pub dataset_id: DatasetId,
    /// Manifest blob id.
    #[serde(default)]
    pub blob_id: Option<BlobId>,
    /// Merkle root over the chunk sequence.
    #[serde(default)]
    pub merkle_root: Option<ContentDigest>,
    /// Digest of the dataset proof.
    pub proof_digest: ContentDigest,
    /// File size in bytes.
    pub size: u64,
    /// Number of chunks.
    pub chunks: u64,
}

impl RegistrationRequest {
    /// Check that every field the ledger anchors is present.
    pub fn validate(&self) -> Result<(&BlobId, &ContentDigest), ValidationError> {
        let blob_id = self
            .blob_id
            .as_ref()
            .ok_or(ValidationError::MissingField("blob_id"))?;
        let root = self
            .merkle_root
            .as_ref()
            .ok_or(ValidationError::MissingField("merkle_root"))?;
        if self.chunks == 0 {
            return Err(ValidationError::InvalidValue {
                field: "chunks",
                reason: "a dataset has at least one chunk".into(),
            });
        }
        Ok((blob_id, root))
    }
}

/// One anchored dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Position in the journal, from 0.
    pub sequence: u64,
    /// Digest of this entry's canonical body.
    pub tx_digest: TxDigest,
    /// Digest of the previous entry; `None` for the first.
    pub prev_digest: Option<TxDigest>,
    /// Registered dataset.
    pub dataset_id: DatasetId,
    /// Manifest blob id.
    pub blob_id: BlobId,
    /// Merkle root.
    pub merkle_root: ContentDigest,
    /// Digest of the dataset proof.
    pub proof_digest: ContentDigest,
    /// File size in bytes.
    pub size: u64,
    /// Number of chunks.
    pub chunks: u64,
    /// When the entry was appended.
    pub submitted_at: Timestamp,
}

#[derive(Serialize)]
struct EntryBody<'a> {
    sequence: u64,
    prev_digest: Option<&'a TxDigest>,
    dataset_id: &'a DatasetId,
    blob_id: &'a BlobId,
    merkle_root: &'a ContentDigest,
    proof_digest: &'a ContentDigest,
    size: u64,
    chunks: u64,
    submitted_at: Timestamp,
}

impl LedgerEntry {
    /// Recompute the digest over everything except `tx_digest` itself.
    pub fn compute_digest(&self) -> Result<TxDigest, LedgerError> {
        let body = EntryBody {
            sequence: self.sequence,
            prev_digest: self.prev_digest.as_ref(),
            dataset_id: &self.dataset_id,
            blob_id: &self.blob_id,
            merkle_root: &self.merkle_root,
            proof_digest: &self.proof_digest,
            size: self.size,
            chunks: self.chunks,
            submitted_at: self.submitted_at,
        };
        Ok(TxDigest(sha256_digest(&CanonicalBytes::new(&body)?)))
    }
}

/// Finality of a submitted entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalityStatus {
    /// Appended, not yet final.
    Pending,
    /// Irreversible.
    Finalized,
    /// The ledger dropped the entry.
    Failed,
}

/// Result of [`Ledger::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// The entry now anchoring the root.
    pub entry: LedgerEntry,
    /// The root was registered by an earlier submission.
    pub already_registered: bool,
}

/// A ledger that anchors dataset registrations.
#[async_trait]
pub trait Ledger: Send + Sync + std::fmt::Debug {
    /// Ledger identifier for logs and health output.
    fn chain_id(&self) -> &str;

    /// Submit a registration. Idempotent on Merkle root.
    async fn submit(&self, request: RegistrationRequest) -> Result<Submission, LedgerError>;

    /// Finality of a transaction.
    async fn status(&self, tx: &TxDigest) -> Result<FinalityStatus, LedgerError>;

    /// Entry by transaction digest.
    async fn entry(&self, tx: &TxDigest) -> Result<Option<LedgerEntry>, LedgerError>;

    /// Entry anchoring a Merkle root.
    async fn find_by_root(&self, root: &ContentDigest) -> Result<Option<LedgerEntry>, LedgerError>;

    /// All entries in sequence order.
    async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError>;
}
