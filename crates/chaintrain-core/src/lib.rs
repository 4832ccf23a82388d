#![deny(missing_docs)]

//! # chaintrain-core — Foundational Types for the ChainTrain Registry
//!
//! Every other crate in the workspace depends on this one. It has no internal
//! crate dependencies; externally it uses only `serde`, `serde_json`, `thiserror`, `chrono`,
//! `uuid`, and `sha2` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** A [`DatasetId`] cannot be passed
//!    where a [`ModelId`] is expected, and a [`BlobId`] is never confused with
//!    a [`TxDigest`].
//!
//! 2. **One digest type.** Merkle roots, content digests, request hashes and
//!    transaction digests are all 32-byte SHA-256 values carried by
//!    [`ContentDigest`], serialized as 64 lowercase hex chars.
//!
//! 3. **[`CanonicalBytes`] for anything hashed or signed as JSON.** Sorted
//!    keys, compact separators, floats rejected.
//!
//! 4. **Proof subjects are exclusive by construction.** [`ProofSubject`] is an
//!    enum, so a proof attached to both a dataset and a model is unrepresentable.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod lineage;
pub mod model;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{from_hex, sha256_digest, sha256_raw, to_hex, ContentDigest, Sha256Accumulator};
pub use error::{CanonicalizationError, ChainTrainError, ValidationError};
pub use identity::{BlobId, DatasetId, ModelId, ProofId, RequestHash, TxDigest, UploadId};
pub use lineage::{LineageEdge, LineageGraph, LineageNode, NodeKind};
pub use model::{
    BlobStorageInfo, Dataset, Model, Proof, ProofSubject, TrainingRecord,
};
pub use temporal::Timestamp;
