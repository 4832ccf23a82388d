//! # chaintrain-zkp — Proof Systems
//!
//! A trait-based proof abstraction with two transparent, deterministic
//! backends:
//!
//! - [`SampledMerkleProofSystem`] proves that a dataset's Merkle root commits
//!   to the registered chunk sequence. The prover opens a Fiat-Shamir-sampled
//!   subset of chunk leaves with inclusion paths; the verifier re-derives the
//!   sample and checks every path against the root.
//! - [`CommitmentProofSystem`] binds a training record's public statement to
//!   a SHA-256 commitment.
//!
//! Neither backend is zero-knowledge. The [`ProofSystem`] trait is sealed so
//! that a real circuit backend can replace them without widening the set of
//! accepted proof types.

pub mod commitment;
pub mod dataset;
pub mod traits;

// Re-export primary types.
pub use commitment::{CommitmentCircuit, CommitmentProof, CommitmentProofSystem};
pub use dataset::{
    DatasetCircuit, DatasetProof, DatasetStatement, Opening, SampledMerkleProofSystem,
    SamplingKey, SamplingPolicy, DEFAULT_PROOF_SAMPLES,
};
pub use traits::{ProofError, ProofSystem, ProveContext, VerifyError};
