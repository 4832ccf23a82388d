//! # Sampled-Opening Dataset Proof
//!
//! Proves that a dataset's registered Merkle root commits to a chunk
//! sequence that was fully acknowledged by the blob store.
//!
//! ## Statement
//!
//! [`DatasetStatement`] is public: dataset id, manifest blob id, Merkle root,
//! chunk count, byte size and chunk size. Its canonical JSON bytes are the
//! verifier's public inputs.
//!
//! ## Proof
//!
//! 1. The prover refuses unless every chunk carries a storage
//!    acknowledgement.
//! 2. It rebuilds the tree from the leaf digests and checks the root.
//! 3. A seed `SHA256(domain || SHA256(statement))` selects `k` distinct leaf
//!    indices (Fiat-Shamir). Each selected leaf is opened with its inclusion
//!    path.
//! 4. A commitment over the statement digest and the openings seals the
//!    proof.
//!
//! The verifier re-derives the sampled indices from the statement alone, so
//! the prover cannot choose which leaves to open.

use std::collections::BTreeSet;

use chaintrain_core::{
    from_hex, to_hex, BlobId, CanonicalBytes, ContentDigest, DatasetId, Sha256Accumulator,
};
use chaintrain_crypto::{InclusionProof, MerkleTree};
use serde::{Deserialize, Serialize};

use crate::traits::{ProofError, ProofSystem, ProveContext, VerifyError};

const SEED_DOMAIN: &[u8] = b"chaintrain/dataset-proof/seed/v1";
const COMMIT_DOMAIN: &[u8] = b"chaintrain/dataset-proof/commit/v1";

/// Identifier recorded alongside stored proofs.
pub const SYSTEM_ID: &str = "sampled-merkle-v1";

/// Default number of sampled openings.
pub const DEFAULT_PROOF_SAMPLES: usize = 16;

/// Public statement about a registered dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStatement {
    /// Dataset being registered.
    pub dataset_id: DatasetId,
    /// Manifest blob id.
    pub blob_id: BlobId,
    /// Merkle root over chunk digests.
    pub merkle_root: ContentDigest,
    /// Number of chunks.
    pub chunk_count: u64,
    /// File size in bytes.
    pub size: u64,
    /// Chunk size used to split the file.
    pub chunk_size: u64,
}

impl DatasetStatement {
    /// Canonical bytes of the statement.
    pub fn canonical(&self) -> Result<CanonicalBytes, ProofError> {
        CanonicalBytes::new(self).map_err(|e| ProofError::InvalidInputs(e.to_string()))
    }
}

/// Statement plus witness.
#[derive(Debug, Clone)]
pub struct DatasetCircuit {
    /// Public statement.
    pub statement: DatasetStatement,
    /// Chunk digests in order.
    pub leaves: Vec<[u8; 32]>,
    /// Whether the blob store acknowledged each chunk.
    pub acknowledged: Vec<bool>,
}

/// Proving parameters.
#[derive(Debug, Clone, Copy)]
pub struct SamplingKey {
    /// Openings to produce (capped at the chunk count).
    pub samples: usize,
}

impl Default for SamplingKey {
    fn default() -> Self {
        Self {
            samples: DEFAULT_PROOF_SAMPLES,
        }
    }
}

/// Verification parameters.
#[derive(Debug, Clone, Copy)]
pub struct SamplingPolicy {
    /// Minimum openings accepted (capped at the chunk count).
    pub min_samples: usize,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self { min_samples: 1 }
    }
}

/// One opened leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    /// Leaf digest.
    pub leaf: ContentDigest,
    /// Inclusion path for the leaf.
    pub path: InclusionProof,
}

/// A dataset proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetProof {
    /// SHA-256 of the canonical statement.
    pub statement_digest: ContentDigest,
    /// Number of openings requested.
    pub samples: u64,
    /// Openings in ascending leaf order.
    pub openings: Vec<Opening>,
    /// Commitment over the statement digest and openings.
    pub commitment: ContentDigest,
}

impl DatasetProof {
    /// SHA-256 of the proof's canonical JSON; anchored on the ledger.
    pub fn digest(&self) -> Result<ContentDigest, ProofError> {
        let cb = CanonicalBytes::new(self).map_err(|e| ProofError::GenerationFailed(e.to_string()))?;
        Ok(ContentDigest::of(cb.as_bytes()))
    }

    /// Hex-encode the canonical JSON for storage in a proof record.
    pub fn to_proof_data(&self) -> Result<String, ProofError> {
        let cb = CanonicalBytes::new(self).map_err(|e| ProofError::GenerationFailed(e.to_string()))?;
        Ok(to_hex(cb.as_bytes()))
    }

    /// Decode from a proof record's `proof_data`.
    pub fn from_proof_data(hex: &str) -> Result<Self, VerifyError> {
        let bytes = from_hex(hex).map_err(|e| VerifyError::MalformedProof(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| VerifyError::MalformedProof(e.to_string()))
    }
}

/// Deterministic sampled-opening Merkle proof backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampledMerkleProofSystem;

fn seed(statement_digest: &ContentDigest) -> ContentDigest {
    let mut acc = Sha256Accumulator::new();
    acc.update(SEED_DOMAIN);
    acc.update(statement_digest.as_bytes());
    acc.finalize()
}

/// Select `min(samples, n)` distinct indices in `0..n`, sorted.
fn sample_indices(seed: &ContentDigest, n: u64, samples: u64) -> Vec<u64> {
    let k = samples.min(n);
    if k == n {
        return (0..n).collect();
    }
    let mut picked = BTreeSet::new();
    let mut counter = 0u64;
    while (picked.len() as u64) < k {
        let mut acc = Sha256Accumulator::new();
        acc.update(seed.as_bytes());
        acc.update(&counter.to_be_bytes());
        picked.insert(acc.finalize().seed_u64() % n);
        counter += 1;
    }
    picked.into_iter().collect()
}

fn commitment(statement_digest: &ContentDigest, openings: &[Opening]) -> ContentDigest {
    let mut acc = Sha256Accumulator::new();
    acc.update(COMMIT_DOMAIN);
    acc.update(statement_digest.as_bytes());
    for o in openings {
        acc.update(&o.path.leaf_index.to_be_bytes());
        acc.update(o.leaf.as_bytes());
    }
    acc.finalize()
}

impl ProofSystem for SampledMerkleProofSystem {
    type Proof = DatasetProof;
    type VerifyingKey = SamplingPolicy;
    type ProvingKey = SamplingKey;
    type Circuit = DatasetCircuit;

    fn prove(
        &self,
        pk: &SamplingKey,
        circuit: &DatasetCircuit,
        ctx: &ProveContext<'_>,
    ) -> Result<DatasetProof, ProofError> {
        ctx.checkpoint()?;
        let st = &circuit.statement;
        let n = circuit.leaves.len() as u64;
        if n == 0 {
            return Err(ProofError::InvalidInputs("dataset has no chunks".into()));
        }
        if n != st.chunk_count || circuit.acknowledged.len() as u64 != n {
            return Err(ProofError::InvalidInputs(format!(
                "statement declares {} chunks, witness has {} leaves and {} acknowledgements",
                st.chunk_count,
                n,
                circuit.acknowledged.len()
            )));
        }
        if let Some(index) = circuit.acknowledged.iter().position(|ack| !ack) {
            return Err(ProofError::MissingAcknowledgement {
                index: index as u64,
            });
        }
        if pk.samples == 0 {
            return Err(ProofError::InvalidInputs("sample count must be positive".into()));
        }
        ctx.report(5);

        let tree = MerkleTree::from_leaves(circuit.leaves.clone())
            .map_err(|e| ProofError::GenerationFailed(e.to_string()))?;
        if tree.root() != st.merkle_root {
            return Err(ProofError::InvalidInputs(format!(
                "leaves hash to {} but statement claims {}",
                tree.root(),
                st.merkle_root
            )));
        }
        ctx.checkpoint()?;
        ctx.report(40);

        let statement_digest = ContentDigest::of(st.canonical()?.as_bytes());
        let indices = sample_indices(&seed(&statement_digest), n, pk.samples as u64);
        let total = indices.len();
        let mut openings = Vec::with_capacity(total);
        for (j, index) in indices.into_iter().enumerate() {
            ctx.checkpoint()?;
            let path = tree
                .proof(index)
                .map_err(|e| ProofError::GenerationFailed(e.to_string()))?;
            let leaf = tree
                .leaf(index)
                .map(ContentDigest::from_bytes)
                .ok_or_else(|| ProofError::GenerationFailed(format!("missing leaf {index}")))?;
            openings.push(Opening { leaf, path });
            let pct = 40 + (60 * (j + 1) / total.max(1));
            ctx.report(pct as u8);
        }

        Ok(DatasetProof {
            commitment: commitment(&statement_digest, &openings),
            statement_digest,
            samples: pk.samples as u64,
            openings,
        })
    }

    fn verify(
        &self,
        vk: &SamplingPolicy,
        proof: &DatasetProof,
        public_inputs: &[u8],
    ) -> Result<bool, VerifyError> {
        let statement: DatasetStatement = serde_json::from_slice(public_inputs)
            .map_err(|e| VerifyError::MalformedProof(format!("statement: {e}")))?;
        let n = statement.chunk_count;
        if n == 0 {
            return Err(VerifyError::MalformedProof("statement declares no chunks".into()));
        }

        if ContentDigest::of(public_inputs) != proof.statement_digest {
            return Ok(false);
        }
        if proof.samples.min(n) < (vk.min_samples as u64).min(n) {
            return Ok(false);
        }
        let expected = sample_indices(&seed(&proof.statement_digest), n, proof.samples);
        let opened: Vec<u64> = proof.openings.iter().map(|o| o.path.leaf_index).collect();
        if opened != expected {
            return Ok(false);
        }
        for o in &proof.openings {
            if o.path.leaf_count != n || !o.path.verify_leaf(o.leaf.as_bytes(), &statement.merkle_root) {
                return Ok(false);
            }
        }
        Ok(commitment(&proof.statement_digest, &proof.openings) == proof.commitment)
    }
}

impl SampledMerkleProofSystem {
    /// Verify against a statement, canonicalizing it first.
    pub fn verify_statement(
        &self,
        vk: &SamplingPolicy,
        proof: &DatasetProof,
        statement: &DatasetStatement,
    ) -> Result<bool, VerifyError> {
        let canonical = statement
            .canonical()
            .map_err(|e| VerifyError::MalformedProof(e.to_string()))?;
        self.verify(vk, proof, canonical.as_bytes())
    }
}
