//! # Commitment Proof System
//!
//! A deterministic, transparent proof that binds a public statement (a
//! training record's model id, request hash, fingerprint and weights) to a
//! SHA-256 commitment:
//!
//! ```text
//! proof = SHA256( "chaintrain/commitment/v1" || canonical_bytes(statement) )
//! ```
//!
//! **NOT PRIVATE.** Anyone can recompute the proof from the statement. It
//! detects any change to a stored training record's committed fields.

use chaintrain_core::{CanonicalBytes, ContentDigest, Sha256Accumulator};
use serde::{Deserialize, Serialize};

use crate::traits::{ProofError, ProofSystem, ProveContext, VerifyError};

const DOMAIN: &[u8] = b"chaintrain/commitment/v1";

/// Identifier recorded alongside stored proofs.
pub const SYSTEM_ID: &str = "sha256-commitment-v1";

/// A commitment proof.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitmentProof {
    /// `SHA256(domain || canonical statement)`.
    pub commitment: ContentDigest,
}

/// The statement to commit to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentCircuit {
    /// Canonical-JSON-serializable statement. Floats are rejected.
    pub statement: serde_json::Value,
}

impl CommitmentCircuit {
    /// Canonical bytes of the statement; the verifier's public inputs.
    pub fn public_inputs(&self) -> Result<CanonicalBytes, ProofError> {
        CanonicalBytes::from_value(self.statement.clone())
            .map_err(|e| ProofError::InvalidInputs(format!("statement not canonicalizable: {e}")))
    }
}

/// Transparent SHA-256 commitment backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitmentProofSystem;

fn commit(public_inputs: &[u8]) -> ContentDigest {
    let mut acc = Sha256Accumulator::new();
    acc.update(DOMAIN);
    acc.update(public_inputs);
    acc.finalize()
}

impl ProofSystem for CommitmentProofSystem {
    type Proof = CommitmentProof;
    type VerifyingKey = ();
    type ProvingKey = ();
    type Circuit = CommitmentCircuit;

    fn prove(
        &self,
        _pk: &(),
        circuit: &CommitmentCircuit,
        ctx: &ProveContext<'_>,
    ) -> Result<CommitmentProof, ProofError> {
        ctx.checkpoint()?;
        let canonical = circuit.public_inputs()?;
        let commitment = commit(canonical.as_bytes());
        ctx.report(100);
        Ok(CommitmentProof { commitment })
    }

    fn verify(
        &self,
        _vk: &(),
        proof: &CommitmentProof,
        public_inputs: &[u8],
    ) -> Result<bool, VerifyError> {
        if public_inputs.is_empty() {
            return Err(VerifyError::MalformedProof("empty statement".into()));
        }
        Ok(commit(public_inputs) == proof.commitment)
    }
}

impl CommitmentProofSystem {
    /// Verify against a circuit directly, canonicalizing its statement.
    pub fn verify_circuit(
        &self,
        proof: &CommitmentProof,
        circuit: &CommitmentCircuit,
    ) -> Result<bool, VerifyError> {
        let canonical = circuit
            .public_inputs()
            .map_err(|e| VerifyError::MalformedProof(e.to_string()))?;
        self.verify(&(), proof, canonical.as_bytes())
    }
}
