//! # Proof System Trait (Sealed)
//!
//! The core abstraction for proof backends. The trait is sealed: only
//! implementations defined within `chaintrain-zkp` can exist, so the registry
//! never accepts a proof type it does not know how to verify.
//!
//! Proof generation is CPU-bound and may run for a long time on large
//! datasets. [`ProveContext`] lets the caller observe progress and cancel a
//! proof in flight; backends poll it between units of work.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Error during proof generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// The circuit inputs are invalid or inconsistent.
    #[error("invalid circuit inputs: {0}")]
    InvalidInputs(String),
    /// A chunk has no storage acknowledgement; proving is refused.
    #[error("chunk {index} has no storage acknowledgement")]
    MissingAcknowledgement {
        /// Index of the unacknowledged chunk.
        index: u64,
    },
    /// The caller cancelled proof generation.
    #[error("proof generation cancelled")]
    Cancelled,
    /// Proof generation failed internally.
    #[error("proof generation failed: {0}")]
    GenerationFailed(String),
}

/// Error during proof verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The proof or public inputs are structurally malformed.
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    /// The proof is well-formed but does not verify.
    #[error("proof verification failed: {0}")]
    VerificationFailed(String),
}

mod private {
    pub trait Sealed {}
}

fn never_cancelled() -> bool {
    false
}

fn ignore_progress(_: u8) {}

/// Progress and cancellation hooks for a running prover.
pub struct ProveContext<'a> {
    cancelled: &'a (dyn Fn() -> bool + Sync),
    progress: &'a (dyn Fn(u8) + Sync),
}

impl<'a> ProveContext<'a> {
    /// Build a context from a cancellation probe and a progress sink
    /// receiving percentages in `0..=100`.
    pub fn new(
        cancelled: &'a (dyn Fn() -> bool + Sync),
        progress: &'a (dyn Fn(u8) + Sync),
    ) -> Self {
        Self { cancelled, progress }
    }

    /// A context that never cancels and discards progress.
    pub fn detached() -> ProveContext<'static> {
        ProveContext {
            cancelled: &never_cancelled,
            progress: &ignore_progress,
        }
    }

    /// Return `Err(Cancelled)` if the caller has cancelled.
    pub fn checkpoint(&self) -> Result<(), ProofError> {
        if (self.cancelled)() {
            return Err(ProofError::Cancelled);
        }
        Ok(())
    }

    /// Report progress, clamped to 100.
    pub fn report(&self, percent: u8) {
        (self.progress)(percent.min(100));
    }
}

impl std::fmt::Debug for ProveContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProveContext").finish_non_exhaustive()
    }
}

/// Sealed interface for a proof system.
///
/// - **`Proof`**: the artifact produced by `prove()`, serializable so it can
///   be stored as a proof record.
/// - **`VerifyingKey`** / **`ProvingKey`**: key material; unit types for the
///   transparent backends.
/// - **`Circuit`**: the statement plus witness.
pub trait ProofSystem: private::Sealed + Send + Sync {
    /// The proof type produced by this system.
    type Proof: Serialize + DeserializeOwned + Clone + std::fmt::Debug;
    /// The verifying key type.
    type VerifyingKey: Clone;
    /// The proving key type.
    type ProvingKey;
    /// The circuit type that defines the proof statement.
    type Circuit;

    /// Generate a proof.
    ///
    /// # Errors
    ///
    /// [`ProofError::InvalidInputs`] or [`ProofError::MissingAcknowledgement`]
    /// when the circuit is unsatisfiable, [`ProofError::Cancelled`] when the
    /// context is cancelled.
    fn prove(
        &self,
        pk: &Self::ProvingKey,
        circuit: &Self::Circuit,
        ctx: &ProveContext<'_>,
    ) -> Result<Self::Proof, ProofError>;

    /// Verify a proof against the canonical bytes of its public statement.
    ///
    /// `Ok(false)` means well-formed but invalid.
    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        proof: &Self::Proof,
        public_inputs: &[u8],
    ) -> Result<bool, VerifyError>;
}

impl private::Sealed for crate::commitment::CommitmentProofSystem {}
impl private::Sealed for crate::dataset::SampledMerkleProofSystem {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

    #[test]
    fn detached_context_never_cancels() {
        let ctx = ProveContext::detached();
        assert!(ctx.checkpoint().is_ok());
        ctx.report(50);
    }

    #[test]
    fn cancellation_is_observed() {
        let flag = AtomicBool::new(false);
        let cancelled = || flag.load(Ordering::SeqCst);
        let progress = |_: u8| {};
        let ctx = ProveContext::new(&cancelled, &progress);
        assert!(ctx.checkpoint().is_ok());
        flag.store(true, Ordering::SeqCst);
        assert_eq!(ctx.checkpoint(), Err(ProofError::Cancelled));
    }

    #[test]
    fn progress_is_clamped() {
        let last = AtomicU8::new(0);
        let cancelled = || false;
        let progress = |p: u8| last.store(p, Ordering::SeqCst);
        let ctx = ProveContext::new(&cancelled, &progress);
        ctx.report(250);
        assert_eq!(last.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            ProofError::MissingAcknowledgement { index: 3 }.to_string(),
            "chunk 3 has no storage acknowledgement"
        );
        assert!(VerifyError::MalformedProof("x".into()).to_string().contains("malformed"));
    }
}
