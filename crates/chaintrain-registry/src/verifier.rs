//! # Verifier
//!
//! Independent read path. Three checks:
//!
//! - [`Registry::verify_training_data`]: recompute a training record's
//!   fingerprint from supplied bytes and check its signature.
//! - [`Registry::verify_dataset`]: re-fetch a dataset's chunks through its
//!   manifest, recompute the Merkle root, check the stored proof against it
//!   and confirm the ledger entry is final and agrees. Success flips the
//!   dataset's `verified` flag.
//! - [`Registry::verify_proof`]: re-check one proof against its subject.
//!
//! A mismatch is reported as an invalid result with a message. Errors are
//! reserved for unknown ids and backend failures.

use chaintrain_core::{
    ContentDigest, Dataset, DatasetId, Proof, ProofId, ProofSubject, RequestHash,
    TrainingRecord,
};
use chaintrain_crypto::MerkleTree;
use chaintrain_ledger::FinalityStatus;
use chaintrain_zkp::{
    commitment, dataset, CommitmentCircuit, CommitmentProof, CommitmentProofSystem,
    DatasetProof, DatasetStatement, SampledMerkleProofSystem, SamplingPolicy,
};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::manifest::DatasetManifest;
use crate::registry::Registry;
use crate::trainer::{fingerprint, model_statement};

/// Outcome of checking data against a training record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Fingerprint matches and the signature holds.
    pub is_valid: bool,
    /// The record that was checked.
    pub request_hash: RequestHash,
    /// Human-readable explanation.
    pub message: String,
}

/// Outcome of re-deriving a registered dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetVerification {
    /// Every check passed.
    pub is_valid: bool,
    /// Dataset checked.
    pub dataset_id: DatasetId,
    /// Root recomputed from the stored chunks, when they could be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recomputed_root: Option<ContentDigest>,
    /// Human-readable explanation.
    pub message: String,
}

/// Outcome of re-checking a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofVerification {
    /// The proof verifies against its subject.
    pub is_valid: bool,
    /// Proof checked.
    pub proof_id: ProofId,
    /// Human-readable explanation.
    pub message: String,
}

impl DatasetVerification {
    fn invalid(dataset: &Dataset, root: Option<ContentDigest>, message: String) -> Self {
        tracing::warn!(dataset_id = %dataset.id, %message, "dataset verification failed");
        Self {
            is_valid: false,
            dataset_id: dataset.id.clone(),
            recomputed_root: root,
            message,
        }
    }
}

/// The statement a dataset's proof was generated over.
pub fn dataset_statement(dataset: &Dataset) -> DatasetStatement {
    DatasetStatement {
        dataset_id: dataset.id.clone(),
        blob_id: dataset.blob_id.clone(),
        merkle_root: dataset.merkle_root,
        chunk_count: dataset.chunks,
        size: dataset.size,
        chunk_size: dataset.chunk_size,
    }
}

impl Registry {
    /// Check `data` against the training record for `request_hash`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] when no record has this hash.
    pub async fn verify_training_data(
        &self,
        request_hash: &RequestHash,
        data: Vec<u8>,
    ) -> Result<VerificationResult, RegistryError> {
        let record = self
            .catalog
            .training_record(request_hash)
            .ok_or_else(|| RegistryError::not_found("training record", request_hash))?;
        let result = |is_valid: bool, message: &str| VerificationResult {
            is_valid,
            request_hash: *request_hash,
            message: message.to_string(),
        };

        if data.is_empty() {
            return Ok(result(false, "Dataset is empty"));
        }
        let chunk_size = usize::try_from(record.chunk_size).unwrap_or(usize::MAX);
        let fp = tokio::task::spawn_blocking(move || fingerprint(&data, chunk_size))
            .await
            .map_err(|e| RegistryError::Internal(format!("fingerprint task failed: {e}")))??;

        let outcome = if fp != record.dataset_fingerprint {
            result(
                false,
                "Dataset fingerprint does not match the one recorded for this training run",
            )
        } else if !self.signature_ok(&record) {
            result(false, "Dataset matches, but the training record signature is invalid")
        } else {
            result(true, "Dataset verified: fingerprint and signature match the training record")
        };
        tracing::info!(request_hash = %request_hash, is_valid = outcome.is_valid, "training data verified");
        Ok(outcome)
    }

    /// Re-derive a registered dataset from the blob store and the ledger.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] for an unknown dataset; blob store and
    /// ledger failures propagate.
    pub async fn verify_dataset(
        &self,
        id: &DatasetId,
    ) -> Result<DatasetVerification, RegistryError> {
        let dataset = self
            .catalog
            .dataset(id)
            .ok_or_else(|| RegistryError::not_found("dataset", id))?;

        let manifest_bytes = self.blobs.get(&dataset.blob_id).await?;
        let manifest = match DatasetManifest::from_bytes(&manifest_bytes) {
            Ok(m) => m,
            Err(e) => {
                return Ok(DatasetVerification::invalid(
                    &dataset,
                    None,
                    format!("Manifest blob is unreadable: {e}"),
                ))
            }
        };
        if manifest.chunk_size != dataset.chunk_size || manifest.size != dataset.size {
            return Ok(DatasetVerification::invalid(
                &dataset,
                None,
                "Manifest does not describe this dataset".into(),
            ));
        }

        let chunks = self.fetch_chunks(&manifest).await?;
        let mut leaves = Vec::with_capacity(chunks.len());
        for (entry, data) in manifest.chunks.iter().zip(&chunks) {
            let digest = ContentDigest::of(data);
            if digest != entry.digest || data.len() as u64 != entry.len {
                return Ok(DatasetVerification::invalid(
                    &dataset,
                    None,
                    format!("Chunk {} does not match its recorded digest", entry.index),
                ));
            }
            leaves.push(*digest.as_bytes());
        }
        let root = MerkleTree::from_leaves(leaves)?.root();
        if root != dataset.merkle_root {
            return Ok(DatasetVerification::invalid(
                &dataset,
                Some(root),
                "Recomputed Merkle root does not match the registered root".into(),
            ));
        }

        let Some(proof) = dataset.proof_id.as_ref().and_then(|p| self.catalog.proof(p)) else {
            return Ok(DatasetVerification::invalid(
                &dataset,
                Some(root),
                "Dataset has no proof record".into(),
            ));
        };
        let proof_digest = match self.check_dataset_proof(&proof, &dataset) {
            Ok(digest) => digest,
            Err(message) => return Ok(DatasetVerification::invalid(&dataset, Some(root), message)),
        };

        let entry = match &dataset.tx_digest {
            Some(tx) => self.ledger.entry(tx).await?,
            None => self.ledger.find_by_root(&root).await?,
        };
        let Some(entry) = entry else {
            return Ok(DatasetVerification::invalid(
                &dataset,
                Some(root),
                "No ledger entry anchors this dataset".into(),
            ));
        };
        if self.ledger.status(&entry.tx_digest).await? != FinalityStatus::Finalized {
            return Ok(DatasetVerification::invalid(
                &dataset,
                Some(root),
                format!("Ledger entry {} is not final", entry.tx_digest),
            ));
        }
        if entry.merkle_root != root
            || entry.blob_id != dataset.blob_id
            || entry.proof_digest != proof_digest
        {
            return Ok(DatasetVerification::invalid(
                &dataset,
                Some(root),
                format!("Ledger entry {} disagrees with the dataset record", entry.tx_digest),
            ));
        }

        self.catalog.mark_dataset_verified(&dataset.id).await;
        self.catalog.mark_proof_verified(&proof.id).await;
        tracing::info!(dataset_id = %dataset.id, merkle_root = %root, "dataset verified");
        Ok(DatasetVerification {
            is_valid: true,
            dataset_id: dataset.id,
            recomputed_root: Some(root),
            message: "Dataset verified: chunks, Merkle root, proof and ledger entry agree".into(),
        })
    }

    /// Re-check a proof against its dataset or model. A valid proof is
    /// marked verified.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] for an unknown proof or a missing subject.
    pub async fn verify_proof(&self, id: &ProofId) -> Result<ProofVerification, RegistryError> {
        let proof = self
            .catalog
            .proof(id)
            .ok_or_else(|| RegistryError::not_found("proof", id))?;

        let checked = match &proof.subject {
            ProofSubject::Dataset(dataset_id) => {
                let dataset = self
                    .catalog
                    .dataset(dataset_id)
                    .ok_or_else(|| RegistryError::not_found("dataset", dataset_id))?;
                self.check_dataset_proof(&proof, &dataset).map(|_| ())
            }
            ProofSubject::Model(model_id) => {
                let record = self
                    .catalog
                    .training_for_model(model_id)
                    .ok_or_else(|| RegistryError::not_found("training record", model_id))?;
                self.check_model_proof(&proof, &record)
            }
        };

        let verification = match checked {
            Ok(()) => {
                self.catalog.mark_proof_verified(&proof.id).await;
                ProofVerification {
                    is_valid: true,
                    proof_id: proof.id,
                    message: "Proof verified against its subject".into(),
                }
            }
            Err(message) => ProofVerification {
                is_valid: false,
                proof_id: proof.id,
                message,
            },
        };
        tracing::info!(proof_id = %id, is_valid = verification.is_valid, "proof verified");
        Ok(verification)
    }

    /// Verify a dataset proof; returns its digest for the ledger comparison.
    fn check_dataset_proof(&self, proof: &Proof, dataset: &Dataset) -> Result<ContentDigest, String> {
        if proof.system != dataset::SYSTEM_ID {
            return Err(format!("Unsupported proof system {}", proof.system));
        }
        let parsed = DatasetProof::from_proof_data(&proof.proof_data)
            .map_err(|e| format!("Proof data is malformed: {e}"))?;
        let policy = SamplingPolicy::default();
        match SampledMerkleProofSystem.verify_statement(&policy, &parsed, &dataset_statement(dataset)) {
            Ok(true) => parsed
                .digest()
                .map_err(|e| format!("Proof digest unavailable: {e}")),
            Ok(false) => Err("Proof does not verify against the dataset's Merkle root".into()),
            Err(e) => Err(format!("Proof could not be checked: {e}")),
        }
    }

    fn check_model_proof(&self, proof: &Proof, record: &TrainingRecord) -> Result<(), String> {
        if proof.system != commitment::SYSTEM_ID {
            return Err(format!("Unsupported proof system {}", proof.system));
        }
        let commitment = ContentDigest::from_hex(&proof.proof_data)
            .map_err(|e| format!("Proof data is malformed: {e}"))?;
        let circuit = CommitmentCircuit {
            statement: model_statement(record),
        };
        match CommitmentProofSystem.verify_circuit(&CommitmentProof { commitment }, &circuit) {
            Ok(true) if self.signature_ok(record) => Ok(()),
            Ok(true) => Err("Commitment holds but the training signature is invalid".into()),
            Ok(false) => Err("Commitment does not match the training record".into()),
            Err(e) => Err(format!("Proof could not be checked: {e}")),
        }
    }
}
