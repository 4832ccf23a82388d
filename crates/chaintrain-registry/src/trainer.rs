//! # Trainer
//!
//! Derives model weights from a dataset fingerprint and signs the result
//! with the service key. The fingerprint is the dataset's Merkle root, so a
//! training record links to a registered dataset exactly when the bytes and
//! chunk size match.
//!
//! ```text
//! fingerprint   = merkle_root(chunks(data, chunk_size))
//! request_hash  = sha256(canonical({"input_data": hex(fingerprint)}))
//! seed          = u64::from_be(request_hash[0..8])
//! weight[i]     = (seed + i) mod 10000        (basis points, i in 0..10)
//! ```
//!
//! The signed message is the canonical intent
//! `{"intent": "ProcessData", "timestamp_ms": ..., "data": {"request_hash":
//! ..., "weights_bp": [...]}}`.

use std::path::{Path, PathBuf};

use chaintrain_core::{
    sha256_digest, CanonicalBytes, ContentDigest, Dataset, Model, ModelId, Proof, ProofId,
    ProofSubject, RequestHash, Timestamp, TrainingRecord, ValidationError,
};
use chaintrain_crypto::{
    verify_with_public_key, Chunker, Ed25519PublicKey, Ed25519Signature, MerkleTree,
};
use chaintrain_zkp::{commitment, CommitmentCircuit, CommitmentProofSystem, ProofSystem, ProveContext};
use serde_json::{json, Value};

use crate::error::RegistryError;
use crate::registry::Registry;

/// Number of derived weights.
pub const WEIGHT_COUNT: u64 = 10;

/// Intent scope of a training signature.
pub const TRAINING_INTENT: &str = "ProcessData";

/// Training data and where it came from.
#[derive(Debug, Clone)]
pub struct DatasetSource {
    /// File contents.
    pub bytes: Vec<u8>,
    /// Filename or server-relative path.
    pub source: String,
}

/// Result of a training request.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// The signed record.
    pub record: TrainingRecord,
    /// Model produced by the run.
    pub model: Option<Model>,
    /// Commitment proof over the record.
    pub proof: Option<Proof>,
    /// The same data was trained on before; the earlier record is returned.
    pub existing: bool,
}

/// Resolve `requested` under `root`, refusing anything that escapes it.
pub fn resolve_dataset_path(root: &Path, requested: &str) -> Result<PathBuf, RegistryError> {
    let invalid = |reason: &str| {
        RegistryError::Validation(ValidationError::InvalidValue {
            field: "datasetPath",
            reason: reason.to_string(),
        })
    };
    if requested.trim().is_empty() {
        return Err(invalid("path is empty"));
    }
    let root = root
        .canonicalize()
        .map_err(|e| RegistryError::Internal(format!("dataset root unavailable: {e}")))?;
    let candidate = root.join(requested.trim_start_matches('/'));
    let resolved = candidate
        .canonicalize()
        .map_err(|_| RegistryError::not_found("dataset file", requested))?;
    if !resolved.starts_with(&root) {
        return Err(invalid("path escapes the dataset root"));
    }
    if !resolved.is_file() {
        return Err(invalid("path is not a file"));
    }
    Ok(resolved)
}

/// Read a server-local dataset confined to `root`.
pub async fn load_dataset_path(root: &Path, requested: &str) -> Result<DatasetSource, RegistryError> {
    let path = resolve_dataset_path(root, requested)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| RegistryError::Internal(format!("failed to read {}: {e}", path.display())))?;
    Ok(DatasetSource {
        bytes,
        source: requested.to_string(),
    })
}

/// Merkle root of `bytes` split at `chunk_size`.
pub fn fingerprint(bytes: &[u8], chunk_size: usize) -> Result<ContentDigest, RegistryError> {
    let manifest = Chunker::new(chunk_size)?.manifest(bytes)?;
    Ok(MerkleTree::from_leaves(manifest.leaves())?.root())
}

/// Hash of the canonical training request for a fingerprint.
pub fn request_hash(fingerprint: &ContentDigest) -> Result<RequestHash, RegistryError> {
    let payload = CanonicalBytes::from_value(json!({ "input_data": fingerprint.to_hex() }))?;
    Ok(RequestHash(sha256_digest(&payload)))
}

/// Weights in basis points seeded from the request hash.
pub fn derive_weights(hash: &RequestHash) -> Vec<u32> {
    let seed = hash.0.seed_u64();
    (0..WEIGHT_COUNT)
        .map(|i| (seed.wrapping_add(i) % 10_000) as u32)
        .collect()
}

/// The canonical intent message a training record's signature covers.
pub fn training_intent(
    hash: &RequestHash,
    weights_bp: &[u32],
    timestamp: Timestamp,
) -> Result<CanonicalBytes, RegistryError> {
    Ok(CanonicalBytes::from_value(json!({
        "intent": TRAINING_INTENT,
        "timestamp_ms": timestamp.epoch_millis(),
        "data": {
            "request_hash": hash.to_string(),
            "weights_bp": weights_bp,
        },
    }))?)
}

/// Public statement bound by a model's commitment proof.
pub fn model_statement(record: &TrainingRecord) -> Value {
    json!({
        "request_hash": record.request_hash.to_string(),
        "dataset_fingerprint": record.dataset_fingerprint.to_hex(),
        "chunk_size": record.chunk_size,
        "model_id": record.model_id.as_str(),
        "weights_bp": record.weights_bp,
    })
}

/// Whether a record's signature verifies under its own public key.
pub fn signature_valid(record: &TrainingRecord) -> bool {
    let check = || -> Result<(), RegistryError> {
        let intent = training_intent(&record.request_hash, &record.weights_bp, record.timestamp)?;
        let signature = Ed25519Signature::from_hex(&record.signature)?;
        let public_key = Ed25519PublicKey::from_hex(&record.public_key)?;
        verify_with_public_key(&intent, &signature, &public_key)?;
        Ok(())
    };
    check().is_ok()
}

impl Registry {
    /// Whether `record` was signed by this service and the signature holds.
    pub fn signature_ok(&self, record: &TrainingRecord) -> bool {
        record.public_key == self.signer.public_key().to_hex() && signature_valid(record)
    }

    /// Run a training request.
    ///
    /// The chunk size is taken from a registered dataset with the same
    /// content when there is one, so the fingerprint matches its Merkle
    /// root; otherwise the configured default applies. Training identical
    /// data again returns the first record.
    #[tracing::instrument(skip_all, fields(source = %input.source, size = input.bytes.len()))]
    pub async fn train(&self, input: DatasetSource) -> Result<TrainingOutcome, RegistryError> {
        if input.bytes.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "dataset",
                reason: "dataset is empty".into(),
            }
            .into());
        }
        let DatasetSource { bytes, source } = input;

        let content_digest = ContentDigest::of(&bytes);
        let matched: Option<Dataset> = self.catalog.dataset_by_content(&content_digest);
        let chunk_size = matched
            .as_ref()
            .map(|d| d.chunk_size as usize)
            .unwrap_or(self.config.chunk_size);
        let fp = tokio::task::spawn_blocking(move || fingerprint(&bytes, chunk_size))
            .await
            .map_err(|e| RegistryError::Internal(format!("fingerprint task failed: {e}")))??;
        let hash = request_hash(&fp)?;

        let _lock = self.training_locks.acquire(hash).await;
        if let Some(record) = self.catalog.training_record(&hash) {
            tracing::debug!(request_hash = %hash, "training request already recorded");
            let model = self.catalog.model(&record.model_id);
            let proof = self
                .catalog
                .proof_for(&ProofSubject::Model(record.model_id.clone()));
            return Ok(TrainingOutcome {
                record,
                model,
                proof,
                existing: true,
            });
        }

        let weights_bp = derive_weights(&hash);
        let timestamp = Timestamp::now();
        let intent = training_intent(&hash, &weights_bp, timestamp)?;
        let signature = self.signer.sign(&intent);
        let model_id = ModelId::generate();
        let dataset_id = matched
            .as_ref()
            .filter(|d| d.merkle_root == fp)
            .map(|d| d.id.clone());

        let record = TrainingRecord {
            request_hash: hash,
            weights_bp,
            dataset_source: source.clone(),
            dataset_fingerprint: fp,
            chunk_size: chunk_size as u64,
            model_id: model_id.clone(),
            dataset_id: dataset_id.clone(),
            signature: signature.to_hex(),
            public_key: self.signer.public_key().to_hex(),
            timestamp,
        };
        let model = Model {
            id: model_id.clone(),
            hash,
            name: format!("model trained on {source}"),
            dataset_ids: dataset_id.into_iter().collect(),
            verified: self.signature_ok(&record),
            timestamp,
            blob_id: None,
        };
        let commitment = CommitmentProofSystem.prove(
            &(),
            &CommitmentCircuit {
                statement: model_statement(&record),
            },
            &ProveContext::detached(),
        )?;
        let proof = Proof {
            id: ProofId::generate(),
            subject: ProofSubject::Model(model_id),
            system: commitment::SYSTEM_ID.to_string(),
            proof_data: commitment.commitment.to_hex(),
            verified: false,
            timestamp,
            proof_url: None,
        };

        self.catalog.insert_model(model.clone()).await;
        self.catalog.insert_proof(proof.clone()).await;
        self.catalog.insert_training(record.clone()).await;
        tracing::info!(
            request_hash = %hash,
            model_id = %model.id,
            linked = model.dataset_ids.len(),
            "training recorded"
        );

        Ok(TrainingOutcome {
            record,
            model: Some(model),
            proof: Some(proof),
            existing: false,
        })
    }
}
