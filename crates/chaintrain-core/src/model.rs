//! # Registry Data Model
//!
//! The records the registry persists and the dashboard renders: [`Dataset`],
//! [`Model`], [`Proof`] and [`TrainingRecord`].
//!
//! Datasets are immutable once registered. The only field that ever changes
//! is `verified`, and only through [`Dataset::mark_verified`], which the
//! verifier calls after a successful re-derivation. Models only grow their
//! `dataset_ids` list.

use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::error::ValidationError;
use crate::identity::{BlobId, DatasetId, ModelId, ProofId, RequestHash, TxDigest};
use crate::temporal::Timestamp;

/// Storage metadata reported by the blob store for the dataset's manifest
/// blob. All fields are optional because local backends report none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobStorageInfo {
    /// On-chain object id of the blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_object_id: Option<String>,
    /// Storage resource object id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,
    /// First epoch covered by the storage resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_epoch: Option<u64>,
    /// Epoch at which storage expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_epoch: Option<u64>,
    /// Reserved storage size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<u64>,
    /// Epoch in which the blob was registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_epoch: Option<u64>,
    /// Erasure coding scheme name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_type: Option<String>,
    /// Storage cost charged by the publisher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<u64>,
    /// Encoded length after erasure coding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoded_length: Option<u64>,
}

/// A registered dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Registry-assigned identifier.
    pub id: DatasetId,
    /// Blob id of the dataset manifest.
    pub blob_id: BlobId,
    /// Merkle root over the chunk sequence.
    pub merkle_root: ContentDigest,
    /// Display name.
    pub name: String,
    /// Original filename, used for `Content-Disposition` on download.
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// Number of chunks.
    pub chunks: u64,
    /// Chunk size the dataset was split with.
    pub chunk_size: u64,
    /// SHA-256 of the whole file.
    pub content_digest: ContentDigest,
    /// Set once the verifier has re-derived the root from stored chunks.
    pub verified: bool,
    /// Registration time.
    pub timestamp: Timestamp,
    /// Proof generated over the Merkle root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_id: Option<ProofId>,
    /// Ledger transaction that anchored the dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_digest: Option<TxDigest>,
    /// Blob store metadata for the manifest blob.
    #[serde(default)]
    pub storage: BlobStorageInfo,
}

impl Dataset {
    /// Flip `verified` to true. There is no way to flip it back.
    pub fn mark_verified(&mut self) {
        self.verified = true;
    }
}

/// A model produced by a training run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Registry-assigned identifier.
    pub id: ModelId,
    /// Training request hash that produced this model.
    pub hash: RequestHash,
    /// Display name.
    pub name: String,
    /// Datasets the model was trained on. Append-only.
    pub dataset_ids: Vec<DatasetId>,
    /// Whether the training signature and every dataset have been verified.
    pub verified: bool,
    /// Creation time.
    pub timestamp: Timestamp,
    /// Blob holding serialized weights, when stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_id: Option<BlobId>,
}

impl Model {
    /// Append a dataset to the lineage list. Duplicates are ignored.
    pub fn add_dataset(&mut self, id: DatasetId) {
        if !self.dataset_ids.contains(&id) {
            self.dataset_ids.push(id);
        }
    }
}

/// What a proof attests to. Exactly one subject per proof.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProofSubject {
    /// Proof over a dataset's Merkle root.
    Dataset(DatasetId),
    /// Proof over a model's training record.
    Model(ModelId),
}

/// A stored proof record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProofRepr", into = "ProofRepr")]
pub struct Proof {
    /// Registry-assigned identifier.
    pub id: ProofId,
    /// The dataset or model this proof is about.
    pub subject: ProofSubject,
    /// Proof system that produced `proof_data`.
    pub system: String,
    /// Hex-encoded serialized proof.
    pub proof_data: String,
    /// Set after a successful re-verification.
    pub verified: bool,
    /// Creation time.
    pub timestamp: Timestamp,
    /// Where the proof can be fetched from, when published.
    pub proof_url: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ProofRepr {
    id: ProofId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dataset_id: Option<DatasetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_id: Option<ModelId>,
    system: String,
    proof_data: String,
    verified: bool,
    timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proof_url: Option<String>,
}

impl TryFrom<ProofRepr> for Proof {
    type Error = ValidationError;

    fn try_from(r: ProofRepr) -> Result<Self, Self::Error> {
        let subject = match (r.dataset_id, r.model_id) {
            (Some(d), None) => ProofSubject::Dataset(d),
            (None, Some(m)) => ProofSubject::Model(m),
            (Some(_), Some(_)) => {
                return Err(ValidationError::InvalidValue {
                    field: "subject",
                    reason: "proof names both a dataset and a model".into(),
                })
            }
            (None, None) => return Err(ValidationError::MissingField("dataset_id or model_id")),
        };
        Ok(Self {
            id: r.id,
            subject,
            system: r.system,
            proof_data: r.proof_data,
            verified: r.verified,
            timestamp: r.timestamp,
            proof_url: r.proof_url,
        })
    }
}

impl From<Proof> for ProofRepr {
    fn from(p: Proof) -> Self {
        let (dataset_id, model_id) = match p.subject {
            ProofSubject::Dataset(d) => (Some(d), None),
            ProofSubject::Model(m) => (None, Some(m)),
        };
        Self {
            id: p.id,
            dataset_id,
            model_id,
            system: p.system,
            proof_data: p.proof_data,
            verified: p.verified,
            timestamp: p.timestamp,
            proof_url: p.proof_url,
        }
    }
}

/// A signed training run: the lineage edge dataset → model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRecord {
    /// SHA-256 of the canonical request payload.
    pub request_hash: RequestHash,
    /// Derived weights in basis points; rendered as fractions in JSON.
    #[serde(rename = "modelWeights", with = "basis_points")]
    pub weights_bp: Vec<u32>,
    /// Where the training data came from (filename or server path).
    pub dataset_source: String,
    /// Merkle root of the training data.
    pub dataset_fingerprint: ContentDigest,
    /// Chunk size the fingerprint was computed with.
    pub chunk_size: u64,
    /// Model produced by this run.
    pub model_id: ModelId,
    /// Registered dataset matching the fingerprint, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<DatasetId>,
    /// Hex Ed25519 signature over the training intent.
    pub signature: String,
    /// Hex Ed25519 public key of the signer.
    pub public_key: String,
    /// Signing time; part of the signed intent.
    pub timestamp: Timestamp,
}

impl TrainingRecord {
    /// Weights as fractions in `[0, 1)`.
    pub fn model_weights(&self) -> Vec<f64> {
        self.weights_bp.iter().map(|bp| f64::from(*bp) / 10_000.0).collect()
    }
}

mod basis_points {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bp: &[u32], serializer: S) -> Result<S::Ok, S::Error> {
        let fractions: Vec<f64> = bp.iter().map(|b| f64::from(*b) / 10_000.0).collect();
        fractions.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u32>, D::Error> {
        let fractions = Vec::<f64>::deserialize(deserializer)?;
        fractions
            .into_iter()
            .map(|w| {
                if !(0.0..1.0).contains(&w) {
                    return Err(serde::de::Error::custom(format!("weight out of range: {w}")));
                }
                Ok((w * 10_000.0).round() as u32)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proof(subject: ProofSubject) -> Proof {
        Proof {
            id: ProofId::new("proof-1").unwrap(),
            subject,
            system: "test".into(),
            proof_data: "00".into(),
            verified: false,
            timestamp: Timestamp::from_epoch_millis(1).unwrap(),
            proof_url: None,
        }
    }

    #[test]
    fn proof_json_carries_exactly_one_subject_key() {
        let p = proof(ProofSubject::Dataset(DatasetId::new("d1").unwrap()));
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["dataset_id"], "d1");
        assert!(v.get("model_id").is_none());
        let back: Proof = serde_json::from_value(v).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn proof_with_both_subjects_is_rejected() {
        let json = serde_json::json!({
            "id": "p", "dataset_id": "d", "model_id": "m", "system": "s",
            "proof_data": "", "verified": false, "timestamp": 0
        });
        assert!(serde_json::from_value::<Proof>(json).is_err());
    }

    #[test]
    fn proof_with_no_subject_is_rejected() {
        let json = serde_json::json!({
            "id": "p", "system": "s", "proof_data": "", "verified": false, "timestamp": 0
        });
        assert!(serde_json::from_value::<Proof>(json).is_err());
    }

    #[test]
    fn training_record_renders_fractional_weights() {
        let rec = TrainingRecord {
            request_hash: RequestHash(ContentDigest::of(b"r")),
            weights_bp: vec![0, 2500, 9999],
            dataset_source: "train.csv".into(),
            dataset_fingerprint: ContentDigest::of(b"f"),
            chunk_size: 1024,
            model_id: ModelId::new("model-1").unwrap(),
            dataset_id: None,
            signature: "ab".into(),
            public_key: "cd".into(),
            timestamp: Timestamp::from_epoch_millis(5).unwrap(),
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["modelWeights"], serde_json::json!([0.0, 0.25, 0.9999]));
        assert!(v.get("requestHash").is_some());
        let back: TrainingRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back.weights_bp, rec.weights_bp);
    }

    #[test]
    fn model_dataset_list_is_append_only_and_deduplicated() {
        let mut m = Model {
            id: ModelId::new("m").unwrap(),
            hash: RequestHash(ContentDigest::of(b"h")),
            name: "m".into(),
            dataset_ids: vec![],
            verified: false,
            timestamp: Timestamp::now(),
            blob_id: None,
        };
        m.add_dataset(DatasetId::new("a").unwrap());
        m.add_dataset(DatasetId::new("b").unwrap());
        m.add_dataset(DatasetId::new("a").unwrap());
        assert_eq!(m.dataset_ids.len(), 2);
        assert_eq!(m.dataset_ids[0].as_str(), "a");
    }
}
