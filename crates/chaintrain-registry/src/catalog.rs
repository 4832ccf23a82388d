//! # Catalog
//!
//! The registry's record index: datasets, models, proofs and training
//! records. Reads are served from in-memory [`Store`]s; every write is also
//! pushed to the injected [`KeyValueStore`].
//!
//! Persistence is best-effort. A failed write is logged and swallowed: the
//! in-memory record stays authoritative for this process and the ledger
//! remains the source of truth for what was registered.

use std::sync::Arc;

use chaintrain_core::{
    BlobId, ContentDigest, Dataset, DatasetId, Model, ModelId, Proof, ProofId, ProofSubject,
    RequestHash, TrainingRecord,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::RegistryError;
use crate::kv::{KeyValueStore, MemoryKv};
use crate::store::Store;

const NS_DATASETS: &str = "datasets";
const NS_MODELS: &str = "models";
const NS_PROOFS: &str = "proofs";
const NS_TRAINING: &str = "training";

/// In-memory record index with write-through persistence.
#[derive(Debug, Clone)]
pub struct Catalog {
    datasets: Store<Dataset>,
    models: Store<Model>,
    proofs: Store<Proof>,
    training: Store<TrainingRecord>,
    kv: Arc<dyn KeyValueStore>,
}

impl Catalog {
    /// Hydrate from `kv`. Records that fail to decode are skipped with a
    /// warning.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Result<Self, RegistryError> {
        let catalog = Self {
            datasets: Store::new(),
            models: Store::new(),
            proofs: Store::new(),
            training: Store::new(),
            kv,
        };
        hydrate(&*catalog.kv, NS_DATASETS, &catalog.datasets).await?;
        hydrate(&*catalog.kv, NS_MODELS, &catalog.models).await?;
        hydrate(&*catalog.kv, NS_PROOFS, &catalog.proofs).await?;
        hydrate(&*catalog.kv, NS_TRAINING, &catalog.training).await?;
        tracing::info!(
            backend = catalog.kv.backend(),
            datasets = catalog.datasets.len(),
            models = catalog.models.len(),
            proofs = catalog.proofs.len(),
            training = catalog.training.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// An empty catalog persisting to process memory.
    pub fn in_memory() -> Self {
        Self {
            datasets: Store::new(),
            models: Store::new(),
            proofs: Store::new(),
            training: Store::new(),
            kv: Arc::new(MemoryKv::new()),
        }
    }

    /// Name of the persistence backend.
    pub fn backend(&self) -> &'static str {
        self.kv.backend()
    }

    async fn persist<T: Serialize>(&self, namespace: &str, key: &str, record: &T) {
        let value = match serde_json::to_value(record) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(namespace, key, error = %e, "failed to encode catalog record");
                return;
            }
        };
        if let Err(e) = self.kv.put(namespace, key, value).await {
            tracing::warn!(
                namespace,
                key,
                backend = self.kv.backend(),
                error = %e,
                "failed to persist catalog record"
            );
        }
    }

    // -- Datasets --------------------------------------------------------------

    /// Record a registered dataset.
    pub async fn insert_dataset(&self, dataset: Dataset) {
        let key = dataset.id.to_string();
        self.datasets.insert(key.clone(), dataset.clone());
        self.persist(NS_DATASETS, &key, &dataset).await;
    }

    /// Look up a dataset.
    pub fn dataset(&self, id: &DatasetId) -> Option<Dataset> {
        self.datasets.get(id.as_str())
    }

    /// Every dataset, newest first.
    pub fn datasets(&self) -> Vec<Dataset> {
        let mut all = self.datasets.list();
        all.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        all
    }

    /// The dataset whose manifest blob is `blob_id`.
    pub fn dataset_by_blob(&self, blob_id: &BlobId) -> Option<Dataset> {
        self.datasets.find(|d| &d.blob_id == blob_id)
    }

    /// The dataset registered from these bytes with this chunk size.
    pub fn dataset_by_fingerprint(
        &self,
        content_digest: &ContentDigest,
        chunk_size: u64,
    ) -> Option<Dataset> {
        self.datasets
            .find(|d| &d.content_digest == content_digest && d.chunk_size == chunk_size)
    }

    /// The dataset with this Merkle root.
    pub fn dataset_by_root(&self, root: &ContentDigest) -> Option<Dataset> {
        self.datasets.find(|d| &d.merkle_root == root)
    }

    /// Any dataset registered from these bytes, oldest first.
    pub fn dataset_by_content(&self, content_digest: &ContentDigest) -> Option<Dataset> {
        self.datasets()
            .into_iter()
            .rev()
            .find(|d| &d.content_digest == content_digest)
    }

    /// Flip a dataset's `verified` flag and persist it.
    pub async fn mark_dataset_verified(&self, id: &DatasetId) -> Option<Dataset> {
        let updated = self.datasets.update(id.as_str(), Dataset::mark_verified)?;
        self.persist(NS_DATASETS, id.as_str(), &updated).await;
        Some(updated)
    }

    // -- Models ----------------------------------------------------------------

    /// Record a model.
    pub async fn insert_model(&self, model: Model) {
        let key = model.id.to_string();
        self.models.insert(key.clone(), model.clone());
        self.persist(NS_MODELS, &key, &model).await;
    }

    /// Look up a model.
    pub fn model(&self, id: &ModelId) -> Option<Model> {
        self.models.get(id.as_str())
    }

    /// Every model, newest first.
    pub fn models(&self) -> Vec<Model> {
        let mut all = self.models.list();
        all.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        all
    }

    // -- Proofs ----------------------------------------------------------------

    /// Record a proof.
    pub async fn insert_proof(&self, proof: Proof) {
        let key = proof.id.to_string();
        self.proofs.insert(key.clone(), proof.clone());
        self.persist(NS_PROOFS, &key, &proof).await;
    }

    /// Look up a proof.
    pub fn proof(&self, id: &ProofId) -> Option<Proof> {
        self.proofs.get(id.as_str())
    }

    /// Every proof, newest first.
    pub fn proofs(&self) -> Vec<Proof> {
        let mut all = self.proofs.list();
        all.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        all
    }

    /// The proof attached to a subject, if any.
    pub fn proof_for(&self, subject: &ProofSubject) -> Option<Proof> {
        self.proofs.find(|p| &p.subject == subject)
    }

    /// Flip a proof's `verified` flag and persist it.
    pub async fn mark_proof_verified(&self, id: &ProofId) -> Option<Proof> {
        let updated = self.proofs.update(id.as_str(), |p| p.verified = true)?;
        self.persist(NS_PROOFS, id.as_str(), &updated).await;
        Some(updated)
    }

    // -- Training --------------------------------------------------------------

    /// Record a training run.
    pub async fn insert_training(&self, record: TrainingRecord) {
        let key = record.request_hash.to_string();
        self.training.insert(key.clone(), record.clone());
        self.persist(NS_TRAINING, &key, &record).await;
    }

    /// Look up a training record by request hash.
    pub fn training_record(&self, hash: &RequestHash) -> Option<TrainingRecord> {
        self.training.get(&hash.to_string())
    }

    /// The training record that produced a model.
    pub fn training_for_model(&self, id: &ModelId) -> Option<TrainingRecord> {
        self.training.find(|r| &r.model_id == id)
    }

    /// Every training record, newest first.
    pub fn training_history(&self) -> Vec<TrainingRecord> {
        let mut all = self.training.list();
        all.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.request_hash.cmp(&b.request_hash))
        });
        all
    }
}

async fn hydrate<T>(
    kv: &dyn KeyValueStore,
    namespace: &str,
    store: &Store<T>,
) -> Result<(), RegistryError>
where
    T: DeserializeOwned + Clone + Send + Sync,
{
    for (key, value) in kv.list(namespace).await? {
        match serde_json::from_value::<T>(value) {
            Ok(record) => {
                store.insert(key, record);
            }
            Err(e) => {
                tracing::warn!(namespace, key = %key, error = %e, "skipping undecodable catalog record");
            }
        }
    }
    Ok(())
}
