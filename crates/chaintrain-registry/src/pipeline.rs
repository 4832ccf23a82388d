//! # Registration Pipeline
//!
//! Runs one upload through
//! `chunking → uploading → merkle → proof → registering → complete`:
//!
//! 1. The file is chunked on the blocking pool.
//! 2. The per-fingerprint lock is taken; a dataset already registered from
//!    the same bytes and chunk size is returned as a duplicate.
//! 3. Chunks are stored with bounded parallelism. Every acknowledgement is
//!    collected before anything else happens, then the manifest blob is
//!    stored; its id becomes the dataset's `blob_id`.
//! 4. The Merkle tree is built over the chunk digests.
//! 5. The dataset proof is generated on the blocking pool under the caller's
//!    cancellation token.
//! 6. The registration is submitted and polled until final. A ledger entry
//!    already anchoring the root is adopted instead when its manifest lists
//!    the same chunks.
//! 7. Only then are the proof and dataset written to the catalog.
//!
//! Any error, or cancellation, before step 7 leaves the catalog untouched and
//! marks the run failed. Blobs stored before the failure stay in the blob
//! store.

use std::sync::Arc;

use chaintrain_core::{
    BlobId, BlobStorageInfo, ContentDigest, Dataset, DatasetId, Proof, ProofId, ProofSubject, Timestamp,
    UploadId, ValidationError,
};
use chaintrain_crypto::{ChunkManifest, Chunker, MerkleTree};
use chaintrain_ledger::{await_finality, LedgerEntry, RegistrationRequest};
use chaintrain_state::RegistrationState;
use chaintrain_zkp::{
    dataset, DatasetCircuit, DatasetProof, DatasetStatement, ProofError, ProofSystem,
    ProveContext, SampledMerkleProofSystem, SamplingKey,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::RegistryError;
use crate::manifest::{DatasetManifest, ManifestChunk, MANIFEST_VERSION};
use crate::registry::{Registry, RunGuard};

/// A dataset file submitted for registration.
#[derive(Debug, Clone)]
pub struct DatasetUpload {
    /// File contents.
    pub bytes: Vec<u8>,
    /// Original filename.
    pub filename: String,
    /// Display name; defaults to the filename.
    pub name: Option<String>,
    /// Client-chosen id for progress polling; generated when absent.
    pub upload_id: Option<UploadId>,
}

/// Result of a successful registration.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    /// Run id, for `GET /api/uploads/{id}`.
    pub upload_id: UploadId,
    /// The registered dataset.
    pub dataset: Dataset,
    /// Its proof record.
    pub proof: Option<Proof>,
    /// The dataset was already registered; nothing new was stored.
    pub deduplicated: bool,
}

/// A reassembled dataset.
#[derive(Debug, Clone)]
pub struct DatasetDownload {
    /// Filename for `Content-Disposition`.
    pub filename: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

fn join_error(stage: &str, e: tokio::task::JoinError) -> RegistryError {
    RegistryError::Internal(format!("{stage} task failed: {e}"))
}

impl Registry {
    /// Register a dataset.
    ///
    /// Cancelling `cancel` aborts the run at the next stage boundary, chunk
    /// acknowledgement or prover checkpoint; nothing is written to the
    /// catalog.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Validation`] for an empty file,
    /// [`RegistryError::Conflict`] when `upload_id` names a run still in
    /// progress, [`RegistryError::Cancelled`] on cancellation, and the
    /// backend error of whichever stage failed otherwise.
    #[tracing::instrument(skip_all, fields(filename = %upload.filename, size = upload.bytes.len()))]
    pub async fn register(
        &self,
        upload: DatasetUpload,
        cancel: CancellationToken,
    ) -> Result<RegistrationOutcome, RegistryError> {
        if upload.bytes.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "file",
                reason: "file is empty".into(),
            }
            .into());
        }
        let upload_id = upload.upload_id.clone().unwrap_or_else(UploadId::generate);
        self.begin_run(&upload_id)?;
        let guard = RunGuard::new(self.runs.clone(), upload_id.clone());

        match self.run_pipeline(&upload_id, upload, &cancel).await {
            Ok(outcome) => {
                guard.disarm();
                tracing::info!(
                    upload_id = %upload_id,
                    dataset_id = %outcome.dataset.id,
                    merkle_root = %outcome.dataset.merkle_root,
                    deduplicated = outcome.deduplicated,
                    "dataset registered"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(upload_id = %upload_id, error = %e, "registration failed");
                guard.fail(&e.to_string());
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        upload_id: &UploadId,
        upload: DatasetUpload,
        cancel: &CancellationToken,
    ) -> Result<RegistrationOutcome, RegistryError> {
        let DatasetUpload {
            bytes,
            filename,
            name,
            ..
        } = upload;
        let bytes: Arc<[u8]> = Arc::from(bytes);

        // chunking
        let chunk_size = self.config.chunk_size;
        let chunks = {
            let bytes = Arc::clone(&bytes);
            tokio::task::spawn_blocking(move || Chunker::new(chunk_size)?.manifest(&bytes))
                .await
                .map_err(|e| join_error("chunking", e))??
        };
        self.progress(
            upload_id,
            format!("{} chunks of up to {} bytes", chunks.chunk_count(), chunks.chunk_size),
            Some(100),
        );

        let _lock = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RegistryError::Cancelled),
            guard = self.inflight.acquire((chunks.content_digest, chunks.chunk_size)) => guard,
        };
        if let Some(existing) = self
            .catalog
            .dataset_by_fingerprint(&chunks.content_digest, chunks.chunk_size)
        {
            return self.finish_duplicate(upload_id, existing);
        }

        // uploading
        self.advance(upload_id, RegistrationState::Uploading)?;
        let slots = self.upload_chunks(upload_id, &bytes, &chunks, cancel).await?;
        let acknowledged: Vec<bool> = slots.iter().map(Option::is_some).collect();
        if let Some(index) = acknowledged.iter().position(|ack| !ack) {
            return Err(ProofError::MissingAcknowledgement {
                index: index as u64,
            }
            .into());
        }
        let manifest = DatasetManifest {
            version: MANIFEST_VERSION,
            size: chunks.total_size,
            chunk_size: chunks.chunk_size,
            content_digest: chunks.content_digest,
            chunks: slots.into_iter().flatten().collect(),
        };
        let manifest_blob = self.blobs.put(&manifest.to_bytes()?).await?;
        self.progress(
            upload_id,
            format!("manifest stored as {}", manifest_blob.blob_id),
            Some(100),
        );
        if cancel.is_cancelled() {
            return Err(RegistryError::Cancelled);
        }

        // merkle
        self.advance(upload_id, RegistrationState::Merkle)?;
        let leaves = manifest.leaves();
        let root = tokio::task::spawn_blocking(move || MerkleTree::from_leaves(leaves))
            .await
            .map_err(|e| join_error("merkle", e))??
            .root();
        self.progress(upload_id, format!("merkle root {root}"), Some(100));
        if let Some(existing) = self.catalog.dataset_by_root(&root) {
            return self.finish_duplicate(upload_id, existing);
        }

        // proof
        self.advance(upload_id, RegistrationState::Proof)?;
        let anchored = self.ledger.find_by_root(&root).await?;
        let (dataset_id, blob_id, storage) = match &anchored {
            Some(entry) => {
                self.check_anchored_manifest(entry, &manifest_blob.blob_id, &manifest)
                    .await?;
                let storage = if entry.blob_id == manifest_blob.blob_id {
                    manifest_blob.storage
                } else {
                    BlobStorageInfo::default()
                };
                (entry.dataset_id.clone(), entry.blob_id.clone(), storage)
            }
            None => (
                DatasetId::generate(),
                manifest_blob.blob_id,
                manifest_blob.storage,
            ),
        };
        let circuit = DatasetCircuit {
            statement: DatasetStatement {
                dataset_id: dataset_id.clone(),
                blob_id: blob_id.clone(),
                merkle_root: root,
                chunk_count: chunks.chunk_count(),
                size: chunks.total_size,
                chunk_size: chunks.chunk_size,
            },
            leaves: manifest.leaves(),
            acknowledged,
        };
        let dataset_proof = self.prove_dataset(upload_id, circuit, cancel).await?;
        let proof_digest = dataset_proof.digest()?;
        let proof = Proof {
            id: ProofId::generate(),
            subject: ProofSubject::Dataset(dataset_id.clone()),
            system: dataset::SYSTEM_ID.to_string(),
            proof_data: dataset_proof.to_proof_data()?,
            verified: false,
            timestamp: Timestamp::now(),
            proof_url: None,
        };

        // registering
        self.advance(upload_id, RegistrationState::Registering)?;
        let entry = match anchored {
            Some(entry) => {
                if entry.proof_digest != proof_digest {
                    return Err(RegistryError::Conflict(format!(
                        "merkle root {root} is anchored with a proof built under other parameters"
                    )));
                }
                self.progress(
                    upload_id,
                    format!("already anchored as {}", entry.tx_digest),
                    None,
                );
                entry
            }
            None => self
                .submit(upload_id, &dataset_id, &blob_id, root, proof_digest, &chunks)
                .await?,
        };
        let finalized = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RegistryError::Cancelled),
            res = await_finality(self.ledger.as_ref(), &entry.tx_digest, self.config.finality) => res?,
        };
        self.progress(
            upload_id,
            format!("finalized at sequence {}", finalized.sequence),
            Some(100),
        );

        // complete
        let dataset = Dataset {
            id: dataset_id,
            blob_id,
            merkle_root: root,
            name: name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| filename.clone()),
            filename,
            size: chunks.total_size,
            chunks: chunks.chunk_count(),
            chunk_size: chunks.chunk_size,
            content_digest: chunks.content_digest,
            verified: false,
            timestamp: Timestamp::now(),
            proof_id: Some(proof.id.clone()),
            tx_digest: Some(finalized.tx_digest),
            storage,
        };
        self.catalog.insert_proof(proof.clone()).await;
        self.catalog.insert_dataset(dataset.clone()).await;
        self.advance(upload_id, RegistrationState::Complete)?;

        Ok(RegistrationOutcome {
            upload_id: upload_id.clone(),
            dataset,
            proof: Some(proof),
            deduplicated: false,
        })
    }

    /// Store every chunk, at most `upload_concurrency` at a time. Returns one
    /// slot per chunk in index order.
    async fn upload_chunks(
        &self,
        upload_id: &UploadId,
        bytes: &Arc<[u8]>,
        chunks: &ChunkManifest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Option<ManifestChunk>>, RegistryError> {
        let total = chunks.chunks.len();
        let semaphore = Arc::new(Semaphore::new(self.config.upload_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for chunk in &chunks.chunks {
            let blobs = Arc::clone(&self.blobs);
            let bytes = Arc::clone(bytes);
            let semaphore = Arc::clone(&semaphore);
            let chunk = chunk.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| RegistryError::Internal("upload semaphore closed".into()))?;
                let start = chunk.offset as usize;
                let end = start + chunk.len as usize;
                let stored = blobs.put(&bytes[start..end]).await?;
                Ok::<_, RegistryError>((chunk, stored))
            });
        }

        let mut slots: Vec<Option<ManifestChunk>> = vec![None; total];
        let mut acked = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(RegistryError::Cancelled);
                }
                next = tasks.join_next() => next,
            };
            let Some(joined) = next else { break };
            let (chunk, stored) = joined.map_err(|e| join_error("chunk upload", e))??;
            acked += 1;
            let index = chunk.index as usize;
            slots[index] = Some(ManifestChunk {
                index: chunk.index,
                blob_id: stored.blob_id,
                digest: chunk.digest,
                len: chunk.len,
            });
            self.progress(
                upload_id,
                format!("chunk {acked}/{total} stored"),
                Some((acked * 100 / total) as u8),
            );
        }
        Ok(slots)
    }

    async fn prove_dataset(
        &self,
        upload_id: &UploadId,
        circuit: DatasetCircuit,
        cancel: &CancellationToken,
    ) -> Result<DatasetProof, RegistryError> {
        let runs = self.runs.clone();
        let id = upload_id.clone();
        let token = cancel.clone();
        let key = SamplingKey {
            samples: self.config.proof_samples,
        };
        let result = tokio::task::spawn_blocking(move || {
            let cancelled = || token.is_cancelled();
            let progress = |percent: u8| {
                runs.modify(id.as_str(), |run| {
                    run.record_progress(format!("proof {percent}%"), Some(percent))
                });
            };
            SampledMerkleProofSystem.prove(&key, &circuit, &ProveContext::new(&cancelled, &progress))
        })
        .await
        .map_err(|e| join_error("proof", e))?;

        result.map_err(|e| match e {
            ProofError::Cancelled => RegistryError::Cancelled,
            other => other.into(),
        })
    }

    async fn submit(
        &self,
        upload_id: &UploadId,
        dataset_id: &DatasetId,
        blob_id: &BlobId,
        root: ContentDigest,
        proof_digest: ContentDigest,
        chunks: &ChunkManifest,
    ) -> Result<LedgerEntry, RegistryError> {
        let submission = self
            .ledger
            .submit(RegistrationRequest {
                dataset_id: dataset_id.clone(),
                blob_id: Some(blob_id.clone()),
                merkle_root: Some(root),
                proof_digest,
                size: chunks.total_size,
                chunks: chunks.chunk_count(),
            })
            .await?;
        if submission.already_registered && &submission.entry.dataset_id != dataset_id {
            return Err(RegistryError::Conflict(format!(
                "merkle root {root} was registered concurrently as dataset {}",
                submission.entry.dataset_id
            )));
        }
        self.progress(
            upload_id,
            format!("submitted as {}", submission.entry.tx_digest),
            None,
        );
        Ok(submission.entry)
    }

    /// A ledger entry for `root` exists but the catalog has no dataset for it
    /// (lost catalog, or an earlier run that stopped after submitting). The
    /// entry is adopted if its manifest lists the same chunks.
    async fn check_anchored_manifest(
        &self,
        entry: &LedgerEntry,
        stored: &BlobId,
        manifest: &DatasetManifest,
    ) -> Result<(), RegistryError> {
        if &entry.blob_id == stored {
            return Ok(());
        }
        let anchored = DatasetManifest::from_bytes(&self.blobs.get(&entry.blob_id).await?)?;
        if anchored.leaves() != manifest.leaves()
            || anchored.chunk_size != manifest.chunk_size
            || anchored.content_digest != manifest.content_digest
        {
            return Err(RegistryError::Conflict(format!(
                "merkle root {} is anchored with manifest {} listing other chunks",
                entry.merkle_root, entry.blob_id
            )));
        }
        tracing::info!(
            anchored = %entry.blob_id,
            stored = %stored,
            "adopting manifest of anchored registration"
        );
        Ok(())
    }

    /// Walk the run to `complete` for a dataset that is already registered.
    fn finish_duplicate(
        &self,
        upload_id: &UploadId,
        existing: Dataset,
    ) -> Result<RegistrationOutcome, RegistryError> {
        self.progress(
            upload_id,
            format!("dataset already registered as {}", existing.id),
            None,
        );
        loop {
            let state = self
                .runs
                .get(upload_id.as_str())
                .map(|run| run.state)
                .ok_or_else(|| RegistryError::Internal(format!("run {upload_id} disappeared")))?;
            if state == RegistrationState::Complete {
                break;
            }
            let next = state
                .valid_transitions()
                .iter()
                .copied()
                .find(|s| *s != RegistrationState::Failed)
                .ok_or_else(|| {
                    RegistryError::Internal(format!("run {upload_id} cannot complete from {state}"))
                })?;
            self.advance(upload_id, next)?;
        }
        let proof = existing
            .proof_id
            .as_ref()
            .and_then(|id| self.catalog.proof(id));
        Ok(RegistrationOutcome {
            upload_id: upload_id.clone(),
            dataset: existing,
            proof,
            deduplicated: true,
        })
    }

    /// Reassemble a dataset from its manifest blob, checking every chunk
    /// digest, the Merkle root and the whole-file digest. A blob id with no
    /// catalog record is served raw.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Integrity`] when any check fails.
    pub async fn download(&self, blob_id: &BlobId) -> Result<DatasetDownload, RegistryError> {
        let Some(dataset) = self.catalog.dataset_by_blob(blob_id) else {
            let bytes = self.blobs.get(blob_id).await?;
            return Ok(DatasetDownload {
                filename: blob_id.to_string(),
                bytes,
            });
        };

        let manifest = DatasetManifest::from_bytes(&self.blobs.get(blob_id).await?)?;
        if manifest.content_digest != dataset.content_digest || manifest.size != dataset.size {
            return Err(RegistryError::Integrity(format!(
                "manifest {blob_id} does not describe dataset {}",
                dataset.id
            )));
        }
        let root = MerkleTree::from_leaves(manifest.leaves())?.root();
        if root != dataset.merkle_root {
            return Err(RegistryError::Integrity(format!(
                "manifest {blob_id} hashes to root {root}, dataset records {}",
                dataset.merkle_root
            )));
        }

        let mut bytes = Vec::with_capacity(dataset.size as usize);
        for (chunk, data) in manifest.chunks.iter().zip(self.fetch_chunks(&manifest).await?) {
            if data.len() as u64 != chunk.len || ContentDigest::of(&data) != chunk.digest {
                return Err(RegistryError::Integrity(format!(
                    "chunk {} of dataset {} failed its digest check",
                    chunk.index, dataset.id
                )));
            }
            bytes.extend_from_slice(&data);
        }
        if ContentDigest::of(&bytes) != dataset.content_digest {
            return Err(RegistryError::Integrity(format!(
                "dataset {} reassembled to the wrong content",
                dataset.id
            )));
        }
        Ok(DatasetDownload {
            filename: dataset.filename,
            bytes,
        })
    }

    /// Fetch every chunk listed in `manifest`, in order, without checking
    /// digests.
    pub(crate) async fn fetch_chunks(
        &self,
        manifest: &DatasetManifest,
    ) -> Result<Vec<Vec<u8>>, RegistryError> {
        let semaphore = Arc::new(Semaphore::new(self.config.upload_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for chunk in &manifest.chunks {
            let blobs = Arc::clone(&self.blobs);
            let semaphore = Arc::clone(&semaphore);
            let index = chunk.index as usize;
            let blob_id = chunk.blob_id.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| RegistryError::Internal("download semaphore closed".into()))?;
                let data = blobs.get(&blob_id).await?;
                Ok::<_, RegistryError>((index, data))
            });
        }
        let mut slots: Vec<Vec<u8>> = vec![Vec::new(); manifest.chunks.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, data) = joined.map_err(|e| join_error("chunk download", e))??;
            slots[index] = data;
        }
        Ok(slots)
    }
}
