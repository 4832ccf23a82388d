//! In-memory blob store for tests and ephemeral runs.
//!
//! Ids are content addresses like [`LocalBlobStore`](crate::LocalBlobStore),
//! but reads are not integrity-checked so tests can simulate a store that
//! serves tampered bytes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chaintrain_core::{BlobId, BlobStorageInfo, ContentDigest};
use parking_lot::RwLock;

use crate::error::BlobError;
use crate::{BlobStore, StoredBlob};

/// Blob store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
    puts: AtomicU64,
}

impl MemoryBlobStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Total successful `put` calls, including repeats of known bytes.
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    /// Replace the bytes served for `blob_id`.
    pub fn overwrite(&self, blob_id: &BlobId, bytes: Vec<u8>) {
        self.blobs.write().insert(blob_id.to_string(), bytes);
    }

    /// Drop a blob.
    pub fn remove(&self, blob_id: &BlobId) -> bool {
        self.blobs.write().remove(blob_id.as_str()).is_some()
    }

    /// Make every subsequent call fail with [`BlobError::Unavailable`].
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), BlobError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, bytes: &[u8]) -> Result<StoredBlob, BlobError> {
        self.check_available()?;
        let hex = ContentDigest::of(bytes).to_hex();
        let blob_id = BlobId::new(hex.clone()).map_err(|e| BlobError::UnexpectedResponse {
            endpoint: "memory".into(),
            reason: e.to_string(),
        })?;
        let existed = {
            let mut blobs = self.blobs.write();
            let existed = blobs.contains_key(&hex);
            if !existed {
                blobs.insert(hex, bytes.to_vec());
            }
            existed
        };
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(StoredBlob {
            blob_id,
            storage: BlobStorageInfo {
                storage_size: Some(bytes.len() as u64),
                ..BlobStorageInfo::default()
            },
            already_certified: existed,
        })
    }

    async fn get(&self, blob_id: &BlobId) -> Result<Vec<u8>, BlobError> {
        self.check_available()?;
        self.blobs
            .read()
            .get(blob_id.as_str())
            .cloned()
            .ok_or_else(|| BlobError::NotFound(blob_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_and_dedupe() {
        let store = MemoryBlobStore::new();
        let a = store.put(b"abc").await.unwrap();
        let b = store.put(b"abc").await.unwrap();
        assert_eq!(a.blob_id, b.blob_id);
        assert!(b.already_certified);
        assert_eq!(store.len(), 1);
        assert_eq!(store.put_count(), 2);
        assert_eq!(store.get(&a.blob_id).await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn overwrite_serves_tampered_bytes() {
        let store = MemoryBlobStore::new();
        let a = store.put(b"abc").await.unwrap();
        store.overwrite(&a.blob_id, b"abd".to_vec());
        assert_eq!(store.get(&a.blob_id).await.unwrap(), b"abd");
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemoryBlobStore::new();
        store.set_unavailable(true);
        let err = store.put(b"abc").await.unwrap_err();
        assert!(err.is_unavailable());
        store.set_unavailable(false);
        let a = store.put(b"abc").await.unwrap();
        assert!(store.remove(&a.blob_id));
        assert!(matches!(store.get(&a.blob_id).await, Err(BlobError::NotFound(_))));
    }
}
