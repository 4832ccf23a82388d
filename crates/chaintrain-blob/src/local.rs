//! Filesystem blob store.
//!
//! Blobs live in a [`ContentAddressedStore`] under `{data_dir}/blobs/`. The
//! blob id is the lowercase hex SHA-256 of the bytes, so re-storing the same
//! bytes reports `already_certified` and reads are integrity-checked against
//! the id.

use std::path::PathBuf;

use async_trait::async_trait;
use chaintrain_core::{BlobId, BlobStorageInfo, ContentDigest};
use chaintrain_crypto::{ContentAddressedStore, CryptoError};

use crate::error::BlobError;
use crate::{BlobStore, StoredBlob};

const NAMESPACE: &str = "blobs";

/// Content-addressed blob store on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    cas: ContentAddressedStore,
}

impl LocalBlobStore {
    /// Store blobs under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            cas: ContentAddressedStore::new(data_dir),
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, BlobError>
    where
        T: Send + 'static,
        F: FnOnce(ContentAddressedStore) -> Result<T, BlobError> + Send + 'static,
    {
        let cas = self.cas.clone();
        tokio::task::spawn_blocking(move || f(cas))
            .await
            .map_err(|e| BlobError::Unavailable(format!("blob store task failed: {e}")))?
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn put(&self, bytes: &[u8]) -> Result<StoredBlob, BlobError> {
        let owned = bytes.to_vec();
        let size = owned.len() as u64;
        self.blocking(move |cas| {
            let existed = cas.contains(NAMESPACE, &ContentDigest::of(&owned))?;
            let digest = cas.store(NAMESPACE, &owned)?;
            let blob_id = BlobId::new(digest.to_hex()).map_err(|e| BlobError::UnexpectedResponse {
                endpoint: "local".into(),
                reason: e.to_string(),
            })?;
            Ok(StoredBlob {
                blob_id,
                storage: BlobStorageInfo {
                    storage_size: Some(size),
                    ..BlobStorageInfo::default()
                },
                already_certified: existed,
            })
        })
        .await
    }

    async fn get(&self, blob_id: &BlobId) -> Result<Vec<u8>, BlobError> {
        let id = blob_id.to_string();
        let digest =
            ContentDigest::from_hex(&id).map_err(|_| BlobError::NotFound(id.clone()))?;
        self.blocking(move |cas| match cas.resolve(NAMESPACE, &digest) {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(BlobError::NotFound(id)),
            Err(CryptoError::Cas(_)) => Err(BlobError::Integrity { blob_id: id }),
            Err(e) => Err(e.into()),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let stored = store.put(b"hello walrus").await.unwrap();
        assert_eq!(stored.blob_id.as_str(), ContentDigest::of(b"hello walrus").to_hex());
        assert!(!stored.already_certified);
        assert_eq!(store.get(&stored.blob_id).await.unwrap(), b"hello walrus");

        let again = store.put(b"hello walrus").await.unwrap();
        assert!(again.already_certified);
        assert_eq!(again.blob_id, stored.blob_id);
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let missing = BlobId::new(ContentDigest::of(b"nope").to_hex()).unwrap();
        assert!(matches!(store.get(&missing).await, Err(BlobError::NotFound(_))));
        let foreign = BlobId::new("M4hsZGQ1oCktdzegB6HnI6Mi28S2nqOPHxK").unwrap();
        assert!(matches!(store.get(&foreign).await, Err(BlobError::NotFound(_))));
    }

    #[tokio::test]
    async fn tampered_file_fails_integrity() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let stored = store.put(b"original").await.unwrap();
        let path = dir
            .path()
            .join(NAMESPACE)
            .join(format!("{}.bin", stored.blob_id));
        std::fs::write(&path, b"tampered").unwrap();
        assert!(matches!(
            store.get(&stored.blob_id).await,
            Err(BlobError::Integrity { .. })
        ));
    }
}
