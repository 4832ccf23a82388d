//! # Dataset Manifest
//!
//! The manifest is the blob a dataset's `blob_id` points at. It lists every
//! chunk blob in order with its digest and length, so the dataset can be
//! reassembled and re-fingerprinted from the blob store alone.
//!
//! The manifest is stored as canonical JSON and carries nothing but the
//! chunk listing (the filename lives on the dataset record), so the same
//! bytes always yield the same manifest and, on a content-addressed store,
//! the same blob id.

use chaintrain_core::{BlobId, CanonicalBytes, ContentDigest, ValidationError};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// One stored chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestChunk {
    /// Position in the chunk sequence.
    pub index: u64,
    /// Blob holding the chunk bytes.
    pub blob_id: BlobId,
    /// SHA-256 of the chunk bytes (the Merkle leaf).
    pub digest: ContentDigest,
    /// Chunk length in bytes.
    pub len: u64,
}

/// Ordered chunk listing for one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetManifest {
    /// Format version.
    pub version: u32,
    /// Total size in bytes.
    pub size: u64,
    /// Chunk size the file was split with.
    pub chunk_size: u64,
    /// SHA-256 of the whole file.
    pub content_digest: ContentDigest,
    /// Chunks in order.
    pub chunks: Vec<ManifestChunk>,
}

impl DatasetManifest {
    /// Canonical JSON bytes, as stored in the blob store.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RegistryError> {
        Ok(CanonicalBytes::new(self)?.into_bytes())
    }

    /// Parse and validate manifest bytes fetched from the blob store.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RegistryError> {
        let manifest: Self = serde_json::from_slice(bytes).map_err(|e| {
            RegistryError::Integrity(format!("manifest is not valid JSON: {e}"))
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check version, ordering and that the lengths add up.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version != MANIFEST_VERSION {
            return Err(ValidationError::InvalidValue {
                field: "version",
                reason: format!("unsupported manifest version {}", self.version),
            });
        }
        if self.chunks.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "chunks",
                reason: "manifest lists no chunks".into(),
            });
        }
        if self.chunk_size == 0 {
            return Err(ValidationError::InvalidValue {
                field: "chunk_size",
                reason: "must be positive".into(),
            });
        }
        let mut total = 0u64;
        for (i, c) in self.chunks.iter().enumerate() {
            if c.index != i as u64 {
                return Err(ValidationError::InvalidValue {
                    field: "chunks",
                    reason: format!("chunk at position {i} has index {}", c.index),
                });
            }
            let last = i + 1 == self.chunks.len();
            if c.len == 0 || c.len > self.chunk_size || (!last && c.len != self.chunk_size) {
                return Err(ValidationError::InvalidValue {
                    field: "chunks",
                    reason: format!("chunk {i} has length {}", c.len),
                });
            }
            total += c.len;
        }
        if total != self.size {
            return Err(ValidationError::InvalidValue {
                field: "size",
                reason: format!("chunks add up to {total} bytes, manifest says {}", self.size),
            });
        }
        Ok(())
    }

    /// Merkle leaves in chunk order.
    pub fn leaves(&self) -> Vec<[u8; 32]> {
        self.chunks.iter().map(|c| *c.digest.as_bytes()).collect()
    }
}
