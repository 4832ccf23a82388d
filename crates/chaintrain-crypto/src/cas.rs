//! # Content-Addressed Storage (CAS)
//!
//! Stores raw blobs on the local filesystem under
//! `{base_dir}/{namespace}/{digest_hex}.bin`, where the digest is SHA-256 of
//! the stored bytes. This is the storage engine behind the local blob
//! backend.
//!
//! ## Integrity Invariant
//!
//! Every read recomputes the digest of the stored bytes and compares it with
//! the digest named in the path (constant-time). A mismatch is an error, never
//! silently returned data.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chaintrain_core::ContentDigest;
use subtle::ConstantTimeEq;

use crate::error::CryptoError;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

fn validate_namespace(ns: &str) -> Result<&str, CryptoError> {
    let mut chars = ns.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => {
            return Err(CryptoError::Cas(format!(
                "namespace must start with [a-z0-9], got: {ns:?}"
            )))
        }
    }
    if ns.len() > 64 || !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err(CryptoError::Cas(format!(
            "namespace must match [a-z0-9-]{{1,64}}, got: {ns:?}"
        )));
    }
    Ok(ns)
}

/// A content-addressed blob store backed by the filesystem.
#[derive(Debug, Clone)]
pub struct ContentAddressedStore {
    base_dir: PathBuf,
}

impl ContentAddressedStore {
    /// Create a store rooted at `base_dir`. The directory is created lazily.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Return the base directory path.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, namespace: &str, digest: &ContentDigest) -> Result<PathBuf, CryptoError> {
        let ns = validate_namespace(namespace)?;
        Ok(self
            .base_dir
            .join(ns)
            .join(format!("{}.bin", digest.to_hex())))
    }

    /// Store bytes, returning their digest. Storing identical bytes twice is
    /// a no-op.
    pub fn store(&self, namespace: &str, bytes: &[u8]) -> Result<ContentDigest, CryptoError> {
        let digest = ContentDigest::of(bytes);
        let path = self.path_for(namespace, &digest)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a temp file then hard-link into place so readers never see
        // a partially written blob.
        let tmp = path.with_extension(format!(
            "tmp-{}-{}",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(bytes)?;
            f.sync_all()?;
        }
        let linked = fs::hard_link(&tmp, &path);
        fs::remove_file(&tmp)?;
        match linked {
            Ok(()) => Ok(digest),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(digest),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and integrity-check a blob. `Ok(None)` when absent.
    pub fn resolve(
        &self,
        namespace: &str,
        digest: &ContentDigest,
    ) -> Result<Option<Vec<u8>>, CryptoError> {
        let path = self.path_for(namespace, digest)?;
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let recomputed = ContentDigest::of(&bytes);
        if !bool::from(recomputed.as_bytes().ct_eq(digest.as_bytes())) {
            return Err(CryptoError::Cas(format!(
                "integrity violation: blob at {} has digest {} but path says {}",
                path.display(),
                recomputed,
                digest,
            )));
        }
        Ok(Some(bytes))
    }

    /// Whether a blob exists (without verifying it).
    pub fn contains(&self, namespace: &str, digest: &ContentDigest) -> Result<bool, CryptoError> {
        Ok(self.path_for(namespace, digest)?.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_resolve_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cas = ContentAddressedStore::new(dir.path());
        let d = cas.store("blobs", b"chunk bytes").unwrap();
        assert_eq!(d, ContentDigest::of(b"chunk bytes"));
        assert_eq!(cas.resolve("blobs", &d).unwrap().unwrap(), b"chunk bytes");
        assert!(cas.contains("blobs", &d).unwrap());
    }

    #[test]
    fn store_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cas = ContentAddressedStore::new(dir.path());
        let a = cas.store("blobs", b"same").unwrap();
        let b = cas.store("blobs", b"same").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn resolve_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let cas = ContentAddressedStore::new(dir.path());
        assert!(cas.resolve("blobs", &ContentDigest::of(b"x")).unwrap().is_none());
    }

    #[test]
    fn resolve_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let cas = ContentAddressedStore::new(dir.path());
        let d = cas.store("blobs", b"original").unwrap();
        let path = dir.path().join("blobs").join(format!("{}.bin", d.to_hex()));
        fs::write(&path, b"tampered").unwrap();
        assert!(matches!(cas.resolve("blobs", &d), Err(CryptoError::Cas(_))));
    }

    #[test]
    fn namespace_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let cas = ContentAddressedStore::new(dir.path());
        assert!(cas.store("../escape", b"x").is_err());
        assert!(cas.store("Upper", b"x").is_err());
        assert!(cas.store("", b"x").is_err());
    }
}
