//! # Key-Value Persistence
//!
//! The catalog persists records through a [`KeyValueStore`] so the backing
//! database is injected rather than hard-wired. Values are JSON documents
//! grouped by namespace (`datasets`, `models`, `proofs`, `training`).
//!
//! - [`MemoryKv`]: process memory, for tests and ephemeral runs.
//! - [`FileKv`]: one JSON file per namespace under a data directory,
//!   rewritten atomically on every write.
//!
//! A PostgreSQL implementation lives in the API crate next to its pool.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use thiserror::Error;

/// Errors from a key-value backend.
#[derive(Error, Debug)]
pub enum KvError {
    /// Namespace contains characters outside `[a-z0-9_-]`.
    #[error("invalid namespace {0:?}")]
    InvalidNamespace(String),
    /// The backend refused or failed the call.
    #[error("key-value backend error: {0}")]
    Backend(String),
    /// Stored document is not valid JSON.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Namespaced JSON document store.
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Fetch one document.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, KvError>;

    /// Insert or replace one document.
    async fn put(&self, namespace: &str, key: &str, value: Value) -> Result<(), KvError>;

    /// Every document in a namespace, ordered by key.
    async fn list(&self, namespace: &str) -> Result<Vec<(String, Value)>, KvError>;

    /// Remove one document. Returns whether it existed.
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, KvError>;
}

pub(crate) fn validate_namespace(ns: &str) -> Result<&str, KvError> {
    let ok = !ns.is_empty()
        && ns.len() <= 64
        && ns
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
    if ok {
        Ok(ns)
    } else {
        Err(KvError::InvalidNamespace(ns.to_string()))
    }
}

// -- Memory -------------------------------------------------------------------

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryKv {
    data: RwLock<BTreeMap<(String, String), Value>>,
    fail_writes: AtomicBool,
}

impl MemoryKv {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` and `delete` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), KvError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KvError::Backend("writes disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, KvError> {
        let ns = validate_namespace(namespace)?;
        Ok(self
            .data
            .read()
            .get(&(ns.to_string(), key.to_string()))
            .cloned())
    }

    async fn put(&self, namespace: &str, key: &str, value: Value) -> Result<(), KvError> {
        let ns = validate_namespace(namespace)?;
        self.check_writable()?;
        self.data
            .write()
            .insert((ns.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn list(&self, namespace: &str) -> Result<Vec<(String, Value)>, KvError> {
        let ns = validate_namespace(namespace)?;
        Ok(self
            .data
            .read()
            .iter()
            .filter(|((n, _), _)| n == ns)
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, KvError> {
        let ns = validate_namespace(namespace)?;
        self.check_writable()?;
        Ok(self
            .data
            .write()
            .remove(&(ns.to_string(), key.to_string()))
            .is_some())
    }
}

// -- File ---------------------------------------------------------------------

/// JSON files under a directory, one per namespace.
///
/// Each namespace is cached after first access; writes update the cache and
/// replace the file via write-to-temp then rename.
#[derive(Debug)]
pub struct FileKv {
    dir: PathBuf,
    cache: Mutex<HashMap<String, BTreeMap<String, Value>>>,
}

impl FileKv {
    /// Store files under `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, KvError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Directory holding the namespace files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, ns: &str) -> PathBuf {
        self.dir.join(format!("{ns}.json"))
    }

    fn load(&self, ns: &str) -> Result<BTreeMap<String, Value>, KvError> {
        match fs::read(self.path_for(ns)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, ns: &str, map: &BTreeMap<String, Value>) -> Result<(), KvError> {
        let path = self.path_for(ns);
        let tmp = path.with_extension(format!("json.tmp-{}", std::process::id()));
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&serde_json::to_vec_pretty(map)?)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Run `f` against the cached namespace map, loading it on first use.
    fn with_namespace<R>(
        &self,
        namespace: &str,
        f: impl FnOnce(&mut BTreeMap<String, Value>) -> Result<R, KvError>,
    ) -> Result<R, KvError> {
        let ns = validate_namespace(namespace)?;
        let mut cache = self.cache.lock();
        if !cache.contains_key(ns) {
            let loaded = self.load(ns)?;
            cache.insert(ns.to_string(), loaded);
        }
        let map = cache
            .get_mut(ns)
            .ok_or_else(|| KvError::Backend(format!("namespace {ns} not cached")))?;
        f(map)
    }
}

#[async_trait]
impl KeyValueStore for FileKv {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, KvError> {
        self.with_namespace(namespace, |map| Ok(map.get(key).cloned()))
    }

    async fn put(&self, namespace: &str, key: &str, value: Value) -> Result<(), KvError> {
        self.with_namespace(namespace, |map| {
            let previous = map.insert(key.to_string(), value);
            if let Err(e) = self.write(namespace, map) {
                // Keep the cache in step with the file.
                match previous {
                    Some(v) => map.insert(key.to_string(), v),
                    None => map.remove(key),
                };
                return Err(e);
            }
            Ok(())
        })
    }

    async fn list(&self, namespace: &str) -> Result<Vec<(String, Value)>, KvError> {
        self.with_namespace(namespace, |map| {
            Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        })
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, KvError> {
        self.with_namespace(namespace, |map| {
            let Some(previous) = map.remove(key) else {
                return Ok(false);
            };
            if let Err(e) = self.write(namespace, map) {
                map.insert(key.to_string(), previous);
                return Err(e);
            }
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_roundtrip_and_namespaces() {
        let kv = MemoryKv::new();
        kv.put("datasets", "a", json!({"n": 1})).await.unwrap();
        kv.put("models", "a", json!({"n": 2})).await.unwrap();
        assert_eq!(kv.get("datasets", "a").await.unwrap(), Some(json!({"n": 1})));
        assert_eq!(kv.list("models").await.unwrap().len(), 1);
        assert!(kv.delete("models", "a").await.unwrap());
        assert!(!kv.delete("models", "a").await.unwrap());
    }

    #[tokio::test]
    async fn memory_write_failure_injection() {
        let kv = MemoryKv::new();
        kv.set_fail_writes(true);
        assert!(matches!(
            kv.put("datasets", "a", json!(1)).await,
            Err(KvError::Backend(_))
        ));
        assert_eq!(kv.get("datasets", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn namespace_validation() {
        let kv = MemoryKv::new();
        assert!(matches!(
            kv.get("../etc", "x").await,
            Err(KvError::InvalidNamespace(_))
        ));
        assert!(matches!(
            kv.put("Datasets", "x", json!(1)).await,
            Err(KvError::InvalidNamespace(_))
        ));
    }

    #[tokio::test]
    async fn file_kv_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let kv = FileKv::open(dir.path()).unwrap();
            kv.put("datasets", "b", json!({"name": "beta"})).await.unwrap();
            kv.put("datasets", "a", json!({"name": "alpha"})).await.unwrap();
        }
        let kv = FileKv::open(dir.path()).unwrap();
        let all = kv.list("datasets").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, "a");
        assert_eq!(kv.get("datasets", "b").await.unwrap(), Some(json!({"name": "beta"})));
        assert!(kv.delete("datasets", "a").await.unwrap());
        let kv = FileKv::open(dir.path()).unwrap();
        assert_eq!(kv.list("datasets").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn file_kv_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("models.json"), b"not json").unwrap();
        let kv = FileKv::open(dir.path()).unwrap();
        assert!(matches!(kv.list("models").await, Err(KvError::Decode(_))));
    }
}
