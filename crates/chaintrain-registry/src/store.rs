//! # In-Memory Record Store
//!
//! Thread-safe, cloneable map from string keys to records. The lock is a
//! `parking_lot::RwLock` and is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Shared in-memory map keyed by record id.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<String, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, key: impl Into<String>, value: T) -> Option<T> {
        self.data.write().insert(key.into(), value)
    }

    /// Insert unless an existing record satisfies `keep`. On refusal the
    /// existing record is returned.
    pub fn insert_unless(
        &self,
        key: impl Into<String>,
        value: T,
        keep: impl FnOnce(&T) -> bool,
    ) -> Result<(), T> {
        let mut guard = self.data.write();
        let key = key.into();
        if let Some(existing) = guard.get(&key) {
            if keep(existing) {
                return Err(existing.clone());
            }
        }
        guard.insert(key, value);
        Ok(())
    }

    /// Retrieve a record.
    pub fn get(&self, key: &str) -> Option<T> {
        self.data.read().get(key).cloned()
    }

    /// All records, in no particular order.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// First record matching `pred`.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.data.read().values().find(|v| pred(v)).cloned()
    }

    /// Update a record in place. Returns the updated record, or `None` if
    /// not found.
    pub fn update(&self, key: &str, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut guard = self.data.write();
        let entry = guard.get_mut(key)?;
        f(entry);
        Some(entry.clone())
    }

    /// Run `f` on a record in place and return its result, or `None` if the
    /// key is absent. The record is not cloned.
    pub fn modify<R>(&self, key: &str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.data.write().get_mut(key).map(f)
    }

    /// Remove the oldest records matching `evictable` until at most `keep`
    /// of them remain. Returns how many were removed.
    pub fn evict_oldest<K: Ord>(
        &self,
        keep: usize,
        evictable: impl Fn(&T) -> bool,
        age: impl Fn(&T) -> K,
    ) -> usize {
        let mut guard = self.data.write();
        let mut candidates: Vec<(K, String)> = guard
            .iter()
            .filter(|(_, v)| evictable(v))
            .map(|(k, v)| (age(v), k.clone()))
            .collect();
        let excess = candidates.len().saturating_sub(keep);
        if excess == 0 {
            return 0;
        }
        candidates.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        for (_, key) in candidates.into_iter().take(excess) {
            guard.remove(&key);
        }
        excess
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_update() {
        let store: Store<u32> = Store::new();
        assert!(store.insert("a", 1).is_none());
        assert_eq!(store.insert("a", 2), Some(1));
        assert_eq!(store.get("a"), Some(2));
        assert_eq!(store.update("a", |v| *v += 5), Some(7));
        assert_eq!(store.update("missing", |v| *v += 5), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn insert_unless_respects_keep() {
        let store: Store<&'static str> = Store::default();
        assert_eq!(store.insert_unless("k", "first", |_| true), Ok(()));
        assert_eq!(store.insert_unless("k", "second", |v| *v == "first"), Err("first"));
        assert_eq!(store.insert_unless("k", "third", |_| false), Ok(()));
        assert_eq!(store.get("k"), Some("third"));
    }

    #[test]
    fn clones_share_data() {
        let a: Store<u8> = Store::new();
        let b = a.clone();
        a.insert("x", 9);
        assert_eq!(b.get("x"), Some(9));
        assert_eq!(b.find(|v| *v == 9), Some(9));
        assert!(!b.is_empty());
    }

    #[test]
    fn modify_returns_closure_result() {
        let store: Store<Vec<u8>> = Store::new();
        store.insert("run", vec![1]);
        assert_eq!(store.modify("run", |v| { v.push(2); v.len() }), Some(2));
        assert_eq!(store.modify("gone", |v| v.len()), None);
        let checked: Option<Result<(), &str>> =
            store.modify("run", |v| if v.len() > 5 { Ok(()) } else { Err("short") });
        assert_eq!(checked, Some(Err("short")));
    }

    #[test]
    fn evict_oldest_spares_newest_and_ineligible() {
        let store: Store<(u32, bool)> = Store::new();
        for (key, age, done) in [("a", 1, true), ("b", 2, false), ("c", 3, true), ("d", 4, true)] {
            store.insert(key, (age, done));
        }
        assert_eq!(store.evict_oldest(1, |v| v.1, |v| v.0), 2);
        assert!(store.get("a").is_none());
        assert!(store.get("c").is_none());
        assert!(store.get("b").is_some());
        assert!(store.get("d").is_some());
        assert_eq!(store.evict_oldest(1, |v| v.1, |v| v.0), 0);
    }
}
