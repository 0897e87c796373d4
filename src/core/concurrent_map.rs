//! # Concurrent Map
//!
//! A lock-protected hash map shared between the orchestrating thread and the worker
//! pool. It backs both the chunk index and the generated-zone set.
//!
//! The important operation is [`ConcurrentMap::insert_if_absent`]: checking and inserting
//! happen under a single write lock, so two callers racing on the same key can never both
//! observe "absent". The zone dispatcher relies on this to generate each zone exactly once.
//!
//! Compound operations that must observe and mutate several entries atomically (such as
//! instantiating a chunk and linking it to its neighbours) take the write guard directly
//! through [`ConcurrentMap::write`].

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// A hash map guarded by a single read-write lock.
///
/// Values are handed out by clone, so `V` is usually a cheap handle such as
/// [`MtResource`](super::MtResource) or `()` for set semantics.
#[derive(Debug)]
pub struct ConcurrentMap<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for ConcurrentMap<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Copy, V: Clone> ConcurrentMap<K, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `key` unless the key is already present.
    ///
    /// # Returns
    /// `true` if this call inserted the value, `false` if the key already existed (the
    /// existing value is left untouched).
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        let mut entries = self.write();
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, value);
        true
    }

    /// Returns a clone of the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.read().get(key).cloned()
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.read().contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of every key currently stored.
    pub fn keys(&self) -> Vec<K> {
        self.read().keys().copied().collect()
    }

    /// Snapshot of every value currently stored.
    pub fn values(&self) -> Vec<V> {
        self.read().values().cloned().collect()
    }

    /// Acquires the shared read guard.
    pub fn read(&self) -> RwLockReadGuard<'_, HashMap<K, V>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires the exclusive write guard for compound updates.
    pub fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, V>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
