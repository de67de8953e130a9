//! Lock-protected key → counter registry.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

/// A map from client key to counter, safe to share between threads.
///
/// Reads take a shared lock and never block each other. Every mutation
/// takes the exclusive lock, so no caller ever sees a partially updated map.
#[derive(Debug)]
pub struct ConcurrentCounterMap<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for ConcurrentCounterMap<K, V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> ConcurrentCounterMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the value stored under `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.read().get(key).cloned()
    }

    /// Inserts or overwrites the value stored under `key`.
    pub fn set(&self, key: K, value: V) {
        self.inner.write().insert(key, value);
    }

    /// Removes `key` from the map.
    pub fn delete(&self, key: &K) {
        self.inner.write().remove(key);
    }

    /// Overwrites the value of every existing key, keeping the keys themselves.
    pub fn set_all(&self, value: V) {
        let mut map = self.inner.write();
        for slot in map.values_mut() {
            *slot = value.clone();
        }
    }

    /// Removes every key.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl<K> ConcurrentCounterMap<K, u32>
where
    K: Eq + Hash,
{
    /// Atomically increments the counter for `key` if it is below `max`.
    ///
    /// An absent key counts as zero. Returns `Ok(new_count)` when the
    /// increment happened and `Err(current)` when the counter was already
    /// at or above `max`.
    pub fn increment_below(&self, key: K, max: u32) -> Result<u32, u32> {
        let mut map = self.inner.write();
        let count = map.entry(key).or_insert(0);
        if *count < max {
            *count += 1;
            Ok(*count)
        } else {
            Err(*count)
        }
    }
}
