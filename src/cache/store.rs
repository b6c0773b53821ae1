//! Backing store for a single cache generation.

use std::fmt;

use indexmap::IndexMap;
use parking_lot::RwLock;

/// Insertion-ordered, thread-safe map from string keys to values.
///
/// A cache never mutates its active store during a refresh: a new store is
/// filled and then swapped in. Writes still take a lock because sources may
/// populate a store from several concurrent tasks during one load.
pub struct KeyValueStore<V> {
    inner: RwLock<IndexMap<String, V>>,
}

impl<V> KeyValueStore<V> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(IndexMap::new()),
        }
    }

    /// Insert (or overwrite) a value, returning the previous one.
    ///
    /// Overwriting keeps the key's original position.
    pub fn put(&self, key: impl Into<String>, value: V) -> Option<V> {
        self.inner.write().insert(key.into(), value)
    }

    /// Remove a key, returning its value if it was present.
    ///
    /// The remaining keys keep their relative order.
    pub fn remove(&self, key: &str) -> Option<V> {
        self.inner.write().shift_remove(key)
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Snapshot of the keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl<V: Clone> KeyValueStore<V> {
    /// Look up a value. Returns `None` on a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.read().get(key).cloned()
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<(String, V)> {
        self.inner
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<V> Default for KeyValueStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for KeyValueStore<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let store = Self::new();
        for (k, v) in iter {
            store.put(k, v);
        }
        store
    }
}

impl<V> fmt::Debug for KeyValueStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("size", &self.size())
            .finish()
    }
}
