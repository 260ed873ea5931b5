use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

/// The shared in-memory `key → value` map.
///
/// The store holds a value for a key exactly while the most recent
/// computation for that key succeeded and its time-to-live has not elapsed.
/// It knows nothing about timers or workers; the worker owning a key is the
/// only writer for that key, readers may come from anywhere.
///
/// Values are opaque to the store and returned by clone.
#[derive(Debug)]
pub(crate) struct Store<K, V> {
    entries: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> Clone for Store<K, V> {
    fn clone(&self) -> Self {
        Store {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> Default for Store<K, V> {
    fn default() -> Self {
        Store {
            entries: Default::default(),
        }
    }
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value stored for `key`.
    pub fn put(&self, key: K, value: V) {
        self.entries.write().insert(key, value);
    }

    /// Returns a copy of the value stored for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    /// Removes the entry for `key`. Returns whether one was present.
    pub fn delete(&self, key: &K) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Non-blocking presence probe.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }
}
