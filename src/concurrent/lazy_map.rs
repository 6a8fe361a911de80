//! Concurrent memoizing map
//!
//! Values are built by a factory the first time a key is requested. Concurrent
//! requests for the same key block on the same cell, so the factory runs once
//! per key. The shard lock is released before the factory runs.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

type Cell<V> = Arc<OnceLock<Arc<V>>>;

/// Lazily populated concurrent map
///
/// # Examples
///
/// ```
/// use kanon::concurrent::LazyConcurrentMap;
///
/// let lengths = LazyConcurrentMap::new(|name: &String| name.chars().count());
/// assert_eq!(*lengths.get(&"Zack".to_string()), 4);
/// assert_eq!(lengths.len(), 1);
/// ```
pub struct LazyConcurrentMap<K, V, F> {
    cells: DashMap<K, Cell<V>>,
    factory: F,
}

impl<K, V, F> LazyConcurrentMap<K, V, F>
where
    K: Eq + Hash + Clone,
    F: Fn(&K) -> V,
{
    pub fn new(factory: F) -> Self {
        Self {
            cells: DashMap::new(),
            factory,
        }
    }

    /// Value for `key`, computing it on first access
    pub fn get(&self, key: &K) -> Arc<V> {
        let cell = match self.cells.get(key) {
            Some(existing) => Arc::clone(existing.value()),
            None => Arc::clone(self.cells.entry(key.clone()).or_default().value()),
        };
        Arc::clone(cell.get_or_init(|| Arc::new((self.factory)(key))))
    }

    /// Whether a cell exists for `key` (it may still be initializing)
    pub fn contains_key(&self, key: &K) -> bool {
        self.cells.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
