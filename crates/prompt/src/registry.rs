//! Named registries shared between a session and in-flight resolutions.
//!
//! Each registry holds an `Arc` to an immutable map. Readers take a snapshot
//! (a cheap `Arc` clone) and never observe a half-applied update; writers
//! copy the map only while a snapshot of it is still alive.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A copy-on-write map from names to values.
#[derive(Debug)]
pub struct Registry<T> {
    inner: RwLock<Arc<HashMap<String, T>>>,
}

impl<T: Clone> Registry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }

    /// Create a registry seeded with entries.
    pub fn from_map(entries: HashMap<String, T>) -> Self {
        Self {
            inner: RwLock::new(Arc::new(entries)),
        }
    }

    /// Insert or replace an entry. Last write wins.
    pub fn insert(&self, name: impl Into<String>, value: T) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut guard).insert(name.into(), value);
    }

    /// The current contents as an immutable snapshot.
    pub fn snapshot(&self) -> Arc<HashMap<String, T>> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Look up a single entry.
    pub fn get(&self, name: &str) -> Option<T> {
        self.snapshot().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
