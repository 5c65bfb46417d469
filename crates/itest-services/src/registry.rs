//! Mutex-guarded set of live service handles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Live handles of one creator, keyed by container ID.
pub(crate) struct Running<T> {
    inner: Arc<Mutex<HashMap<String, Arc<T>>>>,
}

impl<T> Clone for Running<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Running<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> Running<T> {
    pub(crate) fn insert(&self, key: impl Into<String>, item: Arc<T>) {
        self.lock().insert(key.into(), item);
    }

    pub(crate) fn remove(&self, key: &str) -> Option<Arc<T>> {
        self.lock().remove(key)
    }

    /// Copies the current handles out, so cleanup runs without the lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<T>> {
        self.lock().values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<T>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
