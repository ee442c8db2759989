//! Single-flight memoizing cache.
//!
//! A cache-aside utility with double-checked locking: reads hit the
//! concurrent map lock-free, and a coarse mutex around the compute path
//! guarantees the loader runs at most once per key across concurrent
//! callers. It composes with the deadline engine but shares no state with
//! it.

use std::hash::Hash;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::CacheError;

/// Memoizes `loader` results by key, computing each key at most once.
///
/// The loader returns `Option`: `None` means the key has no derivable value
/// and surfaces to every caller as [`CacheError::NullDerived`]; nothing is
/// stored, so a later call retries the loader.
///
/// Single-flight is enforced by one coarse lock over the compute path, not a
/// per-key lock: a slow loader for one key will briefly stall misses on other
/// keys, but hits are never blocked. That trade matches the intended use of
/// cheap, occasionally-computed values.
#[derive(Debug)]
pub struct MemoCache<K: Eq + Hash, V, F> {
    loader: F,
    values: DashMap<K, V>,
    compute: Mutex<()>,
}

impl<K, V, F> MemoCache<K, V, F>
where
    K: Eq + Hash + Clone,
    V: Clone,
    F: Fn(&K) -> Option<V>,
{
    /// Cache backed by `loader`.
    pub fn new(loader: F) -> Self {
        Self::with_capacity(loader, 0)
    }

    /// Cache backed by `loader` with a sizing hint for the value map.
    pub fn with_capacity(loader: F, capacity: usize) -> Self {
        Self {
            loader,
            values: DashMap::with_capacity(capacity),
            compute: Mutex::new(()),
        }
    }

    /// Value for `key`, computing and storing it on first use.
    pub fn get(&self, key: &K) -> Result<V, CacheError> {
        if let Some(value) = self.values.get(key) {
            return Ok(value.clone());
        }

        let _flight = self.compute.lock();
        // Re-check: another caller may have computed the key while we
        // waited for the lock.
        if let Some(value) = self.values.get(key) {
            return Ok(value.clone());
        }

        let value = (self.loader)(key).ok_or(CacheError::NullDerived)?;
        self.values.insert(key.clone(), value.clone());
        trace!("cache value computed and stored");
        Ok(value)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the cache holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn computes_each_key_once() {
        let calls = AtomicUsize::new(0);
        let cache = MemoCache::new(|key: &String| {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(key.to_uppercase())
        });

        assert_eq!(cache.get(&"test".to_string()).unwrap(), "TEST");
        assert_eq!(cache.get(&"test1".to_string()).unwrap(), "TEST1");
        assert_eq!(cache.get(&"test".to_string()).unwrap(), "TEST");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn null_derived_value_is_an_error_and_not_stored() {
        let calls = AtomicUsize::new(0);
        let cache = MemoCache::new(|_key: &u32| -> Option<u32> {
            calls.fetch_add(1, Ordering::SeqCst);
            None
        });

        assert!(matches!(cache.get(&7), Err(CacheError::NullDerived)));
        assert!(matches!(cache.get(&7), Err(CacheError::NullDerived)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_callers_share_one_computation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader_calls = Arc::clone(&calls);
        let cache = Arc::new(MemoCache::new(move |key: &u32| {
            loader_calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Some(key * 2)
        }));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || cache.get(&21).unwrap()));
        }
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
