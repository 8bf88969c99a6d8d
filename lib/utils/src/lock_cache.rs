use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;

/// Map of (key, lock) to guarantee that operations on the same key, such as updating the points of a
/// post or comment, are executed one after the other.
///
/// Locks are kept in a LRU cache. A lock that is still held or awaited is never evicted, the cache grows
/// instead, so that two tasks working on the same key always share the same lock.
#[derive(Debug)]
pub struct LockCache<K: Hash + Eq> {
    lock_cache: Mutex<LruCache<K, Arc<Mutex<()>>>>,
}

impl<K: Hash + Eq + Clone> LockCache<K> {
    pub fn new(max_size: NonZeroUsize) -> Self {
        Self {
            lock_cache: Mutex::new(LruCache::new(max_size)),
        }
    }

    /// Get or insert a lock for `key`, updating the LRU cache
    pub async fn get_lock(&self, key: &K) -> Arc<Mutex<()>> {
        let mut lock_cache = self.lock_cache.lock().await;

        if let Some(lock) = lock_cache.get(key) {
            return Arc::clone(lock);
        }

        if lock_cache.len() == lock_cache.cap().get() {
            let is_lru_in_use = lock_cache
                .peek_lru()
                .is_some_and(|(_, lock)| Arc::strong_count(lock) > 1);
            if is_lru_in_use {
                let new_capacity = lock_cache.cap().saturating_add(lock_cache.cap().get());
                log::debug!("Lock cache full with locks in use, grow capacity to {new_capacity}.");
                lock_cache.resize(new_capacity);
            }
        }

        let new_lock = Arc::new(Mutex::new(()));
        lock_cache.put(key.clone(), Arc::clone(&new_lock));
        new_lock
    }

    pub async fn len(&self) -> usize {
        self.lock_cache.lock().await.len()
    }

    pub async fn capacity(&self) -> usize {
        self.lock_cache.lock().await.cap().get()
    }
}
