use super::{Cache, CacheFactory, CacheKey, CacheManager, CacheSet, CacheValue, SharedCache};
use crate::config::{CacheBackend, KiWiConfiguration};
use log::debug;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub(crate) struct Stamped<V> {
    pub(crate) value: V,
    pub(crate) inserted: Instant,
}

/// Bounded LRU cache with an optional time-to-live. A capacity of zero means
/// unbounded.
pub struct LocalCache<K: CacheKey, V: CacheValue> {
    name: String,
    ttl: Option<Duration>,
    entries: Mutex<LruCache<K, Stamped<V>>>,
}

impl<K: CacheKey, V: CacheValue> LocalCache<K, V> {
    pub fn new(name: impl Into<String>, capacity: usize, ttl: Option<Duration>) -> Self {
        let entries = match NonZeroUsize::new(capacity) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        LocalCache {
            name: name.into(),
            ttl,
            entries: Mutex::new(entries),
        }
    }

    fn is_expired(&self, entry: &Stamped<V>) -> bool {
        match self.ttl {
            Some(ttl) => entry.inserted.elapsed() >= ttl,
            None => false,
        }
    }

    /// Copies out every live entry, least recently used first.
    pub(crate) fn snapshot(&self) -> Vec<(K, Stamped<V>)> {
        let entries = self.entries.lock();
        entries
            .iter()
            .rev()
            .filter(|(_, e)| !self.is_expired(e))
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect()
    }

    /// Inserts an entry keeping its original timestamp.
    pub(crate) fn restore(&self, key: K, entry: Stamped<V>) {
        self.entries.lock().put(key, entry);
    }
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> for LocalCache<K, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if !self.is_expired(entry) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    fn put(&self, key: K, value: V) {
        self.entries.lock().put(
            key,
            Stamped {
                value,
                inserted: Instant::now(),
            },
        );
    }

    fn put_if_absent(&self, key: K, value: V) -> Option<V> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&key) {
            if !self.is_expired(existing) {
                return Some(existing.value.clone());
            }
        }
        entries.put(
            key,
            Stamped {
                value,
                inserted: Instant::now(),
            },
        );
        None
    }

    fn remove(&self, key: &K) -> Option<V> {
        let entry = self.entries.lock().pop(key)?;
        if self.is_expired(&entry) {
            None
        } else {
            Some(entry.value)
        }
    }

    fn remove_if(&self, key: &K, predicate: &dyn Fn(&V) -> bool) -> Option<V> {
        let mut entries = self.entries.lock();
        let matches = match entries.peek(key) {
            Some(entry) => predicate(&entry.value),
            None => false,
        };
        if matches {
            entries.pop(key).map(|e| e.value)
        } else {
            None
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }
}

struct LocalFactory {
    ttl: Option<Duration>,
}

impl CacheFactory for LocalFactory {
    fn create<K: CacheKey, V: CacheValue>(
        &self,
        name: &str,
        capacity: usize,
    ) -> SharedCache<K, V> {
        debug!("Creating local cache {} (capacity {})", name, capacity);
        Arc::new(LocalCache::new(name, capacity, self.ttl))
    }
}

/// In-process caches for a store that is not shared with other processes.
pub struct LocalCacheManager {
    name: String,
    factory: LocalFactory,
    caches: CacheSet,
    named_capacity: usize,
}

impl LocalCacheManager {
    pub fn new(config: &KiWiConfiguration) -> Self {
        let factory = LocalFactory {
            ttl: config.cache_expiry_secs.map(Duration::from_secs),
        };
        let caches = CacheSet::build(&factory, config);
        LocalCacheManager {
            name: config.name.clone(),
            factory,
            caches,
            named_capacity: config.node_cache_size,
        }
    }
}

impl CacheManager for LocalCacheManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> CacheBackend {
        CacheBackend::Local
    }

    fn caches(&self) -> &CacheSet {
        &self.caches
    }

    fn cache_by_name(&self, name: &str) -> SharedCache<String, serde_json::Value> {
        self.caches
            .named_cache(&self.factory, name, self.named_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn evicts_least_recently_used() {
        let cache: LocalCache<i64, String> = LocalCache::new("test", 2, None);
        cache.put(1, "one".to_string());
        cache.put(2, "two".to_string());
        // touch 1 so that 2 becomes the eviction candidate
        assert_eq!(cache.get(&1), Some("one".to_string()));
        cache.put(3, "three".to_string());
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&1), Some("one".to_string()));
        assert_eq!(cache.get(&3), Some("three".to_string()));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn expired_entries_miss() {
        let cache: LocalCache<i64, i64> =
            LocalCache::new("ttl", 10, Some(Duration::from_millis(20)));
        cache.put(1, 10);
        assert_eq!(cache.get(&1), Some(10));
        sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&1), None);
        // an expired entry does not block put_if_absent
        assert_eq!(cache.put_if_absent(1, 11), None);
        assert_eq!(cache.get(&1), Some(11));
    }

    #[test]
    fn conditional_operations() {
        let cache: LocalCache<i64, i64> = LocalCache::new("cond", 0, None);
        assert_eq!(cache.put_if_absent(1, 10), None);
        assert_eq!(cache.put_if_absent(1, 20), Some(10));
        assert_eq!(cache.remove_if(&1, &|v| *v == 20), None);
        assert_eq!(cache.get(&1), Some(10));
        assert_eq!(cache.remove_if(&1, &|v| *v == 10), Some(10));
        assert!(cache.is_empty());
    }

    #[test]
    fn snapshot_preserves_order() {
        let cache: LocalCache<i64, i64> = LocalCache::new("snap", 0, None);
        cache.put(1, 1);
        cache.put(2, 2);
        cache.put(3, 3);
        let keys: Vec<i64> = cache.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }
}
