use super::{Cache, CacheFactory, CacheKey, CacheManager, CacheSet, CacheValue, SharedCache};
use crate::config::{CacheBackend, KiWiConfiguration};
use std::marker::PhantomData;
use std::sync::Arc;

/// A cache that never holds anything.
pub struct NullCache<K, V> {
    name: String,
    _marker: PhantomData<fn(K) -> V>,
}

impl<K, V> NullCache<K, V> {
    pub fn new(name: impl Into<String>) -> Self {
        NullCache {
            name: name.into(),
            _marker: PhantomData,
        }
    }
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> for NullCache<K, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, _key: &K) -> Option<V> {
        None
    }

    fn put(&self, _key: K, _value: V) {}

    fn put_if_absent(&self, _key: K, _value: V) -> Option<V> {
        None
    }

    fn remove(&self, _key: &K) -> Option<V> {
        None
    }

    fn remove_if(&self, _key: &K, _predicate: &dyn Fn(&V) -> bool) -> Option<V> {
        None
    }

    fn len(&self) -> usize {
        0
    }

    fn clear(&self) {}
}

struct NullFactory;

impl CacheFactory for NullFactory {
    fn create<K: CacheKey, V: CacheValue>(
        &self,
        name: &str,
        _capacity: usize,
    ) -> SharedCache<K, V> {
        Arc::new(NullCache::new(name))
    }
}

/// Cache manager for deployments where a remote cache server declines to hold the
/// hot caches. Every lookup falls through to the database.
pub struct DisabledCacheManager {
    name: String,
    caches: CacheSet,
}

impl DisabledCacheManager {
    pub fn new(config: &KiWiConfiguration) -> Self {
        DisabledCacheManager {
            name: config.name.clone(),
            caches: CacheSet::build(&NullFactory, config),
        }
    }
}

impl CacheManager for DisabledCacheManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> CacheBackend {
        CacheBackend::Disabled
    }

    fn caches(&self) -> &CacheSet {
        &self.caches
    }

    fn cache_by_name(&self, name: &str) -> SharedCache<String, serde_json::Value> {
        self.caches.named_cache(&NullFactory, name, 0)
    }
}
