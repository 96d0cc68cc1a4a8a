//! Named caches and the managers that own them.
//!
//! A [`CacheManager`] hands out one shared handle per logical cache. The backend is
//! picked from [`KiWiConfiguration::cache_backend`] by [`create_cache_manager`]:
//! bounded in-process LRU caches, caches replicated across every store that joined
//! the same cluster, or always-miss caches.

pub mod disabled;
pub mod local;
pub mod replicated;
pub mod terms;

use crate::config::{CacheBackend, KiWiConfiguration};
use crate::consts::{
    BNODE_CACHE, LITERAL_CACHE, NAMESPACE_PREFIX_CACHE, NAMESPACE_URI_CACHE, NODE_CACHE,
    REGISTRY_CACHE, TRIPLE_CACHE, URI_CACHE,
};
use crate::model::{
    KiWiAnonResource, KiWiLiteral, KiWiNamespace, KiWiNode, KiWiTriple, KiWiUriResource, NodeId,
    TripleId,
};
use crate::registry::RegistryEntry;
use anyhow::Result;
use log::info;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

pub use disabled::DisabledCacheManager;
pub use local::{LocalCache, LocalCacheManager};
pub use replicated::{CacheCluster, ReplicatedCacheManager};

/// Keys usable in a managed cache.
pub trait CacheKey: Clone + Eq + Hash + Send + Sync + 'static {}
impl<T: Clone + Eq + Hash + Send + Sync + 'static> CacheKey for T {}

/// Values usable in a managed cache.
pub trait CacheValue: Clone + Send + Sync + 'static {}
impl<T: Clone + Send + Sync + 'static> CacheValue for T {}

/// A concurrent map with backend-specific eviction.
///
/// Every operation may be served by a backend that dropped the entry in the meantime,
/// so a `get` after a `put` can miss. Replicated caches apply each write to every
/// member before returning.
pub trait Cache<K, V>: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &K) -> Option<V>;

    fn put(&self, key: K, value: V);

    /// Stores `value` unless the key is present; returns the existing value in that case.
    fn put_if_absent(&self, key: K, value: V) -> Option<V>;

    fn remove(&self, key: &K) -> Option<V>;

    /// Removes the entry only if `predicate` holds for its current value.
    fn remove_if(&self, key: &K, predicate: &dyn Fn(&V) -> bool) -> Option<V>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self);
}

pub type SharedCache<K, V> = Arc<dyn Cache<K, V>>;

/// Builds caches for one backend.
pub(crate) trait CacheFactory {
    fn create<K: CacheKey, V: CacheValue>(&self, name: &str, capacity: usize)
        -> SharedCache<K, V>;
}

/// The caches owned by a manager.
pub struct CacheSet {
    node: SharedCache<NodeId, KiWiNode>,
    triple: SharedCache<TripleId, KiWiTriple>,
    uri: SharedCache<String, KiWiUriResource>,
    bnode: SharedCache<String, KiWiAnonResource>,
    literal: SharedCache<String, KiWiLiteral>,
    namespace_uri: SharedCache<String, KiWiNamespace>,
    namespace_prefix: SharedCache<String, KiWiNamespace>,
    registry: SharedCache<i64, RegistryEntry>,
    named: Mutex<HashMap<String, SharedCache<String, serde_json::Value>>>,
}

impl CacheSet {
    pub(crate) fn build<F: CacheFactory>(factory: &F, config: &KiWiConfiguration) -> Self {
        CacheSet {
            node: factory.create(NODE_CACHE, config.node_cache_size),
            triple: factory.create(TRIPLE_CACHE, config.triple_cache_size),
            uri: factory.create(URI_CACHE, config.uri_cache_size),
            bnode: factory.create(BNODE_CACHE, config.bnode_cache_size),
            literal: factory.create(LITERAL_CACHE, config.literal_cache_size),
            namespace_uri: factory.create(NAMESPACE_URI_CACHE, config.namespace_cache_size),
            namespace_prefix: factory
                .create(NAMESPACE_PREFIX_CACHE, config.namespace_cache_size),
            registry: factory.create(REGISTRY_CACHE, config.registry_cache_size),
            named: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the ad hoc cache called `name`, creating it on first use.
    pub(crate) fn named_cache<F: CacheFactory>(
        &self,
        factory: &F,
        name: &str,
        capacity: usize,
    ) -> SharedCache<String, serde_json::Value> {
        let mut named = self.named.lock();
        named
            .entry(name.to_string())
            .or_insert_with(|| factory.create(&format!("named:{}", name), capacity))
            .clone()
    }

    fn clear(&self) {
        self.node.clear();
        self.triple.clear();
        self.uri.clear();
        self.bnode.clear();
        self.literal.clear();
        self.namespace_uri.clear();
        self.namespace_prefix.clear();
        self.registry.clear();
        for cache in self.named.lock().values() {
            cache.clear();
        }
    }
}

/// Factory and directory of the caches used by one store.
pub trait CacheManager: Send + Sync {
    fn name(&self) -> &str;

    fn backend(&self) -> CacheBackend;

    fn caches(&self) -> &CacheSet;

    /// Generic accessor for caches that have no dedicated method. Values are JSON
    /// documents so callers can store whatever they need.
    fn cache_by_name(&self, name: &str) -> SharedCache<String, serde_json::Value>;

    /// Node ID to node.
    fn node_cache(&self) -> SharedCache<NodeId, KiWiNode> {
        self.caches().node.clone()
    }

    /// Triple ID to triple.
    fn triple_cache(&self) -> SharedCache<TripleId, KiWiTriple> {
        self.caches().triple.clone()
    }

    /// URI string to URI resource.
    fn uri_cache(&self) -> SharedCache<String, KiWiUriResource> {
        self.caches().uri.clone()
    }

    /// Blank node label to anonymous resource.
    fn bnode_cache(&self) -> SharedCache<String, KiWiAnonResource> {
        self.caches().bnode.clone()
    }

    /// Literal cache key to literal.
    fn literal_cache(&self) -> SharedCache<String, KiWiLiteral> {
        self.caches().literal.clone()
    }

    fn namespace_uri_cache(&self) -> SharedCache<String, KiWiNamespace> {
        self.caches().namespace_uri.clone()
    }

    fn namespace_prefix_cache(&self) -> SharedCache<String, KiWiNamespace> {
        self.caches().namespace_prefix.clone()
    }

    /// Key hash to registry entry; used by the cache-backed triple registry.
    fn registry_cache(&self) -> SharedCache<i64, RegistryEntry> {
        self.caches().registry.clone()
    }

    /// Evicts every entry of every managed cache.
    fn clear(&self) {
        info!("Clearing all caches of {}", self.name());
        self.caches().clear();
    }

    /// Releases backend resources. Called once when the store shuts down.
    fn shutdown(&self) {}
}

/// Creates the cache manager selected by the configuration.
pub fn create_cache_manager(config: &KiWiConfiguration) -> Result<Arc<dyn CacheManager>> {
    let manager: Arc<dyn CacheManager> = match config.cache_backend {
        CacheBackend::Local => Arc::new(LocalCacheManager::new(config)),
        CacheBackend::Replicated => Arc::new(ReplicatedCacheManager::new(config)?),
        CacheBackend::Disabled => Arc::new(DisabledCacheManager::new(config)),
    };
    info!(
        "Using {} cache manager for store {}",
        manager.backend(),
        config.name
    );
    Ok(manager)
}
