//! Caches replicated synchronously between every store that joined the same cluster.
//!
//! A cluster is identified by name and lives as long as one of its members does.
//! Each member keeps a full replica of every cache and serves reads from it. Writes
//! take the per-cache cluster lock and are applied to every live replica before they
//! return, so a value written by one member is visible to all others immediately.
//! A member that joins late receives a copy of an existing replica.

use super::local::LocalCache;
use super::{Cache, CacheFactory, CacheKey, CacheManager, CacheSet, CacheValue, SharedCache};
use crate::config::{CacheBackend, KiWiConfiguration};
use anyhow::Result;
use lazy_static::lazy_static;
use log::{debug, error, info};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

lazy_static! {
    static ref CLUSTERS: Mutex<HashMap<String, Weak<CacheCluster>>> = Mutex::new(HashMap::new());
}

static NEXT_MEMBER: AtomicU64 = AtomicU64::new(1);

/// The replicas of one named cache. The mutex around the replica list is the
/// cluster write lock of that cache.
struct ReplicaGroup<K: CacheKey, V: CacheValue> {
    replicas: Mutex<Vec<(u64, Weak<LocalCache<K, V>>)>>,
}

pub struct CacheCluster {
    name: String,
    groups: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl CacheCluster {
    /// Joins the cluster called `name`, creating it when no member is alive.
    pub fn join(name: &str) -> Arc<CacheCluster> {
        let mut clusters = CLUSTERS.lock();
        if let Some(cluster) = clusters.get(name).and_then(Weak::upgrade) {
            return cluster;
        }
        info!("Creating cache cluster {}", name);
        let cluster = Arc::new(CacheCluster {
            name: name.to_string(),
            groups: Mutex::new(HashMap::new()),
        });
        clusters.insert(name.to_string(), Arc::downgrade(&cluster));
        cluster
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn group<K: CacheKey, V: CacheValue>(&self, cache: &str) -> Option<Arc<ReplicaGroup<K, V>>> {
        let mut groups = self.groups.lock();
        let group = groups
            .entry(cache.to_string())
            .or_insert_with(|| -> Arc<dyn Any + Send + Sync> {
                Arc::new(ReplicaGroup::<K, V> {
                    replicas: Mutex::new(Vec::new()),
                })
            })
            .clone();
        group.downcast::<ReplicaGroup<K, V>>().ok()
    }

    /// Adds a new replica of `cache` and fills it from an existing one.
    fn replicate<K: CacheKey, V: CacheValue>(
        &self,
        cache: &str,
        capacity: usize,
        ttl: Option<Duration>,
    ) -> Option<ReplicatedCache<K, V>> {
        let group = self.group::<K, V>(cache)?;
        let member = NEXT_MEMBER.fetch_add(1, Ordering::Relaxed);
        let replica = Arc::new(LocalCache::new(cache, capacity, ttl));
        {
            let mut replicas = group.replicas.lock();
            replicas.retain(|(_, r)| r.strong_count() > 0);
            if let Some(source) = replicas.iter().find_map(|(_, r)| r.upgrade()) {
                let entries = source.snapshot();
                debug!(
                    "State transfer of {} entries into replica {} of {}",
                    entries.len(),
                    member,
                    cache
                );
                for (key, entry) in entries {
                    replica.restore(key, entry);
                }
            }
            replicas.push((member, Arc::downgrade(&replica)));
        }
        Some(ReplicatedCache {
            name: cache.to_string(),
            member,
            local: replica,
            group,
        })
    }
}

/// One member's handle on a replicated cache.
pub struct ReplicatedCache<K: CacheKey, V: CacheValue> {
    name: String,
    member: u64,
    local: Arc<LocalCache<K, V>>,
    group: Arc<ReplicaGroup<K, V>>,
}

impl<K: CacheKey, V: CacheValue> ReplicatedCache<K, V> {
    /// Runs `f` on every live replica while holding the cluster lock.
    fn each_replica<R>(&self, mut f: impl FnMut(&LocalCache<K, V>) -> Option<R>) -> Option<R> {
        let mut replicas = self.group.replicas.lock();
        replicas.retain(|(_, r)| r.strong_count() > 0);
        let mut result = None;
        for (_, replica) in replicas.iter() {
            if let Some(replica) = replica.upgrade() {
                let r = f(&replica);
                if result.is_none() {
                    result = r;
                }
            }
        }
        result
    }
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> for ReplicatedCache<K, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &K) -> Option<V> {
        self.local.get(key)
    }

    fn put(&self, key: K, value: V) {
        self.each_replica::<()>(|r| {
            r.put(key.clone(), value.clone());
            None
        });
    }

    fn put_if_absent(&self, key: K, value: V) -> Option<V> {
        let mut replicas = self.group.replicas.lock();
        replicas.retain(|(_, r)| r.strong_count() > 0);
        let live: Vec<Arc<LocalCache<K, V>>> =
            replicas.iter().filter_map(|(_, r)| r.upgrade()).collect();
        if let Some(existing) = live.iter().find_map(|r| r.get(&key)) {
            return Some(existing);
        }
        for replica in live {
            replica.put(key.clone(), value.clone());
        }
        None
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.each_replica(|r| r.remove(key))
    }

    fn remove_if(&self, key: &K, predicate: &dyn Fn(&V) -> bool) -> Option<V> {
        self.each_replica(|r| r.remove_if(key, predicate))
    }

    fn len(&self) -> usize {
        self.local.len()
    }

    fn clear(&self) {
        self.each_replica::<()>(|r| {
            r.clear();
            None
        });
    }
}

/// A replica that can leave its cluster.
trait ClusterMember: Send + Sync {
    fn leave(&self);
}

impl<K: CacheKey, V: CacheValue> ClusterMember for ReplicatedCache<K, V> {
    fn leave(&self) {
        self.group
            .replicas
            .lock()
            .retain(|(member, _)| *member != self.member);
    }
}

struct ReplicatedFactory {
    cluster: Arc<CacheCluster>,
    ttl: Option<Duration>,
    members: Mutex<Vec<Arc<dyn ClusterMember>>>,
}

impl CacheFactory for ReplicatedFactory {
    fn create<K: CacheKey, V: CacheValue>(
        &self,
        name: &str,
        capacity: usize,
    ) -> SharedCache<K, V> {
        match self.cluster.replicate::<K, V>(name, capacity, self.ttl) {
            Some(cache) => {
                let cache = Arc::new(cache);
                self.members.lock().push(cache.clone());
                cache
            }
            None => {
                error!(
                    "Cache {} in cluster {} holds a different value type; using a private cache",
                    name,
                    self.cluster.name()
                );
                Arc::new(LocalCache::new(name, capacity, self.ttl))
            }
        }
    }
}

/// Cache manager whose caches are shared with every store in the same cluster.
pub struct ReplicatedCacheManager {
    name: String,
    factory: ReplicatedFactory,
    caches: CacheSet,
    named_capacity: usize,
}

impl ReplicatedCacheManager {
    pub fn new(config: &KiWiConfiguration) -> Result<Self> {
        let cluster = CacheCluster::join(&config.cluster_name);
        info!(
            "Store {} joined cache cluster {}",
            config.name,
            cluster.name()
        );
        let factory = ReplicatedFactory {
            cluster,
            ttl: config.cache_expiry_secs.map(Duration::from_secs),
            members: Mutex::new(Vec::new()),
        };
        let caches = CacheSet::build(&factory, config);
        Ok(ReplicatedCacheManager {
            name: config.name.clone(),
            factory,
            caches,
            named_capacity: config.node_cache_size,
        })
    }

    pub fn cluster_name(&self) -> &str {
        self.factory.cluster.name()
    }
}

impl CacheManager for ReplicatedCacheManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> CacheBackend {
        CacheBackend::Replicated
    }

    fn caches(&self) -> &CacheSet {
        &self.caches
    }

    fn cache_by_name(&self, name: &str) -> SharedCache<String, serde_json::Value> {
        self.caches
            .named_cache(&self.factory, name, self.named_capacity)
    }

    fn shutdown(&self) {
        let members = std::mem::take(&mut *self.factory.members.lock());
        info!(
            "Store {} leaving cache cluster {} ({} replicas)",
            self.name,
            self.cluster_name(),
            members.len()
        );
        for member in members {
            member.leave();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(cluster: &str, name: &str) -> ReplicatedCacheManager {
        let config = KiWiConfiguration::builder()
            .name(name)
            .cluster_name(cluster)
            .cache_backend(CacheBackend::Replicated)
            .build()
            .unwrap();
        ReplicatedCacheManager::new(&config).unwrap()
    }

    #[test]
    fn writes_are_visible_on_other_members() {
        let a = member("replicated-unit-visible", "a");
        let b = member("replicated-unit-visible", "b");
        a.uri_cache().put(
            "http://example.org/x".to_string(),
            crate::model::KiWiUriResource::new("http://example.org/x"),
        );
        assert!(b.uri_cache().get(&"http://example.org/x".to_string()).is_some());
        b.uri_cache().remove(&"http://example.org/x".to_string());
        assert!(a.uri_cache().get(&"http://example.org/x".to_string()).is_none());
    }

    #[test]
    fn late_member_receives_state() {
        let a = member("replicated-unit-transfer", "a");
        let named = a.cache_by_name("settings");
        named.put("k".to_string(), serde_json::json!({"v": 1}));
        let b = member("replicated-unit-transfer", "b");
        assert_eq!(
            b.cache_by_name("settings").get(&"k".to_string()),
            Some(serde_json::json!({"v": 1}))
        );
    }

    #[test]
    fn member_that_left_no_longer_receives_writes() {
        let a = member("replicated-unit-leave", "a");
        let b = member("replicated-unit-leave", "b");
        b.shutdown();
        a.node_cache().put(1, crate::model::KiWiNode::uri("http://example.org/n"));
        assert!(b.node_cache().get(&1).is_none());
        assert!(a.node_cache().get(&1).is_some());
    }
}
