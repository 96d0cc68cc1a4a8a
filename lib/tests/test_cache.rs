use std::thread::sleep;
use std::time::Duration;

use kiwi::cache::terms::NodeCaches;
use kiwi::cache::{create_cache_manager, CacheManager};
use kiwi::config::{CacheBackend, KiWiConfiguration};
use kiwi::{KiWiNamespace, KiWiNode, KiWiUriResource};

fn config(backend: CacheBackend, cluster: &str) -> KiWiConfiguration {
    KiWiConfiguration::builder()
        .cache_backend(backend)
        .cluster_name(cluster)
        .uri_cache_size(2usize)
        .build()
        .expect("build config")
}

fn uri(s: &str) -> KiWiUriResource {
    let mut r = KiWiUriResource::new(s);
    r.id = Some(s.len() as i64);
    r
}

#[test]
fn local_caches_are_bounded() {
    let manager = create_cache_manager(&config(CacheBackend::Local, "unused")).unwrap();
    assert_eq!(manager.backend(), CacheBackend::Local);
    let cache = manager.uri_cache();
    cache.put("http://a".to_string(), uri("http://a"));
    cache.put("http://bb".to_string(), uri("http://bb"));
    cache.put("http://ccc".to_string(), uri("http://ccc"));
    assert_eq!(cache.len(), 2);
    assert!(cache.get(&"http://a".to_string()).is_none());
    assert!(cache.get(&"http://ccc".to_string()).is_some());
}

#[test]
fn local_caches_expire() {
    let config = KiWiConfiguration::builder()
        .cache_expiry_secs(Some(1u64))
        .build()
        .expect("build config");
    let manager = create_cache_manager(&config).unwrap();
    let cache = manager.cache_by_name("sessions");
    cache.put("s".to_string(), serde_json::json!("v"));
    assert!(cache.get(&"s".to_string()).is_some());
    sleep(Duration::from_millis(1100));
    assert!(cache.get(&"s".to_string()).is_none());
}

#[test]
fn named_caches_are_shared_per_name() {
    let manager = create_cache_manager(&KiWiConfiguration::default()).unwrap();
    manager
        .cache_by_name("a")
        .put("k".to_string(), serde_json::json!(1));
    assert_eq!(
        manager.cache_by_name("a").get(&"k".to_string()),
        Some(serde_json::json!(1))
    );
    assert!(manager.cache_by_name("b").get(&"k".to_string()).is_none());
}

#[test]
fn disabled_caches_always_miss() {
    let manager = create_cache_manager(&config(CacheBackend::Disabled, "unused")).unwrap();
    let nodes = manager.node_cache();
    nodes.put(1, KiWiNode::uri("http://example.org/a"));
    assert!(nodes.get(&1).is_none());
    assert_eq!(nodes.put_if_absent(1, KiWiNode::uri("http://example.org/a")), None);
    assert!(nodes.is_empty());
    let named = manager.cache_by_name("anything");
    named.put("k".to_string(), serde_json::json!(true));
    assert!(named.get(&"k".to_string()).is_none());
}

#[test]
fn replicated_writes_reach_every_member() {
    let a = create_cache_manager(&config(CacheBackend::Replicated, "cache-test-members")).unwrap();
    let b = create_cache_manager(&config(CacheBackend::Replicated, "cache-test-members")).unwrap();

    a.namespace_prefix_cache()
        .put("ex".to_string(), KiWiNamespace::new("ex", "http://example.org/"));
    assert_eq!(
        b.namespace_prefix_cache()
            .get(&"ex".to_string())
            .map(|ns| ns.uri),
        Some("http://example.org/".to_string())
    );

    // put_if_absent sees the value written by the other member
    let existing = b
        .namespace_prefix_cache()
        .put_if_absent("ex".to_string(), KiWiNamespace::new("ex", "http://other.org/"));
    assert_eq!(existing.map(|ns| ns.uri), Some("http://example.org/".to_string()));

    b.clear();
    assert!(a.namespace_prefix_cache().get(&"ex".to_string()).is_none());

    a.shutdown();
    b.shutdown();
}

#[test]
fn replicated_late_joiner_receives_state() {
    let a = create_cache_manager(&config(CacheBackend::Replicated, "cache-test-late")).unwrap();
    let mut node = KiWiNode::uri("http://example.org/late");
    node.set_id(42);
    NodeCaches::new(a.as_ref()).cache_node(&node);

    let b = create_cache_manager(&config(CacheBackend::Replicated, "cache-test-late")).unwrap();
    let caches = NodeCaches::new(b.as_ref());
    assert_eq!(caches.node_by_id(42), Some(node.clone()));
    assert_eq!(caches.uri("http://example.org/late").and_then(|u| u.id), Some(42));

    // eviction through one member is visible on the other
    caches.evict(42);
    let caches_a = NodeCaches::new(a.as_ref());
    assert!(caches_a.node_by_id(42).is_none());
    assert!(caches_a.uri("http://example.org/late").is_none());
}

#[test]
fn clusters_are_isolated_by_name() {
    let a = create_cache_manager(&config(CacheBackend::Replicated, "cache-test-iso-1")).unwrap();
    let b = create_cache_manager(&config(CacheBackend::Replicated, "cache-test-iso-2")).unwrap();
    a.node_cache().put(1, KiWiNode::bnode("b1"));
    assert!(b.node_cache().get(&1).is_none());
}

#[test]
fn clear_empties_every_cache() {
    let manager = create_cache_manager(&KiWiConfiguration::default()).unwrap();
    let caches = NodeCaches::new(manager.as_ref());
    let mut node = KiWiNode::bnode("x");
    node.set_id(3);
    caches.cache_node(&node);
    manager
        .cache_by_name("extra")
        .put("k".to_string(), serde_json::json!(null));
    manager.clear();
    assert!(caches.node_by_id(3).is_none());
    assert!(caches.bnode("x").is_none());
    assert!(manager.cache_by_name("extra").is_empty());
}
