//! Forward and reverse term caches kept consistent with each other.
//!
//! Nodes are cached once by ID and once by natural key (URI, blank node label or
//! literal cache key). Evicting a node through either side evicts both entries.

use super::{CacheManager, SharedCache};
use crate::model::{
    KiWiAnonResource, KiWiLiteral, KiWiNamespace, KiWiNode, KiWiUriResource, NodeId,
};
use log::debug;

#[derive(Clone)]
pub struct NodeCaches {
    nodes: SharedCache<NodeId, KiWiNode>,
    uris: SharedCache<String, KiWiUriResource>,
    bnodes: SharedCache<String, KiWiAnonResource>,
    literals: SharedCache<String, KiWiLiteral>,
}

impl NodeCaches {
    pub fn new(manager: &dyn CacheManager) -> Self {
        NodeCaches {
            nodes: manager.node_cache(),
            uris: manager.uri_cache(),
            bnodes: manager.bnode_cache(),
            literals: manager.literal_cache(),
        }
    }

    /// Caches a node that has an ID under both its ID and its natural key.
    ///
    /// IDs are never reused, so an existing by-ID entry is kept as is.
    pub fn cache_node(&self, node: &KiWiNode) {
        let id = match node.id() {
            Some(id) => id,
            None => return,
        };
        self.nodes.put_if_absent(id, node.clone());
        match node {
            KiWiNode::Uri(n) => self.uris.put(n.uri.clone(), n.clone()),
            KiWiNode::BNode(n) => self.bnodes.put(n.label.clone(), n.clone()),
            KiWiNode::Literal(n) => self.literals.put(n.cache_key(), n.clone()),
        }
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<KiWiNode> {
        self.nodes.get(&id)
    }

    pub fn uri(&self, uri: &str) -> Option<KiWiUriResource> {
        self.uris.get(&uri.to_string())
    }

    pub fn bnode(&self, label: &str) -> Option<KiWiAnonResource> {
        self.bnodes.get(&label.to_string())
    }

    pub fn literal(&self, cache_key: &str) -> Option<KiWiLiteral> {
        self.literals.get(&cache_key.to_string())
    }

    /// Finds the cached, ID-carrying version of `node` by its natural key.
    pub fn lookup(&self, node: &KiWiNode) -> Option<KiWiNode> {
        let cached: Option<KiWiNode> = match node {
            KiWiNode::Uri(n) => self.uri(&n.uri).map(KiWiNode::Uri),
            KiWiNode::BNode(n) => self.bnode(&n.label).map(KiWiNode::BNode),
            KiWiNode::Literal(n) => self.literal(&n.cache_key()).map(KiWiNode::Literal),
        };
        cached.filter(|c| c.id().is_some())
    }

    /// Evicts the node with the given ID from the forward and reverse caches.
    pub fn evict(&self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            debug!("Evicting node {} ({})", id, node);
            self.remove_reverse(&node, id);
        }
    }

    /// Evicts `node` from the forward and reverse caches, looking its ID up
    /// through the reverse cache when the node itself has none.
    pub fn evict_node(&self, node: &KiWiNode) {
        let id = node.id().or_else(|| self.lookup(node).and_then(|n| n.id()));
        match id {
            Some(id) => {
                self.nodes.remove(&id);
                self.remove_reverse(node, id);
            }
            None => {
                self.remove_reverse_any(node);
            }
        }
    }

    fn remove_reverse(&self, node: &KiWiNode, id: NodeId) {
        // only drop the reverse entry if it still points at this ID
        match node {
            KiWiNode::Uri(n) => {
                self.uris.remove_if(&n.uri, &|c| c.id == Some(id));
            }
            KiWiNode::BNode(n) => {
                self.bnodes.remove_if(&n.label, &|c| c.id == Some(id));
            }
            KiWiNode::Literal(n) => {
                self.literals.remove_if(&n.cache_key(), &|c| c.id == Some(id));
            }
        }
    }

    fn remove_reverse_any(&self, node: &KiWiNode) {
        match node {
            KiWiNode::Uri(n) => {
                self.uris.remove(&n.uri);
            }
            KiWiNode::BNode(n) => {
                self.bnodes.remove(&n.label);
            }
            KiWiNode::Literal(n) => {
                self.literals.remove(&n.cache_key());
            }
        }
    }
}

/// Namespace caches by URI and by prefix.
#[derive(Clone)]
pub struct NamespaceCaches {
    by_uri: SharedCache<String, KiWiNamespace>,
    by_prefix: SharedCache<String, KiWiNamespace>,
}

impl NamespaceCaches {
    pub fn new(manager: &dyn CacheManager) -> Self {
        NamespaceCaches {
            by_uri: manager.namespace_uri_cache(),
            by_prefix: manager.namespace_prefix_cache(),
        }
    }

    pub fn cache(&self, namespace: &KiWiNamespace) {
        self.by_uri
            .put(namespace.uri.clone(), namespace.clone());
        self.by_prefix
            .put(namespace.prefix.clone(), namespace.clone());
    }

    pub fn by_prefix(&self, prefix: &str) -> Option<KiWiNamespace> {
        self.by_prefix.get(&prefix.to_string())
    }

    pub fn by_uri(&self, uri: &str) -> Option<KiWiNamespace> {
        self.by_uri.get(&uri.to_string())
    }

    /// Evicts the namespace and whatever the other side of the cache maps to it.
    pub fn evict(&self, namespace: &KiWiNamespace) {
        if let Some(old) = self.by_prefix.remove(&namespace.prefix) {
            self.by_uri.remove(&old.uri);
        }
        if let Some(old) = self.by_uri.remove(&namespace.uri) {
            self.by_prefix.remove(&old.prefix);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalCacheManager;
    use crate::config::KiWiConfiguration;

    fn manager() -> LocalCacheManager {
        LocalCacheManager::new(&KiWiConfiguration::default())
    }

    #[test]
    fn eviction_by_id_clears_reverse_entry() {
        let manager = manager();
        let caches = NodeCaches::new(&manager);
        let mut node = KiWiNode::uri("http://example.org/a");
        node.set_id(5);
        caches.cache_node(&node);
        assert_eq!(caches.uri("http://example.org/a").unwrap().id, Some(5));

        caches.evict(5);
        assert!(caches.node_by_id(5).is_none());
        assert!(caches.uri("http://example.org/a").is_none());
    }

    #[test]
    fn eviction_by_node_clears_reverse_entry_without_forward_entry() {
        let manager = manager();
        let caches = NodeCaches::new(&manager);
        let mut node = KiWiNode::bnode("b7");
        node.set_id(7);
        caches.cache_node(&node);
        // the by-ID entry is gone, as after an LRU eviction
        caches.nodes.remove(&7);
        caches.evict(7);
        assert_eq!(caches.bnode("b7").and_then(|b| b.id), Some(7));

        caches.evict_node(&node);
        assert!(caches.bnode("b7").is_none());
    }

    #[test]
    fn cached_nodes_keep_their_first_value() {
        let manager = manager();
        let caches = NodeCaches::new(&manager);
        let mut first = KiWiNode::uri("http://example.org/first");
        first.set_id(11);
        caches.cache_node(&first);
        let mut other = KiWiNode::uri("http://example.org/other");
        other.set_id(11);
        caches.cache_node(&other);
        assert_eq!(caches.node_by_id(11), Some(first));
    }

    #[test]
    fn eviction_by_natural_key_clears_forward_entry() {
        let manager = manager();
        let caches = NodeCaches::new(&manager);
        let mut node = KiWiNode::literal(KiWiLiteral::language_tagged("hallo", "de"));
        node.set_id(9);
        caches.cache_node(&node);

        let unsaved = KiWiNode::literal(KiWiLiteral::language_tagged("hallo", "de"));
        assert_eq!(caches.lookup(&unsaved).and_then(|n| n.id()), Some(9));
        caches.evict_node(&unsaved);
        assert!(caches.node_by_id(9).is_none());
        assert!(caches.lookup(&unsaved).is_none());
    }

    #[test]
    fn namespace_eviction_keeps_both_sides_consistent() {
        let manager = manager();
        let caches = NamespaceCaches::new(&manager);
        let ns = KiWiNamespace::new("ex", "http://example.org/");
        caches.cache(&ns);
        assert!(caches.by_uri("http://example.org/").is_some());

        // evicting by a stale value for the same prefix still drops the uri entry
        caches.evict(&KiWiNamespace::new("ex", "http://other.org/"));
        assert!(caches.by_prefix("ex").is_none());
        assert!(caches.by_uri("http://example.org/").is_none());
    }
}
