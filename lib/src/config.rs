//! Defines the configuration of a KiWi store: where the databases live, which cache
//! backend and registry strategy to use and how large the caches may grow.

use crate::consts::CONFIG_FILE;
use anyhow::Result;
use clap::ValueEnum;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

/// Which technology backs the named caches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Bounded in-process LRU caches.
    #[default]
    Local,
    /// Caches replicated synchronously to every store in the same cluster.
    Replicated,
    /// Every cache always misses; all lookups go to the database.
    Disabled,
}

/// Which registry coordinates triple IDs between transactions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistryStrategy {
    /// Process-local concurrent map.
    #[default]
    Local,
    /// The cache manager's registry cache.
    Cache,
    /// A scratch table in the scratch database.
    Database,
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CacheBackend::Local => write!(f, "local"),
            CacheBackend::Replicated => write!(f, "replicated"),
            CacheBackend::Disabled => write!(f, "disabled"),
        }
    }
}

impl fmt::Display for RegistryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegistryStrategy::Local => write!(f, "local"),
            RegistryStrategy::Cache => write!(f, "cache"),
            RegistryStrategy::Database => write!(f, "database"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Builder)]
#[builder(pattern = "owned", default, setter(into))]
#[serde(default)]
pub struct KiWiConfiguration {
    /// Human readable name of the store, used in log messages
    pub name: String,
    /// Directory holding store.db and scratch.db
    pub root: PathBuf,
    pub cache_backend: CacheBackend,
    /// Stores with the same cluster name share replicated caches
    pub cluster_name: String,
    pub registry_strategy: RegistryStrategy,
    pub node_cache_size: usize,
    pub triple_cache_size: usize,
    pub uri_cache_size: usize,
    pub bnode_cache_size: usize,
    pub literal_cache_size: usize,
    pub namespace_cache_size: usize,
    pub registry_cache_size: usize,
    /// Entries older than this are treated as misses; `None` keeps them until evicted
    pub cache_expiry_secs: Option<u64>,
    /// How long a connection waits for a database lock before failing
    pub busy_timeout_ms: u64,
}

impl Default for KiWiConfiguration {
    fn default() -> Self {
        Self {
            name: "kiwi".to_string(),
            root: PathBuf::from(".kiwi"),
            cache_backend: CacheBackend::default(),
            cluster_name: "kiwi".to_string(),
            registry_strategy: RegistryStrategy::default(),
            node_cache_size: 100_000,
            triple_cache_size: 100_000,
            uri_cache_size: 50_000,
            bnode_cache_size: 10_000,
            literal_cache_size: 50_000,
            namespace_cache_size: 500,
            registry_cache_size: 100_000,
            cache_expiry_secs: None,
            busy_timeout_ms: 5_000,
        }
    }
}

impl KiWiConfiguration {
    pub fn builder() -> KiWiConfigurationBuilder {
        KiWiConfigurationBuilder::default()
    }

    /// Path of the configuration file inside a store root.
    pub fn config_path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE)
    }

    pub fn save_to_file(&self, file: &Path) -> Result<()> {
        let config_str = serde_json::to_string_pretty(&self)?;
        let mut file = std::fs::File::create(file)?;
        file.write_all(config_str.as_bytes())?;
        Ok(())
    }

    pub fn from_file(file: &Path) -> Result<Self> {
        let file = std::fs::File::open(file)?;
        let reader = BufReader::new(file);
        let config: KiWiConfiguration = serde_json::from_reader(reader)?;
        Ok(config)
    }

    /// Prints out the configuration for command line output.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  Name: {}", self.name);
        println!("  Root: {}", self.root.display());
        println!("  Cache Backend: {}", self.cache_backend);
        if self.cache_backend == CacheBackend::Replicated {
            println!("  Cluster: {}", self.cluster_name);
        }
        println!("  Registry: {}", self.registry_strategy);
        println!(
            "  Cache Sizes: nodes={} triples={} uris={} bnodes={} literals={} namespaces={} registry={}",
            self.node_cache_size,
            self.triple_cache_size,
            self.uri_cache_size,
            self.bnode_cache_size,
            self.literal_cache_size,
            self.namespace_cache_size,
            self.registry_cache_size
        );
        if let Some(secs) = self.cache_expiry_secs {
            println!("  Cache Expiry: {}s", secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn builder_keeps_defaults_for_unset_fields() {
        let config = KiWiConfiguration::builder()
            .root("/tmp/kiwi-test")
            .registry_strategy(RegistryStrategy::Database)
            .build()
            .unwrap();
        assert_eq!(config.root, PathBuf::from("/tmp/kiwi-test"));
        assert_eq!(config.registry_strategy, RegistryStrategy::Database);
        assert_eq!(config.cache_backend, CacheBackend::Local);
        assert_eq!(config.node_cache_size, 100_000);
    }

    #[test]
    fn roundtrips_through_file() {
        let dir = tempdir().unwrap();
        let config = KiWiConfiguration::builder()
            .root(dir.path())
            .cache_backend(CacheBackend::Replicated)
            .cluster_name("test-cluster")
            .cache_expiry_secs(Some(30))
            .build()
            .unwrap();
        let path = KiWiConfiguration::config_path(dir.path());
        config.save_to_file(&path).unwrap();
        let loaded = KiWiConfiguration::from_file(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: KiWiConfiguration =
            serde_json::from_str(r#"{"root": "/data/kiwi", "cache_backend": "disabled"}"#)
                .unwrap();
        assert_eq!(config.cache_backend, CacheBackend::Disabled);
        assert_eq!(config.registry_strategy, RegistryStrategy::Local);
        assert_eq!(config.busy_timeout_ms, 5_000);
    }
}
