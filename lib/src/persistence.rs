//! The store: database files, ID sequences, caches and the triple registry.

use crate::cache::{create_cache_manager, CacheManager};
use crate::config::{KiWiConfiguration, RegistryStrategy};
use crate::connection::KiWiConnection;
use crate::consts::{
    SCRATCH_DB, SEQ_NAMESPACES, SEQ_NODES, SEQ_TRANSACTIONS, SEQ_TRIPLES, STORE_DB,
};
use crate::database::{Database, SCRATCH_SCHEMA, STORE_SCHEMA};
use crate::registry::{create_registry, TripleRegistry};
use crate::sequence::SequenceGenerator;
use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::fs;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub nodes: u64,
    pub triples: u64,
    pub deleted_triples: u64,
    pub namespaces: u64,
}

pub struct KiWiPersistence {
    config: KiWiConfiguration,
    store: Database,
    scratch: Database,
    sequences: SequenceGenerator,
    cache_manager: Arc<dyn CacheManager>,
    registry: Arc<dyn TripleRegistry>,
}

impl KiWiPersistence {
    /// Opens the store under `config.root`, creating the databases if needed.
    pub fn open(config: KiWiConfiguration) -> Result<Self> {
        fs::create_dir_all(&config.root).with_context(|| {
            format!("Failed to create store directory {}", config.root.display())
        })?;
        let store = Database::new(config.root.join(STORE_DB), config.busy_timeout_ms);
        store.initialize(STORE_SCHEMA)?;
        let scratch = Database::new(config.root.join(SCRATCH_DB), config.busy_timeout_ms);
        scratch.initialize(SCRATCH_SCHEMA)?;

        let sequences = SequenceGenerator::new(scratch.clone());
        {
            let conn = store.open()?;
            for (sequence, table) in [
                (SEQ_NODES, "nodes"),
                (SEQ_TRIPLES, "triples"),
                (SEQ_NAMESPACES, "namespaces"),
            ] {
                let max: i64 = conn.query_row(
                    &format!("SELECT IFNULL(MAX(id), 0) FROM {}", table),
                    [],
                    |row| row.get(0),
                )?;
                sequences.ensure(sequence, max)?;
            }
            sequences.ensure(SEQ_TRANSACTIONS, 0)?;
        }

        let cache_manager = create_cache_manager(&config)?;
        let registry = create_registry(&config, &cache_manager, scratch.path())?;
        info!(
            "Opened store {} at {} ({} caches, {} registry)",
            config.name,
            config.root.display(),
            config.cache_backend,
            config.registry_strategy
        );
        Ok(KiWiPersistence {
            config,
            store,
            scratch,
            sequences,
            cache_manager,
            registry,
        })
    }

    /// Starts a new transaction.
    pub fn connection(&self) -> Result<KiWiConnection> {
        let transaction = self.sequences.next(SEQ_TRANSACTIONS)?;
        let conn = self.store.open()?;
        KiWiConnection::begin(
            transaction,
            conn,
            self.sequences.clone(),
            self.registry.clone(),
            self.cache_manager.as_ref(),
        )
    }

    pub fn registry(&self) -> Arc<dyn TripleRegistry> {
        self.registry.clone()
    }

    pub fn cache_manager(&self) -> Arc<dyn CacheManager> {
        self.cache_manager.clone()
    }

    pub fn configuration(&self) -> &KiWiConfiguration {
        &self.config
    }

    pub fn statistics(&self) -> Result<StoreStats> {
        let conn = self.store.open()?;
        let count = |sql: &str| -> Result<u64> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(StoreStats {
            nodes: count("SELECT COUNT(*) FROM nodes")?,
            triples: count("SELECT COUNT(*) FROM triples WHERE deleted = 0")?,
            deleted_triples: count("SELECT COUNT(*) FROM triples WHERE deleted = 1")?,
            namespaces: count("SELECT COUNT(*) FROM namespaces")?,
        })
    }

    /// Deletes all nodes, triples and namespaces and empties every cache.
    /// Sequences keep their values so IDs are never reused.
    pub fn clear(&self) -> Result<()> {
        let conn = self.store.open()?;
        conn.execute_batch(
            "BEGIN IMMEDIATE;
             DELETE FROM triples;
             DELETE FROM namespaces;
             DELETE FROM nodes;
             COMMIT;",
        )
        .context("Failed to clear store")?;
        if self.config.registry_strategy == RegistryStrategy::Database {
            self.scratch.open()?.execute("DELETE FROM registry", [])?;
        }
        self.cache_manager.clear();
        info!("Cleared store {}", self.config.name);
        Ok(())
    }

    pub fn shutdown(&self) {
        info!("Shutting down store {}", self.config.name);
        self.cache_manager.shutdown();
    }
}
