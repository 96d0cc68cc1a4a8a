//! The triple registry: provisional triple IDs of in-flight transactions.
//!
//! Before inserting a triple a transaction looks its [`TripleKey`] up here. A hit
//! means another transaction (committed or not) already claimed an ID for the same
//! quadruple and that ID is reused; a miss means the transaction mints a fresh ID
//! and registers it. Registrations are scoped to the registering transaction and
//! removed when it commits or rolls back.
//!
//! The registry does not offer check-and-set between lookup and register. Two
//! transactions racing on the same key may both register; the unique index on the
//! triples table decides which insert wins.

pub mod cache;
pub mod database;
pub mod local;

use crate::cache::CacheManager;
use crate::config::{KiWiConfiguration, RegistryStrategy};
use crate::errors::RegistryError;
use crate::key::TripleKey;
use crate::model::{TransactionId, TripleId};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub use self::cache::CacheTripleRegistry;
pub use database::DbTripleRegistry;
pub use local::LocalTripleRegistry;

/// A registered key, the claimed triple ID and the transaction that claimed it.
///
/// The full key is stored next to its hash so that a hash collision between two
/// different quadruples is reported as a miss instead of an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub key: TripleKey,
    pub triple_id: TripleId,
    pub transaction: TransactionId,
}

pub trait TripleRegistry: Send + Sync {
    /// Records that `txn` claimed `triple_id` for `key`. Overwrites any earlier
    /// registration of the same key.
    fn register_key(
        &self,
        key: &TripleKey,
        txn: TransactionId,
        triple_id: TripleId,
    ) -> Result<(), RegistryError>;

    /// Returns the triple ID registered for `key` by any transaction. Backend
    /// failures are logged and reported as a miss.
    fn lookup_key(&self, key: &TripleKey) -> Option<TripleId>;

    /// Removes every registration still owned by `txn`. Calling it again is a no-op.
    fn release_transaction(&self, txn: TransactionId) -> Result<(), RegistryError>;

    /// Removes the registration of `key`, whoever owns it.
    fn delete_key(&self, key: &TripleKey) -> Result<(), RegistryError>;

    fn strategy(&self) -> RegistryStrategy;
}

/// Creates the registry selected by the configuration. `scratch` is the path of
/// the scratch database used by the database-backed registry.
pub fn create_registry(
    config: &KiWiConfiguration,
    cache_manager: &Arc<dyn CacheManager>,
    scratch: &Path,
) -> Result<Arc<dyn TripleRegistry>> {
    let registry: Arc<dyn TripleRegistry> = match config.registry_strategy {
        RegistryStrategy::Local => Arc::new(LocalTripleRegistry::new()),
        RegistryStrategy::Cache => Arc::new(CacheTripleRegistry::new(cache_manager.as_ref())),
        RegistryStrategy::Database => Arc::new(DbTripleRegistry::open(
            scratch,
            config.busy_timeout_ms,
        )?),
    };
    info!(
        "Using {} triple registry for store {}",
        registry.strategy(),
        config.name
    );
    Ok(registry)
}
