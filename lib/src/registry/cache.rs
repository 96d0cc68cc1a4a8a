use super::{RegistryEntry, TripleRegistry};
use crate::cache::{CacheManager, SharedCache};
use crate::config::{CacheBackend, RegistryStrategy};
use crate::errors::RegistryError;
use crate::key::TripleKey;
use crate::model::{TransactionId, TripleId};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Registry kept in the cache manager's registry cache.
///
/// With a replicated cache manager the registrations are visible to every store in
/// the cluster. Which keys a transaction registered is only known to the member
/// that runs it, so the membership map stays local. Nothing here is durable: keys
/// registered by a process that dies stay in the cache until evicted or cleared.
pub struct CacheTripleRegistry {
    cache: SharedCache<i64, RegistryEntry>,
    transactions: Mutex<HashMap<TransactionId, Vec<TripleKey>>>,
}

impl CacheTripleRegistry {
    pub fn new(manager: &dyn CacheManager) -> Self {
        if manager.backend() == CacheBackend::Disabled {
            warn!("Cache-backed triple registry on a disabled cache manager never hits");
        }
        CacheTripleRegistry {
            cache: manager.registry_cache(),
            transactions: Mutex::new(HashMap::new()),
        }
    }
}

impl TripleRegistry for CacheTripleRegistry {
    fn register_key(
        &self,
        key: &TripleKey,
        txn: TransactionId,
        triple_id: TripleId,
    ) -> Result<(), RegistryError> {
        self.cache.put(
            key.long_hash(),
            RegistryEntry {
                key: *key,
                triple_id,
                transaction: txn,
            },
        );
        self.transactions.lock().entry(txn).or_default().push(*key);
        debug!("Registered {} as triple {} for transaction {}", key, triple_id, txn);
        Ok(())
    }

    fn lookup_key(&self, key: &TripleKey) -> Option<TripleId> {
        let entry = self.cache.get(&key.long_hash())?;
        if entry.key != *key {
            debug!("Registry hash collision between {} and {}", key, entry.key);
            return None;
        }
        Some(entry.triple_id)
    }

    fn release_transaction(&self, txn: TransactionId) -> Result<(), RegistryError> {
        let keys = match self.transactions.lock().remove(&txn) {
            Some(keys) => keys,
            None => return Ok(()),
        };
        let mut released = 0;
        for key in keys {
            let owned = |e: &RegistryEntry| e.transaction == txn && e.key == key;
            if self.cache.remove_if(&key.long_hash(), &owned).is_some() {
                released += 1;
            }
        }
        debug!("Released {} keys of transaction {}", released, txn);
        Ok(())
    }

    fn delete_key(&self, key: &TripleKey) -> Result<(), RegistryError> {
        let same_key = |e: &RegistryEntry| e.key == *key;
        self.cache.remove_if(&key.long_hash(), &same_key);
        Ok(())
    }

    fn strategy(&self) -> RegistryStrategy {
        RegistryStrategy::Cache
    }
}
