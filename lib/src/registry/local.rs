use super::{RegistryEntry, TripleRegistry};
use crate::config::RegistryStrategy;
use crate::errors::RegistryError;
use crate::key::TripleKey;
use crate::model::{TransactionId, TripleId};
use log::debug;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct Inner {
    entries: HashMap<TripleKey, RegistryEntry>,
    transactions: HashMap<TransactionId, HashSet<TripleKey>>,
}

/// Registry for stores used by a single process.
#[derive(Default)]
pub struct LocalTripleRegistry {
    inner: Mutex<Inner>,
}

impl LocalTripleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TripleRegistry for LocalTripleRegistry {
    fn register_key(
        &self,
        key: &TripleKey,
        txn: TransactionId,
        triple_id: TripleId,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        inner.entries.insert(
            *key,
            RegistryEntry {
                key: *key,
                triple_id,
                transaction: txn,
            },
        );
        inner.transactions.entry(txn).or_default().insert(*key);
        debug!("Registered {} as triple {} for transaction {}", key, triple_id, txn);
        Ok(())
    }

    fn lookup_key(&self, key: &TripleKey) -> Option<TripleId> {
        self.inner.lock().entries.get(key).map(|e| e.triple_id)
    }

    fn release_transaction(&self, txn: TransactionId) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let keys = match inner.transactions.remove(&txn) {
            Some(keys) => keys,
            None => return Ok(()),
        };
        let mut released = 0;
        for key in keys {
            if inner.entries.get(&key).map(|e| e.transaction) == Some(txn) {
                inner.entries.remove(&key);
                released += 1;
            }
        }
        debug!("Released {} keys of transaction {}", released, txn);
        Ok(())
    }

    fn delete_key(&self, key: &TripleKey) -> Result<(), RegistryError> {
        self.inner.lock().entries.remove(key);
        Ok(())
    }

    fn strategy(&self) -> RegistryStrategy {
        RegistryStrategy::Local
    }
}
