use super::TripleRegistry;
use crate::config::RegistryStrategy;
use crate::database::{Database, SCRATCH_SCHEMA};
use crate::errors::RegistryError;
use crate::key::TripleKey;
use crate::model::{TransactionId, TripleId};
use anyhow::Result;
use log::{debug, info, warn};
use rusqlite::{params, OptionalExtension};
use std::path::Path;

/// Registry kept in the `registry` scratch table.
///
/// Every operation opens its own connection and commits before returning, so a
/// registration is visible to every process using the same store. The table is
/// emptied when the registry is opened: registrations never outlive a restart.
///
/// Opening also drops the live registrations of other processes already using
/// the store. Their transactions lose de-duplication through the registry until
/// they end; the unique index on `triples` still keeps the store free of
/// duplicate rows. Open every process of a shared store before writing to it.
pub struct DbTripleRegistry {
    db: Database,
}

impl DbTripleRegistry {
    pub fn open(scratch: &Path, busy_timeout_ms: u64) -> Result<Self> {
        let db = Database::new(scratch, busy_timeout_ms);
        db.initialize(SCRATCH_SCHEMA)?;
        let conn = db.open()?;
        let stale = conn.execute("DELETE FROM registry", [])?;
        if stale > 0 {
            info!("Removed {} stale registry entries from {}", stale, scratch.display());
        }
        Ok(DbTripleRegistry { db })
    }

    fn try_lookup(&self, key: &TripleKey) -> Result<Option<TripleId>, RegistryError> {
        let conn = self.db.open()?;
        let [s, p, o, c] = key.ids();
        let id = conn
            .query_row(
                "SELECT triple_id FROM registry
                 WHERE key_hash = ?1 AND subject = ?2 AND predicate = ?3 AND object = ?4 AND context = ?5
                 ORDER BY rowid DESC LIMIT 1",
                params![key.long_hash(), s, p, o, c],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}

impl TripleRegistry for DbTripleRegistry {
    fn register_key(
        &self,
        key: &TripleKey,
        txn: TransactionId,
        triple_id: TripleId,
    ) -> Result<(), RegistryError> {
        let mut conn = self.db.open()?;
        let tx = conn.transaction()?;
        let [s, p, o, c] = key.ids();
        // last write wins: earlier claims on the same key by other transactions go
        tx.execute(
            "DELETE FROM registry WHERE key_hash = ?1 AND subject = ?2 AND predicate = ?3 AND object = ?4 AND context = ?5",
            params![key.long_hash(), s, p, o, c],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO registry (key_hash, txn_id, triple_id, subject, predicate, object, context)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![key.long_hash(), txn, triple_id, s, p, o, c],
        )?;
        tx.commit()?;
        debug!("Registered {} as triple {} for transaction {}", key, triple_id, txn);
        Ok(())
    }

    fn lookup_key(&self, key: &TripleKey) -> Option<TripleId> {
        match self.try_lookup(key) {
            Ok(id) => id,
            Err(e) => {
                warn!("Registry lookup of {} failed, treating as miss: {}", key, e);
                None
            }
        }
    }

    fn release_transaction(&self, txn: TransactionId) -> Result<(), RegistryError> {
        let conn = self.db.open()?;
        let released = conn.execute("DELETE FROM registry WHERE txn_id = ?1", params![txn])?;
        debug!("Released {} keys of transaction {}", released, txn);
        Ok(())
    }

    fn delete_key(&self, key: &TripleKey) -> Result<(), RegistryError> {
        let conn = self.db.open()?;
        let [s, p, o, c] = key.ids();
        conn.execute(
            "DELETE FROM registry WHERE key_hash = ?1 AND subject = ?2 AND predicate = ?3 AND object = ?4 AND context = ?5",
            params![key.long_hash(), s, p, o, c],
        )?;
        Ok(())
    }

    fn strategy(&self) -> RegistryStrategy {
        RegistryStrategy::Database
    }
}
