//! Persistent ID sequences.
//!
//! Each call to [`SequenceGenerator::next`] runs in its own immediate transaction
//! on the scratch database, so a value is handed out once even when the caller's
//! data transaction rolls back or another process uses the same store.

use crate::database::Database;
use anyhow::{Context, Result};
use log::debug;
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    db: Database,
}

impl SequenceGenerator {
    pub fn new(db: Database) -> Self {
        SequenceGenerator { db }
    }

    /// Makes sure the sequence exists and does not hand out values at or below `floor`.
    pub fn ensure(&self, name: &str, floor: i64) -> Result<()> {
        let conn = self.db.open()?;
        conn.execute(
            "INSERT INTO sequences (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = MAX(value, excluded.value)",
            params![name, floor],
        )
        .with_context(|| format!("Failed to initialise sequence {}", name))?;
        debug!("Sequence {} starts above {}", name, floor);
        Ok(())
    }

    /// Returns the next value of the sequence.
    pub fn next(&self, name: &str) -> Result<i64> {
        let mut conn = self.db.open()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let updated = tx.execute(
            "UPDATE sequences SET value = value + 1 WHERE name = ?1",
            params![name],
        )?;
        if updated == 0 {
            tx.execute(
                "INSERT INTO sequences (name, value) VALUES (?1, 1)",
                params![name],
            )?;
        }
        let value: i64 = tx.query_row(
            "SELECT value FROM sequences WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        tx.commit()?;
        Ok(value)
    }

    /// The last value handed out, if the sequence exists.
    pub fn current(&self, name: &str) -> Result<Option<i64>> {
        let conn = self.db.open()?;
        let value = conn
            .query_row(
                "SELECT value FROM sequences WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}
