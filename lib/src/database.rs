//! SQLite files of a store and their schema.
//!
//! `store.db` holds nodes, triples and namespaces. `scratch.db` holds the sequences
//! and the registry scratch table; keeping them apart means a connection with an
//! open write transaction on the store can still mint IDs and register keys.

use anyhow::{Context, Result};
use rusqlite::{Connection, ErrorCode};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const STORE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    id          INTEGER PRIMARY KEY,
    ntype       TEXT NOT NULL,
    svalue      TEXT NOT NULL,
    ivalue      INTEGER,
    dvalue      REAL,
    bvalue      INTEGER,
    tvalue      TEXT,
    lang        TEXT,
    ltype       INTEGER REFERENCES nodes(id),
    nkind       TEXT NOT NULL,
    nkey        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_natural_key ON nodes(nkind, nkey);

CREATE TABLE IF NOT EXISTS triples (
    id          INTEGER PRIMARY KEY,
    subject     INTEGER NOT NULL REFERENCES nodes(id),
    predicate   INTEGER NOT NULL REFERENCES nodes(id),
    object      INTEGER NOT NULL REFERENCES nodes(id),
    context     INTEGER REFERENCES nodes(id),
    inferred    INTEGER NOT NULL DEFAULT 0,
    deleted     INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    deleted_at  TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_triples_unique
    ON triples(subject, predicate, object, IFNULL(context, -1)) WHERE deleted = 0;
CREATE INDEX IF NOT EXISTS idx_triples_predicate ON triples(predicate);
CREATE INDEX IF NOT EXISTS idx_triples_object ON triples(object);
CREATE INDEX IF NOT EXISTS idx_triples_context ON triples(context);

CREATE TABLE IF NOT EXISTS namespaces (
    id          INTEGER PRIMARY KEY,
    prefix      TEXT NOT NULL UNIQUE,
    uri         TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);
";

pub const SCRATCH_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sequences (
    name        TEXT PRIMARY KEY,
    value       INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS registry (
    key_hash    INTEGER NOT NULL,
    txn_id      INTEGER NOT NULL,
    triple_id   INTEGER NOT NULL,
    subject     INTEGER NOT NULL,
    predicate   INTEGER NOT NULL,
    object      INTEGER NOT NULL,
    context     INTEGER NOT NULL,
    PRIMARY KEY (key_hash, txn_id)
);
CREATE INDEX IF NOT EXISTS idx_registry_txn ON registry(txn_id);
";

/// Location of one SQLite file and the settings every connection to it uses.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>, busy_timeout_ms: u64) -> Self {
        Database {
            path: path.into(),
            busy_timeout: Duration::from_millis(busy_timeout_ms),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a new connection in WAL mode with the configured busy timeout.
    pub fn open(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;",
        )?;
        Ok(conn)
    }

    /// Opens a connection and creates the tables of `schema` if needed.
    pub fn initialize(&self, schema: &str) -> Result<()> {
        let conn = self
            .open()
            .with_context(|| format!("Failed to open database {}", self.path.display()))?;
        conn.execute_batch(schema)
            .with_context(|| format!("Failed to create schema in {}", self.path.display()))?;
        Ok(())
    }
}

/// Whether `err` is a violation of a UNIQUE or PRIMARY KEY constraint.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use tempfile::tempdir;

    #[test]
    fn partial_index_allows_reinsert_after_delete() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("store.db"), 1000);
        db.initialize(STORE_SCHEMA).unwrap();
        let conn = db.open().unwrap();
        for id in 1..=3 {
            conn.execute(
                "INSERT INTO nodes (id, ntype, svalue, nkind, nkey, created_at) VALUES (?1, 'uri', ?2, 'uri', ?2, '')",
                params![id, format!("http://example.org/{}", id)],
            )
            .unwrap();
        }
        let insert = "INSERT INTO triples (id, subject, predicate, object, context, created_at) VALUES (?1, 1, 2, 3, NULL, '')";
        conn.execute(insert, params![10]).unwrap();
        let err = conn.execute(insert, params![11]).unwrap_err();
        assert!(is_unique_violation(&err));

        conn.execute("UPDATE triples SET deleted = 1 WHERE id = 10", [])
            .unwrap();
        conn.execute(insert, params![12]).unwrap();
    }

    #[test]
    fn foreign_key_failure_is_not_a_unique_violation() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("store.db"), 1000);
        db.initialize(STORE_SCHEMA).unwrap();
        let conn = db.open().unwrap();
        let err = conn
            .execute(
                "INSERT INTO triples (id, subject, predicate, object, created_at) VALUES (1, 7, 8, 9, '')",
                [],
            )
            .unwrap_err();
        assert!(!is_unique_violation(&err));
    }
}
