// Registry errors

use thiserror::Error;

/// Failure of a registry bookkeeping operation.
///
/// The registry is an optimization in front of the triples table, so callers
/// usually log these errors and continue; see `KiWiConnection::store_triple`.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry scratch table error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("registry cache is not available: {0}")]
    Unavailable(String),
}
