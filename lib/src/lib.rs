extern crate derive_builder;

pub mod cache;
pub mod config;
pub mod connection;
pub mod consts;
pub mod database;
pub mod errors;
pub mod key;
pub mod model;
pub mod persistence;
pub mod registry;
pub mod sequence;

pub use cache::{create_cache_manager, Cache, CacheManager, SharedCache};
pub use config::{CacheBackend, KiWiConfiguration, RegistryStrategy};
pub use connection::{KiWiConnection, TriplePattern};
pub use errors::RegistryError;
pub use key::TripleKey;
pub use model::{
    KiWiAnonResource, KiWiLiteral, KiWiNamespace, KiWiNode, KiWiTriple, KiWiUriResource,
    LiteralKind, NodeId, TransactionId, TripleId,
};
pub use persistence::{KiWiPersistence, StoreStats};
pub use registry::{create_registry, RegistryEntry, TripleRegistry};

pub fn init_logging() {
    // Allow KIWI_LOG to override RUST_LOG for consistent CLI defaults.
    if let Ok(log_level) = std::env::var("KIWI_LOG") {
        std::env::set_var("RUST_LOG", log_level);
    }
}
