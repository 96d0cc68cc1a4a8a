//! Defines constant names shared by the cache managers, the registries and the SQL schema,
//! plus the XSD datatype families used to type literals.

use oxigraph::model::vocab::xsd;
use oxigraph::model::NamedNodeRef;

/// Context component of a [`crate::key::TripleKey`] for triples without a named graph.
pub const NO_CONTEXT: i64 = -1;

// names of the caches handed out by a CacheManager
pub const NODE_CACHE: &str = "node-cache";
pub const TRIPLE_CACHE: &str = "triple-cache";
pub const URI_CACHE: &str = "uri-cache";
pub const BNODE_CACHE: &str = "bnode-cache";
pub const LITERAL_CACHE: &str = "literal-cache";
pub const NAMESPACE_URI_CACHE: &str = "namespace-uri-cache";
pub const NAMESPACE_PREFIX_CACHE: &str = "namespace-prefix-cache";
pub const REGISTRY_CACHE: &str = "registry-cache";

// file names inside the store root
pub const STORE_DB: &str = "store.db";
pub const SCRATCH_DB: &str = "scratch.db";
pub const CONFIG_FILE: &str = "kiwi.json";

// sequence names
pub const SEQ_NODES: &str = "seq.nodes";
pub const SEQ_TRIPLES: &str = "seq.triples";
pub const SEQ_NAMESPACES: &str = "seq.namespaces";
pub const SEQ_TRANSACTIONS: &str = "seq.tx";

pub const BOOLEAN_TYPES: [NamedNodeRef<'static>; 1] = [xsd::BOOLEAN];

pub const INTEGER_TYPES: [NamedNodeRef<'static>; 13] = [
    xsd::INTEGER,
    xsd::INT,
    xsd::LONG,
    xsd::SHORT,
    xsd::BYTE,
    xsd::NON_NEGATIVE_INTEGER,
    xsd::NON_POSITIVE_INTEGER,
    xsd::NEGATIVE_INTEGER,
    xsd::POSITIVE_INTEGER,
    xsd::UNSIGNED_INT,
    xsd::UNSIGNED_LONG,
    xsd::UNSIGNED_SHORT,
    xsd::UNSIGNED_BYTE,
];

pub const DOUBLE_TYPES: [NamedNodeRef<'static>; 3] = [xsd::DOUBLE, xsd::FLOAT, xsd::DECIMAL];

pub const DATE_TYPES: [NamedNodeRef<'static>; 2] = [xsd::DATE_TIME, xsd::DATE];
