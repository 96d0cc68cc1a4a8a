//! A transaction on a KiWi store.
//!
//! A [`KiWiConnection`] owns one SQLite connection, the transaction ID under
//! which it registers triple keys, and the nodes, triples and namespaces it
//! created. Reads run outside a database transaction until the first write,
//! which opens a `BEGIN IMMEDIATE` transaction holding the store's write lock
//! until commit or rollback. Committing or rolling back releases its registry
//! keys exactly once; rolling back also evicts everything it created from the
//! caches. Dropping an open connection rolls it back.

use crate::cache::terms::{NamespaceCaches, NodeCaches};
use crate::cache::{CacheManager, SharedCache};
use crate::consts::{NO_CONTEXT, SEQ_NAMESPACES, SEQ_NODES, SEQ_TRIPLES};
use crate::database::is_unique_violation;
use crate::key::TripleKey;
use crate::model::{
    literal_cache_key, KiWiAnonResource, KiWiLiteral, KiWiNamespace, KiWiNode, KiWiTriple,
    KiWiUriResource, NodeId, TransactionId, TripleId,
};
use crate::registry::TripleRegistry;
use crate::sequence::SequenceGenerator;
use anyhow::{anyhow, bail, Result};
use chrono::prelude::*;
use log::{debug, error, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::Arc;

/// Selects triples by any combination of their four nodes.
#[derive(Debug, Clone, Default)]
pub struct TriplePattern {
    pub subject: Option<KiWiNode>,
    pub predicate: Option<KiWiUriResource>,
    pub object: Option<KiWiNode>,
    pub context: Option<KiWiNode>,
}

struct RawNode {
    id: NodeId,
    svalue: String,
    lang: Option<String>,
    ltype: Option<NodeId>,
    nkind: String,
    created: DateTime<Utc>,
}

impl RawNode {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawNode {
            id: row.get(0)?,
            svalue: row.get(1)?,
            lang: row.get(2)?,
            ltype: row.get(3)?,
            nkind: row.get(4)?,
            created: row.get(5)?,
        })
    }
}

const NODE_COLUMNS: &str = "id, svalue, lang, ltype, nkind, created_at";

struct RawTriple {
    id: TripleId,
    subject: NodeId,
    predicate: NodeId,
    object: NodeId,
    context: Option<NodeId>,
    inferred: bool,
    deleted: bool,
    created: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl RawTriple {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawTriple {
            id: row.get(0)?,
            subject: row.get(1)?,
            predicate: row.get(2)?,
            object: row.get(3)?,
            context: row.get(4)?,
            inferred: row.get(5)?,
            deleted: row.get(6)?,
            created: row.get(7)?,
            deleted_at: row.get(8)?,
        })
    }
}

const TRIPLE_COLUMNS: &str =
    "id, subject, predicate, object, context, inferred, deleted, created_at, deleted_at";

pub struct KiWiConnection {
    transaction: TransactionId,
    conn: Connection,
    sequences: SequenceGenerator,
    registry: Arc<dyn TripleRegistry>,
    nodes: NodeCaches,
    triples: SharedCache<TripleId, KiWiTriple>,
    namespaces: NamespaceCaches,
    created_nodes: Vec<KiWiNode>,
    created_triples: Vec<TripleId>,
    created_namespaces: Vec<KiWiNamespace>,
    active: bool,
    writing: bool,
    released: bool,
}

impl KiWiConnection {
    pub(crate) fn begin(
        transaction: TransactionId,
        conn: Connection,
        sequences: SequenceGenerator,
        registry: Arc<dyn TripleRegistry>,
        cache_manager: &dyn CacheManager,
    ) -> Result<Self> {
        debug!("Began transaction {}", transaction);
        Ok(KiWiConnection {
            transaction,
            conn,
            sequences,
            registry,
            nodes: NodeCaches::new(cache_manager),
            triples: cache_manager.triple_cache(),
            namespaces: NamespaceCaches::new(cache_manager),
            created_nodes: Vec::new(),
            created_triples: Vec::new(),
            created_namespaces: Vec::new(),
            active: true,
            writing: false,
            released: false,
        })
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn ensure_active(&self) -> Result<()> {
        if !self.active {
            bail!("Transaction {} is no longer active", self.transaction);
        }
        Ok(())
    }

    /// Takes the write lock before the first write of this transaction.
    fn ensure_writable(&mut self) -> Result<()> {
        self.ensure_active()?;
        if !self.writing {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
            self.writing = true;
            debug!("Transaction {} holds the write lock", self.transaction);
        }
        Ok(())
    }

    // ---- nodes ----

    /// Assigns `node` its ID: from the cache, from the database by natural key, or
    /// by inserting it with a fresh ID.
    pub fn store_node(&mut self, node: &mut KiWiNode) -> Result<NodeId> {
        self.ensure_active()?;
        if let Some(id) = node.id() {
            return Ok(id);
        }
        if let KiWiNode::Literal(literal) = node {
            if let Some(datatype) = literal.datatype.as_mut() {
                if datatype.id.is_none() {
                    let mut dt_node = KiWiNode::Uri(datatype.clone());
                    datatype.id = Some(self.store_node(&mut dt_node)?);
                }
            }
        }
        if let Some(cached) = self.nodes.lookup(node) {
            if let Some(id) = cached.id() {
                node.set_id(id);
                return Ok(id);
            }
        }
        if let Some(existing) = self.load_by_natural_key(node.nkind(), &node.natural_key())? {
            if let Some(id) = existing.id() {
                node.set_id(id);
                self.nodes.cache_node(&existing);
                return Ok(id);
            }
        }

        self.ensure_writable()?;
        let id = self.sequences.next(SEQ_NODES)?;
        match self.insert_node(id, node) {
            Ok(()) => {
                node.set_id(id);
                self.created_nodes.push(node.clone());
                self.nodes.cache_node(node);
                debug!("Stored node {} as {}", node, id);
                Ok(id)
            }
            Err(e) if is_unique_violation(&e) => {
                let existing = self
                    .load_by_natural_key(node.nkind(), &node.natural_key())?
                    .and_then(|n| n.id())
                    .ok_or_else(|| anyhow!("Node {} vanished after a unique violation", node))?;
                node.set_id(existing);
                Ok(existing)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn insert_node(&self, id: NodeId, node: &KiWiNode) -> rusqlite::Result<()> {
        let (svalue, ivalue, dvalue, bvalue, tvalue, lang, ltype) = match node {
            KiWiNode::Uri(n) => (n.uri.clone(), None, None, None, None, None, None),
            KiWiNode::BNode(n) => (n.label.clone(), None, None, None, None, None, None),
            KiWiNode::Literal(l) => (
                l.content.clone(),
                l.int_value(),
                l.double_value(),
                l.boolean_value(),
                l.date_value(),
                l.language.clone(),
                l.datatype.as_ref().and_then(|d| d.id),
            ),
        };
        self.conn.execute(
            "INSERT INTO nodes (id, ntype, svalue, ivalue, dvalue, bvalue, tvalue, lang, ltype, nkind, nkey, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                id,
                node.ntype(),
                svalue,
                ivalue,
                dvalue,
                bvalue,
                tvalue,
                lang,
                ltype,
                node.nkind(),
                node.natural_key(),
                node.created(),
            ],
        )?;
        Ok(())
    }

    fn load_by_natural_key(&self, nkind: &str, nkey: &str) -> Result<Option<KiWiNode>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {} FROM nodes WHERE nkind = ?1 AND nkey = ?2", NODE_COLUMNS),
                params![nkind, nkey],
                RawNode::from_row,
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(self.build_node(raw)?)),
            None => Ok(None),
        }
    }

    fn build_node(&self, raw: RawNode) -> Result<KiWiNode> {
        let node = match raw.nkind.as_str() {
            "uri" => KiWiNode::Uri(KiWiUriResource {
                id: Some(raw.id),
                uri: raw.svalue,
                created: raw.created,
            }),
            "bnode" => KiWiNode::BNode(KiWiAnonResource {
                id: Some(raw.id),
                label: raw.svalue,
                created: raw.created,
            }),
            "literal" => {
                let datatype = match raw.ltype {
                    Some(ltype) => match self.load_node_by_id(ltype)? {
                        Some(KiWiNode::Uri(dt)) => Some(dt),
                        _ => bail!("Datatype {} of literal {} is not a URI", ltype, raw.id),
                    },
                    None => None,
                };
                KiWiNode::Literal(KiWiLiteral {
                    id: Some(raw.id),
                    content: raw.svalue,
                    language: raw.lang,
                    datatype,
                    created: raw.created,
                })
            }
            other => bail!("Unknown node kind {} for node {}", other, raw.id),
        };
        Ok(node)
    }

    pub fn load_node_by_id(&self, id: NodeId) -> Result<Option<KiWiNode>> {
        if let Some(node) = self.nodes.node_by_id(id) {
            return Ok(Some(node));
        }
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {} FROM nodes WHERE id = ?1", NODE_COLUMNS),
                params![id],
                RawNode::from_row,
            )
            .optional()?;
        match raw {
            Some(raw) => {
                let node = self.build_node(raw)?;
                self.nodes.cache_node(&node);
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    fn load_cached_or_stored(&self, probe: &KiWiNode) -> Result<Option<KiWiNode>> {
        if let Some(node) = self.nodes.lookup(probe) {
            return Ok(Some(node));
        }
        let node = self.load_by_natural_key(probe.nkind(), &probe.natural_key())?;
        if let Some(node) = &node {
            self.nodes.cache_node(node);
        }
        Ok(node)
    }

    pub fn load_uri_resource(&self, uri: &str) -> Result<Option<KiWiUriResource>> {
        match self.load_cached_or_stored(&KiWiNode::uri(uri))? {
            Some(KiWiNode::Uri(n)) => Ok(Some(n)),
            _ => Ok(None),
        }
    }

    pub fn load_anon_resource(&self, label: &str) -> Result<Option<KiWiAnonResource>> {
        match self.load_cached_or_stored(&KiWiNode::bnode(label))? {
            Some(KiWiNode::BNode(n)) => Ok(Some(n)),
            _ => Ok(None),
        }
    }

    pub fn load_literal(
        &self,
        content: &str,
        language: Option<&str>,
        datatype: Option<&str>,
    ) -> Result<Option<KiWiLiteral>> {
        let key = literal_cache_key(content, language, datatype);
        if let Some(literal) = self.nodes.literal(&key) {
            if literal.id.is_some() {
                return Ok(Some(literal));
            }
        }
        match self.load_by_natural_key("literal", &key)? {
            Some(node) => {
                self.nodes.cache_node(&node);
                match node {
                    KiWiNode::Literal(l) => Ok(Some(l)),
                    _ => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    /// The ID of an already stored node, without storing it.
    fn resolve_node_id(&self, node: &KiWiNode) -> Result<Option<NodeId>> {
        if let Some(id) = node.id() {
            return Ok(Some(id));
        }
        Ok(self.load_cached_or_stored(node)?.and_then(|n| n.id()))
    }

    // ---- triples ----

    /// Stores `triple` and its nodes.
    ///
    /// If any transaction registered the same key the registered ID is reused and
    /// nothing is inserted. Otherwise a new ID is minted, registered for this
    /// transaction and the row inserted; when the unique index reports that the
    /// triple already exists, the existing ID is used instead. Returns whether a
    /// new row was inserted.
    pub fn store_triple(&mut self, triple: &mut KiWiTriple) -> Result<bool> {
        self.ensure_active()?;
        self.store_node(&mut triple.subject)?;
        let mut predicate = KiWiNode::Uri(triple.predicate.clone());
        triple.predicate.id = Some(self.store_node(&mut predicate)?);
        self.store_node(&mut triple.object)?;
        if let Some(context) = triple.context.as_mut() {
            self.store_node(context)?;
        }
        let key = triple
            .key()
            .ok_or_else(|| anyhow!("Triple {} has nodes without IDs", triple))?;

        if let Some(existing) = self.registry.lookup_key(&key) {
            debug!(
                "Transaction {} reuses registered triple {} for {}",
                self.transaction, existing, key
            );
            triple.id = Some(existing);
            return Ok(false);
        }

        self.ensure_writable()?;
        let id = self.sequences.next(SEQ_TRIPLES)?;
        if let Err(e) = self.registry.register_key(&key, self.transaction, id) {
            warn!("Failed to register {} for transaction {}: {}", key, self.transaction, e);
        }
        let inserted = self.conn.execute(
            "INSERT INTO triples (id, subject, predicate, object, context, inferred, deleted, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            params![
                id,
                key.subject(),
                key.predicate(),
                key.object(),
                key.context(),
                triple.inferred,
                triple.created,
            ],
        );
        match inserted {
            Ok(_) => {
                triple.id = Some(id);
                triple.deleted = false;
                triple.deleted_at = None;
                self.created_triples.push(id);
                self.triples.put(id, triple.clone());
                debug!("Stored triple {} as {}", triple, id);
                Ok(true)
            }
            Err(e) if is_unique_violation(&e) => {
                let existing = self
                    .find_triple_id(&key)?
                    .ok_or_else(|| anyhow!("Triple {} vanished after a unique violation", key))?;
                if let Err(e) = self.registry.delete_key(&key) {
                    warn!("Failed to delete registry key {}: {}", key, e);
                }
                debug!("Triple {} already stored as {}", key, existing);
                triple.id = Some(existing);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_triple_id(&self, key: &TripleKey) -> Result<Option<TripleId>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM triples
                 WHERE subject = ?1 AND predicate = ?2 AND object = ?3
                   AND IFNULL(context, -1) = ?4 AND deleted = 0",
                params![
                    key.subject(),
                    key.predicate(),
                    key.object(),
                    key.context_or_sentinel()
                ],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// The key of `triple` if all of its nodes are already stored.
    fn resolve_key(&self, triple: &KiWiTriple) -> Result<Option<TripleKey>> {
        let subject = self.resolve_node_id(&triple.subject)?;
        let predicate = self.resolve_node_id(&KiWiNode::Uri(triple.predicate.clone()))?;
        let object = self.resolve_node_id(&triple.object)?;
        let context = match &triple.context {
            Some(c) => match self.resolve_node_id(c)? {
                Some(id) => Some(id),
                None => return Ok(None),
            },
            None => None,
        };
        Ok(match (subject, predicate, object) {
            (Some(s), Some(p), Some(o)) => Some(TripleKey::new(s, p, o, context)),
            _ => None,
        })
    }

    /// Marks `triple` as deleted. Returns false when no live row matched.
    pub fn delete_triple(&mut self, triple: &mut KiWiTriple) -> Result<bool> {
        self.ensure_writable()?;
        let key = match self.resolve_key(triple)? {
            Some(key) => key,
            None => return Ok(false),
        };
        let id = match triple.id {
            Some(id) => Some(id),
            None => self.find_triple_id(&key)?,
        };
        let id = match id {
            Some(id) => id,
            None => return Ok(false),
        };
        let now = Utc::now();
        let updated = self.conn.execute(
            "UPDATE triples SET deleted = 1, deleted_at = ?1 WHERE id = ?2 AND deleted = 0",
            params![now, id],
        )?;
        if let Err(e) = self.registry.delete_key(&key) {
            warn!("Failed to delete registry key {}: {}", key, e);
        }
        self.triples.remove(&id);
        if updated == 0 {
            return Ok(false);
        }
        triple.id = Some(id);
        triple.deleted = true;
        triple.deleted_at = Some(now);
        debug!("Deleted triple {}", id);
        Ok(true)
    }

    fn build_triple(&self, raw: RawTriple) -> Result<KiWiTriple> {
        let missing = |id: NodeId| anyhow!("Triple {} references missing node {}", raw.id, id);
        let subject = self
            .load_node_by_id(raw.subject)?
            .ok_or_else(|| missing(raw.subject))?;
        let predicate = match self.load_node_by_id(raw.predicate)? {
            Some(KiWiNode::Uri(p)) => p,
            Some(_) => bail!("Predicate {} of triple {} is not a URI", raw.predicate, raw.id),
            None => return Err(missing(raw.predicate)),
        };
        let object = self
            .load_node_by_id(raw.object)?
            .ok_or_else(|| missing(raw.object))?;
        let context = match raw.context {
            Some(c) if c != NO_CONTEXT => {
                Some(self.load_node_by_id(c)?.ok_or_else(|| missing(c))?)
            }
            _ => None,
        };
        Ok(KiWiTriple {
            id: Some(raw.id),
            subject,
            predicate,
            object,
            context,
            inferred: raw.inferred,
            deleted: raw.deleted,
            created: raw.created,
            deleted_at: raw.deleted_at,
        })
    }

    pub fn load_triple_by_id(&self, id: TripleId) -> Result<Option<KiWiTriple>> {
        if let Some(triple) = self.triples.get(&id) {
            return Ok(Some(triple));
        }
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {} FROM triples WHERE id = ?1", TRIPLE_COLUMNS),
                params![id],
                RawTriple::from_row,
            )
            .optional()?;
        match raw {
            Some(raw) => {
                let triple = self.build_triple(raw)?;
                if !triple.deleted {
                    self.triples.put(id, triple.clone());
                }
                Ok(Some(triple))
            }
            None => Ok(None),
        }
    }

    /// Lists the live triples matching `pattern`, ordered by ID.
    pub fn list_triples(&self, pattern: &TriplePattern) -> Result<Vec<KiWiTriple>> {
        let mut clauses = vec!["deleted = 0".to_string()];
        let mut values: Vec<Value> = Vec::new();
        let predicate = pattern.predicate.clone().map(KiWiNode::Uri);
        for (column, node) in [
            ("subject", pattern.subject.as_ref()),
            ("predicate", predicate.as_ref()),
            ("object", pattern.object.as_ref()),
            ("context", pattern.context.as_ref()),
        ] {
            if let Some(node) = node {
                match self.resolve_node_id(node)? {
                    Some(id) => {
                        values.push(Value::Integer(id));
                        clauses.push(format!("{} = ?{}", column, values.len()));
                    }
                    None => return Ok(Vec::new()),
                }
            }
        }
        let sql = format!(
            "SELECT {} FROM triples WHERE {} ORDER BY id",
            TRIPLE_COLUMNS,
            clauses.join(" AND ")
        );
        let raws = {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), RawTriple::from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        raws.into_iter().map(|raw| self.build_triple(raw)).collect()
    }

    /// Number of live triples, optionally restricted to one context.
    pub fn size(&self, context: Option<&KiWiNode>) -> Result<u64> {
        let count: i64 = match context {
            Some(node) => match self.resolve_node_id(node)? {
                Some(id) => self.conn.query_row(
                    "SELECT COUNT(*) FROM triples WHERE deleted = 0 AND context = ?1",
                    params![id],
                    |row| row.get(0),
                )?,
                None => 0,
            },
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM triples WHERE deleted = 0",
                [],
                |row| row.get(0),
            )?,
        };
        Ok(count as u64)
    }

    // ---- namespaces ----

    /// Stores a namespace binding. Storing an identical binding again is a no-op;
    /// binding a known prefix or URI to something else is an error.
    pub fn store_namespace(&mut self, namespace: &mut KiWiNamespace) -> Result<()> {
        self.ensure_writable()?;
        if let Some(existing) = self.load_namespace_by_prefix(&namespace.prefix)? {
            if existing.uri == namespace.uri {
                namespace.id = existing.id;
                return Ok(());
            }
            bail!(
                "Prefix {} is already bound to {}",
                existing.prefix,
                existing.uri
            );
        }
        if let Some(existing) = self.load_namespace_by_uri(&namespace.uri)? {
            bail!(
                "Namespace {} is already bound to prefix {}",
                existing.uri,
                existing.prefix
            );
        }
        let id = self.sequences.next(SEQ_NAMESPACES)?;
        self.conn.execute(
            "INSERT INTO namespaces (id, prefix, uri, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, namespace.prefix, namespace.uri, namespace.created],
        )?;
        namespace.id = Some(id);
        self.namespaces.cache(namespace);
        self.created_namespaces.push(namespace.clone());
        debug!("Stored namespace {} = {}", namespace.prefix, namespace.uri);
        Ok(())
    }

    fn load_namespace(&self, column: &str, value: &str) -> Result<Option<KiWiNamespace>> {
        let namespace = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, prefix, uri, created_at FROM namespaces WHERE {} = ?1",
                    column
                ),
                params![value],
                |row| {
                    Ok(KiWiNamespace {
                        id: row.get(0)?,
                        prefix: row.get(1)?,
                        uri: row.get(2)?,
                        created: row.get(3)?,
                    })
                },
            )
            .optional()?;
        if let Some(ns) = &namespace {
            self.namespaces.cache(ns);
        }
        Ok(namespace)
    }

    pub fn load_namespace_by_prefix(&self, prefix: &str) -> Result<Option<KiWiNamespace>> {
        if let Some(ns) = self.namespaces.by_prefix(prefix) {
            return Ok(Some(ns));
        }
        self.load_namespace("prefix", prefix)
    }

    pub fn load_namespace_by_uri(&self, uri: &str) -> Result<Option<KiWiNamespace>> {
        if let Some(ns) = self.namespaces.by_uri(uri) {
            return Ok(Some(ns));
        }
        self.load_namespace("uri", uri)
    }

    /// Removes the binding of the namespace's prefix. Returns false if it was unbound.
    pub fn delete_namespace(&mut self, namespace: &KiWiNamespace) -> Result<bool> {
        self.ensure_writable()?;
        let deleted = self.conn.execute(
            "DELETE FROM namespaces WHERE prefix = ?1",
            params![namespace.prefix],
        )?;
        self.namespaces.evict(namespace);
        Ok(deleted > 0)
    }

    pub fn list_namespaces(&self) -> Result<Vec<KiWiNamespace>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, prefix, uri, created_at FROM namespaces ORDER BY prefix")?;
        let rows = stmt.query_map([], |row| {
            Ok(KiWiNamespace {
                id: row.get(0)?,
                prefix: row.get(1)?,
                uri: row.get(2)?,
                created: row.get(3)?,
            })
        })?;
        let namespaces = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(namespaces)
    }

    // ---- transaction end ----

    pub fn commit(mut self) -> Result<()> {
        self.ensure_active()?;
        if self.writing {
            self.conn.execute_batch("COMMIT")?;
            self.writing = false;
        }
        self.active = false;
        debug!(
            "Committed transaction {} ({} nodes, {} triples)",
            self.transaction,
            self.created_nodes.len(),
            self.created_triples.len()
        );
        self.release();
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.abort()
    }

    fn abort(&mut self) -> Result<()> {
        let result = if self.active && self.writing {
            self.writing = false;
            self.conn.execute_batch("ROLLBACK")
        } else {
            Ok(())
        };
        self.active = false;
        for node in self.created_nodes.drain(..) {
            self.nodes.evict_node(&node);
        }
        for id in self.created_triples.drain(..) {
            self.triples.remove(&id);
        }
        for namespace in self.created_namespaces.drain(..) {
            self.namespaces.evict(&namespace);
        }
        debug!("Rolled back transaction {}", self.transaction);
        self.release();
        result?;
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.registry.release_transaction(self.transaction) {
            warn!(
                "Failed to release registry keys of transaction {}: {}",
                self.transaction, e
            );
        }
    }
}

impl Drop for KiWiConnection {
    fn drop(&mut self) {
        if self.active || !self.released {
            if let Err(e) = self.abort() {
                error!("Failed to roll back transaction {}: {}", self.transaction, e);
            }
        }
    }
}
