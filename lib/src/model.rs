//! RDF terms, triples and namespaces as they are stored by KiWi.
//!
//! Every node and triple carries an optional surrogate ID. The ID is `None` until the
//! persistence layer assigns one and never changes afterwards.

use crate::consts::{BOOLEAN_TYPES, DATE_TYPES, DOUBLE_TYPES, INTEGER_TYPES};
use crate::key::TripleKey;
use anyhow::{anyhow, Result};
use chrono::prelude::*;
use oxigraph::model::{BlankNode, Literal, NamedNode, NamedNodeRef, Term, TermRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Surrogate key of a node.
pub type NodeId = i64;
/// Surrogate key of a triple.
pub type TripleId = i64;
/// Identifier of an in-flight transaction.
pub type TransactionId = i64;

/// Type tag of a literal, mirrored by the `ntype` column of the nodes table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralKind {
    String,
    Boolean,
    Int,
    Double,
    Date,
}

impl LiteralKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LiteralKind::String => "string",
            LiteralKind::Boolean => "boolean",
            LiteralKind::Int => "int",
            LiteralKind::Double => "double",
            LiteralKind::Date => "date",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KiWiUriResource {
    pub id: Option<NodeId>,
    pub uri: String,
    pub created: DateTime<Utc>,
}

impl KiWiUriResource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            id: None,
            uri: uri.into(),
            created: Utc::now(),
        }
    }

    pub fn as_named_node(&self) -> NamedNodeRef<'_> {
        NamedNodeRef::new_unchecked(&self.uri)
    }
}

impl PartialEq for KiWiUriResource {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for KiWiUriResource {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KiWiAnonResource {
    pub id: Option<NodeId>,
    pub label: String,
    pub created: DateTime<Utc>,
}

impl KiWiAnonResource {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            created: Utc::now(),
        }
    }
}

impl PartialEq for KiWiAnonResource {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
    }
}

impl Eq for KiWiAnonResource {}

/// A literal. The lexical form is kept as is; typed values are derived from it on
/// demand according to [`KiWiLiteral::kind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KiWiLiteral {
    pub id: Option<NodeId>,
    pub content: String,
    pub language: Option<String>,
    pub datatype: Option<KiWiUriResource>,
    pub created: DateTime<Utc>,
}

impl KiWiLiteral {
    pub fn new(
        content: impl Into<String>,
        language: Option<String>,
        datatype: Option<KiWiUriResource>,
    ) -> Self {
        Self {
            id: None,
            content: content.into(),
            language: language.map(|l| l.to_lowercase()),
            datatype,
            created: Utc::now(),
        }
    }

    pub fn simple(content: impl Into<String>) -> Self {
        Self::new(content, None, None)
    }

    pub fn typed(content: impl Into<String>, datatype: NamedNodeRef<'_>) -> Self {
        Self::new(content, None, Some(KiWiUriResource::new(datatype.as_str())))
    }

    pub fn language_tagged(content: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(content, Some(language.into()), None)
    }

    pub fn datatype_uri(&self) -> Option<&str> {
        self.datatype.as_ref().map(|d| d.uri.as_str())
    }

    /// The storage type of this literal. Typed content that does not parse as its
    /// declared datatype is stored as a plain string.
    pub fn kind(&self) -> LiteralKind {
        let dt = match self.datatype_uri() {
            Some(dt) => dt,
            None => return LiteralKind::String,
        };
        if in_family(&BOOLEAN_TYPES, dt) && parse_boolean(&self.content).is_some() {
            LiteralKind::Boolean
        } else if in_family(&INTEGER_TYPES, dt) && self.content.trim().parse::<i64>().is_ok() {
            LiteralKind::Int
        } else if in_family(&DOUBLE_TYPES, dt) && self.content.trim().parse::<f64>().is_ok() {
            LiteralKind::Double
        } else if in_family(&DATE_TYPES, dt) && parse_date(&self.content).is_some() {
            LiteralKind::Date
        } else {
            LiteralKind::String
        }
    }

    pub fn int_value(&self) -> Option<i64> {
        match self.kind() {
            LiteralKind::Int => self.content.trim().parse().ok(),
            LiteralKind::Double => self.double_value().map(|d| d as i64),
            _ => None,
        }
    }

    pub fn double_value(&self) -> Option<f64> {
        match self.kind() {
            LiteralKind::Int | LiteralKind::Double => self.content.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn boolean_value(&self) -> Option<bool> {
        match self.kind() {
            LiteralKind::Boolean => parse_boolean(&self.content),
            _ => None,
        }
    }

    pub fn date_value(&self) -> Option<DateTime<Utc>> {
        match self.kind() {
            LiteralKind::Date => parse_date(&self.content),
            _ => None,
        }
    }

    /// Natural key of the literal cache: a digest over content, language and datatype.
    pub fn cache_key(&self) -> String {
        literal_cache_key(
            &self.content,
            self.language.as_deref(),
            self.datatype_uri(),
        )
    }
}

impl PartialEq for KiWiLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
            && self.language == other.language
            && self.datatype_uri() == other.datatype_uri()
    }
}

impl Eq for KiWiLiteral {}

/// Computes the cache key for a literal with the given components.
///
/// The key is stable across processes, so it doubles as the natural key of the
/// literal in the nodes table.
pub fn literal_cache_key(content: &str, language: Option<&str>, datatype: Option<&str>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(content.as_bytes());
    hasher.update(&[0]);
    if let Some(lang) = language {
        hasher.update(lang.to_lowercase().as_bytes());
    }
    hasher.update(&[0]);
    if let Some(dt) = datatype {
        hasher.update(dt.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

fn in_family(family: &[NamedNodeRef<'_>], datatype: &str) -> bool {
    family.iter().any(|t| t.as_str() == datatype)
}

fn parse_boolean(s: &str) -> Option<bool> {
    match s.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Any RDF term KiWi can store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KiWiNode {
    Uri(KiWiUriResource),
    BNode(KiWiAnonResource),
    Literal(KiWiLiteral),
}

impl KiWiNode {
    pub fn uri(uri: impl Into<String>) -> Self {
        KiWiNode::Uri(KiWiUriResource::new(uri))
    }

    pub fn bnode(label: impl Into<String>) -> Self {
        KiWiNode::BNode(KiWiAnonResource::new(label))
    }

    pub fn literal(literal: KiWiLiteral) -> Self {
        KiWiNode::Literal(literal)
    }

    pub fn id(&self) -> Option<NodeId> {
        match self {
            KiWiNode::Uri(n) => n.id,
            KiWiNode::BNode(n) => n.id,
            KiWiNode::Literal(n) => n.id,
        }
    }

    pub fn set_id(&mut self, id: NodeId) {
        match self {
            KiWiNode::Uri(n) => n.id = Some(id),
            KiWiNode::BNode(n) => n.id = Some(id),
            KiWiNode::Literal(n) => n.id = Some(id),
        }
    }

    pub fn created(&self) -> DateTime<Utc> {
        match self {
            KiWiNode::Uri(n) => n.created,
            KiWiNode::BNode(n) => n.created,
            KiWiNode::Literal(n) => n.created,
        }
    }

    pub fn is_resource(&self) -> bool {
        !matches!(self, KiWiNode::Literal(_))
    }

    /// Value of the `ntype` column.
    pub fn ntype(&self) -> &'static str {
        match self {
            KiWiNode::Uri(_) => "uri",
            KiWiNode::BNode(_) => "bnode",
            KiWiNode::Literal(l) => l.kind().as_str(),
        }
    }

    /// Value of the `nkind` column; together with [`KiWiNode::natural_key`] it
    /// identifies a node independently of its ID.
    pub fn nkind(&self) -> &'static str {
        match self {
            KiWiNode::Uri(_) => "uri",
            KiWiNode::BNode(_) => "bnode",
            KiWiNode::Literal(_) => "literal",
        }
    }

    /// Key of the reverse-lookup cache for this node: the URI, the blank node label
    /// or the literal cache key.
    pub fn natural_key(&self) -> String {
        match self {
            KiWiNode::Uri(n) => n.uri.clone(),
            KiWiNode::BNode(n) => n.label.clone(),
            KiWiNode::Literal(n) => n.cache_key(),
        }
    }

    pub fn from_term(term: TermRef<'_>) -> Result<Self> {
        #[allow(unreachable_patterns)]
        match term {
            TermRef::NamedNode(n) => Ok(KiWiNode::uri(n.as_str())),
            TermRef::BlankNode(b) => Ok(KiWiNode::bnode(b.as_str())),
            TermRef::Literal(l) => {
                let literal = if let Some(lang) = l.language() {
                    KiWiLiteral::language_tagged(l.value(), lang)
                } else if l.datatype() == oxigraph::model::vocab::xsd::STRING {
                    KiWiLiteral::simple(l.value())
                } else {
                    KiWiLiteral::typed(l.value(), l.datatype())
                };
                Ok(KiWiNode::Literal(literal))
            }
            other => Err(anyhow!("Unsupported RDF term: {}", other)),
        }
    }

    pub fn to_term(&self) -> Term {
        match self {
            KiWiNode::Uri(n) => NamedNode::new_unchecked(n.uri.clone()).into(),
            KiWiNode::BNode(n) => BlankNode::new_unchecked(n.label.clone()).into(),
            KiWiNode::Literal(l) => {
                let literal = match (&l.language, &l.datatype) {
                    (Some(lang), _) => {
                        Literal::new_language_tagged_literal_unchecked(l.content.clone(), lang)
                    }
                    (None, Some(dt)) => Literal::new_typed_literal(
                        l.content.clone(),
                        NamedNode::new_unchecked(dt.uri.clone()),
                    ),
                    (None, None) => Literal::new_simple_literal(l.content.clone()),
                };
                literal.into()
            }
        }
    }
}

impl fmt::Display for KiWiNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_term())
    }
}

impl From<KiWiUriResource> for KiWiNode {
    fn from(value: KiWiUriResource) -> Self {
        KiWiNode::Uri(value)
    }
}

impl From<KiWiAnonResource> for KiWiNode {
    fn from(value: KiWiAnonResource) -> Self {
        KiWiNode::BNode(value)
    }
}

impl From<KiWiLiteral> for KiWiNode {
    fn from(value: KiWiLiteral) -> Self {
        KiWiNode::Literal(value)
    }
}

/// A statement with an optional context. Equality only considers the four nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KiWiTriple {
    pub id: Option<TripleId>,
    pub subject: KiWiNode,
    pub predicate: KiWiUriResource,
    pub object: KiWiNode,
    pub context: Option<KiWiNode>,
    pub inferred: bool,
    pub deleted: bool,
    pub created: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl KiWiTriple {
    pub fn new(
        subject: KiWiNode,
        predicate: KiWiUriResource,
        object: KiWiNode,
        context: Option<KiWiNode>,
    ) -> Self {
        Self {
            id: None,
            subject,
            predicate,
            object,
            context,
            inferred: false,
            deleted: false,
            created: Utc::now(),
            deleted_at: None,
        }
    }

    /// The registry key of this triple, available once all its nodes have IDs.
    pub fn key(&self) -> Option<TripleKey> {
        let context = match &self.context {
            Some(c) => Some(c.id()?),
            None => None,
        };
        Some(TripleKey::new(
            self.subject.id()?,
            self.predicate.id?,
            self.object.id()?,
            context,
        ))
    }
}

impl PartialEq for KiWiTriple {
    fn eq(&self, other: &Self) -> bool {
        self.subject == other.subject
            && self.predicate == other.predicate
            && self.object == other.object
            && self.context == other.context
    }
}

impl fmt::Display for KiWiTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.subject,
            self.predicate.as_named_node(),
            self.object
        )?;
        if let Some(context) = &self.context {
            write!(f, " {}", context)?;
        }
        write!(f, " .")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KiWiNamespace {
    pub id: Option<i64>,
    pub prefix: String,
    pub uri: String,
    pub created: DateTime<Utc>,
}

impl KiWiNamespace {
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: None,
            prefix: prefix.into(),
            uri: uri.into(),
            created: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::vocab::xsd;

    #[test]
    fn literal_kind_follows_datatype() {
        assert_eq!(KiWiLiteral::simple("hello").kind(), LiteralKind::String);
        assert_eq!(
            KiWiLiteral::typed("42", xsd::INTEGER).kind(),
            LiteralKind::Int
        );
        assert_eq!(
            KiWiLiteral::typed("2.5", xsd::DOUBLE).kind(),
            LiteralKind::Double
        );
        assert_eq!(
            KiWiLiteral::typed("true", xsd::BOOLEAN).kind(),
            LiteralKind::Boolean
        );
        assert_eq!(
            KiWiLiteral::typed("2024-03-01T10:00:00Z", xsd::DATE_TIME).kind(),
            LiteralKind::Date
        );
        // unparsable content is kept as a string
        assert_eq!(
            KiWiLiteral::typed("forty-two", xsd::INT).kind(),
            LiteralKind::String
        );
    }

    #[test]
    fn typed_values() {
        assert_eq!(KiWiLiteral::typed("42", xsd::INT).int_value(), Some(42));
        assert_eq!(
            KiWiLiteral::typed("1.5", xsd::DECIMAL).double_value(),
            Some(1.5)
        );
        assert_eq!(
            KiWiLiteral::typed("0", xsd::BOOLEAN).boolean_value(),
            Some(false)
        );
        let date = KiWiLiteral::typed("2024-03-01", xsd::DATE)
            .date_value()
            .unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(KiWiLiteral::simple("42").int_value(), None);
    }

    #[test]
    fn literal_cache_key_distinguishes_language_and_type() {
        let plain = KiWiLiteral::simple("chat");
        let en = KiWiLiteral::language_tagged("chat", "en");
        let fr = KiWiLiteral::language_tagged("chat", "FR");
        let typed = KiWiLiteral::typed("chat", xsd::TOKEN);
        let keys = [
            plain.cache_key(),
            en.cache_key(),
            fr.cache_key(),
            typed.cache_key(),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        // language tags are case insensitive
        assert_eq!(
            fr.cache_key(),
            KiWiLiteral::language_tagged("chat", "fr").cache_key()
        );
    }

    #[test]
    fn term_conversion() {
        let term: Term = Literal::new_typed_literal("7", xsd::INT).into();
        let node = KiWiNode::from_term(term.as_ref()).unwrap();
        assert_eq!(node.ntype(), "int");
        assert_eq!(node.to_term(), term);

        let simple: Term = Literal::new_simple_literal("x").into();
        let node = KiWiNode::from_term(simple.as_ref()).unwrap();
        match &node {
            KiWiNode::Literal(l) => assert!(l.datatype.is_none()),
            _ => panic!("expected literal"),
        }
        assert_eq!(node.to_term(), simple);

        let bnode: Term = BlankNode::new_unchecked("b0").into();
        assert_eq!(
            KiWiNode::from_term(bnode.as_ref()).unwrap(),
            KiWiNode::bnode("b0")
        );
    }

    #[test]
    fn triple_key_requires_ids() {
        let mut triple = KiWiTriple::new(
            KiWiNode::uri("http://example.org/s"),
            KiWiUriResource::new("http://example.org/p"),
            KiWiNode::literal(KiWiLiteral::simple("o")),
            None,
        );
        assert!(triple.key().is_none());
        triple.subject.set_id(1);
        triple.predicate.id = Some(2);
        triple.object.set_id(3);
        assert_eq!(triple.key(), Some(TripleKey::new(1, 2, 3, None)));
    }
}
