//! The registry key of a candidate triple.

use crate::consts::NO_CONTEXT;
use crate::model::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four node IDs (subject, predicate, object, context) of a triple.
///
/// Equality and `Hash` are structural over the four IDs. [`TripleKey::long_hash`] is
/// derived from the same bytes with BLAKE3, so it does not depend on the process or
/// the platform and can be shared through the scratch table and the replicated cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripleKey([NodeId; 4]);

impl TripleKey {
    pub fn new(
        subject: NodeId,
        predicate: NodeId,
        object: NodeId,
        context: Option<NodeId>,
    ) -> Self {
        TripleKey([subject, predicate, object, context.unwrap_or(NO_CONTEXT)])
    }

    pub fn from_ids(ids: [NodeId; 4]) -> Self {
        TripleKey(ids)
    }

    pub fn subject(&self) -> NodeId {
        self.0[0]
    }

    pub fn predicate(&self) -> NodeId {
        self.0[1]
    }

    pub fn object(&self) -> NodeId {
        self.0[2]
    }

    pub fn context(&self) -> Option<NodeId> {
        match self.0[3] {
            NO_CONTEXT => None,
            c => Some(c),
        }
    }

    /// The raw context component, `NO_CONTEXT` when the triple has none.
    pub fn context_or_sentinel(&self) -> NodeId {
        self.0[3]
    }

    pub fn ids(&self) -> [NodeId; 4] {
        self.0
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        let mut buf = [0u8; 32];
        for (i, id) in self.0.iter().enumerate() {
            buf[i * 8..(i + 1) * 8].copy_from_slice(&id.to_le_bytes());
        }
        buf
    }

    /// Stable 64 bit hash used as the natural key of registry entries.
    pub fn long_hash(&self) -> i64 {
        let digest = blake3::hash(&self.to_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        i64::from_le_bytes(head)
    }
}

impl fmt::Display for TripleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;
    use std::hash::{Hash, Hasher};

    fn std_hash(key: &TripleKey) -> u64 {
        let mut h = DefaultHasher::new();
        key.hash(&mut h);
        h.finish()
    }

    #[test]
    fn identical_quadruples_are_equal() {
        let a = TripleKey::new(100, 200, 300, None);
        let b = TripleKey::from_ids([100, 200, 300, NO_CONTEXT]);
        assert_eq!(a, b);
        assert_eq!(a.long_hash(), b.long_hash());
        assert_eq!(std_hash(&a), std_hash(&b));
        assert_eq!(a.context(), None);
    }

    #[test]
    fn components_are_positional() {
        let a = TripleKey::new(1, 2, 3, Some(4));
        let b = TripleKey::new(3, 2, 1, Some(4));
        assert_ne!(a, b);
        assert_ne!(a.long_hash(), b.long_hash());
        assert_eq!(a.context(), Some(4));
        assert_ne!(TripleKey::new(1, 2, 3, None), TripleKey::new(1, 2, 3, Some(4)));
    }

    #[test]
    fn long_hash_is_stable() {
        // must never change between releases: registrations are shared across processes
        let key = TripleKey::new(100, 200, 300, None);
        let expected = {
            let digest = blake3::hash(&key.to_bytes());
            i64::from_le_bytes(digest.as_bytes()[..8].try_into().unwrap())
        };
        assert_eq!(key.long_hash(), expected);
        assert_eq!(key.long_hash(), TripleKey::new(100, 200, 300, None).long_hash());
    }

    #[test]
    fn no_collisions_in_dense_id_range() {
        let mut seen = HashSet::new();
        for s in 0..20 {
            for p in 0..10 {
                for o in 0..20 {
                    assert!(seen.insert(TripleKey::new(s, p, o, None).long_hash()));
                }
            }
        }
    }
}
