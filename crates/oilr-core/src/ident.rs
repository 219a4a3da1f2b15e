// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier and hashing utilities.
use blake3::Hasher;

/// Canonical 256-bit hash used for addressing rules.
pub type Hash = [u8; 32];

/// Dense slot identifier for a host node.
///
/// `NodeId` indexes the node arena of a [`crate::GraphStore`]. Slots are reused
/// after deletion, so an id is only meaningful against the store that issued it
/// and only until that node is deleted.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    /// Returns the slot index as `usize`.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense slot identifier for a host edge.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeId(pub u32);

impl EdgeId {
    /// Returns the slot index as `usize`.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a node in a rule's left-hand-side pattern.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatNode(pub usize);

/// Index of an edge in a rule's left-hand-side pattern.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatEdge(pub usize);

/// Stable identifier for a rule, derived from its name.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RuleId(pub Hash);

impl RuleId {
    /// Returns the canonical byte representation of this id.
    #[must_use]
    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }

    /// First eight bytes rendered as hex, for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl core::fmt::Display for RuleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.short())
    }
}

/// Produces a stable, domain‑separated rule identifier (prefix `b"rule:"`) using BLAKE3.
pub fn make_rule_id(name: &str) -> RuleId {
    let mut hasher = Hasher::new();
    hasher.update(b"rule:");
    hasher.update(name.as_bytes());
    RuleId(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_ids_are_stable_and_distinct() {
        assert_eq!(make_rule_id("grow"), make_rule_id("grow"));
        assert_ne!(make_rule_id("grow"), make_rule_id("shrink"));
        assert_eq!(make_rule_id("grow").short().len(), 16);
    }

    #[test]
    fn rule_id_is_domain_separated() {
        let plain: Hash = blake3::hash(b"grow").into();
        assert_ne!(make_rule_id("grow").0, plain);
    }
}
