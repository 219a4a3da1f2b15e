// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Graph record types: nodes and edges.
use crate::ident::NodeId;
use crate::label::Label;

/// Materialised record for a single node stored in the graph.
///
/// Invariants
/// - The node identifier is not embedded here; the store supplies it externally.
/// - Adjacency is owned by the store, not the record.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeRecord {
    /// Node label.
    pub label: Label,
    /// Whether the node is a root node.
    pub root: bool,
}

/// Materialised record for a single edge stored in the graph.
///
/// Invariants
/// - `src` and `tgt` reference live nodes in the same store.
/// - `src == tgt` marks a loop; loops are kept out of the out/in adjacency lists.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeRecord {
    /// Source node identifier.
    pub src: NodeId,
    /// Target node identifier.
    pub tgt: NodeId,
    /// Edge label.
    pub label: Label,
}

impl EdgeRecord {
    /// `true` when the edge starts and ends at the same node.
    #[must_use]
    pub fn is_loop(&self) -> bool {
        self.src == self.tgt
    }
}
