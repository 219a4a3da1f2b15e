// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory graph store backing the host graph.
//!
//! Nodes and edges live in dense slot arenas addressed by [`NodeId`] /
//! [`EdgeId`]. Freed slots are recycled LIFO. Loops are kept in their own
//! adjacency list so that out/in degree only count non-loop edges.
use thiserror::Error;

use crate::ident::{EdgeId, NodeId};
use crate::record::{EdgeRecord, NodeRecord};

/// Error returned by [`GraphStore::remove_node_isolated`].
///
/// Node deletion must not cascade. If the node has incident edges, the caller
/// must delete them first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeleteNodeError {
    /// The node does not exist in the store.
    #[error("node not found")]
    NodeNotFound,
    /// The node has outgoing edges; delete them first.
    #[error("node has outgoing edges")]
    HasOutgoingEdges,
    /// The node has incoming edges; delete them first.
    #[error("node has incoming edges")]
    HasIncomingEdges,
    /// The node has loops; delete them first.
    #[error("node has loops")]
    HasLoops,
}

/// Structural degree of a live node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Degrees {
    /// Non-loop outgoing edges.
    pub out: usize,
    /// Non-loop incoming edges.
    pub inc: usize,
    /// Loops.
    pub loops: usize,
    /// Root flag.
    pub root: bool,
}

#[derive(Debug, Clone)]
struct NodeSlot {
    record: NodeRecord,
    out: Vec<EdgeId>,
    inc: Vec<EdgeId>,
    loops: Vec<EdgeId>,
}

/// Slot-based graph storage.
///
/// Mutation is crate-private: the only public way to edit a graph is through
/// [`crate::Host`], which keeps the degree index in step with every change.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: Vec<Option<NodeSlot>>,
    edges: Vec<Option<EdgeRecord>>,
    free_nodes: Vec<NodeId>,
    free_edges: Vec<EdgeId>,
    node_count: usize,
    edge_count: usize,
}

impl GraphStore {
    /// Number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of live edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Number of node slots ever allocated (live or free).
    #[must_use]
    pub fn node_slots(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edge slots ever allocated (live or free).
    #[must_use]
    pub fn edge_slots(&self) -> usize {
        self.edges.len()
    }

    /// Returns a shared reference to a node when it exists.
    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.slot(id).map(|s| &s.record)
    }

    /// Returns a shared reference to an edge when it exists.
    pub fn edge(&self, id: EdgeId) -> Option<&EdgeRecord> {
        self.edges.get(id.index()).and_then(Option::as_ref)
    }

    /// `true` if the node slot is live.
    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.slot(id).is_some()
    }

    /// `true` if the edge slot is live.
    #[must_use]
    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edge(id).is_some()
    }

    /// Iterate over live nodes in slot order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeId, &NodeRecord)> {
        self.nodes.iter().enumerate().filter_map(|(i, s)| {
            s.as_ref().map(|s| (NodeId(slot_u32(i)), &s.record))
        })
    }

    /// Iterate over live edges in slot order.
    pub fn iter_edges(&self) -> impl Iterator<Item = (EdgeId, &EdgeRecord)> {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (EdgeId(slot_u32(i)), e)))
    }

    /// Non-loop edges leaving `id`, in adjacency order.
    pub fn out_edges(&self, id: NodeId) -> &[EdgeId] {
        self.slot(id).map_or(&[], |s| s.out.as_slice())
    }

    /// Non-loop edges entering `id`, in adjacency order.
    pub fn in_edges(&self, id: NodeId) -> &[EdgeId] {
        self.slot(id).map_or(&[], |s| s.inc.as_slice())
    }

    /// Loops on `id`, in adjacency order.
    pub fn loops(&self, id: NodeId) -> &[EdgeId] {
        self.slot(id).map_or(&[], |s| s.loops.as_slice())
    }

    /// Structural degrees of a live node.
    pub fn degrees(&self, id: NodeId) -> Option<Degrees> {
        self.slot(id).map(|s| Degrees {
            out: s.out.len(),
            inc: s.inc.len(),
            loops: s.loops.len(),
            root: s.record.root,
        })
    }

    /// Non-loop out-degree (0 for a missing node).
    #[must_use]
    pub fn outdeg(&self, id: NodeId) -> usize {
        self.out_edges(id).len()
    }

    /// Non-loop in-degree (0 for a missing node).
    #[must_use]
    pub fn indeg(&self, id: NodeId) -> usize {
        self.in_edges(id).len()
    }

    /// Number of loops (0 for a missing node).
    #[must_use]
    pub fn loopdeg(&self, id: NodeId) -> usize {
        self.loops(id).len()
    }

    /// Root flag (`false` for a missing node).
    #[must_use]
    pub fn rooted(&self, id: NodeId) -> bool {
        self.slot(id).is_some_and(|s| s.record.root)
    }

    fn slot(&self, id: NodeId) -> Option<&NodeSlot> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut NodeSlot> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeRecord> {
        self.slot_mut(id).map(|s| &mut s.record)
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> Option<&mut EdgeRecord> {
        self.edges.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Stores a node in the most recently freed slot, or a fresh one.
    pub(crate) fn insert_node(&mut self, record: NodeRecord) -> NodeId {
        let slot = NodeSlot {
            record,
            out: Vec::new(),
            inc: Vec::new(),
            loops: Vec::new(),
        };
        self.node_count += 1;
        if let Some(id) = self.free_nodes.pop() {
            self.nodes[id.index()] = Some(slot);
            id
        } else {
            self.nodes.push(Some(slot));
            NodeId(slot_u32(self.nodes.len() - 1))
        }
    }

    /// Stores an edge and links it into its endpoints' adjacency.
    ///
    /// Returns `None` if either endpoint is missing.
    pub(crate) fn insert_edge(&mut self, record: EdgeRecord) -> Option<EdgeId> {
        if !self.contains_node(record.src) || !self.contains_node(record.tgt) {
            return None;
        }
        let id = match self.free_edges.pop() {
            Some(id) => id,
            None => {
                self.edges.push(None);
                EdgeId(slot_u32(self.edges.len() - 1))
            }
        };
        let (src, tgt) = (record.src, record.tgt);
        self.edges[id.index()] = Some(record);
        self.edge_count += 1;
        if src == tgt {
            if let Some(s) = self.slot_mut(src) {
                s.loops.push(id);
            }
        } else {
            if let Some(s) = self.slot_mut(src) {
                s.out.push(id);
            }
            if let Some(s) = self.slot_mut(tgt) {
                s.inc.push(id);
            }
        }
        Some(id)
    }

    /// Unlinks and frees an edge, returning its record.
    pub(crate) fn remove_edge(&mut self, id: EdgeId) -> Option<EdgeRecord> {
        let record = self.edges.get_mut(id.index()).and_then(Option::take)?;
        self.edge_count -= 1;
        self.free_edges.push(id);
        if record.is_loop() {
            if let Some(s) = self.slot_mut(record.src) {
                unlink(&mut s.loops, id);
            }
        } else {
            if let Some(s) = self.slot_mut(record.src) {
                unlink(&mut s.out, id);
            }
            if let Some(s) = self.slot_mut(record.tgt) {
                unlink(&mut s.inc, id);
            }
        }
        Some(record)
    }

    /// Frees an isolated node, returning its record.
    ///
    /// # Errors
    ///
    /// Rejects missing nodes and nodes with any incident edge.
    pub(crate) fn remove_node_isolated(
        &mut self,
        id: NodeId,
    ) -> Result<NodeRecord, DeleteNodeError> {
        let slot = self.slot(id).ok_or(DeleteNodeError::NodeNotFound)?;
        if !slot.out.is_empty() {
            return Err(DeleteNodeError::HasOutgoingEdges);
        }
        if !slot.inc.is_empty() {
            return Err(DeleteNodeError::HasIncomingEdges);
        }
        if !slot.loops.is_empty() {
            return Err(DeleteNodeError::HasLoops);
        }
        let slot = self.nodes[id.index()]
            .take()
            .ok_or(DeleteNodeError::NodeNotFound)?;
        self.node_count -= 1;
        self.free_nodes.push(id);
        Ok(slot.record)
    }
}

/// Removes `id` from an adjacency list; order is not preserved.
fn unlink(list: &mut Vec<EdgeId>, id: EdgeId) {
    if let Some(pos) = list.iter().position(|e| *e == id) {
        list.swap_remove(pos);
    } else {
        debug_assert!(false, "adjacency list is missing edge {id:?}");
    }
}

#[allow(clippy::cast_possible_truncation)]
fn slot_u32(i: usize) -> u32 {
    debug_assert!(u32::try_from(i).is_ok(), "slot index overflows u32");
    i as u32
}
