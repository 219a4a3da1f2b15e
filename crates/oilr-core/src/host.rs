// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host graph: the graph store together with its degree index.
//!
//! Every public mutation primitive re-indexes the nodes whose degree class it
//! may have changed before returning, so a search never observes a stale
//! bucket.
use thiserror::Error;

use crate::graph::{DeleteNodeError, GraphStore};
use crate::ident::{EdgeId, NodeId};
use crate::index::{DegreeCaps, DegreeClass, DegreeIndex, ElemList};
use crate::label::{Label, Mark};
use crate::record::{EdgeRecord, NodeRecord};

/// Errors raised by host mutation primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The node does not exist.
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    /// The edge does not exist.
    #[error("unknown edge {0:?}")]
    UnknownEdge(EdgeId),
    /// The node could not be deleted.
    #[error("cannot delete node {node:?}: {source}")]
    DeleteNode {
        /// Node that was targeted.
        node: NodeId,
        /// Why deletion was refused.
        source: DeleteNodeError,
    },
}

/// A node whose indexed class disagrees with its live degrees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("node {node:?} indexed as {indexed:?} but live class is {live:?}")]
pub struct IndexMismatch {
    /// Offending node.
    pub node: NodeId,
    /// Class recorded in the index (`None` when missing).
    pub indexed: Option<DegreeClass>,
    /// Class derived from the node's live degrees (`None` for a dead node).
    pub live: Option<DegreeClass>,
}

/// Host graph with an incrementally maintained degree index.
#[derive(Debug, Clone, Default)]
pub struct Host {
    store: GraphStore,
    index: DegreeIndex,
}

impl Host {
    /// Creates an empty host whose index saturates at `caps`.
    #[must_use]
    pub fn new(caps: DegreeCaps) -> Self {
        Self {
            store: GraphStore::default(),
            index: DegreeIndex::new(caps),
        }
    }

    /// Read access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Read access to the degree index.
    #[must_use]
    pub fn index(&self) -> &DegreeIndex {
        &self.index
    }

    /// The bucket of node ids whose class is `class`.
    #[must_use]
    pub fn index_for(&self, class: DegreeClass) -> &ElemList {
        self.index.bucket(class)
    }

    /// Adds a node.
    pub fn add_node(&mut self, label: Label, root: bool) -> NodeId {
        let id = self.store.insert_node(NodeRecord { label, root });
        self.reindex(id);
        id
    }

    /// Adds an edge from `src` to `tgt`; `src == tgt` creates a loop.
    ///
    /// # Errors
    /// Returns [`HostError::UnknownNode`] if either endpoint is missing.
    pub fn add_edge(
        &mut self,
        src: NodeId,
        tgt: NodeId,
        label: Label,
    ) -> Result<EdgeId, HostError> {
        for n in [src, tgt] {
            if !self.store.contains_node(n) {
                return Err(HostError::UnknownNode(n));
            }
        }
        let id = self
            .store
            .insert_edge(EdgeRecord { src, tgt, label })
            .ok_or(HostError::UnknownNode(src))?;
        self.reindex(src);
        self.reindex(tgt);
        Ok(id)
    }

    /// Deletes an edge and returns its record.
    ///
    /// # Errors
    /// Returns [`HostError::UnknownEdge`] if the edge is missing.
    pub fn delete_edge(&mut self, id: EdgeId) -> Result<EdgeRecord, HostError> {
        let record = self
            .store
            .remove_edge(id)
            .ok_or(HostError::UnknownEdge(id))?;
        self.reindex(record.src);
        self.reindex(record.tgt);
        Ok(record)
    }

    /// Deletes an isolated node and returns its record.
    ///
    /// # Errors
    /// Returns [`HostError::DeleteNode`] if the node is missing or still has
    /// incident edges.
    pub fn delete_node(&mut self, id: NodeId) -> Result<NodeRecord, HostError> {
        let record = self
            .store
            .remove_node_isolated(id)
            .map_err(|source| HostError::DeleteNode { node: id, source })?;
        self.index.remove(id);
        Ok(record)
    }

    /// Sets or clears the root flag, returning the previous value.
    ///
    /// # Errors
    /// Returns [`HostError::UnknownNode`] if the node is missing.
    pub fn set_root(&mut self, id: NodeId, root: bool) -> Result<bool, HostError> {
        let node = self.store.node_mut(id).ok_or(HostError::UnknownNode(id))?;
        let prev = std::mem::replace(&mut node.root, root);
        self.reindex(id);
        Ok(prev)
    }

    /// Replaces a node label, returning the old one.
    ///
    /// # Errors
    /// Returns [`HostError::UnknownNode`] if the node is missing.
    pub fn relabel_node(&mut self, id: NodeId, label: Label) -> Result<Label, HostError> {
        let node = self.store.node_mut(id).ok_or(HostError::UnknownNode(id))?;
        Ok(std::mem::replace(&mut node.label, label))
    }

    /// Replaces an edge label, returning the old one.
    ///
    /// # Errors
    /// Returns [`HostError::UnknownEdge`] if the edge is missing.
    pub fn relabel_edge(&mut self, id: EdgeId, label: Label) -> Result<Label, HostError> {
        let edge = self.store.edge_mut(id).ok_or(HostError::UnknownEdge(id))?;
        Ok(std::mem::replace(&mut edge.label, label))
    }

    /// Replaces a node mark, returning the old one.
    ///
    /// # Errors
    /// Returns [`HostError::UnknownNode`] if the node is missing.
    pub fn remark_node(&mut self, id: NodeId, mark: Mark) -> Result<Mark, HostError> {
        let node = self.store.node_mut(id).ok_or(HostError::UnknownNode(id))?;
        Ok(std::mem::replace(&mut node.label.mark, mark))
    }

    /// Replaces an edge mark, returning the old one.
    ///
    /// # Errors
    /// Returns [`HostError::UnknownEdge`] if the edge is missing.
    pub fn remark_edge(&mut self, id: EdgeId, mark: Mark) -> Result<Mark, HostError> {
        let edge = self.store.edge_mut(id).ok_or(HostError::UnknownEdge(id))?;
        Ok(std::mem::replace(&mut edge.label.mark, mark))
    }

    /// Checks every node slot against the index.
    ///
    /// # Errors
    /// Returns the first node whose indexed class disagrees with its live one.
    pub fn verify_index(&self) -> Result<(), IndexMismatch> {
        let caps = self.index.caps();
        for slot in 0..self.store.node_slots() {
            let node = NodeId(u32::try_from(slot).unwrap_or(u32::MAX));
            let live = self.store.degrees(node).map(|d| caps.classify(d));
            let indexed = self.index.class_of(node);
            if live != indexed {
                return Err(IndexMismatch {
                    node,
                    indexed,
                    live,
                });
            }
            if let Some(class) = indexed {
                if !self.index.bucket(class).as_slice().contains(&node) {
                    return Err(IndexMismatch {
                        node,
                        indexed: None,
                        live,
                    });
                }
            }
        }
        if self.index.len() != self.store.node_count() {
            return Err(IndexMismatch {
                node: NodeId(u32::MAX),
                indexed: None,
                live: None,
            });
        }
        Ok(())
    }

    fn reindex(&mut self, id: NodeId) {
        if let Some(d) = self.store.degrees(id) {
            self.index.place(id, d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_keep_index_consistent() {
        let mut host = Host::default();
        let a = host.add_node(Label::of(["a"]), true);
        let b = host.add_node(Label::blank(), false);
        let e = host.add_edge(a, b, Label::blank()).expect("add edge");
        let l = host.add_edge(b, b, Label::blank()).expect("add loop");
        assert_eq!(host.verify_index(), Ok(()));
        assert_eq!(host.index().class_of(b).map(|c| (c.inc, c.loops)), Some((1, 1)));

        host.set_root(a, false).expect("unroot");
        host.delete_edge(e).expect("delete edge");
        host.delete_edge(l).expect("delete loop");
        host.delete_node(b).expect("delete node");
        assert_eq!(host.verify_index(), Ok(()));
        assert_eq!(host.index().len(), 1);
    }

    #[test]
    fn delete_node_with_edges_is_refused() {
        let mut host = Host::default();
        let a = host.add_node(Label::blank(), false);
        let b = host.add_node(Label::blank(), false);
        host.add_edge(a, b, Label::blank()).expect("add edge");
        assert_eq!(
            host.delete_node(a),
            Err(HostError::DeleteNode {
                node: a,
                source: DeleteNodeError::HasOutgoingEdges
            })
        );
        assert_eq!(host.verify_index(), Ok(()));
    }

    #[test]
    fn relabel_and_remark_return_previous_values() {
        let mut host = Host::default();
        let a = host.add_node(Label::of([1_i64]), false);
        let old = host.relabel_node(a, Label::of(["x"])).expect("relabel");
        assert_eq!(old, Label::of([1_i64]));
        assert_eq!(host.remark_node(a, Mark::Red), Ok(Mark::None));
        assert_eq!(
            host.store().node(a).map(|n| n.label.clone()),
            Some(Label::of(["x"]).marked(Mark::Red))
        );
        assert_eq!(
            host.add_edge(a, NodeId(9), Label::blank()),
            Err(HostError::UnknownNode(NodeId(9)))
        );
    }
}
