// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Morphisms: pattern-to-host bindings plus variable assignments.
use rustc_hash::FxHashMap;

use crate::ident::{EdgeId, NodeId, PatEdge, PatNode};
use crate::label::Atom;

/// Variable assignment with an undo log.
///
/// Bindings are recorded in order; [`Assignment::rollback`] drops every binding
/// made after a saved mark. Search steps bind and unbind in LIFO order, so a
/// single log suffices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Assignment {
    values: FxHashMap<String, Vec<Atom>>,
    log: Vec<String>,
}

impl Assignment {
    /// The value bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[Atom]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// `true` if `name` is bound.
    #[must_use]
    pub fn is_bound(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// `true` when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Bound variables in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Atom])> {
        self.log
            .iter()
            .filter_map(|name| self.values.get(name).map(|v| (name.as_str(), v.as_slice())))
    }

    pub(crate) fn bind(&mut self, name: &str, value: Vec<Atom>) {
        debug_assert!(!self.is_bound(name), "variable {name} bound twice");
        self.values.insert(name.to_owned(), value);
        self.log.push(name.to_owned());
    }

    /// Current undo-log position.
    pub(crate) fn mark(&self) -> usize {
        self.log.len()
    }

    /// Unbinds every variable bound since `mark`.
    pub(crate) fn rollback(&mut self, mark: usize) {
        while self.log.len() > mark {
            if let Some(name) = self.log.pop() {
                self.values.remove(&name);
            }
        }
    }
}

/// A (possibly partial) morphism from a rule's pattern into the host.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Morphism {
    nodes: Vec<Option<NodeId>>,
    edges: Vec<Option<EdgeId>>,
    assignment: Assignment,
}

impl Morphism {
    /// Creates an empty morphism for a pattern of the given size.
    #[must_use]
    pub fn new(pattern_nodes: usize, pattern_edges: usize) -> Self {
        Self {
            nodes: vec![None; pattern_nodes],
            edges: vec![None; pattern_edges],
            assignment: Assignment::default(),
        }
    }

    /// Host node bound to `p`.
    #[must_use]
    pub fn node(&self, p: PatNode) -> Option<NodeId> {
        self.nodes.get(p.0).copied().flatten()
    }

    /// Host edge bound to `p`.
    #[must_use]
    pub fn edge(&self, p: PatEdge) -> Option<EdgeId> {
        self.edges.get(p.0).copied().flatten()
    }

    /// Value of variable `name`.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&[Atom]> {
        self.assignment.get(name)
    }

    /// Variable assignment.
    #[must_use]
    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// Bound node pairs in pattern order.
    pub fn node_bindings(&self) -> impl Iterator<Item = (PatNode, NodeId)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.map(|n| (PatNode(i), n)))
    }

    /// Bound edge pairs in pattern order.
    pub fn edge_bindings(&self) -> impl Iterator<Item = (PatEdge, EdgeId)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.map(|e| (PatEdge(i), e)))
    }

    /// `true` when every pattern node and edge is bound.
    #[must_use]
    pub fn is_total(&self) -> bool {
        self.nodes.iter().all(Option::is_some) && self.edges.iter().all(Option::is_some)
    }

    /// `true` when nothing at all is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(Option::is_none)
            && self.edges.iter().all(Option::is_none)
            && self.assignment.is_empty()
    }

    pub(crate) fn bind_node(&mut self, p: PatNode, n: NodeId) {
        self.nodes[p.0] = Some(n);
    }

    pub(crate) fn unbind_node(&mut self, p: PatNode) {
        self.nodes[p.0] = None;
    }

    pub(crate) fn bind_edge(&mut self, p: PatEdge, e: EdgeId) {
        self.edges[p.0] = Some(e);
    }

    pub(crate) fn unbind_edge(&mut self, p: PatEdge) {
        self.edges[p.0] = None;
    }

    pub(crate) fn assignment_mut(&mut self) -> &mut Assignment {
        &mut self.assignment
    }
}
