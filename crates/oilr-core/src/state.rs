// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Match state: exclusive per-element tokens and counted loop tokens.
//!
//! Matching an element acquires a token from [`MatchState`]; unmatching gives
//! it back. Tokens are neither `Clone` nor `Copy`, so only the search frame
//! that acquired an element can release it.
//!
//! # Panic Semantics
//!
//! Acquiring an element that is already held, releasing one that is not, or
//! unmatching more loops than were matched is a programmer error in the search
//! plan or executor. These abort through [`std::panic::panic_any`] with a typed
//! [`InvariantViolation`] payload, matchable via `downcast_ref` in tests. They
//! are never reported as an ordinary "no match".
use crate::ident::{EdgeId, NodeId};
use crate::index::DegreeClass;

/// A host element named in a violation report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    /// Host node.
    Node(NodeId),
    /// Host edge.
    Edge(EdgeId),
}

/// Classification of an invariant violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// An element already held by the search was selected again.
    AlreadyMatched(Element),
    /// An element was released without being held.
    NotMatched(Element),
    /// A loop token was returned for a node with no matched loops.
    LoopUnderflow(NodeId),
    /// A bucket held a node whose live class differs from the bucket's key.
    ///
    /// `live` is `None` when the node no longer exists.
    StaleBucket {
        /// Node found in the bucket.
        node: NodeId,
        /// Live class of the node.
        live: Option<DegreeClass>,
    },
    /// A step referenced a pattern element that no earlier step bound.
    UnboundPlanInput(&'static str),
    /// The plan was compiled for different degree caps than the host index uses.
    CapsMismatch,
    /// A trace context was closed with none open.
    ContextUnderflow,
}

/// Violation payload for [`std::panic::panic_any`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Classification of the violation.
    pub kind: ViolationKind,
    /// Bucket being scanned when the violation was detected, if any.
    pub bucket: Option<DegreeClass>,
}

impl core::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invariant violated: {:?}", self.kind)?;
        if let Some(bucket) = self.bucket {
            write!(f, " (bucket {bucket:?})")?;
        }
        Ok(())
    }
}

/// Aborts with a typed violation payload.
pub(crate) fn violation(kind: ViolationKind, bucket: Option<DegreeClass>) -> ! {
    tracing::error!(?kind, ?bucket, "invariant violated");
    std::panic::panic_any(InvariantViolation { kind, bucket })
}

/// Exclusive handle on a matched host node.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a dropped token leaves its node matched"]
pub struct NodeToken(NodeId);

impl NodeToken {
    /// The held node.
    pub fn id(&self) -> NodeId {
        self.0
    }
}

/// Exclusive handle on a matched host edge.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a dropped token leaves its edge matched"]
pub struct EdgeToken(EdgeId);

impl EdgeToken {
    /// The held edge.
    pub fn id(&self) -> EdgeId {
        self.0
    }
}

/// Counted claim on one loop of a node.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a dropped token leaves its loop claimed"]
pub struct LoopToken {
    node: NodeId,
    edge: EdgeId,
}

impl LoopToken {
    /// Node owning the loop.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The claimed loop edge.
    pub fn edge(&self) -> EdgeId {
        self.edge
    }
}

/// Per-slot matched flags for one search.
#[derive(Debug, Clone, Default)]
pub struct MatchState {
    nodes: Vec<bool>,
    edges: Vec<bool>,
    /// Claimed loops per node; `len()` is the node's `matchedLoops`.
    loops: Vec<Vec<EdgeId>>,
    held: usize,
}

impl MatchState {
    /// Creates a state sized for the given slot counts.
    #[must_use]
    pub fn new(node_slots: usize, edge_slots: usize) -> Self {
        Self {
            nodes: vec![false; node_slots],
            edges: vec![false; edge_slots],
            loops: vec![Vec::new(); node_slots],
            held: 0,
        }
    }

    /// `true` if `id` is not held by this search.
    #[must_use]
    pub fn node_available(&self, id: NodeId) -> bool {
        !self.nodes.get(id.index()).copied().unwrap_or(false)
    }

    /// `true` if `id` is not held by this search.
    #[must_use]
    pub fn edge_available(&self, id: EdgeId) -> bool {
        !self.edges.get(id.index()).copied().unwrap_or(false)
    }

    /// Number of loops currently claimed on `node`.
    #[must_use]
    pub fn matched_loops(&self, node: NodeId) -> usize {
        self.loops.get(node.index()).map_or(0, Vec::len)
    }

    /// `loopdeg - matchedLoops` for a node with `loopdeg` loops.
    #[must_use]
    pub fn available_loops(&self, node: NodeId, loopdeg: usize) -> usize {
        loopdeg.saturating_sub(self.matched_loops(node))
    }

    /// `true` if `edge` is already claimed as a loop of `node`.
    #[must_use]
    pub fn loop_claimed(&self, node: NodeId, edge: EdgeId) -> bool {
        self.loops
            .get(node.index())
            .is_some_and(|claims| claims.contains(&edge))
    }

    /// Elements (nodes, edges, loop claims) currently held.
    #[must_use]
    pub fn held(&self) -> usize {
        self.held
    }

    /// `true` when nothing is held.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.held == 0
    }

    /// Marks `id` matched.
    ///
    /// # Panics
    /// Aborts with [`ViolationKind::AlreadyMatched`] if `id` is already held.
    pub fn acquire_node(&mut self, id: NodeId) -> NodeToken {
        if self.nodes.len() <= id.index() {
            self.nodes.resize(id.index() + 1, false);
        }
        if std::mem::replace(&mut self.nodes[id.index()], true) {
            violation(ViolationKind::AlreadyMatched(Element::Node(id)), None);
        }
        self.held += 1;
        NodeToken(id)
    }

    /// Marks the token's node unmatched.
    ///
    /// # Panics
    /// Aborts with [`ViolationKind::NotMatched`] if the node is not held.
    pub fn release_node(&mut self, token: NodeToken) {
        let id = token.0;
        match self.nodes.get_mut(id.index()) {
            Some(flag) if *flag => *flag = false,
            _ => violation(ViolationKind::NotMatched(Element::Node(id)), None),
        }
        self.held -= 1;
    }

    /// Marks `id` matched.
    ///
    /// # Panics
    /// Aborts with [`ViolationKind::AlreadyMatched`] if `id` is already held.
    pub fn acquire_edge(&mut self, id: EdgeId) -> EdgeToken {
        if self.edges.len() <= id.index() {
            self.edges.resize(id.index() + 1, false);
        }
        if std::mem::replace(&mut self.edges[id.index()], true) {
            violation(ViolationKind::AlreadyMatched(Element::Edge(id)), None);
        }
        self.held += 1;
        EdgeToken(id)
    }

    /// Marks the token's edge unmatched.
    ///
    /// # Panics
    /// Aborts with [`ViolationKind::NotMatched`] if the edge is not held.
    pub fn release_edge(&mut self, token: EdgeToken) {
        let id = token.0;
        match self.edges.get_mut(id.index()) {
            Some(flag) if *flag => *flag = false,
            _ => violation(ViolationKind::NotMatched(Element::Edge(id)), None),
        }
        self.held -= 1;
    }

    /// Claims loop `edge` on `node`, incrementing its `matchedLoops`.
    ///
    /// # Panics
    /// Aborts with [`ViolationKind::AlreadyMatched`] if the loop is already claimed.
    pub fn match_loop(&mut self, node: NodeId, edge: EdgeId) -> LoopToken {
        if self.loop_claimed(node, edge) {
            violation(ViolationKind::AlreadyMatched(Element::Edge(edge)), None);
        }
        if self.loops.len() <= node.index() {
            self.loops.resize(node.index() + 1, Vec::new());
        }
        self.loops[node.index()].push(edge);
        self.held += 1;
        LoopToken { node, edge }
    }

    /// Returns a loop claim, decrementing `matchedLoops`.
    ///
    /// Claims on a node are returned in reverse order of acquisition.
    ///
    /// # Panics
    /// Aborts with [`ViolationKind::LoopUnderflow`] if the node has no claimed
    /// loops, or [`ViolationKind::NotMatched`] if the token is not the most
    /// recent claim.
    pub fn unmatch_loop(&mut self, token: LoopToken) {
        let Some(claims) = self.loops.get_mut(token.node.index()) else {
            violation(ViolationKind::LoopUnderflow(token.node), None);
        };
        match claims.pop() {
            None => violation(ViolationKind::LoopUnderflow(token.node), None),
            Some(edge) if edge != token.edge => {
                violation(ViolationKind::NotMatched(Element::Edge(token.edge)), None)
            }
            Some(_) => {}
        }
        self.held -= 1;
    }
}
