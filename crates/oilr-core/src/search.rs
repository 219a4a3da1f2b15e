// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Search-plan executor.
//!
//! [`Search`] runs a rule's [`crate::SearchPlan`] against a host as a single loop over
//! step indices, without recursion. Each step owns a `Trav` holding its scan
//! cursor (`cur`, `next`) and the tokens for whatever it bound. A step that
//! fails is rewound and the previous step is released, keeping its cursor, so
//! advancing it again resumes after the candidate that was just undone.
//!
//! Invariants
//! - Steps `0..bound` hold their bindings; steps `bound..` hold none.
//! - Release is strictly LIFO: only step `bound - 1` is ever released.
//! - After exhaustion, [`Search::abandon`], or [`Search::restart`], no host
//!   element is held.
//!
//! The host is borrowed immutably for the whole search, so it cannot be
//! rewritten until the search is dropped.
use tracing::trace;

use crate::config::EngineConfig;
use crate::host::Host;
use crate::ident::{EdgeId, NodeId, PatEdge, PatNode};
use crate::index::Thresholds;
use crate::morphism::Morphism;
use crate::pattern::{PatternEdge, PatternNode};
use crate::plan::{Step, TravSpec};
use crate::predicate::PredicateState;
use crate::rule::Rule;
use crate::state::{violation, EdgeToken, LoopToken, MatchState, NodeToken, ViolationKind};
use crate::trace::{TraceEvent, TraceHook};

/// Dynamic state of one plan step.
#[derive(Debug, Default)]
struct Trav {
    /// Search space currently scanned (`Search` steps only).
    cur: usize,
    /// Resume position within the current bucket or adjacency list.
    next: usize,
    node: Option<NodeToken>,
    edge: Option<EdgeToken>,
    claim: Option<LoopToken>,
    /// Assignment undo mark taken before this step bound anything.
    mark: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Fresh,
    Matched,
    Exhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Out,
    In,
}

/// A re-entrant search for one rule's matches in a host.
pub struct Search<'a> {
    host: &'a Host,
    rule: &'a Rule,
    hook: &'a mut dyn TraceHook,
    trace_matching: bool,
    verify_buckets: bool,
    travs: Vec<Trav>,
    state: MatchState,
    morphism: Morphism,
    preds: Vec<PredicateState>,
    bound: usize,
    status: Status,
}

impl<'a> Search<'a> {
    /// Prepares a search. Nothing is matched until [`Search::next_match`].
    ///
    /// # Panics
    /// Aborts with [`ViolationKind::CapsMismatch`] if the rule was compiled for
    /// different degree caps than the host index uses.
    pub fn new(
        host: &'a Host,
        rule: &'a Rule,
        config: &EngineConfig,
        hook: &'a mut dyn TraceHook,
    ) -> Self {
        let plan = rule.plan();
        if plan.caps() != host.index().caps() {
            violation(ViolationKind::CapsMismatch, None);
        }
        let travs = plan
            .steps()
            .iter()
            .map(|step| Trav {
                cur: first_space(step),
                ..Trav::default()
            })
            .collect();
        let lhs = rule.lhs();
        Self {
            host,
            rule,
            hook,
            trace_matching: config.trace_matching,
            verify_buckets: config.verify_buckets,
            travs,
            state: MatchState::new(host.store().node_slots(), host.store().edge_slots()),
            morphism: Morphism::new(lhs.node_count(), lhs.edge_count()),
            preds: rule.condition().seed(),
            bound: 0,
            status: Status::Fresh,
        }
    }

    /// Finds the next match, resuming after the previous one.
    ///
    /// Returns `None` once the candidate space is exhausted; every element is
    /// then released.
    pub fn next_match(&mut self) -> Option<Morphism> {
        let len = self.rule.plan().len();
        let mut k = match self.status {
            Status::Exhausted => return None,
            Status::Fresh => 0,
            Status::Matched if len == 0 => {
                self.status = Status::Exhausted;
                return None;
            }
            Status::Matched => {
                self.release(len - 1);
                len - 1
            }
        };
        loop {
            if k == len {
                if self.verdict() {
                    self.status = Status::Matched;
                    return Some(self.morphism.clone());
                }
                if k == 0 {
                    self.status = Status::Exhausted;
                    return None;
                }
                trace!(rule = self.rule.name(), "condition rejected complete match");
                k -= 1;
                self.release(k);
                continue;
            }
            if self.advance(k) {
                self.bound = k + 1;
                if self.checkpoint(k) {
                    k += 1;
                } else {
                    trace!(step = k, "condition pruned partial match");
                    self.release(k);
                }
            } else {
                self.reset(k);
                if k == 0 {
                    self.status = Status::Exhausted;
                    return None;
                }
                k -= 1;
                trace!(step = k, "backtrack");
                self.release(k);
            }
        }
    }

    /// Unmatches every bound step in LIFO order and ends the search.
    pub fn abandon(&mut self) {
        for k in (0..self.bound).rev() {
            self.reset(k);
        }
        for k in 0..self.travs.len() {
            self.rewind(k);
        }
        self.status = Status::Exhausted;
    }

    /// Abandons the search and starts over from the first candidate.
    ///
    /// On an unmodified host the next match is the first match found before.
    pub fn restart(&mut self) {
        self.abandon();
        self.status = Status::Fresh;
    }

    /// The current (possibly partial) morphism.
    #[must_use]
    pub fn morphism(&self) -> &Morphism {
        &self.morphism
    }

    /// Elements currently held by this search.
    #[must_use]
    pub fn match_state(&self) -> &MatchState {
        &self.state
    }

    /// Per-leaf decision state, indexed by `bool_id`.
    #[must_use]
    pub fn predicate_states(&self) -> &[PredicateState] {
        &self.preds
    }

    /// Number of steps currently holding bindings.
    #[must_use]
    pub fn bound_steps(&self) -> usize {
        self.bound
    }

    /// `true` once the search can yield no further match.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.status == Status::Exhausted
    }

    fn advance(&mut self, k: usize) -> bool {
        let rule = self.rule;
        self.travs[k].mark = self.morphism.assignment().mark();
        match &rule.plan().steps()[k] {
            Step::Search { node, spec } => self.search(k, *node, spec),
            Step::FollowOut {
                edge,
                from,
                to,
                thresholds,
            } => self.follow_out_edge(k, *edge, *from, *to, *thresholds),
            Step::FollowIn {
                edge,
                to,
                from,
                thresholds,
            } => self.follow_in_edge(k, *edge, *to, *from, *thresholds),
            Step::EdgeBetween {
                from,
                to,
                edge,
                negate,
            } => self.edge_between(k, *from, *to, *edge, *negate),
            Step::LoopExists { node, edge } => self.loop_exists(k, *node, *edge),
        }
    }

    /// Scans buckets `spec.first..=spec.last` from the step's cursor for the
    /// first unmatched node passing the thresholds and label test.
    fn search(&mut self, k: usize, node: PatNode, spec: &TravSpec) -> bool {
        let (host, rule) = (self.host, self.rule);
        let pnode = pattern_node(rule, node);
        let caps = host.index().caps();
        while self.travs[k].cur <= spec.last {
            let class = rule.plan().spaces()[self.travs[k].cur];
            let bucket = host.index_for(class);
            while let Some(id) = bucket.get(self.travs[k].next) {
                self.travs[k].next += 1;
                let Some(degrees) = host.store().degrees(id) else {
                    if self.verify_buckets {
                        violation(ViolationKind::StaleBucket { node: id, live: None }, Some(class));
                    }
                    continue;
                };
                if self.verify_buckets && caps.classify(degrees) != class {
                    violation(
                        ViolationKind::StaleBucket {
                            node: id,
                            live: Some(caps.classify(degrees)),
                        },
                        Some(class),
                    );
                }
                if !self.state.node_available(id) || !spec.thresholds.admits(degrees) {
                    continue;
                }
                if self.node_label_matches(pnode, id) {
                    self.bind_node(k, node, id);
                    return true;
                }
            }
            self.travs[k].cur += 1;
            self.travs[k].next = 0;
        }
        false
    }

    fn follow_out_edge(
        &mut self,
        k: usize,
        edge: PatEdge,
        from: PatNode,
        to: PatNode,
        t: Thresholds,
    ) -> bool {
        self.follow(k, Direction::Out, edge, from, to, t)
    }

    fn follow_in_edge(
        &mut self,
        k: usize,
        edge: PatEdge,
        to: PatNode,
        from: PatNode,
        t: Thresholds,
    ) -> bool {
        self.follow(k, Direction::In, edge, to, from, t)
    }

    /// Walks the adjacency list of bound `anchor` for an unmatched edge whose
    /// far end is an unmatched node passing `t`; binds both on success.
    fn follow(
        &mut self,
        k: usize,
        dir: Direction,
        edge: PatEdge,
        anchor: PatNode,
        fresh: PatNode,
        t: Thresholds,
    ) -> bool {
        let (host, rule) = (self.host, self.rule);
        let store = host.store();
        let pedge = pattern_edge(rule, edge);
        let pnode = pattern_node(rule, fresh);
        let at = self.bound_image(anchor);
        let adjacency = match dir {
            Direction::Out => store.out_edges(at),
            Direction::In => store.in_edges(at),
        };
        while let Some(&e) = adjacency.get(self.travs[k].next) {
            self.travs[k].next += 1;
            if !self.state.edge_available(e) {
                continue;
            }
            let Some(rec) = store.edge(e) else { continue };
            let far = match dir {
                Direction::Out => rec.tgt,
                Direction::In => rec.src,
            };
            if !self.state.node_available(far) || !store.degrees(far).is_some_and(|d| t.admits(d)) {
                continue;
            }
            let mark = self.morphism.assignment().mark();
            if !pedge.label.matches(&rec.label, rule.lhs().vars(), self.morphism.assignment_mut()) {
                continue;
            }
            if !self.node_label_matches(pnode, far) {
                self.morphism.assignment_mut().rollback(mark);
                continue;
            }
            self.bind_edge(k, edge, e);
            self.bind_node(k, fresh, far);
            return true;
        }
        false
    }

    /// Tests for an edge `from -> to` between two bound nodes.
    ///
    /// Negated: single-shot, succeeds iff no edge (matched or not) joins the
    /// images, binds nothing. Positive: binds the next unmatched edge whose
    /// label matches.
    fn edge_between(
        &mut self,
        k: usize,
        from: PatNode,
        to: PatNode,
        edge: Option<PatEdge>,
        negate: bool,
    ) -> bool {
        let (host, rule) = (self.host, self.rule);
        let store = host.store();
        let (s, t) = (self.bound_image(from), self.bound_image(to));
        if negate {
            if self.travs[k].next > 0 {
                return false;
            }
            self.travs[k].next = 1;
            return !store
                .out_edges(s)
                .iter()
                .any(|&e| store.edge(e).is_some_and(|rec| rec.tgt == t));
        }
        let Some(edge) = edge else {
            violation(ViolationKind::UnboundPlanInput("edge_between edge"), None);
        };
        let pedge = pattern_edge(rule, edge);
        let out = store.out_edges(s);
        while let Some(&e) = out.get(self.travs[k].next) {
            self.travs[k].next += 1;
            if !self.state.edge_available(e) {
                continue;
            }
            let Some(rec) = store.edge(e) else { continue };
            if rec.tgt != t {
                continue;
            }
            if pedge.label.matches(&rec.label, rule.lhs().vars(), self.morphism.assignment_mut()) {
                self.bind_edge(k, edge, e);
                return true;
            }
        }
        false
    }

    /// Claims one more loop on a bound node, counted against its `loopdeg`.
    fn loop_exists(&mut self, k: usize, node: PatNode, edge: PatEdge) -> bool {
        let (host, rule) = (self.host, self.rule);
        let store = host.store();
        let pedge = pattern_edge(rule, edge);
        let n = self.bound_image(node);
        let loops = store.loops(n);
        if self.state.available_loops(n, loops.len()) == 0 {
            return false;
        }
        while let Some(&l) = loops.get(self.travs[k].next) {
            self.travs[k].next += 1;
            if self.state.loop_claimed(n, l) {
                continue;
            }
            let Some(rec) = store.edge(l) else { continue };
            if pedge.label.matches(&rec.label, rule.lhs().vars(), self.morphism.assignment_mut()) {
                self.travs[k].claim = Some(self.state.match_loop(n, l));
                self.morphism.bind_edge(edge, l);
                if self.trace_matching {
                    self.hook.record(&TraceEvent::EdgeMatched {
                        pattern: edge,
                        host: l,
                    });
                }
                return true;
            }
        }
        false
    }

    /// Releases step `k`'s bindings and rewinds its cursor.
    fn reset(&mut self, k: usize) {
        self.release(k);
        self.rewind(k);
    }

    fn rewind(&mut self, k: usize) {
        let first = first_space(&self.rule.plan().steps()[k]);
        let trav = &mut self.travs[k];
        trav.cur = first;
        trav.next = 0;
    }

    /// Releases step `k`'s bindings, keeping its cursor.
    fn release(&mut self, k: usize) {
        let rule = self.rule;
        let step = &rule.plan().steps()[k];
        let trav = &mut self.travs[k];
        let (node, edge, claim, mark) =
            (trav.node.take(), trav.edge.take(), trav.claim.take(), trav.mark);
        if let (Some(token), Some(p)) = (node, step.bound_node()) {
            let host = token.id();
            self.morphism.unbind_node(p);
            self.state.release_node(token);
            if self.trace_matching {
                self.hook.record(&TraceEvent::NodeUnmatched { pattern: p, host });
            }
        }
        if let (Some(token), Some(p)) = (edge, step.bound_edge()) {
            let host = token.id();
            self.morphism.unbind_edge(p);
            self.state.release_edge(token);
            if self.trace_matching {
                self.hook.record(&TraceEvent::EdgeUnmatched { pattern: p, host });
            }
        }
        if let (Some(token), Some(p)) = (claim, step.bound_edge()) {
            let host = token.edge();
            self.morphism.unbind_edge(p);
            self.state.unmatch_loop(token);
            if self.trace_matching {
                self.hook.record(&TraceEvent::EdgeUnmatched { pattern: p, host });
            }
        }
        self.morphism.assignment_mut().rollback(mark);
        for &id in rule.plan().checkpoint(k) {
            self.preds[id] = PredicateState::Undecided;
        }
        self.bound = k;
    }

    /// Decides the leaves attached to step `k` and applies the pruning reading.
    fn checkpoint(&mut self, k: usize) -> bool {
        let rule = self.rule;
        let ids = rule.plan().checkpoint(k);
        if ids.is_empty() {
            return true;
        }
        for &id in ids {
            self.preds[id] = rule.condition().decide(id, self.host.store(), &self.morphism);
        }
        rule.condition().holds_optimistically(&self.preds)
    }

    /// Final reading on a complete morphism. Leaves that still cannot be
    /// decided count as false.
    fn verdict(&self) -> bool {
        let condition = self.rule.condition();
        let mut states = self.preds.clone();
        for (id, state) in states.iter_mut().enumerate() {
            if !state.is_decided() {
                *state = condition.decide(id, self.host.store(), &self.morphism);
            }
        }
        condition.holds(&states)
    }

    fn node_label_matches(&mut self, pnode: &PatternNode, id: NodeId) -> bool {
        let (host, rule) = (self.host, self.rule);
        let assignment = self.morphism.assignment_mut();
        host.store()
            .node(id)
            .is_some_and(|rec| pnode.label.matches(&rec.label, rule.lhs().vars(), assignment))
    }

    fn bind_node(&mut self, k: usize, p: PatNode, id: NodeId) {
        self.travs[k].node = Some(self.state.acquire_node(id));
        self.morphism.bind_node(p, id);
        if self.trace_matching {
            self.hook.record(&TraceEvent::NodeMatched { pattern: p, host: id });
        }
    }

    fn bind_edge(&mut self, k: usize, p: PatEdge, id: EdgeId) {
        self.travs[k].edge = Some(self.state.acquire_edge(id));
        self.morphism.bind_edge(p, id);
        if self.trace_matching {
            self.hook.record(&TraceEvent::EdgeMatched { pattern: p, host: id });
        }
    }

    fn bound_image(&self, p: PatNode) -> NodeId {
        match self.morphism.node(p) {
            Some(n) => n,
            None => violation(ViolationKind::UnboundPlanInput("pattern node"), None),
        }
    }
}

impl Iterator for Search<'_> {
    type Item = Morphism;

    fn next(&mut self) -> Option<Morphism> {
        self.next_match()
    }
}

impl core::fmt::Debug for Search<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Search")
            .field("rule", &self.rule.name())
            .field("bound", &self.bound)
            .field("status", &self.status)
            .field("morphism", &self.morphism)
            .finish_non_exhaustive()
    }
}

fn first_space(step: &Step) -> usize {
    match step {
        Step::Search { spec, .. } => spec.first,
        _ => 0,
    }
}

fn pattern_node(rule: &Rule, p: PatNode) -> &PatternNode {
    match rule.lhs().node(p) {
        Some(n) => n,
        None => violation(ViolationKind::UnboundPlanInput("unknown pattern node"), None),
    }
}

fn pattern_edge(rule: &Rule, p: PatEdge) -> &PatternEdge {
    match rule.lhs().edge(p) {
        Some(e) => e,
        None => violation(ViolationKind::UnboundPlanInput("unknown pattern edge"), None),
    }
}
