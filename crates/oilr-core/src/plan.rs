// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Search plans: the compiled, ordered steps that realise one rule's matching
//! strategy.
//!
//! A plan is computed once per rule and only executed afterwards. Each
//! [`Step::Search`] owns an inclusive range `[first, last]` of
//! [`SearchPlan::spaces`], the degree classes whose buckets it scans. Every
//! other step extends the match from elements already bound.
use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::condition::CompiledCondition;
use crate::ident::{PatEdge, PatNode};
use crate::index::{DegreeCaps, DegreeClass, Thresholds};
use crate::pattern::Pattern;

/// Static part of a bucket-scan step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TravSpec {
    /// First search space (inclusive).
    pub first: usize,
    /// Last search space (inclusive).
    pub last: usize,
    /// Candidate thresholds `(o, i, l, r)`.
    pub thresholds: Thresholds,
}

/// One step of a search plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Pick a fresh host node from the buckets in `spec`'s range.
    Search {
        /// Pattern node bound by this step.
        node: PatNode,
        /// Bucket range and thresholds.
        spec: TravSpec,
    },
    /// Follow an out-edge of bound `from` to an unbound `to`.
    FollowOut {
        /// Pattern edge bound by this step.
        edge: PatEdge,
        /// Bound source.
        from: PatNode,
        /// Target bound by this step.
        to: PatNode,
        /// Thresholds for `to`.
        thresholds: Thresholds,
    },
    /// Follow an in-edge of bound `to` back to an unbound `from`.
    FollowIn {
        /// Pattern edge bound by this step.
        edge: PatEdge,
        /// Bound target.
        to: PatNode,
        /// Source bound by this step.
        from: PatNode,
        /// Thresholds for `from`.
        thresholds: Thresholds,
    },
    /// Test for an edge between two bound nodes.
    ///
    /// With `negate` set the step succeeds only when no such edge exists and
    /// `edge` is `None`; otherwise it binds `edge`.
    EdgeBetween {
        /// Bound source.
        from: PatNode,
        /// Bound target.
        to: PatNode,
        /// Pattern edge bound by a positive test.
        edge: Option<PatEdge>,
        /// Require absence instead of presence.
        negate: bool,
    },
    /// Claim one unmatched loop on a bound node.
    LoopExists {
        /// Bound node.
        node: PatNode,
        /// Pattern loop bound by this step.
        edge: PatEdge,
    },
}

impl Step {
    /// Pattern node newly bound by this step.
    #[must_use]
    pub fn bound_node(&self) -> Option<PatNode> {
        match self {
            Self::Search { node, .. } => Some(*node),
            Self::FollowOut { to, .. } => Some(*to),
            Self::FollowIn { from, .. } => Some(*from),
            Self::EdgeBetween { .. } | Self::LoopExists { .. } => None,
        }
    }

    /// Pattern edge newly bound by this step.
    #[must_use]
    pub fn bound_edge(&self) -> Option<PatEdge> {
        match self {
            Self::Search { .. } => None,
            Self::FollowOut { edge, .. }
            | Self::FollowIn { edge, .. }
            | Self::LoopExists { edge, .. } => Some(*edge),
            Self::EdgeBetween { edge, .. } => *edge,
        }
    }
}

/// A compiled search plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchPlan {
    caps: DegreeCaps,
    spaces: Vec<DegreeClass>,
    steps: Vec<Step>,
    checkpoints: Vec<Vec<usize>>,
}

impl SearchPlan {
    /// Plans a search for `pattern`.
    ///
    /// Pattern nodes listed in `deleted` get exact degree thresholds. Leaves of
    /// `condition` are attached to the first step after which all their
    /// dependencies are bound.
    #[must_use]
    pub fn compile(
        pattern: &Pattern,
        condition: &CompiledCondition,
        deleted: &[PatNode],
        caps: DegreeCaps,
    ) -> Self {
        let mut planner = Planner::new(pattern, deleted, caps);
        planner.run();
        let Planner { spaces, steps, .. } = planner;
        let checkpoints = checkpoints(pattern, condition, &steps);
        Self {
            caps,
            spaces,
            steps,
            checkpoints,
        }
    }

    /// Caps the search spaces were computed for.
    #[must_use]
    pub fn caps(&self) -> DegreeCaps {
        self.caps
    }

    /// Degree classes scanned by `Search` steps, addressed by `TravSpec` ranges.
    #[must_use]
    pub fn spaces(&self) -> &[DegreeClass] {
        &self.spaces
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Leaves that become decidable right after step `k`.
    #[must_use]
    pub fn checkpoint(&self, k: usize) -> &[usize] {
        self.checkpoints.get(k).map_or(&[], Vec::as_slice)
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// `true` for the plan of an empty pattern.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

struct Planner<'p> {
    pattern: &'p Pattern,
    caps: DegreeCaps,
    thresholds: Vec<Thresholds>,
    bound: Vec<bool>,
    edge_done: Vec<bool>,
    forbidden_done: Vec<bool>,
    spaces: Vec<DegreeClass>,
    steps: Vec<Step>,
}

impl<'p> Planner<'p> {
    fn new(pattern: &'p Pattern, deleted: &[PatNode], caps: DegreeCaps) -> Self {
        let thresholds = (0..pattern.node_count())
            .map(|i| pattern.thresholds(PatNode(i), deleted.contains(&PatNode(i))))
            .collect();
        Self {
            pattern,
            caps,
            thresholds,
            bound: vec![false; pattern.node_count()],
            edge_done: vec![false; pattern.edge_count()],
            forbidden_done: vec![false; pattern.forbidden().len()],
            spaces: Vec::new(),
            steps: Vec::new(),
        }
    }

    fn run(&mut self) {
        while let Some(start) = self.pick_start() {
            let thresholds = self.thresholds[start.0];
            let first = self.spaces.len();
            self.spaces.extend(self.caps.search_space(thresholds));
            let last = self.spaces.len().saturating_sub(1);
            self.steps.push(Step::Search {
                node: start,
                spec: TravSpec {
                    first,
                    last,
                    thresholds,
                },
            });
            self.bind(start);
            let mut queue = VecDeque::from([start]);
            while let Some(u) = queue.pop_front() {
                for e in self.pattern.incident_edges(u).collect::<Vec<_>>() {
                    if let Some(next) = self.plan_edge(u, e) {
                        queue.push_back(next);
                    }
                }
            }
        }
    }

    /// Rooted nodes first, then the highest pattern degree, then the lowest index.
    fn pick_start(&self) -> Option<PatNode> {
        (0..self.bound.len())
            .filter(|&i| !self.bound[i])
            .max_by_key(|&i| {
                let t = self.thresholds[i];
                (t.root, t.out + t.inc + t.loops, std::cmp::Reverse(i))
            })
            .map(PatNode)
    }

    fn plan_edge(&mut self, u: PatNode, e: PatEdge) -> Option<PatNode> {
        if self.edge_done[e.0] {
            return None;
        }
        self.edge_done[e.0] = true;
        let edge = self.pattern.edge(e)?;
        let (src, tgt) = (edge.src, edge.tgt);
        if src == tgt {
            self.steps.push(Step::LoopExists { node: u, edge: e });
            return None;
        }
        let (step, fresh) = if src == u {
            if self.bound[tgt.0] {
                (between(src, tgt, e), None)
            } else {
                let thresholds = self.thresholds[tgt.0];
                (
                    Step::FollowOut {
                        edge: e,
                        from: src,
                        to: tgt,
                        thresholds,
                    },
                    Some(tgt),
                )
            }
        } else if self.bound[src.0] {
            (between(src, tgt, e), None)
        } else {
            let thresholds = self.thresholds[src.0];
            (
                Step::FollowIn {
                    edge: e,
                    to: tgt,
                    from: src,
                    thresholds,
                },
                Some(src),
            )
        };
        self.steps.push(step);
        if let Some(n) = fresh {
            self.bind(n);
        }
        fresh
    }

    /// Marks `n` bound and schedules forbidden-edge tests that just became
    /// checkable.
    fn bind(&mut self, n: PatNode) {
        self.bound[n.0] = true;
        for (i, &(src, tgt)) in self.pattern.forbidden().iter().enumerate() {
            if !self.forbidden_done[i] && self.bound[src.0] && self.bound[tgt.0] {
                self.forbidden_done[i] = true;
                self.steps.push(Step::EdgeBetween {
                    from: src,
                    to: tgt,
                    edge: None,
                    negate: true,
                });
            }
        }
    }
}

fn between(from: PatNode, to: PatNode, e: PatEdge) -> Step {
    Step::EdgeBetween {
        from,
        to,
        edge: Some(e),
        negate: false,
    }
}

/// For every step, the condition leaves whose dependencies are all bound once
/// that step has run and were not bound before.
fn checkpoints(
    pattern: &Pattern,
    condition: &CompiledCondition,
    steps: &[Step],
) -> Vec<Vec<usize>> {
    let mut node_step: FxHashMap<PatNode, usize> = FxHashMap::default();
    let mut var_step: FxHashMap<&str, usize> = FxHashMap::default();
    for (k, step) in steps.iter().enumerate() {
        let node_label = step.bound_node().and_then(|n| {
            node_step.entry(n).or_insert(k);
            pattern.node(n).map(|pn| &pn.label)
        });
        let edge_label = step.bound_edge().and_then(|e| pattern.edge(e)).map(|pe| &pe.label);
        for label in edge_label.into_iter().chain(node_label) {
            for var in label.variables() {
                var_step.entry(var).or_insert(k);
            }
        }
    }

    let mut out = vec![Vec::new(); steps.len()];
    for (bool_id, leaf) in condition.leaves().iter().enumerate() {
        let deps = leaf.predicate.deps();
        let ready = deps
            .nodes
            .iter()
            .map(|n| node_step.get(n).copied())
            .chain(deps.vars.iter().map(|v| var_step.get(v.as_str()).copied()))
            .try_fold(0, |acc, k| k.map(|k| acc.max(k)));
        if let Some(slot) = ready.and_then(|k| out.get_mut(k)) {
            slot.push(bool_id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::expr::Expr;
    use crate::pattern::{LabelItem, LabelPattern, VarType};
    use crate::predicate::{Predicate, RelOp};

    fn blank() -> LabelPattern {
        LabelPattern::blank()
    }

    #[test]
    fn path_pattern_plans_one_search_then_follows() {
        let mut p = Pattern::new();
        let a = p.add_node(blank(), false).expect("a");
        let b = p.add_node(blank(), false).expect("b");
        let c = p.add_node(blank(), false).expect("c");
        let ab = p.add_edge(a, b, blank()).expect("ab");
        let bc = p.add_edge(b, c, blank()).expect("bc");
        let plan =
            SearchPlan::compile(&p, &CompiledCondition::default(), &[], DegreeCaps::default());

        // b has the highest pattern degree.
        assert!(matches!(plan.steps()[0], Step::Search { node, .. } if node == b));
        assert!(matches!(
            plan.steps()[1],
            Step::FollowIn { edge, from, .. } if edge == ab && from == a
        ));
        assert!(matches!(
            plan.steps()[2],
            Step::FollowOut { edge, to, .. } if edge == bc && to == c
        ));
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn cycles_close_with_edge_between_and_forbidden_edges_negate() {
        let mut p = Pattern::new();
        let a = p.add_node(blank(), true).expect("a");
        let b = p.add_node(blank(), false).expect("b");
        p.add_edge(a, b, blank()).expect("ab");
        p.add_edge(b, a, blank()).expect("ba");
        p.add_edge(a, a, blank()).expect("loop");
        let c = p.add_node(blank(), false).expect("c");
        p.forbid_edge(a, c).expect("forbid");
        let plan =
            SearchPlan::compile(&p, &CompiledCondition::default(), &[], DegreeCaps::default());
        let steps = plan.steps();

        assert!(matches!(
            steps[0],
            Step::Search { node, spec } if node == a && spec.thresholds.root
        ));
        assert!(steps.iter().any(|s| matches!(s, Step::LoopExists { node, .. } if *node == a)));
        assert!(steps.iter().any(|s| matches!(
            s,
            Step::EdgeBetween { from, to, negate: false, .. } if *from == b && *to == a
        )));
        let negated: Vec<_> = steps
            .iter()
            .filter(|s| matches!(s, Step::EdgeBetween { negate: true, .. }))
            .collect();
        assert_eq!(negated.len(), 1);
        // The forbidden test only runs after c is bound by its own search.
        let c_search = steps
            .iter()
            .position(|s| matches!(s, Step::Search { node, .. } if *node == c))
            .expect("c is searched");
        let neg_at = steps
            .iter()
            .position(|s| matches!(s, Step::EdgeBetween { negate: true, .. }))
            .expect("negated step");
        assert!(neg_at > c_search);
    }

    #[test]
    fn rooted_search_spaces_only_cover_roots() {
        let mut p = Pattern::new();
        p.add_node(blank(), true).expect("root");
        let plan =
            SearchPlan::compile(&p, &CompiledCondition::default(), &[], DegreeCaps::default());
        let Step::Search { spec, .. } = plan.steps()[0] else {
            panic!("first step must search");
        };
        assert!(plan.spaces()[spec.first..=spec.last].iter().all(|c| c.root));
    }

    #[test]
    fn deleted_nodes_get_exact_spaces() {
        let mut p = Pattern::new();
        let a = p.add_node(blank(), false).expect("a");
        let plan =
            SearchPlan::compile(&p, &CompiledCondition::default(), &[a], DegreeCaps::default());
        // Exact thresholds: one class per root flag.
        assert_eq!(plan.spaces().len(), 2);
    }

    #[test]
    fn predicates_attach_to_the_step_binding_their_last_dependency() {
        let mut p = Pattern::new();
        p.declare("x", VarType::Str).expect("x");
        p.declare("y", VarType::Str).expect("y");
        let n0 = p.add_node(LabelPattern::of([LabelItem::var("x")]), false).expect("n0");
        let n1 = p.add_node(LabelPattern::of([LabelItem::var("y")]), false).expect("n1");
        p.add_edge(n0, n1, blank()).expect("edge");
        let cond = CompiledCondition::compile(Some(Condition::and(
            Condition::Pred(Predicate::relational(
                RelOp::Greater,
                Expr::length("x"),
                Expr::length("y"),
            )),
            Condition::Pred(Predicate::relational(RelOp::Greater, Expr::Int(1), Expr::Int(0))),
        )));
        let plan = SearchPlan::compile(&p, &cond, &[], DegreeCaps::default());
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.checkpoint(0), &[1]);
        assert_eq!(plan.checkpoint(1), &[0]);

        let never = CompiledCondition::compile(Some(Condition::Pred(Predicate::type_check(
            crate::predicate::TypeKind::Int,
            "undeclared",
        ))));
        let plan = SearchPlan::compile(&p, &never, &[], DegreeCaps::default());
        assert!((0..plan.len()).all(|k| plan.checkpoint(k).is_empty()));
    }
}
