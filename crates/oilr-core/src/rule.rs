// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rewrite rules: a left-hand-side pattern, an optional condition and a
//! right-hand-side edit list, compiled once into a search plan.
use thiserror::Error;

use crate::condition::{CompiledCondition, Condition};
use crate::expr::{Deps, LabelExpr};
use crate::ident::{make_rule_id, PatEdge, PatNode, RuleId};
use crate::index::DegreeCaps;
use crate::label::Mark;
use crate::pattern::{Pattern, PatternError};
use crate::plan::SearchPlan;

/// A node named by a right-hand-side edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// The image of a pattern node.
    Lhs(PatNode),
    /// The `n`th node created by this rule application.
    Created(usize),
}

/// One right-hand-side edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RhsOp {
    /// Delete the image of a pattern edge.
    DeleteEdge(PatEdge),
    /// Delete the image of a pattern node.
    DeleteNode(PatNode),
    /// Replace a node label.
    RelabelNode(PatNode, LabelExpr),
    /// Replace an edge label.
    RelabelEdge(PatEdge, LabelExpr),
    /// Replace a node mark.
    RemarkNode(PatNode, Mark),
    /// Replace an edge mark.
    RemarkEdge(PatEdge, Mark),
    /// Set or clear a node's root flag.
    SetRoot(PatNode, bool),
    /// Create a node.
    AddNode {
        /// Label of the new node.
        label: LabelExpr,
        /// Root flag of the new node.
        root: bool,
    },
    /// Create an edge.
    AddEdge {
        /// Source.
        src: NodeRef,
        /// Target.
        tgt: NodeRef,
        /// Label of the new edge.
        label: LabelExpr,
    },
}

/// Ordered right-hand-side edits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rhs {
    ops: Vec<RhsOp>,
    created: usize,
}

impl Rhs {
    /// A right-hand side that leaves the host untouched.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deletes the image of `e`.
    pub fn delete_edge(&mut self, e: PatEdge) -> &mut Self {
        self.ops.push(RhsOp::DeleteEdge(e));
        self
    }

    /// Deletes the image of `n`; every pattern edge incident to `n` must be
    /// deleted too.
    pub fn delete_node(&mut self, n: PatNode) -> &mut Self {
        self.ops.push(RhsOp::DeleteNode(n));
        self
    }

    /// Relabels the image of `n`.
    pub fn relabel_node(&mut self, n: PatNode, label: LabelExpr) -> &mut Self {
        self.ops.push(RhsOp::RelabelNode(n, label));
        self
    }

    /// Relabels the image of `e`.
    pub fn relabel_edge(&mut self, e: PatEdge, label: LabelExpr) -> &mut Self {
        self.ops.push(RhsOp::RelabelEdge(e, label));
        self
    }

    /// Remarks the image of `n`.
    pub fn remark_node(&mut self, n: PatNode, mark: Mark) -> &mut Self {
        self.ops.push(RhsOp::RemarkNode(n, mark));
        self
    }

    /// Remarks the image of `e`.
    pub fn remark_edge(&mut self, e: PatEdge, mark: Mark) -> &mut Self {
        self.ops.push(RhsOp::RemarkEdge(e, mark));
        self
    }

    /// Sets or clears the root flag of the image of `n`.
    pub fn set_root(&mut self, n: PatNode, root: bool) -> &mut Self {
        self.ops.push(RhsOp::SetRoot(n, root));
        self
    }

    /// Creates a node and returns a reference usable by [`Rhs::add_edge`].
    pub fn add_node(&mut self, label: LabelExpr, root: bool) -> NodeRef {
        self.ops.push(RhsOp::AddNode { label, root });
        self.created += 1;
        NodeRef::Created(self.created - 1)
    }

    /// Creates an edge.
    pub fn add_edge(&mut self, src: NodeRef, tgt: NodeRef, label: LabelExpr) -> &mut Self {
        self.ops.push(RhsOp::AddEdge { src, tgt, label });
        self
    }

    /// Edits in insertion order.
    #[must_use]
    pub fn ops(&self) -> &[RhsOp] {
        &self.ops
    }

    /// Number of nodes this right-hand side creates.
    #[must_use]
    pub fn created_nodes(&self) -> usize {
        self.created
    }

    /// Pattern nodes this right-hand side deletes.
    #[must_use]
    pub fn deleted_nodes(&self) -> Vec<PatNode> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                RhsOp::DeleteNode(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    fn deletes_edge(&self, e: PatEdge) -> bool {
        self.ops.iter().any(|op| *op == RhsOp::DeleteEdge(e))
    }
}

/// Errors raised while compiling a rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// A pattern element or variable reference is invalid.
    #[error(transparent)]
    Pattern(#[from] PatternError),
    /// An edit names a node the right-hand side never creates.
    #[error("unknown created node #{0}")]
    UnknownCreatedNode(usize),
    /// A deleted pattern node keeps a pattern edge that is not deleted.
    #[error("deleting {node:?} leaves pattern edge {edge:?} dangling")]
    DanglingEdge {
        /// Deleted node.
        node: PatNode,
        /// Incident edge left in place.
        edge: PatEdge,
    },
    /// A created edge attaches to a deleted pattern node.
    #[error("new edge attaches to deleted node {0:?}")]
    EdgeToDeletedNode(PatNode),
}

/// A compiled rewrite rule.
#[derive(Clone, Debug)]
pub struct Rule {
    id: RuleId,
    name: String,
    lhs: Pattern,
    condition: CompiledCondition,
    plan: SearchPlan,
    rhs: Rhs,
}

impl Rule {
    /// Validates and compiles a rule against index caps `caps`.
    ///
    /// # Errors
    /// Returns [`RuleError`] when the condition or right-hand side refers to
    /// unknown elements or undeclared variables, or when a node deletion would
    /// leave a pattern edge dangling.
    pub fn new(
        name: &str,
        lhs: Pattern,
        condition: Option<Condition>,
        rhs: Rhs,
        caps: DegreeCaps,
    ) -> Result<Self, RuleError> {
        let condition = CompiledCondition::compile(condition);
        for leaf in condition.leaves() {
            check_deps(&lhs, &leaf.predicate.deps())?;
        }
        check_rhs(&lhs, &rhs)?;
        let plan = SearchPlan::compile(&lhs, &condition, &rhs.deleted_nodes(), caps);
        Ok(Self {
            id: make_rule_id(name),
            name: name.to_owned(),
            lhs,
            condition,
            plan,
            rhs,
        })
    }

    /// Stable identifier derived from the name.
    #[must_use]
    pub fn id(&self) -> RuleId {
        self.id
    }

    /// Rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Left-hand-side pattern.
    #[must_use]
    pub fn lhs(&self) -> &Pattern {
        &self.lhs
    }

    /// Compiled condition.
    #[must_use]
    pub fn condition(&self) -> &CompiledCondition {
        &self.condition
    }

    /// Compiled search plan.
    #[must_use]
    pub fn plan(&self) -> &SearchPlan {
        &self.plan
    }

    /// Right-hand side.
    #[must_use]
    pub fn rhs(&self) -> &Rhs {
        &self.rhs
    }
}

fn check_deps(lhs: &Pattern, deps: &Deps) -> Result<(), RuleError> {
    for &n in &deps.nodes {
        lhs.node(n).ok_or(PatternError::UnknownNode(n))?;
    }
    for v in &deps.vars {
        if lhs.vars().get(v).is_none() {
            return Err(PatternError::UndeclaredVariable(v.clone()).into());
        }
    }
    Ok(())
}

fn check_label(lhs: &Pattern, label: &LabelExpr) -> Result<(), RuleError> {
    let mut deps = Deps::default();
    label.collect_deps(&mut deps);
    check_deps(lhs, &deps)
}

fn check_rhs(lhs: &Pattern, rhs: &Rhs) -> Result<(), RuleError> {
    let deleted = rhs.deleted_nodes();
    let check_node = |n: PatNode| lhs.node(n).map(|_| ()).ok_or(PatternError::UnknownNode(n));
    let check_edge = |e: PatEdge| lhs.edge(e).map(|_| ()).ok_or(PatternError::UnknownEdge(e));
    for op in rhs.ops() {
        match op {
            RhsOp::DeleteEdge(e) | RhsOp::RemarkEdge(e, _) => check_edge(*e)?,
            RhsOp::RelabelEdge(e, label) => {
                check_edge(*e)?;
                check_label(lhs, label)?;
            }
            RhsOp::RemarkNode(n, _) | RhsOp::SetRoot(n, _) => check_node(*n)?,
            RhsOp::RelabelNode(n, label) => {
                check_node(*n)?;
                check_label(lhs, label)?;
            }
            RhsOp::DeleteNode(n) => {
                check_node(*n)?;
                if let Some(edge) = lhs.incident_edges(*n).find(|&e| !rhs.deletes_edge(e)) {
                    return Err(RuleError::DanglingEdge { node: *n, edge });
                }
            }
            RhsOp::AddNode { label, .. } => check_label(lhs, label)?,
            RhsOp::AddEdge { src, tgt, label } => {
                for end in [src, tgt] {
                    match *end {
                        NodeRef::Lhs(n) => {
                            check_node(n)?;
                            if deleted.contains(&n) {
                                return Err(RuleError::EdgeToDeletedNode(n));
                            }
                        }
                        NodeRef::Created(i) if i >= rhs.created_nodes() => {
                            return Err(RuleError::UnknownCreatedNode(i));
                        }
                        NodeRef::Created(_) => {}
                    }
                }
                check_label(lhs, label)?;
            }
        }
    }
    Ok(())
}
