// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rule predicates and their per-search decision state.
//!
//! A predicate is decidable once every pattern node and variable it reads is
//! bound. Until then its state stays [`PredicateState::Undecided`]; a caller
//! must never read "undecided" as "false".
use crate::expr::{eval_list, Deps, EvalError, Expr, LabelExpr};
use crate::graph::GraphStore;
use crate::ident::PatNode;
use crate::label::Atom;
use crate::morphism::Morphism;

/// Runtime type tested by a [`Predicate::TypeCheck`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeKind {
    /// A single integer atom.
    Int,
    /// A single string atom of exactly one character.
    Char,
    /// A single string atom.
    Str,
    /// Any single atom.
    Atom,
}

impl TypeKind {
    fn holds(self, value: &[Atom]) -> bool {
        match (self, value) {
            (Self::Int, [Atom::Int(_)]) | (Self::Str, [Atom::Str(_)]) | (Self::Atom, [_]) => true,
            (Self::Char, [atom]) => atom.is_char(),
            _ => false,
        }
    }
}

/// Equality operator over label values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EqOp {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
}

/// Relational operator over integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelOp {
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
}

impl RelOp {
    fn holds(self, a: i64, b: i64) -> bool {
        match self {
            Self::Greater => a > b,
            Self::GreaterEqual => a >= b,
            Self::Less => a < b,
            Self::LessEqual => a <= b,
        }
    }
}

/// A side condition attached to a rule.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Predicate {
    /// `int(x)`, `char(x)`, `string(x)`, `atom(x)`.
    TypeCheck {
        /// Tested type.
        kind: TypeKind,
        /// Tested variable.
        var: String,
    },
    /// Label-value equality or inequality.
    Compare {
        /// Operator.
        op: EqOp,
        /// Left list expression.
        left: Vec<Expr>,
        /// Right list expression.
        right: Vec<Expr>,
    },
    /// Integer comparison.
    Relational {
        /// Operator.
        op: RelOp,
        /// Left operand.
        left: Expr,
        /// Right operand.
        right: Expr,
    },
    /// `edge(source, target[, label])`.
    Edge {
        /// Source pattern node.
        source: PatNode,
        /// Target pattern node.
        target: PatNode,
        /// Required label, if any.
        label: Option<LabelExpr>,
    },
}

/// Decision state of one predicate during a search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PredicateState {
    /// Dependencies not yet bound.
    #[default]
    Undecided,
    /// The predicate's own (un-negated) value.
    Decided(bool),
}

impl PredicateState {
    /// `true` once decided.
    #[must_use]
    pub fn is_decided(self) -> bool {
        matches!(self, Self::Decided(_))
    }
}

impl Predicate {
    /// Integer comparison helper.
    #[must_use]
    pub fn relational(op: RelOp, left: Expr, right: Expr) -> Self {
        Self::Relational { op, left, right }
    }

    /// Equality helper.
    #[must_use]
    pub fn compare(op: EqOp, left: Vec<Expr>, right: Vec<Expr>) -> Self {
        Self::Compare { op, left, right }
    }

    /// Type-check helper.
    pub fn type_check(kind: TypeKind, var: impl Into<String>) -> Self {
        Self::TypeCheck {
            kind,
            var: var.into(),
        }
    }

    /// Pattern nodes and variables this predicate reads.
    #[must_use]
    pub fn deps(&self) -> Deps {
        let mut deps = Deps::default();
        match self {
            Self::TypeCheck { var, .. } => Expr::Var(var.clone()).collect_deps(&mut deps),
            Self::Compare { left, right, .. } => {
                for e in left.iter().chain(right) {
                    e.collect_deps(&mut deps);
                }
            }
            Self::Relational { left, right, .. } => {
                left.collect_deps(&mut deps);
                right.collect_deps(&mut deps);
            }
            Self::Edge {
                source,
                target,
                label,
            } => {
                Expr::Indeg(*source).collect_deps(&mut deps);
                Expr::Indeg(*target).collect_deps(&mut deps);
                if let Some(label) = label {
                    label.collect_deps(&mut deps);
                }
            }
        }
        deps
    }

    /// Decides the predicate against `m`.
    ///
    /// Returns `None` while a dependency is unbound.
    ///
    /// # Errors
    /// Evaluation errors, including runtime type mismatches, are returned to
    /// the caller; the predicate is then considered failed.
    pub fn decide(&self, host: &GraphStore, m: &Morphism) -> Option<Result<bool, EvalError>> {
        if !self.deps().bound_in(m) {
            return None;
        }
        Some(self.evaluate(host, m))
    }

    fn evaluate(&self, host: &GraphStore, m: &Morphism) -> Result<bool, EvalError> {
        match self {
            Self::TypeCheck { kind, var } => {
                let value = m
                    .variable(var)
                    .ok_or_else(|| EvalError::UnboundVariable(var.clone()))?;
                Ok(kind.holds(value))
            }
            Self::Compare { op, left, right } => {
                let equal = eval_list(left, host, m)? == eval_list(right, host, m)?;
                Ok(match op {
                    EqOp::Equal => equal,
                    EqOp::NotEqual => !equal,
                })
            }
            Self::Relational { op, left, right } => {
                Ok(op.holds(left.eval_int(host, m)?, right.eval_int(host, m)?))
            }
            Self::Edge {
                source,
                target,
                label,
            } => {
                let s = m.node(*source).ok_or(EvalError::UnboundNode(*source))?;
                let t = m.node(*target).ok_or(EvalError::UnboundNode(*target))?;
                let wanted = label.as_ref().map(|l| l.eval(host, m)).transpose()?;
                let candidates = if s == t { host.loops(s) } else { host.out_edges(s) };
                Ok(candidates.iter().any(|&e| {
                    host.edge(e).is_some_and(|rec| {
                        rec.tgt == t && wanted.as_ref().map_or(true, |w| *w == rec.label)
                    })
                }))
            }
        }
    }
}
