// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rule conditions: boolean trees over predicates, evaluated in three-valued
//! logic.
//!
//! Leaves are numbered by a left-to-right depth-first walk; a leaf's number is
//! its `bool_id` and indexes the per-search [`PredicateState`] slice.
//! Undecided leaves evaluate to [`Truth::Unknown`]. The tree result collapses
//! to a plain boolean in one of two ways:
//!
//! * [`CompiledCondition::holds_optimistically`] reads `Unknown` as `true`.
//!   Used at pruning checkpoints during a partial match, it can only reject a
//!   match whose decided predicates already falsify the condition.
//! * [`CompiledCondition::holds`] reads `Unknown` as `false`. Used for the final
//!   verdict on a complete match.
use tracing::warn;

use crate::graph::GraphStore;
use crate::morphism::Morphism;
use crate::predicate::{Predicate, PredicateState};

/// Three-valued truth.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Truth {
    /// Definitely true.
    True,
    /// Definitely false.
    False,
    /// Depends on an undecided predicate.
    Unknown,
}

impl Truth {
    /// Kleene conjunction.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::True, Self::True) => Self::True,
            _ => Self::Unknown,
        }
    }

    /// Kleene disjunction.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::False, Self::False) => Self::False,
            _ => Self::Unknown,
        }
    }

    /// Kleene negation.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self {
        if b {
            Self::True
        } else {
            Self::False
        }
    }
}

/// Source form of a rule condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// A predicate.
    Pred(Predicate),
    /// Negation. `Not(Pred(p))` becomes a negated leaf.
    Not(Box<Condition>),
    /// Conjunction.
    And(Box<Condition>, Box<Condition>),
    /// Disjunction.
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    /// `not c`.
    #[must_use]
    pub fn not(c: Self) -> Self {
        Self::Not(Box::new(c))
    }

    /// `a and b`.
    #[must_use]
    pub fn and(a: Self, b: Self) -> Self {
        Self::And(Box::new(a), Box::new(b))
    }

    /// `a or b`.
    #[must_use]
    pub fn or(a: Self, b: Self) -> Self {
        Self::Or(Box::new(a), Box::new(b))
    }
}

impl From<Predicate> for Condition {
    fn from(p: Predicate) -> Self {
        Self::Pred(p)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Node {
    Leaf(usize),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

/// A leaf of a compiled condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf {
    /// The predicate.
    pub predicate: Predicate,
    /// Whether the leaf reads the predicate's negation.
    pub negated: bool,
}

/// A condition compiled to a fixed tree with numbered leaves.
///
/// An absent condition compiles to an empty tree that always holds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompiledCondition {
    root: Option<Node>,
    leaves: Vec<Leaf>,
}

impl CompiledCondition {
    /// Compiles `cond`, assigning `bool_id`s in depth-first leaf order.
    #[must_use]
    pub fn compile(cond: Option<Condition>) -> Self {
        let mut leaves = Vec::new();
        let root = cond.map(|c| lower(c, &mut leaves));
        Self { root, leaves }
    }

    /// Number of leaves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// `true` when the condition has no leaves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Leaves indexed by `bool_id`.
    #[must_use]
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    /// Fresh per-search state: every leaf undecided.
    #[must_use]
    pub fn seed(&self) -> Vec<PredicateState> {
        vec![PredicateState::Undecided; self.leaves.len()]
    }

    /// Decides leaf `bool_id` against `m`.
    ///
    /// Returns [`PredicateState::Undecided`] while a dependency is unbound. An
    /// evaluation error fails the leaf: the stored value is chosen so the leaf
    /// reads `false` whether or not it is negated.
    pub fn decide(&self, bool_id: usize, host: &GraphStore, m: &Morphism) -> PredicateState {
        let Some(leaf) = self.leaves.get(bool_id) else {
            return PredicateState::Undecided;
        };
        match leaf.predicate.decide(host, m) {
            None => PredicateState::Undecided,
            Some(Ok(v)) => PredicateState::Decided(v),
            Some(Err(err)) => {
                warn!(bool_id, %err, "predicate evaluation failed; leaf is false");
                PredicateState::Decided(leaf.negated)
            }
        }
    }

    /// Three-valued value of the whole tree.
    #[must_use]
    pub fn evaluate(&self, states: &[PredicateState]) -> Truth {
        self.root
            .as_ref()
            .map_or(Truth::True, |root| self.eval_node(root, states))
    }

    /// Pruning reading: undecided leaves cannot falsify the condition.
    #[must_use]
    pub fn holds_optimistically(&self, states: &[PredicateState]) -> bool {
        self.evaluate(states) != Truth::False
    }

    /// Final reading: the condition holds only if it is definitely true.
    #[must_use]
    pub fn holds(&self, states: &[PredicateState]) -> bool {
        self.evaluate(states) == Truth::True
    }

    /// Seeded two-valued flags: undecided positive leaves read `true`,
    /// undecided negated leaves read `false`, decided leaves carry their value.
    #[must_use]
    pub fn seeded_flags(&self, states: &[PredicateState]) -> Vec<bool> {
        self.leaves
            .iter()
            .zip(states)
            .map(|(leaf, state)| match state {
                PredicateState::Undecided => !leaf.negated,
                PredicateState::Decided(v) => *v,
            })
            .collect()
    }

    /// Two-valued evaluation over seeded flags.
    #[must_use]
    pub fn evaluate_flags(&self, flags: &[bool]) -> bool {
        let states: Vec<PredicateState> =
            flags.iter().map(|&f| PredicateState::Decided(f)).collect();
        self.holds(&states)
    }

    fn eval_node(&self, node: &Node, states: &[PredicateState]) -> Truth {
        match node {
            Node::Leaf(id) => {
                let negated = self.leaves.get(*id).is_some_and(|l| l.negated);
                match states.get(*id).copied().unwrap_or_default() {
                    PredicateState::Undecided => Truth::Unknown,
                    PredicateState::Decided(v) => Truth::from(v != negated),
                }
            }
            Node::Not(inner) => self.eval_node(inner, states).negate(),
            Node::And(a, b) => self.eval_node(a, states).and(self.eval_node(b, states)),
            Node::Or(a, b) => self.eval_node(a, states).or(self.eval_node(b, states)),
        }
    }
}

fn lower(cond: Condition, leaves: &mut Vec<Leaf>) -> Node {
    match cond {
        Condition::Pred(predicate) => {
            leaves.push(Leaf {
                predicate,
                negated: false,
            });
            Node::Leaf(leaves.len() - 1)
        }
        Condition::Not(inner) => match *inner {
            Condition::Pred(predicate) => {
                leaves.push(Leaf {
                    predicate,
                    negated: true,
                });
                Node::Leaf(leaves.len() - 1)
            }
            other => Node::Not(Box::new(lower(other, leaves))),
        },
        Condition::And(a, b) => {
            let a = lower(*a, leaves);
            Node::And(Box::new(a), Box::new(lower(*b, leaves)))
        }
        Condition::Or(a, b) => {
            let a = lower(*a, leaves);
            Node::Or(Box::new(a), Box::new(lower(*b, leaves)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::predicate::{RelOp, TypeKind};
    use PredicateState::{Decided, Undecided};

    fn p(var: &str) -> Condition {
        Condition::Pred(Predicate::type_check(TypeKind::Int, var))
    }

    #[test]
    fn leaves_are_numbered_depth_first() {
        let c = CompiledCondition::compile(Some(Condition::or(
            Condition::and(p("a"), Condition::not(p("b"))),
            p("c"),
        )));
        assert_eq!(c.len(), 3);
        let vars: Vec<_> = c
            .leaves()
            .iter()
            .map(|l| match &l.predicate {
                Predicate::TypeCheck { var, .. } => (var.clone(), l.negated),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            vars,
            vec![("a".into(), false), ("b".into(), true), ("c".into(), false)]
        );
    }

    #[test]
    fn undecided_leaves_never_falsify_the_pruning_reading() {
        let c = CompiledCondition::compile(Some(Condition::and(p("a"), Condition::not(p("b")))));
        assert!(c.holds_optimistically(&[Undecided, Undecided]));
        assert!(!c.holds(&[Undecided, Undecided]));
        assert!(c.holds_optimistically(&[Decided(true), Undecided]));
        assert!(!c.holds_optimistically(&[Decided(false), Undecided]));
        // Negated leaf whose predicate is true falsifies the conjunction.
        assert!(!c.holds_optimistically(&[Undecided, Decided(true)]));
        assert!(c.holds(&[Decided(true), Decided(false)]));
    }

    #[test]
    fn seeded_flags_agree_with_the_pruning_reading() {
        let c = CompiledCondition::compile(Some(Condition::or(
            Condition::and(p("a"), Condition::not(p("b"))),
            p("c"),
        )));
        let states = [Decided(true), Undecided, Decided(false)];
        let flags = c.seeded_flags(&states);
        assert_eq!(flags, vec![true, false, false]);
        assert_eq!(c.evaluate_flags(&flags), c.holds_optimistically(&states));
    }

    #[test]
    fn absent_condition_always_holds() {
        let c = CompiledCondition::compile(None);
        assert!(c.is_empty());
        assert!(c.holds(&[]));
        assert_eq!(c.evaluate(&[]), Truth::True);
    }

    #[test]
    fn failed_evaluation_makes_the_leaf_false_even_when_negated() {
        let bad = Predicate::relational(RelOp::Greater, Expr::var("s"), Expr::Int(0));
        let c = CompiledCondition::compile(Some(Condition::not(Condition::Pred(bad))));
        let host = GraphStore::default();
        let mut m = Morphism::new(0, 0);
        m.assignment_mut().bind("s", vec![crate::label::Atom::from("x")]);
        let state = c.decide(0, &host, &m);
        assert_eq!(state, Decided(true));
        assert!(!c.holds(&[state]));
    }

    #[test]
    fn kleene_tables() {
        use Truth::{False, True, Unknown};
        assert_eq!(Unknown.and(False), False);
        assert_eq!(Unknown.and(True), Unknown);
        assert_eq!(Unknown.or(True), True);
        assert_eq!(Unknown.or(False), Unknown);
        assert_eq!(Unknown.negate(), Unknown);
    }
}
