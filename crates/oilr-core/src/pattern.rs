// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Left-hand-side patterns and label matching.
//!
//! A [`Pattern`] is a small graph whose nodes and edges carry
//! [`LabelPattern`]s. Label patterns mix literal atoms and typed variables;
//! matching a host label binds fresh variables into an [`Assignment`] and
//! checks already-bound ones for equality.
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::ident::{PatEdge, PatNode};
use crate::index::Thresholds;
use crate::label::{Atom, Label, Mark};
use crate::morphism::Assignment;

/// Declared type of a rule variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VarType {
    /// Integer atom.
    Int,
    /// Single-character string atom.
    Char,
    /// String atom.
    Str,
    /// Any single atom.
    Atom,
    /// Any (possibly empty) list of atoms.
    List,
}

impl VarType {
    /// `true` if a single `atom` is a value of this type.
    #[must_use]
    pub fn admits(self, atom: &Atom) -> bool {
        match self {
            Self::Int => matches!(atom, Atom::Int(_)),
            Self::Char => atom.is_char(),
            Self::Str => matches!(atom, Atom::Str(_)),
            Self::Atom | Self::List => true,
        }
    }
}

/// Errors raised while building a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// A pattern node index is out of range.
    #[error("unknown pattern node {0:?}")]
    UnknownNode(PatNode),
    /// A pattern edge index is out of range.
    #[error("unknown pattern edge {0:?}")]
    UnknownEdge(PatEdge),
    /// A label refers to a variable that was never declared.
    #[error("undeclared variable `{0}`")]
    UndeclaredVariable(String),
    /// A variable was declared twice.
    #[error("variable `{0}` declared twice")]
    DuplicateVariable(String),
    /// A label uses more than one list variable.
    #[error("label has more than one list variable")]
    MultipleListVariables,
    /// Forbidden edges must join two distinct nodes.
    #[error("forbidden edge on {0:?} would be a loop")]
    ForbiddenLoop(PatNode),
}

/// Mark component of a label pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MarkPattern {
    /// The host mark must equal this one.
    Exact(Mark),
    /// Any mark matches.
    #[default]
    Any,
}

/// One item in a label pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LabelItem {
    /// A literal atom.
    Literal(Atom),
    /// A declared variable.
    Var(String),
}

impl LabelItem {
    /// Variable item.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }
}

impl From<Atom> for LabelItem {
    fn from(atom: Atom) -> Self {
        Self::Literal(atom)
    }
}

impl From<i64> for LabelItem {
    fn from(v: i64) -> Self {
        Self::Literal(Atom::Int(v))
    }
}

impl From<&str> for LabelItem {
    fn from(s: &str) -> Self {
        Self::Literal(Atom::from(s))
    }
}

/// Pattern over host labels.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabelPattern {
    /// Mark the host label must carry.
    pub mark: MarkPattern,
    /// Atom items, matched positionally around at most one list variable.
    pub items: Vec<LabelItem>,
}

impl Default for LabelPattern {
    fn default() -> Self {
        Self::blank()
    }
}

impl LabelPattern {
    /// Matches only the blank, unmarked label.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            mark: MarkPattern::Exact(Mark::None),
            items: Vec::new(),
        }
    }

    /// Unmarked pattern with the given items.
    pub fn of<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<LabelItem>,
    {
        Self {
            mark: MarkPattern::Exact(Mark::None),
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the pattern with its mark component replaced.
    #[must_use]
    pub fn with_mark(mut self, mark: MarkPattern) -> Self {
        self.mark = mark;
        self
    }

    /// Variable names used by this pattern, in item order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            LabelItem::Var(name) => Some(name.as_str()),
            LabelItem::Literal(_) => None,
        })
    }

    /// Matches `label`, binding fresh variables into `assignment`.
    ///
    /// On failure every binding made by this call is rolled back.
    pub fn matches(&self, label: &Label, vars: &VarTable, assignment: &mut Assignment) -> bool {
        if let MarkPattern::Exact(mark) = self.mark {
            if label.mark != mark {
                return false;
            }
        }
        let mark = assignment.mark();
        if self.match_atoms(&label.atoms, vars, assignment) {
            true
        } else {
            assignment.rollback(mark);
            false
        }
    }

    fn match_atoms(&self, atoms: &[Atom], vars: &VarTable, assignment: &mut Assignment) -> bool {
        let list_at = self.items.iter().position(|item| match item {
            LabelItem::Var(name) => vars.get(name) == Some(VarType::List),
            LabelItem::Literal(_) => false,
        });
        let Some(p) = list_at else {
            return atoms.len() == self.items.len()
                && self
                    .items
                    .iter()
                    .zip(atoms)
                    .all(|(item, atom)| match_item(item, atom, vars, assignment));
        };
        let fixed = self.items.len() - 1;
        if atoms.len() < fixed {
            return false;
        }
        let tail_start = atoms.len() - (self.items.len() - p - 1);
        let head_ok = self.items[..p]
            .iter()
            .zip(&atoms[..p])
            .all(|(item, atom)| match_item(item, atom, vars, assignment));
        head_ok
            && match &self.items[p] {
                LabelItem::Var(name) => bind_value(name, &atoms[p..tail_start], assignment),
                LabelItem::Literal(_) => false,
            }
            && self.items[p + 1..]
                .iter()
                .zip(&atoms[tail_start..])
                .all(|(item, atom)| match_item(item, atom, vars, assignment))
    }
}

fn match_item(item: &LabelItem, atom: &Atom, vars: &VarTable, assignment: &mut Assignment) -> bool {
    match item {
        LabelItem::Literal(lit) => lit == atom,
        LabelItem::Var(name) => match vars.get(name) {
            Some(ty) if ty.admits(atom) => bind_value(name, std::slice::from_ref(atom), assignment),
            _ => false,
        },
    }
}

fn bind_value(name: &str, value: &[Atom], assignment: &mut Assignment) -> bool {
    match assignment.get(name) {
        Some(bound) => bound == value,
        None => {
            assignment.bind(name, value.to_vec());
            true
        }
    }
}

/// Declared variables of a pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VarTable {
    types: FxHashMap<String, VarType>,
}

impl VarTable {
    /// Declared type of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<VarType> {
        self.types.get(name).copied()
    }

    /// Number of declared variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// `true` when no variable is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// A pattern node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternNode {
    /// Label pattern.
    pub label: LabelPattern,
    /// Whether the host node must be a root.
    pub root: bool,
}

/// A pattern edge. `src == tgt` denotes a loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternEdge {
    /// Source pattern node.
    pub src: PatNode,
    /// Target pattern node.
    pub tgt: PatNode,
    /// Label pattern.
    pub label: LabelPattern,
}

impl PatternEdge {
    /// `true` for a loop.
    #[must_use]
    pub fn is_loop(&self) -> bool {
        self.src == self.tgt
    }
}

/// A rule's left-hand side.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pattern {
    nodes: Vec<PatternNode>,
    edges: Vec<PatternEdge>,
    forbidden: Vec<(PatNode, PatNode)>,
    vars: VarTable,
}

impl Pattern {
    /// Creates an empty pattern.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable.
    ///
    /// # Errors
    /// Returns [`PatternError::DuplicateVariable`] if `name` is already declared.
    pub fn declare(&mut self, name: &str, ty: VarType) -> Result<(), PatternError> {
        if self.vars.types.contains_key(name) {
            return Err(PatternError::DuplicateVariable(name.to_owned()));
        }
        self.vars.types.insert(name.to_owned(), ty);
        Ok(())
    }

    /// Adds a node.
    ///
    /// # Errors
    /// Returns an error if the label uses undeclared variables or more than one
    /// list variable.
    pub fn add_node(&mut self, label: LabelPattern, root: bool) -> Result<PatNode, PatternError> {
        self.check_label(&label)?;
        self.nodes.push(PatternNode { label, root });
        Ok(PatNode(self.nodes.len() - 1))
    }

    /// Adds an edge; `src == tgt` adds a loop.
    ///
    /// # Errors
    /// Returns an error for unknown endpoints or an invalid label.
    pub fn add_edge(
        &mut self,
        src: PatNode,
        tgt: PatNode,
        label: LabelPattern,
    ) -> Result<PatEdge, PatternError> {
        self.check_node(src)?;
        self.check_node(tgt)?;
        self.check_label(&label)?;
        self.edges.push(PatternEdge { src, tgt, label });
        Ok(PatEdge(self.edges.len() - 1))
    }

    /// Requires that no host edge joins the images of `src` and `tgt`.
    ///
    /// # Errors
    /// Returns an error for unknown endpoints or `src == tgt`.
    pub fn forbid_edge(&mut self, src: PatNode, tgt: PatNode) -> Result<(), PatternError> {
        self.check_node(src)?;
        self.check_node(tgt)?;
        if src == tgt {
            return Err(PatternError::ForbiddenLoop(src));
        }
        self.forbidden.push((src, tgt));
        Ok(())
    }

    /// Pattern node `p`.
    #[must_use]
    pub fn node(&self, p: PatNode) -> Option<&PatternNode> {
        self.nodes.get(p.0)
    }

    /// Pattern edge `p`.
    #[must_use]
    pub fn edge(&self, p: PatEdge) -> Option<&PatternEdge> {
        self.edges.get(p.0)
    }

    /// All pattern nodes in index order.
    #[must_use]
    pub fn nodes(&self) -> &[PatternNode] {
        &self.nodes
    }

    /// All pattern edges in index order.
    #[must_use]
    pub fn edges(&self) -> &[PatternEdge] {
        &self.edges
    }

    /// Forbidden `(src, tgt)` pairs.
    #[must_use]
    pub fn forbidden(&self) -> &[(PatNode, PatNode)] {
        &self.forbidden
    }

    /// Declared variables.
    #[must_use]
    pub fn vars(&self) -> &VarTable {
        &self.vars
    }

    /// Number of pattern nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of pattern edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Candidate thresholds `(o, i, l, r)` for pattern node `p`.
    ///
    /// With `exact` set, a host node must have exactly the pattern's degrees.
    #[must_use]
    pub fn thresholds(&self, p: PatNode, exact: bool) -> Thresholds {
        let mut t = Thresholds {
            root: self.node(p).is_some_and(|n| n.root),
            exact,
            ..Thresholds::default()
        };
        for e in &self.edges {
            if e.is_loop() {
                t.loops += usize::from(e.src == p);
            } else {
                t.out += usize::from(e.src == p);
                t.inc += usize::from(e.tgt == p);
            }
        }
        t
    }

    /// Pattern edges incident to `p`, loops included, in index order.
    pub fn incident_edges(&self, p: PatNode) -> impl Iterator<Item = PatEdge> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.src == p || e.tgt == p)
            .map(|(i, _)| PatEdge(i))
    }

    fn check_node(&self, p: PatNode) -> Result<(), PatternError> {
        if p.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(PatternError::UnknownNode(p))
        }
    }

    fn check_label(&self, label: &LabelPattern) -> Result<(), PatternError> {
        let mut lists = 0;
        for name in label.variables() {
            match self.vars.get(name) {
                None => return Err(PatternError::UndeclaredVariable(name.to_owned())),
                Some(VarType::List) => lists += 1,
                Some(_) => {}
            }
        }
        if lists > 1 {
            return Err(PatternError::MultipleListVariables);
        }
        Ok(())
    }
}
