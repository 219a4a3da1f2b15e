// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Expressions over a morphism: integers, strings, atom lists and labels.
//!
//! Expressions are evaluated against the host graph and a (possibly partial)
//! [`Morphism`]. Readiness is checked separately through
//! [`Expr::collect_deps`]; evaluating an expression whose dependencies are not
//! bound yields [`EvalError::UnboundVariable`] / [`EvalError::UnboundNode`].
use thiserror::Error;

use crate::graph::GraphStore;
use crate::ident::PatNode;
use crate::label::{Atom, Label, Mark};
use crate::morphism::Morphism;

/// Errors raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The variable has no value in the morphism.
    #[error("unbound variable `{0}`")]
    UnboundVariable(String),
    /// The pattern node has no image in the morphism.
    #[error("unbound pattern node {0:?}")]
    UnboundNode(PatNode),
    /// A value had the wrong runtime type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected type.
        expected: &'static str,
        /// Rendering of the offending value.
        found: String,
    },
    /// Integer division by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Integer arithmetic overflowed.
    #[error("arithmetic overflow")]
    Overflow,
}

/// An expression appearing in a condition or a right-hand-side label.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    /// Integer constant.
    Int(i64),
    /// String constant.
    Str(String),
    /// Variable reference. In list position a list variable is spliced.
    Var(String),
    /// Total in-degree (loops included) of a pattern node's image.
    Indeg(PatNode),
    /// Total out-degree (loops included) of a pattern node's image.
    Outdeg(PatNode),
    /// Character count of a string variable.
    Length(String),
    /// Integer negation.
    Neg(Box<Expr>),
    /// Integer addition.
    Add(Box<Expr>, Box<Expr>),
    /// Integer subtraction.
    Sub(Box<Expr>, Box<Expr>),
    /// Integer multiplication.
    Mul(Box<Expr>, Box<Expr>),
    /// Integer division, truncating toward zero.
    Div(Box<Expr>, Box<Expr>),
    /// String concatenation.
    Concat(Box<Expr>, Box<Expr>),
}

/// Pattern nodes and variables an expression reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Deps {
    /// Pattern nodes whose image is read.
    pub nodes: Vec<PatNode>,
    /// Variables whose value is read.
    pub vars: Vec<String>,
}

impl Deps {
    /// `true` once every dependency is bound in `m`.
    #[must_use]
    pub fn bound_in(&self, m: &Morphism) -> bool {
        self.nodes.iter().all(|&p| m.node(p).is_some())
            && self.vars.iter().all(|v| m.variable(v).is_some())
    }

    fn add_node(&mut self, p: PatNode) {
        if !self.nodes.contains(&p) {
            self.nodes.push(p);
        }
    }

    fn add_var(&mut self, v: &str) {
        if !self.vars.iter().any(|x| x == v) {
            self.vars.push(v.to_owned());
        }
    }
}

impl Expr {
    /// Variable reference.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    /// String constant.
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// `length(name)`.
    pub fn length(name: impl Into<String>) -> Self {
        Self::Length(name.into())
    }

    /// `a + b`.
    #[must_use]
    pub fn add(a: Self, b: Self) -> Self {
        Self::Add(Box::new(a), Box::new(b))
    }

    /// `a - b`.
    #[must_use]
    pub fn sub(a: Self, b: Self) -> Self {
        Self::Sub(Box::new(a), Box::new(b))
    }

    /// `a * b`.
    #[must_use]
    pub fn mul(a: Self, b: Self) -> Self {
        Self::Mul(Box::new(a), Box::new(b))
    }

    /// `a / b`.
    #[must_use]
    pub fn div(a: Self, b: Self) -> Self {
        Self::Div(Box::new(a), Box::new(b))
    }

    /// `a . b`.
    #[must_use]
    pub fn concat(a: Self, b: Self) -> Self {
        Self::Concat(Box::new(a), Box::new(b))
    }

    /// Adds this expression's dependencies to `deps`.
    pub fn collect_deps(&self, deps: &mut Deps) {
        match self {
            Self::Int(_) | Self::Str(_) => {}
            Self::Var(v) | Self::Length(v) => deps.add_var(v),
            Self::Indeg(p) | Self::Outdeg(p) => deps.add_node(*p),
            Self::Neg(a) => a.collect_deps(deps),
            Self::Add(a, b)
            | Self::Sub(a, b)
            | Self::Mul(a, b)
            | Self::Div(a, b)
            | Self::Concat(a, b) => {
                a.collect_deps(deps);
                b.collect_deps(deps);
            }
        }
    }

    /// Evaluates as an integer.
    ///
    /// # Errors
    /// Unbound dependencies, non-integer values, division by zero or overflow.
    pub fn eval_int(&self, host: &GraphStore, m: &Morphism) -> Result<i64, EvalError> {
        match self {
            Self::Int(v) => Ok(*v),
            Self::Var(name) => match single_atom(name, m)? {
                Atom::Int(v) => Ok(*v),
                other => Err(mismatch("integer", other)),
            },
            Self::Indeg(p) => {
                let n = m.node(*p).ok_or(EvalError::UnboundNode(*p))?;
                to_i64(host.indeg(n) + host.loopdeg(n))
            }
            Self::Outdeg(p) => {
                let n = m.node(*p).ok_or(EvalError::UnboundNode(*p))?;
                to_i64(host.outdeg(n) + host.loopdeg(n))
            }
            Self::Length(name) => match single_atom(name, m)? {
                Atom::Str(s) => to_i64(s.chars().count()),
                other => Err(mismatch("string", other)),
            },
            Self::Neg(a) => a.eval_int(host, m)?.checked_neg().ok_or(EvalError::Overflow),
            Self::Add(a, b) => a
                .eval_int(host, m)?
                .checked_add(b.eval_int(host, m)?)
                .ok_or(EvalError::Overflow),
            Self::Sub(a, b) => a
                .eval_int(host, m)?
                .checked_sub(b.eval_int(host, m)?)
                .ok_or(EvalError::Overflow),
            Self::Mul(a, b) => a
                .eval_int(host, m)?
                .checked_mul(b.eval_int(host, m)?)
                .ok_or(EvalError::Overflow),
            Self::Div(a, b) => {
                let (x, y) = (a.eval_int(host, m)?, b.eval_int(host, m)?);
                if y == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                x.checked_div(y).ok_or(EvalError::Overflow)
            }
            Self::Str(s) => Err(EvalError::TypeMismatch {
                expected: "integer",
                found: format!("{s:?}"),
            }),
            Self::Concat(..) => Err(EvalError::TypeMismatch {
                expected: "integer",
                found: "string expression".to_owned(),
            }),
        }
    }

    /// Evaluates as a string.
    ///
    /// # Errors
    /// Unbound dependencies or non-string values.
    pub fn eval_str(&self, host: &GraphStore, m: &Morphism) -> Result<String, EvalError> {
        match self {
            Self::Str(s) => Ok(s.clone()),
            Self::Var(name) => match single_atom(name, m)? {
                Atom::Str(s) => Ok(s.clone()),
                other => Err(mismatch("string", other)),
            },
            Self::Concat(a, b) => {
                let mut s = a.eval_str(host, m)?;
                s.push_str(&b.eval_str(host, m)?);
                Ok(s)
            }
            _ => Err(EvalError::TypeMismatch {
                expected: "string",
                found: "integer expression".to_owned(),
            }),
        }
    }

    /// Evaluates in list position, appending atoms to `out`.
    ///
    /// # Errors
    /// Any error of the underlying integer or string evaluation.
    pub fn eval_into(
        &self,
        host: &GraphStore,
        m: &Morphism,
        out: &mut Vec<Atom>,
    ) -> Result<(), EvalError> {
        match self {
            Self::Var(name) => {
                let value = m
                    .variable(name)
                    .ok_or_else(|| EvalError::UnboundVariable(name.clone()))?;
                out.extend_from_slice(value);
            }
            Self::Str(_) | Self::Concat(..) => out.push(Atom::Str(self.eval_str(host, m)?)),
            _ => out.push(Atom::Int(self.eval_int(host, m)?)),
        }
        Ok(())
    }
}

/// Evaluates a list of expressions to the atoms they denote.
///
/// # Errors
/// The first evaluation error encountered.
pub fn eval_list(items: &[Expr], host: &GraphStore, m: &Morphism) -> Result<Vec<Atom>, EvalError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        item.eval_into(host, m, &mut out)?;
    }
    Ok(out)
}

/// A label computed from a morphism: a mark plus a list expression.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabelExpr {
    /// Mark of the computed label.
    pub mark: Mark,
    /// Items of the computed atom list.
    pub items: Vec<Expr>,
}

impl LabelExpr {
    /// Unmarked label expression.
    pub fn of(items: impl IntoIterator<Item = Expr>) -> Self {
        Self {
            mark: Mark::None,
            items: items.into_iter().collect(),
        }
    }

    /// Returns the expression with its mark replaced.
    #[must_use]
    pub fn marked(mut self, mark: Mark) -> Self {
        self.mark = mark;
        self
    }

    /// Adds this expression's dependencies to `deps`.
    pub fn collect_deps(&self, deps: &mut Deps) {
        for item in &self.items {
            item.collect_deps(deps);
        }
    }

    /// Computes the label.
    ///
    /// # Errors
    /// The first evaluation error encountered.
    pub fn eval(&self, host: &GraphStore, m: &Morphism) -> Result<Label, EvalError> {
        Ok(Label {
            mark: self.mark,
            atoms: eval_list(&self.items, host, m)?,
        })
    }
}

fn single_atom<'m>(name: &str, m: &'m Morphism) -> Result<&'m Atom, EvalError> {
    match m.variable(name) {
        None => Err(EvalError::UnboundVariable(name.to_owned())),
        Some([atom]) => Ok(atom),
        Some(list) => Err(EvalError::TypeMismatch {
            expected: "single atom",
            found: format!("list of {}", list.len()),
        }),
    }
}

fn mismatch(expected: &'static str, found: &Atom) -> EvalError {
    EvalError::TypeMismatch {
        expected,
        found: format!("{found:?}"),
    }
}

fn to_i64(v: usize) -> Result<i64, EvalError> {
    i64::try_from(v).map_err(|_| EvalError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::NodeId;

    fn morphism_with(vars: &[(&str, Vec<Atom>)]) -> Morphism {
        let mut m = Morphism::new(1, 0);
        for (name, value) in vars {
            m.assignment_mut().bind(name, value.clone());
        }
        m
    }

    #[test]
    fn arithmetic_checks_overflow_and_zero() {
        let host = GraphStore::default();
        let m = morphism_with(&[("n", vec![Atom::Int(7)])]);
        let e = Expr::div(Expr::add(Expr::var("n"), Expr::Int(3)), Expr::Int(2));
        assert_eq!(e.eval_int(&host, &m), Ok(5));
        assert_eq!(
            Expr::div(Expr::Int(1), Expr::Int(0)).eval_int(&host, &m),
            Err(EvalError::DivisionByZero)
        );
        assert_eq!(
            Expr::add(Expr::Int(i64::MAX), Expr::Int(1)).eval_int(&host, &m),
            Err(EvalError::Overflow)
        );
    }

    #[test]
    fn length_requires_a_string() {
        let host = GraphStore::default();
        let m = morphism_with(&[("s", vec![Atom::from("héllo")]), ("n", vec![Atom::Int(1)])]);
        assert_eq!(Expr::length("s").eval_int(&host, &m), Ok(5));
        assert!(matches!(
            Expr::length("n").eval_int(&host, &m),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert_eq!(
            Expr::length("zz").eval_int(&host, &m),
            Err(EvalError::UnboundVariable("zz".into()))
        );
    }

    #[test]
    fn list_position_splices_variables() {
        let host = GraphStore::default();
        let m = morphism_with(&[
            ("l", vec![Atom::Int(1), Atom::Int(2)]),
            ("s", vec![Atom::from("a")]),
        ]);
        let label = LabelExpr::of([
            Expr::var("l"),
            Expr::concat(Expr::var("s"), Expr::str("b")),
            Expr::Int(9),
        ])
        .marked(Mark::Blue);
        assert_eq!(
            label.eval(&host, &m),
            Ok(
                Label::of([Atom::Int(1), Atom::Int(2), Atom::from("ab"), Atom::Int(9)])
                    .marked(Mark::Blue)
            )
        );
    }

    #[test]
    fn degree_expressions_need_a_bound_node() {
        let mut host = GraphStore::default();
        let n = host.insert_node(crate::record::NodeRecord {
            label: Label::blank(),
            root: false,
        });
        let mut m = Morphism::new(1, 0);
        assert_eq!(
            Expr::Indeg(PatNode(0)).eval_int(&host, &m),
            Err(EvalError::UnboundNode(PatNode(0)))
        );
        m.bind_node(PatNode(0), n);
        assert_eq!(n, NodeId(0));
        assert_eq!(Expr::Outdeg(PatNode(0)).eval_int(&host, &m), Ok(0));

        let mut deps = Deps::default();
        Expr::add(Expr::Indeg(PatNode(0)), Expr::length("s")).collect_deps(&mut deps);
        assert_eq!(deps.nodes, vec![PatNode(0)]);
        assert_eq!(deps.vars, vec!["s".to_owned()]);
        assert!(!deps.bound_in(&m));
    }
}
