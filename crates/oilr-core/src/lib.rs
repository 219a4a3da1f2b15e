// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! oilr-core: degree-indexed subgraph matching for labelled graph rewriting.
//!
//! Host nodes are bucketed by a saturated (root, out, in, loop) degree class so
//! a rule's search plan only scans classes that can possibly satisfy a pattern
//! node. Searches backtrack without recursion, claim host elements through
//! exclusive tokens, and evaluate rule conditions incrementally in three-valued
//! logic at the plan step that binds each predicate's last dependency.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod condition;
mod config;
mod engine_impl;
mod expr;
mod graph;
mod host;
mod ident;
mod index;
mod label;
mod morphism;
mod pattern;
mod plan;
mod predicate;
mod record;
mod rule;
mod search;
mod state;
mod trace;

// Re-exports for stable public API
/// Identifiers for host elements, pattern elements and rules.
pub use ident::{make_rule_id, EdgeId, Hash, NodeId, PatEdge, PatNode, RuleId};
/// Labels: a mark plus an ordered list of atoms.
pub use label::{Atom, Label, Mark};
/// Node and edge records stored in the host graph.
pub use record::{EdgeRecord, NodeRecord};
/// Slot-arena graph storage with per-node incidence lists.
pub use graph::{DeleteNodeError, Degrees, GraphStore};
/// Degree classes, caps and the bucket index over host nodes.
pub use index::{DegreeCaps, DegreeClass, DegreeIndex, ElemList, Thresholds};
/// Host graph whose edits keep the degree index current.
pub use host::{Host, HostError, IndexMismatch};
/// Match-state tokens and invariant-violation payloads.
pub use state::{
    EdgeToken, Element, InvariantViolation, LoopToken, MatchState, NodeToken, ViolationKind,
};
/// Variable assignments and partial morphisms.
pub use morphism::{Assignment, Morphism};
/// Left-hand-side patterns and label patterns.
pub use pattern::{
    LabelItem, LabelPattern, MarkPattern, Pattern, PatternEdge, PatternError, PatternNode,
    VarTable, VarType,
};
/// Integer, string and list expressions over a morphism.
pub use expr::{eval_list, Deps, EvalError, Expr, LabelExpr};
/// Atomic condition predicates.
pub use predicate::{EqOp, Predicate, PredicateState, RelOp, TypeKind};
/// Condition trees and their compiled, three-valued form.
pub use condition::{CompiledCondition, Condition, Leaf, Truth};
/// Search plans compiled from patterns.
pub use plan::{SearchPlan, Step, TravSpec};
/// Compiled rules and right-hand-side edits.
pub use rule::{NodeRef, Rhs, RhsOp, Rule, RuleError};
/// Re-entrant match search.
pub use search::Search;
/// Trace hooks, events and the context recorder.
pub use trace::{LogTrace, NullTrace, TraceEntry, TraceEvent, TraceHook, TraceRecorder};
/// Engine configuration.
pub use config::EngineConfig;
/// Rule registry and rewrite driver.
pub use engine_impl::{ApplyResult, Engine, EngineError, Rewrite};
