// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! End-to-end matching scenarios over small hand-built hosts.

mod common;

use common::{all_matches, blank_host, capture_logs, node_images, query, str_node, var_node};
use oilr_core::{
    Atom, Condition, EngineConfig, Expr, Label, LabelPattern, NullTrace, Pattern,
    Predicate, RelOp, Search, TraceEvent, TraceHook, TraceRecorder, VarType,
};

#[test]
fn length_condition_selects_a_single_edge() {
    let mut host = oilr_core::Host::new(oilr_core::DegreeCaps::default());
    let a = str_node(&mut host, "foo");
    let b = str_node(&mut host, "ab");
    let c = str_node(&mut host, "hello");
    host.add_edge(a, b, Label::blank()).expect("a->b");
    host.add_edge(b, c, Label::blank()).expect("b->c");

    let mut lhs = Pattern::new();
    let n0 = var_node(&mut lhs, "x", VarType::Str);
    let n1 = var_node(&mut lhs, "y", VarType::Str);
    lhs.add_edge(n0, n1, LabelPattern::blank()).expect("edge");
    let cond = Predicate::relational(RelOp::Greater, Expr::length("x"), Expr::length("y"));
    let rule = query("shrinking", lhs, Some(cond.into()));

    let mut hook = NullTrace;
    let mut search = Search::new(&host, &rule, &EngineConfig::default(), &mut hook);
    let m = search.next_match().expect("one match");
    assert_eq!(m.node(n0), Some(a));
    assert_eq!(m.node(n1), Some(b));
    assert_eq!(m.variable("x"), Some(&[Atom::from("foo")][..]));
    assert_eq!(m.variable("y"), Some(&[Atom::from("ab")][..]));
    assert!(search.next_match().is_none());
    assert!(search.is_exhausted());
    assert!(search.match_state().is_clear());
    assert_eq!(search.bound_steps(), 0);
}

#[test]
fn loops_are_claimed_once_each() {
    let (mut host, ids) = blank_host(1);
    let n = ids[0];
    host.add_edge(n, n, Label::blank()).expect("loop 1");
    host.add_edge(n, n, Label::blank()).expect("loop 2");

    let loops = |count: usize| {
        let mut lhs = Pattern::new();
        let p = lhs.add_node(LabelPattern::blank(), false).expect("node");
        for _ in 0..count {
            lhs.add_edge(p, p, LabelPattern::blank()).expect("loop");
        }
        query(&format!("loops{count}"), lhs, None)
    };

    // Two pattern loops over two host loops: both assignments, never the same
    // host loop twice.
    let found = all_matches(&host, &loops(2));
    assert_eq!(found.len(), 2);
    for m in &found {
        let images: Vec<_> = m.edge_bindings().map(|(_, e)| e).collect();
        assert_eq!(images.len(), 2);
        assert_ne!(images[0], images[1]);
    }
    assert!(all_matches(&host, &loops(3)).is_empty());
}

#[test]
fn labelled_loop_skips_claimed_and_mismatched_loops() {
    let (mut host, ids) = blank_host(1);
    let n = ids[0];
    host.add_edge(n, n, Label::of([1_i64])).expect("loop 1");
    host.add_edge(n, n, Label::of([2_i64])).expect("loop 2");

    let mut lhs = Pattern::new();
    let p = lhs.add_node(LabelPattern::blank(), false).expect("node");
    let e = lhs.add_edge(p, p, LabelPattern::of([2_i64])).expect("loop");
    let found = all_matches(&host, &query("two", lhs, None));
    assert_eq!(found.len(), 1);
    let hit = found[0].edge(e).expect("bound loop");
    assert_eq!(host.store().edge(hit).map(|r| r.label.clone()), Some(Label::of([2_i64])));
}

#[test]
fn forbidden_edge_is_directed_and_binds_nothing() {
    let (mut host, ids) = blank_host(2);
    let edge = host.add_edge(ids[0], ids[1], Label::blank()).expect("edge");

    let mut lhs = Pattern::new();
    let a = lhs.add_node(LabelPattern::blank(), false).expect("a");
    let b = lhs.add_node(LabelPattern::blank(), false).expect("b");
    lhs.forbid_edge(a, b).expect("forbid");
    let rule = query("no-edge", lhs, None);

    let mut hook = NullTrace;
    let mut search = Search::new(&host, &rule, &EngineConfig::default(), &mut hook);
    let m = search.next_match().expect("reverse pair matches");
    assert_eq!(node_images(&m), vec![ids[1], ids[0]]);
    assert_eq!(m.edge_bindings().count(), 0);
    // Only the two node images are held; the tested edge stays free.
    let state = search.match_state();
    assert_eq!(state.held(), 2);
    assert!(state.edge_available(edge));
    assert!(!state.node_available(ids[0]));
    assert!(!state.node_available(ids[1]));
    assert!(search.next_match().is_none());
    assert!(search.match_state().is_clear());

    assert_eq!(all_matches(&host, &rule).len(), 1);
}

#[test]
fn root_pattern_nodes_only_match_roots() {
    let (mut host, ids) = blank_host(3);
    host.set_root(ids[2], true).expect("root");

    let mut lhs = Pattern::new();
    let p = lhs.add_node(LabelPattern::blank(), true).expect("root node");
    let found = all_matches(&host, &query("root", lhs, None));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].node(p), Some(ids[2]));
}

#[test]
fn images_are_injective() {
    let (mut host, ids) = blank_host(2);
    host.add_edge(ids[0], ids[1], Label::blank()).expect("edge");
    host.add_edge(ids[1], ids[0], Label::blank()).expect("edge");

    let mut lhs = Pattern::new();
    for _ in 0..3 {
        lhs.add_node(LabelPattern::blank(), false).expect("node");
    }
    assert!(all_matches(&host, &query("three", lhs, None)).is_empty());

    let mut lhs = Pattern::new();
    let a = lhs.add_node(LabelPattern::blank(), false).expect("a");
    let b = lhs.add_node(LabelPattern::blank(), false).expect("b");
    lhs.add_edge(a, b, LabelPattern::blank()).expect("ab");
    let found = all_matches(&host, &query("pair", lhs, None));
    assert_eq!(found.len(), 2);
    for m in &found {
        assert_ne!(m.node(a), m.node(b));
    }
}

#[test]
fn edge_predicate_reads_host_edges_without_binding_them() {
    let (mut host, ids) = blank_host(3);
    host.add_edge(ids[0], ids[1], Label::of(["link"])).expect("edge");

    let mut lhs = Pattern::new();
    let a = lhs.add_node(LabelPattern::blank(), false).expect("a");
    let b = lhs.add_node(LabelPattern::blank(), false).expect("b");
    let cond = Condition::not(Condition::Pred(Predicate::Edge {
        source: a,
        target: b,
        label: None,
    }));
    let found = all_matches(&host, &query("unlinked", lhs, Some(cond)));
    // Six ordered pairs, one of which is linked.
    assert_eq!(found.len(), 5);
    assert!(found
        .iter()
        .all(|m| !(m.node(a) == Some(ids[0]) && m.node(b) == Some(ids[1]))));
}

#[test]
fn failing_leaf_is_false_even_under_negation_and_is_logged() {
    let mut host = oilr_core::Host::new(oilr_core::DegreeCaps::default());
    host.add_node(Label::of([7_i64]), false);

    let mut lhs = Pattern::new();
    var_node(&mut lhs, "x", VarType::Int);
    let by_zero = Predicate::relational(
        RelOp::Greater,
        Expr::div(Expr::var("x"), Expr::Int(0)),
        Expr::Int(0),
    );
    let rule = query("by-zero", lhs, Some(Condition::not(by_zero.into())));

    let (found, logs) = capture_logs(|| all_matches(&host, &rule));
    assert!(found.is_empty());
    assert!(logs.contains("WARN"), "{logs}");
    assert!(logs.contains("predicate evaluation failed"), "{logs}");
}

#[test]
fn abandon_releases_a_half_finished_search() {
    let (mut host, ids) = blank_host(3);
    host.add_edge(ids[0], ids[1], Label::blank()).expect("edge");
    host.add_edge(ids[1], ids[2], Label::blank()).expect("edge");

    let mut lhs = Pattern::new();
    let a = lhs.add_node(LabelPattern::blank(), false).expect("a");
    let b = lhs.add_node(LabelPattern::blank(), false).expect("b");
    lhs.add_edge(a, b, LabelPattern::blank()).expect("ab");
    let rule = query("step", lhs, None);

    let mut hook = NullTrace;
    let mut search = Search::new(&host, &rule, &EngineConfig::default(), &mut hook);
    assert!(search.next_match().is_some());
    assert!(!search.match_state().is_clear());
    search.abandon();
    assert!(search.match_state().is_clear());
    assert!(search.next_match().is_none());
}

#[derive(Default)]
struct Counting {
    matched: usize,
    unmatched: usize,
}

impl TraceHook for Counting {
    fn begin_context(&mut self, _kind: &str, _name: Option<&str>) {}
    fn end_context(&mut self) {}
    fn record(&mut self, event: &TraceEvent) {
        match event {
            TraceEvent::NodeMatched { .. } | TraceEvent::EdgeMatched { .. } => self.matched += 1,
            TraceEvent::NodeUnmatched { .. } | TraceEvent::EdgeUnmatched { .. } => {
                self.unmatched += 1;
            }
            _ => {}
        }
    }
}

#[test]
fn match_events_balance_after_exhaustion() {
    let (mut host, ids) = blank_host(4);
    for w in ids.windows(2) {
        host.add_edge(w[0], w[1], Label::blank()).expect("edge");
    }
    let mut lhs = Pattern::new();
    let a = lhs.add_node(LabelPattern::blank(), false).expect("a");
    let b = lhs.add_node(LabelPattern::blank(), false).expect("b");
    lhs.add_edge(a, b, LabelPattern::blank()).expect("ab");
    let rule = query("walk", lhs, None);

    let config = EngineConfig::default().with_trace_matching(true);
    let mut hook = Counting::default();
    let count = Search::new(&host, &rule, &config, &mut hook).count();
    assert_eq!(count, 3);
    assert!(hook.matched > 0);
    assert_eq!(hook.matched, hook.unmatched);

    let mut silent = TraceRecorder::new();
    let quiet = Search::new(&host, &rule, &EngineConfig::default(), &mut silent).count();
    assert_eq!(quiet, 3);
    assert_eq!(silent.entries().len(), 0);
}
