// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! Indexed search agrees with brute-force enumeration of injective morphisms
//! over random small hosts.

mod common;

use common::{all_matches, XorShift64};
use oilr_core::{DegreeCaps, Host, Label, LabelPattern, NodeId, PatEdge, Pattern, Rhs, Rule};

/// Pattern shape over blank labels.
struct Shape {
    name: &'static str,
    roots: &'static [bool],
    edges: &'static [(usize, usize)],
    forbidden: &'static [(usize, usize)],
    deleted: &'static [usize],
}

const SHAPES: &[Shape] = &[
    Shape {
        name: "triangle",
        roots: &[false, false, false],
        edges: &[(0, 1), (1, 2), (2, 0)],
        forbidden: &[],
        deleted: &[],
    },
    Shape {
        name: "parallel-and-loop",
        roots: &[false, false],
        edges: &[(0, 1), (0, 1), (0, 0)],
        forbidden: &[],
        deleted: &[],
    },
    Shape {
        name: "rooted-forbidden",
        roots: &[true, false],
        edges: &[],
        forbidden: &[(0, 1)],
        deleted: &[],
    },
    Shape {
        name: "delete-source",
        roots: &[false, false],
        edges: &[(0, 1)],
        forbidden: &[],
        deleted: &[0],
    },
    Shape {
        name: "double-loop",
        roots: &[false],
        edges: &[(0, 0), (0, 0)],
        forbidden: &[],
        deleted: &[],
    },
    Shape {
        name: "forbidden-both-ways",
        roots: &[false, false],
        edges: &[],
        forbidden: &[(0, 1), (1, 0)],
        deleted: &[],
    },
    Shape {
        name: "delete-looped",
        roots: &[false],
        edges: &[(0, 0)],
        forbidden: &[],
        deleted: &[0],
    },
    Shape {
        name: "path-into-root",
        roots: &[false, false, true],
        edges: &[(0, 1), (1, 2)],
        forbidden: &[(2, 0)],
        deleted: &[],
    },
];

/// Compiles `shape`; deleted nodes take their incident edges with them.
fn rule(shape: &Shape) -> Rule {
    let mut lhs = Pattern::new();
    let nodes: Vec<_> = shape
        .roots
        .iter()
        .map(|&root| lhs.add_node(LabelPattern::blank(), root).expect("node"))
        .collect();
    let edges: Vec<PatEdge> = shape
        .edges
        .iter()
        .map(|&(s, t)| lhs.add_edge(nodes[s], nodes[t], LabelPattern::blank()).expect("edge"))
        .collect();
    for &(s, t) in shape.forbidden {
        lhs.forbid_edge(nodes[s], nodes[t]).expect("forbid");
    }
    let mut rhs = Rhs::new();
    for (e, &(s, t)) in edges.iter().zip(shape.edges) {
        if shape.deleted.contains(&s) || shape.deleted.contains(&t) {
            rhs.delete_edge(*e);
        }
    }
    for &d in shape.deleted {
        rhs.delete_node(nodes[d]);
    }
    Rule::new(shape.name, lhs, None, rhs, DegreeCaps::default()).expect("rule")
}

fn random_host(rng: &mut XorShift64) -> Host {
    let mut host = Host::new(DegreeCaps::default());
    let n = 1 + rng.gen_range_usize(5);
    let ids: Vec<NodeId> = (0..n)
        .map(|_| host.add_node(Label::blank(), rng.gen_range_usize(3) == 0))
        .collect();
    for _ in 0..rng.gen_range_usize(9) {
        let s = ids[rng.gen_range_usize(n)];
        let t = ids[rng.gen_range_usize(n)];
        host.add_edge(s, t, Label::blank()).expect("live endpoints");
    }
    host
}

/// Number of injective ways to give each wanted `(src, tgt)` its own host edge.
fn edge_assignments(host: &Host, wanted: &[(NodeId, NodeId)], used: &mut [bool]) -> usize {
    let Some((&(s, t), rest)) = wanted.split_first() else {
        return 1;
    };
    let mut total = 0;
    for (i, (_, rec)) in host.store().iter_edges().enumerate() {
        if used[i] || rec.src != s || rec.tgt != t {
            continue;
        }
        used[i] = true;
        total += edge_assignments(host, rest, used);
        used[i] = false;
    }
    total
}

fn node_ok(host: &Host, shape: &Shape, p: usize, h: NodeId) -> bool {
    let Some(d) = host.store().degrees(h) else {
        return false;
    };
    if shape.roots[p] && !d.root {
        return false;
    }
    if !shape.deleted.contains(&p) {
        return true;
    }
    let (mut out, mut inc, mut loops) = (0, 0, 0);
    for &(s, t) in shape.edges {
        if s == t {
            loops += usize::from(s == p);
        } else {
            out += usize::from(s == p);
            inc += usize::from(t == p);
        }
    }
    (d.out, d.inc, d.loops) == (out, inc, loops)
}

/// Counts morphisms by trying every injective node map.
fn brute_count(host: &Host, shape: &Shape, image: &mut Vec<NodeId>) -> usize {
    let p = image.len();
    if p == shape.roots.len() {
        let linked = |s: NodeId, t: NodeId| {
            host.store()
                .iter_edges()
                .any(|(_, r)| r.src == s && r.tgt == t)
        };
        if shape
            .forbidden
            .iter()
            .any(|&(s, t)| linked(image[s], image[t]))
        {
            return 0;
        }
        let wanted: Vec<_> = shape
            .edges
            .iter()
            .map(|&(s, t)| (image[s], image[t]))
            .collect();
        let mut used = vec![false; host.store().iter_edges().count()];
        return edge_assignments(host, &wanted, &mut used);
    }
    let candidates: Vec<NodeId> = host.store().iter_nodes().map(|(id, _)| id).collect();
    let mut total = 0;
    for h in candidates {
        if image.contains(&h) || !node_ok(host, shape, p, h) {
            continue;
        }
        image.push(h);
        total += brute_count(host, shape, image);
        image.pop();
    }
    total
}

#[test]
fn indexed_search_agrees_with_brute_force() {
    let mut rng = XorShift64::new(0x0111_7e57);
    let rules: Vec<Rule> = SHAPES.iter().map(rule).collect();
    for round in 0..400 {
        let host = random_host(&mut rng);
        for (shape, rule) in SHAPES.iter().zip(&rules) {
            let found = all_matches(&host, rule);
            let expected = brute_count(&host, shape, &mut Vec::new());
            assert_eq!(
                found.len(),
                expected,
                "round {round}, shape {}: search and enumeration disagree",
                shape.name
            );
            let mut keys: Vec<_> = found
                .iter()
                .map(|m| {
                    let nodes: Vec<_> = m.node_bindings().map(|(_, n)| n).collect();
                    let edges: Vec<_> = m.edge_bindings().map(|(_, e)| e).collect();
                    (nodes, edges)
                })
                .collect();
            keys.sort_unstable();
            keys.dedup();
            assert_eq!(keys.len(), found.len(), "duplicate morphisms for {}", shape.name);
        }
    }
}
