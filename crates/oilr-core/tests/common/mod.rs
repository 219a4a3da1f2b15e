// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use oilr_core::{
    Condition, DegreeCaps, EngineConfig, Host, Label, LabelItem, LabelPattern, Morphism, NodeId,
    NullTrace, PatNode, Pattern, Rhs, Rule, Search, VarType,
};

/// Tiny deterministic RNG (xorshift64*) so tests don't need `rand`.
#[derive(Clone)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// Zero seeds are replaced with 1.
    pub fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Value in `[0, upper)`; modulo bias is fine for tests.
    pub fn gen_range_usize(&mut self, upper: usize) -> usize {
        if upper <= 1 {
            return 0;
        }
        (self.next_u64() as usize) % upper
    }
}

/// Installs a fmt subscriber writing through the test harness. Filtering
/// follows `RUST_LOG`; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` under a thread-local subscriber and returns its formatted output.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buf = SharedBuf::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    let bytes = buf.0.lock().unwrap_or_else(PoisonError::into_inner).clone();
    (out, String::from_utf8_lossy(&bytes).into_owned())
}

/// Host with `n` blank, unrooted nodes.
pub fn blank_host(n: usize) -> (Host, Vec<NodeId>) {
    let mut host = Host::new(DegreeCaps::default());
    let ids = (0..n).map(|_| host.add_node(Label::blank(), false)).collect();
    (host, ids)
}

/// Host node labelled with a single string atom.
pub fn str_node(host: &mut Host, s: &str) -> NodeId {
    host.add_node(Label::of([s]), false)
}

/// Pattern node whose label is one variable of type `ty`.
pub fn var_node(lhs: &mut Pattern, name: &str, ty: VarType) -> PatNode {
    lhs.declare(name, ty).expect("declare");
    lhs.add_node(LabelPattern::of([LabelItem::var(name)]), false)
        .expect("pattern node")
}

/// Compiles a read-only rule for the default caps.
pub fn query(name: &str, lhs: Pattern, condition: Option<Condition>) -> Rule {
    Rule::new(name, lhs, condition, Rhs::new(), DegreeCaps::default()).expect("compile rule")
}

/// Every match of `rule` in `host`, with the default configuration.
pub fn all_matches(host: &Host, rule: &Rule) -> Vec<Morphism> {
    let mut hook = NullTrace;
    let mut search = Search::new(host, rule, &EngineConfig::default(), &mut hook);
    let found: Vec<_> = search.by_ref().collect();
    assert!(search.match_state().is_clear(), "exhausted search must hold nothing");
    found
}

/// Node images of a morphism, in pattern order.
pub fn node_images(m: &Morphism) -> Vec<NodeId> {
    m.node_bindings().map(|(_, n)| n).collect()
}
