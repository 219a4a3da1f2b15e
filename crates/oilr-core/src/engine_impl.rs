// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine: rule registry, match driver and right-hand-side application.
use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::condition::Condition;
use crate::config::EngineConfig;
use crate::expr::EvalError;
use crate::host::{Host, HostError};
use crate::ident::{EdgeId, NodeId, PatEdge, PatNode, RuleId};
use crate::label::{Label, Mark};
use crate::morphism::Morphism;
use crate::pattern::Pattern;
use crate::rule::{NodeRef, Rhs, RhsOp, Rule, RuleError};
use crate::search::Search;
use crate::trace::{NullTrace, TraceEvent, TraceHook};

/// Result of calling [`Engine::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// The rule matched and its right-hand side was applied.
    Applied(Rewrite),
    /// The rule has no match in the host.
    NoMatch,
}

/// Elements created by one rule application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewrite {
    /// New nodes, in right-hand-side order.
    pub created_nodes: Vec<NodeId>,
    /// New edges, in right-hand-side order.
    pub created_edges: Vec<EdgeId>,
}

/// Errors emitted by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A rule was requested that has not been registered with the engine.
    #[error("rule not registered: {0}")]
    UnknownRule(String),
    /// Attempted to register a rule with a duplicate name.
    #[error("duplicate rule name: {0}")]
    DuplicateRuleName(String),
    /// Attempted to register a rule with a duplicate ID.
    #[error("duplicate rule id: {0}")]
    DuplicateRuleId(RuleId),
    /// The rule's plan was compiled for different degree caps than the host.
    #[error("rule {0} was compiled for different degree caps")]
    CapsMismatch(String),
    /// Rule compilation failed.
    #[error(transparent)]
    Rule(#[from] RuleError),
    /// The morphism does not bind a pattern node.
    #[error("morphism leaves pattern node {0:?} unbound")]
    UnboundNode(PatNode),
    /// The morphism does not bind a pattern edge.
    #[error("morphism leaves pattern edge {0:?} unbound")]
    UnboundEdge(PatEdge),
    /// A right-hand-side label could not be computed.
    #[error(transparent)]
    Eval(#[from] EvalError),
    /// A host primitive refused an edit.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Rewrite engine over a single host graph.
///
/// Matching borrows the host immutably; the right-hand side is applied only
/// after a complete match, through the [`Host`] primitives, so the degree index
/// stays consistent.
pub struct Engine<H: TraceHook = NullTrace> {
    host: Host,
    rules: HashMap<String, Rule>,
    rules_by_id: HashMap<RuleId, String>,
    config: EngineConfig,
    trace: H,
}

impl Engine<NullTrace> {
    /// Creates an engine with an empty host and no trace output.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_trace(config, NullTrace)
    }
}

impl<H: TraceHook> Engine<H> {
    /// Creates an engine with an empty host reporting to `trace`.
    pub fn with_trace(config: EngineConfig, trace: H) -> Self {
        Self {
            host: Host::new(config.caps),
            rules: HashMap::new(),
            rules_by_id: HashMap::new(),
            config,
            trace,
        }
    }

    /// Replaces the host graph.
    ///
    /// # Errors
    /// Returns [`EngineError::CapsMismatch`] if the host index uses different
    /// caps than the engine configuration.
    pub fn set_host(&mut self, host: Host) -> Result<Host, EngineError> {
        if host.index().caps() != self.config.caps {
            return Err(EngineError::CapsMismatch("<host>".to_owned()));
        }
        Ok(std::mem::replace(&mut self.host, host))
    }

    /// Registers a compiled rule.
    ///
    /// # Errors
    /// Returns [`EngineError::DuplicateRuleName`] or
    /// [`EngineError::DuplicateRuleId`] if already registered, or
    /// [`EngineError::CapsMismatch`] if the rule was compiled for other caps.
    pub fn register_rule(&mut self, rule: Rule) -> Result<RuleId, EngineError> {
        if self.rules.contains_key(rule.name()) {
            return Err(EngineError::DuplicateRuleName(rule.name().to_owned()));
        }
        if self.rules_by_id.contains_key(&rule.id()) {
            return Err(EngineError::DuplicateRuleId(rule.id()));
        }
        if rule.plan().caps() != self.config.caps {
            return Err(EngineError::CapsMismatch(rule.name().to_owned()));
        }
        let id = rule.id();
        debug!(rule = rule.name(), id = %id, steps = rule.plan().len(), "registered rule");
        self.rules_by_id.insert(id, rule.name().to_owned());
        self.rules.insert(rule.name().to_owned(), rule);
        Ok(id)
    }

    /// Compiles a rule with the engine's caps and registers it.
    ///
    /// # Errors
    /// Any [`RuleError`] from compilation, or a registration error.
    pub fn define_rule(
        &mut self,
        name: &str,
        lhs: Pattern,
        condition: Option<Condition>,
        rhs: Rhs,
    ) -> Result<RuleId, EngineError> {
        let rule = Rule::new(name, lhs, condition, rhs, self.config.caps)?;
        self.register_rule(rule)
    }

    /// Registered rule by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// Registered rule by id.
    #[must_use]
    pub fn rule_by_id(&self, id: RuleId) -> Option<&Rule> {
        self.rules_by_id.get(&id).and_then(|name| self.rules.get(name))
    }

    /// Starts a re-entrant search for `name`'s matches.
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownRule`] if the rule is not registered.
    pub fn search(&mut self, name: &str) -> Result<Search<'_>, EngineError> {
        let rule = self
            .rules
            .get(name)
            .ok_or_else(|| EngineError::UnknownRule(name.to_owned()))?;
        Ok(Search::new(&self.host, rule, &self.config, &mut self.trace))
    }

    /// First match of `name`, if any.
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownRule`] if the rule is not registered.
    pub fn find_match(&mut self, name: &str) -> Result<Option<Morphism>, EngineError> {
        Ok(self.search(name)?.next_match())
    }

    /// Every match of `name`, in search order.
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownRule`] if the rule is not registered.
    pub fn find_all(&mut self, name: &str) -> Result<Vec<Morphism>, EngineError> {
        Ok(self.search(name)?.collect())
    }

    /// Finds the first match of `name` and applies its right-hand side.
    ///
    /// The attempt runs inside a `rule` trace context and reports a rule-match
    /// event before any edit.
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownRule`] for an unregistered rule, or the
    /// first error raised while applying the right-hand side.
    #[instrument(skip(self), fields(rule = %name))]
    pub fn apply(&mut self, name: &str) -> Result<ApplyResult, EngineError> {
        let rule = self
            .rules
            .get(name)
            .ok_or_else(|| EngineError::UnknownRule(name.to_owned()))?;
        self.trace.begin_context("rule", Some(name));
        let found = Search::new(&self.host, rule, &self.config, &mut self.trace).next_match();
        self.trace.record(&TraceEvent::RuleMatch {
            rule: name.to_owned(),
            success: found.is_some(),
        });
        let result = match found {
            None => Ok(ApplyResult::NoMatch),
            Some(m) => rewrite(&mut self.host, rule, &m, &mut self.trace).map(ApplyResult::Applied),
        };
        self.trace.end_context();
        debug!(applied = matches!(result, Ok(ApplyResult::Applied(_))), "rule attempt finished");
        result
    }

    /// Applies `name`'s right-hand side under a morphism found earlier.
    ///
    /// The rewrite is not transactional: a failing edit leaves earlier edits
    /// in place.
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownRule`] for an unregistered rule,
    /// [`EngineError::UnboundNode`]/[`EngineError::UnboundEdge`] for a partial
    /// morphism, or the first evaluation or host error.
    pub fn apply_match(&mut self, name: &str, m: &Morphism) -> Result<Rewrite, EngineError> {
        let rule = self
            .rules
            .get(name)
            .ok_or_else(|| EngineError::UnknownRule(name.to_owned()))?;
        rewrite(&mut self.host, rule, m, &mut self.trace)
    }

    /// The host graph.
    #[must_use]
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Mutable host access; edits still go through the index-maintaining
    /// primitives.
    pub fn host_mut(&mut self) -> &mut Host {
        &mut self.host
    }

    /// Consumes the engine, returning the host graph.
    #[must_use]
    pub fn into_host(self) -> Host {
        self.host
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The trace hook.
    #[must_use]
    pub fn trace(&self) -> &H {
        &self.trace
    }

    /// The trace hook, mutably.
    pub fn trace_mut(&mut self) -> &mut H {
        &mut self.trace
    }
}

impl<H: TraceHook> core::fmt::Debug for Engine<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Engine")
            .field("nodes", &self.host.store().node_count())
            .field("edges", &self.host.store().edge_count())
            .field("rules", &names)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

enum Update {
    NodeLabel(NodeId, Label),
    EdgeLabel(EdgeId, Label),
    NodeMark(NodeId, Mark),
    EdgeMark(EdgeId, Mark),
    Root(NodeId, bool),
}

/// Applies `rule`'s right-hand side under `m`.
///
/// Every label is computed against the host as matched, then edits run in
/// phases: edge deletions, in-place updates, node deletions, node creations,
/// edge creations.
fn rewrite(
    host: &mut Host,
    rule: &Rule,
    m: &Morphism,
    hook: &mut dyn TraceHook,
) -> Result<Rewrite, EngineError> {
    let node = |p: PatNode| m.node(p).ok_or(EngineError::UnboundNode(p));
    let edge = |p: PatEdge| m.edge(p).ok_or(EngineError::UnboundEdge(p));

    let store = host.store();
    let mut edge_deletes = Vec::new();
    let mut updates = Vec::new();
    let mut node_deletes = Vec::new();
    let mut node_adds = Vec::new();
    let mut edge_adds = Vec::new();
    for op in rule.rhs().ops() {
        match op {
            RhsOp::DeleteEdge(e) => edge_deletes.push(edge(*e)?),
            RhsOp::DeleteNode(n) => node_deletes.push(node(*n)?),
            RhsOp::RelabelNode(n, label) => {
                updates.push(Update::NodeLabel(node(*n)?, label.eval(store, m)?));
            }
            RhsOp::RelabelEdge(e, label) => {
                updates.push(Update::EdgeLabel(edge(*e)?, label.eval(store, m)?));
            }
            RhsOp::RemarkNode(n, mark) => updates.push(Update::NodeMark(node(*n)?, *mark)),
            RhsOp::RemarkEdge(e, mark) => updates.push(Update::EdgeMark(edge(*e)?, *mark)),
            RhsOp::SetRoot(n, root) => updates.push(Update::Root(node(*n)?, *root)),
            RhsOp::AddNode { label, root } => node_adds.push((label.eval(store, m)?, *root)),
            RhsOp::AddEdge { src, tgt, label } => {
                edge_adds.push((*src, *tgt, label.eval(store, m)?));
            }
        }
    }

    for e in edge_deletes {
        let rec = host.delete_edge(e)?;
        hook.record(&TraceEvent::EdgeDeleted {
            edge: e,
            src: rec.src,
            tgt: rec.tgt,
            label: rec.label,
        });
    }
    for update in updates {
        let event = match update {
            Update::NodeLabel(n, label) => {
                let old = host.relabel_node(n, label.clone())?;
                TraceEvent::NodeRelabelled { node: n, old, new: label }
            }
            Update::EdgeLabel(e, label) => {
                let old = host.relabel_edge(e, label.clone())?;
                TraceEvent::EdgeRelabelled { edge: e, old, new: label }
            }
            Update::NodeMark(n, mark) => {
                let old = host.remark_node(n, mark)?;
                TraceEvent::NodeRemarked { node: n, old, new: mark }
            }
            Update::EdgeMark(e, mark) => {
                let old = host.remark_edge(e, mark)?;
                TraceEvent::EdgeRemarked { edge: e, old, new: mark }
            }
            Update::Root(n, root) => {
                host.set_root(n, root)?;
                TraceEvent::RootChanged { node: n, root }
            }
        };
        hook.record(&event);
    }
    for n in node_deletes {
        let rec = host.delete_node(n)?;
        hook.record(&TraceEvent::NodeDeleted {
            node: n,
            label: rec.label,
        });
    }

    let mut out = Rewrite::default();
    for (label, root) in node_adds {
        let id = host.add_node(label.clone(), root);
        hook.record(&TraceEvent::NodeCreated { node: id, label, root });
        out.created_nodes.push(id);
    }
    for (src, tgt, label) in edge_adds {
        let resolve = |r: NodeRef| match r {
            NodeRef::Lhs(p) => node(p),
            NodeRef::Created(i) => out
                .created_nodes
                .get(i)
                .copied()
                .ok_or(EngineError::Rule(RuleError::UnknownCreatedNode(i))),
        };
        let (s, t) = (resolve(src)?, resolve(tgt)?);
        let id = host.add_edge(s, t, label.clone())?;
        hook.record(&TraceEvent::EdgeCreated {
            edge: id,
            src: s,
            tgt: t,
            label,
        });
        out.created_edges.push(id);
    }
    debug!(
        rule = rule.name(),
        created_nodes = out.created_nodes.len(),
        created_edges = out.created_edges.len(),
        "rewrite applied"
    );
    Ok(out)
}
