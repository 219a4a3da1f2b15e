// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Trace hook: fire-and-forget notifications of matching and rewriting.
//!
//! The engine calls a [`TraceHook`] in the exact order edits are applied or
//! undone. Hooks cannot influence matching. Three implementations ship here:
//! [`NullTrace`] drops everything, [`LogTrace`] forwards events to `tracing`,
//! and [`TraceRecorder`] keeps an in-memory log with an explicit context stack.
use tracing::{debug, trace};

use crate::ident::{EdgeId, NodeId, PatEdge, PatNode};
use crate::label::{Label, Mark};
use crate::state::{violation, ViolationKind};

/// A single trace notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceEvent {
    /// A pattern node was bound.
    NodeMatched {
        /// Pattern node.
        pattern: PatNode,
        /// Host node.
        host: NodeId,
    },
    /// A pattern node binding was undone.
    NodeUnmatched {
        /// Pattern node.
        pattern: PatNode,
        /// Host node.
        host: NodeId,
    },
    /// A pattern edge was bound.
    EdgeMatched {
        /// Pattern edge.
        pattern: PatEdge,
        /// Host edge.
        host: EdgeId,
    },
    /// A pattern edge binding was undone.
    EdgeUnmatched {
        /// Pattern edge.
        pattern: PatEdge,
        /// Host edge.
        host: EdgeId,
    },
    /// Outcome of a rule match attempt.
    RuleMatch {
        /// Rule name.
        rule: String,
        /// Whether a match was found.
        success: bool,
    },
    /// A node was created.
    NodeCreated {
        /// New node.
        node: NodeId,
        /// Its label.
        label: Label,
        /// Its root flag.
        root: bool,
    },
    /// An edge was created.
    EdgeCreated {
        /// New edge.
        edge: EdgeId,
        /// Source node.
        src: NodeId,
        /// Target node.
        tgt: NodeId,
        /// Its label.
        label: Label,
    },
    /// A node was deleted.
    NodeDeleted {
        /// Deleted node.
        node: NodeId,
        /// Its last label.
        label: Label,
    },
    /// An edge was deleted.
    EdgeDeleted {
        /// Deleted edge.
        edge: EdgeId,
        /// Source node.
        src: NodeId,
        /// Target node.
        tgt: NodeId,
        /// Its last label.
        label: Label,
    },
    /// A node label changed.
    NodeRelabelled {
        /// Node.
        node: NodeId,
        /// Previous label.
        old: Label,
        /// New label.
        new: Label,
    },
    /// An edge label changed.
    EdgeRelabelled {
        /// Edge.
        edge: EdgeId,
        /// Previous label.
        old: Label,
        /// New label.
        new: Label,
    },
    /// A node mark changed.
    NodeRemarked {
        /// Node.
        node: NodeId,
        /// Previous mark.
        old: Mark,
        /// New mark.
        new: Mark,
    },
    /// An edge mark changed.
    EdgeRemarked {
        /// Edge.
        edge: EdgeId,
        /// Previous mark.
        old: Mark,
        /// New mark.
        new: Mark,
    },
    /// A node's root flag changed.
    RootChanged {
        /// Node.
        node: NodeId,
        /// New root flag.
        root: bool,
    },
}

/// Receiver of trace notifications.
pub trait TraceHook {
    /// Opens a nested context of the given kind (`"rule"`, `"loop"`, ...).
    fn begin_context(&mut self, kind: &str, name: Option<&str>);
    /// Closes the innermost open context.
    fn end_context(&mut self);
    /// Records one event.
    fn record(&mut self, event: &TraceEvent);
}

/// Hook that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTrace;

impl TraceHook for NullTrace {
    fn begin_context(&mut self, _kind: &str, _name: Option<&str>) {}
    fn end_context(&mut self) {}
    fn record(&mut self, _event: &TraceEvent) {}
}

/// Hook that forwards to `tracing` at `debug` (contexts, edits) and `trace`
/// (per-element matching).
#[derive(Clone, Debug, Default)]
pub struct LogTrace {
    depth: usize,
}

impl TraceHook for LogTrace {
    fn begin_context(&mut self, kind: &str, name: Option<&str>) {
        self.depth += 1;
        debug!(depth = self.depth, kind, name, "enter context");
    }

    fn end_context(&mut self) {
        debug!(depth = self.depth, "exit context");
        self.depth = self.depth.saturating_sub(1);
    }

    fn record(&mut self, event: &TraceEvent) {
        match event {
            TraceEvent::NodeMatched { .. }
            | TraceEvent::NodeUnmatched { .. }
            | TraceEvent::EdgeMatched { .. }
            | TraceEvent::EdgeUnmatched { .. } => trace!(depth = self.depth, ?event),
            _ => debug!(depth = self.depth, ?event),
        }
    }
}

/// One entry of a [`TraceRecorder`] log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceEntry {
    /// Context opened.
    Begin {
        /// Context kind.
        kind: String,
        /// Optional context name.
        name: Option<String>,
    },
    /// Context closed.
    End {
        /// Kind of the closed context.
        kind: String,
    },
    /// Event.
    Event(TraceEvent),
}

#[derive(Clone, Debug)]
struct OpenContext {
    kind: String,
}

/// In-memory trace with an explicit stack of open contexts.
#[derive(Clone, Debug, Default)]
pub struct TraceRecorder {
    stack: Vec<OpenContext>,
    entries: Vec<TraceEntry>,
}

impl TraceRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded entries in order.
    #[must_use]
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Recorded events only, in order.
    pub fn events(&self) -> impl Iterator<Item = &TraceEvent> {
        self.entries.iter().filter_map(|e| match e {
            TraceEntry::Event(ev) => Some(ev),
            _ => None,
        })
    }

    /// Number of currently open contexts.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Kinds of the open contexts, outermost first.
    pub fn open_kinds(&self) -> impl Iterator<Item = &str> {
        self.stack.iter().map(|c| c.kind.as_str())
    }

    /// Closes contexts down to, but not including, the innermost `loop`.
    ///
    /// Closes nothing when no `loop` context is open.
    pub fn trace_break(&mut self) {
        if let Some(pos) = self.stack.iter().rposition(|c| c.kind == "loop") {
            self.close_to(pos + 1);
        }
    }

    /// Unwinds after a failure.
    ///
    /// With `escape` unset nothing is closed. Otherwise contexts are closed down
    /// to, but not including, the innermost `condition` context; when
    /// `main_body` is set, or no `condition` context is open, everything but the
    /// outermost context is closed.
    pub fn trace_fail(&mut self, escape: bool, main_body: bool) {
        if !escape {
            return;
        }
        let keep = if main_body {
            None
        } else {
            self.stack.iter().rposition(|c| c.kind == "condition")
        };
        self.close_to(keep.map_or(1, |pos| pos + 1));
    }

    /// Closes every open context.
    pub fn finish(&mut self) {
        self.close_to(0);
    }

    fn close_to(&mut self, depth: usize) {
        while self.stack.len() > depth {
            self.end_context();
        }
    }
}

impl TraceHook for TraceRecorder {
    fn begin_context(&mut self, kind: &str, name: Option<&str>) {
        self.stack.push(OpenContext {
            kind: kind.to_owned(),
        });
        self.entries.push(TraceEntry::Begin {
            kind: kind.to_owned(),
            name: name.map(str::to_owned),
        });
    }

    /// # Panics
    /// Aborts with [`ViolationKind::ContextUnderflow`] when no context is open.
    fn end_context(&mut self) {
        let Some(ctx) = self.stack.pop() else {
            violation(ViolationKind::ContextUnderflow, None);
        };
        self.entries.push(TraceEntry::End { kind: ctx.kind });
    }

    fn record(&mut self, event: &TraceEvent) {
        self.entries.push(TraceEntry::Event(event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(r: &TraceRecorder) -> Vec<&str> {
        r.open_kinds().collect()
    }

    #[test]
    fn break_unwinds_to_the_innermost_loop() {
        let mut r = TraceRecorder::new();
        r.begin_context("procedure", Some("main"));
        r.begin_context("loop", None);
        r.begin_context("rule", Some("grow"));
        r.begin_context("condition", None);
        r.trace_break();
        assert_eq!(kinds(&r), vec!["procedure", "loop"]);
        let closed: Vec<_> = r
            .entries()
            .iter()
            .filter_map(|e| match e {
                TraceEntry::End { kind } => Some(kind.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(closed, vec!["condition", "rule"]);
    }

    #[test]
    fn fail_unwinds_to_condition_or_outermost() {
        let mut r = TraceRecorder::new();
        r.begin_context("procedure", None);
        r.begin_context("condition", None);
        r.begin_context("rule", None);
        r.trace_fail(false, false);
        assert_eq!(r.depth(), 3);
        r.trace_fail(true, false);
        assert_eq!(kinds(&r), vec!["procedure", "condition"]);
        r.begin_context("rule", None);
        r.trace_fail(true, true);
        assert_eq!(kinds(&r), vec!["procedure"]);
        r.finish();
        assert_eq!(r.depth(), 0);
    }

    #[test]
    fn events_are_kept_in_order() {
        let mut r = TraceRecorder::new();
        r.begin_context("rule", Some("r"));
        r.record(&TraceEvent::RootChanged {
            node: NodeId(0),
            root: true,
        });
        r.record(&TraceEvent::RuleMatch {
            rule: "r".into(),
            success: true,
        });
        r.end_context();
        assert_eq!(r.events().count(), 2);
        assert_eq!(r.entries().len(), 4);
    }
}
