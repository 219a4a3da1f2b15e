// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine configuration.
use crate::index::DegreeCaps;

/// Knobs for an [`crate::Engine`] and the searches it runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Saturation caps for the host's degree index.
    pub caps: DegreeCaps,
    /// Send per-element match/unmatch events to the trace hook.
    pub trace_matching: bool,
    /// Re-derive each candidate's degree class while scanning and abort on a
    /// stale bucket.
    pub verify_buckets: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            caps: DegreeCaps::default(),
            trace_matching: false,
            verify_buckets: true,
        }
    }
}

impl EngineConfig {
    /// Returns the config with different degree caps.
    pub fn with_caps(mut self, caps: DegreeCaps) -> Self {
        self.caps = caps;
        self
    }

    /// Returns the config with per-element trace events toggled.
    pub fn with_trace_matching(mut self, on: bool) -> Self {
        self.trace_matching = on;
        self
    }

    /// Returns the config with bucket verification toggled.
    pub fn with_verify_buckets(mut self, on: bool) -> Self {
        self.verify_buckets = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let cfg = EngineConfig::default()
            .with_trace_matching(true)
            .with_verify_buckets(false)
            .with_caps(DegreeCaps {
                out: 1,
                inc: 1,
                loops: 0,
            });
        assert!(cfg.trace_matching);
        assert!(!cfg.verify_buckets);
        assert_eq!(cfg.caps.out, 1);
        assert_eq!(EngineConfig::default().caps, DegreeCaps::default());
    }
}
