//! Core configuration

use serde::{Deserialize, Serialize};

/// Behaviour switches of the graph core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Publish [`GraphEvent::FlowChanged`](crate::GraphEvent::FlowChanged)
    /// whenever a connection's flow flag toggles during evaluation
    pub emit_flow_events: bool,
    /// Apply legacy rewrites (renamed plugin ids, entity promotion) on load
    pub legacy_compat: bool,
}

impl CoreConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable flow events
    #[inline]
    #[must_use]
    pub fn with_flow_events(mut self, enabled: bool) -> Self {
        self.emit_flow_events = enabled;
        self
    }

    /// Enable or disable legacy document rewrites
    #[inline]
    #[must_use]
    pub fn with_legacy_compat(mut self, enabled: bool) -> Self {
        self.legacy_compat = enabled;
        self
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            emit_flow_events: true,
            legacy_compat: true,
        }
    }
}
