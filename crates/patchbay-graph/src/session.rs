//! Session handle shared by every graph
//!
//! Bundles the plugin factory, the graph registry, the event bus and the
//! configuration. Cloning is cheap; clones share everything.

use crate::config::CoreConfig;
use crate::error::{GraphError, GraphResult};
use crate::events::EventBus;
use crate::graph::Graph;
use crate::node::Node;
use crate::plugin::{Plugin, PluginFactory};
use crate::registry::GraphRegistry;
use std::fmt;
use std::sync::Arc;
use tracing::error;

struct CoreInner {
    plugins: Box<dyn PluginFactory>,
    registry: GraphRegistry,
    events: EventBus,
    config: CoreConfig,
}

/// Session handle
#[derive(Clone)]
pub struct Core {
    inner: Arc<CoreInner>,
}

impl Core {
    /// Handle over a plugin factory with default configuration
    #[must_use]
    pub fn new(plugins: impl PluginFactory + 'static) -> Self {
        Self::with_config(plugins, CoreConfig::default())
    }

    /// Handle over a plugin factory
    #[must_use]
    pub fn with_config(plugins: impl PluginFactory + 'static, config: CoreConfig) -> Self {
        Self {
            inner: Arc::new(CoreInner {
                plugins: Box::new(plugins),
                registry: GraphRegistry::new(),
                events: EventBus::new(),
                config,
            }),
        }
    }

    /// Registry of live graphs
    #[must_use]
    pub fn registry(&self) -> &GraphRegistry {
        &self.inner.registry
    }

    /// Event bus
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    /// Plugin factory
    #[must_use]
    pub fn plugins(&self) -> &dyn PluginFactory {
        self.inner.plugins.as_ref()
    }

    /// Create a bare plugin instance
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownPlugin`] when nothing is registered under the id.
    pub fn create_plugin(&self, plugin_id: &str) -> GraphResult<Box<dyn Plugin>> {
        self.inner.plugins.create(plugin_id, self).ok_or_else(|| {
            error!(plugin = plugin_id, "failed to create plugin");
            GraphError::UnknownPlugin(plugin_id.to_owned())
        })
    }

    /// Create a node around a fresh plugin instance, without dynamic slots
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownPlugin`] or the slot declaration errors of
    /// [`Node::new`].
    pub fn instantiate(&self, plugin_id: &str) -> GraphResult<Node> {
        let plugin = self.create_plugin(plugin_id)?;
        Ok(Node::new(plugin)?.with_display_name(self.display_name(plugin_id)))
    }

    /// Display name of a plugin id, falling back to the id
    #[must_use]
    pub fn display_name(&self, plugin_id: &str) -> String {
        self.inner
            .plugins
            .display_name(plugin_id)
            .unwrap_or_else(|| plugin_id.to_owned())
    }

    /// New empty top-level graph
    #[must_use]
    pub fn new_graph(&self) -> Graph {
        Graph::new(self)
    }
}

impl fmt::Debug for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Core")
            .field("registry", &self.inner.registry)
            .field("events", &self.inner.events)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
