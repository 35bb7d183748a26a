//! Plugin contract
//!
//! A plugin is the behaviour attached to a node: it declares the node's
//! static slots and receives the lifecycle and evaluation hooks. The graph
//! core never inspects what a plugin computes.

use crate::dynamic::DynamicSlots;
use crate::graph::Graph;
use crate::variables::Variables;
use patchbay_types::{ConnectionId, Slot, SlotRef, Value};
use std::any::Any;

/// Per-pass evaluation context
#[derive(Debug, Clone, Default)]
pub struct UpdateContext {
    /// Seconds since playback started
    pub abs_t: f64,
    /// Seconds since the previous pass
    pub delta_t: f64,
    /// Pass counter
    pub frame: u64,
    variables: Option<Variables>,
}

impl UpdateContext {
    /// Context for a pass at `abs_t`
    #[must_use]
    pub fn new(abs_t: f64, delta_t: f64, frame: u64) -> Self {
        Self {
            abs_t,
            delta_t,
            frame,
            variables: None,
        }
    }

    /// Move to the next pass
    pub fn advance(&mut self, delta_t: f64) {
        self.abs_t += delta_t;
        self.delta_t = delta_t;
        self.frame += 1;
    }

    /// Variables of the graph currently being evaluated
    #[must_use]
    pub fn variables(&self) -> Option<&Variables> {
        self.variables.as_ref()
    }

    pub(crate) fn scoped(&self, variables: &Variables) -> Self {
        Self {
            abs_t: self.abs_t,
            delta_t: self.delta_t,
            frame: self.frame,
            variables: Some(variables.clone()),
        }
    }
}

/// A connection touching one of a node's slots, seen from that node
#[derive(Debug, Clone, PartialEq)]
pub struct SlotLink {
    /// Connection id
    pub connection: ConnectionId,
    /// This node's slot
    pub own: SlotRef,
    /// Descriptor of the slot at the other end
    pub peer: Slot,
}

/// Notification that a connection to one of a node's slots changed
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionChange {
    /// `true` when attached, `false` when detached
    pub connected: bool,
    /// The connection itself
    pub link: SlotLink,
}

/// Behaviour attached to a node
pub trait Plugin: AsAny {
    /// Registry id this plugin was created under
    fn id(&self) -> &str;

    /// Static inputs, in index order
    fn input_slots(&self) -> Vec<Slot> {
        Vec::new()
    }

    /// Static outputs, in index order
    fn output_slots(&self) -> Vec<Slot> {
        Vec::new()
    }

    /// Create the dynamic slots a freshly placed node starts with
    fn create_slots(&mut self, _slots: &mut DynamicSlots) {}

    /// Return to the initial runtime state
    fn reset(&mut self) {}

    /// An input received a new value
    fn update_input(&mut self, _slot: &Slot, _value: Value) {}

    /// Sanitise a value before it reaches [`Plugin::update_input`]
    fn validate_input(&self, _slot: &Slot, value: Value) -> Value {
        value
    }

    /// Recompute internal state; returns whether outputs changed
    fn update_state(&mut self, _ctx: &UpdateContext) -> bool {
        false
    }

    /// Sample an output. `Value::Null` means no value.
    fn update_output(&mut self, slot: &Slot) -> Value;

    /// Finer-grained change test for one output
    fn query_output(&self, _slot: &Slot) -> bool {
        true
    }

    /// Whether an input is currently disabled
    fn input_inactive(&self, slot: &Slot) -> bool {
        slot.inactive
    }

    /// Re-evaluate on every pass regardless of inputs
    fn always_update(&self) -> bool {
        false
    }

    /// A connection to one of the node's slots was attached or detached
    fn connection_changed(&mut self, _slots: &mut DynamicSlots, _change: &ConnectionChange) {}

    /// Called once the node is linked into its graph
    fn initialise(&mut self, _slots: &mut DynamicSlots, _links: &[SlotLink]) {}

    /// Persistent state, if any
    fn state(&self) -> Option<serde_json::Value> {
        None
    }

    /// Replace persistent state
    ///
    /// # Errors
    ///
    /// Returns the parse error when the document does not match the state
    /// shape.
    fn set_state(&mut self, _state: serde_json::Value) -> Result<(), serde_json::Error> {
        Ok(())
    }

    /// Persistent state was replaced
    fn state_changed(&mut self) {}

    /// Playback started
    fn play(&mut self) {}

    /// Playback paused
    fn pause(&mut self) {}

    /// Playback stopped
    fn stop(&mut self) {}

    /// Node is being torn down
    fn destroy(&mut self) {}

    /// Inner graph of subgraph plugins
    fn graph(&self) -> Option<&Graph> {
        None
    }

    /// Inner graph of subgraph plugins
    fn graph_mut(&mut self) -> Option<&mut Graph> {
        None
    }

    /// Install a linked inner graph (subgraph plugins only)
    fn set_graph(&mut self, _graph: Graph) {}
}

/// Downcasting support for plugins
pub trait AsAny: Any {
    /// View as `Any`
    fn as_any(&self) -> &dyn Any;
    /// View as mutable `Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Creates plugins by id
///
/// The graph core consumes this collaborator; the plugin library
/// implements it.
pub trait PluginFactory: Send + Sync {
    /// Instantiate the plugin registered under `plugin_id`
    fn create(&self, plugin_id: &str, core: &crate::Core) -> Option<Box<dyn Plugin>>;

    /// Display name for a plugin id
    fn display_name(&self, _plugin_id: &str) -> Option<String> {
        None
    }
}

/// Copy the keys of `incoming` that already exist in `current`.
///
/// Saved state may carry keys a newer plugin no longer knows; those are
/// ignored.
#[must_use]
pub fn merge_known_keys(current: serde_json::Value, incoming: &serde_json::Value) -> serde_json::Value {
    match (current, incoming) {
        (serde_json::Value::Object(mut current), serde_json::Value::Object(incoming)) => {
            for (key, value) in incoming {
                if let Some(slot) = current.get_mut(key) {
                    *slot = value.clone();
                }
            }
            serde_json::Value::Object(current)
        }
        (current, _) => current,
    }
}
