//! Graph vertices
//!
//! A [`Node`] wraps one plugin instance together with the node-side
//! bookkeeping: decorated static slots, dynamic slots, attached
//! connections, user-set input values and the per-pass evaluation flags.

use crate::doc::{NodeDoc, SlotDoc};
use crate::dynamic::DynamicSlots;
use crate::error::{GraphError, GraphResult};
use crate::plugin::{ConnectionChange, Plugin, SlotLink};
use patchbay_types::{ConnectionId, Direction, GraphId, NodeId, Slot, SlotId, SlotRef, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Plugin id of entity subgraphs
pub const ENTITY_PLUGIN: &str = "entity";

/// A vertex wrapping one plugin
pub struct Node {
    pub(crate) uid: NodeId,
    pub(crate) plugin_id: String,
    pub(crate) display_name: String,
    pub(crate) parent_graph: Option<GraphId>,
    /// Horizontal position, presentation only
    pub x: f64,
    /// Vertical position, presentation only
    pub y: f64,
    pub(crate) title: Option<String>,
    pub(crate) open: bool,
    pub(crate) plugin: Box<dyn Plugin>,
    pub(crate) static_inputs: Vec<Slot>,
    pub(crate) static_outputs: Vec<Slot>,
    pub(crate) dynamic: DynamicSlots,
    pub(crate) inputs: Vec<ConnectionId>,
    pub(crate) outputs: Vec<ConnectionId>,
    pub(crate) input_values: HashMap<String, Value>,
    pub(crate) ui_slot_values: BTreeMap<String, Value>,
    pub(crate) update_count: u32,
    pub(crate) queued_update: u32,
    pub(crate) inputs_changed: bool,
    pub(crate) updated: bool,
}

impl Node {
    /// Wrap a plugin, decorating its static slots with index and direction
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicateSlotName`] when the plugin declares two
    /// static slots with the same name on one side.
    pub fn new(plugin: Box<dyn Plugin>) -> GraphResult<Self> {
        let plugin_id = plugin.id().to_owned();
        let static_inputs = decorate(&plugin_id, plugin.input_slots(), Direction::Input)?;
        let static_outputs = decorate(&plugin_id, plugin.output_slots(), Direction::Output)?;

        Ok(Self {
            uid: NodeId::new(),
            display_name: plugin_id.clone(),
            plugin_id,
            parent_graph: None,
            x: 0.0,
            y: 0.0,
            title: None,
            open: true,
            plugin,
            static_inputs,
            static_outputs,
            dynamic: DynamicSlots::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            input_values: HashMap::new(),
            ui_slot_values: BTreeMap::new(),
            update_count: 0,
            queued_update: 0,
            inputs_changed: false,
            updated: false,
        })
    }

    /// Reuse a known id
    #[inline]
    #[must_use]
    pub fn with_uid(mut self, uid: NodeId) -> Self {
        self.uid = uid;
        self
    }

    /// Set the position
    #[inline]
    #[must_use]
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the name shown when no title is set
    #[inline]
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Node id
    #[must_use]
    pub fn uid(&self) -> &NodeId {
        &self.uid
    }

    /// `<graph uid>.<node uid>`, or just the node uid when unparented
    #[must_use]
    pub fn full_uid(&self) -> String {
        match &self.parent_graph {
            Some(graph) => format!("{graph}.{}", self.uid),
            None => self.uid.to_string(),
        }
    }

    /// Plugin id
    #[must_use]
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Containing graph
    #[must_use]
    pub fn parent_graph(&self) -> Option<&GraphId> {
        self.parent_graph.as_ref()
    }

    /// Title override
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Title if set, else the plugin's display name
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.display_name)
    }

    /// Whether the node is expanded in the editor
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The wrapped plugin
    #[must_use]
    pub fn plugin(&self) -> &dyn Plugin {
        &*self.plugin
    }

    /// The wrapped plugin, mutably
    pub fn plugin_mut(&mut self) -> &mut dyn Plugin {
        &mut *self.plugin
    }

    /// Downcast the plugin
    #[must_use]
    pub fn plugin_as<T: Plugin>(&self) -> Option<&T> {
        let plugin: &dyn Plugin = &*self.plugin;
        plugin.as_any().downcast_ref::<T>()
    }

    /// Downcast the plugin mutably
    pub fn plugin_as_mut<T: Plugin>(&mut self) -> Option<&mut T> {
        let plugin: &mut dyn Plugin = &mut *self.plugin;
        plugin.as_any_mut().downcast_mut::<T>()
    }

    /// Whether the plugin owns an inner graph
    #[must_use]
    pub fn is_subgraph(&self) -> bool {
        self.plugin.graph().is_some()
    }

    /// Whether this is an entity subgraph
    #[must_use]
    pub fn is_entity_patch(&self) -> bool {
        self.plugin_id == ENTITY_PLUGIN
    }

    /// Static inputs in index order
    #[must_use]
    pub fn static_input_slots(&self) -> &[Slot] {
        &self.static_inputs
    }

    /// Static outputs in index order
    #[must_use]
    pub fn static_output_slots(&self) -> &[Slot] {
        &self.static_outputs
    }

    pub(crate) fn static_slots(&self, direction: Direction) -> &[Slot] {
        match direction {
            Direction::Input => &self.static_inputs,
            Direction::Output => &self.static_outputs,
        }
    }

    /// Whether a slot other than `except` already uses `name` on that side
    pub(crate) fn slot_name_taken(&self, direction: Direction, name: &str, except: Option<&SlotId>) -> bool {
        self.static_slots(direction)
            .iter()
            .chain(self.dynamic.ordered(direction))
            .any(|s| s.name == name && (except.is_none() || s.uid.as_ref() != except))
    }

    /// Dynamic slots
    #[must_use]
    pub fn dynamic_slots(&self) -> &DynamicSlots {
        &self.dynamic
    }

    /// Whether the node has any output slot, static or dynamic
    #[must_use]
    pub fn has_output_slots(&self) -> bool {
        !self.static_outputs.is_empty() || self.dynamic.count(Direction::Output) > 0
    }

    /// Incoming connections, ordered by destination slot index
    #[must_use]
    pub fn input_connections(&self) -> &[ConnectionId] {
        &self.inputs
    }

    /// Outgoing connections
    #[must_use]
    pub fn output_connections(&self) -> &[ConnectionId] {
        &self.outputs
    }

    /// Whether outputs changed during the current pass
    #[must_use]
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    /// Flag outputs as changed so consumers pick them up on the next pass
    pub fn mark_updated(&mut self) {
        self.updated = true;
    }

    /// Force `count` re-evaluations on upcoming passes
    pub fn queue_update(&mut self, count: u32) {
        self.queued_update = self.queued_update.max(count);
    }

    /// Outstanding forced re-evaluations
    #[must_use]
    pub fn queued_updates(&self) -> u32 {
        self.queued_update
    }

    /// Times visited during the current pass
    #[must_use]
    pub fn update_count(&self) -> u32 {
        self.update_count
    }

    /// Resolve a slot reference
    #[must_use]
    pub fn slot(&self, slot: &SlotRef) -> Option<&Slot> {
        match slot {
            SlotRef::Static {
                direction: Direction::Input,
                index,
            } => self.static_inputs.get(*index),
            SlotRef::Static {
                direction: Direction::Output,
                index,
            } => self.static_outputs.get(*index),
            SlotRef::Dynamic { direction, uid } => self.dynamic.find(*direction, uid),
        }
    }

    pub(crate) fn slot_mut(&mut self, slot: &SlotRef) -> Option<&mut Slot> {
        match slot {
            SlotRef::Static {
                direction: Direction::Input,
                index,
            } => self.static_inputs.get_mut(*index),
            SlotRef::Static {
                direction: Direction::Output,
                index,
            } => self.static_outputs.get_mut(*index),
            SlotRef::Dynamic { direction, uid } => self
                .dynamic
                .get_mut(uid)
                .filter(|s| s.direction == *direction),
        }
    }

    /// Input slot by name, static slots first
    #[must_use]
    pub fn find_input_slot_by_name(&self, name: &str) -> Option<&Slot> {
        self.find_slot_by_name(Direction::Input, name)
    }

    /// Output slot by name, static slots first
    #[must_use]
    pub fn find_output_slot_by_name(&self, name: &str) -> Option<&Slot> {
        self.find_slot_by_name(Direction::Output, name)
    }

    fn find_slot_by_name(&self, direction: Direction, name: &str) -> Option<&Slot> {
        let statics = match direction {
            Direction::Input => &self.static_inputs,
            Direction::Output => &self.static_outputs,
        };
        let found = statics
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.dynamic.find_by_name(direction, name));
        if found.is_none() {
            warn!(node = %self.uid, slot = name, %direction, "slot not found by name");
        }
        found
    }

    /// Dynamic slot by uid, either side
    #[must_use]
    pub fn find_slot_by_uid(&self, uid: &SlotId) -> Option<&Slot> {
        let found = self.dynamic.get(uid);
        if found.is_none() {
            warn!(node = %self.uid, slot = %uid, "slot not found by uid");
        }
        found
    }

    /// Dynamic slot by uid on one side
    #[must_use]
    pub fn find_dynamic_slot(&self, direction: Direction, uid: &SlotId) -> Option<&Slot> {
        self.dynamic.find(direction, uid)
    }

    /// Explicit default of the slot, else its datatype's zero value
    #[must_use]
    pub fn default_slot_value(&self, slot: &Slot) -> Value {
        slot.default_value()
    }

    /// User-set value of an input, falling back to its default
    #[must_use]
    pub fn ui_slot_value(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.ui_slot_values.get(name) {
            return Some(value.clone());
        }
        self.find_input_slot_by_name(name).map(Slot::default_value)
    }

    /// Value the input currently holds
    #[must_use]
    pub fn input_slot_value(&self, name: &str) -> Option<Value> {
        match self.input_values.get(name) {
            Some(value) => Some(value.clone()),
            None => self.ui_slot_value(name),
        }
    }

    /// All user-set input values
    #[must_use]
    pub fn ui_slot_values(&self) -> &BTreeMap<String, Value> {
        &self.ui_slot_values
    }

    /// Set a user value on an input and deliver it to the plugin.
    ///
    /// A value equal to the slot's explicit default removes the overlay
    /// entry. Returns `false` when no input has that name.
    pub fn set_input_slot_value(&mut self, name: &str, value: Value) -> bool {
        let Some(slot) = self.find_input_slot_by_name(name).cloned() else {
            return false;
        };

        if slot.default.as_ref() == Some(&value) {
            self.ui_slot_values.remove(name);
        } else {
            self.ui_slot_values.insert(name.to_owned(), value.clone());
        }

        self.updated = true;
        self.input_values.insert(slot.name.clone(), value.clone());
        self.plugin.update_input(&slot, value);
        true
    }

    /// Replace one key of the plugin's state
    ///
    /// # Errors
    ///
    /// [`GraphError::InvalidState`] when the plugin rejects the new state.
    pub fn set_plugin_state(&mut self, key: &str, value: serde_json::Value) -> GraphResult<()> {
        let mut state = match self.plugin.state() {
            Some(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        state.insert(key.to_owned(), value);

        self.plugin
            .set_state(serde_json::Value::Object(state))
            .map_err(|source| GraphError::InvalidState {
                plugin: self.plugin_id.clone(),
                source,
            })?;
        self.plugin.state_changed();
        self.updated = true;
        Ok(())
    }

    /// Enable or disable an input
    pub fn set_slot_inactive(&mut self, slot: &SlotRef, inactive: bool) -> bool {
        match self.slot_mut(slot) {
            Some(s) if s.direction == Direction::Input => {
                s.inactive = inactive;
                true
            }
            _ => false,
        }
    }

    /// Reset inputs to their defaults, reset the plugin and reapply user
    /// values
    pub fn reset(&mut self) {
        self.input_values.clear();
        let defaults: Vec<(String, Value)> = self
            .static_inputs
            .iter()
            .chain(self.dynamic.ordered(Direction::Input))
            .map(|s| (s.name.clone(), s.default_value()))
            .collect();
        self.input_values.extend(defaults);

        self.plugin.reset();

        let overlay: Vec<(String, Value)> = self
            .ui_slot_values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, value) in overlay {
            if let Some(slot) = self.find_input_slot_by_name(&name).cloned() {
                self.input_values.insert(name, value.clone());
                self.plugin.update_input(&slot, value);
            }
        }

        self.updated = true;
    }

    pub(crate) fn create_slots(&mut self) {
        self.plugin.create_slots(&mut self.dynamic);
    }

    pub(crate) fn initialise(&mut self, links: &[SlotLink]) {
        self.plugin.state_changed();
        self.plugin.initialise(&mut self.dynamic, links);
        if let Some(graph) = self.plugin.graph_mut() {
            graph.initialise();
        }
    }

    pub(crate) fn connection_changed(&mut self, change: &ConnectionChange) {
        self.plugin.connection_changed(&mut self.dynamic, change);
    }

    pub(crate) fn set_slot_connected(&mut self, slot: &SlotRef, connected: bool) {
        if let Some(s) = self.slot_mut(slot) {
            s.connected = connected;
        }
    }

    /// Persistent form; `flat` omits nested graphs
    #[must_use]
    pub fn serialise(&self, flat: bool) -> NodeDoc {
        NodeDoc {
            plugin: self.plugin_id.clone(),
            x: self.x.round(),
            y: self.y.round(),
            uid: self.uid.clone(),
            ui_slot_values: self.ui_slot_values.clone(),
            open: (!self.open).then_some(false),
            state: self.plugin.state(),
            title: self.title.clone(),
            graph: if flat {
                None
            } else {
                self.plugin.graph().map(|g| Box::new(g.serialise()))
            },
            dyn_in: self
                .dynamic
                .ordered(Direction::Input)
                .map(SlotDoc::from)
                .collect(),
            dyn_out: self
                .dynamic
                .ordered(Direction::Output)
                .map(SlotDoc::from)
                .collect(),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("uid", &self.uid)
            .field("plugin", &self.plugin_id)
            .field("title", &self.title)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("dynamic_slots", &self.dynamic.len())
            .field("updated", &self.updated)
            .finish_non_exhaustive()
    }
}

fn decorate(plugin_id: &str, slots: Vec<Slot>, direction: Direction) -> GraphResult<Vec<Slot>> {
    let mut names = HashSet::new();
    slots
        .into_iter()
        .enumerate()
        .map(|(index, mut slot)| {
            if !names.insert(slot.name.clone()) {
                return Err(GraphError::DuplicateSlotName {
                    plugin: plugin_id.to_owned(),
                    name: slot.name,
                    direction,
                });
            }
            slot.index = index;
            slot.direction = direction;
            slot.uid = None;
            slot.connected = false;
            Ok(slot)
        })
        .collect::<GraphResult<Vec<_>>>()
        .map(|slots| {
            debug!(plugin = plugin_id, %direction, count = slots.len(), "decorated slots");
            slots
        })
}
