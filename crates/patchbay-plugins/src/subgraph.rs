//! Nested graphs
//!
//! A subgraph node owns an inner [`Graph`] and evaluates it whenever the
//! outer pass runs the node. Values cross the boundary through proxy
//! nodes: every dynamic input of the outer node has an [`InputProxy`]
//! inside, every dynamic output an [`OutputProxy`]. The plugin state maps
//! proxy node ids to outer slot ids.

use patchbay_graph::prelude::*;
use patchbay_graph::ENTITY_PLUGIN;
use patchbay_types::SlotId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Plugin id of generic subgraphs
pub const GRAPH_PLUGIN: &str = "graph";
/// Plugin id of the inner end of a subgraph input
pub const INPUT_PROXY: &str = "input_proxy";
/// Plugin id of the inner end of a subgraph output
pub const OUTPUT_PROXY: &str = "output_proxy";

/// Persistent state of a subgraph node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubgraphState {
    /// Evaluate the inner graph on every pass
    pub always_update: bool,
    /// Input proxy node id to outer input slot id
    pub input_sids: BTreeMap<String, String>,
    /// Output proxy node id to outer output slot id
    pub output_sids: BTreeMap<String, String>,
}

/// Owns and evaluates an inner graph
#[derive(Debug)]
pub struct Subgraph {
    id: &'static str,
    /// Persistent state
    pub state: SubgraphState,
    graph: Graph,
    pending: Vec<(NodeId, Value)>,
    outputs: HashMap<String, Value>,
}

impl Subgraph {
    /// Generic subgraph with an empty inner graph
    #[must_use]
    pub fn new(core: &Core) -> Self {
        Self::with_id(GRAPH_PLUGIN, core)
    }

    /// Entity subgraph with an empty inner graph
    #[must_use]
    pub fn entity(core: &Core) -> Self {
        Self::with_id(ENTITY_PLUGIN, core)
    }

    fn with_id(id: &'static str, core: &Core) -> Self {
        Self {
            id,
            state: SubgraphState::default(),
            graph: core.new_graph(),
            pending: Vec::new(),
            outputs: HashMap::new(),
        }
    }

    /// Last value published on an outer output
    #[must_use]
    pub fn output_value(&self, slot: &SlotId) -> Option<&Value> {
        self.outputs.get(slot.as_str())
    }

    fn deliver_pending(&mut self) {
        for (proxy, value) in self.pending.drain(..) {
            match self
                .graph
                .node_mut(&proxy)
                .and_then(|n| n.plugin_as_mut::<InputProxy>())
            {
                Some(input) => input.set(value),
                None => warn!(graph = %self.graph.uid(), %proxy, "input proxy missing"),
            }
        }
    }

    fn collect_outputs(&mut self) -> bool {
        let mut changed = false;
        for (proxy, sid) in &self.state.output_sids {
            let value = self
                .graph
                .node_mut(&NodeId::from(proxy.as_str()))
                .and_then(|n| n.plugin_as_mut::<OutputProxy>())
                .and_then(OutputProxy::take);
            if let Some(value) = value {
                self.outputs.insert(sid.clone(), value);
                changed = true;
            }
        }
        changed
    }
}

impl Plugin for Subgraph {
    fn id(&self) -> &str {
        self.id
    }

    fn always_update(&self) -> bool {
        self.state.always_update
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.outputs.clear();
        self.graph.reset();
    }

    fn update_input(&mut self, slot: &Slot, value: Value) {
        let Some(uid) = slot.uid.as_ref() else {
            return;
        };
        let proxy = self
            .state
            .input_sids
            .iter()
            .find(|(_, sid)| sid.as_str() == uid.as_str())
            .map(|(proxy, _)| NodeId::from(proxy.as_str()));
        match proxy {
            Some(proxy) => self.pending.push((proxy, value)),
            None => debug!(slot = %uid, "subgraph input has no proxy"),
        }
    }

    fn update_state(&mut self, ctx: &UpdateContext) -> bool {
        self.deliver_pending();
        let dirty = self.graph.update(ctx);
        self.collect_outputs() || dirty
    }

    fn update_output(&mut self, slot: &Slot) -> Value {
        slot.uid
            .as_ref()
            .and_then(|uid| self.outputs.get(uid.as_str()))
            .cloned()
            .unwrap_or_default()
    }

    fn state(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.state).ok()
    }

    fn set_state(&mut self, state: serde_json::Value) -> Result<(), serde_json::Error> {
        self.state = serde_json::from_value(state)?;
        Ok(())
    }

    fn play(&mut self) {
        self.graph.play();
    }

    fn pause(&mut self) {
        self.graph.pause();
    }

    fn stop(&mut self) {
        self.graph.stop();
    }

    fn destroy(&mut self) {
        self.graph.destroy();
    }

    fn graph(&self) -> Option<&Graph> {
        Some(&self.graph)
    }

    fn graph_mut(&mut self) -> Option<&mut Graph> {
        Some(&mut self.graph)
    }

    fn set_graph(&mut self, graph: Graph) {
        self.graph = graph;
    }
}

/// Inner end of a subgraph input
#[derive(Debug, Default)]
pub struct InputProxy {
    value: Value,
    changed: bool,
}

impl InputProxy {
    /// Publish a value on the next pass
    pub fn set(&mut self, value: Value) {
        self.value = value;
        self.changed = true;
    }
}

impl Plugin for InputProxy {
    fn id(&self) -> &str {
        INPUT_PROXY
    }

    fn output_slots(&self) -> Vec<Slot> {
        vec![Slot::output("input", DataType::Any)]
    }

    fn reset(&mut self) {
        self.changed = !self.value.is_null();
    }

    fn update_state(&mut self, _ctx: &UpdateContext) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        self.value.clone()
    }
}

/// Inner end of a subgraph output
#[derive(Debug, Default)]
pub struct OutputProxy {
    value: Value,
    changed: bool,
}

impl OutputProxy {
    /// Last received value
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The received value, once per change
    pub fn take(&mut self) -> Option<Value> {
        std::mem::take(&mut self.changed).then(|| self.value.clone())
    }
}

impl Plugin for OutputProxy {
    fn id(&self) -> &str {
        OUTPUT_PROXY
    }

    fn input_slots(&self) -> Vec<Slot> {
        vec![Slot::input("output", DataType::Any)]
    }

    fn update_input(&mut self, _slot: &Slot, value: Value) {
        self.value = value;
        self.changed = true;
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        Value::Null
    }
}

fn mismatch(node: &NodeId) -> GraphError {
    GraphError::PluginMismatch {
        node: node.clone(),
        expected: GRAPH_PLUGIN.to_owned(),
    }
}

fn subgraph_mut<'a>(graph: &'a mut Graph, node: &NodeId) -> GraphResult<&'a mut Subgraph> {
    graph
        .node_mut(node)
        .ok_or_else(|| GraphError::NodeNotFound(node.clone()))?
        .plugin_as_mut::<Subgraph>()
        .ok_or_else(|| mismatch(node))
}

/// Add an input to a subgraph node: the outer dynamic slot and the inner
/// proxy feeding from it. Returns the slot id and the proxy node id.
///
/// # Errors
///
/// [`GraphError::NodeNotFound`], [`GraphError::PluginMismatch`] when the
/// node is not a subgraph, or slot declaration errors.
pub fn add_subgraph_input(
    graph: &mut Graph,
    node: &NodeId,
    name: &str,
    dt: DataType,
) -> GraphResult<(SlotId, NodeId)> {
    add_proxy(graph, node, Direction::Input, name, dt)
}

/// Add an output to a subgraph node: the outer dynamic slot and the inner
/// proxy publishing to it. Returns the slot id and the proxy node id.
///
/// # Errors
///
/// Same as [`add_subgraph_input`].
pub fn add_subgraph_output(
    graph: &mut Graph,
    node: &NodeId,
    name: &str,
    dt: DataType,
) -> GraphResult<(SlotId, NodeId)> {
    add_proxy(graph, node, Direction::Output, name, dt)
}

fn add_proxy(
    graph: &mut Graph,
    node: &NodeId,
    direction: Direction,
    name: &str,
    dt: DataType,
) -> GraphResult<(SlotId, NodeId)> {
    subgraph_mut(graph, node)?;
    let sid = graph.add_slot(node, direction, SlotDef::new(name, dt))?;

    let created = {
        let subgraph = subgraph_mut(graph, node)?;
        let (plugin_id, x, sids) = match direction {
            Direction::Input => (INPUT_PROXY, 0.0, &subgraph.state.input_sids),
            Direction::Output => (OUTPUT_PROXY, 400.0, &subgraph.state.output_sids),
        };
        let y = 60.0 * sids.len() as f64;
        subgraph.graph.create_node(plugin_id, x, y).and_then(|proxy| {
            subgraph.graph.rename_node(&proxy, Some(name.to_owned()))?;
            let sids = match direction {
                Direction::Input => &mut subgraph.state.input_sids,
                Direction::Output => &mut subgraph.state.output_sids,
            };
            sids.insert(proxy.to_string(), sid.to_string());
            Ok(proxy)
        })
    };

    match created {
        Ok(proxy) => {
            debug!(node = %node, slot = %sid, %proxy, %direction, "added subgraph proxy");
            Ok((sid, proxy))
        }
        Err(err) => {
            graph.remove_slot(node, direction, &sid)?;
            Err(err)
        }
    }
}

/// Remove a proxy node together with the outer slot it serves.
/// Returns `false` when `proxy` is not one of the node's proxies.
///
/// # Errors
///
/// [`GraphError::NodeNotFound`] or [`GraphError::PluginMismatch`].
pub fn remove_subgraph_proxy(graph: &mut Graph, node: &NodeId, proxy: &NodeId) -> GraphResult<bool> {
    let subgraph = subgraph_mut(graph, node)?;
    let key = proxy.to_string();
    let (direction, sid) = if let Some(sid) = subgraph.state.input_sids.remove(&key) {
        (Direction::Input, sid)
    } else if let Some(sid) = subgraph.state.output_sids.remove(&key) {
        (Direction::Output, sid)
    } else {
        return Ok(false);
    };
    subgraph.outputs.remove(&sid);
    subgraph.graph.remove_node(proxy);

    graph.remove_slot(node, direction, &SlotId::from(sid))?;
    Ok(true)
}
