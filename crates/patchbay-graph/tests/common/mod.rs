//! Minimal plugins for exercising the graph core

#![allow(dead_code)]

use patchbay_graph::prelude::*;
use patchbay_graph::{ConnectionChange, Graph};
use serde::{Deserialize, Serialize};

/// Emits a stored number; fires once after every state change
#[derive(Debug, Default)]
pub struct Source {
    pub state: SourceState,
    changed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceState {
    pub value: f64,
}

impl Plugin for Source {
    fn id(&self) -> &str {
        "source"
    }

    fn output_slots(&self) -> Vec<Slot> {
        vec![Slot::output("value", DataType::Float)]
    }

    fn reset(&mut self) {
        self.changed = true;
    }

    fn update_state(&mut self, _ctx: &UpdateContext) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        Value::Float(self.state.value)
    }

    fn state(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.state).ok()
    }

    fn set_state(&mut self, state: serde_json::Value) -> Result<(), serde_json::Error> {
        self.state = serde_json::from_value(state)?;
        Ok(())
    }

    fn state_changed(&mut self) {
        self.changed = true;
    }
}

/// Doubles its input
#[derive(Debug, Default)]
pub struct Scale {
    input: f64,
    result: f64,
}

impl Plugin for Scale {
    fn id(&self) -> &str {
        "scale"
    }

    fn input_slots(&self) -> Vec<Slot> {
        vec![Slot::input("value", DataType::Float)]
    }

    fn output_slots(&self) -> Vec<Slot> {
        vec![Slot::output("result", DataType::Float)]
    }

    fn update_input(&mut self, _slot: &Slot, value: Value) {
        self.input = value.as_f64().unwrap_or_default();
    }

    fn update_state(&mut self, _ctx: &UpdateContext) -> bool {
        self.result = self.input * 2.0;
        true
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        Value::Float(self.result)
    }
}

/// Records everything it receives
#[derive(Debug, Default)]
pub struct Sink {
    pub received: Vec<Value>,
    pub evaluations: usize,
}

impl Plugin for Sink {
    fn id(&self) -> &str {
        "sink"
    }

    fn input_slots(&self) -> Vec<Slot> {
        vec![Slot::input("value", DataType::Any)]
    }

    fn update_input(&mut self, _slot: &Slot, value: Value) {
        self.received.push(value);
    }

    fn update_state(&mut self, _ctx: &UpdateContext) -> bool {
        self.evaluations += 1;
        false
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        Value::Null
    }
}

/// Starts with one dynamic input and one dynamic output
#[derive(Debug, Default)]
pub struct Bus {
    pub changes: Vec<ConnectionChange>,
}

impl Plugin for Bus {
    fn id(&self) -> &str {
        "bus"
    }

    fn create_slots(&mut self, slots: &mut DynamicSlots) {
        let _ = slots.insert(Direction::Input, SlotDef::new("in", DataType::Any));
        let _ = slots.insert(Direction::Output, SlotDef::new("out", DataType::Any));
    }

    fn connection_changed(&mut self, _slots: &mut DynamicSlots, change: &ConnectionChange) {
        self.changes.push(change.clone());
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        Value::Null
    }
}

/// Declares the same input name twice
#[derive(Debug, Default)]
pub struct Broken;

impl Plugin for Broken {
    fn id(&self) -> &str {
        "broken"
    }

    fn input_slots(&self) -> Vec<Slot> {
        vec![
            Slot::input("a", DataType::Float),
            Slot::input("a", DataType::Bool),
        ]
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        Value::Null
    }
}

/// Owns an inner graph and evaluates it every pass
#[derive(Debug)]
pub struct Group {
    graph: Graph,
}

impl Plugin for Group {
    fn id(&self) -> &str {
        "group"
    }

    fn update_state(&mut self, ctx: &UpdateContext) -> bool {
        self.graph.update(ctx)
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        Value::Null
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

/// Factory over the plugins above
#[derive(Debug, Default)]
pub struct TestPlugins;

impl PluginFactory for TestPlugins {
    fn create(&self, plugin_id: &str, core: &Core) -> Option<Box<dyn Plugin>> {
        let plugin: Box<dyn Plugin> = match plugin_id {
            "source" => Box::<Source>::default(),
            "scale" => Box::<Scale>::default(),
            "sink" => Box::<Sink>::default(),
            "bus" => Box::<Bus>::default(),
            "broken" => Box::new(Broken),
            "group" => Box::new(Group {
                graph: core.new_graph(),
            }),
            _ => return None,
        };
        Some(plugin)
    }

    fn display_name(&self, plugin_id: &str) -> Option<String> {
        Some(format!("Test {plugin_id}"))
    }
}

pub fn core() -> Core {
    Core::new(TestPlugins)
}

/// Connect output 0 of `src` to input 0 of `dst`
pub fn wire(graph: &mut Graph, src: &NodeId, dst: &NodeId) -> patchbay_types::ConnectionId {
    graph
        .connect(Connection::new(
            src.clone(),
            SlotRef::output(0),
            dst.clone(),
            SlotRef::input(0),
        ))
        .unwrap()
}

/// Source -> Scale -> Sink
pub fn chain(core: &Core) -> (Graph, NodeId, NodeId, NodeId) {
    let mut graph = core.new_graph();
    let source = graph.create_node("source", 0.0, 0.0).unwrap();
    let scale = graph.create_node("scale", 100.0, 0.0).unwrap();
    let sink = graph.create_node("sink", 200.0, 0.0).unwrap();
    graph
        .set_plugin_state(&source, "value", serde_json::json!(5.0))
        .unwrap();
    wire(&mut graph, &source, &scale);
    wire(&mut graph, &scale, &sink);
    (graph, source, scale, sink)
}

pub fn ctx() -> UpdateContext {
    UpdateContext::new(0.0, 1.0 / 60.0, 0)
}

pub fn sink_received(graph: &Graph, sink: &NodeId) -> Vec<Value> {
    graph
        .node(sink)
        .and_then(|n| n.plugin_as::<Sink>())
        .map(|s| s.received.clone())
        .unwrap_or_default()
}
