//! Testing utilities for the Patchbay workspace
//!
//! Shared test helpers, fixtures, and observers.

#![allow(missing_docs)]

use parking_lot::Mutex;
use patchbay_graph::prelude::*;
use patchbay_graph::GraphObserver;
use patchbay_plugins::{PluginLibrary, Recorder};
use patchbay_types::ConnectionId;
use std::sync::Arc;

pub fn library_core() -> Core {
    Core::new(PluginLibrary::with_defaults())
}

pub fn library_core_with(config: CoreConfig) -> Core {
    Core::with_config(PluginLibrary::with_defaults(), config)
}

pub fn ctx() -> UpdateContext {
    UpdateContext::new(0.0, 1.0 / 60.0, 0)
}

/// Connect output `src_index` of `src` to input `dst_index` of `dst`
pub fn wire_slots(
    graph: &mut Graph,
    src: &NodeId,
    src_index: usize,
    dst: &NodeId,
    dst_index: usize,
) -> ConnectionId {
    graph
        .connect(Connection::new(
            src.clone(),
            SlotRef::output(src_index),
            dst.clone(),
            SlotRef::input(dst_index),
        ))
        .unwrap()
}

/// Connect output 0 of `src` to input 0 of `dst`
pub fn wire(graph: &mut Graph, src: &NodeId, dst: &NodeId) -> ConnectionId {
    wire_slots(graph, src, 0, dst, 0)
}

pub fn constant(graph: &mut Graph, value: f64) -> NodeId {
    let node = graph.create_node("constant_float", 0.0, 0.0).unwrap();
    graph
        .set_plugin_state(&node, "value", serde_json::json!(value))
        .unwrap();
    node
}

/// constant_float -> double -> recorder
pub fn const_double_recorder(core: &Core, value: f64) -> (Graph, NodeId, NodeId, NodeId) {
    let mut graph = core.new_graph();
    let source = constant(&mut graph, value);
    let double = graph.create_node("double", 100.0, 0.0).unwrap();
    let recorder = graph.create_node("recorder", 200.0, 0.0).unwrap();
    wire(&mut graph, &source, &double);
    wire(&mut graph, &double, &recorder);
    (graph, source, double, recorder)
}

pub fn recorded(graph: &Graph, recorder: &NodeId) -> Vec<Value> {
    graph
        .node(recorder)
        .and_then(|n| n.plugin_as::<Recorder>())
        .map(|r| r.received.clone())
        .unwrap_or_default()
}

/// Run passes until one reports nothing changed; returns the pass count
pub fn settle(graph: &mut Graph, limit: usize) -> usize {
    let mut ctx = ctx();
    for pass in 1..=limit {
        if !graph.update(&ctx) {
            return pass;
        }
        ctx.advance(1.0 / 60.0);
    }
    limit
}

/// Keeps every event published on a bus
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<GraphEvent>>,
}

impl RecordingObserver {
    pub fn attach(core: &Core) -> Arc<Self> {
        let observer = Arc::new(Self::default());
        core.events().subscribe(observer.clone());
        observer
    }

    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&GraphEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl GraphObserver for RecordingObserver {
    fn notify(&self, event: &GraphEvent) {
        self.events.lock().push(event.clone());
    }
}

/// A patch saved by an older editor: numeric ids, renamed plugins, the
/// `registers` key and an object subgraph that predates entities
pub const LEGACY_PATCH: &str = r#"{
    "uid": 100,
    "parent_uid": -1,
    "open": true,
    "registers": {"speed": {"dt": 0, "array": false}},
    "nodes": [
        {"plugin": "register_local_write", "x": 0, "y": 0, "uid": 1,
         "state": {"variable": "speed"}},
        {"plugin": "register_local_read", "x": 0, "y": 60, "uid": 2,
         "state": {"variable": "speed"}},
        {"plugin": "constant_float", "x": -100, "y": 0, "uid": 3,
         "state": {"value": 4}},
        {"plugin": "recorder", "x": 100, "y": 60, "uid": 4},
        {"plugin": "graph", "x": 0, "y": 200, "uid": 5,
         "state": {"always_update": false, "input_sids": {}, "output_sids": {"6": 7}},
         "dyn_out": [{"uid": 7, "name": "mesh", "dt": 16, "index": 0}],
         "graph": {
             "uid": 101,
             "parent_uid": 100,
             "nodes": [{"plugin": "output_proxy", "x": 400, "y": 0, "uid": 6}],
             "conns": []
         }}
    ],
    "conns": [
        {"uid": 10, "srcNodeUid": 3, "srcSlotRef": {"index": 0},
         "dstNodeUid": 1, "dstSlotRef": {"index": 0}},
        {"uid": 11, "srcNodeUid": 2, "srcSlotRef": {"index": 0},
         "dstNodeUid": 4, "dstSlotRef": {"index": 0}}
    ]
}"#;
