mod common;

use common::*;
use parking_lot::Mutex;
use patchbay_graph::prelude::*;
use patchbay_graph::GraphEvent;
use proptest::prelude::*;
use std::sync::Arc;

#[test]
fn chain_settles_after_flows_switch_off() {
    let core = core();
    let (mut graph, _, _, sink) = chain(&core);
    let mut ctx = ctx();

    assert!(graph.update(&ctx), "values flow on the first pass");
    assert_eq!(sink_received(&graph, &sink), vec![Value::Float(10.0)]);

    ctx.advance(1.0 / 60.0);
    assert!(graph.update(&ctx), "flows switch off on the second pass");

    ctx.advance(1.0 / 60.0);
    assert!(!graph.update(&ctx));
    assert_eq!(sink_received(&graph, &sink), vec![Value::Float(10.0)]);
    assert!(graph.connections().all(|c| !c.flow()));
}

#[test]
fn sinks_fire_every_pass() {
    let core = core();
    let (mut graph, _, _, sink) = chain(&core);
    for _ in 0..4 {
        graph.update(&ctx());
    }
    let evaluations = graph
        .node(&sink)
        .and_then(|n| n.plugin_as::<Sink>())
        .map(|s| s.evaluations);
    assert_eq!(evaluations, Some(4));
}

#[test]
fn state_change_propagates_downstream() {
    let core = core();
    let (mut graph, source, _, sink) = chain(&core);
    while graph.update(&ctx()) {}

    graph
        .set_plugin_state(&source, "value", serde_json::json!(7.0))
        .unwrap();
    assert!(graph.update(&ctx()));
    assert_eq!(
        sink_received(&graph, &sink),
        vec![Value::Float(10.0), Value::Float(14.0)]
    );
}

#[test]
fn new_consumer_receives_value_without_upstream_change() {
    let core = core();
    let (mut graph, _, scale, _) = chain(&core);
    while graph.update(&ctx()) {}

    let late = graph.create_node("sink", 300.0, 0.0).unwrap();
    wire(&mut graph, &scale, &late);
    assert!(graph.update(&ctx()));
    assert_eq!(sink_received(&graph, &late), vec![Value::Float(10.0)]);
}

#[test]
fn losing_an_input_reevaluates_the_node_once() {
    let core = core();
    let (mut graph, _, scale, sink) = chain(&core);
    while graph.update(&ctx()) {}

    let feed = graph.node(&scale).unwrap().input_connections()[0].clone();
    graph.disconnect(&feed);
    graph.update(&ctx());
    assert_eq!(
        sink_received(&graph, &sink),
        vec![Value::Float(10.0), Value::Float(10.0)]
    );

    graph.update(&ctx());
    graph.update(&ctx());
    assert_eq!(sink_received(&graph, &sink).len(), 2);
}

#[test]
fn updated_flags_are_cleared_after_a_pass() {
    let core = core();
    let (mut graph, ..) = chain(&core);
    graph.update(&ctx());
    assert!(graph.nodes().all(|n| !n.is_updated()));
}

#[test]
fn cycles_terminate_and_visit_once() {
    let core = core();
    let mut graph = core.new_graph();
    let a = graph.create_node("scale", 0.0, 0.0).unwrap();
    let b = graph.create_node("scale", 100.0, 0.0).unwrap();
    let sink = graph.create_node("sink", 200.0, 0.0).unwrap();
    wire(&mut graph, &a, &b);
    wire(&mut graph, &b, &a);
    wire(&mut graph, &b, &sink);

    assert!(graph.is_cyclic());
    assert!(graph.evaluation_order().is_none());

    for _ in 0..3 {
        graph.update(&ctx());
        assert!(graph.nodes().all(|n| n.update_count() <= 1));
    }
}

#[test]
fn subgraph_without_roots_is_still_visited() {
    let core = core();
    let mut graph = core.new_graph();
    let group = graph.create_node("group", 0.0, 0.0).unwrap();
    graph
        .add_slot(&group, Direction::Output, SlotDef::new("out", DataType::Float))
        .unwrap();
    assert!(graph.roots().is_empty());

    let inner_sink = {
        let inner = graph
            .node_mut(&group)
            .and_then(|n| n.plugin_mut().graph_mut())
            .unwrap();
        let source = inner.create_node("source", 0.0, 0.0).unwrap();
        let sink = inner.create_node("sink", 100.0, 0.0).unwrap();
        wire(inner, &source, &sink);
        sink
    };

    graph.update(&ctx());
    let inner = graph.node(&group).unwrap().plugin().graph().unwrap();
    assert_eq!(sink_received(inner, &inner_sink), vec![Value::Float(0.0)]);
    assert_eq!(graph.node(&group).unwrap().update_count(), 1);
}

#[test]
fn flow_changes_are_published() {
    let core = core();
    let flows = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&flows);
    core.events().subscribe(Arc::new(move |event: &GraphEvent| {
        if let GraphEvent::FlowChanged { flow, .. } = event {
            seen.lock().push(*flow);
        }
    }));

    let (mut graph, ..) = chain(&core);
    graph.update(&ctx());
    graph.update(&ctx());
    assert_eq!(*flows.lock(), vec![true, true, false, false]);
}

#[test]
fn flow_events_can_be_disabled() {
    let core = Core::with_config(TestPlugins, CoreConfig::new().with_flow_events(false));
    let count = Arc::new(Mutex::new(0usize));
    let seen = Arc::clone(&count);
    core.events().subscribe(Arc::new(move |event: &GraphEvent| {
        if matches!(event, GraphEvent::FlowChanged { .. }) {
            *seen.lock() += 1;
        }
    }));

    let (mut graph, ..) = chain(&core);
    assert!(graph.update(&ctx()));
    assert_eq!(*count.lock(), 0);
}

#[test]
fn reactivated_input_delivers_on_next_pass() {
    let core = core();
    let (mut graph, _, scale, sink) = chain(&core);
    while graph.update(&ctx()) {}

    graph.set_slot_inactive(&scale, &SlotRef::input(0), true).unwrap();
    assert!(!graph.update(&ctx()));

    graph.set_slot_inactive(&scale, &SlotRef::input(0), false).unwrap();
    assert!(graph.update(&ctx()));
    assert_eq!(
        sink_received(&graph, &sink),
        vec![Value::Float(10.0), Value::Float(10.0)]
    );
}

#[test]
fn inactive_input_switches_its_flow_off() {
    let core = core();
    let (mut graph, source, scale, _) = chain(&core);
    graph.update(&ctx());
    let feed = graph.node(&scale).unwrap().input_connections()[0].clone();
    assert!(graph.connection(&feed).unwrap().flow());

    graph.set_slot_inactive(&scale, &SlotRef::input(0), true).unwrap();
    graph.set_plugin_state(&source, "value", serde_json::json!(9.0)).unwrap();
    assert!(graph.update(&ctx()));
    assert!(!graph.connection(&feed).unwrap().flow());
}

#[test]
fn reset_clears_flows() {
    let core = core();
    let (mut graph, ..) = chain(&core);
    graph.update(&ctx());
    assert!(graph.connections().any(|c| c.flow()));
    graph.reset();
    assert!(graph.connections().all(|c| !c.flow()));
}

proptest! {
    #[test]
    fn prop_each_node_evaluated_at_most_once(
        node_count in 2..12usize,
        edges in proptest::collection::vec((0..12usize, 0..12usize), 0..40),
        passes in 1..4usize,
    ) {
        let core = core();
        let mut graph = core.new_graph();
        let source = graph.create_node("source", 0.0, 0.0).unwrap();
        let scales: Vec<NodeId> = (0..node_count)
            .map(|_| graph.create_node("scale", 0.0, 0.0).unwrap())
            .collect();
        let sink = graph.create_node("sink", 0.0, 0.0).unwrap();
        wire(&mut graph, &source, &scales[0]);
        wire(&mut graph, &scales[node_count - 1], &sink);

        for (from, to) in edges {
            if from < node_count && to < node_count {
                wire(&mut graph, &scales[from], &scales[to]);
            }
        }

        for _ in 0..passes {
            graph.update(&ctx());
            prop_assert!(graph.nodes().all(|n| n.update_count() <= 1));
        }
    }

    #[test]
    fn prop_inputs_have_at_most_one_connection(
        sources in 1..6usize,
        picks in proptest::collection::vec(0..6usize, 1..20),
    ) {
        let core = core();
        let mut graph = core.new_graph();
        let nodes: Vec<NodeId> = (0..sources)
            .map(|_| graph.create_node("source", 0.0, 0.0).unwrap())
            .collect();
        let sink = graph.create_node("sink", 0.0, 0.0).unwrap();

        for pick in picks {
            wire(&mut graph, &nodes[pick % sources], &sink);
            prop_assert_eq!(graph.node(&sink).unwrap().input_connections().len(), 1);
            prop_assert_eq!(graph.connection_count(), 1);
        }

        let connected = nodes
            .iter()
            .filter(|id| graph.node(id).unwrap().static_output_slots()[0].connected)
            .count();
        prop_assert_eq!(connected, 1);
    }
}
