mod common;

use common::*;
use patchbay_graph::prelude::*;
use patchbay_graph::{GraphDoc, LoadIssue, UnlinkedGraph};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

fn round_trip(graph: &Graph, core: &Core) -> Graph {
    let json = graph.to_json().unwrap();
    let (loaded, report) = Graph::from_json(&json, core).unwrap();
    assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
    loaded
}

#[test]
fn chain_round_trips() {
    let core = core();
    let (mut graph, _, scale, _) = chain(&core);
    graph.rename_node(&scale, Some("twice".into())).unwrap();
    graph.set_node_open(&scale, false).unwrap();

    let loaded = round_trip(&graph, &core);
    assert_eq!(loaded.serialise(), graph.serialise());

    let node = loaded.node(&scale).unwrap();
    assert_eq!(node.title(), Some("twice"));
    assert!(!node.is_open());
    assert_eq!(loaded.roots(), graph.roots());
}

#[test]
fn loaded_chain_evaluates() {
    let core = core();
    let (graph, _, _, sink) = chain(&core);
    let mut loaded = round_trip(&graph, &core);

    assert!(loaded.update(&ctx()));
    assert_eq!(sink_received(&loaded, &sink), vec![Value::Float(10.0)]);
}

#[test]
fn dynamic_slots_and_nested_graphs_round_trip() {
    let core = core();
    let mut graph = core.new_graph();
    let bus = graph.create_node("bus", 10.0, 20.0).unwrap();
    graph
        .add_slot(
            &bus,
            Direction::Input,
            SlotDef::new("level", DataType::Float).with_default(0.5),
        )
        .unwrap();
    let group = graph.create_node("group", 0.0, 0.0).unwrap();
    graph
        .node_mut(&group)
        .and_then(|n| n.plugin_mut().graph_mut())
        .unwrap()
        .create_node("sink", 0.0, 0.0)
        .unwrap();

    let loaded = round_trip(&graph, &core);
    assert_eq!(loaded.serialise(), graph.serialise());

    let inner = loaded.node(&group).unwrap().plugin().graph().unwrap();
    assert_eq!(inner.node_count(), 1);
    assert_eq!(inner.parent(), Some(loaded.uid()));
    assert_eq!(core.registry().parent_of(inner.uid()), Some(loaded.uid().clone()));
}

#[test]
fn parent_uid_is_written_as_minus_one() {
    let core = core();
    let graph = core.new_graph();
    let value: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();
    assert_eq!(value["parent_uid"], json!(-1));
}

#[test]
fn dangling_connections_are_pruned() {
    let core = core();
    let doc = json!({
        "uid": "g1",
        "parent_uid": -1,
        "nodes": [
            {"plugin": "source", "x": 0, "y": 0, "uid": 1},
            {"plugin": "sink", "x": 0, "y": 0, "uid": 2}
        ],
        "conns": [
            {"uid": "c1", "srcNodeUid": 1, "srcSlotRef": {"index": 0},
             "dstNodeUid": 2, "dstSlotRef": {"index": 0}},
            {"uid": "c2", "srcNodeUid": 9, "srcSlotRef": {"index": 0},
             "dstNodeUid": 2, "dstSlotRef": {"index": 0}},
            {"uid": "c3", "srcNodeUid": 1, "srcSlotRef": {"index": 4},
             "dstNodeUid": 2, "dstSlotRef": {"index": 0}}
        ]
    });

    let (graph, report) = Graph::from_json(&doc.to_string(), &core).unwrap();
    assert_eq!(graph.connection_count(), 1);
    assert_eq!(report.pruned_connections(), 2);
    assert!(graph.node(&NodeId::from("1")).is_some());
}

#[test]
fn unknown_plugins_are_skipped() {
    let core = core();
    let doc = json!({
        "uid": "g2",
        "nodes": [
            {"plugin": "source", "uid": "a"},
            {"plugin": "warp_drive", "uid": "b"}
        ],
        "conns": [
            {"uid": "c1", "srcNodeUid": "b", "srcSlotRef": {"index": 0},
             "dstNodeUid": "a", "dstSlotRef": {"index": 0}}
        ]
    });

    let (graph, report) = Graph::from_json(&doc.to_string(), &core).unwrap();
    assert_eq!(graph.node_count(), 1);
    assert_eq!(report.skipped_nodes(), 1);
    assert_eq!(report.pruned_connections(), 1);
    assert!(matches!(
        &report.issues[0],
        LoadIssue::UnknownPlugin { plugin, .. } if plugin == "warp_drive"
    ));
}

#[test]
fn malformed_nodes_are_skipped() {
    let core = core();
    let doc = json!({
        "uid": "g6",
        "nodes": [
            {"plugin": "source", "uid": "a", "state": {"value": 5}},
            {"plugin": "sink", "uid": "b"},
            {"plugin": "bus", "uid": "c",
             "dyn_in": [{"uid": "s1", "name": "", "dt": 0, "index": 0}]}
        ],
        "conns": [
            {"uid": "c1", "srcNodeUid": "a", "srcSlotRef": {"index": 0},
             "dstNodeUid": "b", "dstSlotRef": {"index": 0}}
        ]
    });

    let (mut graph, report) = Graph::from_json(&doc.to_string(), &core).unwrap();
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.connection_count(), 1);
    assert!(graph.node(&NodeId::from("c")).is_none());
    assert_eq!(report.skipped_nodes(), 1);
    assert!(matches!(
        &report.issues[0],
        LoadIssue::RejectedNode { node, .. } if node.as_str() == "c"
    ));

    assert!(graph.update(&ctx()));
    assert_eq!(
        sink_received(&graph, &NodeId::from("b")),
        vec![Value::Float(5.0)]
    );
}

#[test]
fn unknown_datatypes_fall_back_to_wildcard() {
    let core = core();
    let doc = json!({
        "uid": "g3",
        "nodes": [{
            "plugin": "bus", "uid": "n",
            "dyn_in": [{"uid": "s", "name": "odd", "dt": 999, "index": 0}]
        }],
        "conns": []
    });

    let (graph, report) = Graph::from_json(&doc.to_string(), &core).unwrap();
    let slot = graph
        .node(&NodeId::from("n"))
        .unwrap()
        .find_input_slot_by_name("odd")
        .unwrap()
        .clone();
    assert_eq!(slot.dt, DataType::Any);
    assert!(matches!(report.issues[0], LoadIssue::UnknownDatatype { dt: 999, .. }));
}

#[test]
fn unresolved_parent_is_reported() {
    let core = core();
    let doc = json!({"uid": "child", "parent_uid": "nowhere", "nodes": [], "conns": []});
    let (graph, report) = Graph::from_json(&doc.to_string(), &core).unwrap();
    assert!(graph.parent().is_none());
    assert!(matches!(report.issues[0], LoadIssue::UnresolvedParent { .. }));
}

#[test]
fn registers_are_read_as_variables() {
    let core = core();
    let doc = json!({
        "uid": "g4",
        "nodes": [],
        "conns": [],
        "registers": {"speed": {"dt": 0, "array": false}}
    });
    let (graph, _) = Graph::from_json(&doc.to_string(), &core).unwrap();
    assert_eq!(graph.variables().names(), vec!["speed".to_owned()]);

    let saved: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();
    assert!(saved.get("registers").is_none());
    assert_eq!(saved["variables"]["speed"]["dt"], json!(0));
}

#[test]
fn unknown_state_keys_are_ignored() {
    let core = core();
    let doc = json!({
        "uid": "g5",
        "nodes": [{"plugin": "source", "uid": "s", "state": {"value": 3.0, "legacy": 1}}],
        "conns": []
    });
    let (graph, report) = Graph::from_json(&doc.to_string(), &core).unwrap();
    assert!(report.is_clean());
    let state = graph.node(&NodeId::from("s")).unwrap().plugin().state();
    assert_eq!(state, Some(json!({"value": 3.0})));
}

#[test]
fn build_and_link_are_separate_steps() {
    let core = core();
    let (graph, ..) = chain(&core);
    let doc = GraphDoc::from_json(&graph.to_json().unwrap()).unwrap();

    let unlinked = UnlinkedGraph::build(doc, &core).unwrap();
    assert_eq!(unlinked.nodes().len(), 3);
    assert!(!core.registry().contains(unlinked.uid()));

    let linked = unlinked.link();
    assert!(core.registry().contains(linked.graph.uid()));
    assert_eq!(linked.graph.connection_count(), 2);
}

#[test]
fn copies_evaluate_independently() {
    let core = core();
    let (mut graph, source, _, sink) = chain(&core);
    graph.create_node("group", 0.0, 0.0).unwrap();
    let registered = core.registry().len();

    let copy = graph.make_copy(0).unwrap();
    assert!(copy.is_copy());
    assert_eq!(copy.node_count(), 4);
    copy.set_plugin_state(&source, "value", json!(1.0)).unwrap();
    copy.update(&ctx());
    assert_eq!(sink_received(copy, &sink), vec![Value::Float(2.0)]);

    assert!(sink_received(&graph, &sink).is_empty());
    assert_eq!(core.registry().len(), registered);
    assert!(!graph.is_copy());
}

#[test]
fn copies_are_replaced_and_removed_by_index() {
    let core = core();
    let (mut graph, ..) = chain(&core);
    graph.make_copy(0).unwrap();
    graph.make_copy(5).unwrap();
    assert_eq!(graph.copies().len(), 2);

    graph.make_copy(0).unwrap();
    assert_eq!(graph.copies().len(), 2);

    assert!(graph.remove_copy(1));
    assert!(!graph.remove_copy(3));
    graph.clear_copies();
    assert!(graph.copies().is_empty());
}

proptest! {
    #[test]
    fn prop_random_chains_round_trip(
        values in proptest::collection::vec((-1000i32..1000).prop_map(f64::from), 1..6),
        scales in 0..5usize,
        x in -500i32..500,
    ) {
        let core = core();
        let mut graph = core.new_graph();
        let sink = graph.create_node("sink", f64::from(x), 0.0).unwrap();
        for value in values {
            let source = graph.create_node("source", f64::from(x), 10.0).unwrap();
            graph.set_plugin_state(&source, "value", json!(value)).unwrap();
            let mut tail = source;
            for _ in 0..scales {
                let scale = graph.create_node("scale", 0.0, f64::from(x)).unwrap();
                wire(&mut graph, &tail, &scale);
                tail = scale;
            }
            wire(&mut graph, &tail, &sink);
        }

        let json = graph.to_json().unwrap();
        let (loaded, report) = Graph::from_json(&json, &core).unwrap();
        prop_assert!(report.is_clean());
        prop_assert_eq!(loaded.serialise(), graph.serialise());
    }
}
