use patchbay_graph::prelude::*;
use patchbay_plugins::{
    add_subgraph_input, add_subgraph_output, remove_subgraph_proxy, ArrayFunction, Subgraph,
};
use patchbay_test_utils::*;
use patchbay_types::SlotId;
use pretty_assertions::assert_eq;

struct Doubler {
    graph: Graph,
    group: NodeId,
    input: (SlotId, NodeId),
    output: (SlotId, NodeId),
}

/// A `graph` node whose inner graph doubles its single input
fn doubler(core: &Core) -> Doubler {
    let mut graph = core.new_graph();
    let group = graph.create_node("graph", 100.0, 0.0).unwrap();
    let input = add_subgraph_input(&mut graph, &group, "x", DataType::Float).unwrap();
    let output = add_subgraph_output(&mut graph, &group, "y", DataType::Float).unwrap();

    let inner = graph
        .node_mut(&group)
        .and_then(|n| n.plugin_mut().graph_mut())
        .unwrap();
    let double = inner.create_node("double", 200.0, 0.0).unwrap();
    wire(inner, &input.1, &double);
    wire(inner, &double, &output.1);

    Doubler {
        graph,
        group,
        input,
        output,
    }
}

fn feed(d: &mut Doubler, value: f64) -> NodeId {
    let source = constant(&mut d.graph, value);
    let recorder = d.graph.create_node("recorder", 300.0, 0.0).unwrap();
    d.graph
        .connect(Connection::new(
            source,
            SlotRef::output(0),
            d.group.clone(),
            SlotRef::dynamic(Direction::Input, d.input.0.clone()),
        ))
        .unwrap();
    d.graph
        .connect(Connection::new(
            d.group.clone(),
            SlotRef::dynamic(Direction::Output, d.output.0.clone()),
            recorder.clone(),
            SlotRef::input(0),
        ))
        .unwrap();
    recorder
}

#[test]
fn values_cross_the_subgraph_boundary() {
    let core = library_core();
    let mut d = doubler(&core);
    let recorder = feed(&mut d, 3.0);

    settle(&mut d.graph, 10);
    assert_eq!(recorded(&d.graph, &recorder), vec![Value::Float(6.0)]);

    let published = d
        .graph
        .node(&d.group)
        .and_then(|n| n.plugin_as::<Subgraph>())
        .and_then(|s| s.output_value(&d.output.0).cloned());
    assert_eq!(published, Some(Value::Float(6.0)));
}

#[test]
fn proxies_are_recorded_in_state() {
    let core = library_core();
    let d = doubler(&core);
    let node = d.graph.node(&d.group).unwrap();
    let state = &node.plugin_as::<Subgraph>().unwrap().state;

    assert_eq!(
        state.input_sids.get(d.input.1.as_str()),
        Some(&d.input.0.to_string())
    );
    assert_eq!(
        state.output_sids.get(d.output.1.as_str()),
        Some(&d.output.0.to_string())
    );

    let inner = node.plugin().graph().unwrap();
    assert_eq!(inner.node(&d.input.1).unwrap().title(), Some("x"));
    assert_eq!(inner.node(&d.output.1).unwrap().plugin_id(), "output_proxy");
    assert!(!d.graph.roots().contains(&d.group));
}

#[test]
fn proxies_require_a_subgraph_node() {
    let core = library_core();
    let mut graph = core.new_graph();
    let double = graph.create_node("double", 0.0, 0.0).unwrap();

    let err = add_subgraph_input(&mut graph, &double, "x", DataType::Float).unwrap_err();
    assert!(matches!(err, GraphError::PluginMismatch { .. }));
    assert!(graph.node(&double).unwrap().dynamic_slots().is_empty());

    let missing = NodeId::from("missing");
    assert!(matches!(
        add_subgraph_output(&mut graph, &missing, "y", DataType::Float),
        Err(GraphError::NodeNotFound(_))
    ));
}

#[test]
fn removing_a_proxy_removes_its_slot() {
    let core = library_core();
    let mut d = doubler(&core);
    let recorder = feed(&mut d, 1.0);
    assert!(d.graph.slot_has_connections(
        &d.group,
        &SlotRef::dynamic(Direction::Output, d.output.0.clone())
    ));

    assert!(remove_subgraph_proxy(&mut d.graph, &d.group, &d.output.1).unwrap());
    assert!(!remove_subgraph_proxy(&mut d.graph, &d.group, &d.output.1).unwrap());

    let node = d.graph.node(&d.group).unwrap();
    assert_eq!(node.dynamic_slots().count(Direction::Output), 0);
    assert!(node.plugin().graph().unwrap().node(&d.output.1).is_none());
    assert!(d.graph.node(&recorder).unwrap().input_connections().is_empty());
    assert!(d.graph.roots().contains(&d.group));
}

#[test]
fn entity_nodes_are_subgraphs() {
    let core = library_core();
    let mut graph = core.new_graph();
    let entity = graph.create_node("entity", 0.0, 0.0).unwrap();
    let node = graph.node(&entity).unwrap();
    assert!(node.is_subgraph());
    assert!(node.is_entity_patch());
    assert!(graph.children().contains(&entity));
    assert!(add_subgraph_output(&mut graph, &entity, "object", DataType::Object3d).is_ok());
}

#[test]
fn subgraphs_round_trip_and_evaluate() {
    let core = library_core();
    let mut d = doubler(&core);
    let recorder = feed(&mut d, 4.0);

    let (mut loaded, report) = Graph::from_json(&d.graph.to_json().unwrap(), &core).unwrap();
    assert!(report.is_clean(), "{:?}", report.issues);
    assert_eq!(loaded.serialise(), d.graph.serialise());

    settle(&mut loaded, 10);
    assert_eq!(recorded(&loaded, &recorder), vec![Value::Float(8.0)]);
}

fn array_function(graph: &mut Graph) -> NodeId {
    let node = graph.create_node("array_function", 0.0, 0.0).unwrap();
    let state = graph
        .node(&node)
        .and_then(|n| n.plugin_as::<ArrayFunction>())
        .map(|f| f.state.clone())
        .unwrap();
    let (item, result) = (state.item.unwrap(), state.result.unwrap());

    let template = graph
        .node_mut(&node)
        .and_then(|n| n.plugin_mut().graph_mut())
        .unwrap();
    let double = template.create_node("double", 200.0, 0.0).unwrap();
    wire(template, &item, &double);
    wire(template, &double, &result);
    node
}

fn results(graph: &Graph, node: &NodeId) -> Vec<Value> {
    graph
        .node(node)
        .and_then(|n| n.plugin_as::<ArrayFunction>())
        .map(|f| f.results().to_vec())
        .unwrap_or_default()
}

fn copies(graph: &Graph, node: &NodeId) -> usize {
    graph
        .node(node)
        .and_then(|n| n.plugin().graph())
        .map_or(0, |g| g.copies().len())
}

#[test]
fn array_function_maps_each_element_in_its_own_copy() {
    let core = library_core();
    let mut graph = core.new_graph();
    let map = array_function(&mut graph);
    let registered = core.registry().len();

    graph
        .set_input_slot_value(&map, "array", Value::from(vec![1.0, 2.0, 3.0]))
        .unwrap();
    graph.update(&ctx());
    assert_eq!(
        results(&graph, &map),
        vec![Value::Float(2.0), Value::Float(4.0), Value::Float(6.0)]
    );
    assert_eq!(copies(&graph, &map), 3);
    assert_eq!(core.registry().len(), registered);

    graph
        .set_input_slot_value(&map, "array", Value::from(vec![5.0]))
        .unwrap();
    graph.update(&ctx());
    assert_eq!(results(&graph, &map), vec![Value::Float(10.0)]);
    assert_eq!(copies(&graph, &map), 1);
}

#[test]
fn scalar_consumers_receive_the_first_mapped_element() {
    let core = library_core();
    let mut graph = core.new_graph();
    let source = constant(&mut graph, 1.5);
    let map = array_function(&mut graph);
    let recorder = graph.create_node("recorder", 400.0, 0.0).unwrap();
    wire(&mut graph, &source, &map);
    wire(&mut graph, &map, &recorder);

    settle(&mut graph, 10);
    assert_eq!(recorded(&graph, &recorder), vec![Value::Float(3.0)]);
}

#[test]
fn reset_drops_array_copies() {
    let core = library_core();
    let mut graph = core.new_graph();
    let map = array_function(&mut graph);
    graph
        .set_input_slot_value(&map, "array", Value::from(vec![1.0, 2.0]))
        .unwrap();
    graph.update(&ctx());
    assert_eq!(copies(&graph, &map), 2);

    graph.reset();
    assert_eq!(copies(&graph, &map), 0);
    assert!(results(&graph, &map).is_empty());
}
