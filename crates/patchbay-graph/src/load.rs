//! Two-phase document loading
//!
//! [`UnlinkedGraph::build`] turns a document into nodes without resolving
//! anything that refers outside a single node. [`UnlinkedGraph::link`]
//! then resolves the parent graph through the registry, links nested
//! graphs, and attaches connections whose endpoints exist. Connections
//! that do not resolve are pruned and recorded in the [`LoadReport`]
//! instead of failing the load.

use crate::connection::Connection;
use crate::doc::{ConnectionDoc, GraphDoc, NodeDoc, SlotDoc, VariablesDoc};
use crate::dynamic::SlotDef;
use crate::error::{GraphError, GraphResult, LoadIssue, LoadReport};
use crate::graph::Graph;
use crate::node::{Node, ENTITY_PLUGIN};
use crate::plugin::merge_known_keys;
use crate::registry::GraphRegistry;
use crate::session::Core;
use patchbay_types::{DataType, Direction, GraphId, NodeId, SlotRef};
use tracing::{debug, error, warn};

/// Plugin ids renamed since older saves
const RENAMED_PLUGINS: &[(&str, &str)] = &[
    ("register_local_read", "variable_local_read"),
    ("register_local_write", "variable_local_write"),
];

/// Plugin id of generic subgraphs
const GRAPH_PLUGIN: &str = "graph";

/// A node built from its document, nested graph not yet linked
#[derive(Debug)]
pub struct UnlinkedNode {
    node: Node,
    nested: Option<UnlinkedGraph>,
}

impl UnlinkedNode {
    /// Node id
    #[must_use]
    pub fn uid(&self) -> &NodeId {
        self.node.uid()
    }

    pub(crate) fn link(
        self,
        graph: &GraphId,
        registry: &GraphRegistry,
        detached: bool,
        report: &mut LoadReport,
    ) -> Node {
        let mut node = self.node;
        node.parent_graph = Some(graph.clone());
        if let Some(nested) = self.nested {
            let linked = nested.link_into(registry, Some(Some(graph.clone())), detached);
            report.extend(linked.report);
            node.plugin.set_graph(linked.graph);
        }
        node
    }
}

/// A graph built from its document, references not yet resolved
#[derive(Debug)]
pub struct UnlinkedGraph {
    core: Core,
    uid: GraphId,
    parent: Option<GraphId>,
    open: bool,
    nodes: Vec<UnlinkedNode>,
    conns: Vec<ConnectionDoc>,
    variables: Option<VariablesDoc>,
    report: LoadReport,
}

/// Result of linking: the live graph and everything recovered on the way
#[derive(Debug)]
pub struct LinkedGraph {
    /// Linked graph, not yet initialised
    pub graph: Graph,
    /// Recovered problems
    pub report: LoadReport,
}

impl UnlinkedGraph {
    /// Construct every node of a document.
    ///
    /// Nodes whose plugin is not registered, or whose saved form is
    /// malformed, are skipped and recorded; the rest still load.
    ///
    /// # Errors
    ///
    /// None at present; kept fallible alongside [`UnlinkedGraph::from_json`].
    pub fn build(doc: GraphDoc, core: &Core) -> GraphResult<Self> {
        let mut report = LoadReport::default();
        let mut nodes = Vec::with_capacity(doc.nodes.len());

        for node_doc in doc.nodes {
            let uid = node_doc.uid.clone();
            match build_node(node_doc, core, &mut report) {
                Ok(node) => nodes.push(node),
                Err(GraphError::UnknownPlugin(_)) => {}
                Err(e) => {
                    error!(graph = %doc.uid, node = %uid, error = %e, "skipping malformed node");
                    report.push(LoadIssue::RejectedNode {
                        node: uid,
                        message: e.to_string(),
                    });
                }
            }
        }

        debug!(graph = %doc.uid, nodes = nodes.len(), "built graph");
        Ok(Self {
            core: core.clone(),
            uid: doc.uid,
            parent: doc.parent_uid,
            open: doc.open,
            nodes,
            conns: doc.conns,
            variables: doc.variables,
            report,
        })
    }

    /// Parse and build a document
    ///
    /// # Errors
    ///
    /// Malformed JSON, or the errors of [`UnlinkedGraph::build`].
    pub fn from_json(json: &str, core: &Core) -> GraphResult<Self> {
        Self::build(GraphDoc::from_json(json)?, core)
    }

    /// Graph id
    #[must_use]
    pub fn uid(&self) -> &GraphId {
        &self.uid
    }

    /// Nodes built so far
    #[must_use]
    pub fn nodes(&self) -> &[UnlinkedNode] {
        &self.nodes
    }

    /// Issues recorded while building
    #[must_use]
    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Resolve references against the session registry and register the
    /// graph tree
    #[must_use]
    pub fn link(self) -> LinkedGraph {
        let registry = self.core.registry().clone();
        self.link_into(&registry, None, false)
    }

    /// Resolve references without registering anything or publishing
    /// events, as used for copies
    #[must_use]
    pub fn link_detached(self) -> LinkedGraph {
        let registry = self.core.registry().clone();
        self.link_into(&registry, None, true)
    }

    fn link_into(
        self,
        registry: &GraphRegistry,
        parent: Option<Option<GraphId>>,
        detached: bool,
    ) -> LinkedGraph {
        let mut report = self.report;

        let parent = match parent {
            Some(known) => known,
            None => self.parent.and_then(|p| {
                if registry.resolve(&p).is_some() {
                    Some(p)
                } else {
                    report.push(LoadIssue::UnresolvedParent {
                        graph: self.uid.clone(),
                        parent: p,
                    });
                    None
                }
            }),
        };

        if !detached {
            registry.register(self.uid.clone(), parent.clone());
        }

        let mut graph = Graph::with_uid(&self.core, self.uid);
        graph.registry = registry.clone();
        graph.parent = parent;
        graph.open = self.open;
        graph.detached = detached;
        graph.registered = !detached;

        for unlinked in self.nodes {
            let node = unlinked.link(&graph.uid, registry, detached, &mut report);
            graph.register_node(node, None);
        }

        for doc in self.conns {
            match resolve_connection(&graph, &doc) {
                Ok(connection) => {
                    graph.attach(connection);
                }
                Err(reason) => {
                    warn!(graph = %graph.uid, connection = %doc.uid, %reason, "pruning connection");
                    report.push(LoadIssue::PrunedConnection {
                        connection: doc.uid,
                        reason,
                    });
                }
            }
        }

        if let Some(variables) = &self.variables {
            graph.variables.load(variables);
        }

        LinkedGraph { graph, report }
    }
}

/// Build one node from its document
pub(crate) fn build_node(
    mut doc: NodeDoc,
    core: &Core,
    report: &mut LoadReport,
) -> GraphResult<UnlinkedNode> {
    if core.config().legacy_compat {
        apply_legacy_ids(&mut doc);
    }

    let mut node = match core.instantiate(&doc.plugin) {
        Ok(node) => node,
        Err(e) => {
            if let GraphError::UnknownPlugin(plugin) = &e {
                report.push(LoadIssue::UnknownPlugin {
                    node: doc.uid.clone(),
                    plugin: plugin.clone(),
                });
            }
            return Err(e);
        }
    };
    node = node.with_uid(doc.uid).at(doc.x, doc.y);
    node.title = doc.title;
    node.open = doc.open.unwrap_or(true);

    let nested = match doc.graph {
        Some(inner) if node.is_subgraph() => Some(UnlinkedGraph::build(*inner, core)?),
        Some(_) => {
            warn!(node = %node.uid, plugin = %node.plugin_id, "ignoring nested graph of a plain node");
            None
        }
        None => None,
    };

    if let Some(mut state) = doc.state {
        stringify_sids(&mut state);
        if let Some(current) = node.plugin.state() {
            let merged = merge_known_keys(current, &state);
            if let Err(e) = node.plugin.set_state(merged) {
                error!(node = %node.uid, plugin = %node.plugin_id, error = %e, "saved state rejected");
                report.push(LoadIssue::RejectedState {
                    node: node.uid.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    for (direction, mut slots) in [(Direction::Input, doc.dyn_in), (Direction::Output, doc.dyn_out)] {
        slots.sort_by_key(|s| s.index);
        for slot in slots {
            let def = slot_def(&node.uid, slot, report);
            node.dynamic.insert(direction, def)?;
        }
    }

    node.ui_slot_values = doc.ui_slot_values;
    Ok(UnlinkedNode { node, nested })
}

fn slot_def(node: &NodeId, doc: SlotDoc, report: &mut LoadReport) -> SlotDef {
    let dt = DataType::from_id(doc.dt).unwrap_or_else(|| {
        warn!(node = %node, slot = %doc.uid, dt = doc.dt, "unknown datatype, using wildcard");
        report.push(LoadIssue::UnknownDatatype {
            node: node.clone(),
            slot: doc.uid.clone(),
            dt: doc.dt,
        });
        DataType::Any
    });

    SlotDef {
        name: doc.name,
        dt: Some(dt),
        array: doc.array,
        default: doc.default,
        min: doc.min,
        max: doc.max,
        desc: None,
        uid: Some(doc.uid),
        index: None,
    }
}

fn resolve_connection(graph: &Graph, doc: &ConnectionDoc) -> Result<Connection, String> {
    let src_slot = doc.src_slot_ref.to_slot_ref(Direction::Output);
    let dst_slot = doc.dst_slot_ref.to_slot_ref(Direction::Input);

    check_endpoint(graph, &doc.src_node_uid, &src_slot)?;
    check_endpoint(graph, &doc.dst_node_uid, &dst_slot)?;

    Ok(Connection::new(
        doc.src_node_uid.clone(),
        src_slot,
        doc.dst_node_uid.clone(),
        dst_slot,
    )
    .with_uid(doc.uid.clone()))
}

fn check_endpoint(graph: &Graph, node: &NodeId, slot: &SlotRef) -> Result<(), String> {
    let Some(n) = graph.node(node) else {
        return Err(format!("node {node} not found"));
    };
    if n.slot(slot).is_none() {
        return Err(format!("slot {slot} not found on node {node}"));
    }
    Ok(())
}

fn apply_legacy_ids(doc: &mut NodeDoc) {
    if let Some((_, renamed)) = RENAMED_PLUGINS.iter().find(|(old, _)| *old == doc.plugin) {
        debug!(from = %doc.plugin, to = renamed, "renaming legacy plugin id");
        doc.plugin = (*renamed).to_owned();
    }

    let single_object_output =
        doc.dyn_out.len() == 1 && doc.dyn_out[0].dt == DataType::Object3d.id();
    if doc.plugin == GRAPH_PLUGIN && single_object_output {
        debug!(node = %doc.uid, "promoting object subgraph to entity");
        doc.plugin = ENTITY_PLUGIN.to_owned();
    }
}

/// Older saves stored slot ids inside subgraph state as numbers
fn stringify_sids(state: &mut serde_json::Value) {
    for key in ["input_sids", "output_sids"] {
        let Some(serde_json::Value::Object(sids)) = state.get_mut(key) else {
            continue;
        };
        for value in sids.values_mut() {
            if !value.is_string() {
                *value = serde_json::Value::String(value.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_ids_are_renamed() {
        let mut doc = NodeDoc::new("register_local_read");
        apply_legacy_ids(&mut doc);
        assert_eq!(doc.plugin, "variable_local_read");
    }

    #[test]
    fn object_subgraph_becomes_entity() {
        let mut doc = NodeDoc::new(GRAPH_PLUGIN);
        doc.dyn_out.push(SlotDoc {
            uid: "s1".into(),
            name: "object".into(),
            dt: DataType::Object3d.id(),
            array: false,
            index: 0,
            default: None,
            min: None,
            max: None,
        });
        apply_legacy_ids(&mut doc);
        assert_eq!(doc.plugin, ENTITY_PLUGIN);

        let mut plain = NodeDoc::new(GRAPH_PLUGIN);
        apply_legacy_ids(&mut plain);
        assert_eq!(plain.plugin, GRAPH_PLUGIN);
    }

    #[test]
    fn numeric_sids_become_strings() {
        let mut state = json!({
            "always_update": true,
            "input_sids": {"12": 3, "13": "4"},
            "output_sids": {"20": 7}
        });
        stringify_sids(&mut state);
        assert_eq!(state["input_sids"]["12"], json!("3"));
        assert_eq!(state["input_sids"]["13"], json!("4"));
        assert_eq!(state["output_sids"]["20"], json!("7"));
    }
}
