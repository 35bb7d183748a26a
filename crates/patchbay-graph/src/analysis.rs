//! Structural queries over the connection topology

use crate::graph::Graph;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use patchbay_types::NodeId;
use std::collections::HashMap;

impl Graph {
    fn topology(&self) -> DiGraph<NodeId, ()> {
        let mut dag = DiGraph::with_capacity(self.nodes.len(), self.connections.len());
        let index: HashMap<&NodeId, NodeIndex> = self
            .nodes
            .keys()
            .map(|id| (id, dag.add_node(id.clone())))
            .collect();

        for conn in self.connections.values() {
            if let (Some(src), Some(dst)) = (index.get(&conn.src_node), index.get(&conn.dst_node)) {
                dag.add_edge(*src, *dst, ());
            }
        }
        dag
    }

    /// Whether any connection path leads back to where it started
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.topology())
    }

    /// Nodes ordered so every source precedes its consumers; `None` when
    /// the graph has a cycle
    #[must_use]
    pub fn evaluation_order(&self) -> Option<Vec<NodeId>> {
        let dag = self.topology();
        let order = toposort(&dag, None).ok()?;
        Some(order.into_iter().map(|i| dag[i].clone()).collect())
    }
}
