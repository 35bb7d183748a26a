//! Per-element evaluation of a template graph

use crate::subgraph::{InputProxy, OutputProxy, INPUT_PROXY, OUTPUT_PROXY};
use patchbay_graph::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Persistent state of an array function
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayFunctionState {
    /// Input proxy receiving the current element
    pub item: Option<NodeId>,
    /// Output proxy publishing the mapped element
    pub result: Option<NodeId>,
}

/// Maps an array through its inner graph
///
/// The inner graph is a template. Each element is evaluated in its own
/// copy of it, so stateful nodes keep separate state per element. Copies
/// are kept between passes and dropped when the array shrinks or the node
/// is reset.
#[derive(Debug)]
pub struct ArrayFunction {
    /// Persistent state
    pub state: ArrayFunctionState,
    graph: Graph,
    items: Vec<Value>,
    results: Vec<Value>,
}

impl ArrayFunction {
    /// Array function with an empty template
    #[must_use]
    pub fn new(core: &Core) -> Self {
        Self {
            state: ArrayFunctionState::default(),
            graph: core.new_graph(),
            items: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Mapped elements of the last evaluation
    #[must_use]
    pub fn results(&self) -> &[Value] {
        &self.results
    }

    fn build_template(&mut self) -> GraphResult<()> {
        let item = self.graph.create_node(INPUT_PROXY, 0.0, 0.0)?;
        let result = self.graph.create_node(OUTPUT_PROXY, 400.0, 0.0)?;
        self.graph.connect(Connection::new(
            item.clone(),
            SlotRef::output(0),
            result.clone(),
            SlotRef::input(0),
        ))?;
        self.state = ArrayFunctionState {
            item: Some(item),
            result: Some(result),
        };
        Ok(())
    }

    fn evaluate(&mut self, ctx: &UpdateContext) -> Vec<Value> {
        let (Some(item), Some(result)) = (self.state.item.clone(), self.state.result.clone()) else {
            return Vec::new();
        };

        let mut results = Vec::with_capacity(self.items.len());
        for (index, value) in self.items.iter().enumerate() {
            if index >= self.graph.copies().len() {
                if let Err(err) = self.graph.make_copy(index) {
                    warn!(%err, index, "cannot copy array function template");
                    break;
                }
                debug!(index, "created array function copy");
            }
            let Some(copy) = self.graph.copy_mut(index) else {
                break;
            };

            if let Some(proxy) = copy
                .node_mut(&item)
                .and_then(|n| n.plugin_as_mut::<InputProxy>())
            {
                proxy.set(value.clone());
            }
            copy.update(ctx);
            let mapped = copy
                .node(&result)
                .and_then(|n| n.plugin_as::<OutputProxy>())
                .map(|p| p.value().clone())
                .unwrap_or_default();
            results.push(mapped);
        }

        while self.graph.copies().len() > self.items.len() {
            self.graph.remove_copy(self.graph.copies().len() - 1);
        }
        results
    }
}

impl Plugin for ArrayFunction {
    fn id(&self) -> &str {
        "array_function"
    }

    fn input_slots(&self) -> Vec<Slot> {
        vec![Slot::input("array", DataType::Any).as_array()]
    }

    fn output_slots(&self) -> Vec<Slot> {
        vec![Slot::output("array", DataType::Any).as_array()]
    }

    fn create_slots(&mut self, _slots: &mut DynamicSlots) {
        if let Err(err) = self.build_template() {
            warn!(%err, "cannot build array function template");
        }
    }

    fn reset(&mut self) {
        self.graph.clear_copies();
        self.graph.reset();
        self.items.clear();
        self.results.clear();
    }

    fn update_input(&mut self, _slot: &Slot, value: Value) {
        self.items = match value {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
    }

    fn update_state(&mut self, ctx: &UpdateContext) -> bool {
        let results = self.evaluate(ctx);
        let changed = results != self.results;
        self.results = results;
        changed
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        Value::Array(self.results.clone())
    }

    fn state(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.state).ok()
    }

    fn set_state(&mut self, state: serde_json::Value) -> Result<(), serde_json::Error> {
        self.state = serde_json::from_value(state)?;
        Ok(())
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
