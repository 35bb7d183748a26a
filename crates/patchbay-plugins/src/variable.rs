//! Graph variable access
//!
//! Readers and writers address a variable of the graph being evaluated by
//! name. Writes become visible to readers on the same pass when the writer
//! is evaluated first, otherwise on the next one.

use patchbay_graph::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Persistent state of variable nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableState {
    /// Variable name
    pub variable: String,
}

/// Publishes a variable's value whenever it is written
#[derive(Debug, Default)]
pub struct VariableRead {
    /// Persistent state
    pub state: VariableState,
    seen: Option<u64>,
    value: Value,
}

impl Plugin for VariableRead {
    fn id(&self) -> &str {
        "variable_local_read"
    }

    fn output_slots(&self) -> Vec<Slot> {
        vec![Slot::output("value", DataType::Any)]
    }

    fn reset(&mut self) {
        self.seen = None;
        self.value = Value::Null;
    }

    fn update_state(&mut self, ctx: &UpdateContext) -> bool {
        let Some(variables) = ctx.variables() else {
            return false;
        };
        let version = variables.version(&self.state.variable);
        if version.is_none() || version == self.seen {
            return false;
        }
        self.seen = version;
        self.value = variables.read(&self.state.variable).unwrap_or_default();
        true
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        self.value.clone()
    }

    fn state(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.state).ok()
    }

    fn set_state(&mut self, state: serde_json::Value) -> Result<(), serde_json::Error> {
        self.state = serde_json::from_value(state)?;
        Ok(())
    }

    fn state_changed(&mut self) {
        self.seen = None;
    }
}

/// Stores every received value in a variable
#[derive(Debug, Default)]
pub struct VariableWrite {
    /// Persistent state
    pub state: VariableState,
    pending: Option<Value>,
}

impl Plugin for VariableWrite {
    fn id(&self) -> &str {
        "variable_local_write"
    }

    fn input_slots(&self) -> Vec<Slot> {
        vec![Slot::input("value", DataType::Any)]
    }

    fn reset(&mut self) {
        self.pending = None;
    }

    fn update_input(&mut self, _slot: &Slot, value: Value) {
        self.pending = Some(value);
    }

    fn update_state(&mut self, ctx: &UpdateContext) -> bool {
        if self.state.variable.is_empty() {
            return false;
        }
        if let (Some(value), Some(variables)) = (self.pending.take(), ctx.variables()) {
            if variables.write(&self.state.variable, value) {
                trace!(variable = %self.state.variable, "variable written");
            }
        }
        false
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        Value::Null
    }

    fn state(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.state).ok()
    }

    fn set_state(&mut self, state: serde_json::Value) -> Result<(), serde_json::Error> {
        self.state = serde_json::from_value(state)?;
        Ok(())
    }
}
