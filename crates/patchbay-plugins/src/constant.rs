//! Constant sources
//!
//! Constants emit their stored value once after every reset or state
//! change and stay quiet otherwise.

use patchbay_graph::prelude::*;
use serde::{Deserialize, Serialize};

/// Persistent state of a constant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstantState<T> {
    /// Emitted value
    pub value: T,
}

/// Emits a fixed number
#[derive(Debug, Default)]
pub struct ConstantFloat {
    /// Persistent state
    pub state: ConstantState<f64>,
    changed: bool,
}

impl Plugin for ConstantFloat {
    fn id(&self) -> &str {
        "constant_float"
    }

    fn output_slots(&self) -> Vec<Slot> {
        vec![Slot::output("value", DataType::Float).with_desc("The stored number")]
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

/// Emits a fixed flag
#[derive(Debug, Default)]
pub struct ConstantBool {
    /// Persistent state
    pub state: ConstantState<bool>,
    changed: bool,
}

impl Plugin for ConstantBool {
    fn id(&self) -> &str {
        "constant_bool"
    }

    fn output_slots(&self) -> Vec<Slot> {
        vec![Slot::output("value", DataType::Bool)]
    }

    fn reset(&mut self) {
        self.changed = true;
    }

    fn update_state(&mut self, _ctx: &UpdateContext) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        Value::Bool(self.state.value)
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
