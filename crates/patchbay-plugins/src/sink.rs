//! Terminal nodes
//!
//! Sinks have no outputs, which makes them roots: they are visited on
//! every pass and pull everything upstream of them.

use patchbay_graph::prelude::*;
use tracing::info;

/// Keeps every value it receives
#[derive(Debug, Default)]
pub struct Recorder {
    /// Values in arrival order
    pub received: Vec<Value>,
    /// Passes in which the node was evaluated
    pub evaluations: usize,
}

impl Recorder {
    /// Most recent value
    #[must_use]
    pub fn last(&self) -> Option<&Value> {
        self.received.last()
    }
}

impl Plugin for Recorder {
    fn id(&self) -> &str {
        "recorder"
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

/// Writes every received value to the log
#[derive(Debug, Default)]
pub struct Log {
    pending: Option<Value>,
}

impl Plugin for Log {
    fn id(&self) -> &str {
        "log"
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
        if let Some(value) = self.pending.take() {
            info!(frame = ctx.frame, t = ctx.abs_t, %value, "log");
        }
        false
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        Value::Null
    }
}
