//! Flow control

use patchbay_graph::prelude::*;

/// Passes its value through while enabled
///
/// Disabling the gate marks the `value` input inactive, so the evaluation
/// pass stops pulling the branch upstream of it. Re-enabling forces that
/// branch to deliver its current value again.
#[derive(Debug)]
pub struct Gate {
    enabled: bool,
    value: Value,
    changed: bool,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            enabled: true,
            value: Value::Null,
            changed: false,
        }
    }
}

impl Gate {
    /// Whether values currently pass
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Plugin for Gate {
    fn id(&self) -> &str {
        "gate"
    }

    fn input_slots(&self) -> Vec<Slot> {
        vec![
            Slot::input("enabled", DataType::Bool).with_default(true),
            Slot::input("value", DataType::Any),
        ]
    }

    fn output_slots(&self) -> Vec<Slot> {
        vec![Slot::output("value", DataType::Any)]
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn update_input(&mut self, slot: &Slot, value: Value) {
        if slot.name == "enabled" {
            self.enabled = value.as_bool().unwrap_or(true);
        } else if self.enabled {
            self.value = value;
            self.changed = true;
        }
    }

    fn input_inactive(&self, slot: &Slot) -> bool {
        slot.inactive || (slot.name == "value" && !self.enabled)
    }

    fn update_state(&mut self, _ctx: &UpdateContext) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        self.value.clone()
    }
}
