//! Type-inferring relay

use patchbay_graph::prelude::*;
use patchbay_graph::ConnectionChange;
use tracing::warn;

/// Forwards its input unchanged
///
/// Its dynamic input and output form one [`LinkedSlotGroup`], so both
/// take the type of whatever is connected first.
#[derive(Debug, Default)]
pub struct PassThrough {
    group: LinkedSlotGroup,
    value: Value,
    changed: bool,
}

impl PassThrough {
    /// The linked group over the relay's slots
    #[must_use]
    pub fn group(&self) -> &LinkedSlotGroup {
        &self.group
    }
}

impl Plugin for PassThrough {
    fn id(&self) -> &str {
        "pass_through"
    }

    fn create_slots(&mut self, slots: &mut DynamicSlots) {
        for (direction, name) in [(Direction::Input, "input"), (Direction::Output, "output")] {
            if let Err(err) = self
                .group
                .add_dyn_slot(slots, direction, SlotDef::new(name, DataType::Any))
            {
                warn!(%err, "pass_through could not create its slots");
            }
        }
    }

    fn initialise(&mut self, slots: &mut DynamicSlots, links: &[SlotLink]) {
        self.group = LinkedSlotGroup::with_slots(
            slots.ids(Direction::Input).to_vec(),
            slots.ids(Direction::Output).to_vec(),
        );
        if let Some(zero) = self.group.infer_dt(slots, links) {
            self.value = zero;
        }
    }

    fn connection_changed(&mut self, slots: &mut DynamicSlots, change: &ConnectionChange) {
        self.group.connection_changed(slots, change);
    }

    fn reset(&mut self) {
        self.value = Value::Null;
        self.changed = false;
    }

    fn update_input(&mut self, _slot: &Slot, value: Value) {
        self.value = value;
        self.changed = true;
    }

    fn update_state(&mut self, _ctx: &UpdateContext) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn update_output(&mut self, _slot: &Slot) -> Value {
        self.value.clone()
    }
}
