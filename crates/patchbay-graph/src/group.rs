//! Linked slot groups
//!
//! A group ties dynamic inputs and outputs of one node to a single
//! inferred datatype and arrayness. While nothing is connected the group is
//! typed as the wildcard; the first connection decides the type for every
//! member and the last disconnection reverts it.

use crate::dynamic::{DynamicSlots, SlotDef};
use crate::error::GraphResult;
use crate::plugin::{ConnectionChange, SlotLink};
use patchbay_types::{DataType, Direction, SlotId, SlotRef, Value};
use tracing::debug;

/// Dynamic slots sharing one datatype
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedSlotGroup {
    inputs: Vec<SlotId>,
    outputs: Vec<SlotId>,
    n_connected: usize,
    dt: DataType,
    array: bool,
    forced_output_array: Option<bool>,
}

impl LinkedSlotGroup {
    /// Empty group typed as the wildcard
    #[must_use]
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            n_connected: 0,
            dt: DataType::Any,
            array: false,
            forced_output_array: None,
        }
    }

    /// Group over existing slots
    #[must_use]
    pub fn with_slots(inputs: Vec<SlotId>, outputs: Vec<SlotId>) -> Self {
        Self {
            inputs,
            outputs,
            ..Self::new()
        }
    }

    /// Pin the arrayness of member outputs regardless of connections
    pub fn force_output_arrayness(&mut self, array: bool) {
        self.forced_output_array = Some(array);
    }

    /// Shared datatype
    #[must_use]
    pub fn dt(&self) -> DataType {
        self.dt
    }

    /// Shared arrayness of member inputs
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.array
    }

    /// Connections currently touching member slots
    #[must_use]
    pub fn n_connected(&self) -> usize {
        self.n_connected
    }

    /// Member uids on one side
    #[must_use]
    pub fn members(&self, direction: Direction) -> &[SlotId] {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    /// Whether `slot` belongs to the group
    #[must_use]
    pub fn contains(&self, slot: &SlotRef) -> bool {
        match slot {
            SlotRef::Dynamic { direction, uid } => self.members(*direction).contains(uid),
            SlotRef::Static { .. } => false,
        }
    }

    /// Add an existing slot to the group
    pub fn add_slot(&mut self, direction: Direction, uid: SlotId) {
        let members = self.members_mut(direction);
        if !members.contains(&uid) {
            members.push(uid);
        }
    }

    /// Drop a slot from the group
    pub fn remove_slot(&mut self, direction: Direction, uid: &SlotId) -> bool {
        let members = self.members_mut(direction);
        let before = members.len();
        members.retain(|id| id != uid);
        members.len() != before
    }

    /// Create a dynamic slot typed like the group and add it
    ///
    /// # Errors
    ///
    /// Propagates declaration errors from [`DynamicSlots::insert`].
    pub fn add_dyn_slot(
        &mut self,
        slots: &mut DynamicSlots,
        direction: Direction,
        mut def: SlotDef,
    ) -> GraphResult<SlotId> {
        def.dt = Some(self.dt);
        def.array = match direction {
            Direction::Input => self.array,
            Direction::Output => self.forced_output_array.unwrap_or(self.array),
        };
        let uid = slots.insert(direction, def)?;
        self.add_slot(direction, uid.clone());
        Ok(uid)
    }

    /// Drop a slot from the group and from the arena.
    ///
    /// Connections must already have been detached by the graph.
    pub fn remove_dyn_slot(
        &mut self,
        slots: &mut DynamicSlots,
        direction: Direction,
        uid: &SlotId,
    ) -> bool {
        self.remove_slot(direction, uid) && slots.remove(direction, uid).is_some()
    }

    /// Track a connection change; returns whether it concerned the group
    pub fn connection_changed(&mut self, slots: &mut DynamicSlots, change: &ConnectionChange) -> bool {
        if !self.contains(&change.link.own) {
            return false;
        }

        if change.connected {
            self.n_connected += 1;
            if self.n_connected == 1 {
                self.apply(slots, change.link.peer.dt, change.link.peer.array);
            }
        } else {
            self.n_connected = self.n_connected.saturating_sub(1);
            if self.n_connected == 0 {
                self.apply(slots, DataType::Any, false);
            }
        }
        true
    }

    /// Recompute the group type from every connection touching it.
    ///
    /// Arrayness follows whether any connected peer is an array. Returns
    /// the zero value of the inferred type, or `None` when no connected
    /// peer carries a concrete type.
    pub fn infer_dt(&mut self, slots: &mut DynamicSlots, links: &[SlotLink]) -> Option<Value> {
        let mut dt = None;
        let mut array = false;
        let mut connected = 0;

        for link in links.iter().filter(|l| self.contains(&l.own)) {
            connected += 1;
            if dt.is_none() && !link.peer.dt.is_any() {
                dt = Some(link.peer.dt);
            }
            array |= link.peer.array;
        }
        self.n_connected = connected;

        match dt {
            Some(dt) => {
                self.apply(slots, dt, array);
                Some(dt.default_value())
            }
            None if connected == 0 => {
                self.apply(slots, DataType::Any, false);
                None
            }
            None => {
                self.apply(slots, self.dt, array);
                None
            }
        }
    }

    fn apply(&mut self, slots: &mut DynamicSlots, dt: DataType, array: bool) {
        debug!(dt = %dt, array, "linked slot group retyped");
        self.dt = dt;
        self.array = array;
        let output_array = self.forced_output_array.unwrap_or(array);

        for uid in &self.inputs {
            slots.set_datatype(uid, dt);
            slots.set_array(uid, array);
        }
        for uid in &self.outputs {
            slots.set_datatype(uid, dt);
            slots.set_array(uid, output_array);
        }
    }

    fn members_mut(&mut self, direction: Direction) -> &mut Vec<SlotId> {
        match direction {
            Direction::Input => &mut self.inputs,
            Direction::Output => &mut self.outputs,
        }
    }
}

impl Default for LinkedSlotGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchbay_types::{ConnectionId, Slot};

    fn group_with_slots() -> (LinkedSlotGroup, DynamicSlots, SlotId, SlotId) {
        let mut slots = DynamicSlots::new();
        let mut group = LinkedSlotGroup::new();
        let input = group
            .add_dyn_slot(&mut slots, Direction::Input, SlotDef::new("in", DataType::Any))
            .unwrap();
        let output = group
            .add_dyn_slot(&mut slots, Direction::Output, SlotDef::new("out", DataType::Any))
            .unwrap();
        (group, slots, input, output)
    }

    fn link(own: SlotRef, dt: DataType, array: bool) -> SlotLink {
        let mut peer = Slot::output("peer", dt);
        peer.array = array;
        SlotLink {
            connection: ConnectionId::new(),
            own,
            peer,
        }
    }

    #[test]
    fn first_connection_types_every_member() {
        let (mut group, mut slots, input, output) = group_with_slots();
        assert_eq!(group.dt(), DataType::Any);

        let change = ConnectionChange {
            connected: true,
            link: link(
                SlotRef::dynamic(Direction::Input, input.clone()),
                DataType::Float,
                true,
            ),
        };
        assert!(group.connection_changed(&mut slots, &change));

        for uid in [&input, &output] {
            let slot = slots.get(uid).unwrap();
            assert_eq!(slot.dt, DataType::Float);
            assert!(slot.array);
        }

        let change = ConnectionChange {
            connected: false,
            ..change
        };
        group.connection_changed(&mut slots, &change);
        for uid in [&input, &output] {
            let slot = slots.get(uid).unwrap();
            assert_eq!(slot.dt, DataType::Any);
            assert!(!slot.array);
        }
    }

    #[test]
    fn second_connection_keeps_first_type() {
        let (mut group, mut slots, input, output) = group_with_slots();
        let first = ConnectionChange {
            connected: true,
            link: link(
                SlotRef::dynamic(Direction::Input, input.clone()),
                DataType::Color,
                false,
            ),
        };
        let second = ConnectionChange {
            connected: true,
            link: link(
                SlotRef::dynamic(Direction::Output, output.clone()),
                DataType::Float,
                false,
            ),
        };
        group.connection_changed(&mut slots, &first);
        group.connection_changed(&mut slots, &second);
        assert_eq!(group.n_connected(), 2);
        assert_eq!(slots.get(&output).unwrap().dt, DataType::Color);

        group.connection_changed(
            &mut slots,
            &ConnectionChange {
                connected: false,
                ..first
            },
        );
        assert_eq!(group.dt(), DataType::Color);
    }

    #[test]
    fn non_members_are_ignored() {
        let (mut group, mut slots, _, _) = group_with_slots();
        let change = ConnectionChange {
            connected: true,
            link: link(SlotRef::input(0), DataType::Float, false),
        };
        assert!(!group.connection_changed(&mut slots, &change));
        assert_eq!(group.n_connected(), 0);
    }

    #[test]
    fn forced_output_arrayness_wins() {
        let (mut group, mut slots, input, output) = group_with_slots();
        group.force_output_arrayness(true);
        let change = ConnectionChange {
            connected: true,
            link: link(
                SlotRef::dynamic(Direction::Input, input.clone()),
                DataType::Float,
                false,
            ),
        };
        group.connection_changed(&mut slots, &change);
        assert!(!slots.get(&input).unwrap().array);
        assert!(slots.get(&output).unwrap().array);
    }

    #[test]
    fn infer_scans_links() {
        let (mut group, mut slots, input, output) = group_with_slots();
        let links = vec![
            link(SlotRef::dynamic(Direction::Input, input), DataType::Any, false),
            link(SlotRef::dynamic(Direction::Output, output.clone()), DataType::Vector, true),
            link(SlotRef::input(0), DataType::Bool, false),
        ];

        assert_eq!(
            group.infer_dt(&mut slots, &links),
            Some(DataType::Vector.default_value())
        );
        assert_eq!(group.n_connected(), 2);
        assert_eq!(slots.get(&output).unwrap().dt, DataType::Vector);
        assert!(slots.get(&output).unwrap().array);

        assert_eq!(group.infer_dt(&mut slots, &[]), None);
        assert_eq!(group.dt(), DataType::Any);
    }

    #[test]
    fn wildcard_peers_still_set_arrayness() {
        let (mut group, mut slots, input, output) = group_with_slots();
        let links = vec![link(
            SlotRef::dynamic(Direction::Input, input.clone()),
            DataType::Any,
            true,
        )];

        assert_eq!(group.infer_dt(&mut slots, &links), None);
        assert_eq!(group.dt(), DataType::Any);
        assert!(group.is_array());
        assert!(slots.get(&input).unwrap().array);
        assert!(slots.get(&output).unwrap().array);
    }
}
