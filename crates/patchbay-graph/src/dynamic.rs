//! Runtime-created slots
//!
//! Dynamic slots are stored in an arena keyed by [`SlotId`]. Each direction
//! keeps an ordering vector, and every slot's `index` is recomputed from
//! it after any insert or removal so indices stay dense.

use crate::error::{GraphError, GraphResult};
use patchbay_types::{DataType, Direction, Slot, SlotId, Value};
use std::collections::HashMap;

/// Declaration of a dynamic slot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotDef {
    /// Slot name, required
    pub name: String,
    /// Datatype, required
    pub dt: Option<DataType>,
    /// Carries a sequence
    pub array: bool,
    /// Default value
    pub default: Option<Value>,
    /// Lower bound hint
    pub min: Option<f64>,
    /// Upper bound hint
    pub max: Option<f64>,
    /// Description
    pub desc: Option<String>,
    /// Identity to reuse; a fresh one is assigned when absent
    pub uid: Option<SlotId>,
    /// Insert position; appended when absent
    pub index: Option<usize>,
}

impl SlotDef {
    /// Declaration with name and datatype
    #[must_use]
    pub fn new(name: impl Into<String>, dt: DataType) -> Self {
        Self {
            name: name.into(),
            dt: Some(dt),
            ..Self::default()
        }
    }

    /// Mark as carrying a sequence
    #[inline]
    #[must_use]
    pub fn as_array(mut self) -> Self {
        self.array = true;
        self
    }

    /// Reuse an existing identity
    #[inline]
    #[must_use]
    pub fn with_uid(mut self, uid: SlotId) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Insert at a position instead of appending
    #[inline]
    #[must_use]
    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the default value
    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    fn into_slot(self, direction: Direction) -> GraphResult<(Slot, Option<usize>)> {
        let dt = self
            .dt
            .ok_or_else(|| GraphError::MissingSlotDatatype(self.name.clone()))?;
        if self.name.is_empty() {
            return Err(GraphError::MissingSlotName);
        }

        let mut slot = Slot::new(self.name, direction, dt);
        slot.array = self.array;
        slot.default = self.default;
        slot.min = self.min;
        slot.max = self.max;
        slot.desc = self.desc;
        slot.uid = Some(self.uid.unwrap_or_default());
        Ok((slot, self.index))
    }
}

/// Arena of a node's dynamic slots
#[derive(Debug, Clone, Default)]
pub struct DynamicSlots {
    slots: HashMap<SlotId, Slot>,
    inputs: Vec<SlotId>,
    outputs: Vec<SlotId>,
}

impl DynamicSlots {
    /// Empty arena
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and insert a slot, returning its uid
    ///
    /// # Errors
    ///
    /// [`GraphError::MissingSlotDatatype`] or [`GraphError::MissingSlotName`]
    /// when the declaration is incomplete.
    pub fn insert(&mut self, direction: Direction, def: SlotDef) -> GraphResult<SlotId> {
        let (slot, index) = def.into_slot(direction)?;
        let uid = slot.uid.clone().unwrap_or_default();

        let order = self.order_mut(direction);
        order.retain(|id| *id != uid);
        let at = index.map_or(order.len(), |i| i.min(order.len()));
        order.insert(at, uid.clone());

        self.slots.insert(uid.clone(), slot);
        self.renumber(direction);
        Ok(uid)
    }

    /// Remove a slot, renumbering its siblings
    pub fn remove(&mut self, direction: Direction, uid: &SlotId) -> Option<Slot> {
        if self.slots.get(uid)?.direction != direction {
            return None;
        }
        self.order_mut(direction).retain(|id| id != uid);
        let removed = self.slots.remove(uid);
        self.renumber(direction);
        removed
    }

    /// Slot by uid, any direction
    #[must_use]
    pub fn get(&self, uid: &SlotId) -> Option<&Slot> {
        self.slots.get(uid)
    }

    /// Mutable slot by uid
    pub fn get_mut(&mut self, uid: &SlotId) -> Option<&mut Slot> {
        self.slots.get_mut(uid)
    }

    /// Slot by uid, only if it is on the given side
    #[must_use]
    pub fn find(&self, direction: Direction, uid: &SlotId) -> Option<&Slot> {
        self.slots.get(uid).filter(|s| s.direction == direction)
    }

    /// Slot by name on the given side
    #[must_use]
    pub fn find_by_name(&self, direction: Direction, name: &str) -> Option<&Slot> {
        self.ordered(direction).find(|s| s.name == name)
    }

    /// Slots of one side in index order
    pub fn ordered(&self, direction: Direction) -> impl Iterator<Item = &Slot> {
        self.order(direction)
            .iter()
            .filter_map(move |id| self.slots.get(id))
    }

    /// Uids of one side in index order
    #[must_use]
    pub fn ids(&self, direction: Direction) -> &[SlotId] {
        self.order(direction)
    }

    /// Number of slots on one side
    #[must_use]
    pub fn count(&self, direction: Direction) -> usize {
        self.order(direction).len()
    }

    /// Total number of dynamic slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the node has no dynamic slots
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Change a slot's datatype; returns `false` for unknown uids
    pub fn set_datatype(&mut self, uid: &SlotId, dt: DataType) -> bool {
        self.slots.get_mut(uid).map(|s| s.dt = dt).is_some()
    }

    /// Change a slot's arrayness; returns `false` for unknown uids
    pub fn set_array(&mut self, uid: &SlotId, array: bool) -> bool {
        self.slots.get_mut(uid).map(|s| s.array = array).is_some()
    }

    fn order(&self, direction: Direction) -> &Vec<SlotId> {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    fn order_mut(&mut self, direction: Direction) -> &mut Vec<SlotId> {
        match direction {
            Direction::Input => &mut self.inputs,
            Direction::Output => &mut self.outputs,
        }
    }

    fn renumber(&mut self, direction: Direction) {
        let order = match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        };
        for (index, id) in order.iter().enumerate() {
            if let Some(slot) = self.slots.get_mut(id) {
                slot.index = index;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_assigns_uid_and_index() {
        let mut slots = DynamicSlots::new();
        let a = slots
            .insert(Direction::Input, SlotDef::new("a", DataType::Float))
            .unwrap();
        let b = slots
            .insert(Direction::Input, SlotDef::new("b", DataType::Float))
            .unwrap();

        assert_eq!(slots.get(&a).unwrap().index, 0);
        assert_eq!(slots.get(&b).unwrap().index, 1);
        assert!(slots.get(&a).unwrap().is_dynamic());
    }

    #[test]
    fn insert_at_position_renumbers() {
        let mut slots = DynamicSlots::new();
        let a = slots
            .insert(Direction::Output, SlotDef::new("a", DataType::Any))
            .unwrap();
        let b = slots
            .insert(Direction::Output, SlotDef::new("b", DataType::Any).at(0))
            .unwrap();

        assert_eq!(slots.ids(Direction::Output), &[b.clone(), a.clone()]);
        assert_eq!(slots.get(&b).unwrap().index, 0);
        assert_eq!(slots.get(&a).unwrap().index, 1);
    }

    #[test]
    fn removal_keeps_indices_dense() {
        let mut slots = DynamicSlots::new();
        let ids: Vec<SlotId> = ["a", "b", "c"]
            .iter()
            .map(|n| {
                slots
                    .insert(Direction::Input, SlotDef::new(*n, DataType::Float))
                    .unwrap()
            })
            .collect();

        assert!(slots.remove(Direction::Output, &ids[0]).is_none());
        let removed = slots.remove(Direction::Input, &ids[0]).unwrap();
        assert_eq!(removed.name, "a");

        let indices: Vec<usize> = slots.ordered(Direction::Input).map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn incomplete_declarations_are_rejected() {
        let mut slots = DynamicSlots::new();
        let no_dt = SlotDef {
            name: "x".into(),
            ..SlotDef::default()
        };
        assert!(matches!(
            slots.insert(Direction::Input, no_dt),
            Err(GraphError::MissingSlotDatatype(name)) if name == "x"
        ));

        let no_name = SlotDef::new("", DataType::Float);
        assert!(matches!(
            slots.insert(Direction::Input, no_name),
            Err(GraphError::MissingSlotName)
        ));
        assert!(slots.is_empty());
    }

    #[test]
    fn supplied_uid_is_kept() {
        let mut slots = DynamicSlots::new();
        let uid = SlotId::from("fixed");
        let got = slots
            .insert(
                Direction::Input,
                SlotDef::new("a", DataType::Float).with_uid(uid.clone()),
            )
            .unwrap();
        assert_eq!(got, uid);
        assert_eq!(slots.find_by_name(Direction::Input, "a").unwrap().uid, Some(uid));
    }
}
