//! Directed edges between node slots

use crate::doc::{ConnectionDoc, SlotRefDoc};
use patchbay_types::{ConnectionId, NodeId, SlotRef};

/// Edge from an output slot to an input slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Unique within the graph
    pub uid: ConnectionId,
    /// Producing node
    pub src_node: NodeId,
    /// Output slot on the producing node
    pub src_slot: SlotRef,
    /// Consuming node
    pub dst_node: NodeId,
    /// Input slot on the consuming node
    pub dst_slot: SlotRef,
    pub(crate) flow: bool,
}

impl Connection {
    /// New connection with a fresh id
    #[must_use]
    pub fn new(src_node: NodeId, src_slot: SlotRef, dst_node: NodeId, dst_slot: SlotRef) -> Self {
        Self {
            uid: ConnectionId::new(),
            src_node,
            src_slot,
            dst_node,
            dst_slot,
            flow: false,
        }
    }

    /// Reuse a known id
    #[inline]
    #[must_use]
    pub fn with_uid(mut self, uid: ConnectionId) -> Self {
        self.uid = uid;
        self
    }

    /// Whether the last pass moved a fresh value across this edge
    #[inline]
    #[must_use]
    pub fn flow(&self) -> bool {
        self.flow
    }

    /// Clear the flow indicator
    pub fn reset(&mut self) {
        self.flow = false;
    }

    /// Whether either endpoint is `node`
    #[must_use]
    pub fn touches(&self, node: &NodeId) -> bool {
        self.src_node == *node || self.dst_node == *node
    }

    /// Persistent form
    #[must_use]
    pub fn serialise(&self) -> ConnectionDoc {
        ConnectionDoc {
            uid: self.uid.clone(),
            src_node_uid: self.src_node.clone(),
            src_slot_ref: SlotRefDoc::from(&self.src_slot),
            dst_node_uid: self.dst_node.clone(),
            dst_slot_ref: SlotRefDoc::from(&self.dst_slot),
        }
    }
}
