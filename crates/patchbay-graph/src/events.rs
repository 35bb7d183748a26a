//! Structural change notifications
//!
//! Graph mutations publish a [`GraphEvent`] on the [`EventBus`]. Delivery is
//! synchronous and observers cannot fail the operation that emitted.

use parking_lot::RwLock;
use patchbay_types::{ConnectionId, GraphId, NodeId, SlotRef, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A structural or evaluation change
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// Node inserted
    NodeAdded {
        /// Owning graph
        graph: GraphId,
        /// New node
        node: NodeId,
    },
    /// Node removed
    NodeRemoved {
        /// Owning graph
        graph: GraphId,
        /// Removed node
        node: NodeId,
    },
    /// Node title changed
    NodeRenamed {
        /// Owning graph
        graph: GraphId,
        /// Renamed node
        node: NodeId,
        /// New title, none when reverted to the plugin name
        title: Option<String>,
    },
    /// Dynamic slot added
    SlotAdded {
        /// Owning graph
        graph: GraphId,
        /// Owning node
        node: NodeId,
        /// New slot
        slot: SlotRef,
    },
    /// Dynamic slot removed
    SlotRemoved {
        /// Owning graph
        graph: GraphId,
        /// Owning node
        node: NodeId,
        /// Removed slot
        slot: SlotRef,
    },
    /// Dynamic slot renamed
    SlotRenamed {
        /// Owning graph
        graph: GraphId,
        /// Owning node
        node: NodeId,
        /// Renamed slot
        slot: SlotRef,
        /// New name
        name: String,
    },
    /// Connection attached
    Connected {
        /// Owning graph
        graph: GraphId,
        /// New connection
        connection: ConnectionId,
    },
    /// Connection detached
    Disconnected {
        /// Owning graph
        graph: GraphId,
        /// Removed connection
        connection: ConnectionId,
    },
    /// A connection started or stopped carrying fresh values
    FlowChanged {
        /// Owning graph
        graph: GraphId,
        /// Connection
        connection: ConnectionId,
        /// New flow state
        flow: bool,
    },
    /// User-set input value changed
    UiSlotValueChanged {
        /// Owning graph
        graph: GraphId,
        /// Owning node
        node: NodeId,
        /// Input slot name
        slot: String,
        /// New value
        value: Value,
    },
    /// One key of a plugin's state changed
    PluginStateChanged {
        /// Owning graph
        graph: GraphId,
        /// Owning node
        node: NodeId,
        /// State key
        key: String,
    },
    /// Node expanded or collapsed
    OpenStateChanged {
        /// Owning graph
        graph: GraphId,
        /// Node
        node: NodeId,
        /// New state
        open: bool,
    },
}

impl GraphEvent {
    /// Graph the event originated in
    #[must_use]
    pub fn graph(&self) -> &GraphId {
        match self {
            Self::NodeAdded { graph, .. }
            | Self::NodeRemoved { graph, .. }
            | Self::NodeRenamed { graph, .. }
            | Self::SlotAdded { graph, .. }
            | Self::SlotRemoved { graph, .. }
            | Self::SlotRenamed { graph, .. }
            | Self::Connected { graph, .. }
            | Self::Disconnected { graph, .. }
            | Self::FlowChanged { graph, .. }
            | Self::UiSlotValueChanged { graph, .. }
            | Self::PluginStateChanged { graph, .. }
            | Self::OpenStateChanged { graph, .. } => graph,
        }
    }
}

/// Receives graph events
pub trait GraphObserver: Send + Sync {
    /// Called synchronously for every event
    fn notify(&self, event: &GraphEvent);
}

impl<F> GraphObserver for F
where
    F: Fn(&GraphEvent) + Send + Sync,
{
    fn notify(&self, event: &GraphEvent) {
        self(event);
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ObserverList = Vec<(SubscriptionId, Arc<dyn GraphObserver>)>;

/// Fan-out of graph events to observers
#[derive(Clone, Default)]
pub struct EventBus {
    observers: Arc<RwLock<ObserverList>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a bus with no observers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer
    pub fn subscribe(&self, observer: Arc<dyn GraphObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    /// Remove an observer; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    /// Deliver an event to every observer
    pub fn emit(&self, event: &GraphEvent) {
        // Snapshot so observers may subscribe or unsubscribe while notified
        let observers: Vec<Arc<dyn GraphObserver>> = self
            .observers
            .read()
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();

        for observer in observers {
            observer.notify(event);
        }
    }

    /// Number of registered observers
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observer_count())
            .finish()
    }
}
