//! Graphs of nodes and connections
//!
//! A [`Graph`] owns its nodes and connections in arenas keyed by id.
//! Nodes without any output slot are roots and seed the pull evaluation;
//! nodes whose plugin owns an inner graph are children and are visited as
//! a fallback. Structural edits go through the graph so both endpoint
//! nodes, the root set and observers stay consistent.

use crate::connection::Connection;
use crate::doc::{GraphDoc, NodeDoc};
use crate::dynamic::SlotDef;
use crate::error::{GraphError, GraphResult, LoadReport};
use crate::events::GraphEvent;
use crate::load::UnlinkedGraph;
use crate::node::Node;
use crate::plugin::{ConnectionChange, SlotLink};
use crate::registry::GraphRegistry;
use crate::session::Core;
use crate::variables::Variables;
use indexmap::IndexMap;
use patchbay_types::{
    ConnectionId, DataType, Direction, GraphId, NodeId, Slot, SlotId, SlotRef, Value,
};
use std::fmt;
use tracing::{debug, warn};

/// Insert position used when restoring a node, e.g. on undo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeOrder {
    /// Position in the node list
    pub nodes: usize,
    /// Position in the children list, for subgraph nodes
    pub children: Option<usize>,
}

/// A graph of nodes
///
/// A graph registered by a load or by its parent leaves the registry when
/// dropped.
pub struct Graph {
    pub(crate) core: Core,
    pub(crate) registry: GraphRegistry,
    pub(crate) uid: GraphId,
    pub(crate) parent: Option<GraphId>,
    pub(crate) open: bool,
    pub(crate) nodes: IndexMap<NodeId, Node>,
    pub(crate) connections: IndexMap<ConnectionId, Connection>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) variables: Variables,
    pub(crate) copies: Vec<Graph>,
    pub(crate) is_copy: bool,
    pub(crate) detached: bool,
    /// Whether this instance owns its registry entry
    pub(crate) registered: bool,
}

impl Graph {
    /// Empty graph with a fresh id
    #[must_use]
    pub fn new(core: &Core) -> Self {
        Self::with_uid(core, GraphId::new())
    }

    /// Empty graph with a known id
    #[must_use]
    pub fn with_uid(core: &Core, uid: GraphId) -> Self {
        Self {
            core: core.clone(),
            registry: core.registry().clone(),
            uid,
            parent: None,
            open: false,
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            roots: Vec::new(),
            children: Vec::new(),
            variables: Variables::new(),
            copies: Vec::new(),
            is_copy: false,
            detached: false,
            registered: false,
        }
    }

    /// Parse, link and initialise a saved graph
    ///
    /// # Errors
    ///
    /// Malformed JSON or a plugin that declares duplicate slot names.
    pub fn from_json(json: &str, core: &Core) -> GraphResult<(Self, LoadReport)> {
        let doc = GraphDoc::from_json(json)?;
        Self::load(doc, core)
    }

    /// Build, link against the session registry and initialise a saved
    /// graph
    ///
    /// # Errors
    ///
    /// A plugin that declares duplicate slot names.
    pub fn load(doc: GraphDoc, core: &Core) -> GraphResult<(Self, LoadReport)> {
        let linked = UnlinkedGraph::build(doc, core)?.link();
        let mut graph = linked.graph;
        graph.initialise();
        Ok((graph, linked.report))
    }

    /// Graph id
    #[must_use]
    pub fn uid(&self) -> &GraphId {
        &self.uid
    }

    /// Containing graph
    #[must_use]
    pub fn parent(&self) -> Option<&GraphId> {
        self.parent.as_ref()
    }

    /// Session handle
    #[must_use]
    pub fn core(&self) -> &Core {
        &self.core
    }

    /// Whether the graph is open in the editor
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Mark the graph open or closed in the editor
    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    /// Whether this graph is a copy made by [`Graph::make_copy`]
    #[must_use]
    pub fn is_copy(&self) -> bool {
        self.is_copy
    }

    /// Graph variables
    #[must_use]
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Number of nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of connections
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Nodes in render order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Node ids in render order
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Connections in creation order
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Node by id, without logging a miss
    #[must_use]
    pub fn node(&self, uid: &NodeId) -> Option<&Node> {
        self.nodes.get(uid)
    }

    /// Node by id, mutably
    pub fn node_mut(&mut self, uid: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(uid)
    }

    /// Connection by id, without logging a miss
    #[must_use]
    pub fn connection(&self, uid: &ConnectionId) -> Option<&Connection> {
        self.connections.get(uid)
    }

    /// Evaluation entry points
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Nodes owning an inner graph
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn emit(&self, event: GraphEvent) {
        if !self.detached {
            self.core.events().emit(&event);
        }
    }

    /// Insert a node and keep the root and children sets consistent,
    /// without notifying observers
    pub fn register_node(&mut self, mut node: Node, order: Option<NodeOrder>) -> NodeId {
        let id = node.uid.clone();
        if self.nodes.contains_key(&id) {
            warn!(graph = %self.uid, node = %id, "node registered twice, replacing");
            if let Some(inner) = self.nodes.get_mut(&id).and_then(|n| n.plugin.graph_mut()) {
                inner.release_registration();
            }
            self.roots.retain(|r| *r != id);
            self.children.retain(|c| *c != id);
        }
        node.parent_graph = Some(self.uid.clone());

        if let Some(inner) = node.plugin.graph_mut() {
            inner.parent = Some(self.uid.clone());
            if !self.detached {
                self.registry
                    .register(inner.uid.clone(), Some(self.uid.clone()));
                inner.registered = true;
            }
            match order.and_then(|o| o.children) {
                Some(at) => self
                    .children
                    .insert(at.min(self.children.len()), id.clone()),
                None => self.children.push(id.clone()),
            }
        }

        if !node.has_output_slots() {
            self.roots.push(id.clone());
        }

        match order {
            Some(o) if !self.nodes.contains_key(&id) => {
                let at = o.nodes.min(self.nodes.len());
                self.nodes.shift_insert(at, id.clone(), node);
            }
            _ => {
                self.nodes.insert(id.clone(), node);
            }
        }
        id
    }

    /// Insert a node and notify observers
    pub fn add_node(&mut self, node: Node, order: Option<NodeOrder>) -> NodeId {
        let id = self.register_node(node, order);
        debug!(graph = %self.uid, node = %id, "node added");
        self.emit(GraphEvent::NodeAdded {
            graph: self.uid.clone(),
            node: id.clone(),
        });
        id
    }

    /// Instantiate a plugin, give it its initial dynamic slots and add it
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownPlugin`] or slot declaration errors.
    pub fn create_node(&mut self, plugin_id: &str, x: f64, y: f64) -> GraphResult<NodeId> {
        let mut node = self.core.instantiate(plugin_id)?.at(x, y);
        node.parent_graph = Some(self.uid.clone());
        node.create_slots();
        if let Some(inner) = node.plugin.graph_mut() {
            inner.parent = Some(self.uid.clone());
        }
        node.initialise(&[]);
        node.reset();
        Ok(self.add_node(node, None))
    }

    /// Re-create a node from its saved form, e.g. to undo a removal
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownPlugin`] or slot declaration errors.
    pub fn hydrate_node(&mut self, doc: NodeDoc, order: Option<NodeOrder>) -> GraphResult<NodeId> {
        let mut report = LoadReport::default();
        let unlinked = crate::load::build_node(doc, &self.core, &mut report)?;
        let node = unlinked.link(&self.uid, &self.registry, self.detached, &mut report);
        for issue in &report.issues {
            warn!(graph = %self.uid, %issue, "while hydrating node");
        }

        let id = self.add_node(node, order);
        let links = self.slot_links(&id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.initialise(&links);
            node.reset();
        }
        Ok(id)
    }

    /// Remove a node, detaching its connections and tearing down its plugin
    pub fn remove_node(&mut self, uid: &NodeId) -> Option<Node> {
        let Some(node) = self.nodes.get(uid) else {
            warn!(graph = %self.uid, node = %uid, "cannot remove unknown node");
            return None;
        };
        let attached: Vec<ConnectionId> = node
            .inputs
            .iter()
            .chain(node.outputs.iter())
            .cloned()
            .collect();
        for connection in &attached {
            self.disconnect(connection);
        }

        let mut node = self.nodes.shift_remove(uid)?;
        self.roots.retain(|r| r != uid);
        self.children.retain(|c| c != uid);

        if let Some(inner) = node.plugin.graph_mut() {
            if !self.detached {
                self.registry.unregister_tree(&inner.uid);
            }
            inner.release_registration();
        }
        node.plugin.stop();
        node.plugin.destroy();
        node.parent_graph = None;

        debug!(graph = %self.uid, node = %uid, "node removed");
        self.emit(GraphEvent::NodeRemoved {
            graph: self.uid.clone(),
            node: uid.clone(),
        });
        Some(node)
    }

    /// Set or clear a node's title
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`].
    pub fn rename_node(&mut self, uid: &NodeId, title: Option<String>) -> GraphResult<()> {
        let node = self.require_node_mut(uid)?;
        node.title = title.clone();
        self.emit(GraphEvent::NodeRenamed {
            graph: self.uid.clone(),
            node: uid.clone(),
            title,
        });
        Ok(())
    }

    /// Expand or collapse a node
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`].
    pub fn set_node_open(&mut self, uid: &NodeId, open: bool) -> GraphResult<()> {
        self.require_node_mut(uid)?.open = open;
        self.emit(GraphEvent::OpenStateChanged {
            graph: self.uid.clone(),
            node: uid.clone(),
            open,
        });
        Ok(())
    }

    /// Move `original` next to `sibling` in the node and children orders
    pub fn reorder_children(&mut self, original: &NodeId, sibling: &NodeId, insert_after: bool) -> bool {
        let (Some(from), Some(to)) = (
            self.nodes.get_index_of(original),
            self.nodes.get_index_of(sibling),
        ) else {
            warn!(graph = %self.uid, "cannot reorder unknown nodes");
            return false;
        };
        if from == to {
            return true;
        }
        let last = self.nodes.len() - 1;
        self.nodes
            .move_index(from, reorder_target(from, to, insert_after).min(last));

        let from = self.children.iter().position(|c| c == original);
        let to = self.children.iter().position(|c| c == sibling);
        if let (Some(from), Some(to)) = (from, to) {
            let item = self.children.remove(from);
            let target = reorder_target(from, to, insert_after).min(self.children.len());
            self.children.insert(target, item);
        }
        true
    }

    pub(crate) fn require_node_mut(&mut self, uid: &NodeId) -> GraphResult<&mut Node> {
        self.nodes
            .get_mut(uid)
            .ok_or_else(|| GraphError::NodeNotFound(uid.clone()))
    }

    fn require_slot(&self, node: &NodeId, slot: &SlotRef) -> GraphResult<Slot> {
        self.nodes
            .get(node)
            .ok_or_else(|| GraphError::NodeNotFound(node.clone()))?
            .slot(slot)
            .cloned()
            .ok_or_else(|| GraphError::SlotNotFound {
                node: node.clone(),
                slot: slot.clone(),
            })
    }

    fn refresh_root(&mut self, uid: &NodeId) {
        let Some(node) = self.nodes.get(uid) else {
            return;
        };
        let is_root = !node.has_output_slots();
        let listed = self.roots.contains(uid);
        if is_root && !listed {
            self.roots.push(uid.clone());
        } else if !is_root && listed {
            self.roots.retain(|r| r != uid);
        }
    }

    /// Attach a connection, replacing any connection already feeding the
    /// destination input
    ///
    /// # Errors
    ///
    /// Unknown endpoints, unresolved slots, or endpoints on the wrong side.
    pub fn connect(&mut self, connection: Connection) -> GraphResult<ConnectionId> {
        if connection.src_slot.direction() != Direction::Output
            || connection.dst_slot.direction() != Direction::Input
        {
            return Err(GraphError::DirectionMismatch {
                src: connection.src_slot,
                dst: connection.dst_slot,
            });
        }
        let src_slot = self.require_slot(&connection.src_node, &connection.src_slot)?;
        let dst_slot = self.require_slot(&connection.dst_node, &connection.dst_slot)?;

        let src_node = connection.src_node.clone();
        let dst_node = connection.dst_node.clone();
        let src_ref = connection.src_slot.clone();
        let dst_ref = connection.dst_slot.clone();
        let id = self.attach(connection);

        if let Some(node) = self.nodes.get_mut(&src_node) {
            node.connection_changed(&ConnectionChange {
                connected: true,
                link: SlotLink {
                    connection: id.clone(),
                    own: src_ref,
                    peer: dst_slot,
                },
            });
            node.queue_update(1);
        }
        if let Some(node) = self.nodes.get_mut(&dst_node) {
            node.connection_changed(&ConnectionChange {
                connected: true,
                link: SlotLink {
                    connection: id.clone(),
                    own: dst_ref,
                    peer: src_slot,
                },
            });
            node.inputs_changed = true;
        }

        debug!(graph = %self.uid, connection = %id, "connected");
        self.emit(GraphEvent::Connected {
            graph: self.uid.clone(),
            connection: id.clone(),
        });
        Ok(id)
    }

    /// Register a resolved connection with both endpoint nodes
    pub(crate) fn attach(&mut self, connection: Connection) -> ConnectionId {
        let id = connection.uid.clone();
        if self.connections.contains_key(&id) {
            warn!(graph = %self.uid, connection = %id, "connection already attached");
            return id;
        }

        for existing in self.slot_connections(&connection.dst_node, &connection.dst_slot) {
            self.disconnect(&existing);
        }

        let src_node = connection.src_node.clone();
        let dst_node = connection.dst_node.clone();
        let src_ref = connection.src_slot.clone();
        let dst_ref = connection.dst_slot.clone();
        self.connections.insert(id.clone(), connection);

        if let Some(node) = self.nodes.get_mut(&dst_node) {
            node.inputs.push(id.clone());
            node.set_slot_connected(&dst_ref, true);
        }
        self.sort_inputs(&dst_node);

        if let Some(node) = self.nodes.get_mut(&src_node) {
            node.outputs.push(id.clone());
            node.set_slot_connected(&src_ref, true);
        }
        id
    }

    /// Detach a connection from both endpoints and notify them
    pub fn disconnect(&mut self, uid: &ConnectionId) -> Option<Connection> {
        let Some(connection) = self.connections.shift_remove(uid) else {
            warn!(graph = %self.uid, connection = %uid, "cannot disconnect unknown connection");
            return None;
        };

        let src_slot = self
            .nodes
            .get(&connection.src_node)
            .and_then(|n| n.slot(&connection.src_slot).cloned());
        let dst_slot = self
            .nodes
            .get(&connection.dst_node)
            .and_then(|n| n.slot(&connection.dst_slot).cloned());

        if let Some(node) = self.nodes.get_mut(&connection.dst_node) {
            node.inputs.retain(|c| c != uid);
            node.set_slot_connected(&connection.dst_slot, false);
            node.inputs_changed = true;
        }

        if let Some(node) = self.nodes.get_mut(&connection.src_node) {
            node.outputs.retain(|c| c != uid);
            let still_used = node.outputs.iter().any(|c| {
                self.connections
                    .get(c)
                    .is_some_and(|other| other.src_slot == connection.src_slot)
            });
            if !still_used {
                node.set_slot_connected(&connection.src_slot, false);
            }
        }

        if let (Some(src_slot), Some(dst_slot)) = (src_slot, dst_slot) {
            if let Some(node) = self.nodes.get_mut(&connection.src_node) {
                node.connection_changed(&ConnectionChange {
                    connected: false,
                    link: SlotLink {
                        connection: uid.clone(),
                        own: connection.src_slot.clone(),
                        peer: dst_slot,
                    },
                });
            }
            if let Some(node) = self.nodes.get_mut(&connection.dst_node) {
                node.connection_changed(&ConnectionChange {
                    connected: false,
                    link: SlotLink {
                        connection: uid.clone(),
                        own: connection.dst_slot.clone(),
                        peer: src_slot,
                    },
                });
            }
        }

        debug!(graph = %self.uid, connection = %uid, "disconnected");
        self.emit(GraphEvent::Disconnected {
            graph: self.uid.clone(),
            connection: uid.clone(),
        });
        Some(connection)
    }

    /// Detach every connection using a slot; returns how many were removed
    pub fn disconnect_slot_connections(&mut self, node: &NodeId, slot: &SlotRef) -> usize {
        let attached = self.slot_connections(node, slot);
        for connection in &attached {
            self.disconnect(connection);
        }
        attached.len()
    }

    /// Connections using a slot
    #[must_use]
    pub fn slot_connections(&self, node: &NodeId, slot: &SlotRef) -> Vec<ConnectionId> {
        let Some(n) = self.nodes.get(node) else {
            return Vec::new();
        };
        let (list, input) = match slot.direction() {
            Direction::Input => (&n.inputs, true),
            Direction::Output => (&n.outputs, false),
        };
        list.iter()
            .filter(|cid| {
                self.connections.get(*cid).is_some_and(|c| {
                    if input {
                        c.dst_slot == *slot
                    } else {
                        c.src_slot == *slot
                    }
                })
            })
            .cloned()
            .collect()
    }

    /// Whether a slot has any connection
    #[must_use]
    pub fn slot_has_connections(&self, node: &NodeId, slot: &SlotRef) -> bool {
        !self.slot_connections(node, slot).is_empty()
    }

    /// Connection feeding an input
    #[must_use]
    pub fn find_connection_to(&self, node: &NodeId, slot: &SlotRef) -> Option<&Connection> {
        self.slot_connections(node, slot)
            .first()
            .and_then(|c| self.connections.get(c))
    }

    /// Connections leaving an output
    #[must_use]
    pub fn find_connections_from(&self, node: &NodeId, slot: &SlotRef) -> Vec<&Connection> {
        self.slot_connections(node, slot)
            .iter()
            .filter_map(|c| self.connections.get(c))
            .collect()
    }

    /// Connection by id, logging a miss
    #[must_use]
    pub fn find_connection_by_uid(&self, uid: &ConnectionId) -> Option<&Connection> {
        let found = self.connections.get(uid);
        if found.is_none() {
            warn!(graph = %self.uid, connection = %uid, "connection not found");
        }
        found
    }

    /// Node by id, logging a miss
    #[must_use]
    pub fn find_node_by_uid(&self, uid: &NodeId) -> Option<&Node> {
        let found = self.nodes.get(uid);
        if found.is_none() {
            warn!(graph = %self.uid, node = %uid, "node not found");
        }
        found
    }

    /// First node running a plugin, logging a miss
    #[must_use]
    pub fn find_node_by_plugin(&self, plugin_id: &str) -> Option<&Node> {
        let found = self.nodes.values().find(|n| n.plugin_id == plugin_id);
        if found.is_none() {
            warn!(graph = %self.uid, plugin = plugin_id, "no node runs this plugin");
        }
        found
    }

    /// This graph or a graph nested anywhere below it
    #[must_use]
    pub fn find_graph(&self, uid: &GraphId) -> Option<&Graph> {
        if self.uid == *uid {
            return Some(self);
        }
        self.nodes
            .values()
            .filter_map(|n| n.plugin.graph())
            .find_map(|g| g.find_graph(uid))
    }

    /// Mutable variant of [`Graph::find_graph`]
    pub fn find_graph_mut(&mut self, uid: &GraphId) -> Option<&mut Graph> {
        if self.uid == *uid {
            return Some(self);
        }
        for node in self.nodes.values_mut() {
            if let Some(inner) = node.plugin.graph_mut() {
                if let Some(found) = inner.find_graph_mut(uid) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Every connection touching a node, seen from that node
    #[must_use]
    pub fn slot_links(&self, uid: &NodeId) -> Vec<SlotLink> {
        let Some(node) = self.nodes.get(uid) else {
            return Vec::new();
        };
        let incoming = node.inputs.iter().filter_map(|cid| {
            let c = self.connections.get(cid)?;
            let peer = self.nodes.get(&c.src_node)?.slot(&c.src_slot)?.clone();
            Some(SlotLink {
                connection: cid.clone(),
                own: c.dst_slot.clone(),
                peer,
            })
        });
        let outgoing = node.outputs.iter().filter_map(|cid| {
            let c = self.connections.get(cid)?;
            let peer = self.nodes.get(&c.dst_node)?.slot(&c.dst_slot)?.clone();
            Some(SlotLink {
                connection: cid.clone(),
                own: c.src_slot.clone(),
                peer,
            })
        });
        incoming.chain(outgoing).collect()
    }

    fn sort_inputs(&mut self, uid: &NodeId) {
        let Some(node) = self.nodes.get(uid) else {
            return;
        };
        let mut keyed: Vec<(usize, ConnectionId)> = node
            .inputs
            .iter()
            .map(|cid| {
                let index = self
                    .connections
                    .get(cid)
                    .and_then(|c| node.slot(&c.dst_slot))
                    .map_or(usize::MAX, |s| s.index);
                (index, cid.clone())
            })
            .collect();
        keyed.sort_by_key(|(index, _)| *index);

        if let Some(node) = self.nodes.get_mut(uid) {
            node.inputs = keyed.into_iter().map(|(_, cid)| cid).collect();
        }
    }

    /// Add a dynamic slot to a node
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`], an incomplete declaration, or
    /// [`GraphError::DuplicateSlotName`] when the side already has a slot
    /// of that name.
    pub fn add_slot(&mut self, node: &NodeId, direction: Direction, def: SlotDef) -> GraphResult<SlotId> {
        let n = self.require_node_mut(node)?;
        if n.slot_name_taken(direction, &def.name, None) {
            return Err(GraphError::DuplicateSlotName {
                plugin: n.plugin_id.clone(),
                name: def.name,
                direction,
            });
        }
        let uid = n.dynamic.insert(direction, def)?;
        self.sort_inputs(node);
        self.refresh_root(node);

        self.emit(GraphEvent::SlotAdded {
            graph: self.uid.clone(),
            node: node.clone(),
            slot: SlotRef::dynamic(direction, uid.clone()),
        });
        Ok(uid)
    }

    /// Remove a dynamic slot after detaching its connections
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`].
    pub fn remove_slot(&mut self, node: &NodeId, direction: Direction, uid: &SlotId) -> GraphResult<Option<Slot>> {
        let slot_ref = SlotRef::dynamic(direction, uid.clone());
        if self.require_node_mut(node)?.dynamic.find(direction, uid).is_none() {
            warn!(graph = %self.uid, node = %node, slot = %uid, "cannot remove unknown slot");
            return Ok(None);
        }

        self.disconnect_slot_connections(node, &slot_ref);
        let removed = self.require_node_mut(node)?.dynamic.remove(direction, uid);
        self.sort_inputs(node);
        self.refresh_root(node);

        self.emit(GraphEvent::SlotRemoved {
            graph: self.uid.clone(),
            node: node.clone(),
            slot: slot_ref,
        });
        Ok(removed)
    }

    /// Rename a dynamic slot
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`], or [`GraphError::DuplicateSlotName`]
    /// when a sibling already uses the name.
    pub fn rename_slot(&mut self, node: &NodeId, direction: Direction, uid: &SlotId, name: &str) -> GraphResult<bool> {
        let n = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| GraphError::NodeNotFound(node.clone()))?;
        if n.slot_name_taken(direction, name, Some(uid)) {
            return Err(GraphError::DuplicateSlotName {
                plugin: n.plugin_id.clone(),
                name: name.to_owned(),
                direction,
            });
        }
        match n.dynamic.get_mut(uid) {
            Some(slot) if slot.direction == direction => slot.name = name.to_owned(),
            _ => {
                warn!(graph = %self.uid, node = %node, slot = %uid, "cannot rename unknown slot");
                return Ok(false);
            }
        }

        self.emit(GraphEvent::SlotRenamed {
            graph: self.uid.clone(),
            node: node.clone(),
            slot: SlotRef::dynamic(direction, uid.clone()),
            name: name.to_owned(),
        });
        Ok(true)
    }

    /// Change a dynamic slot's datatype and arrayness.
    ///
    /// Arrayness is applied first. Returns `false` when the datatype is
    /// unchanged. Connections are dropped unless the old type was the
    /// wildcard.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`].
    pub fn change_slot_datatype(
        &mut self,
        node: &NodeId,
        direction: Direction,
        uid: &SlotId,
        dt: DataType,
        array: bool,
    ) -> GraphResult<bool> {
        let n = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| GraphError::NodeNotFound(node.clone()))?;
        let Some(old) = n.dynamic.find(direction, uid).map(|s| s.dt) else {
            warn!(graph = %self.uid, node = %node, slot = %uid, "cannot retype unknown slot");
            return Ok(false);
        };
        n.dynamic.set_array(uid, array);
        if old == dt {
            return Ok(false);
        }

        if !old.is_any() {
            self.disconnect_slot_connections(node, &SlotRef::dynamic(direction, uid.clone()));
        }
        self.require_node_mut(node)?.dynamic.set_datatype(uid, dt);
        Ok(true)
    }

    /// Set a user value on an input
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`].
    pub fn set_input_slot_value(&mut self, node: &NodeId, name: &str, value: Value) -> GraphResult<bool> {
        let before = self.inactive_inputs(node);
        if !self.require_node_mut(node)?.set_input_slot_value(name, value.clone()) {
            return Ok(false);
        }
        self.refresh_reactivated(node, &before);
        self.emit(GraphEvent::UiSlotValueChanged {
            graph: self.uid.clone(),
            node: node.clone(),
            slot: name.to_owned(),
            value,
        });
        Ok(true)
    }

    /// Replace one key of a node's plugin state
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] or [`GraphError::InvalidState`].
    pub fn set_plugin_state(&mut self, node: &NodeId, key: &str, value: serde_json::Value) -> GraphResult<()> {
        let before = self.inactive_inputs(node);
        self.require_node_mut(node)?.set_plugin_state(key, value)?;
        self.refresh_reactivated(node, &before);
        self.emit(GraphEvent::PluginStateChanged {
            graph: self.uid.clone(),
            node: node.clone(),
            key: key.to_owned(),
        });
        Ok(())
    }

    /// Enable or disable an input. Re-enabling forces the branch upstream
    /// of it to deliver its value on the next pass.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`].
    pub fn set_slot_inactive(&mut self, node: &NodeId, slot: &SlotRef, inactive: bool) -> GraphResult<bool> {
        let before = self.inactive_inputs(node);
        let changed = self.require_node_mut(node)?.set_slot_inactive(slot, inactive);
        self.refresh_reactivated(node, &before);
        Ok(changed)
    }

    /// Reset every node and clear every flow indicator
    pub fn reset(&mut self) {
        for node in self.nodes.values_mut() {
            node.reset();
        }
        for connection in self.connections.values_mut() {
            connection.reset();
        }
    }

    /// Initialise every node against its current connections, then reset
    pub fn initialise(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        for id in &ids {
            let links = self.slot_links(id);
            if let Some(node) = self.nodes.get_mut(id) {
                node.initialise(&links);
            }
        }
        self.reset();
    }

    /// Start playback
    pub fn play(&mut self) {
        self.each_plugin(&mut |p| p.play());
    }

    /// Pause playback
    pub fn pause(&mut self) {
        self.each_plugin(&mut |p| p.pause());
    }

    /// Stop playback
    pub fn stop(&mut self) {
        self.each_plugin(&mut |p| p.stop());
    }

    fn each_plugin(&mut self, f: &mut dyn FnMut(&mut dyn crate::Plugin)) {
        for node in self.nodes.values_mut() {
            f(node.plugin_mut());
        }
        for copy in &mut self.copies {
            copy.each_plugin(f);
        }
    }

    /// Detach every connection and destroy every node
    pub fn destroy(&mut self) {
        let connections: Vec<ConnectionId> = self.connections.keys().cloned().collect();
        for connection in &connections {
            self.disconnect(connection);
        }
        for node in self.nodes.values_mut() {
            if let Some(inner) = node.plugin.graph_mut() {
                if !self.detached {
                    self.registry.unregister_tree(&inner.uid);
                }
                inner.release_registration();
            }
            node.plugin.destroy();
        }
        self.clear_copies();
        self.nodes.clear();
        self.roots.clear();
        self.children.clear();
    }

    /// Persistent form
    #[must_use]
    pub fn serialise(&self) -> GraphDoc {
        GraphDoc {
            uid: self.uid.clone(),
            parent_uid: self.parent.clone(),
            open: self.open,
            nodes: self.nodes.values().map(|n| n.serialise(false)).collect(),
            conns: self.connections.values().map(Connection::serialise).collect(),
            variables: self.variables.serialise(),
        }
    }

    /// Serialise to JSON text
    ///
    /// # Errors
    ///
    /// Values that JSON cannot represent.
    pub fn to_json(&self) -> GraphResult<String> {
        Ok(self.serialise().to_json()?)
    }

    /// Clone the graph through a full save and load round trip and store
    /// the result at `index` (appended when out of range)
    ///
    /// # Errors
    ///
    /// A plugin whose saved form no longer builds.
    pub fn make_copy(&mut self, index: usize) -> GraphResult<&mut Graph> {
        let json = self.serialise().to_json()?;
        let doc = GraphDoc::from_json(&json)?;
        let linked = UnlinkedGraph::build(doc, &self.core)?.link_detached();
        for issue in &linked.report.issues {
            warn!(graph = %self.uid, %issue, "while copying graph");
        }

        let mut copy = linked.graph;
        copy.initialise();
        copy.is_copy = true;
        Ok(self.set_copy(index, copy))
    }

    /// Store a copy at `index`, replacing and destroying any previous one
    pub fn set_copy(&mut self, index: usize, graph: Graph) -> &mut Graph {
        let at = if index < self.copies.len() {
            let mut previous = std::mem::replace(&mut self.copies[index], graph);
            previous.destroy();
            index
        } else {
            self.copies.push(graph);
            self.copies.len() - 1
        };
        &mut self.copies[at]
    }

    /// Copies in index order
    #[must_use]
    pub fn copies(&self) -> &[Graph] {
        &self.copies
    }

    /// Copy at `index`
    pub fn copy_mut(&mut self, index: usize) -> Option<&mut Graph> {
        self.copies.get_mut(index)
    }

    /// Remove and destroy the copy at `index`
    pub fn remove_copy(&mut self, index: usize) -> bool {
        if index >= self.copies.len() {
            return false;
        }
        let mut copy = self.copies.remove(index);
        copy.destroy();
        true
    }

    /// Remove and destroy every copy
    pub fn clear_copies(&mut self) {
        for mut copy in self.copies.drain(..) {
            copy.destroy();
        }
    }

    /// Give up the registry entries of this graph and every nested graph,
    /// once they have been removed from the registry
    fn release_registration(&mut self) {
        self.registered = false;
        for node in self.nodes.values_mut() {
            if let Some(inner) = node.plugin.graph_mut() {
                inner.release_registration();
            }
        }
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        // nested graphs unregister themselves as their plugins drop
        if self.registered {
            self.registry.unregister(&self.uid);
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("uid", &self.uid)
            .field("parent", &self.parent)
            .field("nodes", &self.nodes.len())
            .field("connections", &self.connections.len())
            .field("roots", &self.roots)
            .field("children", &self.children)
            .field("copies", &self.copies.len())
            .field("is_copy", &self.is_copy)
            .finish_non_exhaustive()
    }
}

fn reorder_target(from: usize, sibling: usize, insert_after: bool) -> usize {
    let sibling = if sibling > from { sibling - 1 } else { sibling };
    sibling + usize::from(insert_after)
}
