//! Error types for the graph core
//!
//! Structural mistakes made by plugin authors or callers are returned as
//! [`GraphError`]. Problems found in saved documents are not errors: they
//! are collected as [`LoadIssue`]s while the rest of the document loads.

use patchbay_types::{ConnectionId, Direction, GraphId, NodeId, SlotId, SlotRef};
use std::fmt;
use thiserror::Error;

/// Hard failures of graph operations
#[derive(Error, Debug)]
pub enum GraphError {
    /// Plugin declares two static slots with the same name on one side
    #[error("plugin '{plugin}' declares {direction} slot '{name}' twice")]
    DuplicateSlotName {
        /// Plugin id
        plugin: String,
        /// Offending slot name
        name: String,
        /// Side of the node
        direction: Direction,
    },

    /// Dynamic slot declared without a datatype
    #[error("no datatype given for slot '{0}'")]
    MissingSlotDatatype(String),

    /// Dynamic slot declared without a name
    #[error("no name given for dynamic slot")]
    MissingSlotName,

    /// Node not in this graph
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Slot reference does not resolve on the node
    #[error("slot {slot} not found on node {node}")]
    SlotNotFound {
        /// Node searched
        node: NodeId,
        /// Unresolved reference
        slot: SlotRef,
    },

    /// Connection endpoints on the wrong side
    #[error("connection must run from an output to an input, got {src} -> {dst}")]
    DirectionMismatch {
        /// Source reference
        src: SlotRef,
        /// Destination reference
        dst: SlotRef,
    },

    /// No plugin registered under the id
    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),

    /// Node's plugin is not of the kind the operation needs
    #[error("node {node} is not a '{expected}' node")]
    PluginMismatch {
        /// Node inspected
        node: NodeId,
        /// Expected plugin kind
        expected: String,
    },

    /// Plugin rejected a state document
    #[error("invalid state for plugin '{plugin}': {source}")]
    InvalidState {
        /// Plugin id
        plugin: String,
        /// Parse failure
        #[source]
        source: serde_json::Error,
    },

    /// Document could not be parsed or written
    #[error("patch document error: {0}")]
    Document(#[from] serde_json::Error),
}

/// Convenience result alias
pub type GraphResult<T> = Result<T, GraphError>;

/// Recoverable problem found while loading a document
#[derive(Debug, Clone, PartialEq)]
pub enum LoadIssue {
    /// Node skipped because its plugin is not registered
    UnknownPlugin {
        /// Skipped node
        node: NodeId,
        /// Missing plugin id
        plugin: String,
    },
    /// Dynamic slot datatype id not in the registry; slot typed as wildcard
    UnknownDatatype {
        /// Owning node
        node: NodeId,
        /// Affected slot
        slot: SlotId,
        /// Unrecognised id
        dt: u32,
    },
    /// Connection dropped because an endpoint did not resolve
    PrunedConnection {
        /// Dropped connection
        connection: ConnectionId,
        /// What failed to resolve
        reason: String,
    },
    /// Parent graph id not found in the registry
    UnresolvedParent {
        /// Graph being linked
        graph: GraphId,
        /// Missing parent
        parent: GraphId,
    },
    /// Node skipped because its saved form is malformed
    RejectedNode {
        /// Skipped node
        node: NodeId,
        /// What was wrong
        message: String,
    },
    /// Saved plugin state was rejected; plugin keeps its defaults
    RejectedState {
        /// Affected node
        node: NodeId,
        /// Parser message
        message: String,
    },
}

impl fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPlugin { node, plugin } => {
                write!(f, "node {node}: unknown plugin '{plugin}', node skipped")
            }
            Self::UnknownDatatype { node, slot, dt } => {
                write!(f, "node {node}: slot {slot} has unknown datatype {dt}")
            }
            Self::PrunedConnection { connection, reason } => {
                write!(f, "connection {connection} pruned: {reason}")
            }
            Self::UnresolvedParent { graph, parent } => {
                write!(f, "graph {graph}: parent {parent} not found")
            }
            Self::RejectedNode { node, message } => {
                write!(f, "node {node}: {message}, node skipped")
            }
            Self::RejectedState { node, message } => {
                write!(f, "node {node}: state rejected: {message}")
            }
        }
    }
}

/// Issues collected during one load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Issues in the order they were found
    pub issues: Vec<LoadIssue>,
}

impl LoadReport {
    /// Whether the document loaded without any recovery
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Record an issue
    pub fn push(&mut self, issue: LoadIssue) {
        self.issues.push(issue);
    }

    /// Number of connections dropped
    #[must_use]
    pub fn pruned_connections(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i, LoadIssue::PrunedConnection { .. }))
            .count()
    }

    /// Number of nodes skipped
    #[must_use]
    pub fn skipped_nodes(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| {
                matches!(
                    i,
                    LoadIssue::UnknownPlugin { .. } | LoadIssue::RejectedNode { .. }
                )
            })
            .count()
    }

    pub(crate) fn extend(&mut self, other: LoadReport) {
        self.issues.extend(other.issues);
    }
}
