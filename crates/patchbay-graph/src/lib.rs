//! Patchbay Graph - incremental dataflow evaluation core
//!
//! The graph core that:
//! - Owns nodes and connections of nested patch graphs
//! - Evaluates them once per frame, pulling values from sources first
//! - Tracks dynamic slots and infers their datatypes through linked groups
//! - Saves and loads graphs through a two-phase build and link
//! - Keeps independently evaluated copies for array semantics
//!
//! # Example
//!
//! ```rust,ignore
//! use patchbay_graph::prelude::*;
//!
//! let core = Core::new(my_plugins);
//! let mut graph = core.new_graph();
//! let constant = graph.create_node("constant_float", 0.0, 0.0)?;
//! let sink = graph.create_node("recorder", 200.0, 0.0)?;
//! graph.connect(Connection::new(
//!     constant,
//!     SlotRef::output(0),
//!     sink,
//!     SlotRef::input(0),
//! ))?;
//!
//! let mut ctx = UpdateContext::new(0.0, 0.0, 0);
//! while graph.update(&ctx) {
//!     ctx.advance(1.0 / 60.0);
//! }
//! ```

#![warn(unreachable_pub)]

pub mod analysis;
pub mod config;
pub mod connection;
pub mod doc;
pub mod dynamic;
pub mod error;
pub mod events;
pub mod graph;
pub mod group;
pub mod load;
pub mod node;
pub mod plugin;
pub mod registry;
pub mod session;
pub mod update;
pub mod variables;

pub use config::CoreConfig;
pub use connection::Connection;
pub use doc::{ConnectionDoc, GraphDoc, NodeDoc, SlotDoc, SlotRefDoc, VariableDoc, VariablesDoc};
pub use dynamic::{DynamicSlots, SlotDef};
pub use error::{GraphError, GraphResult, LoadIssue, LoadReport};
pub use events::{EventBus, GraphEvent, GraphObserver, SubscriptionId};
pub use graph::{Graph, NodeOrder};
pub use group::LinkedSlotGroup;
pub use load::{LinkedGraph, UnlinkedGraph, UnlinkedNode};
pub use node::{Node, ENTITY_PLUGIN};
pub use plugin::{
    merge_known_keys, AsAny, ConnectionChange, Plugin, PluginFactory, SlotLink, UpdateContext,
};
pub use registry::{GraphEntry, GraphRegistry};
pub use session::Core;
pub use variables::{Variable, Variables};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building and running graphs
    pub use crate::{
        Connection, Core, CoreConfig, DynamicSlots, Graph, GraphError, GraphEvent, GraphResult,
        LinkedSlotGroup, Node, Plugin, PluginFactory, SlotDef, SlotLink, UpdateContext,
    };
    pub use patchbay_types::{DataType, Direction, NodeId, Slot, SlotRef, Value};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
