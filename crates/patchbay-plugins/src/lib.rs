//! Patchbay Plugins - the built-in plugin library
//!
//! The plugin library that:
//! - Registers every built-in plugin kind under its id
//! - Provides constants, arithmetic, sinks and a gate
//! - Relays values with inferred types through linked slot groups
//! - Nests graphs behind proxy nodes and maps arrays through graph copies
//! - Reads and writes graph variables
//!
//! # Example
//!
//! ```rust,ignore
//! use patchbay_graph::prelude::*;
//! use patchbay_plugins::PluginLibrary;
//!
//! let core = Core::new(PluginLibrary::with_defaults());
//! let mut graph = core.new_graph();
//! let constant = graph.create_node("constant_float", 0.0, 0.0)?;
//! let double = graph.create_node("double", 100.0, 0.0)?;
//! graph.connect(Connection::new(
//!     constant,
//!     SlotRef::output(0),
//!     double,
//!     SlotRef::input(0),
//! ))?;
//! ```

#![warn(unreachable_pub)]

pub mod array;
pub mod constant;
pub mod gate;
pub mod library;
pub mod math;
pub mod pass_through;
pub mod sink;
pub mod subgraph;
pub mod variable;

pub use array::{ArrayFunction, ArrayFunctionState};
pub use constant::{ConstantBool, ConstantFloat, ConstantState};
pub use gate::Gate;
pub use library::{PluginBuilder, PluginEntry, PluginLibrary};
pub use math::{Binary, Double};
pub use pass_through::PassThrough;
pub use sink::{Log, Recorder};
pub use subgraph::{
    add_subgraph_input, add_subgraph_output, remove_subgraph_proxy, InputProxy, OutputProxy,
    Subgraph, SubgraphState, GRAPH_PLUGIN, INPUT_PROXY, OUTPUT_PROXY,
};
pub use variable::{VariableRead, VariableState, VariableWrite};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
