//! Patchbay Types - shared vocabulary
//!
//! Leaf crate holding the identifiers, datatype registry, values and slot
//! descriptors used by the graph core and the plugin library.

pub mod datatype;
pub mod id;
pub mod slot;
pub mod value;

pub use datatype::DataType;
pub use id::{ConnectionId, GraphId, NodeId, SlotId};
pub use slot::{Direction, Slot, SlotRef};
pub use value::Value;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
