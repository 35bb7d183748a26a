//! Slot descriptors

use crate::datatype::DataType;
use crate::id::SlotId;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of a node a slot sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Receives values
    Input,
    /// Produces values
    Output,
}

impl Direction {
    /// The other direction
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Reference to a slot on some node
///
/// Static slots are addressed by their index among the plugin's slots of
/// that direction; dynamic slots by their uid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotRef {
    /// Slot declared by the plugin
    Static {
        /// Side of the node
        direction: Direction,
        /// Position among the static slots of that side
        index: usize,
    },
    /// Slot created at runtime
    Dynamic {
        /// Side of the node
        direction: Direction,
        /// Stable identity
        uid: SlotId,
    },
}

impl SlotRef {
    /// Static input at `index`
    #[must_use]
    pub const fn input(index: usize) -> Self {
        Self::Static {
            direction: Direction::Input,
            index,
        }
    }

    /// Static output at `index`
    #[must_use]
    pub const fn output(index: usize) -> Self {
        Self::Static {
            direction: Direction::Output,
            index,
        }
    }

    /// Dynamic slot
    #[must_use]
    pub fn dynamic(direction: Direction, uid: SlotId) -> Self {
        Self::Dynamic { direction, uid }
    }

    /// Side of the node this slot sits on
    #[must_use]
    pub fn direction(&self) -> Direction {
        match self {
            Self::Static { direction, .. } | Self::Dynamic { direction, .. } => *direction,
        }
    }

    /// Whether this refers to a dynamic slot
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }

    /// Dynamic uid, if any
    #[must_use]
    pub fn uid(&self) -> Option<&SlotId> {
        match self {
            Self::Dynamic { uid, .. } => Some(uid),
            Self::Static { .. } => None,
        }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static { direction, index } => write!(f, "{direction}[{index}]"),
            Self::Dynamic { direction, uid } => write!(f, "{direction}<{uid}>"),
        }
    }
}

/// One typed attachment point on a node
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Unique per node and direction
    pub name: String,
    /// Side of the node
    pub direction: Direction,
    /// Position among siblings of the same kind and direction
    pub index: usize,
    /// Datatype, possibly the wildcard
    pub dt: DataType,
    /// Carries a sequence rather than a scalar
    pub array: bool,
    /// Value used when nothing is connected and no overlay is set
    pub default: Option<Value>,
    /// Lower bound hint
    pub min: Option<f64>,
    /// Upper bound hint
    pub max: Option<f64>,
    /// Free-form description
    pub desc: Option<String>,
    /// Present only on dynamic slots
    pub uid: Option<SlotId>,
    /// At least one connection references this slot
    pub connected: bool,
    /// Input temporarily disabled, e.g. by a conditional
    pub inactive: bool,
}

impl Slot {
    /// New slot of the given direction
    #[must_use]
    pub fn new(name: impl Into<String>, direction: Direction, dt: DataType) -> Self {
        Self {
            name: name.into(),
            direction,
            index: 0,
            dt,
            array: false,
            default: None,
            min: None,
            max: None,
            desc: None,
            uid: None,
            connected: false,
            inactive: false,
        }
    }

    /// New input slot
    #[must_use]
    pub fn input(name: impl Into<String>, dt: DataType) -> Self {
        Self::new(name, Direction::Input, dt)
    }

    /// New output slot
    #[must_use]
    pub fn output(name: impl Into<String>, dt: DataType) -> Self {
        Self::new(name, Direction::Output, dt)
    }

    /// Set the default value
    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set the value range hint
    #[inline]
    #[must_use]
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Mark as carrying a sequence
    #[inline]
    #[must_use]
    pub fn as_array(mut self) -> Self {
        self.array = true;
        self
    }

    /// Set the description
    #[inline]
    #[must_use]
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// Whether the slot was created at runtime
    #[inline]
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.uid.is_some()
    }

    /// Reference addressing this slot
    #[must_use]
    pub fn slot_ref(&self) -> SlotRef {
        match &self.uid {
            Some(uid) => SlotRef::dynamic(self.direction, uid.clone()),
            None => SlotRef::Static {
                direction: self.direction,
                index: self.index,
            },
        }
    }

    /// Explicit default, else the datatype's zero value
    #[must_use]
    pub fn default_value(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| self.dt.default_value())
    }
}
