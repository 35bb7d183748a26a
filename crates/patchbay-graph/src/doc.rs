//! Persistent document model
//!
//! Plain serde structs mirroring the saved patch format. Loading tolerates
//! documents written by older releases: ids may be numbers, `parent_uid` may
//! be `-1`, and variables may be stored under `registers`.

use patchbay_types::{ConnectionId, DataType, Direction, GraphId, NodeId, Slot, SlotId, SlotRef, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Saved graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDoc {
    /// Graph id
    #[serde(default)]
    pub uid: GraphId,
    /// Containing graph, `-1` when none
    #[serde(default, with = "parent_uid")]
    pub parent_uid: Option<GraphId>,
    /// Whether the graph was open in the editor
    #[serde(default)]
    pub open: bool,
    /// Nodes in render order
    #[serde(default)]
    pub nodes: Vec<NodeDoc>,
    /// Connections
    #[serde(default)]
    pub conns: Vec<ConnectionDoc>,
    /// Graph variables
    #[serde(default, alias = "registers", skip_serializing_if = "Option::is_none")]
    pub variables: Option<VariablesDoc>,
}

impl GraphDoc {
    /// Parse a document
    ///
    /// # Errors
    ///
    /// Returns the JSON error for malformed input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write the document
    ///
    /// # Errors
    ///
    /// Returns the JSON error if a value cannot be represented.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Write the document with indentation
    ///
    /// # Errors
    ///
    /// Returns the JSON error if a value cannot be represented.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Saved node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDoc {
    /// Plugin id
    pub plugin: String,
    /// Horizontal position
    #[serde(default)]
    pub x: f64,
    /// Vertical position
    #[serde(default)]
    pub y: f64,
    /// Node id
    #[serde(default)]
    pub uid: NodeId,
    /// User-set input values
    #[serde(
        default,
        rename = "uiSlotValues",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub ui_slot_values: BTreeMap<String, Value>,
    /// Present only when collapsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<bool>,
    /// Plugin state blob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
    /// Title override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Inner graph of subgraph nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<Box<GraphDoc>>,
    /// Dynamic inputs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dyn_in: Vec<SlotDoc>,
    /// Dynamic outputs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dyn_out: Vec<SlotDoc>,
}

impl NodeDoc {
    /// Minimal document for a plugin
    #[must_use]
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            x: 0.0,
            y: 0.0,
            uid: NodeId::new(),
            ui_slot_values: BTreeMap::new(),
            open: None,
            state: None,
            title: None,
            graph: None,
            dyn_in: Vec::new(),
            dyn_out: Vec::new(),
        }
    }
}

/// Saved dynamic slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDoc {
    /// Slot id
    #[serde(default)]
    pub uid: SlotId,
    /// Slot name
    pub name: String,
    /// Datatype id
    pub dt: u32,
    /// Carries a sequence
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub array: bool,
    /// Position among siblings
    #[serde(default)]
    pub index: usize,
    /// Default value
    #[serde(default, rename = "def", skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Lower bound hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl From<&Slot> for SlotDoc {
    fn from(slot: &Slot) -> Self {
        Self {
            uid: slot.uid.clone().unwrap_or_default(),
            name: slot.name.clone(),
            dt: slot.dt.id(),
            array: slot.array,
            index: slot.index,
            default: slot.default.clone(),
            min: slot.min,
            max: slot.max,
        }
    }
}

/// Saved connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDoc {
    /// Connection id
    #[serde(default)]
    pub uid: ConnectionId,
    /// Producing node
    pub src_node_uid: NodeId,
    /// Output slot on the producing node
    pub src_slot_ref: SlotRefDoc,
    /// Consuming node
    pub dst_node_uid: NodeId,
    /// Input slot on the consuming node
    pub dst_slot_ref: SlotRefDoc,
}

/// Saved slot reference; direction is implied by the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotRefDoc {
    /// Dynamic slot by uid
    Dynamic {
        /// Slot id
        uid: SlotId,
    },
    /// Static slot by index
    Static {
        /// Slot index
        index: usize,
    },
}

impl SlotRefDoc {
    /// Resolve into a reference on the given side
    #[must_use]
    pub fn to_slot_ref(&self, direction: Direction) -> SlotRef {
        match self {
            Self::Dynamic { uid } => SlotRef::dynamic(direction, uid.clone()),
            Self::Static { index } => SlotRef::Static {
                direction,
                index: *index,
            },
        }
    }
}

impl From<&SlotRef> for SlotRefDoc {
    fn from(slot: &SlotRef) -> Self {
        match slot {
            SlotRef::Dynamic { uid, .. } => Self::Dynamic { uid: uid.clone() },
            SlotRef::Static { index, .. } => Self::Static { index: *index },
        }
    }
}

/// Saved variables, keyed by name
pub type VariablesDoc = BTreeMap<String, VariableDoc>;

/// Saved variable declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDoc {
    /// Datatype
    pub dt: DataType,
    /// Carries a sequence
    #[serde(default)]
    pub array: bool,
}

/// `parent_uid` is written as `-1` when absent and read from `-1`, null,
/// a string or a number.
mod parent_uid {
    use patchbay_types::GraphId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Option<GraphId>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(uid) => serializer.serialize_str(uid.as_str()),
            None => serializer.serialize_i64(-1),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<GraphId>, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Number(n)) if n.as_i64() == Some(-1) => None,
            Some(serde_json::Value::Number(n)) => Some(GraphId::from(n.to_string())),
            Some(serde_json::Value::String(s)) if s == "-1" || s.is_empty() => None,
            Some(serde_json::Value::String(s)) => Some(GraphId::from(s)),
            Some(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parent_uid_forms() {
        let doc: GraphDoc = serde_json::from_value(json!({"uid": "g", "parent_uid": -1})).unwrap();
        assert_eq!(doc.parent_uid, None);

        let doc: GraphDoc = serde_json::from_value(json!({"uid": "g", "parent_uid": 12})).unwrap();
        assert_eq!(doc.parent_uid, Some(GraphId::from("12")));

        let doc: GraphDoc = serde_json::from_value(json!({"uid": "g"})).unwrap();
        assert_eq!(doc.parent_uid, None);

        let written = serde_json::to_value(&doc).unwrap();
        assert_eq!(written["parent_uid"], json!(-1));
    }

    #[test]
    fn registers_alias_reads_variables() {
        let doc: GraphDoc = serde_json::from_value(json!({
            "uid": "g",
            "registers": {"speed": {"dt": 0}}
        }))
        .unwrap();
        let vars = doc.variables.unwrap();
        assert_eq!(vars["speed"].dt, DataType::Float);
        assert!(!vars["speed"].array);
    }

    #[test]
    fn slot_refs_by_index_or_uid() {
        let conn: ConnectionDoc = serde_json::from_value(json!({
            "uid": 3,
            "srcNodeUid": "a",
            "srcSlotRef": {"index": 0},
            "dstNodeUid": "b",
            "dstSlotRef": {"uid": 9, "index": 1}
        }))
        .unwrap();

        assert_eq!(conn.uid, ConnectionId::from("3"));
        assert_eq!(conn.src_slot_ref, SlotRefDoc::Static { index: 0 });
        assert_eq!(
            conn.dst_slot_ref,
            SlotRefDoc::Dynamic {
                uid: SlotId::from("9")
            }
        );
    }

    #[test]
    fn optional_node_fields_are_omitted() {
        let mut node = NodeDoc::new("constant_float");
        node.uid = NodeId::from("n1");
        let written = serde_json::to_value(&node).unwrap();
        assert_eq!(
            written,
            json!({"plugin": "constant_float", "x": 0.0, "y": 0.0, "uid": "n1"})
        );
    }
}
