//! Fixed datatype registry
//!
//! Every slot carries one datatype. Documents refer to datatypes by their
//! numeric id, which is stable across releases.

use crate::value::Value;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Slot datatype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Scalar number
    Float,
    /// GPU texture handle
    Texture,
    /// RGBA color
    Color,
    /// 4x4 matrix
    Matrix,
    /// 3-component vector
    Vector,
    /// Camera
    Camera,
    /// Boolean
    Bool,
    /// Wildcard, resolved when connected
    Any,
    /// Text
    Text,
    /// Vertex stream
    Vertex,
    /// Generic structured object
    Object,
    /// Scene
    Scene,
    /// Mesh
    Mesh,
    /// Material
    Material,
    /// Light
    Light,
    /// Geometry
    Geometry,
    /// 3D scene object (legacy entity output)
    Object3d,
    /// Rotation quaternion
    Quaternion,
    /// Audio stream
    Audio,
    /// Video stream
    Video,
}

impl DataType {
    /// All registered datatypes, in id order
    pub const ALL: [DataType; 20] = [
        Self::Float,
        Self::Texture,
        Self::Color,
        Self::Matrix,
        Self::Vector,
        Self::Camera,
        Self::Bool,
        Self::Any,
        Self::Text,
        Self::Vertex,
        Self::Object,
        Self::Scene,
        Self::Mesh,
        Self::Material,
        Self::Light,
        Self::Geometry,
        Self::Object3d,
        Self::Quaternion,
        Self::Audio,
        Self::Video,
    ];

    /// Stable numeric id used in documents
    #[must_use]
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Look up a datatype by id
    #[must_use]
    pub fn from_id(id: u32) -> Option<Self> {
        usize::try_from(id)
            .ok()
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }

    /// Human readable name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Float => "Float",
            Self::Texture => "Texture",
            Self::Color => "Color",
            Self::Matrix => "Matrix",
            Self::Vector => "Vector",
            Self::Camera => "Camera",
            Self::Bool => "Boolean",
            Self::Any => "Arbitrary",
            Self::Text => "Text",
            Self::Vertex => "Vertex",
            Self::Object => "Object",
            Self::Scene => "Scene",
            Self::Mesh => "Mesh",
            Self::Material => "Material",
            Self::Light => "Light",
            Self::Geometry => "Geometry",
            Self::Object3d => "Object3D",
            Self::Quaternion => "Quaternion",
            Self::Audio => "Audio",
            Self::Video => "Video",
        }
    }

    /// Whether this is the wildcard type
    #[inline]
    #[must_use]
    pub fn is_any(self) -> bool {
        self == Self::Any
    }

    /// Zero value of the type
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::Float => Value::Float(0.0),
            Self::Bool => Value::Bool(false),
            Self::Text => Value::Text(String::new()),
            Self::Color => Value::from(vec![1.0, 1.0, 1.0, 1.0]),
            Self::Vector => Value::from(vec![0.0, 0.0, 0.0]),
            Self::Quaternion => Value::from(vec![0.0, 0.0, 0.0, 1.0]),
            Self::Matrix => Value::from(
                (0..16)
                    .map(|i| if i % 5 == 0 { 1.0 } else { 0.0 })
                    .collect::<Vec<f64>>(),
            ),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.id())
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = u32::deserialize(deserializer)?;
        Self::from_id(id).ok_or_else(|| {
            de::Error::invalid_value(de::Unexpected::Unsigned(u64::from(id)), &"a datatype id")
        })
    }
}
