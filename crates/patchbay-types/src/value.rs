//! Runtime values carried over connections

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value flowing between slots
///
/// `Null` doubles as "no value": a source whose output samples to `Null`
/// is treated as not having produced anything this pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Scalar number
    Float(f64),
    /// Text
    Text(String),
    /// Homogeneous sequence (also used for vectors, colors and matrices)
    Array(Vec<Value>),
    /// Opaque structured payload
    Object(serde_json::Map<String, serde_json::Value>),
}

impl Value {
    /// Whether this is the absent value
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Boolean view; numbers are true when non-zero
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Float(v) => Some(*v != 0.0),
            _ => None,
        }
    }

    /// Text view
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Sequence view
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Wrap a scalar into a one-element array. Arrays pass through.
    #[must_use]
    pub fn wrap_array(self) -> Self {
        match self {
            Self::Array(_) => self,
            other => Self::Array(vec![other]),
        }
    }

    /// Take the first element of an array. Scalars pass through.
    #[must_use]
    pub fn first_element(self) -> Self {
        match self {
            Self::Array(items) => items.into_iter().next().unwrap_or_default(),
            other => other,
        }
    }

    /// Coerce a value sampled from a slot of arrayness `from_array` for a
    /// slot of arrayness `to_array`.
    #[must_use]
    pub fn coerce(self, from_array: bool, to_array: bool) -> Self {
        match (from_array, to_array) {
            (false, true) => self.wrap_array(),
            (true, false) => self.first_element(),
            _ => self,
        }
    }

    /// Convert into a JSON value
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Array(_) | Self::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Self::Array(v.into_iter().map(Self::Float).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_to_array_wraps() {
        assert_eq!(
            Value::from(3.0).coerce(false, true),
            Value::Array(vec![Value::Float(3.0)])
        );
    }

    #[test]
    fn array_to_scalar_takes_head() {
        let v = Value::from(vec![4.0, 5.0]);
        assert_eq!(v.coerce(true, false), Value::Float(4.0));
        assert_eq!(Value::Array(Vec::new()).coerce(true, false), Value::Null);
    }

    #[test]
    fn matching_arrayness_is_untouched() {
        let v = Value::from(vec![1.0]);
        assert_eq!(v.clone().coerce(true, true), v);
        assert_eq!(Value::from(true).coerce(false, false), Value::Bool(true));
    }

    #[test]
    fn json_shapes_deserialize() {
        let v: Value = serde_json::from_str("[1, 2.5, \"x\", null]").unwrap();
        assert_eq!(
            v,
            Value::Array(vec![
                Value::Float(1.0),
                Value::Float(2.5),
                Value::Text("x".into()),
                Value::Null,
            ])
        );
        let v: Value = serde_json::from_str("{\"a\": 1}").unwrap();
        assert!(matches!(v, Value::Object(_)));
    }

    proptest::proptest! {
        #[test]
        fn coercion_follows_arrayness(
            items in proptest::collection::vec(-1e6f64..1e6, 0..6),
            scalar in -1e6f64..1e6,
        ) {
            let array = Value::from(items.clone());
            let head = items.first().copied().map_or(Value::Null, Value::Float);
            proptest::prop_assert_eq!(array.clone().coerce(true, false), head);
            proptest::prop_assert_eq!(array.clone().coerce(true, true), array);
            proptest::prop_assert_eq!(
                Value::from(scalar).coerce(false, true),
                Value::Array(vec![Value::Float(scalar)])
            );
        }
    }
}
