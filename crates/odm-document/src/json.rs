//! Bridge between [`DocumentNode`] and `serde_json::Value`.
//!
//! JSON is the wire format most document stores speak. The mapping is
//! lossless except for binary scalars, which are written as lowercase hex
//! strings and read back as plain strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::node::{Document, DocumentNode};
use crate::scalar::Scalar;

impl DocumentNode {
    /// Convert this node into a JSON value.
    ///
    /// Non-finite floats have no JSON representation and become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Object(doc) => Value::Object(
                doc.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Scalar(scalar) => scalar_to_json(scalar),
        }
    }

    /// Build a node from a JSON value.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::null(),
            Value::Bool(b) => Self::Scalar(Scalar::Bool(b)),
            Value::Number(n) => Self::Scalar(number_to_scalar(&n)),
            Value::String(s) => Self::Scalar(Scalar::String(s)),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect::<Document>(),
            ),
        }
    }
}

fn scalar_to_json(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Null => Value::Null,
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::Int(i) => Value::Number(Number::from(*i)),
        Scalar::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Scalar::String(s) => Value::String(s.clone()),
        Scalar::Binary(bytes) => Value::String(hex::encode(bytes)),
    }
}

fn number_to_scalar(n: &Number) -> Scalar {
    match n.as_i64() {
        Some(i) => Scalar::Int(i),
        // u64 beyond i64::MAX, or a real float
        None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}

impl From<Value> for DocumentNode {
    fn from(value: Value) -> Self {
        Self::from_json(value)
    }
}

impl From<&DocumentNode> for Value {
    fn from(node: &DocumentNode) -> Self {
        node.to_json()
    }
}

impl Serialize for DocumentNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DocumentNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn object_with_nested_array_converts() {
        let value = json!({"_class": "Point", "x": 1, "tags": ["a", "b"], "w": 0.5});
        let node = DocumentNode::from_json(value.clone());
        assert_eq!(node.get("_class").and_then(DocumentNode::as_str), Some("Point"));
        assert_eq!(node.get("tags").unwrap().len(), 2);
        assert_eq!(node.to_json(), value);
    }

    #[test]
    fn binary_is_hex_encoded() {
        let node = DocumentNode::Scalar(Scalar::Binary(Bytes::from_static(&[0xde, 0xad])));
        assert_eq!(node.to_json(), json!("dead"));
    }

    #[test]
    fn non_finite_float_becomes_null() {
        let node = DocumentNode::from(f64::INFINITY);
        assert_eq!(node.to_json(), Value::Null);
    }

    #[test]
    fn huge_unsigned_reads_as_float() {
        let node = DocumentNode::from_json(json!(u64::MAX));
        assert!(matches!(node, DocumentNode::Scalar(Scalar::Float(_))));
    }

    #[test]
    fn serde_roundtrip_through_string() {
        let mut node = DocumentNode::object();
        node.put("name", "ada").unwrap();
        node.put("age", 36i64).unwrap();
        let text = serde_json::to_string(&node).unwrap();
        let parsed: DocumentNode = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, node);
    }

    proptest! {
        #[test]
        fn int_scalars_survive_json(i in any::<i64>()) {
            let node = DocumentNode::from(i);
            prop_assert_eq!(DocumentNode::from_json(node.to_json()), node);
        }

        #[test]
        fn string_scalars_survive_json(s in ".*") {
            let node = DocumentNode::from(s);
            prop_assert_eq!(DocumentNode::from_json(node.to_json()), node);
        }
    }
}
