use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DocumentError, DocumentResult};
use crate::scalar::Scalar;

/// Shape discriminant of a [`DocumentNode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    Object,
    Array,
    Scalar,
}

impl fmt::Display for NodeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => f.write_str("object"),
            Self::Array => f.write_str("array"),
            Self::Scalar => f.write_str("scalar"),
        }
    }
}

/// Field map backing an object node.
///
/// Key order is not semantically significant. Fields are kept sorted so that
/// documents compare and print deterministically.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    fields: BTreeMap<String, DocumentNode>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&DocumentNode> {
        self.fields.get(key)
    }

    /// Insert or replace a field, returning the previous value.
    pub fn put(
        &mut self,
        key: impl Into<String>,
        value: impl Into<DocumentNode>,
    ) -> Option<DocumentNode> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<DocumentNode> {
        self.fields.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, DocumentNode> {
        self.fields.iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a DocumentNode);
    type IntoIter = btree_map::Iter<'a, String, DocumentNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl IntoIterator for Document {
    type Item = (String, DocumentNode);
    type IntoIter = btree_map::IntoIter<String, DocumentNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<K: Into<String>> FromIterator<(K, DocumentNode)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, DocumentNode)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// The generic wire value exchanged with a document store.
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentNode {
    /// Key-value document.
    Object(Document),
    /// Bare ordered list. Arrays never carry a type tag.
    Array(Vec<DocumentNode>),
    /// Primitive leaf.
    Scalar(Scalar),
}

impl DocumentNode {
    /// The null scalar node.
    pub const fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }

    /// An empty object node.
    pub fn object() -> Self {
        Self::Object(Document::new())
    }

    /// An empty array node.
    pub fn array() -> Self {
        Self::Array(Vec::new())
    }

    pub fn shape(&self) -> NodeShape {
        match self {
            Self::Object(_) => NodeShape::Object,
            Self::Array(_) => NodeShape::Array,
            Self::Scalar(_) => NodeShape::Scalar,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Scalar::Null))
    }

    pub fn as_object(&self) -> Option<&Document> {
        match self {
            Self::Object(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DocumentNode]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    /// Look up a field of an object node. Other shapes have no fields.
    pub fn get(&self, key: &str) -> Option<&DocumentNode> {
        self.as_object().and_then(|doc| doc.get(key))
    }

    /// Insert a field into an object node.
    ///
    /// Fails with [`DocumentError::NotAnObject`] on arrays and scalars.
    pub fn put(
        &mut self,
        key: impl Into<String>,
        value: impl Into<DocumentNode>,
    ) -> DocumentResult<Option<DocumentNode>> {
        match self {
            Self::Object(doc) => Ok(doc.put(key, value)),
            other => Err(DocumentError::NotAnObject {
                key: key.into(),
                shape: other.shape(),
            }),
        }
    }

    /// Append an element to an array node.
    ///
    /// Fails with [`DocumentError::NotAnArray`] on objects and scalars.
    pub fn add(&mut self, value: impl Into<DocumentNode>) -> DocumentResult<()> {
        match self {
            Self::Array(items) => {
                items.push(value.into());
                Ok(())
            }
            other => Err(DocumentError::NotAnArray {
                shape: other.shape(),
            }),
        }
    }

    /// Number of fields or elements. Scalars have length zero.
    pub fn len(&self) -> usize {
        match self {
            Self::Object(doc) => doc.len(),
            Self::Array(items) => items.len(),
            Self::Scalar(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DocumentNode {
    fn default() -> Self {
        Self::null()
    }
}

impl From<Scalar> for DocumentNode {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<Document> for DocumentNode {
    fn from(value: Document) -> Self {
        Self::Object(value)
    }
}

impl From<Vec<DocumentNode>> for DocumentNode {
    fn from(value: Vec<DocumentNode>) -> Self {
        Self::Array(value)
    }
}

impl From<&str> for DocumentNode {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::from(value))
    }
}

impl From<String> for DocumentNode {
    fn from(value: String) -> Self {
        Self::Scalar(Scalar::String(value))
    }
}

impl From<i64> for DocumentNode {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Int(value))
    }
}

impl From<f64> for DocumentNode {
    fn from(value: f64) -> Self {
        Self::Scalar(Scalar::Float(value))
    }
}

impl From<bool> for DocumentNode {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_on_object_replaces_previous_value() {
        let mut node = DocumentNode::object();
        assert_eq!(node.put("x", 1i64).unwrap(), None);
        assert_eq!(node.put("x", 2i64).unwrap(), Some(DocumentNode::from(1i64)));
        assert_eq!(node.get("x"), Some(&DocumentNode::from(2i64)));
    }

    #[test]
    fn put_on_array_fails() {
        let mut node = DocumentNode::array();
        let err = node.put("x", 1i64).unwrap_err();
        assert_eq!(
            err,
            DocumentError::NotAnObject {
                key: "x".into(),
                shape: NodeShape::Array
            }
        );
    }

    #[test]
    fn add_on_object_fails() {
        let mut node = DocumentNode::object();
        let err = node.add("a").unwrap_err();
        assert_eq!(
            err,
            DocumentError::NotAnArray {
                shape: NodeShape::Object
            }
        );
    }

    #[test]
    fn add_on_scalar_fails() {
        let mut node = DocumentNode::from("scalar");
        assert!(node.add(1i64).is_err());
        assert!(node.put("k", 1i64).is_err());
    }

    #[test]
    fn add_appends_in_order() {
        let mut node = DocumentNode::array();
        node.add("a").unwrap();
        node.add("b").unwrap();
        let items = node.as_array().unwrap();
        assert_eq!(items, &[DocumentNode::from("a"), DocumentNode::from("b")]);
    }

    #[test]
    fn get_on_non_object_is_none() {
        let node = DocumentNode::Array(vec![DocumentNode::from(1i64)]);
        assert!(node.get("0").is_none());
    }

    #[test]
    fn document_from_iterator() {
        let doc: Document = vec![("a", DocumentNode::from(1i64)), ("b", DocumentNode::null())]
            .into_iter()
            .collect();
        assert_eq!(doc.len(), 2);
        assert!(doc.get("b").unwrap().is_null());
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn default_node_is_null() {
        assert!(DocumentNode::default().is_null());
        assert_eq!(DocumentNode::default().shape(), NodeShape::Scalar);
    }
}
