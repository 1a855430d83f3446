use thiserror::Error;

use crate::node::NodeShape;

/// Errors produced by document tree operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("cannot put key '{key}' into {shape} node")]
    NotAnObject { key: String, shape: NodeShape },

    #[error("cannot add an element to {shape} node")]
    NotAnArray { shape: NodeShape },
}

/// Result alias for document tree operations.
pub type DocumentResult<T> = Result<T, DocumentError>;
