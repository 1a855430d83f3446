//! Error taxonomy for mapping operations.
//!
//! Every variant is locally unrecoverable: the `write`/`read` call that hit
//! it aborts and hands it to the caller. Errors raised below a property are
//! wrapped in [`MappingError::AtPath`] so the caller sees where it happened.

use std::fmt;

use odm_document::DocumentError;
use odm_store::StoreError;
use thiserror::Error;

/// Errors produced while converting between objects and documents.
#[derive(Debug, Error)]
pub enum MappingError {
    /// The type has no recognizable persistable shape.
    #[error("no persistable metadata for type {0}")]
    NoMetadata(String),

    /// The type's metadata is internally inconsistent.
    #[error("invalid metadata for {type_name}: {reason}")]
    InvalidMetadata { type_name: String, reason: String },

    /// A stored type tag does not name any registered type.
    #[error("unknown type alias '{0}'")]
    UnknownAlias(String),

    /// A referenced entity has no identifier to store.
    #[error("referenced {0} has no identifier set")]
    MissingIdentifier(String),

    /// No document exists for a referenced identifier.
    #[error("dangling reference: no document with identifier '{0}'")]
    DanglingReference(String),

    /// Eager resolution came back to a document it is already resolving.
    #[error("cyclic eager reference through identifier '{0}'")]
    CyclicReference(String),

    /// A node or value does not have the shape the target type requires.
    #[error("shape mismatch: expected {expected}, found {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// A custom converter rejected a value.
    #[error("conversion of {type_name} failed: {reason}")]
    Conversion { type_name: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Any of the above, raised while handling the property at `path`.
    #[error("at '{path}': {source}")]
    AtPath {
        path: String,
        #[source]
        source: Box<MappingError>,
    },
}

impl MappingError {
    pub fn shape_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn conversion(type_name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Conversion {
            type_name: type_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_metadata(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMetadata {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Prefix the error location with `segment`.
    ///
    /// Nested wraps collapse into a single [`MappingError::AtPath`] whose path
    /// reads outermost first, e.g. `shapes[1].center.x`.
    pub fn at(self, segment: &str) -> Self {
        match self {
            Self::AtPath { path, source } => {
                let joined = if path.starts_with('[') {
                    format!("{segment}{path}")
                } else {
                    format!("{segment}.{path}")
                };
                Self::AtPath {
                    path: joined,
                    source,
                }
            }
            other => Self::AtPath {
                path: segment.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The property path where the error was raised, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::AtPath { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The underlying error with any path wrapping removed.
    pub fn root_cause(&self) -> &MappingError {
        match self {
            Self::AtPath { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result alias for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;
