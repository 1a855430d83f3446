//! Generic document tree for the object-document mapper.
//!
//! This crate provides the only value type that crosses the boundary between
//! the mapping core and a document store. Every other ODM crate depends on
//! `odm-document`.
//!
//! # Key Types
//!
//! - [`DocumentNode`] — Tagged union of object, array and scalar nodes
//! - [`Document`] — String-keyed field map backing an object node
//! - [`Scalar`] — Primitive leaf value (string, number, boolean, null, binary)
//! - [`ScalarKind`] — Discriminant of a [`Scalar`], used to key read overrides
//! - [`NodeShape`] — Object / array / scalar discriminant for shape checks
//!
//! Object nodes accept `put`, array nodes accept `add`. Calling either on the
//! wrong shape is a [`DocumentError`], never a silent no-op.

pub mod error;
pub mod json;
pub mod node;
pub mod scalar;

pub use error::{DocumentError, DocumentResult};
pub use node::{Document, DocumentNode, NodeShape};
pub use scalar::{Scalar, ScalarKind};
