//! Object-document mapping core.
//!
//! Converts strongly-typed application objects to the generic
//! [`DocumentNode`](odm_document::DocumentNode) tree and back, preserving
//! runtime subtypes through type tags and storing cross-document references
//! as identifiers.
//!
//! # Key Types
//!
//! - [`Persistable`] / [`Entity`] — Application types and their object-safe view
//! - [`EntityMetadata`] — Cached description of a persistable type
//! - [`CustomConversions`] — Scalar overrides consulted before generic conversion
//! - [`TypeAliasMapper`] — Concrete type <-> stored type tag
//! - [`ReferenceResolver`] — Identifiers on write, entities or proxies on read
//! - [`Lazy`] / [`LazyReference`] — Deferred references resolved on first access
//! - [`DocumentConverter`] — The orchestrator tying the above together
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use odm_mapping::{DocumentConverter, EntityMetadata, FromValue, IntoValue, MappingResult,
//!     Persistable, PropertyMetadata, PropertyShape, Value};
//! use odm_store::InMemoryDocumentStore;
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct Point {
//!     x: i64,
//!     y: i64,
//! }
//!
//! impl Persistable for Point {
//!     fn metadata() -> EntityMetadata {
//!         EntityMetadata::builder::<Self>()
//!             .property(PropertyMetadata::new("x", PropertyShape::int()))
//!             .property(PropertyMetadata::new("y", PropertyShape::int()))
//!             .build()
//!     }
//!
//!     fn get(&self, property: &str) -> Option<Value> {
//!         match property {
//!             "x" => Some(self.x.into_value()),
//!             "y" => Some(self.y.into_value()),
//!             _ => None,
//!         }
//!     }
//!
//!     fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
//!         match property {
//!             "x" => self.x = i64::from_value(value)?,
//!             "y" => self.y = i64::from_value(value)?,
//!             _ => {}
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let converter = DocumentConverter::new(Arc::new(InMemoryDocumentStore::new()));
//! let node = converter.write(&Point { x: 1, y: 2 }).unwrap();
//! assert!(node.get("_class").is_none());
//! assert_eq!(converter.read::<Point>(&node).unwrap(), Point { x: 1, y: 2 });
//! ```

pub mod alias;
pub mod config;
pub mod conversions;
pub mod converter;
pub mod entity;
pub mod error;
pub mod lazy;
pub mod metadata;
pub mod reference;
pub mod registry;
pub mod types;
pub mod value;

#[cfg(test)]
pub(crate) mod fixtures;

pub use alias::TypeAliasMapper;
pub use config::MappingConfig;
pub use conversions::CustomConversions;
pub use converter::{DocumentConverter, DocumentConverterBuilder};
pub use entity::{Entity, EntityType, Persistable};
pub use error::{MappingError, MappingResult};
pub use lazy::{Lazy, LazyReference};
pub use metadata::{
    EntityMetadata, EntityMetadataBuilder, EntityRef, PropertyMetadata, PropertyShape, ScalarType,
};
pub use reference::ReferenceResolver;
pub use registry::MetadataRegistry;
pub use types::TypeKey;
pub use value::{CustomValue, FromValue, IntoValue, Value};
