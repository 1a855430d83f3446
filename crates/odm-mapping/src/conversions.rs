//! Custom scalar conversions.
//!
//! A write override turns a runtime value of some type into a [`Scalar`]; a
//! read override turns a scalar of a given [`ScalarKind`] back into a value
//! of a target type. The converter consults both before any generic entity,
//! collection or map handling, so an override registered for an entity type
//! replaces that type's nested-document form entirely.
//!
//! Registrations happen while building a converter. The set is immutable
//! afterwards and cheap to clone.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use odm_document::{Scalar, ScalarKind};

use crate::error::{MappingError, MappingResult};
use crate::types::TypeKey;
use crate::value::Value;

type WriteFn = Arc<dyn Fn(&dyn Any) -> MappingResult<Scalar> + Send + Sync>;
type ReadFn = Arc<dyn Fn(&Scalar) -> MappingResult<Value> + Send + Sync>;

/// Registry of bidirectional scalar overrides.
#[derive(Clone, Default)]
pub struct CustomConversions {
    writers: HashMap<TypeKey, WriteFn>,
    readers: HashMap<(ScalarKind, TypeKey), ReadFn>,
}

impl CustomConversions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a write override for values of type `T`.
    pub fn with_writer<T, F>(mut self, write: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> MappingResult<Scalar> + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        let writer: WriteFn = Arc::new(move |value: &dyn Any| match value.downcast_ref::<T>() {
            Some(typed) => write(typed),
            None => Err(MappingError::conversion(
                key.short_name(),
                "value has a different runtime type",
            )),
        });
        self.writers.insert(key, writer);
        self
    }

    /// Register a read override producing `T` from scalars of `kind`.
    pub fn with_reader<T, F>(mut self, kind: ScalarKind, read: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Scalar) -> MappingResult<T> + Send + Sync + 'static,
    {
        let reader: ReadFn = Arc::new(move |scalar: &Scalar| read(scalar).map(Value::custom));
        self.readers.insert((kind, TypeKey::of::<T>()), reader);
        self
    }

    /// Register both directions for `T`, stored as scalars of `kind`.
    pub fn with<T, W, R>(self, kind: ScalarKind, write: W, read: R) -> Self
    where
        T: Any + Send + Sync,
        W: Fn(&T) -> MappingResult<Scalar> + Send + Sync + 'static,
        R: Fn(&Scalar) -> MappingResult<T> + Send + Sync + 'static,
    {
        self.with_writer::<T, W>(write).with_reader::<T, R>(kind, read)
    }

    pub fn has_write_override(&self, type_key: &TypeKey) -> bool {
        self.writers.contains_key(type_key)
    }

    /// Apply the write override for `value`'s runtime type.
    ///
    /// `None` when no override applies or the value has no single
    /// underlying Rust value (nulls, containers, lazy references).
    pub fn write_override(&self, value: &Value) -> Option<MappingResult<Scalar>> {
        self.write_override_for(&value.runtime_type(), value.as_any()?)
    }

    /// Apply the write override registered for `type_key` to a borrowed value.
    pub fn write_override_for(
        &self,
        type_key: &TypeKey,
        value: &dyn Any,
    ) -> Option<MappingResult<Scalar>> {
        let writer = self.writers.get(type_key)?;
        Some(writer(value))
    }

    pub fn has_read_override(&self, kind: ScalarKind, target: &TypeKey) -> bool {
        self.readers.contains_key(&(kind, *target))
    }

    /// Apply the read override for `scalar` into `target`, if one exists.
    pub fn read_override(&self, scalar: &Scalar, target: &TypeKey) -> Option<MappingResult<Value>> {
        let reader = self.readers.get(&(scalar.kind(), *target))?;
        Some(reader(scalar))
    }

    /// Number of registered overrides, both directions counted.
    pub fn len(&self) -> usize {
        self.writers.len() + self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty() && self.readers.is_empty()
    }
}

impl fmt::Debug for CustomConversions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomConversions")
            .field("writers", &self.writers.keys().collect::<Vec<_>>())
            .field("readers", &self.readers.keys().collect::<Vec<_>>())
            .finish()
    }
}
