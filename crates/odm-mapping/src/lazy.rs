//! Deferred references.
//!
//! A [`LazyReference`] is what a lazy reference property reads back as: an
//! identifier plus the type to build, with the fetch postponed until
//! [`resolve`](LazyReference::resolve) is first called. The result is cached
//! for the life of the proxy. Concurrent first calls are single-flight: one
//! caller fetches, the others wait and observe the same entity.
//!
//! Clones share state, so resolving any clone resolves them all. Two reads of
//! the same document produce independent proxies.
//!
//! [`Lazy<T>`] is the typed view application structs hold.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::debug;

use crate::converter::DocumentConverter;
use crate::entity::{Entity, Persistable};
use crate::error::{MappingError, MappingResult};
use crate::metadata::EntityRef;
use crate::types::TypeKey;
use crate::value::{FromValue, IntoValue, Value};

struct LazyState {
    identifier: Option<String>,
    target: EntityRef,
    loader: Option<DocumentConverter>,
    cell: OnceLock<Box<dyn Entity>>,
    claim: Mutex<()>,
}

/// Untyped lazy reference proxy.
#[derive(Clone)]
pub struct LazyReference {
    state: Arc<LazyState>,
}

impl LazyReference {
    pub(crate) fn unresolved(
        identifier: String,
        target: EntityRef,
        loader: DocumentConverter,
    ) -> Self {
        Self {
            state: Arc::new(LazyState {
                identifier: Some(identifier),
                target,
                loader: Some(loader),
                cell: OnceLock::new(),
                claim: Mutex::new(()),
            }),
        }
    }

    /// An already-resolved proxy around `entity`.
    pub fn loaded(entity: Box<dyn Entity>) -> Self {
        let cell = OnceLock::new();
        let target = EntityRef::from_type(entity.entity_type());
        // A fresh cell always accepts its first value.
        let _ = cell.set(entity);
        Self {
            state: Arc::new(LazyState {
                identifier: None,
                target,
                loader: None,
                cell,
                claim: Mutex::new(()),
            }),
        }
    }

    /// The stored identifier. `None` for proxies built with [`loaded`](Self::loaded).
    pub fn identifier(&self) -> Option<&str> {
        self.state.identifier.as_deref()
    }

    /// Declared type of the referenced entity.
    pub fn target(&self) -> TypeKey {
        self.state.target.key()
    }

    pub fn is_resolved(&self) -> bool {
        self.state.cell.get().is_some()
    }

    /// The entity if already resolved. Never fetches.
    pub fn get(&self) -> Option<&dyn Entity> {
        self.state.cell.get().map(|e| e.as_ref())
    }

    /// Fetch and convert the referenced entity on first call; return the
    /// cached entity afterwards.
    ///
    /// A failed fetch leaves the proxy unresolved, so a later call retries.
    pub fn resolve(&self) -> MappingResult<&dyn Entity> {
        if let Some(entity) = self.state.cell.get() {
            return Ok(entity.as_ref());
        }
        let _claim = self.state.claim.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entity) = self.state.cell.get() {
            return Ok(entity.as_ref());
        }

        let (Some(identifier), Some(loader)) =
            (self.state.identifier.as_deref(), &self.state.loader)
        else {
            return Err(MappingError::MissingIdentifier(self.target().short_name().to_string()));
        };
        let entity = loader.resolve_lazy(identifier, &self.state.target)?;
        debug!(id = identifier, target = self.target().short_name(), "lazy reference resolved");
        Ok(self.state.cell.get_or_init(|| entity).as_ref())
    }
}

impl fmt::Debug for LazyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyReference")
            .field("target", &self.target())
            .field("identifier", &self.identifier())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl IntoValue for LazyReference {
    fn into_value(self) -> Value {
        Value::Lazy(self)
    }
}

impl FromValue for LazyReference {
    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Lazy(reference) => Ok(reference),
            Value::Entity(entity) => Ok(Self::loaded(entity)),
            other => Err(MappingError::shape_mismatch("lazy reference", other.describe())),
        }
    }
}

/// Typed lazy reference to a `T`.
pub struct Lazy<T> {
    reference: LazyReference,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Persistable> Lazy<T> {
    /// An already-resolved reference, for objects built in memory.
    pub fn loaded(entity: T) -> Self {
        Self {
            reference: LazyReference::loaded(Box::new(entity)),
            _marker: PhantomData,
        }
    }

    /// Wrap an untyped proxy whose target is `T`.
    pub fn from_reference(reference: LazyReference) -> MappingResult<Self> {
        let expected = TypeKey::of::<T>();
        if reference.target() != expected {
            return Err(MappingError::shape_mismatch(
                format!("lazy reference to {expected}"),
                format!("lazy reference to {}", reference.target()),
            ));
        }
        Ok(Self {
            reference,
            _marker: PhantomData,
        })
    }

    pub fn identifier(&self) -> Option<&str> {
        self.reference.identifier()
    }

    pub fn is_resolved(&self) -> bool {
        self.reference.is_resolved()
    }

    /// The referenced entity, fetching it on first call.
    pub fn resolve(&self) -> MappingResult<&T> {
        let entity = self.reference.resolve()?;
        let actual = entity.type_key();
        entity
            .downcast_ref::<T>()
            .ok_or_else(|| MappingError::shape_mismatch(TypeKey::of::<T>(), actual))
    }

    pub fn reference(&self) -> &LazyReference {
        &self.reference
    }
}

impl<T> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            reference: self.reference.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Lazy").field(&self.reference).finish()
    }
}

impl<T: Persistable> IntoValue for Lazy<T> {
    fn into_value(self) -> Value {
        Value::Lazy(self.reference)
    }
}

impl<T: Persistable> FromValue for Lazy<T> {
    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Lazy(reference) => Self::from_reference(reference),
            Value::Entity(entity) => {
                let actual = entity.type_key();
                entity
                    .downcast::<T>()
                    .map(|typed| Self::loaded(*typed))
                    .ok_or_else(|| MappingError::shape_mismatch(TypeKey::of::<T>(), actual))
            }
            other => Err(MappingError::shape_mismatch("lazy reference", other.describe())),
        }
    }
}
