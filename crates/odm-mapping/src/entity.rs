//! Persistable application types.
//!
//! Application structs implement [`Persistable`]: a static description of
//! their properties plus by-name accessors. The object-safe [`Entity`] trait
//! is blanket-implemented for every `Persistable` type and is what the
//! converter handles at runtime, so polymorphic properties can hold a
//! `Box<dyn Entity>` of any registered type.

use std::any::Any;
use std::fmt;

use crate::error::MappingResult;
use crate::metadata::EntityMetadata;
use crate::types::TypeKey;
use crate::value::Value;

/// A strongly-typed application object that can be stored as a document.
///
/// # Example
///
/// ```
/// use odm_mapping::{EntityMetadata, FromValue, IntoValue, MappingResult, Persistable,
///     PropertyMetadata, PropertyShape, Value};
///
/// #[derive(Clone, Debug, Default, PartialEq)]
/// struct Point {
///     x: i64,
///     y: i64,
/// }
///
/// impl Persistable for Point {
///     fn metadata() -> EntityMetadata {
///         EntityMetadata::builder::<Self>()
///             .property(PropertyMetadata::new("x", PropertyShape::int()))
///             .property(PropertyMetadata::new("y", PropertyShape::int()))
///             .build()
///     }
///
///     fn get(&self, property: &str) -> Option<Value> {
///         match property {
///             "x" => Some(self.x.into_value()),
///             "y" => Some(self.y.into_value()),
///             _ => None,
///         }
///     }
///
///     fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
///         match property {
///             "x" => self.x = i64::from_value(value)?,
///             "y" => self.y = i64::from_value(value)?,
///             _ => {}
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Persistable: Default + Clone + fmt::Debug + Send + Sync + 'static {
    /// Describe this type. Called once per process; the result is cached.
    fn metadata() -> EntityMetadata;

    /// Read the named property. `None` means the property is unknown.
    fn get(&self, property: &str) -> Option<Value>;

    /// Assign the named property from a converted value.
    fn set(&mut self, property: &str, value: Value) -> MappingResult<()>;
}

/// Object-safe view of a [`Persistable`] value.
pub trait Entity: Any + Send + Sync + fmt::Debug {
    fn entity_type(&self) -> EntityType;

    fn get_property(&self, property: &str) -> Option<Value>;

    fn set_property(&mut self, property: &str, value: Value) -> MappingResult<()>;

    fn clone_entity(&self) -> Box<dyn Entity>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Persistable> Entity for T {
    fn entity_type(&self) -> EntityType {
        EntityType::of::<T>()
    }

    fn get_property(&self, property: &str) -> Option<Value> {
        Persistable::get(self, property)
    }

    fn set_property(&mut self, property: &str, value: Value) -> MappingResult<()> {
        Persistable::set(self, property, value)
    }

    fn clone_entity(&self) -> Box<dyn Entity> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl<'a> dyn Entity + 'a {
    pub fn type_key(&self) -> TypeKey {
        self.entity_type().key()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Take ownership of the concrete value. `None` if it is not a `T`.
    pub fn downcast<T: Any>(self: Box<Self>) -> Option<Box<T>> {
        self.into_any().downcast::<T>().ok()
    }
}

impl Clone for Box<dyn Entity> {
    fn clone(&self) -> Self {
        self.clone_entity()
    }
}

/// Handle bundling a type's identity with how to describe and build it.
#[derive(Clone, Copy)]
pub struct EntityType {
    key: TypeKey,
    describe: fn() -> EntityMetadata,
    instantiate: fn() -> Box<dyn Entity>,
}

impl EntityType {
    pub fn of<T: Persistable>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            describe: T::metadata,
            instantiate: instantiate::<T>,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Run the type's one-time introspection. Callers should go through
    /// [`MetadataRegistry`](crate::MetadataRegistry), which caches it.
    pub fn describe(&self) -> EntityMetadata {
        (self.describe)()
    }

    /// A blank instance with every property at its default.
    pub fn instantiate(&self) -> Box<dyn Entity> {
        (self.instantiate)()
    }
}

fn instantiate<T: Persistable>() -> Box<dyn Entity> {
    Box::new(T::default())
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for EntityType {}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityType({})", self.key.short_name())
    }
}
