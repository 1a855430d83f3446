//! Static description of persistable types.
//!
//! An [`EntityMetadata`] is built once per type by [`Persistable::metadata`]
//! and cached by the [`MetadataRegistry`](crate::MetadataRegistry). It lists
//! the type's properties in declaration order, each with its stored field
//! name and declared [`PropertyShape`].
//!
//! [`Persistable::metadata`]: crate::Persistable::metadata

use std::collections::HashSet;
use std::fmt;

use bytes::Bytes;
use odm_document::ScalarKind;

use crate::entity::{EntityType, Persistable};
use crate::error::{MappingError, MappingResult};
use crate::types::TypeKey;

/// Declared type of a scalar property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarType {
    /// A type the document tree stores directly.
    Native(ScalarKind),
    /// A type stored through a custom conversion.
    Custom(TypeKey),
}

impl ScalarType {
    /// The Rust type an override for this scalar is registered under.
    pub fn type_key(&self) -> TypeKey {
        match self {
            Self::Native(ScalarKind::Null) => TypeKey::of::<()>(),
            Self::Native(ScalarKind::Bool) => TypeKey::of::<bool>(),
            Self::Native(ScalarKind::Int) => TypeKey::of::<i64>(),
            Self::Native(ScalarKind::Float) => TypeKey::of::<f64>(),
            Self::Native(ScalarKind::String) => TypeKey::of::<String>(),
            Self::Native(ScalarKind::Binary) => TypeKey::of::<Bytes>(),
            Self::Custom(key) => *key,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(kind) => write!(f, "{kind}"),
            Self::Custom(key) => write!(f, "{key}"),
        }
    }
}

/// Declared type of an entity-valued property.
///
/// Concrete targets carry their [`EntityType`] so the converter can
/// introspect them on first encounter. Abstract targets (`dyn Trait`) carry
/// only a key; documents read into them must be tagged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityRef {
    key: TypeKey,
    concrete: Option<EntityType>,
}

impl EntityRef {
    pub fn of<T: Persistable>() -> Self {
        Self::from_type(EntityType::of::<T>())
    }

    pub fn from_type(entity_type: EntityType) -> Self {
        Self {
            key: entity_type.key(),
            concrete: Some(entity_type),
        }
    }

    pub fn abstract_type<T: ?Sized + 'static>() -> Self {
        Self::from_key(TypeKey::of::<T>())
    }

    /// A target known only by key. Reads into it need a type tag unless the
    /// type was registered beforehand.
    pub fn from_key(key: TypeKey) -> Self {
        Self { key, concrete: None }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn entity_type(&self) -> Option<EntityType> {
        self.concrete
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// Declared shape of a property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyShape {
    Scalar(ScalarType),
    Entity(EntityRef),
    Collection(Box<PropertyShape>),
    /// String-keyed in the document; `key` is the declared key kind.
    Map {
        key: ScalarKind,
        value: Box<PropertyShape>,
    },
}

impl PropertyShape {
    pub fn string() -> Self {
        Self::Scalar(ScalarType::Native(ScalarKind::String))
    }

    pub fn int() -> Self {
        Self::Scalar(ScalarType::Native(ScalarKind::Int))
    }

    pub fn float() -> Self {
        Self::Scalar(ScalarType::Native(ScalarKind::Float))
    }

    pub fn bool() -> Self {
        Self::Scalar(ScalarType::Native(ScalarKind::Bool))
    }

    pub fn binary() -> Self {
        Self::Scalar(ScalarType::Native(ScalarKind::Binary))
    }

    /// A scalar stored through a custom conversion registered for `T`.
    pub fn custom<T: 'static>() -> Self {
        Self::Scalar(ScalarType::Custom(TypeKey::of::<T>()))
    }

    pub fn entity<T: Persistable>() -> Self {
        Self::Entity(EntityRef::of::<T>())
    }

    /// An entity declared through an abstract type such as `dyn Shape`.
    pub fn abstract_entity<T: ?Sized + 'static>() -> Self {
        Self::Entity(EntityRef::abstract_type::<T>())
    }

    pub fn collection(element: PropertyShape) -> Self {
        Self::Collection(Box::new(element))
    }

    /// A map with string keys.
    pub fn map(value: PropertyShape) -> Self {
        Self::map_keyed(ScalarKind::String, value)
    }

    pub fn map_keyed(key: ScalarKind, value: PropertyShape) -> Self {
        Self::Map {
            key,
            value: Box::new(value),
        }
    }

    /// Type consulted for read overrides, if the shape has one.
    pub fn override_target(&self) -> Option<TypeKey> {
        match self {
            Self::Scalar(scalar) => Some(scalar.type_key()),
            Self::Entity(target) => Some(target.key()),
            Self::Collection(_) | Self::Map { .. } => None,
        }
    }

    /// For a reference-capable shape, the referenced type and whether the
    /// property holds many references.
    pub fn reference_target(&self) -> Option<(EntityRef, bool)> {
        match self {
            Self::Entity(target) => Some((*target, false)),
            Self::Collection(inner) => match inner.as_ref() {
                Self::Entity(target) => Some((*target, true)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for PropertyShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => write!(f, "{scalar}"),
            Self::Entity(target) => write!(f, "entity {target}"),
            Self::Collection(inner) => write!(f, "collection<{inner}>"),
            Self::Map { key, value } => write!(f, "map<{key}, {value}>"),
        }
    }
}

/// Description of one property of an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyMetadata {
    name: String,
    stored_name: String,
    shape: PropertyShape,
    reference: bool,
    lazy: bool,
    writable: bool,
    identifier: bool,
    revision: bool,
}

impl PropertyMetadata {
    /// A writable, non-reference property stored under its own name.
    pub fn new(name: impl Into<String>, shape: PropertyShape) -> Self {
        let name = name.into();
        Self {
            stored_name: name.clone(),
            name,
            shape,
            reference: false,
            lazy: false,
            writable: true,
            identifier: false,
            revision: false,
        }
    }

    /// Store the property under a different document key.
    pub fn stored_as(mut self, key: impl Into<String>) -> Self {
        self.stored_name = key.into();
        self
    }

    /// Mark this property as the entity's identifier.
    pub fn identifier(mut self) -> Self {
        self.identifier = true;
        self
    }

    pub fn revision(mut self) -> Self {
        self.revision = true;
        self
    }

    /// Store the referenced entity's identifier instead of the entity.
    pub fn reference(mut self) -> Self {
        self.reference = true;
        self
    }

    /// Like [`reference`](Self::reference), resolved on first access.
    pub fn lazy_reference(mut self) -> Self {
        self.reference = true;
        self.lazy = true;
        self
    }

    /// Read from documents but never written.
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stored_name(&self) -> &str {
        &self.stored_name
    }

    pub fn shape(&self) -> &PropertyShape {
        &self.shape
    }

    pub fn is_reference(&self) -> bool {
        self.reference
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_identifier(&self) -> bool {
        self.identifier
    }
}

/// Description of a persistable type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityMetadata {
    type_key: TypeKey,
    alias: String,
    collection: String,
    properties: Vec<PropertyMetadata>,
    supertypes: Vec<TypeKey>,
}

impl EntityMetadata {
    pub fn builder<T: ?Sized + 'static>() -> EntityMetadataBuilder {
        EntityMetadataBuilder::new(TypeKey::of::<T>())
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Tag written into documents of this type when a tag is needed.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Stored collection / type name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> &[PropertyMetadata] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn identifier(&self) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.identifier)
    }

    pub fn revision(&self) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.revision)
    }

    /// Declared direct supertypes, usually abstract `dyn Trait` keys.
    pub fn supertypes(&self) -> &[TypeKey] {
        &self.supertypes
    }

    /// Check the description for internal consistency.
    pub fn validate(&self) -> MappingResult<()> {
        let type_name = self.type_key.short_name();
        if self.properties.is_empty() {
            return Err(MappingError::NoMetadata(type_name.to_string()));
        }
        if self.alias.is_empty() {
            return Err(MappingError::invalid_metadata(type_name, "empty type alias"));
        }

        let mut names = HashSet::new();
        let mut stored = HashSet::new();
        for property in &self.properties {
            if !names.insert(property.name.as_str()) {
                return Err(MappingError::invalid_metadata(
                    type_name,
                    format!("duplicate property '{}'", property.name),
                ));
            }
            if !stored.insert(property.stored_name.as_str()) {
                return Err(MappingError::invalid_metadata(
                    type_name,
                    format!("duplicate stored field '{}'", property.stored_name),
                ));
            }
            if property.reference && property.shape.reference_target().is_none() {
                return Err(MappingError::invalid_metadata(
                    type_name,
                    format!(
                        "reference '{}' must be an entity or a collection of entities, not {}",
                        property.name, property.shape
                    ),
                ));
            }
            if (property.identifier || property.revision)
                && !matches!(property.shape, PropertyShape::Scalar(_))
            {
                return Err(MappingError::invalid_metadata(
                    type_name,
                    format!("identifier or revision '{}' must be a scalar", property.name),
                ));
            }
        }

        if self.properties.iter().filter(|p| p.identifier).count() > 1 {
            return Err(MappingError::invalid_metadata(type_name, "more than one identifier"));
        }
        if self.properties.iter().filter(|p| p.revision).count() > 1 {
            return Err(MappingError::invalid_metadata(type_name, "more than one revision"));
        }
        Ok(())
    }
}

/// Builder for [`EntityMetadata`].
#[derive(Debug)]
pub struct EntityMetadataBuilder {
    type_key: TypeKey,
    alias: Option<String>,
    collection: Option<String>,
    properties: Vec<PropertyMetadata>,
    supertypes: Vec<TypeKey>,
}

impl EntityMetadataBuilder {
    fn new(type_key: TypeKey) -> Self {
        Self {
            type_key,
            alias: None,
            collection: None,
            properties: Vec::new(),
            supertypes: Vec::new(),
        }
    }

    /// Type tag. Defaults to the type's short name.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Stored collection name. Defaults to the alias.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn property(mut self, property: PropertyMetadata) -> Self {
        self.properties.push(property);
        self
    }

    /// Declare that values of this type may stand where `S` is declared.
    pub fn extends<S: ?Sized + 'static>(mut self) -> Self {
        self.supertypes.push(TypeKey::of::<S>());
        self
    }

    pub fn build(self) -> EntityMetadata {
        let alias = self
            .alias
            .unwrap_or_else(|| self.type_key.short_name().to_string());
        EntityMetadata {
            type_key: self.type_key,
            collection: self.collection.unwrap_or_else(|| alias.clone()),
            alias,
            properties: self.properties,
            supertypes: self.supertypes,
        }
    }
}
