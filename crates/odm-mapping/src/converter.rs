//! Two-way conversion between entities and document trees.
//!
//! # Write
//!
//! A value is written by its declared [`PropertyShape`]: nulls become null
//! scalars, values with a write override become the override's scalar,
//! collections and maps become arrays and objects of recursively written
//! elements, and entities become objects with one field per writable
//! property. Reference properties are reduced to identifiers. An entity
//! document carries a type tag only when its concrete type differs from the
//! declared one, unless [`MappingConfig::always_write_type_tag`] is set.
//!
//! # Read
//!
//! Reading mirrors writing. Read overrides are keyed by the node's scalar
//! kind and the declared type. A tagged object is read as the tagged type,
//! which must be the declared type or one of its subtypes. Absent and null
//! fields leave the property at its default.
//!
//! Every error raised below a property is wrapped with the property path.

use std::sync::Arc;

use odm_document::{Document, DocumentNode, Scalar, ScalarKind};
use odm_store::DocumentFetcher;
use tracing::trace;

use crate::alias::TypeAliasMapper;
use crate::config::MappingConfig;
use crate::conversions::CustomConversions;
use crate::entity::{Entity, EntityType, Persistable};
use crate::error::{MappingError, MappingResult};
use crate::metadata::{EntityMetadata, EntityRef, PropertyShape, ScalarType};
use crate::reference::{self, ReferenceResolver};
use crate::registry::MetadataRegistry;
use crate::types::TypeKey;
use crate::value::Value;

/// State carried through one read call.
#[derive(Debug, Default)]
pub(crate) struct ReadContext {
    /// `(collection, identifier)` of every reference being eagerly resolved
    /// on the current path.
    resolving: Vec<(String, String)>,
}

impl ReadContext {
    fn check(&self, collection: &str, id: &str) -> MappingResult<()> {
        if self.resolving.iter().any(|(c, i)| c == collection && i == id) {
            return Err(MappingError::CyclicReference(id.to_string()));
        }
        Ok(())
    }
}

struct ConverterInner {
    config: MappingConfig,
    registry: MetadataRegistry,
    conversions: CustomConversions,
    aliases: TypeAliasMapper,
    resolver: ReferenceResolver,
}

/// Converts entities to document trees and back.
///
/// Cheap to clone; clones share metadata, aliases and conversions.
#[derive(Clone)]
pub struct DocumentConverter {
    inner: Arc<ConverterInner>,
}

/// Builder for [`DocumentConverter`].
pub struct DocumentConverterBuilder {
    fetcher: Arc<dyn DocumentFetcher>,
    config: MappingConfig,
    conversions: CustomConversions,
    types: Vec<EntityType>,
}

impl DocumentConverterBuilder {
    pub fn config(mut self, config: MappingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn conversions(mut self, conversions: CustomConversions) -> Self {
        self.conversions = conversions;
        self
    }

    /// Register `T` up front so documents tagged with its alias can be read.
    pub fn register<T: Persistable>(self) -> Self {
        self.register_type(EntityType::of::<T>())
    }

    pub fn register_type(mut self, entity_type: EntityType) -> Self {
        self.types.push(entity_type);
        self
    }

    /// Validate the configuration and introspect every registered type.
    pub fn build(self) -> MappingResult<DocumentConverter> {
        self.config.validate()?;
        let converter = DocumentConverter {
            inner: Arc::new(ConverterInner {
                config: self.config,
                registry: MetadataRegistry::new(),
                conversions: self.conversions,
                aliases: TypeAliasMapper::new(),
                resolver: ReferenceResolver::new(self.fetcher),
            }),
        };
        for entity_type in &self.types {
            converter.register_type(entity_type)?;
        }
        Ok(converter)
    }
}

impl std::fmt::Debug for DocumentConverterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentConverterBuilder")
            .field("config", &self.config)
            .field("conversions", &self.conversions)
            .field("types", &self.types)
            .finish_non_exhaustive()
    }
}

impl DocumentConverter {
    pub fn builder(fetcher: Arc<dyn DocumentFetcher>) -> DocumentConverterBuilder {
        DocumentConverterBuilder {
            fetcher,
            config: MappingConfig::default(),
            conversions: CustomConversions::default(),
            types: Vec::new(),
        }
    }

    /// A converter with default configuration and no overrides.
    pub fn new(fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self {
            inner: Arc::new(ConverterInner {
                config: MappingConfig::default(),
                registry: MetadataRegistry::new(),
                conversions: CustomConversions::default(),
                aliases: TypeAliasMapper::new(),
                resolver: ReferenceResolver::new(fetcher),
            }),
        }
    }

    pub fn config(&self) -> &MappingConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &MetadataRegistry {
        &self.inner.registry
    }

    pub fn conversions(&self) -> &CustomConversions {
        &self.inner.conversions
    }

    pub fn aliases(&self) -> &TypeAliasMapper {
        &self.inner.aliases
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.inner.resolver
    }

    pub fn register<T: Persistable>(&self) -> MappingResult<Arc<EntityMetadata>> {
        self.register_type(&EntityType::of::<T>())
    }

    /// Introspect `entity_type` and bind its alias.
    pub fn register_type(&self, entity_type: &EntityType) -> MappingResult<Arc<EntityMetadata>> {
        let metadata = self.inner.registry.describe_type(entity_type)?;
        self.inner.aliases.register(metadata.alias(), metadata.type_key())?;
        Ok(metadata)
    }

    /// Metadata for the declared target, registering concrete targets on
    /// first encounter.
    pub fn metadata_for(&self, target: &EntityRef) -> MappingResult<Arc<EntityMetadata>> {
        match target.entity_type() {
            Some(entity_type) if !self.inner.registry.contains(&entity_type.key()) => {
                self.register_type(&entity_type)
            }
            _ => self.inner.registry.describe(&target.key()),
        }
    }

    // -----------------------------------------------------------------------
    // Write
    // -----------------------------------------------------------------------

    /// Write `entity` where its own type is declared. No type tag is
    /// written unless the configuration asks for one.
    pub fn write(&self, entity: &dyn Entity) -> MappingResult<DocumentNode> {
        self.write_as(entity, &entity.type_key())
    }

    /// Write `entity` where `declared` is the static type, tagging the
    /// document when the concrete type differs.
    pub fn write_as(&self, entity: &dyn Entity, declared: &TypeKey) -> MappingResult<DocumentNode> {
        self.write_entity(entity, declared)
    }

    /// Write an arbitrary value of the given declared shape.
    pub fn write_value(&self, value: &Value, shape: &PropertyShape) -> MappingResult<DocumentNode> {
        self.write_node(value, shape)
    }

    /// The stored identifier of `entity`.
    pub fn identifier_of(&self, entity: &dyn Entity) -> MappingResult<String> {
        reference::identifier_of(entity, &self.inner.registry)
    }

    fn write_node(&self, value: &Value, shape: &PropertyShape) -> MappingResult<DocumentNode> {
        if value.is_null() {
            return Ok(DocumentNode::null());
        }
        if let Some(result) = self.inner.conversions.write_override(value) {
            return result.map(DocumentNode::Scalar);
        }

        match (shape, value) {
            (PropertyShape::Collection(element), Value::List(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    self.write_node(item, element)
                        .map_err(|e| e.at(&format!("[{i}]")))
                })
                .collect::<MappingResult<Vec<_>>>()
                .map(DocumentNode::Array),
            (PropertyShape::Map { key, value: element }, Value::Map(entries)) => {
                let mut doc = Document::new();
                for (name, item) in entries {
                    check_map_key(name, *key)
                        .and_then(|()| self.write_node(item, element))
                        .map(|node| doc.put(name.as_str(), node))
                        .map_err(|e| e.at(name))?;
                }
                Ok(DocumentNode::Object(doc))
            }
            (PropertyShape::Entity(target), Value::Entity(entity)) => {
                self.write_entity(entity.as_ref(), &target.key())
            }
            (PropertyShape::Entity(target), Value::Lazy(reference)) => match reference.get() {
                Some(entity) => self.write_entity(entity, &target.key()),
                None => Err(MappingError::shape_mismatch(target, "unresolved lazy reference")),
            },
            (PropertyShape::Scalar(scalar), value) => {
                write_scalar(scalar, value).map(DocumentNode::Scalar)
            }
            (shape, value) => Err(MappingError::shape_mismatch(shape, value.describe())),
        }
    }

    fn write_entity(&self, entity: &dyn Entity, declared: &TypeKey) -> MappingResult<DocumentNode> {
        let concrete = entity.type_key();
        let overridden = self
            .inner
            .conversions
            .write_override_for(&concrete, entity.as_any());
        if let Some(result) = overridden {
            return result.map(DocumentNode::Scalar);
        }

        let metadata = self.metadata_for(&EntityRef::from_type(entity.entity_type()))?;
        if !self.inner.registry.is_assignable(&concrete, declared)? {
            return Err(MappingError::shape_mismatch(declared, format!("entity {concrete}")));
        }

        let config = &self.inner.config;
        let mut doc = Document::new();
        let tag = if config.always_write_type_tag {
            Some(metadata.alias().to_string())
        } else {
            self.inner.aliases.tag_for(&concrete, declared)
        };
        if let Some(tag) = tag {
            doc.put(config.type_key.as_str(), tag);
        }

        for property in metadata.properties() {
            if !property.is_writable() {
                trace!(
                    entity = %concrete,
                    property = property.name(),
                    "read-only property skipped"
                );
                continue;
            }
            let value = entity.get_property(property.name()).unwrap_or(Value::Null);
            let written = if property.is_reference() {
                self.inner.resolver.reduce(property, &value, &self.inner.registry)
            } else {
                self.write_node(&value, property.shape())
            };
            let node = written.map_err(|e| e.at(property.name()))?;

            if node.is_null() && !config.store_nulls {
                continue;
            }
            doc.put(property.stored_name(), node);
        }
        trace!(entity = %concrete, fields = doc.len(), "entity written");
        Ok(DocumentNode::Object(doc))
    }

    // -----------------------------------------------------------------------
    // Read
    // -----------------------------------------------------------------------

    /// Read a `T` from `node`. A null node yields `T::default()`.
    pub fn read<T: Persistable>(&self, node: &DocumentNode) -> MappingResult<T> {
        match self.read_value(&PropertyShape::entity::<T>(), node)? {
            Value::Null => Ok(T::default()),
            value => value.downcast::<T>(),
        }
    }

    /// Read an entity declared as `declared`, which may be abstract.
    ///
    /// A null node yields a blank instance of the declared type.
    pub fn read_as(
        &self,
        declared: &TypeKey,
        node: &DocumentNode,
    ) -> MappingResult<Box<dyn Entity>> {
        let target = match self.inner.registry.entity_type(declared) {
            Some(entity_type) => EntityRef::from_type(entity_type),
            None => EntityRef::from_key(*declared),
        };
        self.read_entity(&target, node, &mut ReadContext::default())
    }

    /// Read a value of the given declared shape.
    pub fn read_value(&self, shape: &PropertyShape, node: &DocumentNode) -> MappingResult<Value> {
        self.read_node(shape, node, &mut ReadContext::default())
    }

    fn read_node(
        &self,
        shape: &PropertyShape,
        node: &DocumentNode,
        ctx: &mut ReadContext,
    ) -> MappingResult<Value> {
        if node.is_null() {
            return Ok(Value::Null);
        }
        if let (DocumentNode::Scalar(scalar), Some(target)) = (node, shape.override_target()) {
            if let Some(result) = self.inner.conversions.read_override(scalar, &target) {
                return result;
            }
        }

        match shape {
            PropertyShape::Collection(element) => {
                let items = node
                    .as_array()
                    .ok_or_else(|| MappingError::shape_mismatch("array", node.shape()))?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        self.read_node(element, item, ctx)
                            .map_err(|e| e.at(&format!("[{i}]")))
                    })
                    .collect::<MappingResult<Vec<_>>>()
                    .map(Value::List)
            }
            PropertyShape::Map { key, value: element } => {
                let doc = node
                    .as_object()
                    .ok_or_else(|| MappingError::shape_mismatch("object", node.shape()))?;
                doc.iter()
                    .map(|(name, item)| {
                        check_map_key(name, *key)
                            .and_then(|()| self.read_node(element, item, ctx))
                            .map(|value| (name.clone(), value))
                            .map_err(|e| e.at(name))
                    })
                    .collect::<MappingResult<_>>()
                    .map(Value::Map)
            }
            PropertyShape::Entity(target) => self.read_entity(target, node, ctx).map(Value::Entity),
            PropertyShape::Scalar(scalar) => read_scalar(scalar, node).map(Value::from_scalar),
        }
    }

    fn read_entity(
        &self,
        declared: &EntityRef,
        node: &DocumentNode,
        ctx: &mut ReadContext,
    ) -> MappingResult<Box<dyn Entity>> {
        if node.is_null() {
            let metadata = self.metadata_for(declared)?;
            return self.inner.registry.instantiate(&metadata.type_key());
        }
        let doc = node.as_object().ok_or_else(|| {
            MappingError::shape_mismatch(format!("object for {declared}"), node.shape())
        })?;

        let type_key = self.inner.config.type_key.as_str();
        let metadata = match doc.get(type_key) {
            Some(tag) => {
                let tag = tag.as_str().ok_or_else(|| {
                    MappingError::shape_mismatch("string type tag", tag.shape()).at(type_key)
                })?;
                let actual = self.inner.aliases.type_for(tag)?;
                if !self.inner.registry.is_assignable(&actual, &declared.key())? {
                    return Err(MappingError::shape_mismatch(declared, format!("entity {actual}")));
                }
                self.inner.registry.describe(&actual)?
            }
            None => self.metadata_for(declared)?,
        };

        let mut entity = self.inner.registry.instantiate(&metadata.type_key())?;
        for property in metadata.properties() {
            let Some(field) = doc.get(property.stored_name()) else {
                continue;
            };
            if field.is_null() {
                continue;
            }
            let value = if property.is_reference() {
                self.inner.resolver.restore(property, field, self, ctx)
            } else {
                self.read_node(property.shape(), field, ctx)
            };
            value
                .and_then(|value| entity.set_property(property.name(), value))
                .map_err(|e| e.at(property.name()))?;
        }
        trace!(entity = %metadata.type_key(), "entity read");
        Ok(entity)
    }

    /// Fetch and read the entity stored under `id`, guarding against cycles
    /// of eager references.
    pub(crate) fn resolve_reference(
        &self,
        id: &str,
        target: &EntityRef,
        ctx: &mut ReadContext,
    ) -> MappingResult<Box<dyn Entity>> {
        let metadata = match self.metadata_for(target) {
            Ok(metadata) => metadata,
            Err(MappingError::NoMetadata(_)) => return self.resolve_abstract(id, target, ctx),
            Err(e) => return Err(e),
        };
        let collection = metadata.collection();
        ctx.check(collection, id)?;
        let node = self.inner.resolver.fetch(id, collection)?;
        self.read_referenced(collection, id, target, &node, ctx)
    }

    /// Resolve an eager collection of references with one batch fetch.
    /// Null identifiers stay null.
    pub(crate) fn resolve_references(
        &self,
        ids: &[Option<String>],
        target: &EntityRef,
        ctx: &mut ReadContext,
    ) -> MappingResult<Vec<Value>> {
        let metadata = match self.metadata_for(target) {
            Ok(metadata) => metadata,
            Err(MappingError::NoMetadata(_)) => {
                return ids
                    .iter()
                    .enumerate()
                    .map(|(i, id)| match id {
                        Some(id) => self
                            .resolve_reference(id, target, ctx)
                            .map(Value::Entity)
                            .map_err(|e| e.at(&format!("[{i}]"))),
                        None => Ok(Value::Null),
                    })
                    .collect();
            }
            Err(e) => return Err(e),
        };
        let collection = metadata.collection();
        for (i, id) in ids.iter().enumerate() {
            if let Some(id) = id {
                ctx.check(collection, id).map_err(|e| e.at(&format!("[{i}]")))?;
            }
        }

        let present: Vec<String> = ids.iter().flatten().cloned().collect();
        let mut fetched = self.inner.resolver.fetch_all(&present, collection)?.into_iter();
        ids.iter()
            .enumerate()
            .map(|(i, id)| {
                let Some(id) = id else {
                    return Ok(Value::Null);
                };
                fetched
                    .next()
                    .flatten()
                    .ok_or_else(|| MappingError::DanglingReference(id.clone()))
                    .and_then(|node| self.read_referenced(collection, id, target, &node, ctx))
                    .map(Value::Entity)
                    .map_err(|e| e.at(&format!("[{i}]")))
            })
            .collect()
    }

    /// An abstract target has no collection of its own. Each registered
    /// subtype's collection is searched; a tagged document names its type,
    /// an untagged one is read as the only subtype it was found under.
    fn resolve_abstract(
        &self,
        id: &str,
        target: &EntityRef,
        ctx: &mut ReadContext,
    ) -> MappingResult<Box<dyn Entity>> {
        let candidates = self.inner.registry.subtypes_of(&target.key())?;
        if candidates.is_empty() {
            let collection = target.key().short_name();
            ctx.check(collection, id)?;
            let node = self.inner.resolver.fetch(id, collection)?;
            return self.read_referenced(collection, id, target, &node, ctx);
        }

        let mut collections: Vec<&str> = candidates.iter().map(|m| m.collection()).collect();
        collections.sort_unstable();
        collections.dedup();
        let mut hits = Vec::new();
        for collection in collections {
            ctx.check(collection, id)?;
            if let Some(node) = self.inner.resolver.find(id, collection)? {
                hits.push((collection, node));
            }
        }

        let type_key = self.inner.config.type_key.as_str();
        let tagged = hits
            .iter()
            .find(|(_, node)| node.as_object().is_some_and(|doc| doc.get(type_key).is_some()));
        if let Some((collection, node)) = tagged {
            return self.read_referenced(collection, id, target, node, ctx);
        }

        let mut owners = candidates
            .iter()
            .filter(|m| hits.iter().any(|(collection, _)| *collection == m.collection()));
        match (owners.next(), owners.next(), hits.first()) {
            (Some(owner), None, Some((collection, node))) => {
                let concrete = match self.inner.registry.entity_type(&owner.type_key()) {
                    Some(entity_type) => EntityRef::from_type(entity_type),
                    None => EntityRef::from_key(owner.type_key()),
                };
                trace!(
                    id,
                    target = %target,
                    concrete = %owner.type_key(),
                    "untagged reference read by collection"
                );
                self.read_referenced(collection, id, &concrete, node, ctx)
            }
            (_, _, None) => Err(MappingError::DanglingReference(id.to_string())),
            _ => Err(MappingError::NoMetadata(target.key().short_name().to_string())),
        }
    }

    fn read_referenced(
        &self,
        collection: &str,
        id: &str,
        declared: &EntityRef,
        node: &DocumentNode,
        ctx: &mut ReadContext,
    ) -> MappingResult<Box<dyn Entity>> {
        ctx.check(collection, id)?;
        ctx.resolving.push((collection.to_string(), id.to_string()));
        let entity = self.read_entity(declared, node, ctx);
        ctx.resolving.pop();
        entity
    }

    /// Resolution entry point for lazy proxies. Each proxy starts a fresh
    /// read path.
    pub(crate) fn resolve_lazy(
        &self,
        id: &str,
        target: &EntityRef,
    ) -> MappingResult<Box<dyn Entity>> {
        self.resolve_reference(id, target, &mut ReadContext::default())
    }
}

impl std::fmt::Debug for DocumentConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentConverter")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .field("aliases", &self.inner.aliases)
            .field("conversions", &self.inner.conversions)
            .finish()
    }
}

fn write_scalar(declared: &ScalarType, value: &Value) -> MappingResult<Scalar> {
    let scalar = value
        .to_scalar()
        .ok_or_else(|| MappingError::shape_mismatch(declared, value.describe()))?;
    match (declared, scalar) {
        (ScalarType::Native(ScalarKind::Float), Scalar::Int(i)) => Ok(Scalar::Float(i as f64)),
        (ScalarType::Native(kind), scalar) if scalar.kind() == *kind => Ok(scalar),
        (ScalarType::Native(kind), scalar) => {
            Err(MappingError::shape_mismatch(kind, scalar.kind()))
        }
        // Without an override a custom type can only be stored as a native scalar.
        (ScalarType::Custom(_), scalar) => Ok(scalar),
    }
}

fn read_scalar(declared: &ScalarType, node: &DocumentNode) -> MappingResult<Scalar> {
    let scalar = node
        .as_scalar()
        .ok_or_else(|| MappingError::shape_mismatch(declared, node.shape()))?;
    match (declared, scalar) {
        (ScalarType::Native(ScalarKind::Float), Scalar::Int(i)) => Ok(Scalar::Float(*i as f64)),
        (ScalarType::Native(kind), scalar) if scalar.kind() == *kind => Ok(scalar.clone()),
        (ScalarType::Native(kind), scalar) => {
            Err(MappingError::shape_mismatch(kind, scalar.kind()))
        }
        (ScalarType::Custom(key), scalar) => Err(MappingError::conversion(
            key.short_name(),
            format!("no read conversion from {}", scalar.kind()),
        )),
    }
}

/// Map keys are stored as strings; a declared non-string key kind must
/// parse back from its stored form.
fn check_map_key(key: &str, kind: ScalarKind) -> MappingResult<()> {
    let valid = match kind {
        ScalarKind::String => true,
        ScalarKind::Int => key.parse::<i64>().is_ok(),
        ScalarKind::Bool => key.parse::<bool>().is_ok(),
        ScalarKind::Float => key.parse::<f64>().is_ok(),
        ScalarKind::Null | ScalarKind::Binary => false,
    };
    if valid {
        Ok(())
    } else {
        Err(MappingError::shape_mismatch(format!("{kind} map key"), format!("'{key}'")))
    }
}
