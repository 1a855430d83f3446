use std::sync::Arc;

use odm_document::{DocumentNode, Scalar};
use odm_store::DocumentFetcher;
use tracing::{debug, trace};

use crate::converter::{DocumentConverter, ReadContext};
use crate::entity::Entity;
use crate::error::{MappingError, MappingResult};
use crate::lazy::LazyReference;
use crate::metadata::{EntityRef, PropertyMetadata};
use crate::registry::MetadataRegistry;
use crate::value::Value;

/// Stores references as identifiers and turns identifiers back into
/// entities or lazy proxies.
///
/// The only component that talks to the [`DocumentFetcher`].
#[derive(Clone)]
pub struct ReferenceResolver {
    fetcher: Arc<dyn DocumentFetcher>,
}

impl ReferenceResolver {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self { fetcher }
    }

    /// Stored form of a reference property: an identifier, or an array of
    /// identifiers for a collection of references.
    pub fn reduce(
        &self,
        property: &PropertyMetadata,
        value: &Value,
        registry: &MetadataRegistry,
    ) -> MappingResult<DocumentNode> {
        let (_, many) = reference_target(property)?;
        match value {
            Value::Null => Ok(DocumentNode::null()),
            Value::List(items) if many => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    self.reduce_one(item, registry)
                        .map_err(|e| e.at(&format!("[{i}]")))
                })
                .collect::<MappingResult<Vec<_>>>()
                .map(DocumentNode::Array),
            single if !many => self.reduce_one(single, registry),
            other => Err(MappingError::shape_mismatch("list of references", other.describe())),
        }
    }

    fn reduce_one(
        &self,
        value: &Value,
        registry: &MetadataRegistry,
    ) -> MappingResult<DocumentNode> {
        match value {
            Value::Null => Ok(DocumentNode::null()),
            Value::Entity(entity) => {
                identifier_of(entity.as_ref(), registry).map(DocumentNode::from)
            }
            // Writing a proxy never resolves it.
            Value::Lazy(reference) => match (reference.identifier(), reference.get()) {
                (Some(id), _) => Ok(DocumentNode::from(id)),
                (None, Some(entity)) => identifier_of(entity, registry).map(DocumentNode::from),
                (None, None) => Err(MappingError::MissingIdentifier(
                    reference.target().short_name().to_string(),
                )),
            },
            other => Err(MappingError::shape_mismatch("entity reference", other.describe())),
        }
    }

    /// In-memory form of a stored reference: resolved entities for eager
    /// properties, one unresolved proxy per identifier for lazy ones.
    ///
    /// An eager collection is fetched in one batch.
    pub(crate) fn restore(
        &self,
        property: &PropertyMetadata,
        node: &DocumentNode,
        converter: &DocumentConverter,
        ctx: &mut ReadContext,
    ) -> MappingResult<Value> {
        let (target, many) = reference_target(property)?;
        if !many {
            return match optional_identifier(node)? {
                None => Ok(Value::Null),
                Some(id) if property.is_lazy() => Ok(defer(id, target, converter)),
                Some(id) => converter.resolve_reference(&id, &target, ctx).map(Value::Entity),
            };
        }

        let items = node
            .as_array()
            .ok_or_else(|| MappingError::shape_mismatch("array of identifiers", node.shape()))?;
        let ids = items
            .iter()
            .enumerate()
            .map(|(i, item)| optional_identifier(item).map_err(|e| e.at(&format!("[{i}]"))))
            .collect::<MappingResult<Vec<_>>>()?;
        if property.is_lazy() {
            let proxies = ids
                .into_iter()
                .map(|id| id.map_or(Value::Null, |id| defer(id, target, converter)))
                .collect();
            return Ok(Value::List(proxies));
        }
        converter.resolve_references(&ids, &target, ctx).map(Value::List)
    }

    /// The document stored under `id`, if any.
    ///
    /// `target` is the referenced type's stored collection when known.
    pub fn find(&self, id: &str, target: &str) -> MappingResult<Option<DocumentNode>> {
        let found = self.fetcher.fetch_by_id(id, target)?;
        debug!(id, target, found = found.is_some(), "reference fetched");
        Ok(found)
    }

    /// Fetch the document stored under `id`. A miss is a dangling reference.
    pub fn fetch(&self, id: &str, target: &str) -> MappingResult<DocumentNode> {
        self.find(id, target)?
            .ok_or_else(|| MappingError::DanglingReference(id.to_string()))
    }

    /// Fetch several documents of one collection in a single call, in the
    /// order of `ids`.
    pub fn fetch_all(
        &self,
        ids: &[String],
        target: &str,
    ) -> MappingResult<Vec<Option<DocumentNode>>> {
        let found = self.fetcher.fetch_batch(ids, target)?;
        debug!(
            target,
            requested = ids.len(),
            found = found.iter().filter(|node| node.is_some()).count(),
            "references fetched"
        );
        Ok(found)
    }
}

fn defer(id: String, target: EntityRef, converter: &DocumentConverter) -> Value {
    trace!(id = %id, target = %target, "lazy reference deferred");
    Value::Lazy(LazyReference::unresolved(id, target, converter.clone()))
}

impl std::fmt::Debug for ReferenceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceResolver").finish_non_exhaustive()
    }
}

fn reference_target(property: &PropertyMetadata) -> MappingResult<(EntityRef, bool)> {
    property.shape().reference_target().ok_or_else(|| {
        MappingError::shape_mismatch("entity or collection of entities", property.shape())
    })
}

/// The stored identifier of `entity`: its identifier property as a string.
pub(crate) fn identifier_of(
    entity: &dyn Entity,
    registry: &MetadataRegistry,
) -> MappingResult<String> {
    let metadata = registry.describe_entity(entity)?;
    let type_name = metadata.type_key().short_name();
    let property = metadata
        .identifier()
        .ok_or_else(|| MappingError::MissingIdentifier(type_name.to_string()))?;
    match entity.get_property(property.name()) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id),
        Some(Value::Int(id)) => Ok(id.to_string()),
        _ => Err(MappingError::MissingIdentifier(type_name.to_string())),
    }
}

fn optional_identifier(node: &DocumentNode) -> MappingResult<Option<String>> {
    match node {
        DocumentNode::Scalar(Scalar::Null) => Ok(None),
        DocumentNode::Scalar(Scalar::String(id)) => Ok(Some(id.clone())),
        DocumentNode::Scalar(Scalar::Int(id)) => Ok(Some(id.to_string())),
        other => Err(MappingError::shape_mismatch("identifier", other.shape())),
    }
}
