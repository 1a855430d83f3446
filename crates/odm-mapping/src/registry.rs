use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::entity::{Entity, EntityType};
use crate::error::{MappingError, MappingResult};
use crate::metadata::EntityMetadata;
use crate::types::TypeKey;

/// Process-wide cache of entity metadata.
///
/// Each registered type is introspected at most once per successful insert.
/// Two threads racing on the first `describe` of a type may both build the
/// metadata, but only the first insert is kept, so every caller gets the
/// same `Arc` afterwards.
#[derive(Default)]
pub struct MetadataRegistry {
    types: RwLock<HashMap<TypeKey, EntityType>>,
    metadata: RwLock<HashMap<TypeKey, Arc<EntityMetadata>>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `entity_type` known so it can be described and instantiated by key.
    pub fn register(&self, entity_type: EntityType) {
        self.types
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity_type.key(), entity_type);
    }

    /// Metadata for `entity_type`, introspecting and registering it on first use.
    pub fn describe_type(&self, entity_type: &EntityType) -> MappingResult<Arc<EntityMetadata>> {
        let key = entity_type.key();
        if let Some(found) = self.cached(&key) {
            return Ok(found);
        }

        let built = entity_type.describe();
        if built.type_key() != key {
            return Err(MappingError::invalid_metadata(
                key.short_name(),
                format!("metadata describes {}", built.type_key()),
            ));
        }
        built.validate()?;

        self.register(*entity_type);
        let mut cache = self.metadata.write().unwrap_or_else(PoisonError::into_inner);
        let stable = cache.entry(key).or_insert_with(|| {
            debug!(
                entity = key.short_name(),
                alias = built.alias(),
                properties = built.properties().len(),
                "entity metadata introspected"
            );
            Arc::new(built)
        });
        Ok(Arc::clone(stable))
    }

    /// Metadata for a registered type.
    pub fn describe(&self, key: &TypeKey) -> MappingResult<Arc<EntityMetadata>> {
        if let Some(found) = self.cached(key) {
            return Ok(found);
        }
        let entity_type = self
            .entity_type(key)
            .ok_or_else(|| MappingError::NoMetadata(key.short_name().to_string()))?;
        self.describe_type(&entity_type)
    }

    /// Metadata for the concrete type of `entity`.
    pub fn describe_entity(&self, entity: &dyn Entity) -> MappingResult<Arc<EntityMetadata>> {
        self.describe_type(&entity.entity_type())
    }

    /// A blank instance of a registered type.
    pub fn instantiate(&self, key: &TypeKey) -> MappingResult<Box<dyn Entity>> {
        self.entity_type(key)
            .map(|t| t.instantiate())
            .ok_or_else(|| MappingError::NoMetadata(key.short_name().to_string()))
    }

    pub fn entity_type(&self, key: &TypeKey) -> Option<EntityType> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Number of types with cached metadata.
    pub fn len(&self) -> usize {
        self.metadata.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `concrete` may stand where `declared` is expected.
    ///
    /// True for the same type, for `dyn Entity`, and for any type reachable
    /// through declared supertypes.
    pub fn is_assignable(&self, concrete: &TypeKey, declared: &TypeKey) -> MappingResult<bool> {
        if concrete == declared || declared.is::<dyn Entity>() {
            return Ok(true);
        }
        let mut pending = self.describe(concrete)?.supertypes().to_vec();
        let mut seen = Vec::new();
        while let Some(next) = pending.pop() {
            if next == *declared {
                return Ok(true);
            }
            if seen.contains(&next) {
                continue;
            }
            seen.push(next);
            // Abstract supertypes have no metadata of their own.
            if let Ok(meta) = self.describe(&next) {
                pending.extend_from_slice(meta.supertypes());
            }
        }
        Ok(false)
    }

    /// Registered types other than `declared` that may stand where it is
    /// expected, ordered by alias.
    pub fn subtypes_of(&self, declared: &TypeKey) -> MappingResult<Vec<Arc<EntityMetadata>>> {
        let registered: Vec<TypeKey> = self
            .types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        let mut found = Vec::new();
        for key in registered {
            if key != *declared && self.is_assignable(&key, declared)? {
                found.push(self.describe(&key)?);
            }
        }
        found.sort_by(|a, b| a.alias().cmp(b.alias()));
        Ok(found)
    }

    fn cached(&self, key: &TypeKey) -> Option<Arc<EntityMetadata>> {
        self.metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("described", &self.len())
            .finish()
    }
}
