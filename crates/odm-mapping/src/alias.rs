use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::error::{MappingError, MappingResult};
use crate::types::TypeKey;

#[derive(Default)]
struct AliasTable {
    by_alias: HashMap<String, TypeKey>,
    by_type: HashMap<TypeKey, String>,
}

/// Two-way mapping between concrete types and stored type tags.
#[derive(Default)]
pub struct TypeAliasMapper {
    table: RwLock<AliasTable>,
}

impl TypeAliasMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `alias` to `key`.
    ///
    /// Registering the same pair again is a no-op. Binding an alias that
    /// already names another type, or a second alias for the same type,
    /// fails with [`MappingError::InvalidMetadata`].
    pub fn register(&self, alias: &str, key: TypeKey) -> MappingResult<()> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = table.by_alias.get(alias) {
            if *existing == key {
                return Ok(());
            }
            return Err(MappingError::invalid_metadata(
                key.short_name(),
                format!("alias '{alias}' is already used by {existing}"),
            ));
        }
        if let Some(existing) = table.by_type.get(&key) {
            return Err(MappingError::invalid_metadata(
                key.short_name(),
                format!("already aliased as '{existing}'"),
            ));
        }
        table.by_alias.insert(alias.to_string(), key);
        table.by_type.insert(key, alias.to_string());
        debug!(alias, entity = key.short_name(), "type alias registered");
        Ok(())
    }

    pub fn alias_of(&self, key: &TypeKey) -> Option<String> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_type
            .get(key)
            .cloned()
    }

    /// Tag to record for a value of `concrete` written where `expected` is
    /// declared. `None` when the two are the same type.
    pub fn tag_for(&self, concrete: &TypeKey, expected: &TypeKey) -> Option<String> {
        if concrete == expected {
            return None;
        }
        self.alias_of(concrete)
    }

    /// Concrete type named by a stored tag.
    pub fn type_for(&self, tag: &str) -> MappingResult<TypeKey> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_alias
            .get(tag)
            .copied()
            .ok_or_else(|| MappingError::UnknownAlias(tag.to_string()))
    }

    pub fn len(&self) -> usize {
        self.table.read().unwrap_or_else(PoisonError::into_inner).by_alias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TypeAliasMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeAliasMapper").field("aliases", &self.len()).finish()
    }
}
