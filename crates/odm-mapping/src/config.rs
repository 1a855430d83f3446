use serde::{Deserialize, Serialize};

use crate::error::{MappingError, MappingResult};

/// Configuration for a [`DocumentConverter`](crate::DocumentConverter).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Document key holding the type tag.
    pub type_key: String,
    /// Whether null-valued properties are written as explicit nulls.
    /// When `false` they are left out of the document.
    pub store_nulls: bool,
    /// Tag every entity document, not only those whose declared type
    /// differs from the concrete one.
    pub always_write_type_tag: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            type_key: Self::DEFAULT_TYPE_KEY.to_string(),
            store_nulls: false,
            always_write_type_tag: false,
        }
    }
}

impl MappingConfig {
    pub const DEFAULT_TYPE_KEY: &'static str = "_class";

    pub fn with_type_key(mut self, key: impl Into<String>) -> Self {
        self.type_key = key.into();
        self
    }

    /// Parse a TOML fragment. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> MappingResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| MappingError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MappingResult<()> {
        if self.type_key.is_empty() {
            return Err(MappingError::Config("type_key must not be empty".into()));
        }
        Ok(())
    }
}
