//! Load permission models from YAML documents.

use crate::error::{RegistryError, Result};
use crate::{ModelDefinition, PermissionRegistry};
use std::path::Path;
use tracing::{debug, info};

/// Load permission model definitions from YAML.
pub struct ModelLoader;

impl ModelLoader {
    /// Parse a permission model from a YAML string.
    pub fn load_from_str(content: &str) -> Result<PermissionRegistry> {
        let definition: ModelDefinition = serde_yaml::from_str(content)
            .map_err(|e| RegistryError::ModelParsing(format!("Failed to parse YAML: {}", e)))?;
        PermissionRegistry::from_definition(definition)
    }

    /// Load a permission model from a YAML file.
    pub async fn load_from_file(path: &Path) -> Result<PermissionRegistry> {
        debug!("Loading permission model from: {:?}", path);

        let content = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::ModelParsing(format!("Failed to read file: {}", e)))?;

        let registry = Self::load_from_str(&content)?;

        info!(
            "Loaded permission model '{}' from {:?}",
            registry.namespace(),
            path
        );

        Ok(registry)
    }
}
