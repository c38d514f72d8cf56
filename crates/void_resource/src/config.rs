//! Registry configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, ResourceResult};

/// Resource registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSystemConfig {
    /// Number of resource slots, fixed for the life of the registry
    pub max_resource_count: usize,
    /// Keep hot-reloadable resources alive and watch their sources
    pub hot_reload: bool,
}

impl Default for ResourceSystemConfig {
    fn default() -> Self {
        Self {
            max_resource_count: 1024,
            hot_reload: true,
        }
    }
}

impl ResourceSystemConfig {
    /// Default configuration with a given slot count
    pub fn with_capacity(max_resource_count: usize) -> Self {
        Self {
            max_resource_count,
            ..Default::default()
        }
    }

    /// Disable or enable hot reload
    pub fn with_hot_reload(mut self, hot_reload: bool) -> Self {
        self.hot_reload = hot_reload;
        self
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> ResourceResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ResourceError::invalid_config("resource system", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ResourceError::invalid_config(path.display(), e))?;
        Self::from_json(&json)
    }

    /// Reject unusable values
    pub fn validate(&self) -> ResourceResult<()> {
        if self.max_resource_count == 0 {
            return Err(ResourceError::invalid_config(
                "resource system",
                "max_resource_count must be at least 1",
            ));
        }
        if self.max_resource_count >= u32::MAX as usize {
            return Err(ResourceError::invalid_config(
                "resource system",
                "max_resource_count exceeds the handle index range",
            ));
        }
        Ok(())
    }
}
