//! Asset server configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// One package: a name and the directory its assets live under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageConfig {
    pub name: String,
    pub root: PathBuf,
}

impl PackageConfig {
    /// Create a new package entry
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }
}

/// Configuration for [`FileAssetSource`](crate::FileAssetSource)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetServerConfig {
    /// Packages assets can be requested from
    pub packages: Vec<PackageConfig>,
    /// Watch package directories for changes
    pub hot_reload: bool,
    /// Ignore repeated change events for a file within this window
    pub debounce_ms: u64,
    /// Report a full mip chain for decoded images
    pub generate_mips: bool,
}

impl Default for AssetServerConfig {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            hot_reload: true,
            debounce_ms: 100,
            generate_mips: false,
        }
    }
}

impl AssetServerConfig {
    /// Add a package
    pub fn with_package(mut self, name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.packages.push(PackageConfig::new(name, root));
        self
    }

    /// Enable or disable file watching
    pub fn with_hot_reload(mut self, hot_reload: bool) -> Self {
        self.hot_reload = hot_reload;
        self
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> ServerResult<Self> {
        serde_json::from_str(json).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ServerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}
