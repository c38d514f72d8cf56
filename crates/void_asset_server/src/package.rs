//! Asset packages
//!
//! A package is a directory. Assets are addressed by their path relative to
//! the root unless the package carries a `manifest.json` that maps asset
//! names to relative paths.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use void_resource::{AssetError, AssetRequest, LoadedAsset, Name};

use crate::config::PackageConfig;
use crate::error::{ServerError, ServerResult};
use crate::loaders::{decode, LoaderOptions};

/// File name of the optional package manifest
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Deserialize)]
struct ManifestEntry {
    name: String,
    path: PathBuf,
}

#[derive(Deserialize)]
struct Manifest {
    assets: Vec<ManifestEntry>,
}

/// A package opened from disk
#[derive(Debug)]
pub struct Package {
    name: Name,
    root: PathBuf,
    manifest: HashMap<Name, PathBuf>,
}

/// Reject absolute paths and paths that climb out of the root
fn is_contained(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl Package {
    /// Open a package, reading its manifest if there is one
    pub fn open(config: &PackageConfig) -> ServerResult<Self> {
        if !config.root.is_dir() {
            return Err(ServerError::MissingRoot {
                name: config.name.clone(),
                root: config.root.clone(),
            });
        }

        let mut manifest = HashMap::new();
        let manifest_path = config.root.join(MANIFEST_FILE);
        if manifest_path.is_file() {
            let json = std::fs::read_to_string(&manifest_path).map_err(|source| ServerError::Io {
                path: manifest_path.clone(),
                source,
            })?;
            let parsed: Manifest = serde_json::from_str(&json).map_err(|e| ServerError::Manifest {
                package: config.name.clone(),
                message: e.to_string(),
            })?;
            for entry in parsed.assets {
                if !is_contained(&entry.path) {
                    return Err(ServerError::Manifest {
                        package: config.name.clone(),
                        message: format!("path for {} leaves the package: {:?}", entry.name, entry.path),
                    });
                }
                manifest.insert(Name::new(&entry.name), entry.path);
            }
            log::debug!("Package {}: manifest lists {} assets", config.name, manifest.len());
        }

        Ok(Self {
            name: Name::new(&config.name),
            root: config.root.clone(),
            manifest,
        })
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing an asset name
    pub fn resolve(&self, asset: &Name) -> Result<PathBuf, AssetError> {
        if let Some(path) = self.manifest.get(asset) {
            return Ok(self.root.join(path));
        }
        let relative = Path::new(asset.as_str());
        if asset.is_empty() || !is_contained(relative) {
            return Err(AssetError::NotFound {
                name: asset.clone(),
                package: self.name.clone(),
            });
        }
        Ok(self.root.join(relative))
    }
}

/// Every package a source serves
#[derive(Debug, Default)]
pub struct PackageSet {
    packages: HashMap<Name, Package>,
    options: LoaderOptions,
}

impl PackageSet {
    /// Open every configured package
    pub fn open(configs: &[PackageConfig], options: LoaderOptions) -> ServerResult<Self> {
        let mut packages = HashMap::with_capacity(configs.len());
        for config in configs {
            let package = Package::open(config)?;
            if packages.insert(package.name.clone(), package).is_some() {
                return Err(ServerError::DuplicatePackage(config.name.clone()));
            }
        }
        Ok(Self { packages, options })
    }

    pub fn get(&self, name: &Name) -> Option<&Package> {
        self.packages.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// File backing a request
    pub fn resolve(&self, request: &AssetRequest) -> Result<PathBuf, AssetError> {
        self.get(&request.package)
            .ok_or_else(|| AssetError::UnknownPackage(request.package.clone()))?
            .resolve(&request.name)
    }

    /// Read and decode a requested asset
    pub fn read(&self, request: &AssetRequest) -> Result<LoadedAsset, AssetError> {
        let path = self.resolve(request)?;
        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound {
                name: request.name.clone(),
                package: request.package.clone(),
            },
            _ => AssetError::Io {
                name: request.name.clone(),
                message: format!("{:?}: {}", path, e),
            },
        })?;
        let data = decode(request, bytes, &self.options)?;
        Ok(LoadedAsset::new(request.name.clone(), request.package.clone(), data))
    }
}
