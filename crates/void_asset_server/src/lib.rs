//! # Void Asset Server
//!
//! Filesystem [`AssetSource`](void_resource::AssetSource) for the resource
//! registry.
//!
//! ## Features
//!
//! - **Packages**: named directories, optionally with a `manifest.json`
//! - **Background IO**: asynchronous requests are read and decoded on a worker thread
//! - **Loaders**: text, raw bytes and PNG/JPG/BMP/HDR images
//! - **Hot-Reload**: watched files are decoded again when they change on disk
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use void_asset_server::{AssetServerConfig, FileAssetSource};
//! use void_resource::prelude::*;
//!
//! let config = AssetServerConfig::default().with_package("core", "assets/core");
//! let source = Arc::new(FileAssetSource::new(config)?);
//!
//! let mut system = ResourceSystem::new(
//!     ResourceSystemConfig::default().with_hot_reload(true),
//!     source,
//!     Box::new(HeadlessBackend::new()),
//! )?;
//! void_resource_handlers::register_builtin_handlers(&mut system)?;
//!
//! // In your game loop:
//! system.update();
//! ```

pub mod config;
pub mod error;
pub mod loaders;
pub mod package;
pub mod source;
pub mod watcher;
pub mod worker;

pub use config::{AssetServerConfig, PackageConfig};
pub use error::{ServerError, ServerResult};
pub use loaders::LoaderOptions;
pub use package::{Package, PackageSet, MANIFEST_FILE};
pub use source::FileAssetSource;
pub use watcher::{FileChange, FileChangeKind, FileWatcher};
pub use worker::IoWorker;
