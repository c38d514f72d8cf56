//! # void_resource - Typed Resource Registry
//!
//! Reference-counted cache between asset loading and the subsystems that
//! consume resources:
//! - Name-keyed deduplication with generational handles
//! - Per-kind handlers behind one request/release contract
//! - Synchronous and asynchronous loads, joined with a once-only barrier
//! - Hot reload that bumps the resource generation in place
//!
//! ## Example
//!
//! ```ignore
//! use void_resource::prelude::*;
//!
//! let source = Arc::new(MemoryAssetSource::new());
//! let mut system = ResourceSystem::new(
//!     ResourceSystemConfig::default(),
//!     source,
//!     Box::new(HeadlessBackend::new()),
//! )?;
//! system.register_handler(Box::new(MyHandler))?;
//!
//! let handle = system.request(
//!     "rock_albedo",
//!     RequestInfo::new(ResourceKind::Texture)
//!         .with_asset(AssetRequest::image("rock_albedo.png", "core")),
//! )?;
//!
//! // Each frame
//! system.update();
//! for event in system.drain_events() {
//!     // ...
//! }
//!
//! system.release("rock_albedo");
//! ```

pub mod asset;
pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod handle;
pub mod handler;
pub mod join;
pub mod kind;
pub mod memory;
pub mod name;
pub mod request;
pub mod resource;
pub mod system;
pub mod task;

mod name_index;
mod slot_table;
mod watch;

pub use asset::{
    AssetChange, AssetCompletion, AssetData, AssetError, AssetKind, AssetReply, AssetRequest, AssetSource,
    ImageAsset, LoadedAsset, Ticket, WatchId,
};
pub use backend::{
    BackendError, GeometryDesc, GeometryId, HeadlessBackend, InstanceId, RenderBackend, ShaderDesc, ShaderId,
    ShaderStage, ShaderStageSource, TextureDesc, TextureFlags, TextureId, TextureType,
};
pub use config::ResourceSystemConfig;
pub use error::{ResourceError, ResourceResult};
pub use event::ResourceEvent;
pub use handle::ResourceHandle;
pub use handler::ResourceHandler;
pub use join::{JoinBarrier, JoinEntry, JoinProgress, JoinState};
pub use kind::ResourceKind;
pub use memory::MemoryAssetSource;
pub use name::Name;
pub use request::{ConfigSource, RequestInfo, ResourceCallback, TextureOptions};
pub use resource::{Generation, Resource, ResourceState};
pub use system::ResourceSystem;
pub use task::{LoadTask, TaskId, TaskStatus};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::asset::{AssetData, AssetKind, AssetRequest, AssetSource, ImageAsset, LoadedAsset};
    pub use crate::backend::{HeadlessBackend, RenderBackend};
    pub use crate::config::ResourceSystemConfig;
    pub use crate::error::{ResourceError, ResourceResult};
    pub use crate::event::ResourceEvent;
    pub use crate::handle::ResourceHandle;
    pub use crate::handler::ResourceHandler;
    pub use crate::kind::ResourceKind;
    pub use crate::memory::MemoryAssetSource;
    pub use crate::name::Name;
    pub use crate::request::RequestInfo;
    pub use crate::resource::{Generation, Resource, ResourceState};
    pub use crate::system::ResourceSystem;
    pub use std::sync::Arc;
}
