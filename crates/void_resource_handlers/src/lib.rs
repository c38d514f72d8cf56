//! # void_resource_handlers - Built-in Resource Handlers
//!
//! Handlers for the resource kinds the engine ships with:
//! - Text and binary blobs
//! - Textures (2D, cube, layered) with in-place hot reload
//! - Materials, including metallic/roughness/AO channel packing
//! - Shaders with per-stage hot reload
//! - Static meshes, scenes, heightmap terrain, bitmap fonts and audio clips
//!
//! ## Example
//!
//! ```ignore
//! use void_resource::prelude::*;
//! use void_resource_handlers::register_builtin_handlers;
//!
//! let mut system = ResourceSystem::new(config, source, backend)?;
//! register_builtin_handlers(&mut system)?;
//!
//! system.request(
//!     "crate_material",
//!     RequestInfo::new(ResourceKind::Material)
//!         .with_asset(AssetRequest::text("crate.material.json", "core")),
//! )?;
//! ```

mod common;

pub mod audio;
pub mod font;
pub mod material;
pub mod mesh;
pub mod mra;
pub mod scene;
pub mod shader;
pub mod terrain;
pub mod text;
pub mod texture;

pub use audio::{AudioClip, AudioHandler, SampleFormat};
pub use font::{BitmapFont, BitmapFontHandler, FontConfig, Glyph};
pub use material::{Material, MaterialConfig, MaterialHandler};
pub use mesh::{Bounds, MeshConfig, MeshGeometry, StaticMesh, StaticMeshHandler, Vertex3d};
pub use mra::{MraChannel, AO_DEFAULT, METALLIC_DEFAULT, ROUGHNESS_DEFAULT};
pub use scene::{Attachment, Scene, SceneConfig, SceneHandler, SceneNode, Transform};
pub use shader::{Shader, ShaderConfig, ShaderHandler};
pub use terrain::{HeightmapTerrain, HeightmapTerrainHandler, TerrainConfig};
pub use text::{BinaryHandler, BinaryResource, TextHandler, TextResource};
pub use texture::{Texture, TextureHandler, CUBE_FACES};

use void_resource::{ResourceResult, ResourceSystem};

/// Register every built-in handler
pub fn register_builtin_handlers(system: &mut ResourceSystem) -> ResourceResult<()> {
    system.register_handler(Box::new(TextHandler::new()))?;
    system.register_handler(Box::new(BinaryHandler::new()))?;
    system.register_handler(Box::new(TextureHandler::new()))?;
    system.register_handler(Box::new(MaterialHandler::new()))?;
    system.register_handler(Box::new(ShaderHandler::new()))?;
    system.register_handler(Box::new(StaticMeshHandler::new()))?;
    system.register_handler(Box::new(SceneHandler::new()))?;
    system.register_handler(Box::new(HeightmapTerrainHandler::new()))?;
    system.register_handler(Box::new(BitmapFontHandler::new()))?;
    system.register_handler(Box::new(AudioHandler::new()))?;
    log::info!("Registered {} built-in resource handlers", system.handler_kinds().len());
    Ok(())
}
