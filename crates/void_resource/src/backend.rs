//! Render backend contract
//!
//! Handlers acquire GPU-side objects through [`RenderBackend`]. Every call is
//! synchronous and fallible from the handler's point of view.
//! [`HeadlessBackend`] keeps everything in memory and records what it was
//! asked to do; it backs tools, servers and tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::name::Name;

/// Errors reported by a render backend
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("Backend out of resources: {0}")]
    OutOfResources(String),

    #[error("Invalid backend handle: {0}")]
    InvalidHandle(u64),

    #[error("Write of {len} bytes at offset {offset} exceeds object size {size}")]
    WriteOutOfBounds { offset: usize, len: usize, size: usize },

    #[error("Backend rejected request: {0}")]
    Rejected(String),
}

macro_rules! backend_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);
    };
}

backend_id!(
    /// Backend texture object
    TextureId
);
backend_id!(
    /// Backend shader object
    ShaderId
);
backend_id!(
    /// Per-material shader instance resources
    InstanceId
);
backend_id!(
    /// Backend vertex/index buffers
    GeometryId
);

/// Texture dimensionality
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureType {
    #[default]
    Flat2d,
    Cube,
    Array2d,
}

/// Texture creation flags
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextureFlags {
    /// Contents may be rewritten after creation
    pub writable: bool,
    /// Depth attachment
    pub depth: bool,
    /// Alpha channel carries transparency
    pub has_transparency: bool,
}

/// Parameters for texture acquisition
#[derive(Clone, Debug, PartialEq)]
pub struct TextureDesc {
    pub name: Name,
    pub texture_type: TextureType,
    pub width: u32,
    pub height: u32,
    pub channel_count: u8,
    pub mip_levels: u32,
    pub layers: u32,
    pub flags: TextureFlags,
}

impl TextureDesc {
    /// Bytes of one layer's base level
    pub fn layer_size(&self) -> usize {
        self.width as usize * self.height as usize * self.channel_count as usize
    }

    /// Bytes of the base level across all layers
    pub fn byte_size(&self) -> usize {
        self.layer_size() * self.layers as usize
    }
}

/// Pipeline stage of a shader module
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    Compute,
}

/// Source of one shader stage
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderStageSource {
    pub stage: ShaderStage,
    pub source: String,
}

/// Parameters for shader acquisition
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderDesc {
    pub name: Name,
    pub stages: Vec<ShaderStageSource>,
    pub attributes: Vec<String>,
    pub uniforms: Vec<String>,
}

/// Parameters for geometry upload
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryDesc {
    pub name: Name,
    pub vertex_stride: u32,
    pub vertex_count: u32,
    pub vertices: Vec<u8>,
    pub indices: Vec<u32>,
}

/// GPU-side collaborator used by handlers
pub trait RenderBackend: Send {
    fn acquire_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, BackendError>;
    fn write_texture(&mut self, id: TextureId, offset: usize, bytes: &[u8]) -> Result<(), BackendError>;
    fn release_texture(&mut self, id: TextureId);

    fn acquire_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderId, BackendError>;
    fn reload_shader(&mut self, id: ShaderId, desc: &ShaderDesc) -> Result<(), BackendError>;
    fn release_shader(&mut self, id: ShaderId);

    fn acquire_shader_instance(&mut self, shader: &Name) -> Result<InstanceId, BackendError>;
    fn release_shader_instance(&mut self, id: InstanceId);

    fn upload_geometry(&mut self, desc: &GeometryDesc) -> Result<GeometryId, BackendError>;
    fn release_geometry(&mut self, id: GeometryId);
}

/// A texture held by [`HeadlessBackend`]
#[derive(Clone, Debug)]
pub struct HeadlessTexture {
    pub desc: TextureDesc,
    pub data: Vec<u8>,
    pub writes: u32,
}

#[derive(Default)]
struct HeadlessState {
    next_id: u64,
    textures: BTreeMap<u64, HeadlessTexture>,
    shaders: BTreeMap<u64, ShaderDesc>,
    instances: BTreeMap<u64, Name>,
    geometry: BTreeMap<u64, GeometryDesc>,
    texture_budget: Option<usize>,
    textures_acquired: usize,
    shader_reloads: usize,
}

impl HeadlessState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory render backend
///
/// Clones share state, so a test can keep one clone for inspection while the
/// registry owns another.
#[derive(Clone, Default)]
pub struct HeadlessBackend {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of live textures; acquisition beyond it fails
    pub fn set_texture_budget(&self, budget: Option<usize>) {
        self.state.lock().texture_budget = budget;
    }

    /// Snapshot of a live texture
    pub fn texture(&self, id: TextureId) -> Option<HeadlessTexture> {
        self.state.lock().textures.get(&id.0).cloned()
    }

    /// Snapshot of the live texture created under `name`
    pub fn texture_named(&self, name: &Name) -> Option<HeadlessTexture> {
        self.state
            .lock()
            .textures
            .values()
            .find(|t| &t.desc.name == name)
            .cloned()
    }

    /// Number of live textures
    pub fn texture_count(&self) -> usize {
        self.state.lock().textures.len()
    }

    /// Total texture acquisitions since creation
    pub fn textures_acquired(&self) -> usize {
        self.state.lock().textures_acquired
    }

    /// Number of live shaders
    pub fn shader_count(&self) -> usize {
        self.state.lock().shaders.len()
    }

    /// Snapshot of a live shader
    pub fn shader(&self, id: ShaderId) -> Option<ShaderDesc> {
        self.state.lock().shaders.get(&id.0).cloned()
    }

    /// Number of successful shader reloads
    pub fn shader_reloads(&self) -> usize {
        self.state.lock().shader_reloads
    }

    /// Number of live shader instances
    pub fn instance_count(&self) -> usize {
        self.state.lock().instances.len()
    }

    /// Number of live geometry uploads
    pub fn geometry_count(&self) -> usize {
        self.state.lock().geometry.len()
    }

    /// Snapshot of live geometry
    pub fn geometry(&self, id: GeometryId) -> Option<GeometryDesc> {
        self.state.lock().geometry.get(&id.0).cloned()
    }
}

impl RenderBackend for HeadlessBackend {
    fn acquire_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, BackendError> {
        let mut state = self.state.lock();
        if let Some(budget) = state.texture_budget {
            if state.textures.len() >= budget {
                return Err(BackendError::OutOfResources(format!(
                    "texture budget of {} reached creating '{}'",
                    budget, desc.name
                )));
            }
        }
        if desc.width == 0 || desc.height == 0 || desc.layers == 0 {
            return Err(BackendError::Rejected(format!(
                "texture '{}' has zero extent",
                desc.name
            )));
        }

        let id = state.allocate_id();
        state.textures.insert(
            id,
            HeadlessTexture {
                desc: desc.clone(),
                data: vec![0; desc.byte_size()],
                writes: 0,
            },
        );
        state.textures_acquired += 1;
        Ok(TextureId(id))
    }

    fn write_texture(&mut self, id: TextureId, offset: usize, bytes: &[u8]) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let texture = state
            .textures
            .get_mut(&id.0)
            .ok_or(BackendError::InvalidHandle(id.0))?;

        let size = texture.data.len();
        let end = offset.checked_add(bytes.len()).filter(|end| *end <= size);
        let Some(end) = end else {
            return Err(BackendError::WriteOutOfBounds {
                offset,
                len: bytes.len(),
                size,
            });
        };

        texture.data[offset..end].copy_from_slice(bytes);
        texture.writes += 1;
        Ok(())
    }

    fn release_texture(&mut self, id: TextureId) {
        if self.state.lock().textures.remove(&id.0).is_none() {
            log::warn!("Headless backend: release of unknown texture {}", id.0);
        }
    }

    fn acquire_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderId, BackendError> {
        if desc.stages.is_empty() {
            return Err(BackendError::Rejected(format!(
                "shader '{}' has no stages",
                desc.name
            )));
        }
        let mut state = self.state.lock();
        let id = state.allocate_id();
        state.shaders.insert(id, desc.clone());
        Ok(ShaderId(id))
    }

    fn reload_shader(&mut self, id: ShaderId, desc: &ShaderDesc) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let shader = state
            .shaders
            .get_mut(&id.0)
            .ok_or(BackendError::InvalidHandle(id.0))?;
        *shader = desc.clone();
        state.shader_reloads += 1;
        Ok(())
    }

    fn release_shader(&mut self, id: ShaderId) {
        self.state.lock().shaders.remove(&id.0);
    }

    fn acquire_shader_instance(&mut self, shader: &Name) -> Result<InstanceId, BackendError> {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        state.instances.insert(id, shader.clone());
        Ok(InstanceId(id))
    }

    fn release_shader_instance(&mut self, id: InstanceId) {
        self.state.lock().instances.remove(&id.0);
    }

    fn upload_geometry(&mut self, desc: &GeometryDesc) -> Result<GeometryId, BackendError> {
        let expected = desc.vertex_stride as usize * desc.vertex_count as usize;
        if desc.vertices.len() != expected {
            return Err(BackendError::Rejected(format!(
                "geometry '{}' has {} vertex bytes, expected {}",
                desc.name,
                desc.vertices.len(),
                expected
            )));
        }
        let mut state = self.state.lock();
        let id = state.allocate_id();
        state.geometry.insert(id, desc.clone());
        Ok(GeometryId(id))
    }

    fn release_geometry(&mut self, id: GeometryId) {
        self.state.lock().geometry.remove(&id.0);
    }
}
