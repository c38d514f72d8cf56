//! Static mesh resources
//!
//! A mesh config is a JSON list of geometries. Each geometry is validated,
//! packed into [`Vertex3d`] and uploaded to the backend.

use serde::{Deserialize, Serialize};
use void_resource::{
    GeometryDesc, GeometryId, Name, RequestInfo, Resource, ResourceError, ResourceHandler, ResourceKind,
    ResourceResult, ResourceState, ResourceSystem,
};

use crate::common::load_config;

/// Vertex layout uploaded for meshes and terrain
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3d {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex3d {
    /// Byte stride of one vertex
    pub const STRIDE: u32 = std::mem::size_of::<Vertex3d>() as u32;

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }
}

/// Axis-aligned bounds
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    /// Bounds of a vertex set; `None` when empty
    pub fn of(vertices: &[Vertex3d]) -> Option<Self> {
        let first = vertices.first()?;
        let mut bounds = Self {
            min: first.position,
            max: first.position,
        };
        for v in &vertices[1..] {
            for axis in 0..3 {
                bounds.min[axis] = bounds.min[axis].min(v.position[axis]);
                bounds.max[axis] = bounds.max[axis].max(v.position[axis]);
            }
        }
        Some(bounds)
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }
}

fn default_normal() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}

/// One vertex as written in config files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexConfig {
    pub position: [f32; 3],
    #[serde(default = "default_normal")]
    pub normal: [f32; 3],
    #[serde(default)]
    pub uv: [f32; 2],
}

/// One geometry as written in config files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometryConfig {
    pub name: String,
    pub vertices: Vec<VertexConfig>,
    #[serde(default)]
    pub indices: Vec<u32>,
}

/// Mesh definition as written in config files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    pub geometries: Vec<GeometryConfig>,
}

/// A geometry uploaded for a mesh
#[derive(Clone, Debug, PartialEq)]
pub struct MeshGeometry {
    pub name: Name,
    pub vertex_count: u32,
    pub index_count: u32,
    pub backend: GeometryId,
    pub bounds: Bounds,
}

/// Payload of a static mesh resource
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaticMesh {
    pub geometries: Vec<MeshGeometry>,
}

/// Build the backend description of one geometry
pub fn geometry_desc(name: Name, vertices: &[Vertex3d], indices: Vec<u32>) -> GeometryDesc {
    GeometryDesc {
        name,
        vertex_stride: Vertex3d::STRIDE,
        vertex_count: vertices.len() as u32,
        vertices: bytemuck::cast_slice(vertices).to_vec(),
        indices,
    }
}

fn validate(mesh: &Name, geometry: &GeometryConfig) -> ResourceResult<()> {
    if geometry.vertices.is_empty() {
        return Err(ResourceError::invalid_config(
            mesh,
            format!("geometry {} has no vertices", geometry.name),
        ));
    }
    let count = geometry.vertices.len() as u32;
    if let Some(bad) = geometry.indices.iter().find(|&&i| i >= count) {
        return Err(ResourceError::invalid_config(
            mesh,
            format!("geometry {} index {} out of range ({} vertices)", geometry.name, bad, count),
        ));
    }
    Ok(())
}

fn release_geometries(system: &mut ResourceSystem, geometries: &[MeshGeometry]) {
    for geometry in geometries {
        system.backend().release_geometry(geometry.backend);
    }
}

fn build_mesh(system: &mut ResourceSystem, resource: &mut Resource, config: MeshConfig) -> ResourceResult<()> {
    let name = resource.name().clone();
    if config.geometries.is_empty() {
        return Err(ResourceError::invalid_config(&name, "mesh has no geometries"));
    }
    for geometry in &config.geometries {
        validate(&name, geometry)?;
    }

    resource.set_state(ResourceState::Initialized);
    let mut mesh = StaticMesh::default();
    for geometry in config.geometries {
        let vertices: Vec<Vertex3d> = geometry
            .vertices
            .iter()
            .map(|v| Vertex3d::new(v.position, v.normal, v.uv))
            .collect();
        let Some(bounds) = Bounds::of(&vertices) else {
            continue;
        };
        let geometry_name = Name::new(&geometry.name);
        let index_count = geometry.indices.len() as u32;
        let desc = geometry_desc(geometry_name.clone(), &vertices, geometry.indices);

        match system.backend().upload_geometry(&desc) {
            Ok(id) => mesh.geometries.push(MeshGeometry {
                name: geometry_name,
                vertex_count: desc.vertex_count,
                index_count,
                backend: id,
                bounds,
            }),
            Err(e) => {
                release_geometries(system, &mesh.geometries);
                return Err(e.into());
            }
        }
    }

    log::debug!("Mesh {}: {} geometries uploaded", name, mesh.geometries.len());
    resource.set_payload(mesh);
    resource.mark_loaded();
    Ok(())
}

/// Builds static meshes from JSON configs
#[derive(Default)]
pub struct StaticMeshHandler;

impl StaticMeshHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceHandler for StaticMeshHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::StaticMesh
    }

    fn request(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        info: RequestInfo,
    ) -> ResourceResult<()> {
        let source = info.expect_config(resource.name())?;
        load_config(system, resource, source, info.synchronous, build_mesh)
    }

    fn release(&mut self, system: &mut ResourceSystem, resource: &mut Resource) {
        if let Some(mesh) = resource.take_payload::<StaticMesh>() {
            release_geometries(system, &mesh.geometries);
        }
    }
}
