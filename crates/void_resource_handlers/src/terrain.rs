//! Heightmap terrain resources
//!
//! The config names a heightmap image. Heights come from the image's first
//! channel, scaled by `height_scale`; the grid is spaced by `tile_scale`
//! and uploaded as one geometry.

use serde::{Deserialize, Serialize};
use void_resource::{
    AssetRequest, GeometryId, ImageAsset, Name, RequestInfo, Resource, ResourceError, ResourceHandler,
    ResourceKind, ResourceResult, ResourceState, ResourceSystem,
};

use crate::common::{load_config, load_then};
use crate::mesh::{geometry_desc, Vertex3d};

fn default_scale() -> f32 {
    1.0
}

/// Terrain definition as written in config files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    pub heightmap: String,
    #[serde(default)]
    pub package: String,
    /// World distance between grid points
    #[serde(default = "default_scale")]
    pub tile_scale: f32,
    /// World height of a full-intensity sample
    #[serde(default = "default_scale")]
    pub height_scale: f32,
}

/// Payload of a heightmap terrain resource
#[derive(Clone, Debug, PartialEq)]
pub struct HeightmapTerrain {
    pub width: u32,
    pub depth: u32,
    pub tile_scale: f32,
    pub height_scale: f32,
    /// Row-major world heights
    pub heights: Vec<f32>,
    pub geometry: Option<GeometryId>,
}

impl HeightmapTerrain {
    /// Height at a grid point
    pub fn height_at(&self, x: u32, z: u32) -> Option<f32> {
        if x >= self.width || z >= self.depth {
            return None;
        }
        self.heights.get((z * self.width + x) as usize).copied()
    }
}

fn heights_from(name: &Name, image: &ImageAsset, height_scale: f32) -> ResourceResult<Vec<f32>> {
    if image.width < 2 || image.height < 2 || !image.is_consistent() {
        return Err(ResourceError::invalid_config(
            name,
            format!("heightmap must be at least 2x2, got {}x{}", image.width, image.height),
        ));
    }
    Ok((0..image.pixel_count())
        .map(|p| image.sample(p, 0).unwrap_or(0) as f32 / 255.0 * height_scale)
        .collect())
}

/// Grid vertices with central-difference normals, plus triangle indices
pub fn build_grid(width: u32, depth: u32, heights: &[f32], tile_scale: f32) -> (Vec<Vertex3d>, Vec<u32>) {
    let h = |x: i64, z: i64| {
        let x = x.clamp(0, width as i64 - 1) as u32;
        let z = z.clamp(0, depth as i64 - 1) as u32;
        heights[(z * width + x) as usize]
    };

    let mut vertices = Vec::with_capacity((width * depth) as usize);
    for z in 0..depth {
        for x in 0..width {
            let (xi, zi) = (x as i64, z as i64);
            let dx = h(xi + 1, zi) - h(xi - 1, zi);
            let dz = h(xi, zi + 1) - h(xi, zi - 1);
            let normal = [-dx, 2.0 * tile_scale, -dz];
            let len = (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2]).sqrt();
            vertices.push(Vertex3d::new(
                [x as f32 * tile_scale, h(xi, zi), z as f32 * tile_scale],
                [normal[0] / len, normal[1] / len, normal[2] / len],
                [x as f32 / (width - 1) as f32, z as f32 / (depth - 1) as f32],
            ));
        }
    }

    let mut indices = Vec::with_capacity(((width - 1) * (depth - 1) * 6) as usize);
    for z in 0..depth - 1 {
        for x in 0..width - 1 {
            let i = z * width + x;
            indices.extend_from_slice(&[i, i + width, i + 1, i + 1, i + width, i + width + 1]);
        }
    }
    (vertices, indices)
}

fn build_terrain(
    system: &mut ResourceSystem,
    resource: &mut Resource,
    config: &TerrainConfig,
    image: ImageAsset,
) -> ResourceResult<()> {
    let name = resource.name().clone();
    let heights = heights_from(&name, &image, config.height_scale)?;
    let (vertices, indices) = build_grid(image.width, image.height, &heights, config.tile_scale);

    resource.set_state(ResourceState::Initialized);
    let geometry = system
        .backend()
        .upload_geometry(&geometry_desc(name.clone(), &vertices, indices))?;

    log::debug!("Terrain {}: {}x{} grid uploaded", name, image.width, image.height);
    resource.set_payload(HeightmapTerrain {
        width: image.width,
        depth: image.height,
        tile_scale: config.tile_scale,
        height_scale: config.height_scale,
        heights,
        geometry: Some(geometry),
    });
    resource.mark_loaded();
    Ok(())
}

/// Builds terrain from a JSON config and a heightmap image
#[derive(Default)]
pub struct HeightmapTerrainHandler;

impl HeightmapTerrainHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceHandler for HeightmapTerrainHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::HeightmapTerrain
    }

    fn request(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        info: RequestInfo,
    ) -> ResourceResult<()> {
        let source = info.expect_config(resource.name())?;
        let synchronous = info.synchronous;
        load_config(system, resource, source, synchronous, move |system, resource, config: TerrainConfig| {
            if config.tile_scale <= 0.0 {
                return Err(ResourceError::invalid_config(resource.name(), "tile_scale must be positive"));
            }
            let request = AssetRequest::image(&config.heightmap, config.package.as_str());
            load_then(system, resource, request, synchronous, move |system, resource, asset| {
                build_terrain(system, resource, &config, asset.into_image()?)
            })
        })
    }

    fn release(&mut self, system: &mut ResourceSystem, resource: &mut Resource) {
        if let Some(HeightmapTerrain { geometry: Some(id), .. }) = resource.take_payload::<HeightmapTerrain>() {
            system.backend().release_geometry(id);
        }
    }
}
