//! Material resources
//!
//! A material is built from a JSON config. Colour, normal and emissive maps
//! are requested as texture resources and held for the material's lifetime.
//! Metallic, roughness and ambient-occlusion maps are loaded as images and
//! packed into one MRA texture owned by the material, unless the config
//! names a pre-packed `mra_map`.

use serde::{Deserialize, Serialize};
use void_resource::{
    AssetCompletion, AssetRequest, ImageAsset, InstanceId, JoinBarrier, JoinEntry, JoinProgress, LoadTask,
    LoadedAsset, Name, RequestInfo, Resource, ResourceHandler, ResourceKind, ResourceResult, ResourceState,
    ResourceSystem, TaskStatus, TextureDesc, TextureFlags, TextureId, TextureType,
};

use crate::common::{load_config, payload_mut};
use crate::mra;
use crate::texture::upload_texture;

fn default_shader() -> String {
    "shader_builtin_pbr".to_string()
}

fn default_base_color() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

fn default_one() -> f32 {
    1.0
}

/// Material definition as written in config files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialConfig {
    /// Shader the material instantiates
    #[serde(default = "default_shader")]
    pub shader: String,
    /// Package map assets are loaded from
    #[serde(default)]
    pub package: String,
    #[serde(default = "default_base_color")]
    pub base_color: [f32; 4],
    #[serde(default)]
    pub base_color_map: Option<String>,
    #[serde(default)]
    pub normal_map: Option<String>,
    #[serde(default)]
    pub emissive_map: Option<String>,
    #[serde(default)]
    pub emissive: [f32; 3],
    #[serde(default)]
    pub metallic: f32,
    #[serde(default = "default_roughness")]
    pub roughness: f32,
    #[serde(default = "default_one")]
    pub ao: f32,
    #[serde(default)]
    pub metallic_map: Option<String>,
    #[serde(default)]
    pub roughness_map: Option<String>,
    #[serde(default)]
    pub ao_map: Option<String>,
    /// Pre-packed MRA texture; overrides the channel maps
    #[serde(default)]
    pub mra_map: Option<String>,
    #[serde(default)]
    pub double_sided: bool,
    #[serde(default)]
    pub has_transparency: bool,
}

fn default_roughness() -> f32 {
    0.5
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            shader: default_shader(),
            package: String::new(),
            base_color: default_base_color(),
            base_color_map: None,
            normal_map: None,
            emissive_map: None,
            emissive: [0.0; 3],
            metallic: 0.0,
            roughness: default_roughness(),
            ao: 1.0,
            metallic_map: None,
            roughness_map: None,
            ao_map: None,
            mra_map: None,
            double_sided: false,
            has_transparency: false,
        }
    }
}

impl MaterialConfig {
    fn channel_maps(&self) -> [Option<Name>; 3] {
        [&self.metallic_map, &self.roughness_map, &self.ao_map].map(|m| m.as_deref().map(|s| Name::new(s)))
    }
}

/// Payload of a material resource
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub shader: Name,
    pub instance: Option<InstanceId>,
    pub base_color: [f32; 4],
    pub emissive: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
    pub double_sided: bool,
    pub has_transparency: bool,
    /// Texture resources this material holds a reference to
    pub base_color_texture: Option<Name>,
    pub normal_texture: Option<Name>,
    pub emissive_texture: Option<Name>,
    pub mra_texture: Option<Name>,
    /// MRA texture packed from channel maps, owned by the material
    pub packed_mra: Option<TextureId>,
    pub packed_mra_size: Option<(u32, u32)>,
}

impl Material {
    fn from_config(config: &MaterialConfig) -> Self {
        Self {
            shader: Name::new(&config.shader),
            instance: None,
            base_color: config.base_color,
            emissive: config.emissive,
            metallic: config.metallic,
            roughness: config.roughness,
            ao: config.ao,
            double_sided: config.double_sided,
            has_transparency: config.has_transparency,
            base_color_texture: None,
            normal_texture: None,
            emissive_texture: None,
            mra_texture: None,
            packed_mra: None,
            packed_mra_size: None,
        }
    }

    /// Texture resources referenced by name
    pub fn textures(&self) -> impl Iterator<Item = &Name> {
        [
            &self.base_color_texture,
            &self.normal_texture,
            &self.emissive_texture,
            &self.mra_texture,
        ]
        .into_iter()
        .flatten()
    }
}

/// Request a map as a texture resource; failures leave the slot empty
fn request_map(
    system: &mut ResourceSystem,
    material: &Name,
    map: Option<&str>,
    package: &str,
    synchronous: bool,
) -> Option<Name> {
    let map = map?;
    let mut info = RequestInfo::new(ResourceKind::Texture).with_asset(AssetRequest::image(map, package).watched());
    if synchronous {
        info = info.synchronous();
    }
    match system.request(map, info) {
        Ok(_) => Some(Name::new(map)),
        Err(e) => {
            log::warn!("Material {}: map {} unavailable: {}", material, map, e);
            None
        }
    }
}

/// Upload packed MRA pixels, acquiring the backend texture only once
fn upload_packed(system: &mut ResourceSystem, resource: &mut Resource, packed: ImageAsset) -> ResourceResult<()> {
    let desc = TextureDesc {
        name: Name::new(format!("{}_mra", resource.name())),
        texture_type: TextureType::Flat2d,
        width: packed.width,
        height: packed.height,
        channel_count: packed.channel_count,
        mip_levels: 1,
        layers: 1,
        flags: TextureFlags::default(),
    };
    let material = payload_mut::<Material>(resource, "material payload missing")?;
    match material.packed_mra {
        Some(id) => system.backend().write_texture(id, 0, &packed.pixels)?,
        None => material.packed_mra = Some(upload_texture(system, &desc, &packed.pixels)?),
    }
    material.packed_mra_size = Some((packed.width, packed.height));
    Ok(())
}

fn finish_mra(
    system: &mut ResourceSystem,
    resource: &mut Resource,
    entries: Vec<JoinEntry<ImageAsset>>,
) -> ResourceResult<()> {
    let packed = mra::pack(resource.name(), entries);
    upload_packed(system, resource, packed)?;
    resource.mark_loaded();
    Ok(())
}

/// Collects channel maps dispatched asynchronously
struct MraJoin {
    barrier: JoinBarrier<ImageAsset>,
}

impl LoadTask for MraJoin {
    fn on_complete(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        completion: AssetCompletion,
    ) -> ResourceResult<TaskStatus> {
        let map = completion.request.name.clone();
        let image = match completion.result.and_then(LoadedAsset::into_image) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("Material {}: channel map {} unavailable: {}", resource.name(), map, e);
                None
            }
        };

        match self.barrier.complete(&map, image) {
            JoinProgress::Pending => Ok(TaskStatus::Pending),
            JoinProgress::Ready(entries) => {
                finish_mra(system, resource, entries)?;
                Ok(TaskStatus::Done)
            }
            JoinProgress::Unmatched => {
                log::warn!("Material {}: unexpected channel map {}", resource.name(), map);
                Ok(TaskStatus::Pending)
            }
            JoinProgress::Spent => Ok(TaskStatus::Done),
        }
    }
}

fn build_material(
    system: &mut ResourceSystem,
    resource: &mut Resource,
    config: MaterialConfig,
    synchronous: bool,
) -> ResourceResult<()> {
    let name = resource.name().clone();
    let mut material = Material::from_config(&config);
    material.instance = Some(system.backend().acquire_shader_instance(&material.shader)?);

    let package = config.package.as_str();
    material.base_color_texture = request_map(system, &name, config.base_color_map.as_deref(), package, synchronous);
    material.normal_texture = request_map(system, &name, config.normal_map.as_deref(), package, synchronous);
    material.emissive_texture = request_map(system, &name, config.emissive_map.as_deref(), package, synchronous);
    material.mra_texture = request_map(system, &name, config.mra_map.as_deref(), package, synchronous);

    // Set early so a failed build is undone by release
    resource.set_payload(material);

    let maps = config.channel_maps();
    if config.mra_map.is_some() || maps.iter().all(Option::is_none) {
        resource.mark_loaded();
        return Ok(());
    }

    let mut barrier = mra::channel_barrier(&maps);
    let requests: Vec<AssetRequest> = maps
        .iter()
        .flatten()
        .map(|map| AssetRequest::image(map, package))
        .collect();

    if synchronous {
        let mut ready = None;
        for request in &requests {
            let image = match system.load_asset(request).and_then(|a| Ok(a.into_image()?)) {
                Ok(image) => Some(image),
                Err(e) => {
                    log::warn!("Material {}: channel map {} unavailable: {}", name, request.name, e);
                    None
                }
            };
            if let JoinProgress::Ready(entries) = barrier.complete(&request.name, image) {
                ready = Some(entries);
            }
        }
        let entries = match ready {
            Some(entries) => entries,
            None => match barrier.poll() {
                JoinProgress::Ready(entries) => entries,
                _ => Vec::new(),
            },
        };
        return finish_mra(system, resource, entries);
    }

    resource.set_state(ResourceState::Loading);
    let task = system.spawn_task(resource.handle(), Box::new(MraJoin { barrier }));
    for request in requests {
        system.dispatch(task, request)?;
    }
    Ok(())
}

/// Builds materials from JSON configs
#[derive(Default)]
pub struct MaterialHandler;

impl MaterialHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceHandler for MaterialHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Material
    }

    fn request(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        info: RequestInfo,
    ) -> ResourceResult<()> {
        let source = info.expect_config(resource.name())?;
        let synchronous = info.synchronous;
        load_config(system, resource, source, synchronous, move |system, resource, config| {
            build_material(system, resource, config, synchronous)
        })
    }

    fn release(&mut self, system: &mut ResourceSystem, resource: &mut Resource) {
        let Some(material) = resource.take_payload::<Material>() else {
            return;
        };
        for texture in material.textures() {
            system.release(texture);
        }
        if let Some(id) = material.packed_mra {
            system.backend().release_texture(id);
        }
        if let Some(id) = material.instance {
            system.backend().release_shader_instance(id);
        }
    }
}
