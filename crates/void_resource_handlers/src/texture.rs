//! Texture resources
//!
//! Flat textures come from one image asset or from pixels supplied with the
//! request. Cube maps take exactly six faces and layered arrays one or more
//! layers; every face or layer must share one size. Asynchronous layers are
//! collected with a join barrier and uploaded together.

use void_resource::{
    AssetCompletion, AssetKind, AssetRequest, ImageAsset, JoinBarrier, JoinProgress, LoadTask, LoadedAsset, Name,
    RequestInfo, Resource, ResourceError, ResourceHandler, ResourceKind, ResourceResult, ResourceState,
    ResourceSystem, TaskStatus, TextureDesc, TextureFlags, TextureId, TextureType, WatchId,
};

use crate::common::payload_mut;

/// Faces in a cube map
pub const CUBE_FACES: usize = 6;

/// Payload of a texture resource
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub texture_type: TextureType,
    pub width: u32,
    pub height: u32,
    pub channel_count: u8,
    pub mip_levels: u32,
    pub layers: u32,
    pub flags: TextureFlags,
    pub backend: Option<TextureId>,
}

/// Acquire a backend texture and write `data` into it
///
/// The texture is returned to the backend if the write fails.
pub fn upload_texture(system: &mut ResourceSystem, desc: &TextureDesc, data: &[u8]) -> ResourceResult<TextureId> {
    let backend = system.backend();
    let id = backend.acquire_texture(desc)?;
    if let Err(e) = backend.write_texture(id, 0, data) {
        backend.release_texture(id);
        return Err(e.into());
    }
    Ok(id)
}

/// Check that every layer matches the first and concatenate their pixels
fn assemble_layers(name: &Name, layers: &[ImageAsset]) -> ResourceResult<(u32, u32, u8, u32, Vec<u8>)> {
    let first = layers
        .first()
        .ok_or_else(|| ResourceError::invalid_config(name, "texture has no layers"))?;

    let mut data = Vec::with_capacity(first.pixels.len() * layers.len());
    for (i, layer) in layers.iter().enumerate() {
        if !layer.is_consistent() {
            return Err(ResourceError::invalid_config(
                name,
                format!("layer {} pixel buffer does not match {}x{}", i, layer.width, layer.height),
            ));
        }
        if (layer.width, layer.height, layer.channel_count) != (first.width, first.height, first.channel_count) {
            return Err(ResourceError::invalid_config(
                name,
                format!(
                    "layer {} is {}x{}x{}, expected {}x{}x{}",
                    i, layer.width, layer.height, layer.channel_count, first.width, first.height, first.channel_count
                ),
            ));
        }
        data.extend_from_slice(&layer.pixels);
    }
    let mip_levels = layers.iter().map(|l| l.mip_levels).min().unwrap_or(1).max(1);
    Ok((first.width, first.height, first.channel_count, mip_levels, data))
}

fn finish_texture(
    system: &mut ResourceSystem,
    resource: &mut Resource,
    texture_type: TextureType,
    flags: TextureFlags,
    layers: &[ImageAsset],
) -> ResourceResult<()> {
    let (width, height, channel_count, mip_levels, data) = assemble_layers(resource.name(), layers)?;
    let desc = TextureDesc {
        name: resource.name().clone(),
        texture_type,
        width,
        height,
        channel_count,
        mip_levels,
        layers: layers.len() as u32,
        flags,
    };
    resource.set_state(ResourceState::Initialized);

    let id = upload_texture(system, &desc, &data)?;
    resource.set_payload(Texture {
        texture_type,
        width,
        height,
        channel_count,
        mip_levels,
        layers: desc.layers,
        flags,
        backend: Some(id),
    });
    resource.mark_loaded();
    Ok(())
}

/// Collects asynchronously loaded layers
struct LayerJoin {
    barrier: JoinBarrier<ImageAsset>,
    texture_type: TextureType,
    flags: TextureFlags,
    first_error: Option<ResourceError>,
}

impl LoadTask for LayerJoin {
    fn on_complete(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        completion: AssetCompletion,
    ) -> ResourceResult<TaskStatus> {
        let layer = completion.request.name.clone();
        let image = match completion.result.and_then(LoadedAsset::into_image) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("Texture {} layer {} failed: {}", resource.name(), layer, e);
                self.first_error.get_or_insert(e.into());
                None
            }
        };

        match self.barrier.complete(&layer, image) {
            JoinProgress::Pending => Ok(TaskStatus::Pending),
            JoinProgress::Ready(mut entries) => {
                if let Some(err) = self.first_error.take() {
                    return Err(err);
                }
                let layers: Vec<ImageAsset> = entries.iter_mut().filter_map(|e| e.take_payload()).collect();
                finish_texture(system, resource, self.texture_type, self.flags, &layers)?;
                Ok(TaskStatus::Done)
            }
            JoinProgress::Unmatched => {
                log::warn!("Texture {} got an unexpected layer {}", resource.name(), layer);
                Ok(TaskStatus::Pending)
            }
            JoinProgress::Spent => Ok(TaskStatus::Done),
        }
    }
}

/// Handles 2D, cube and layered textures
#[derive(Default)]
pub struct TextureHandler;

impl TextureHandler {
    pub fn new() -> Self {
        Self
    }

    fn check_layer_count(name: &Name, info: &RequestInfo) -> ResourceResult<()> {
        match info.texture.texture_type {
            TextureType::Flat2d => info.expect_assets(name, 1),
            TextureType::Cube => info.expect_assets(name, CUBE_FACES),
            TextureType::Array2d if info.assets.is_empty() => Err(ResourceError::AssetCountMismatch {
                name: name.clone(),
                kind: ResourceKind::Texture,
                expected: "at least one",
                found: 0,
            }),
            TextureType::Array2d => Ok(()),
        }
    }

    fn request_inline(
        system: &mut ResourceSystem,
        resource: &mut Resource,
        info: RequestInfo,
        pixels: ImageAsset,
    ) -> ResourceResult<()> {
        info.expect_assets(resource.name(), 0)?;
        if info.texture.texture_type != TextureType::Flat2d {
            return Err(ResourceError::invalid_config(
                resource.name(),
                "inline pixels are only supported for flat textures",
            ));
        }
        finish_texture(system, resource, TextureType::Flat2d, info.texture.flags, &[pixels])
    }
}

impl ResourceHandler for TextureHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Texture
    }

    fn supports_hot_reload(&self) -> bool {
        true
    }

    fn request(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        mut info: RequestInfo,
    ) -> ResourceResult<()> {
        if let Some(pixels) = info.texture.pixels.take() {
            return Self::request_inline(system, resource, info, pixels);
        }
        Self::check_layer_count(resource.name(), &info)?;

        let texture_type = info.texture.texture_type;
        let flags = info.texture.flags;
        let assets: Vec<AssetRequest> = info
            .assets
            .into_iter()
            .map(|mut a| {
                a.kind = AssetKind::Image;
                a
            })
            .collect();

        if texture_type == TextureType::Flat2d {
            system.watch(resource.handle(), &assets[0]);
        }

        if info.synchronous {
            let layers = assets
                .iter()
                .map(|a| system.load_asset(a).and_then(|asset| Ok(asset.into_image()?)))
                .collect::<ResourceResult<Vec<_>>>()?;
            return finish_texture(system, resource, texture_type, flags, &layers);
        }

        let mut barrier = JoinBarrier::new();
        for asset in &assets {
            barrier.push_requested(asset.name.clone());
        }
        resource.set_state(ResourceState::Loading);
        let task = system.spawn_task(
            resource.handle(),
            Box::new(LayerJoin {
                barrier,
                texture_type,
                flags,
                first_error: None,
            }),
        );
        for asset in assets {
            system.dispatch(task, asset)?;
        }
        Ok(())
    }

    fn release(&mut self, system: &mut ResourceSystem, resource: &mut Resource) {
        if let Some(texture) = resource.take_payload::<Texture>() {
            if let Some(id) = texture.backend {
                system.backend().release_texture(id);
            }
        }
    }

    fn hot_reload(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        asset: LoadedAsset,
        _watch: WatchId,
    ) -> ResourceResult<()> {
        let image = asset.into_image()?;
        let name = resource.name().clone();
        let texture = payload_mut::<Texture>(resource, "texture payload missing")?;
        if texture.texture_type != TextureType::Flat2d {
            return Err(ResourceError::HotReloadUnsupported(ResourceKind::Texture));
        }
        let (width, height, channel_count, mip_levels, data) = assemble_layers(&name, std::slice::from_ref(&image))?;

        let same_shape = (width, height, channel_count) == (texture.width, texture.height, texture.channel_count);
        match texture.backend {
            Some(id) if texture.flags.writable && same_shape => {
                system.backend().write_texture(id, 0, &data)?;
            }
            previous => {
                let desc = TextureDesc {
                    name: name.clone(),
                    texture_type: TextureType::Flat2d,
                    width,
                    height,
                    channel_count,
                    mip_levels,
                    layers: 1,
                    flags: texture.flags,
                };
                let id = upload_texture(system, &desc, &data)?;
                if let Some(old) = previous {
                    system.backend().release_texture(old);
                }
                texture.backend = Some(id);
            }
        }
        texture.width = width;
        texture.height = height;
        texture.channel_count = channel_count;
        texture.mip_levels = mip_levels;
        resource.mark_loaded();
        Ok(())
    }
}
