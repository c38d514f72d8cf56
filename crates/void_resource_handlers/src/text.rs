//! Text and binary resources

use void_resource::{
    AssetKind, LoadedAsset, Resource, ResourceHandler, ResourceKind, ResourceResult, ResourceSystem, RequestInfo,
    WatchId,
};

use crate::common::load_then;

/// Payload of a text resource
#[derive(Clone, Debug, PartialEq)]
pub struct TextResource {
    pub text: String,
}

/// Loads one text asset; hot reloadable
#[derive(Default)]
pub struct TextHandler;

impl TextHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceHandler for TextHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Text
    }

    fn supports_hot_reload(&self) -> bool {
        true
    }

    fn request(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        info: RequestInfo,
    ) -> ResourceResult<()> {
        info.expect_assets(resource.name(), 1)?;
        let mut asset = info.assets[0].clone();
        asset.kind = AssetKind::Text;
        system.watch(resource.handle(), &asset);

        load_then(system, resource, asset, info.synchronous, |_, resource, loaded| {
            resource.set_payload(TextResource {
                text: loaded.into_text()?,
            });
            resource.mark_loaded();
            Ok(())
        })
    }

    fn release(&mut self, _system: &mut ResourceSystem, resource: &mut Resource) {
        resource.take_payload::<TextResource>();
    }

    fn hot_reload(
        &mut self,
        _system: &mut ResourceSystem,
        resource: &mut Resource,
        asset: LoadedAsset,
        _watch: WatchId,
    ) -> ResourceResult<()> {
        let text = asset.into_text()?;
        resource.set_payload(TextResource { text });
        resource.mark_loaded();
        Ok(())
    }
}

/// Payload of a binary resource
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryResource {
    pub bytes: Vec<u8>,
}

/// Loads one binary asset
#[derive(Default)]
pub struct BinaryHandler;

impl BinaryHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceHandler for BinaryHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Binary
    }

    fn request(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        info: RequestInfo,
    ) -> ResourceResult<()> {
        info.expect_assets(resource.name(), 1)?;
        let mut asset = info.assets[0].clone();
        asset.kind = AssetKind::Binary;

        load_then(system, resource, asset, info.synchronous, |_, resource, loaded| {
            resource.set_payload(BinaryResource {
                bytes: loaded.into_bytes()?,
            });
            resource.mark_loaded();
            Ok(())
        })
    }

    fn release(&mut self, _system: &mut ResourceSystem, resource: &mut Resource) {
        resource.take_payload::<BinaryResource>();
    }
}
