//! Per-kind resource handlers

use std::collections::BTreeMap;

use crate::asset::{LoadedAsset, WatchId};
use crate::error::{ResourceError, ResourceResult};
use crate::kind::ResourceKind;
use crate::request::RequestInfo;
use crate::resource::Resource;
use crate::system::ResourceSystem;

/// Type-specific build, release and reload behaviour
///
/// A handler that returns `Ok` from [`ResourceHandler::request`] must leave
/// the resource either `Loaded`, or `Loading` with at least one load task
/// spawned through [`ResourceSystem::spawn_task`].
pub trait ResourceHandler: Send {
    /// Kind this handler owns
    fn kind(&self) -> ResourceKind;

    /// Whether resources of this kind can be rebuilt from changed sources
    fn supports_hot_reload(&self) -> bool {
        false
    }

    /// Build `resource` from `info`
    fn request(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        info: RequestInfo,
    ) -> ResourceResult<()>;

    /// Free everything the handler attached to `resource`
    ///
    /// Called exactly once per successful request, and also after a failed
    /// `request` so partial work can be undone.
    fn release(&mut self, system: &mut ResourceSystem, resource: &mut Resource);

    /// Rebuild `resource` from a changed watched asset
    fn hot_reload(
        &mut self,
        _system: &mut ResourceSystem,
        resource: &mut Resource,
        _asset: LoadedAsset,
        _watch: WatchId,
    ) -> ResourceResult<()> {
        Err(ResourceError::HotReloadUnsupported(resource.kind()))
    }
}

struct HandlerEntry {
    /// `None` while the handler is running
    handler: Option<Box<dyn ResourceHandler>>,
    hot_reload: bool,
}

#[derive(Default)]
pub(crate) struct HandlerTable {
    entries: BTreeMap<ResourceKind, HandlerEntry>,
}

impl HandlerTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, handler: Box<dyn ResourceHandler>) -> ResourceResult<()> {
        let kind = handler.kind();
        if self.entries.contains_key(&kind) {
            return Err(ResourceError::HandlerAlreadyRegistered(kind));
        }
        let hot_reload = handler.supports_hot_reload();
        self.entries.insert(
            kind,
            HandlerEntry {
                handler: Some(handler),
                hot_reload,
            },
        );
        Ok(())
    }

    pub(crate) fn contains(&self, kind: ResourceKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub(crate) fn supports_hot_reload(&self, kind: ResourceKind) -> bool {
        self.entries.get(&kind).map(|e| e.hot_reload).unwrap_or(false)
    }

    /// Take the handler out so it can borrow the registry mutably
    pub(crate) fn checkout(&mut self, kind: ResourceKind) -> Option<Box<dyn ResourceHandler>> {
        self.entries.get_mut(&kind)?.handler.take()
    }

    pub(crate) fn restore(&mut self, handler: Box<dyn ResourceHandler>) {
        if let Some(entry) = self.entries.get_mut(&handler.kind()) {
            entry.handler = Some(handler);
        }
    }

    pub(crate) fn kinds(&self) -> Vec<ResourceKind> {
        self.entries.keys().copied().collect()
    }
}
