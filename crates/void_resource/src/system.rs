//! The resource registry
//!
//! `ResourceSystem` owns every resource slot, the handler for each kind, the
//! in-flight load tasks and the hot-reload watch index. It is driven from a
//! single thread: asset sources may work elsewhere, but their completions
//! are only applied inside [`ResourceSystem::update`] or
//! [`ResourceSystem::wait_idle`].
//!
//! Handlers and resources are checked out of their tables while a handler
//! runs. That lets handler code take `&mut ResourceSystem` and issue nested
//! requests (materials request their textures, fonts their pages).

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::asset::{AssetCompletion, AssetError, AssetReply, AssetRequest, AssetSource, LoadedAsset, Ticket, WatchId};
use crate::backend::RenderBackend;
use crate::config::ResourceSystemConfig;
use crate::error::{ResourceError, ResourceResult};
use crate::event::ResourceEvent;
use crate::handle::ResourceHandle;
use crate::handler::{HandlerTable, ResourceHandler};
use crate::kind::ResourceKind;
use crate::name::Name;
use crate::name_index::NameIndex;
use crate::request::RequestInfo;
use crate::resource::{Resource, ResourceState};
use crate::slot_table::SlotTable;
use crate::task::{LoadTask, TaskId, TaskStatus, TaskTable};
use crate::watch::WatchIndex;

/// Typed, reference-counted resource cache
pub struct ResourceSystem {
    config: ResourceSystemConfig,
    names: NameIndex,
    slots: SlotTable,
    handlers: HandlerTable,
    watches: WatchIndex,
    tasks: TaskTable,
    source: Arc<dyn AssetSource>,
    backend: Box<dyn RenderBackend>,
    completion_tx: Sender<AssetCompletion>,
    completion_rx: Receiver<AssetCompletion>,
    /// Completions whose owner was checked out when they arrived
    deferred: Vec<AssetCompletion>,
    events: Vec<ResourceEvent>,
    releasing_all: bool,
    shut_down: bool,
}

impl ResourceSystem {
    /// Create a registry with no handlers
    pub fn new(
        config: ResourceSystemConfig,
        source: Arc<dyn AssetSource>,
        backend: Box<dyn RenderBackend>,
    ) -> ResourceResult<Self> {
        config.validate()?;
        let (completion_tx, completion_rx) = crossbeam_channel::unbounded();

        log::info!(
            "Resource system initialized ({} slots, hot-reload {})",
            config.max_resource_count,
            if config.hot_reload { "enabled" } else { "disabled" }
        );

        Ok(Self {
            names: NameIndex::new(),
            slots: SlotTable::new(config.max_resource_count),
            handlers: HandlerTable::new(),
            watches: WatchIndex::new(),
            tasks: TaskTable::new(),
            source,
            backend,
            completion_tx,
            completion_rx,
            deferred: Vec::new(),
            events: Vec::new(),
            releasing_all: false,
            shut_down: false,
            config,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &ResourceSystemConfig {
        &self.config
    }

    /// Register the handler for one kind
    pub fn register_handler(&mut self, handler: Box<dyn ResourceHandler>) -> ResourceResult<()> {
        let kind = handler.kind();
        if let Err(err) = self.handlers.register(handler) {
            log::error!("{}", err);
            return Err(err);
        }
        log::debug!("Registered {} handler", kind);
        Ok(())
    }

    /// Check if a handler is registered for `kind`
    pub fn has_handler(&self, kind: ResourceKind) -> bool {
        self.handlers.contains(kind)
    }

    /// Kinds with a registered handler
    pub fn handler_kinds(&self) -> Vec<ResourceKind> {
        self.handlers.kinds()
    }

    // ---- Request / release ----

    /// Acquire a reference to the resource `name`, building it on first use
    ///
    /// The handle is returned as soon as the handler has accepted the
    /// request; asynchronous builds finish during later `update` calls.
    pub fn request(&mut self, name: impl Into<Name>, info: RequestInfo) -> ResourceResult<ResourceHandle> {
        let name = name.into();
        match self.names.find(&name) {
            Some(handle) => self.request_existing(name, handle, info),
            None => self.request_new(name, info),
        }
    }

    fn request_existing(
        &mut self,
        name: Name,
        handle: ResourceHandle,
        info: RequestInfo,
    ) -> ResourceResult<ResourceHandle> {
        let entry = self
            .slots
            .entry_mut(handle)
            .ok_or_else(|| ResourceError::HandlerContract(name.clone(), "name maps to a reclaimed slot"))?;

        if entry.kind != info.kind {
            return Err(ResourceError::KindMismatch {
                name,
                requested: info.kind,
                registered: entry.kind,
            });
        }
        if entry.resource.is_none() {
            return Err(ResourceError::Busy(name));
        }
        if entry.failed {
            return self.retry_failed(name, handle, info);
        }

        entry.reference_count += 1;
        log::debug!("Resource {} hit (refs {})", name, entry.reference_count);

        if let (Some(callback), Some(resource)) = (info.callback, entry.resource.as_ref()) {
            callback(handle, resource);
        }
        Ok(handle)
    }

    /// Run the handler again for a resource whose last load failed
    ///
    /// The slot, its handle and its references are kept. Whatever the failed
    /// build left behind is released first.
    fn retry_failed(
        &mut self,
        name: Name,
        handle: ResourceHandle,
        info: RequestInfo,
    ) -> ResourceResult<ResourceHandle> {
        let kind = info.kind;
        let Some(mut handler) = self.handlers.checkout(kind) else {
            return Err(ResourceError::Busy(name));
        };
        let Some(mut resource) = self.slots.checkout(handle) else {
            self.handlers.restore(handler);
            return Err(ResourceError::Busy(name));
        };
        handler.release(self, &mut resource);
        self.handlers.restore(handler);
        resource.reset();
        self.slots.restore(handle, resource);
        self.watches.remove_owner(handle);

        let previous_refs = match self.slots.entry_mut(handle) {
            Some(entry) => {
                entry.failed = false;
                entry.reference_count
            }
            None => return Err(ResourceError::HandlerContract(name, "failed slot vanished during retry")),
        };
        log::info!("Retrying failed resource {} (refs {})", name, previous_refs);

        match self.build(&name, handle, info) {
            Ok(()) => {
                if let Some(entry) = self.slots.entry_mut(handle) {
                    entry.reference_count = previous_refs + 1;
                }
                self.settle(handle);
                Ok(handle)
            }
            Err(err) => {
                log::warn!("Retry of {} failed: {}", name, err);
                if previous_refs == 0 {
                    self.reclaim(handle);
                } else if let Some(entry) = self.slots.entry_mut(handle) {
                    entry.failed = true;
                }
                Err(err)
            }
        }
    }

    fn request_new(&mut self, name: Name, info: RequestInfo) -> ResourceResult<ResourceHandle> {
        let kind = info.kind;
        if !self.handlers.contains(kind) {
            let err = ResourceError::NoHandlerForType(kind);
            log::error!("Cannot request {}: {}", name, err);
            return Err(err);
        }

        let auto_release = !(self.config.hot_reload && self.handlers.supports_hot_reload(kind));
        let handle = match self.slots.allocate(name.clone(), kind, auto_release) {
            Ok(handle) => handle,
            Err(err) => {
                log::error!("Cannot request {}: {}", name, err);
                return Err(err);
            }
        };
        self.names.insert(name.clone(), handle);

        match self.build(&name, handle, info) {
            Ok(()) => {
                if let Some(entry) = self.slots.entry_mut(handle) {
                    entry.reference_count = 1;
                }
                self.settle(handle);
                Ok(handle)
            }
            Err(err) => {
                self.reclaim(handle);
                if err.is_fatal() {
                    log::error!("Request for {} failed: {}", name, err);
                } else {
                    log::warn!("Request for {} failed: {}", name, err);
                }
                Err(err)
            }
        }
    }

    /// Hand the resource in `handle` to its handler's `request`
    ///
    /// On failure the handler releases whatever it built and the resource is
    /// put back for the caller to reclaim or keep.
    fn build(&mut self, name: &Name, handle: ResourceHandle, mut info: RequestInfo) -> ResourceResult<()> {
        let Some(mut handler) = self.handlers.checkout(info.kind) else {
            return Err(ResourceError::Busy(name.clone()));
        };
        let Some(mut resource) = self.slots.checkout(handle) else {
            self.handlers.restore(handler);
            return Err(ResourceError::Busy(name.clone()));
        };

        resource.set_tags(std::mem::take(&mut info.tags));
        let callback = info.callback.take();

        let result = handler
            .request(self, &mut resource, info)
            .and_then(|()| self.check_contract(handle, &resource));
        if result.is_err() {
            handler.release(self, &mut resource);
        }
        self.handlers.restore(handler);
        self.slots.restore(handle, resource);

        if result.is_ok() {
            if let Some(entry) = self.slots.entry_mut(handle) {
                entry.waiters.extend(callback);
            }
        }
        result
    }

    fn check_contract(&self, handle: ResourceHandle, resource: &Resource) -> ResourceResult<()> {
        match resource.state() {
            ResourceState::Loaded => Ok(()),
            ResourceState::Uninitialized => Err(ResourceError::HandlerContract(
                resource.name().clone(),
                "request succeeded but left the resource uninitialized",
            )),
            _ if self.tasks.owns(handle) => Ok(()),
            _ => Err(ResourceError::HandlerContract(
                resource.name().clone(),
                "request succeeded without loading or spawning a load task",
            )),
        }
    }

    /// Drop one reference to `name`
    ///
    /// Returns `false` (with a warning) if the name is unknown or has no
    /// outstanding references.
    pub fn release(&mut self, name: impl Into<Name>) -> bool {
        let name = name.into();
        let Some(handle) = self.names.find(&name) else {
            if self.releasing_all {
                log::debug!("Release of {} during forced release; already gone", name);
            } else {
                log::warn!("Release of unknown resource {}", name);
            }
            return false;
        };
        let Some(entry) = self.slots.entry_mut(handle) else {
            return false;
        };
        if entry.reference_count == 0 {
            log::warn!("Release of {} with no outstanding references", name);
            return false;
        }

        entry.reference_count -= 1;
        if entry.reference_count == 0 && (entry.auto_release || entry.failed) {
            if entry.resource.is_none() {
                // Destroyed once its handler hands it back
                entry.release_pending = true;
            } else {
                self.destroy(handle);
            }
        }
        true
    }

    /// Destroy every resource regardless of references or auto-release
    pub fn force_release_all(&mut self) {
        let was_releasing = std::mem::replace(&mut self.releasing_all, true);
        for handle in self.slots.handles() {
            if self.slots.contains(handle) {
                self.destroy(handle);
            }
        }
        self.releasing_all = was_releasing;
    }

    /// Destroy everything and drop all watches and tasks
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        let count = self.slots.len();
        self.force_release_all();
        self.watches.clear();
        self.tasks.clear();
        self.names.clear();
        for completion in std::mem::take(&mut self.deferred) {
            self.discard(completion);
        }
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.discard(completion);
        }
        self.shut_down = true;
        log::info!("Resource system shut down ({} resources released)", count);
    }

    fn destroy(&mut self, handle: ResourceHandle) {
        self.tasks.cancel_owner(handle);
        let Some(entry) = self.slots.entry_mut(handle) else {
            return;
        };
        entry.waiters.clear();
        let kind = entry.kind;
        let name = entry.name.clone();
        let Some(mut resource) = entry.resource.take() else {
            entry.release_pending = true;
            return;
        };

        match self.handlers.checkout(kind) {
            Some(mut handler) => {
                handler.release(self, &mut resource);
                self.handlers.restore(handler);
            }
            None => log::warn!("{} handler is busy; releasing {} without it", kind, name),
        }
        drop(resource);

        self.reclaim(handle);
        log::debug!("Released resource {}", name);
        self.events.push(ResourceEvent::Released { name });
    }

    /// Unmap and free a slot along with its watches and tasks
    fn reclaim(&mut self, handle: ResourceHandle) {
        self.tasks.cancel_owner(handle);
        self.watches.remove_owner(handle);
        if let Some(entry) = self.slots.free(handle) {
            if self.names.find(&entry.name) == Some(handle) {
                self.names.remove(&entry.name);
            }
        }
    }

    fn finish_pending_release(&mut self, handle: ResourceHandle) {
        let pending = self
            .slots
            .entry(handle)
            .map(|e| e.release_pending && e.resource.is_some())
            .unwrap_or(false);
        if pending {
            self.destroy(handle);
        }
    }

    // ---- Completion routing ----

    /// Apply file changes and asset completions. Returns the number of
    /// completions routed.
    pub fn update(&mut self) -> usize {
        if self.config.hot_reload {
            for change in self.source.poll_changes() {
                self.notify_hot_reload(change.watch, change.asset);
            }
        }

        let mut routed = 0;
        for completion in std::mem::take(&mut self.deferred) {
            routed += usize::from(self.route(completion));
        }
        while let Ok(completion) = self.completion_rx.try_recv() {
            routed += usize::from(self.route(completion));
        }
        routed
    }

    /// Route completions until no load task remains or `timeout` elapses.
    /// Returns `true` if the registry went idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.update();
            if self.tasks.len() == 0 && self.deferred.is_empty() {
                return true;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            match self.completion_rx.recv_timeout(remaining) {
                Ok(completion) => {
                    self.route(completion);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    /// Returns `false` if the completion was deferred
    fn route(&mut self, completion: AssetCompletion) -> bool {
        let Some((task_id, owner)) = self.tasks.route_of(completion.ticket) else {
            self.discard(completion);
            return true;
        };
        if self.slots.resource(owner).is_none() || self.tasks.is_running(task_id) {
            log::debug!("Deferring completion for {}: owner busy", completion.request.name);
            self.deferred.push(completion);
            return false;
        }

        self.tasks.resolve_ticket(completion.ticket);
        let Some(mut resource) = self.slots.checkout(owner) else {
            return true;
        };
        let Some(mut task) = self.tasks.checkout(task_id) else {
            self.slots.restore(owner, resource);
            return true;
        };
        log::debug!("Routing {} to {}", completion.request.name, resource.name());

        let result = task.on_complete(self, &mut resource, completion);
        let name = resource.name().clone();
        self.slots.restore(owner, resource);
        let alive = self.tasks.restore(task_id, task);

        match result {
            Ok(TaskStatus::Done) => {
                self.tasks.finish(task_id);
                self.settle(owner);
            }
            Ok(TaskStatus::Pending) if alive && self.tasks.outstanding(task_id) == 0 => {
                self.tasks.finish(task_id);
                self.fail_load(
                    owner,
                    ResourceError::HandlerContract(name, "load task is pending with no loads outstanding"),
                );
            }
            Ok(TaskStatus::Pending) => {}
            Err(err) => {
                self.tasks.finish(task_id);
                self.fail_load(owner, err);
            }
        }
        self.finish_pending_release(owner);
        true
    }

    fn discard(&mut self, completion: AssetCompletion) {
        log::debug!(
            "Discarding completion for {} (ticket {}): load was cancelled",
            completion.request.name,
            completion.ticket.0
        );
        if let Ok(asset) = completion.result {
            self.source.release(asset);
        }
    }

    /// Notify waiters if the resource is loaded, or fail it if nothing is
    /// left that could load it
    fn settle(&mut self, handle: ResourceHandle) {
        let Some(entry) = self.slots.entry_mut(handle) else {
            return;
        };
        let Some(resource) = entry.resource.as_ref() else {
            return;
        };

        if !resource.is_loaded() {
            if !self.tasks.owns(handle) {
                let name = entry.name.clone();
                self.fail_load(
                    handle,
                    ResourceError::HandlerContract(name, "load finished without reaching Loaded"),
                );
            }
            return;
        }

        let generation = resource.generation();
        for callback in std::mem::take(&mut entry.waiters) {
            callback(handle, resource);
        }
        if generation == entry.announced {
            return;
        }

        let name = entry.name.clone();
        if entry.announced.is_valid() {
            log::info!("Reloaded resource {} (generation {:?})", name, generation.value());
            self.events.push(ResourceEvent::Reloaded {
                handle,
                name,
                generation,
            });
        } else {
            log::info!("Loaded resource {} ({})", name, entry.kind);
            self.events.push(ResourceEvent::Loaded { handle, name });
        }
        entry.announced = generation;
    }

    fn fail_load(&mut self, handle: ResourceHandle, error: ResourceError) {
        self.tasks.cancel_owner(handle);
        let Some(entry) = self.slots.entry_mut(handle) else {
            return;
        };
        entry.waiters.clear();
        entry.failed = true;
        let name = entry.name.clone();
        log::error!("Failed to load resource {}: {}", name, error);
        self.events.push(ResourceEvent::Failed { name, error });
    }

    // ---- Hot reload ----

    /// Rebuild every resource watching `watch` from a changed asset
    ///
    /// Each owner receives its own copy of the asset. Returns `false` if the
    /// id is not watched or no rebuild succeeded; a resource whose rebuild
    /// fails keeps its previous data.
    pub fn notify_hot_reload(&mut self, watch: WatchId, asset: LoadedAsset) -> bool {
        let mut owners = self.watches.owners(watch);
        let Some(last) = owners.pop() else {
            log::warn!("Hot reload for unwatched id {} ({})", watch.0, asset.name);
            self.source.release(asset);
            return false;
        };

        let mut reloaded = false;
        for owner in owners {
            reloaded |= self.reload_owner(owner, watch, asset.clone());
        }
        reloaded |= self.reload_owner(last, watch, asset);
        reloaded
    }

    fn reload_owner(&mut self, handle: ResourceHandle, watch: WatchId, asset: LoadedAsset) -> bool {
        let Some(kind) = self.slots.entry(handle).map(|e| e.kind) else {
            self.source.release(asset);
            return false;
        };
        let Some(mut resource) = self.slots.checkout(handle) else {
            log::warn!("Hot reload of {} skipped: resource busy", asset.name);
            self.source.release(asset);
            return false;
        };
        let Some(mut handler) = self.handlers.checkout(kind) else {
            log::warn!("Hot reload of {} skipped: {} handler busy", resource.name(), kind);
            self.slots.restore(handle, resource);
            self.source.release(asset);
            return false;
        };

        log::debug!("Hot reloading {} from {}", resource.name(), asset.name);
        let previous = resource.state();
        resource.set_state(ResourceState::Loading);
        let result = handler.hot_reload(self, &mut resource, asset, watch);
        self.handlers.restore(handler);

        let reloaded = match result {
            Ok(()) => {
                self.slots.restore(handle, resource);
                self.settle(handle);
                true
            }
            Err(err) => {
                log::warn!("Hot reload of {} failed: {}", resource.name(), err);
                resource.restore_state(previous);
                self.slots.restore(handle, resource);
                false
            }
        };
        self.finish_pending_release(handle);
        reloaded
    }

    // ---- Handler services ----

    /// Load an asset on the calling thread
    pub fn load_asset(&self, request: &AssetRequest) -> ResourceResult<LoadedAsset> {
        Ok(self.source.load(request)?)
    }

    /// The asset source
    pub fn source(&self) -> &dyn AssetSource {
        self.source.as_ref()
    }

    /// The render backend
    pub fn backend(&mut self) -> &mut dyn RenderBackend {
        self.backend.as_mut()
    }

    /// Register a continuation for `owner`
    pub fn spawn_task(&mut self, owner: ResourceHandle, task: Box<dyn LoadTask>) -> TaskId {
        self.tasks.spawn(owner, task)
    }

    /// Start an asynchronous asset load routed to `task`
    ///
    /// A request the source refuses still completes, with
    /// [`AssetError::Rejected`].
    pub fn dispatch(&mut self, task: TaskId, request: AssetRequest) -> ResourceResult<Ticket> {
        let ticket = self
            .tasks
            .issue_ticket(task)
            .ok_or_else(|| ResourceError::HandlerContract(request.name.clone(), "dispatch for an unknown load task"))?;

        let reply = AssetReply::new(ticket, request.clone(), self.completion_tx.clone());
        if !self.source.request(request.clone(), reply) {
            log::debug!("Asset source rejected {}", request.name);
            let name = request.name.clone();
            let completion = AssetCompletion {
                ticket,
                request,
                result: Err(AssetError::Rejected(name)),
            };
            if self.completion_tx.send(completion).is_err() {
                log::debug!("Completion channel closed");
            }
        }
        Ok(ticket)
    }

    /// Start watching an asset on behalf of `owner`
    ///
    /// Does nothing unless hot reload is enabled, the request asks to be
    /// watched and the owner's handler can hot reload.
    pub fn watch(&mut self, owner: ResourceHandle, request: &AssetRequest) -> Option<WatchId> {
        if !self.config.hot_reload || !request.watch {
            return None;
        }
        let kind = self.slots.entry(owner)?.kind;
        if !self.handlers.supports_hot_reload(kind) {
            return None;
        }
        let watch = self.source.watch(request)?;
        self.watches.insert(watch, owner);
        log::debug!("Watching {} as {}", request.name, watch.0);
        Some(watch)
    }

    // ---- Queries ----

    /// Handle of a live resource
    pub fn find(&self, name: impl Into<Name>) -> Option<ResourceHandle> {
        self.names.find(&name.into())
    }

    /// Resource behind a handle, `None` if stale or mid-build
    pub fn get(&self, handle: ResourceHandle) -> Option<&Resource> {
        self.slots.resource(handle)
    }

    /// Resource by name
    pub fn get_by_name(&self, name: impl Into<Name>) -> Option<&Resource> {
        self.get(self.find(name)?)
    }

    /// Outstanding references to `name`
    pub fn reference_count(&self, name: impl Into<Name>) -> Option<u32> {
        let handle = self.find(name)?;
        self.slots.entry(handle).map(|e| e.reference_count)
    }

    /// Whether `name` is freed when its references reach zero
    pub fn is_auto_release(&self, name: impl Into<Name>) -> Option<bool> {
        let handle = self.find(name)?;
        self.slots.entry(handle).map(|e| e.auto_release)
    }

    /// Check if a handle still resolves
    pub fn contains(&self, handle: ResourceHandle) -> bool {
        self.slots.contains(handle)
    }

    /// Number of live resources
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no resources are live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot capacity
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Number of load tasks still in flight
    pub fn pending_loads(&self) -> usize {
        self.tasks.len()
    }

    /// Number of active watches
    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    /// Take all events raised since the last call
    pub fn drain_events(&mut self) -> Vec<ResourceEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Drop for ResourceSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::asset::AssetData;
    use crate::backend::HeadlessBackend;
    use crate::memory::MemoryAssetSource;

    const PROBE: ResourceKind = ResourceKind::Custom(200);

    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Normal,
        Fail,
        Lazy,
    }

    struct Probe {
        mode: Mode,
        hot_reload: bool,
        released: Arc<AtomicUsize>,
    }

    impl ResourceHandler for Probe {
        fn kind(&self) -> ResourceKind {
            PROBE
        }

        fn supports_hot_reload(&self) -> bool {
            self.hot_reload
        }

        fn request(
            &mut self,
            system: &mut ResourceSystem,
            resource: &mut Resource,
            info: RequestInfo,
        ) -> ResourceResult<()> {
            match self.mode {
                Mode::Fail => return Err(ResourceError::invalid_config(resource.name(), "probe failure")),
                Mode::Lazy => return Ok(()),
                Mode::Normal => {}
            }
            info.expect_assets(resource.name(), 1)?;
            let asset = info.assets[0].clone();
            system.watch(resource.handle(), &asset);

            if info.synchronous {
                let loaded = system.load_asset(&asset)?;
                resource.set_payload(loaded.into_text()?);
                resource.mark_loaded();
            } else {
                resource.set_state(ResourceState::Loading);
                let task = system.spawn_task(resource.handle(), Box::new(ProbeTask));
                system.dispatch(task, asset)?;
            }
            Ok(())
        }

        fn release(&mut self, _system: &mut ResourceSystem, _resource: &mut Resource) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }

        fn hot_reload(
            &mut self,
            _system: &mut ResourceSystem,
            resource: &mut Resource,
            asset: LoadedAsset,
            _watch: WatchId,
        ) -> ResourceResult<()> {
            resource.set_payload(asset.into_text()?);
            resource.mark_loaded();
            Ok(())
        }
    }

    struct ProbeTask;

    impl LoadTask for ProbeTask {
        fn on_complete(
            &mut self,
            _system: &mut ResourceSystem,
            resource: &mut Resource,
            completion: AssetCompletion,
        ) -> ResourceResult<TaskStatus> {
            let asset = completion.result?;
            resource.set_payload(asset.into_text()?);
            resource.mark_loaded();
            Ok(TaskStatus::Done)
        }
    }

    struct Fixture {
        system: ResourceSystem,
        source: Arc<MemoryAssetSource>,
        released: Arc<AtomicUsize>,
    }

    fn fixture(config: ResourceSystemConfig, mode: Mode, hot_reload: bool, source: MemoryAssetSource) -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let source = Arc::new(source);
        source.insert("core", "notes.txt", AssetData::Text("hello".into()));

        let released = Arc::new(AtomicUsize::new(0));
        let mut system = ResourceSystem::new(config, source.clone(), Box::new(HeadlessBackend::new())).unwrap();
        system
            .register_handler(Box::new(Probe {
                mode,
                hot_reload,
                released: released.clone(),
            }))
            .unwrap();
        Fixture {
            system,
            source,
            released,
        }
    }

    fn probe_info() -> RequestInfo {
        RequestInfo::new(PROBE).with_asset(AssetRequest::text("notes.txt", "core"))
    }

    #[test]
    fn test_sync_request_and_hit() {
        let mut f = fixture(Default::default(), Mode::Normal, false, MemoryAssetSource::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let a = f
            .system
            .request(
                "notes",
                probe_info()
                    .synchronous()
                    .with_callback(move |_, _| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
            )
            .unwrap();
        let counter = calls.clone();
        let b = f
            .system
            .request(
                "NOTES",
                probe_info().with_callback(move |_, res| {
                    assert!(res.is_loaded());
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.system.reference_count("notes"), Some(2));
        assert_eq!(f.source.request_count(&Name::new("notes.txt")), 1);
        assert_eq!(
            f.system.get(a).and_then(|r| r.payload::<String>()).map(String::as_str),
            Some("hello")
        );
    }

    #[test]
    fn test_no_handler_is_fatal() {
        let mut f = fixture(Default::default(), Mode::Normal, false, MemoryAssetSource::new());
        let err = f
            .system
            .request("song", RequestInfo::new(ResourceKind::Audio))
            .unwrap_err();

        assert!(matches!(err, ResourceError::NoHandlerForType(ResourceKind::Audio)));
        assert!(err.is_fatal());
        assert!(f.system.is_empty());
    }

    #[test]
    fn test_duplicate_handler_rejected() {
        let mut f = fixture(Default::default(), Mode::Normal, false, MemoryAssetSource::new());
        let err = f
            .system
            .register_handler(Box::new(Probe {
                mode: Mode::Normal,
                hot_reload: false,
                released: Arc::new(AtomicUsize::new(0)),
            }))
            .unwrap_err();
        assert!(matches!(err, ResourceError::HandlerAlreadyRegistered(PROBE)));
    }

    #[test]
    fn test_handler_failure_reclaims_slot() {
        let mut f = fixture(ResourceSystemConfig::with_capacity(1), Mode::Fail, false, MemoryAssetSource::new());

        assert!(f.system.request("a", probe_info()).is_err());
        assert!(f.system.find("a").is_none());
        assert_eq!(f.system.len(), 0);
        // Partial work is undone through the release hook
        assert_eq!(f.released.load(Ordering::SeqCst), 1);
        // The single slot is usable again
        let err = f.system.request("b", probe_info()).unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(f.system.len(), 0);
    }

    #[test]
    fn test_contract_violation_is_request_failure() {
        let mut f = fixture(Default::default(), Mode::Lazy, false, MemoryAssetSource::new());
        let err = f.system.request("lazy", probe_info()).unwrap_err();

        assert!(matches!(err, ResourceError::HandlerContract(..)));
        assert!(f.system.find("lazy").is_none());
    }

    #[test]
    fn test_kind_mismatch() {
        let mut f = fixture(Default::default(), Mode::Normal, false, MemoryAssetSource::new());
        f.system.request("notes", probe_info().synchronous()).unwrap();

        let err = f
            .system
            .request("notes", RequestInfo::new(ResourceKind::Text))
            .unwrap_err();
        assert!(matches!(err, ResourceError::KindMismatch { .. }));
        assert_eq!(f.system.reference_count("notes"), Some(1));
    }

    #[test]
    fn test_async_load_waits_for_update() {
        let mut f = fixture(Default::default(), Mode::Normal, false, MemoryAssetSource::manual());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let handle = f
            .system
            .request(
                "notes",
                probe_info().with_callback(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert_eq!(f.system.get(handle).unwrap().state(), ResourceState::Loading);
        assert_eq!(f.system.pending_loads(), 1);

        assert!(f.source.complete_all() > 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.system.update(), 1);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(f.system.get(handle).unwrap().is_loaded());
        assert_eq!(f.system.pending_loads(), 0);
        assert!(matches!(
            f.system.drain_events().as_slice(),
            [ResourceEvent::Loaded { .. }]
        ));
    }

    #[test]
    fn test_release_mid_load_discards_completion() {
        let mut f = fixture(Default::default(), Mode::Normal, false, MemoryAssetSource::manual());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        f.system
            .request(
                "notes",
                probe_info().with_callback(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert!(f.system.release("notes"));
        assert_eq!(f.system.pending_loads(), 0);

        f.source.complete_all();
        f.system.update();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(f.system.find("notes").is_none());
        assert_eq!(f.source.released_count(), 1);
    }

    #[test]
    fn test_async_failure_reports_event() {
        let mut f = fixture(Default::default(), Mode::Normal, false, MemoryAssetSource::new());
        let handle = f
            .system
            .request(
                "missing",
                RequestInfo::new(PROBE).with_asset(AssetRequest::text("missing.txt", "core")),
            )
            .unwrap();
        f.system.update();

        assert_eq!(f.system.get(handle).unwrap().state(), ResourceState::Loading);
        let events = f.system.drain_events();
        assert!(matches!(
            events.as_slice(),
            [ResourceEvent::Failed {
                error: ResourceError::Asset(AssetError::NotFound { .. }),
                ..
            }]
        ));
        assert!(f.system.release("missing"));
        assert!(f.system.is_empty());
    }

    #[test]
    fn test_rejected_dispatch_fails_load() {
        let source = MemoryAssetSource::new();
        source.set_rejecting(true);
        let mut f = fixture(Default::default(), Mode::Normal, false, source);

        f.system.request("notes", probe_info()).unwrap();
        f.system.update();

        assert!(matches!(
            f.system.drain_events().as_slice(),
            [ResourceEvent::Failed {
                error: ResourceError::Asset(AssetError::Rejected(_)),
                ..
            }]
        ));
    }

    #[test]
    fn test_double_release_warns() {
        let mut f = fixture(Default::default(), Mode::Normal, false, MemoryAssetSource::new());
        f.system.request("notes", probe_info().synchronous()).unwrap();

        assert!(f.system.release("notes"));
        assert!(!f.system.release("notes"));
        assert_eq!(f.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hot_reload_keeps_resource_alive() {
        let mut f = fixture(Default::default(), Mode::Normal, true, MemoryAssetSource::new());
        let info = RequestInfo::new(PROBE).with_asset(AssetRequest::text("notes.txt", "core").watched());
        let handle = f.system.request("notes", info.synchronous()).unwrap();

        assert_eq!(f.system.is_auto_release("notes"), Some(false));
        assert_eq!(f.system.watch_count(), 1);

        // Zero references without auto-release keeps the slot
        assert!(f.system.release("notes"));
        assert!(f.system.contains(handle));

        assert!(f.source.modify("core", "notes.txt", AssetData::Text("changed".into())));
        f.system.update();

        let resource = f.system.get(handle).unwrap();
        assert_eq!(resource.generation().value(), Some(1));
        assert_eq!(resource.payload::<String>().map(String::as_str), Some("changed"));

        f.system.force_release_all();
        assert_eq!(f.system.watch_count(), 0);
        assert_eq!(f.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unwatched_hot_reload_is_ignored() {
        let mut f = fixture(Default::default(), Mode::Normal, true, MemoryAssetSource::new());
        let asset = LoadedAsset::new("x", "core", AssetData::Text(String::new()));
        assert!(!f.system.notify_hot_reload(WatchId(99), asset));
    }

    #[test]
    fn test_hot_reload_disabled_auto_releases() {
        let config = ResourceSystemConfig::default().with_hot_reload(false);
        let mut f = fixture(config, Mode::Normal, true, MemoryAssetSource::new());
        let info = RequestInfo::new(PROBE).with_asset(AssetRequest::text("notes.txt", "core").watched());
        f.system.request("notes", info.synchronous()).unwrap();

        assert_eq!(f.system.is_auto_release("notes"), Some(true));
        assert_eq!(f.system.watch_count(), 0);
        assert!(f.system.release("notes"));
        assert!(f.system.is_empty());
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let mut f = fixture(Default::default(), Mode::Normal, false, MemoryAssetSource::new());
        f.system.request("notes", probe_info().synchronous()).unwrap();
        f.system.request("notes", probe_info()).unwrap();

        f.system.shutdown();
        assert!(f.system.is_empty());
        assert_eq!(f.released.load(Ordering::SeqCst), 1);
        assert!(!f.system.release("notes"));
    }
}
