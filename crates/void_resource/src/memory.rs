//! In-memory asset source
//!
//! Assets are inserted up front under `(package, name)`. In immediate mode
//! asynchronous requests are answered on the calling thread; in manual mode
//! they are held until the owner completes them, which lets callers drive
//! completions in any order.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::asset::{
    AssetChange, AssetData, AssetError, AssetKind, AssetReply, AssetRequest, AssetSource, ImageAsset, LoadedAsset,
    WatchId,
};
use crate::name::Name;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CompletionMode {
    Immediate,
    Manual,
}

struct MemoryState {
    mode: CompletionMode,
    rejecting: bool,
    assets: HashMap<(Name, Name), AssetData>,
    held: VecDeque<AssetReply>,
    request_counts: HashMap<Name, usize>,
    watches: HashMap<(Name, Name), (WatchId, AssetRequest)>,
    next_watch: u64,
    changes: Vec<AssetChange>,
    released: usize,
}

impl MemoryState {
    fn lookup(&self, request: &AssetRequest) -> Result<LoadedAsset, AssetError> {
        let data = self
            .assets
            .get(&(request.package.clone(), request.name.clone()))
            .ok_or_else(|| AssetError::NotFound {
                name: request.name.clone(),
                package: request.package.clone(),
            })?;

        let data = match (request.kind, data) {
            (AssetKind::Text, AssetData::Text(_))
            | (AssetKind::Binary, AssetData::Binary(_))
            | (AssetKind::Image, AssetData::Image(_)) => data.clone(),
            (AssetKind::Binary, AssetData::Text(text)) => AssetData::Binary(text.clone().into_bytes()),
            (expected, found) => {
                return Err(AssetError::WrongKind {
                    name: request.name.clone(),
                    expected,
                    found: found.kind(),
                })
            }
        };
        Ok(LoadedAsset {
            name: request.name.clone(),
            package: request.package.clone(),
            data,
        })
    }

    fn count(&mut self, request: &AssetRequest) {
        *self.request_counts.entry(request.name.clone()).or_insert(0) += 1;
    }
}

/// Asset source backed by a map
pub struct MemoryAssetSource {
    state: Mutex<MemoryState>,
}

impl Default for MemoryAssetSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAssetSource {
    fn with_mode(mode: CompletionMode) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                mode,
                rejecting: false,
                assets: HashMap::new(),
                held: VecDeque::new(),
                request_counts: HashMap::new(),
                watches: HashMap::new(),
                next_watch: 0,
                changes: Vec::new(),
                released: 0,
            }),
        }
    }

    /// Create a source that answers requests immediately
    pub fn new() -> Self {
        Self::with_mode(CompletionMode::Immediate)
    }

    /// Create a source that holds requests until completed by hand
    pub fn manual() -> Self {
        Self::with_mode(CompletionMode::Manual)
    }

    /// Refuse every asynchronous request
    pub fn set_rejecting(&self, rejecting: bool) {
        self.state.lock().rejecting = rejecting;
    }

    /// Add or replace an asset
    pub fn insert(&self, package: impl Into<Name>, name: impl Into<Name>, data: AssetData) {
        self.state.lock().assets.insert((package.into(), name.into()), data);
    }

    /// Add a text asset
    pub fn insert_text(&self, package: impl Into<Name>, name: impl Into<Name>, text: impl Into<String>) {
        self.insert(package, name, AssetData::Text(text.into()));
    }

    /// Add an image asset
    pub fn insert_image(&self, package: impl Into<Name>, name: impl Into<Name>, image: ImageAsset) {
        self.insert(package, name, AssetData::Image(image));
    }

    /// Remove an asset
    pub fn remove(&self, package: impl Into<Name>, name: impl Into<Name>) -> bool {
        self.state
            .lock()
            .assets
            .remove(&(package.into(), name.into()))
            .is_some()
    }

    /// Replace an asset and, if it is watched, queue a change notification
    pub fn modify(&self, package: impl Into<Name>, name: impl Into<Name>, data: AssetData) -> bool {
        let key = (package.into(), name.into());
        let mut state = self.state.lock();
        state.assets.insert(key.clone(), data);

        let Some((watch, request)) = state.watches.get(&key).cloned() else {
            return false;
        };
        match state.lookup(&request) {
            Ok(asset) => {
                state.changes.push(AssetChange { watch, asset });
                true
            }
            Err(e) => {
                log::warn!("Modified asset {} no longer decodes: {}", key.1, e);
                false
            }
        }
    }

    /// Loads of `name`, synchronous and asynchronous
    pub fn request_count(&self, name: &Name) -> usize {
        self.state.lock().request_counts.get(name).copied().unwrap_or(0)
    }

    /// Loads across all names
    pub fn total_requests(&self) -> usize {
        self.state.lock().request_counts.values().sum()
    }

    /// Requests waiting for manual completion
    pub fn held_count(&self) -> usize {
        self.state.lock().held.len()
    }

    /// Assets handed back through [`AssetSource::release`]
    pub fn released_count(&self) -> usize {
        self.state.lock().released
    }

    /// Complete the oldest held request
    pub fn complete_next(&self) -> bool {
        let (reply, result) = {
            let mut state = self.state.lock();
            let Some(reply) = state.held.pop_front() else {
                return false;
            };
            let result = state.lookup(reply.request());
            (reply, result)
        };
        reply.send(result);
        true
    }

    /// Complete the oldest held request for `name`
    pub fn complete_named(&self, name: impl Into<Name>) -> bool {
        let name = name.into();
        let (reply, result) = {
            let mut state = self.state.lock();
            let Some(position) = state.held.iter().position(|r| r.request().name == name) else {
                return false;
            };
            let Some(reply) = state.held.remove(position) else {
                return false;
            };
            let result = state.lookup(reply.request());
            (reply, result)
        };
        reply.send(result);
        true
    }

    /// Fail the oldest held request for `name` with `error`
    pub fn fail_named(&self, name: impl Into<Name>, error: AssetError) -> bool {
        let name = name.into();
        let reply = {
            let mut state = self.state.lock();
            let Some(position) = state.held.iter().position(|r| r.request().name == name) else {
                return false;
            };
            state.held.remove(position)
        };
        match reply {
            Some(reply) => {
                reply.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Complete every held request in order. Returns how many completed.
    pub fn complete_all(&self) -> usize {
        let mut completed = 0;
        while self.complete_next() {
            completed += 1;
        }
        completed
    }
}

impl AssetSource for MemoryAssetSource {
    fn request(&self, request: AssetRequest, reply: AssetReply) -> bool {
        let result = {
            let mut state = self.state.lock();
            if state.rejecting {
                return false;
            }
            state.count(&request);
            if state.mode == CompletionMode::Manual {
                state.held.push_back(reply);
                return true;
            }
            state.lookup(&request)
        };
        reply.send(result);
        true
    }

    fn load(&self, request: &AssetRequest) -> Result<LoadedAsset, AssetError> {
        let mut state = self.state.lock();
        state.count(request);
        state.lookup(request)
    }

    fn release(&self, asset: LoadedAsset) {
        self.state.lock().released += 1;
        drop(asset);
    }

    fn watch(&self, request: &AssetRequest) -> Option<WatchId> {
        let mut state = self.state.lock();
        let key = (request.package.clone(), request.name.clone());
        if let Some((watch, _)) = state.watches.get(&key) {
            return Some(*watch);
        }
        state.next_watch += 1;
        let watch = WatchId(state.next_watch);
        state.watches.insert(key, (watch, request.clone()));
        Some(watch)
    }

    fn poll_changes(&self) -> Vec<AssetChange> {
        std::mem::take(&mut self.state.lock().changes)
    }
}
