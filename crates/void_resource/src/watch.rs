//! Hot-reload watch index

use std::collections::HashMap;

use crate::asset::WatchId;
use crate::handle::ResourceHandle;

/// Maps source watch ids to the resources they rebuild
///
/// Sources hand out one id per asset, so several resources built from the
/// same file share an id.
#[derive(Debug, Default)]
pub(crate) struct WatchIndex {
    entries: HashMap<WatchId, Vec<ResourceHandle>>,
}

impl WatchIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, watch: WatchId, owner: ResourceHandle) {
        let owners = self.entries.entry(watch).or_default();
        if !owners.contains(&owner) {
            owners.push(owner);
        }
    }

    /// Every resource watching `watch`, in registration order
    pub(crate) fn owners(&self, watch: WatchId) -> Vec<ResourceHandle> {
        self.entries.get(&watch).cloned().unwrap_or_default()
    }

    /// Drop every watch owned by `owner`, keeping other owners of shared ids
    pub(crate) fn remove_owner(&mut self, owner: ResourceHandle) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, owners| {
            let before = owners.len();
            owners.retain(|handle| *handle != owner);
            removed += before - owners.len();
            !owners.is_empty()
        });
        removed
    }

    /// Number of (watch, owner) registrations
    pub(crate) fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
