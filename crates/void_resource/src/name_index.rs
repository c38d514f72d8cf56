//! Name → slot lookup

use std::collections::BTreeMap;

use crate::handle::ResourceHandle;
use crate::name::Name;

/// Ordered map from resource name to its live slot
#[derive(Debug, Default)]
pub(crate) struct NameIndex {
    map: BTreeMap<Name, ResourceHandle>,
}

impl NameIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn find(&self, name: &Name) -> Option<ResourceHandle> {
        self.map.get(name).copied()
    }

    /// Map `name`, returning a previous mapping if one existed
    pub(crate) fn insert(&mut self, name: Name, handle: ResourceHandle) -> Option<ResourceHandle> {
        self.map.insert(name, handle)
    }

    pub(crate) fn remove(&mut self, name: &Name) -> Option<ResourceHandle> {
        self.map.remove(name)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
    }
}
