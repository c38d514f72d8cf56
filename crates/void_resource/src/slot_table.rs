//! Fixed-capacity resource storage
//!
//! Slots are pre-allocated at construction. A free list hands out indices;
//! reclaiming a slot bumps its epoch so stale handles stop resolving.

use crate::error::{ResourceError, ResourceResult};
use crate::handle::ResourceHandle;
use crate::kind::ResourceKind;
use crate::name::Name;
use crate::request::ResourceCallback;
use crate::resource::{Generation, Resource};

/// Bookkeeping for one occupied slot
pub(crate) struct SlotEntry {
    pub(crate) name: Name,
    pub(crate) kind: ResourceKind,
    /// `None` while the resource is checked out to its handler
    pub(crate) resource: Option<Resource>,
    pub(crate) reference_count: u32,
    pub(crate) auto_release: bool,
    /// Callbacks waiting for the resource to reach `Loaded`
    pub(crate) waiters: Vec<ResourceCallback>,
    /// Last generation reported through the event queue
    pub(crate) announced: Generation,
    /// Reference count hit zero while the resource was checked out
    pub(crate) release_pending: bool,
    /// The last load failed; the next request runs the handler again
    pub(crate) failed: bool,
}

struct Slot {
    epoch: u32,
    entry: Option<SlotEntry>,
}

pub(crate) struct SlotTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl SlotTable {
    pub(crate) fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                epoch: 0,
                entry: None,
            })
            .collect();
        // Reversed so the lowest index is handed out first
        let free = (0..capacity as u32).rev().collect();
        Self { slots, free }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Occupy a slot with a fresh `Uninitialized` resource
    pub(crate) fn allocate(
        &mut self,
        name: Name,
        kind: ResourceKind,
        auto_release: bool,
    ) -> ResourceResult<ResourceHandle> {
        let index = self.free.pop().ok_or(ResourceError::CapacityExhausted {
            capacity: self.slots.len(),
        })?;
        let slot = &mut self.slots[index as usize];
        let handle = ResourceHandle::new(index, slot.epoch);

        slot.entry = Some(SlotEntry {
            resource: Some(Resource::new(handle, name.clone(), kind)),
            name,
            kind,
            reference_count: 0,
            auto_release,
            waiters: Vec::new(),
            announced: Generation::INVALID,
            release_pending: false,
            failed: false,
        });
        Ok(handle)
    }

    /// Reclaim a slot, returning whatever it still held
    pub(crate) fn free(&mut self, handle: ResourceHandle) -> Option<SlotEntry> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.epoch != handle.epoch() {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.epoch = slot.epoch.wrapping_add(1);
        self.free.push(handle.index());
        Some(entry)
    }

    pub(crate) fn contains(&self, handle: ResourceHandle) -> bool {
        self.entry(handle).is_some()
    }

    pub(crate) fn entry(&self, handle: ResourceHandle) -> Option<&SlotEntry> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.epoch != handle.epoch() {
            return None;
        }
        slot.entry.as_ref()
    }

    pub(crate) fn entry_mut(&mut self, handle: ResourceHandle) -> Option<&mut SlotEntry> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.epoch != handle.epoch() {
            return None;
        }
        slot.entry.as_mut()
    }

    pub(crate) fn resource(&self, handle: ResourceHandle) -> Option<&Resource> {
        self.entry(handle)?.resource.as_ref()
    }

    /// Take the resource out so its handler can work on it
    pub(crate) fn checkout(&mut self, handle: ResourceHandle) -> Option<Resource> {
        self.entry_mut(handle)?.resource.take()
    }

    /// Put a checked-out resource back. Returns it if the slot is gone.
    pub(crate) fn restore(&mut self, handle: ResourceHandle, resource: Resource) -> Option<Resource> {
        match self.entry_mut(handle) {
            Some(entry) => {
                entry.resource = Some(resource);
                None
            }
            None => Some(resource),
        }
    }

    /// Handles of all occupied slots, in index order
    pub(crate) fn handles(&self) -> Vec<ResourceHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.entry.is_some())
            .map(|(index, slot)| ResourceHandle::new(index as u32, slot.epoch))
            .collect()
    }
}
