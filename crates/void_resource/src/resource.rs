//! The resource object stored in each registry slot

use std::any::Any;
use std::fmt;

use crate::handle::ResourceHandle;
use crate::kind::ResourceKind;
use crate::name::Name;

/// Lifecycle state of a resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceState {
    /// Slot allocated, nothing populated yet
    Uninitialized,
    /// CPU-side data ready, nothing handed to the render backend
    Initialized,
    /// Loads or backend upload in flight
    Loading,
    /// Ready for use
    Loaded,
}

/// Data generation of a resource
///
/// Invalid until the first successful load, then 0, then +1 for every
/// replacement of the underlying data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(Option<u32>);

impl Generation {
    /// Generation of a resource that has never loaded
    pub const INVALID: Generation = Generation(None);

    /// Check if valid
    pub const fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    /// Raw value, `None` while invalid
    pub const fn value(&self) -> Option<u32> {
        self.0
    }

    /// The generation that follows this one
    pub fn next(self) -> Self {
        match self.0 {
            None => Generation(Some(0)),
            Some(v) => Generation(Some(v.saturating_add(1))),
        }
    }
}

/// A named, typed, versioned resource
///
/// The payload belongs to the handler of `kind`; the registry never looks
/// inside it.
pub struct Resource {
    handle: ResourceHandle,
    name: Name,
    kind: ResourceKind,
    state: ResourceState,
    generation: Generation,
    tags: Vec<Name>,
    payload: Option<Box<dyn Any + Send + Sync>>,
}

impl Resource {
    pub(crate) fn new(handle: ResourceHandle, name: Name, kind: ResourceKind) -> Self {
        Self {
            handle,
            name,
            kind,
            state: ResourceState::Uninitialized,
            generation: Generation::INVALID,
            tags: Vec::new(),
            payload: None,
        }
    }

    /// Handle of the slot holding this resource
    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    /// Unique name
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Kind tag
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Current lifecycle state
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Data generation
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Check if the resource is usable
    pub fn is_loaded(&self) -> bool {
        self.state == ResourceState::Loaded
    }

    /// Categorization tags
    pub fn tags(&self) -> &[Name] {
        &self.tags
    }

    pub(crate) fn set_tags(&mut self, tags: Vec<Name>) {
        self.tags = tags;
    }

    /// Set an intermediate lifecycle state
    ///
    /// Use [`Resource::mark_loaded`] to reach `Loaded`, which also advances
    /// the generation.
    pub fn set_state(&mut self, state: ResourceState) {
        if state == ResourceState::Loaded {
            self.mark_loaded();
        } else {
            self.state = state;
        }
    }

    /// Mark the data as replaced and ready
    pub fn mark_loaded(&mut self) {
        self.state = ResourceState::Loaded;
        self.generation = self.generation.next();
    }

    /// Drop the payload and return to `Uninitialized` ahead of a rebuild.
    /// The generation is kept so it keeps increasing.
    pub(crate) fn reset(&mut self) {
        self.state = ResourceState::Uninitialized;
        self.payload = None;
    }

    pub(crate) fn restore_state(&mut self, state: ResourceState) {
        self.state = state;
    }

    /// Borrow the payload as `T`
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }

    /// Mutably borrow the payload as `T`
    pub fn payload_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.payload.as_mut()?.downcast_mut::<T>()
    }

    /// Replace the payload
    pub fn set_payload<T: Any + Send + Sync>(&mut self, payload: T) {
        self.payload = Some(Box::new(payload));
    }

    /// Take the payload out if it is a `T`
    pub fn take_payload<T: Any>(&mut self) -> Option<T> {
        let boxed = self.payload.take()?;
        match boxed.downcast::<T>() {
            Ok(payload) => Some(*payload),
            Err(other) => {
                self.payload = Some(other);
                None
            }
        }
    }

    /// Check if a payload is present
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}
