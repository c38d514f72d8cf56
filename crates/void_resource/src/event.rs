//! Registry events

use crate::error::ResourceError;
use crate::handle::ResourceHandle;
use crate::name::Name;
use crate::resource::Generation;

/// Lifecycle notifications, drained with `ResourceSystem::drain_events`
#[derive(Debug, Clone)]
pub enum ResourceEvent {
    /// A resource reached `Loaded` for the first time
    Loaded { handle: ResourceHandle, name: Name },
    /// An asynchronous load failed after `request` returned
    Failed { name: Name, error: ResourceError },
    /// A hot reload replaced the resource's data
    Reloaded {
        handle: ResourceHandle,
        name: Name,
        generation: Generation,
    },
    /// A resource was destroyed and its slot reclaimed
    Released { name: Name },
}

impl ResourceEvent {
    /// Name of the resource the event is about
    pub fn name(&self) -> &Name {
        match self {
            Self::Loaded { name, .. }
            | Self::Failed { name, .. }
            | Self::Reloaded { name, .. }
            | Self::Released { name } => name,
        }
    }
}
