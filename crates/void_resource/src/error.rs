//! Registry errors

use thiserror::Error;

use crate::asset::AssetError;
use crate::backend::BackendError;
use crate::kind::ResourceKind;
use crate::name::Name;

/// Errors reported by the resource registry and its handlers
#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    #[error("Resource capacity exhausted ({capacity} slots); raise max_resource_count")]
    CapacityExhausted { capacity: usize },

    #[error("No handler registered for resource kind {0}")]
    NoHandlerForType(ResourceKind),

    #[error("A handler is already registered for resource kind {0}")]
    HandlerAlreadyRegistered(ResourceKind),

    #[error("{kind} resource {name} needs {expected} asset(s), got {found}")]
    AssetCountMismatch {
        name: Name,
        kind: ResourceKind,
        expected: &'static str,
        found: usize,
    },

    #[error("Resource {name} already exists as {registered}, requested as {requested}")]
    KindMismatch {
        name: Name,
        requested: ResourceKind,
        registered: ResourceKind,
    },

    #[error("Invalid configuration for {name}: {reason}")]
    InvalidConfig { name: String, reason: String },

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Handler contract violated for {0}: {1}")]
    HandlerContract(Name, &'static str),

    #[error("Resource {0} is being built and cannot be requested re-entrantly")]
    Busy(Name),

    #[error("Resource kind {0} does not support hot reload")]
    HotReloadUnsupported(ResourceKind),
}

impl ResourceError {
    /// Configuration errors that indicate the registry is set up wrong
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CapacityExhausted { .. } | Self::NoHandlerForType(_) | Self::HandlerAlreadyRegistered(_)
        )
    }

    /// Shorthand for an invalid configuration error
    pub fn invalid_config(name: impl ToString, reason: impl ToString) -> Self {
        Self::InvalidConfig {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for registry operations
pub type ResourceResult<T> = std::result::Result<T, ResourceError>;
