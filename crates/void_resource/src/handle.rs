//! Resource handles
//!
//! Consumers never hold references into the registry. They hold a
//! `ResourceHandle`, a slot index paired with the slot's epoch. The epoch is
//! bumped every time a slot is reclaimed, so a handle to a released resource
//! stops resolving instead of aliasing whatever reuses the slot.

use core::fmt;

/// Generational index into the resource slot table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceHandle {
    index: u32,
    epoch: u32,
}

impl ResourceHandle {
    /// Create a handle from its parts
    #[inline]
    pub const fn new(index: u32, epoch: u32) -> Self {
        Self { index, epoch }
    }

    /// Create an invalid/null handle
    #[inline]
    pub const fn null() -> Self {
        Self {
            index: u32::MAX,
            epoch: 0,
        }
    }

    /// Check if this handle is null
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.index == u32::MAX
    }

    /// Slot index
    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Slot epoch
    #[inline]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }
}

impl Default for ResourceHandle {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "ResourceHandle(null)")
        } else {
            write!(f, "ResourceHandle({}v{})", self.index, self.epoch)
        }
    }
}
