//! Resource and asset names
//!
//! Names compare by a case-insensitive FNV-1a hash, so `"Rock_Albedo"` and
//! `"rock_albedo"` refer to the same resource. The original spelling is kept
//! for display.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Interned, case-insensitive identifier
#[derive(Clone)]
pub struct Name {
    key: u64,
    text: Arc<str>,
}

impl Name {
    /// Create a name from text
    pub fn new(text: impl AsRef<str>) -> Self {
        let text = text.as_ref();
        Self {
            key: Self::key_of(text),
            text: Arc::from(text),
        }
    }

    /// The empty name, used for "no package"
    pub fn empty() -> Self {
        Self::new("")
    }

    /// Hash key used for comparisons
    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Original spelling
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Check if the name is empty
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// FNV-1a over the ASCII-lowercased bytes
    pub fn key_of(text: &str) -> u64 {
        let mut hash = 0xcbf29ce484222325u64;
        for byte in text.bytes() {
            hash ^= byte.to_ascii_lowercase() as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        hash
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Name {}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", &*self.text)
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Name {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&String> for Name {
    fn from(text: &String) -> Self {
        Self::new(text)
    }
}

impl From<&Name> for Name {
    fn from(name: &Name) -> Self {
        name.clone()
    }
}
