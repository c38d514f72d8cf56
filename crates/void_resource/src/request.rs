//! Request descriptions handed to handlers

use std::fmt;

use crate::asset::{AssetRequest, ImageAsset};
use crate::backend::{TextureFlags, TextureType};
use crate::error::{ResourceError, ResourceResult};
use crate::handle::ResourceHandle;
use crate::kind::ResourceKind;
use crate::name::Name;
use crate::resource::Resource;

/// Typed listener invoked once the requested resource is usable
///
/// On a cache hit it runs immediately, even if the resource is still loading.
pub type ResourceCallback = Box<dyn FnOnce(ResourceHandle, &Resource) + Send>;

/// Texture-specific request options
#[derive(Clone, Debug, Default)]
pub struct TextureOptions {
    pub texture_type: TextureType,
    pub flags: TextureFlags,
    /// Pixels supplied directly instead of loaded from assets
    pub pixels: Option<ImageAsset>,
}

/// Where a config-driven handler reads its configuration from
#[derive(Debug, Clone, Copy)]
pub enum ConfigSource<'a> {
    Asset(&'a AssetRequest),
    Inline(&'a str),
}

/// Everything a handler needs to build one resource
pub struct RequestInfo {
    pub kind: ResourceKind,
    pub assets: Vec<AssetRequest>,
    pub callback: Option<ResourceCallback>,
    pub synchronous: bool,
    pub source_text: Option<String>,
    pub texture: TextureOptions,
    pub tags: Vec<Name>,
}

impl RequestInfo {
    /// Create an asynchronous request with no assets
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            assets: Vec::new(),
            callback: None,
            synchronous: false,
            source_text: None,
            texture: TextureOptions::default(),
            tags: Vec::new(),
        }
    }

    /// Append an asset to load
    pub fn with_asset(mut self, asset: AssetRequest) -> Self {
        self.assets.push(asset);
        self
    }

    /// Block in the handler until the resource is loaded
    pub fn synchronous(mut self) -> Self {
        self.synchronous = true;
        self
    }

    /// Invoke `callback` once the resource is usable
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(ResourceHandle, &Resource) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Supply configuration text inline
    pub fn with_source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }

    /// Set texture options
    pub fn with_texture(mut self, texture: TextureOptions) -> Self {
        self.texture = texture;
        self
    }

    /// Set categorization tags
    pub fn with_tags<I, N>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Name>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Require exactly `count` assets
    pub fn expect_assets(&self, name: &Name, count: usize) -> ResourceResult<()> {
        if self.assets.len() != count {
            return Err(ResourceError::AssetCountMismatch {
                name: name.clone(),
                kind: self.kind,
                expected: match count {
                    0 => "0",
                    1 => "1",
                    6 => "6",
                    _ => "a fixed number of",
                },
                found: self.assets.len(),
            });
        }
        Ok(())
    }

    /// Exactly one config asset, or none with inline source text
    pub fn expect_config(&self, name: &Name) -> ResourceResult<ConfigSource<'_>> {
        match (self.assets.as_slice(), self.source_text.as_deref()) {
            ([asset], _) => Ok(ConfigSource::Asset(asset)),
            ([], Some(text)) => Ok(ConfigSource::Inline(text)),
            (assets, _) => Err(ResourceError::AssetCountMismatch {
                name: name.clone(),
                kind: self.kind,
                expected: "exactly one config (or inline source)",
                found: assets.len(),
            }),
        }
    }
}

impl fmt::Debug for RequestInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInfo")
            .field("kind", &self.kind)
            .field("assets", &self.assets)
            .field("has_callback", &self.callback.is_some())
            .field("synchronous", &self.synchronous)
            .field("has_source_text", &self.source_text.is_some())
            .field("texture", &self.texture)
            .field("tags", &self.tags)
            .finish()
    }
}
