//! Asset source contract
//!
//! Assets are decoded file contents, one layer below resources. The registry
//! talks to whatever produces them through [`AssetSource`]. Asynchronous
//! requests carry an [`AssetReply`]; the source may complete it on any thread,
//! and the completion is routed to its load task on the thread that owns the
//! registry.

use core::fmt;

use crossbeam_channel::Sender;
use thiserror::Error;

use crate::name::Name;

/// Decoded form an asset is requested in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// UTF-8 text
    Text,
    /// Raw bytes
    Binary,
    /// Decoded image pixels
    Image,
}

/// Decoded image
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Interleaved channels per pixel
    pub channel_count: u8,
    /// Mip levels the image is suited for
    pub mip_levels: u32,
    /// Pixel data, row-major
    pub pixels: Vec<u8>,
}

impl ImageAsset {
    /// Create an image with a single mip level
    pub fn new(width: u32, height: u32, channel_count: u8, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channel_count,
            mip_levels: 1,
            pixels,
        }
    }

    /// Create an image filled with one pixel value
    pub fn filled(width: u32, height: u32, pixel: &[u8]) -> Self {
        let count = (width * height) as usize;
        let mut pixels = Vec::with_capacity(count * pixel.len());
        for _ in 0..count {
            pixels.extend_from_slice(pixel);
        }
        Self::new(width, height, pixel.len() as u8, pixels)
    }

    /// Number of pixels
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Check that the pixel buffer matches the declared size
    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.pixel_count() * self.channel_count as usize
    }

    /// Value of one channel of one pixel
    pub fn sample(&self, pixel: usize, channel: usize) -> Option<u8> {
        if channel >= self.channel_count as usize {
            return None;
        }
        self.pixels
            .get(pixel * self.channel_count as usize + channel)
            .copied()
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channel_count", &self.channel_count)
            .field("mip_levels", &self.mip_levels)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Decoded asset contents
#[derive(Clone, Debug, PartialEq)]
pub enum AssetData {
    Text(String),
    Binary(Vec<u8>),
    Image(ImageAsset),
}

impl AssetData {
    /// The kind this data satisfies
    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Text(_) => AssetKind::Text,
            Self::Binary(_) => AssetKind::Binary,
            Self::Image(_) => AssetKind::Image,
        }
    }
}

/// An asset delivered by a source
#[derive(Clone, Debug)]
pub struct LoadedAsset {
    pub name: Name,
    pub package: Name,
    pub data: AssetData,
}

impl LoadedAsset {
    /// Create a loaded asset
    pub fn new(name: impl Into<Name>, package: impl Into<Name>, data: AssetData) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            data,
        }
    }

    fn wrong_kind(&self, expected: AssetKind) -> AssetError {
        AssetError::WrongKind {
            name: self.name.clone(),
            expected,
            found: self.data.kind(),
        }
    }

    /// Borrow as text
    pub fn text(&self) -> Result<&str, AssetError> {
        match &self.data {
            AssetData::Text(text) => Ok(text),
            _ => Err(self.wrong_kind(AssetKind::Text)),
        }
    }

    /// Consume into text
    pub fn into_text(self) -> Result<String, AssetError> {
        match self.data {
            AssetData::Text(text) => Ok(text),
            _ => Err(self.wrong_kind(AssetKind::Text)),
        }
    }

    /// Consume into bytes. Text assets yield their UTF-8 bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>, AssetError> {
        match self.data {
            AssetData::Binary(bytes) => Ok(bytes),
            AssetData::Text(text) => Ok(text.into_bytes()),
            AssetData::Image(_) => Err(self.wrong_kind(AssetKind::Binary)),
        }
    }

    /// Consume into an image
    pub fn into_image(self) -> Result<ImageAsset, AssetError> {
        match self.data {
            AssetData::Image(image) => Ok(image),
            _ => Err(self.wrong_kind(AssetKind::Image)),
        }
    }
}

/// Errors reported by asset sources
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssetError {
    #[error("Asset not found: {name} (package '{package}')")]
    NotFound { name: Name, package: Name },

    #[error("Unknown package: {0}")]
    UnknownPackage(Name),

    #[error("IO error reading {name}: {message}")]
    Io { name: Name, message: String },

    #[error("Failed to decode {name}: {message}")]
    Decode { name: Name, message: String },

    #[error("Asset {name} is {found:?}, expected {expected:?}")]
    WrongKind {
        name: Name,
        expected: AssetKind,
        found: AssetKind,
    },

    #[error("Asset request for {0} was rejected by the source")]
    Rejected(Name),
}

/// One asset to load on behalf of a resource
#[derive(Clone, Debug, PartialEq)]
pub struct AssetRequest {
    /// Asset name within its package
    pub name: Name,
    /// Package the asset lives in
    pub package: Name,
    /// Decoded form wanted
    pub kind: AssetKind,
    /// Ask the source to watch the asset for hot reload
    pub watch: bool,
}

impl AssetRequest {
    /// Create an unwatched request
    pub fn new(kind: AssetKind, name: impl Into<Name>, package: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            kind,
            watch: false,
        }
    }

    /// Request a text asset
    pub fn text(name: impl Into<Name>, package: impl Into<Name>) -> Self {
        Self::new(AssetKind::Text, name, package)
    }

    /// Request a binary asset
    pub fn binary(name: impl Into<Name>, package: impl Into<Name>) -> Self {
        Self::new(AssetKind::Binary, name, package)
    }

    /// Request an image asset
    pub fn image(name: impl Into<Name>, package: impl Into<Name>) -> Self {
        Self::new(AssetKind::Image, name, package)
    }

    /// Mark the asset as hot-reload eligible
    pub fn watched(mut self) -> Self {
        self.watch = true;
        self
    }
}

/// Identifier assigned by a source to a watched asset
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchId(pub u64);

/// Identifier of one dispatched asset load
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(pub u64);

/// Result of one asynchronous asset load
#[derive(Debug)]
pub struct AssetCompletion {
    pub ticket: Ticket,
    pub request: AssetRequest,
    pub result: Result<LoadedAsset, AssetError>,
}

/// Completion slot handed to a source with each asynchronous request
///
/// Sending consumes the reply, so a request completes at most once.
pub struct AssetReply {
    ticket: Ticket,
    request: AssetRequest,
    sender: Sender<AssetCompletion>,
}

impl AssetReply {
    /// Create a reply that delivers to `sender`
    pub fn new(ticket: Ticket, request: AssetRequest, sender: Sender<AssetCompletion>) -> Self {
        Self {
            ticket,
            request,
            sender,
        }
    }

    /// Ticket this reply completes
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// The request being answered
    pub fn request(&self) -> &AssetRequest {
        &self.request
    }

    /// Deliver the result
    pub fn send(self, result: Result<LoadedAsset, AssetError>) {
        let name = self.request.name.clone();
        let completion = AssetCompletion {
            ticket: self.ticket,
            request: self.request,
            result,
        };
        if self.sender.send(completion).is_err() {
            log::debug!("Completion for {} dropped: registry is gone", name);
        }
    }
}

impl fmt::Debug for AssetReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetReply")
            .field("ticket", &self.ticket)
            .field("request", &self.request)
            .finish()
    }
}

/// A watched asset changed and was decoded again
#[derive(Debug)]
pub struct AssetChange {
    pub watch: WatchId,
    pub asset: LoadedAsset,
}

/// Produces decoded assets for the registry
pub trait AssetSource: Send + Sync {
    /// Start an asynchronous load. Returns `false` if the request was not
    /// accepted, in which case `reply` is dropped unsent.
    fn request(&self, request: AssetRequest, reply: AssetReply) -> bool;

    /// Load on the calling thread
    fn load(&self, request: &AssetRequest) -> Result<LoadedAsset, AssetError>;

    /// Return an asset the registry no longer needs
    fn release(&self, asset: LoadedAsset) {
        drop(asset);
    }

    /// Start watching an asset for changes
    fn watch(&self, _request: &AssetRequest) -> Option<WatchId> {
        None
    }

    /// Drain changes to watched assets
    fn poll_changes(&self) -> Vec<AssetChange> {
        Vec::new()
    }
}
