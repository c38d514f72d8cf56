//! Decoders from file bytes to asset data

mod texture;

pub use texture::{decode_image, mip_level_count};

use void_resource::{AssetData, AssetError, AssetKind, AssetRequest};

/// Decoding options shared by every package of a source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Report a full mip chain for images
    pub generate_mips: bool,
}

/// Decode file bytes into the form a request asks for
pub fn decode(request: &AssetRequest, bytes: Vec<u8>, options: &LoaderOptions) -> Result<AssetData, AssetError> {
    match request.kind {
        AssetKind::Binary => Ok(AssetData::Binary(bytes)),
        AssetKind::Text => String::from_utf8(bytes)
            .map(AssetData::Text)
            .map_err(|e| AssetError::Decode {
                name: request.name.clone(),
                message: format!("not valid UTF-8: {}", e),
            }),
        AssetKind::Image => decode_image(&request.name, &bytes, options.generate_mips).map(AssetData::Image),
    }
}
