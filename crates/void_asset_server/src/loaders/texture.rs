//! Image decoding for PNG, JPG, BMP and HDR files

use void_resource::{AssetError, ImageAsset, Name};

/// Levels in a full mip chain down to 1x1
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Decode image bytes to RGBA8
pub fn decode_image(name: &Name, data: &[u8], generate_mips: bool) -> Result<ImageAsset, AssetError> {
    let img = image::load_from_memory(data).map_err(|e| AssetError::Decode {
        name: name.clone(),
        message: e.to_string(),
    })?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut asset = ImageAsset::new(width, height, 4, rgba.into_raw());
    if generate_mips {
        asset.mip_levels = mip_level_count(width, height);
    }
    Ok(asset)
}
