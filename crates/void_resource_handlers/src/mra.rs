//! Metallic / roughness / ambient-occlusion channel packing
//!
//! Three single-channel maps are combined into one RGBA texture:
//! R = metallic, G = roughness, B = ambient occlusion, A = 255. Each map
//! contributes its first channel. A map that failed to load or does not
//! match the reference size is replaced by the channel default.

use void_resource::{ImageAsset, JoinBarrier, JoinEntry, Name};

/// Metallic value used when no usable map exists
pub const METALLIC_DEFAULT: u8 = 0;
/// Roughness value used when no usable map exists
pub const ROUGHNESS_DEFAULT: u8 = 128;
/// Ambient occlusion value used when no usable map exists
pub const AO_DEFAULT: u8 = 255;

/// One channel of the packed texture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MraChannel {
    Metallic,
    Roughness,
    AmbientOcclusion,
}

impl MraChannel {
    /// Channels in packing order
    pub const ALL: [MraChannel; 3] = [Self::Metallic, Self::Roughness, Self::AmbientOcclusion];

    pub fn default_value(self) -> u8 {
        match self {
            Self::Metallic => METALLIC_DEFAULT,
            Self::Roughness => ROUGHNESS_DEFAULT,
            Self::AmbientOcclusion => AO_DEFAULT,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Metallic => "metallic",
            Self::Roughness => "roughness",
            Self::AmbientOcclusion => "ambient occlusion",
        }
    }
}

/// Barrier with one entry per channel, in packing order
///
/// Channels without a map are settled up front as unavailable.
pub fn channel_barrier(maps: &[Option<Name>; 3]) -> JoinBarrier<ImageAsset> {
    let mut barrier = JoinBarrier::new();
    for map in maps {
        match map {
            Some(name) => barrier.push_requested(name.clone()),
            None => barrier.push_unavailable(Name::empty()),
        }
    }
    barrier
}

/// Pack settled channel entries into an RGBA image
pub fn pack(material: &Name, mut entries: Vec<JoinEntry<ImageAsset>>) -> ImageAsset {
    entries.truncate(MraChannel::ALL.len());

    for (entry, channel) in entries.iter_mut().zip(MraChannel::ALL) {
        let usable = entry
            .payload()
            .map(|image| image.is_consistent() && image.channel_count > 0)
            .unwrap_or(false);
        if entry.is_loaded() && !usable {
            log::warn!(
                "Material {}: {} map {} has no usable pixel data, using default",
                material,
                channel.label(),
                entry.name()
            );
            entry.demote();
        }
    }

    // First loaded channel in packing order sets the size
    let reference = entries
        .iter()
        .filter_map(|e| e.payload())
        .map(|image| (image.width, image.height))
        .next();

    let (width, height) = reference.unwrap_or((1, 1));
    for (entry, channel) in entries.iter_mut().zip(MraChannel::ALL) {
        let Some(image) = entry.payload() else {
            continue;
        };
        if (image.width, image.height) != (width, height) {
            log::warn!(
                "Material {}: {} map {} is {}x{}, expected {}x{}; using default",
                material,
                channel.label(),
                entry.name(),
                image.width,
                image.height,
                width,
                height
            );
            entry.demote();
        }
    }

    let pixel_count = width as usize * height as usize;
    let mut pixels = Vec::with_capacity(pixel_count * 4);
    for pixel in 0..pixel_count {
        for (i, channel) in MraChannel::ALL.iter().enumerate() {
            let value = entries
                .get(i)
                .and_then(|e| e.payload())
                .and_then(|image| image.sample(pixel, 0))
                .unwrap_or(channel.default_value());
            pixels.push(value);
        }
        pixels.push(255);
    }

    ImageAsset::new(width, height, 4, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_resource::JoinProgress;

    fn settle(maps: [Option<&str>; 3], images: Vec<(&str, Option<ImageAsset>)>) -> ImageAsset {
        let maps = maps.map(|m| m.map(|s| Name::new(s)));
        let mut barrier = channel_barrier(&maps);
        let mut ready = None;
        for (name, image) in images {
            if let JoinProgress::Ready(entries) = barrier.complete(&Name::new(name), image) {
                ready = Some(entries);
            }
        }
        if ready.is_none() {
            if let JoinProgress::Ready(entries) = barrier.poll() {
                ready = Some(entries);
            }
        }
        pack(&Name::new("mat"), ready.expect("barrier should fire"))
    }

    #[test]
    fn test_defaults_without_maps() {
        let packed = settle([None, None, None], vec![]);
        assert_eq!((packed.width, packed.height), (1, 1));
        assert_eq!(packed.pixels, vec![METALLIC_DEFAULT, ROUGHNESS_DEFAULT, AO_DEFAULT, 255]);
    }

    #[test]
    fn test_failed_channels_use_defaults() {
        let metal = ImageAsset::filled(2, 2, &[200, 1, 2, 255]);
        let packed = settle(
            [Some("m.png"), Some("r.png"), Some("ao.png")],
            vec![("r.png", None), ("m.png", Some(metal)), ("ao.png", None)],
        );

        assert_eq!((packed.width, packed.height), (2, 2));
        for pixel in packed.pixels.chunks(4) {
            assert_eq!(pixel, [200, ROUGHNESS_DEFAULT, AO_DEFAULT, 255]);
        }
    }

    #[test]
    fn test_mismatched_channel_is_demoted() {
        let metal = ImageAsset::filled(2, 2, &[10]);
        let rough = ImageAsset::filled(4, 4, &[20]);
        let ao = ImageAsset::filled(2, 2, &[30]);
        let packed = settle(
            [Some("m"), Some("r"), Some("a")],
            vec![("m", Some(metal)), ("r", Some(rough)), ("a", Some(ao))],
        );

        assert_eq!(packed.pixels.len(), 2 * 2 * 4);
        assert_eq!(&packed.pixels[..4], &[10, ROUGHNESS_DEFAULT, 30, 255]);
    }

    #[test]
    fn test_reference_is_first_loaded_channel() {
        let rough = ImageAsset::filled(3, 1, &[50]);
        let ao = ImageAsset::filled(1, 1, &[60]);
        let packed = settle([None, Some("r"), Some("a")], vec![("a", Some(ao)), ("r", Some(rough))]);

        assert_eq!((packed.width, packed.height), (3, 1));
        assert_eq!(&packed.pixels[..4], &[METALLIC_DEFAULT, 50, AO_DEFAULT, 255]);
    }
}
