//! Audio clip resources
//!
//! Clips are RIFF/WAVE files holding PCM or IEEE float samples. Only the
//! header is interpreted; sample bytes are kept as stored.

use void_resource::{
    AssetError, AssetKind, Name, RequestInfo, Resource, ResourceHandler, ResourceKind, ResourceResult,
    ResourceSystem,
};

use crate::common::load_then;

const FORMAT_PCM: u16 = 1;
const FORMAT_FLOAT: u16 = 3;

/// Sample encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    Pcm,
    Float,
}

/// Payload of an audio resource
#[derive(Clone, Debug, PartialEq)]
pub struct AudioClip {
    pub format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Interleaved sample bytes
    pub samples: Vec<u8>,
}

impl AudioClip {
    /// Bytes in one frame across all channels
    pub fn frame_size(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    pub fn frame_count(&self) -> usize {
        match self.frame_size() {
            0 => 0,
            size => self.samples.len() / size,
        }
    }

    /// Playback length in seconds
    pub fn duration(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f32 / self.sample_rate as f32
    }
}

fn u16_at(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn u32_at(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

/// Parse a RIFF/WAVE file
pub fn parse_wav(name: &Name, bytes: &[u8]) -> Result<AudioClip, AssetError> {
    let decode = |message: &str| AssetError::Decode {
        name: name.clone(),
        message: message.to_string(),
    };

    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(decode("not a RIFF/WAVE file"));
    }

    let mut format = None;
    let mut samples = None;
    let mut at = 12;
    while at + 8 <= bytes.len() {
        let id = &bytes[at..at + 4];
        let size = u32_at(bytes, at + 4).ok_or_else(|| decode("truncated chunk header"))? as usize;
        let body = at + 8;
        let end = body.checked_add(size).filter(|&e| e <= bytes.len());

        match id {
            b"fmt " => {
                let end = end.ok_or_else(|| decode("truncated fmt chunk"))?;
                if size < 16 {
                    return Err(decode("fmt chunk too short"));
                }
                let chunk = &bytes[body..end];
                let tag = u16_at(chunk, 0).ok_or_else(|| decode("truncated fmt chunk"))?;
                let sample_format = match tag {
                    FORMAT_PCM => SampleFormat::Pcm,
                    FORMAT_FLOAT => SampleFormat::Float,
                    other => return Err(decode(&format!("unsupported format tag {}", other))),
                };
                let channels = u16_at(chunk, 2).ok_or_else(|| decode("truncated fmt chunk"))?;
                let sample_rate = u32_at(chunk, 4).ok_or_else(|| decode("truncated fmt chunk"))?;
                let bits = u16_at(chunk, 14).ok_or_else(|| decode("truncated fmt chunk"))?;
                if channels == 0 || bits == 0 || bits % 8 != 0 {
                    return Err(decode("invalid channel count or sample width"));
                }
                format = Some((sample_format, channels, sample_rate, bits));
            }
            b"data" => {
                let end = end.ok_or_else(|| decode("truncated data chunk"))?;
                samples = Some(bytes[body..end].to_vec());
            }
            _ => {}
        }

        // Chunks are padded to an even length
        at = body.saturating_add(size).saturating_add(size & 1);
    }

    let (format, channels, sample_rate, bits_per_sample) = format.ok_or_else(|| decode("missing fmt chunk"))?;
    let samples = samples.ok_or_else(|| decode("missing data chunk"))?;
    Ok(AudioClip {
        format,
        channels,
        sample_rate,
        bits_per_sample,
        samples,
    })
}

/// Loads WAVE clips from binary assets
#[derive(Default)]
pub struct AudioHandler;

impl AudioHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceHandler for AudioHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Audio
    }

    fn request(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        info: RequestInfo,
    ) -> ResourceResult<()> {
        info.expect_assets(resource.name(), 1)?;
        let mut asset = info.assets[0].clone();
        asset.kind = AssetKind::Binary;

        load_then(system, resource, asset, info.synchronous, |_, resource, loaded| {
            let name = loaded.name.clone();
            let clip = parse_wav(&name, &loaded.into_bytes()?)?;
            log::debug!(
                "Audio {}: {} ch, {} Hz, {:.2}s",
                resource.name(),
                clip.channels,
                clip.sample_rate,
                clip.duration()
            );
            resource.set_payload(clip);
            resource.mark_loaded();
            Ok(())
        })
    }

    fn release(&mut self, _system: &mut ResourceSystem, resource: &mut Resource) {
        resource.take_payload::<AudioClip>();
    }
}

#[cfg(test)]
pub(crate) fn wav_bytes(channels: u16, sample_rate: u32, bits: u16, samples: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(4 + 8 + 16 + 8 + samples.len() as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    let block = channels * bits / 8;
    out.extend_from_slice(&(sample_rate * block as u32).to_le_bytes());
    out.extend_from_slice(&block.to_le_bytes());
    out.extend_from_slice(&bits.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    out.extend_from_slice(samples);
    out
}
