//! Resource kinds

use core::fmt;

/// Selects the handler that owns a resource
///
/// Raw values below 128 are reserved for built-in kinds; `Custom` carries
/// user-defined kinds in the 128..=255 range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Text,
    Binary,
    Texture,
    Material,
    Shader,
    StaticMesh,
    SkeletalMesh,
    BitmapFont,
    SystemFont,
    Scene,
    HeightmapTerrain,
    VoxelTerrain,
    Audio,
    /// User extension kind (raw value >= 128)
    Custom(u8),
}

impl ResourceKind {
    /// First raw value available to user kinds
    pub const CUSTOM_START: u8 = 128;

    /// Create a user kind, `None` if the value is in the reserved range
    pub const fn custom(value: u8) -> Option<Self> {
        if value >= Self::CUSTOM_START {
            Some(Self::Custom(value))
        } else {
            None
        }
    }

    /// Raw numeric value
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::Text => 0,
            Self::Binary => 1,
            Self::Texture => 2,
            Self::Material => 3,
            Self::Shader => 4,
            Self::StaticMesh => 5,
            Self::SkeletalMesh => 6,
            Self::BitmapFont => 7,
            Self::SystemFont => 8,
            Self::Scene => 9,
            Self::HeightmapTerrain => 10,
            Self::VoxelTerrain => 11,
            Self::Audio => 12,
            Self::Custom(v) => *v,
        }
    }

    /// Parse a raw value
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Text,
            1 => Self::Binary,
            2 => Self::Texture,
            3 => Self::Material,
            4 => Self::Shader,
            5 => Self::StaticMesh,
            6 => Self::SkeletalMesh,
            7 => Self::BitmapFont,
            8 => Self::SystemFont,
            9 => Self::Scene,
            10 => Self::HeightmapTerrain,
            11 => Self::VoxelTerrain,
            12 => Self::Audio,
            v if v >= Self::CUSTOM_START => Self::Custom(v),
            _ => return None,
        })
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Texture => "texture",
            Self::Material => "material",
            Self::Shader => "shader",
            Self::StaticMesh => "static mesh",
            Self::SkeletalMesh => "skeletal mesh",
            Self::BitmapFont => "bitmap font",
            Self::SystemFont => "system font",
            Self::Scene => "scene",
            Self::HeightmapTerrain => "heightmap terrain",
            Self::VoxelTerrain => "voxel terrain",
            Self::Audio => "audio",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(v) => write!(f, "custom({})", v),
            other => f.write_str(other.label()),
        }
    }
}
