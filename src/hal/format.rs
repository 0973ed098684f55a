use serde::{Deserialize, Serialize};
use std::fmt;

/// PCM sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PcmType {
    UInt8,    // 8-bit unsigned
    Int16,    // 16-bit PCM
    Int32,    // 32-bit integer
    FixedQ8_24,
    Float32,  // 32-bit float
    Int24,    // packed 3 bytes
}

impl PcmType {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            PcmType::UInt8 => 1,
            PcmType::Int16 => 2,
            PcmType::Int32 => 4,
            PcmType::FixedQ8_24 => 4,
            PcmType::Float32 => 4,
            PcmType::Int24 => 3,
        }
    }
}

/// Audio data format of a profile or port config
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AudioFormat {
    /// Linear PCM samples
    Pcm { pcm: PcmType },
    /// Compressed or otherwise opaque data, identified by MIME type
    NonPcm { encoding: String },
}

impl AudioFormat {
    pub fn pcm(pcm: PcmType) -> Self {
        AudioFormat::Pcm { pcm }
    }

    pub fn encoded(encoding: impl Into<String>) -> Self {
        AudioFormat::NonPcm {
            encoding: encoding.into(),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioFormat::Pcm { pcm } => write!(f, "PCM {:?}", pcm),
            AudioFormat::NonPcm { encoding } => write!(f, "{}", encoding),
        }
    }
}

/// Channel layout bit positions
pub mod channel {
    pub const FRONT_LEFT: u32 = 1 << 0;
    pub const FRONT_RIGHT: u32 = 1 << 1;
    pub const FRONT_CENTER: u32 = 1 << 2;
    pub const LOW_FREQUENCY: u32 = 1 << 3;
    pub const BACK_LEFT: u32 = 1 << 4;
    pub const BACK_RIGHT: u32 = 1 << 5;

    pub const LAYOUT_MONO: u32 = FRONT_LEFT;
    pub const LAYOUT_STEREO: u32 = FRONT_LEFT | FRONT_RIGHT;
    pub const LAYOUT_5POINT1: u32 =
        FRONT_LEFT | FRONT_RIGHT | FRONT_CENTER | LOW_FREQUENCY | BACK_LEFT | BACK_RIGHT;
}

/// Channel mask of a profile or port config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "mask", rename_all = "snake_case")]
pub enum ChannelLayout {
    None,
    Invalid,
    /// Channels addressed by index, no positional meaning
    IndexMask(u32),
    /// Positional channels, see [`channel`]
    LayoutMask(u32),
    VoiceMask(u32),
}

impl ChannelLayout {
    pub fn mono() -> Self {
        ChannelLayout::LayoutMask(channel::LAYOUT_MONO)
    }

    pub fn stereo() -> Self {
        ChannelLayout::LayoutMask(channel::LAYOUT_STEREO)
    }

    /// Number of channels, decoded from the mask's population count
    pub fn channel_count(&self) -> usize {
        match self {
            ChannelLayout::None | ChannelLayout::Invalid => 0,
            ChannelLayout::IndexMask(mask)
            | ChannelLayout::LayoutMask(mask)
            | ChannelLayout::VoiceMask(mask) => mask.count_ones() as usize,
        }
    }
}

/// Size of one frame in bytes.
///
/// Non-PCM formats always use a frame size of 1. Returns 0 when the layout
/// carries no channels, which callers treat as "cannot size a buffer".
pub fn frame_size_in_bytes(format: &AudioFormat, layout: &ChannelLayout) -> usize {
    match format {
        AudioFormat::Pcm { pcm } => pcm.bytes_per_sample() * layout.channel_count(),
        AudioFormat::NonPcm { .. } => 1,
    }
}
