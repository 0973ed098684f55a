use serde::{Deserialize, Serialize};

use super::format::{AudioFormat, ChannelLayout};

/// Output flag bit positions, used as `1 << flag`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFlag {
    Direct = 0,
    Primary = 1,
    Fast = 2,
    DeepBuffer = 3,
    CompressOffload = 4,
    NonBlocking = 5,
    HwAvSync = 6,
}

impl OutputFlag {
    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Direction and I/O flags of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", content = "bits", rename_all = "snake_case")]
pub enum IoFlags {
    Input(u32),
    Output(u32),
}

impl IoFlags {
    pub fn is_input(&self) -> bool {
        matches!(self, IoFlags::Input(_))
    }

    pub fn is_output(&self) -> bool {
        matches!(self, IoFlags::Output(_))
    }

    pub fn has_output_flag(&self, flag: OutputFlag) -> bool {
        matches!(self, IoFlags::Output(bits) if bits & flag.bit() != 0)
    }
}

/// Direction a stream is opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn matches(&self, flags: &IoFlags) -> bool {
        match self {
            Direction::Input => flags.is_input(),
            Direction::Output => flags.is_output(),
        }
    }
}

/// Kind of physical endpoint a device port represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    InDefault,
    InMicrophone,
    InDevice,
    InHeadset,
    InSubmix,
    OutDefault,
    OutSpeaker,
    OutDevice,
    OutHeadset,
    OutSubmix,
}

/// Device type plus the connection it is reached through.
///
/// An empty `connection` means the device is permanently attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescription {
    pub kind: DeviceKind,
    #[serde(default)]
    pub connection: String,
}

/// Connection types used by the built-in topology
pub mod connection {
    pub const USB: &str = "usb";
}

/// Address of a concrete device instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DeviceAddress {
    #[default]
    None,
    Id(String),
    Mac([u8; 6]),
    /// ALSA card and device numbers
    Alsa(Vec<i32>),
}

/// Identity of a physical device: type and address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioDevice {
    #[serde(rename = "type")]
    pub kind: DeviceDescription,
    #[serde(default)]
    pub address: DeviceAddress,
}

/// Device port flag bits
pub mod device_flags {
    pub const DEFAULT_DEVICE: u32 = 1 << 0;
}

/// Kind-specific extension data of a port or port config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PortExt {
    #[default]
    Unspecified,
    Device {
        device: AudioDevice,
        #[serde(default)]
        flags: u32,
    },
    Mix {
        #[serde(default)]
        handle: i32,
        /// 0 means unbounded
        #[serde(default)]
        max_open_stream_count: u32,
        #[serde(default)]
        max_active_stream_count: u32,
    },
}

impl PortExt {
    pub fn is_device(&self) -> bool {
        matches!(self, PortExt::Device { .. })
    }

    pub fn device(&self) -> Option<&AudioDevice> {
        match self {
            PortExt::Device { device, .. } => Some(device),
            _ => None,
        }
    }
}

/// Format plus the channel masks and sample rates supported with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioProfile {
    #[serde(default)]
    pub name: String,
    pub format: AudioFormat,
    pub channel_masks: Vec<ChannelLayout>,
    pub sample_rates: Vec<u32>,
}

/// Raw descriptor reported by an external device (e.g. EDID short audio descriptor)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraAudioDescriptor {
    pub standard: String,
    pub descriptor: Vec<u8>,
}

/// An audio endpoint: mix port or device port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPort {
    pub id: i32,
    pub name: String,
    /// Empty on a device port means the profiles are dynamic
    #[serde(default)]
    pub profiles: Vec<AudioProfile>,
    pub flags: IoFlags,
    pub ext: PortExt,
    #[serde(default)]
    pub extra_audio_descriptors: Vec<ExtraAudioDescriptor>,
}

impl AudioPort {
    /// Profile matching `format`, if the port supports it
    pub fn find_profile(&self, format: &AudioFormat) -> Option<&AudioProfile> {
        self.profiles.iter().find(|profile| &profile.format == format)
    }
}

/// Gain applied to a port config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GainConfig {
    pub index: i32,
    /// Gain in millibels, one value per channel
    pub values: Vec<i32>,
    #[serde(default)]
    pub ramp_duration_ms: i32,
}

/// Concrete configuration of a port.
///
/// `id == 0` asks the module to create a new config. Unset optional fields
/// leave the choice to the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AudioPortConfig {
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub port_id: i32,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub channel_mask: Option<ChannelLayout>,
    #[serde(default)]
    pub format: Option<AudioFormat>,
    #[serde(default)]
    pub gain: Option<GainConfig>,
    #[serde(default)]
    pub flags: Option<IoFlags>,
    #[serde(default)]
    pub ext: PortExt,
}

/// Connection between source and sink port configs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AudioPatch {
    #[serde(default)]
    pub id: i32,
    pub source_port_config_ids: Vec<i32>,
    pub sink_port_config_ids: Vec<i32>,
    #[serde(default)]
    pub minimum_stream_buffer_size_frames: i32,
    /// One entry per sink
    #[serde(default)]
    pub latencies_ms: Vec<i32>,
}

/// Allowed connection from a set of source ports to one sink port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRoute {
    pub source_port_ids: Vec<i32>,
    pub sink_port_id: i32,
    #[serde(default)]
    pub is_exclusive: bool,
}

impl AudioRoute {
    pub fn has_source(&self, port_id: i32) -> bool {
        self.source_port_ids.contains(&port_id)
    }

    pub fn touches(&self, port_id: i32) -> bool {
        self.sink_port_id == port_id || self.has_source(port_id)
    }
}

/// Anything stored in the module's flat id-keyed tables
pub trait HasId {
    fn id(&self) -> i32;
}

impl HasId for AudioPort {
    fn id(&self) -> i32 {
        self.id
    }
}

impl HasId for AudioPortConfig {
    fn id(&self) -> i32 {
        self.id
    }
}

impl HasId for AudioPatch {
    fn id(&self) -> i32 {
        self.id
    }
}

pub fn find_by_id<T: HasId>(items: &[T], id: i32) -> Option<&T> {
    items.iter().find(|item| item.id() == id)
}

pub fn position_by_id<T: HasId>(items: &[T], id: i32) -> Option<usize> {
    items.iter().position(|item| item.id() == id)
}

/// Looks up every id, collecting the ones that are missing
pub fn select_by_ids<'a, T: HasId>(items: &'a [T], ids: &[i32]) -> (Vec<&'a T>, Vec<i32>) {
    let mut found = Vec::with_capacity(ids.len());
    let mut missing = Vec::new();
    for &id in ids {
        match find_by_id(items, id) {
            Some(item) => found.push(item),
            None => missing.push(id),
        }
    }
    (found, missing)
}

/// True when no id appears twice
pub fn all_unique(ids: &[i32]) -> bool {
    let mut seen = std::collections::BTreeSet::new();
    ids.iter().all(|id| seen.insert(*id))
}
