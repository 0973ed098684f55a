pub mod debug;
pub mod device_manager;
pub mod error;
pub mod format;
pub mod module;
pub mod patch_index;
pub mod patches;
pub mod resolver;
pub mod shared;
pub mod storage;
pub mod streams;
pub mod topology;
pub mod traits;
pub mod types;

pub use debug::ModuleDebug;
pub use error::{HalError, Result};
pub use format::{AudioFormat, ChannelLayout, PcmType};
pub use module::Module;
pub use shared::SharedModule;
pub use storage::TopologyStorage;
pub use streams::{
    OffloadInfo, OpenInputStreamArgs, OpenInputStreamReturn, OpenOutputStreamArgs,
    OpenOutputStreamReturn, StreamDescriptor, StreamMetadata, TrackMetadata,
};
pub use topology::{ModuleLimits, TopologyConfig};
pub use traits::{DeviceProfileQuery, UnavailableProfileQuery};
pub use types::{
    AudioDevice, AudioPatch, AudioPort, AudioPortConfig, AudioProfile, AudioRoute, DeviceAddress,
    DeviceDescription, DeviceKind, ExtraAudioDescriptor, GainConfig, IoFlags, OutputFlag, PortExt,
};
