use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::error::{illegal_state, HalError};
use super::format::{AudioFormat, ChannelLayout, PcmType};
use super::types::{
    connection, device_flags, AudioDevice, AudioPatch, AudioPort, AudioPortConfig, AudioProfile,
    AudioRoute, DeviceAddress, DeviceDescription, DeviceKind, IoFlags, OutputFlag, PortExt,
};

/// Fixed sizing constants applied to patches and streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleLimits {
    #[serde(default = "default_minimum_stream_buffer_size_frames")]
    pub minimum_stream_buffer_size_frames: i32,
    #[serde(default = "default_maximum_stream_buffer_size_bytes")]
    pub maximum_stream_buffer_size_bytes: usize,
    /// Latency reported for every sink of a patch
    #[serde(default = "default_latency_ms")]
    pub latency_ms: i32,
}

fn default_minimum_stream_buffer_size_frames() -> i32 {
    16
}

fn default_maximum_stream_buffer_size_bytes() -> usize {
    1024 * 1024
}

fn default_latency_ms() -> i32 {
    10
}

impl Default for ModuleLimits {
    fn default() -> Self {
        Self {
            minimum_stream_buffer_size_frames: default_minimum_stream_buffer_size_frames(),
            maximum_stream_buffer_size_bytes: default_maximum_stream_buffer_size_bytes(),
            latency_ms: default_latency_ms(),
        }
    }
}

/// Static topology file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub version: String,
    pub ports: Vec<AudioPort>,
    /// Initial port configs, restored on reset
    #[serde(default)]
    pub port_configs: Vec<AudioPortConfig>,
    #[serde(default)]
    pub routes: Vec<AudioRoute>,
    #[serde(default)]
    pub patches: Vec<AudioPatch>,
    /// Profiles attached to a device port when it is connected, keyed by template port id
    #[serde(default)]
    pub connected_profiles: BTreeMap<i32, Vec<AudioProfile>>,
    #[serde(default)]
    pub limits: ModuleLimits,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self::null_primary()
    }
}

fn pcm16_profile(channel_masks: Vec<ChannelLayout>, sample_rates: Vec<u32>) -> AudioProfile {
    AudioProfile {
        name: String::new(),
        format: AudioFormat::pcm(PcmType::Int16),
        channel_masks,
        sample_rates,
    }
}

fn device_port(id: i32, name: &str, flags: IoFlags, kind: DeviceKind, conn: &str) -> AudioPort {
    AudioPort {
        id,
        name: name.to_string(),
        profiles: Vec::new(),
        flags,
        ext: PortExt::Device {
            device: AudioDevice {
                kind: DeviceDescription {
                    kind,
                    connection: conn.to_string(),
                },
                address: DeviceAddress::None,
            },
            flags: 0,
        },
        extra_audio_descriptors: Vec::new(),
    }
}

fn mix_port(id: i32, name: &str, flags: IoFlags, max_open_stream_count: u32) -> AudioPort {
    AudioPort {
        id,
        name: name.to_string(),
        profiles: Vec::new(),
        flags,
        ext: PortExt::Mix {
            handle: id,
            max_open_stream_count,
            max_active_stream_count: max_open_stream_count,
        },
        extra_audio_descriptors: Vec::new(),
    }
}

impl TopologyConfig {
    pub const SPEAKER_PORT_ID: i32 = 1;
    pub const MIC_PORT_ID: i32 = 2;
    pub const PRIMARY_OUTPUT_PORT_ID: i32 = 3;
    pub const COMPRESSED_OFFLOAD_PORT_ID: i32 = 4;
    pub const PRIMARY_INPUT_PORT_ID: i32 = 5;
    pub const USB_OUT_TEMPLATE_ID: i32 = 6;
    pub const USB_IN_TEMPLATE_ID: i32 = 7;

    /// Built-in topology used when no configuration file is supplied.
    ///
    /// Attached speaker and microphone, primary output/input mixes, a
    /// compressed offload mix, and USB out/in templates with dynamic profiles.
    pub fn null_primary() -> Self {
        let standard_rates = vec![8000, 11025, 16000, 32000, 44100, 48000];

        let mut speaker = device_port(
            Self::SPEAKER_PORT_ID,
            "Speaker",
            IoFlags::Output(0),
            DeviceKind::OutSpeaker,
            "",
        );
        speaker.profiles = vec![pcm16_profile(vec![ChannelLayout::stereo()], vec![44100, 48000])];
        speaker.ext = PortExt::Device {
            device: AudioDevice {
                kind: DeviceDescription {
                    kind: DeviceKind::OutSpeaker,
                    connection: String::new(),
                },
                address: DeviceAddress::None,
            },
            flags: device_flags::DEFAULT_DEVICE,
        };

        let mut mic = device_port(
            Self::MIC_PORT_ID,
            "Built-In Mic",
            IoFlags::Input(0),
            DeviceKind::InMicrophone,
            "",
        );
        mic.profiles = vec![pcm16_profile(
            vec![ChannelLayout::mono(), ChannelLayout::stereo()],
            standard_rates.clone(),
        )];

        let mut primary_output = mix_port(
            Self::PRIMARY_OUTPUT_PORT_ID,
            "primary output",
            IoFlags::Output(OutputFlag::Primary.bit()),
            1,
        );
        primary_output.profiles =
            vec![pcm16_profile(vec![ChannelLayout::stereo()], vec![44100, 48000])];

        let mut compressed_offload = mix_port(
            Self::COMPRESSED_OFFLOAD_PORT_ID,
            "compressed offload",
            IoFlags::Output(
                OutputFlag::Direct.bit()
                    | OutputFlag::CompressOffload.bit()
                    | OutputFlag::NonBlocking.bit(),
            ),
            1,
        );
        compressed_offload.profiles = vec![AudioProfile {
            name: String::new(),
            format: AudioFormat::encoded("audio/mpeg"),
            channel_masks: vec![ChannelLayout::stereo()],
            sample_rates: vec![44100, 48000],
        }];

        let mut primary_input = mix_port(
            Self::PRIMARY_INPUT_PORT_ID,
            "primary input",
            IoFlags::Input(0),
            2,
        );
        primary_input.profiles = vec![pcm16_profile(
            vec![ChannelLayout::mono(), ChannelLayout::stereo()],
            standard_rates,
        )];

        let usb_out = device_port(
            Self::USB_OUT_TEMPLATE_ID,
            "USB Out",
            IoFlags::Output(0),
            DeviceKind::OutDevice,
            connection::USB,
        );
        let usb_in = device_port(
            Self::USB_IN_TEMPLATE_ID,
            "USB In",
            IoFlags::Input(0),
            DeviceKind::InDevice,
            connection::USB,
        );

        let ports = vec![
            speaker,
            mic,
            primary_output,
            compressed_offload,
            primary_input,
            usb_out,
            usb_in,
        ];

        // Attached devices get an initial config sharing the port's id.
        let port_configs = ports
            .iter()
            .filter(|p| p.ext.is_device() && !p.profiles.is_empty())
            .filter_map(|p| {
                let profile = p.profiles.first()?;
                Some(AudioPortConfig {
                    id: p.id,
                    port_id: p.id,
                    sample_rate: profile.sample_rates.first().copied(),
                    channel_mask: profile.channel_masks.first().copied(),
                    format: Some(profile.format.clone()),
                    gain: None,
                    flags: Some(p.flags),
                    ext: p.ext.clone(),
                })
            })
            .collect();

        let routes = vec![
            AudioRoute {
                source_port_ids: vec![Self::PRIMARY_OUTPUT_PORT_ID],
                sink_port_id: Self::SPEAKER_PORT_ID,
                is_exclusive: false,
            },
            AudioRoute {
                source_port_ids: vec![Self::COMPRESSED_OFFLOAD_PORT_ID],
                sink_port_id: Self::SPEAKER_PORT_ID,
                is_exclusive: true,
            },
            AudioRoute {
                source_port_ids: vec![Self::PRIMARY_OUTPUT_PORT_ID],
                sink_port_id: Self::USB_OUT_TEMPLATE_ID,
                is_exclusive: false,
            },
            AudioRoute {
                source_port_ids: vec![Self::MIC_PORT_ID, Self::USB_IN_TEMPLATE_ID],
                sink_port_id: Self::PRIMARY_INPUT_PORT_ID,
                is_exclusive: false,
            },
        ];

        let usb_profiles = vec![
            pcm16_profile(
                vec![ChannelLayout::mono(), ChannelLayout::stereo()],
                vec![44100, 48000],
            ),
            AudioProfile {
                name: String::new(),
                format: AudioFormat::pcm(PcmType::Int24),
                channel_masks: vec![ChannelLayout::stereo()],
                sample_rates: vec![48000],
            },
        ];
        let mut connected_profiles = BTreeMap::new();
        connected_profiles.insert(Self::USB_OUT_TEMPLATE_ID, usb_profiles.clone());
        connected_profiles.insert(Self::USB_IN_TEMPLATE_ID, usb_profiles);

        Self {
            version: "1.0".to_string(),
            ports,
            port_configs,
            routes,
            patches: Vec::new(),
            connected_profiles,
            limits: ModuleLimits::default(),
        }
    }

    /// Check referential integrity of the topology
    pub fn validate(&self) -> Result<()> {
        let mut ids = BTreeSet::new();
        for port in &self.ports {
            if port.id <= 0 {
                bail!("Port '{}' has non-positive id {}", port.name, port.id);
            }
            if !ids.insert(port.id) {
                bail!("Duplicate port id {}", port.id);
            }
        }
        let port_ids: BTreeSet<i32> = ids.clone();

        let mut config_ids = BTreeSet::new();
        for config in &self.port_configs {
            if config.id <= 0 {
                bail!("Port config for port {} has non-positive id {}", config.port_id, config.id);
            }
            if !port_ids.contains(&config.port_id) {
                bail!("Port config {} references unknown port {}", config.id, config.port_id);
            }
            // A config may share its id with its own port, nothing else.
            if config.id != config.port_id && !ids.insert(config.id) {
                bail!("Port config id {} collides with another id", config.id);
            }
            if !config_ids.insert(config.id) {
                bail!("Duplicate port config id {}", config.id);
            }
        }

        for route in &self.routes {
            if route.source_port_ids.is_empty() {
                bail!("Route to sink port {} has no sources", route.sink_port_id);
            }
            if !port_ids.contains(&route.sink_port_id) {
                bail!("Route references unknown sink port {}", route.sink_port_id);
            }
            if let Some(id) = route.source_port_ids.iter().find(|id| !port_ids.contains(id)) {
                bail!(
                    "Route to sink port {} references unknown source port {}",
                    route.sink_port_id,
                    id
                );
            }
        }

        let mut patch_ids = BTreeSet::new();
        for patch in &self.patches {
            if patch.id <= 0 || !patch_ids.insert(patch.id) {
                bail!("Patch id {} is invalid or duplicated", patch.id);
            }
            if patch.source_port_config_ids.is_empty() || patch.sink_port_config_ids.is_empty() {
                bail!("Patch {} has an empty source or sink list", patch.id);
            }
            let all = patch.source_port_config_ids.iter().chain(&patch.sink_port_config_ids);
            for id in all {
                if !config_ids.contains(id) {
                    bail!("Patch {} references unknown port config {}", patch.id, id);
                }
            }
        }

        for template_id in self.connected_profiles.keys() {
            match self.ports.iter().find(|p| p.id == *template_id) {
                Some(port) if port.ext.is_device() => {}
                Some(_) => bail!("Connected profiles target non-device port {}", template_id),
                None => bail!("Connected profiles target unknown port {}", template_id),
            }
        }

        if self.limits.minimum_stream_buffer_size_frames <= 0 {
            bail!("Minimum stream buffer size must be positive");
        }

        self.next_port_id()?;
        self.next_patch_id()?;
        Ok(())
    }

    /// Highest id in the shared port/port config id space
    fn last_port_id(&self) -> i32 {
        let max_port = self.ports.iter().map(|p| p.id).max().unwrap_or(0);
        let max_config = self.port_configs.iter().map(|c| c.id).max().unwrap_or(0);
        max_port.max(max_config)
    }

    /// Next free id in the shared port/port config id space
    pub fn next_port_id(&self) -> Result<i32> {
        let last = self.last_port_id();
        match last.checked_add(1) {
            Some(id) => Ok(id),
            None => bail!("Port id {} leaves no room for new ports or port configs", last),
        }
    }

    pub fn next_patch_id(&self) -> Result<i32> {
        let last = self.patches.iter().map(|p| p.id).max().unwrap_or(0);
        match last.checked_add(1) {
            Some(id) => Ok(id),
            None => bail!("Patch id {} leaves no room for new patches", last),
        }
    }
}

/// Mutable port/config/route tables built from a [`TopologyConfig`]
#[derive(Debug, Clone)]
pub struct PortGraph {
    pub ports: Vec<AudioPort>,
    pub port_configs: Vec<AudioPortConfig>,
    /// Snapshots restored by a config reset
    pub initial_configs: Vec<AudioPortConfig>,
    pub routes: Vec<AudioRoute>,
    pub connected_profiles: BTreeMap<i32, Vec<AudioProfile>>,
    last_port_id: i32,
}

impl PortGraph {
    pub fn from_topology(topology: &TopologyConfig) -> Self {
        Self {
            ports: topology.ports.clone(),
            port_configs: topology.port_configs.clone(),
            initial_configs: topology.port_configs.clone(),
            routes: topology.routes.clone(),
            connected_profiles: topology.connected_profiles.clone(),
            last_port_id: topology.last_port_id(),
        }
    }

    /// Fresh id in the shared port/port config id space
    pub fn allocate_port_id(&mut self) -> Result<i32, HalError> {
        let id = self.last_port_id.checked_add(1).ok_or_else(|| {
            illegal_state!("no port ids left after {}", self.last_port_id)
        })?;
        self.last_port_id = id;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_primary_is_valid() {
        let topology = TopologyConfig::null_primary();
        topology.validate().unwrap();
        assert_eq!(topology.ports.len(), 7);
        assert_eq!(topology.next_port_id().unwrap(), 8);
        assert_eq!(topology.next_patch_id().unwrap(), 1);
    }

    #[test]
    fn test_null_primary_attached_device_configs() {
        let topology = TopologyConfig::null_primary();
        let ids: Vec<i32> = topology.port_configs.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![TopologyConfig::SPEAKER_PORT_ID, TopologyConfig::MIC_PORT_ID]);
        assert!(topology.port_configs.iter().all(|c| c.id == c.port_id));
    }

    #[test]
    fn test_templates_have_dynamic_profiles() {
        let topology = TopologyConfig::null_primary();
        for id in [TopologyConfig::USB_OUT_TEMPLATE_ID, TopologyConfig::USB_IN_TEMPLATE_ID] {
            let port = topology.ports.iter().find(|p| p.id == id).unwrap();
            assert!(port.profiles.is_empty());
            assert!(topology.connected_profiles.contains_key(&id));
        }
    }

    #[test]
    fn test_validate_rejects_dangling_route() {
        let mut topology = TopologyConfig::null_primary();
        topology.routes.push(AudioRoute {
            source_port_ids: vec![42],
            sink_port_id: TopologyConfig::SPEAKER_PORT_ID,
            is_exclusive: false,
        });
        assert!(topology.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_config_for_unknown_port() {
        let mut topology = TopologyConfig::null_primary();
        topology.port_configs.push(AudioPortConfig {
            id: 20,
            port_id: 99,
            ..Default::default()
        });
        assert!(topology.validate().is_err());
    }

    #[test]
    fn test_port_graph_allocates_after_topology_ids() {
        let topology = TopologyConfig::null_primary();
        let mut graph = PortGraph::from_topology(&topology);
        assert_eq!(graph.allocate_port_id().unwrap(), 8);
        assert_eq!(graph.allocate_port_id().unwrap(), 9);
        assert_eq!(graph.initial_configs, graph.port_configs);
    }

    #[test]
    fn test_limits_defaults_from_empty_json() {
        let limits: ModuleLimits = serde_json::from_str("{}").unwrap();
        assert_eq!(limits, ModuleLimits::default());
        assert_eq!(limits.minimum_stream_buffer_size_frames, 16);
        assert_eq!(limits.maximum_stream_buffer_size_bytes, 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_exhausted_id_space() {
        let mut topology = TopologyConfig::null_primary();
        topology.ports.push(mix_port(i32::MAX, "last", IoFlags::Output(0), 0));
        assert!(topology.next_port_id().is_err());
        assert!(topology.validate().is_err());
    }

    #[test]
    fn test_allocation_fails_when_ids_run_out() {
        let mut topology = TopologyConfig::null_primary();
        topology.ports.push(mix_port(i32::MAX - 1, "almost last", IoFlags::Output(0), 0));
        let mut graph = PortGraph::from_topology(&topology);

        assert_eq!(graph.allocate_port_id().unwrap(), i32::MAX);
        assert!(graph.allocate_port_id().unwrap_err().is_illegal_state());
    }
}
