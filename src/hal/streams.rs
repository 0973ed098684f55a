//! Stream admission: buffer sizing, per-port capacity and the open-stream table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::error::{illegal_state, invalid_argument, Result};
use super::format::{frame_size_in_bytes, AudioFormat, ChannelLayout};
use super::topology::ModuleLimits;
use super::types::{AudioPort, AudioPortConfig, PortExt};

/// Per-track metadata supplied by the client when opening a stream
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub usage: String,
    pub content_type: String,
    pub gain: f32,
}

/// Metadata of the tracks feeding into or out of a stream
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub tracks: Vec<TrackMetadata>,
}

/// Compressed stream parameters required by offload-capable outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffloadInfo {
    pub format: AudioFormat,
    pub channel_mask: ChannelLayout,
    pub sample_rate: u32,
    pub bit_rate_kbps: u32,
    pub duration_us: i64,
    pub is_streaming: bool,
}

/// Buffer geometry agreed for a new stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub frame_size_bytes: usize,
    pub buffer_size_frames: i64,
}

impl StreamDescriptor {
    pub fn buffer_size_bytes(&self) -> usize {
        self.frame_size_bytes * self.buffer_size_frames as usize
    }
}

/// Opaque handle of an input stream
#[derive(Debug)]
pub struct StreamIn {
    pub port_config_id: i32,
    pub sink_metadata: StreamMetadata,
}

/// Opaque handle of an output stream
#[derive(Debug)]
pub struct StreamOut {
    pub port_config_id: i32,
    pub source_metadata: StreamMetadata,
    pub offload_info: Option<OffloadInfo>,
}

#[derive(Debug, Clone)]
pub enum StreamHandle {
    In(Arc<StreamIn>),
    Out(Arc<StreamOut>),
}

#[derive(Debug, Clone)]
pub struct OpenInputStreamArgs {
    pub port_config_id: i32,
    pub sink_metadata: StreamMetadata,
    pub buffer_size_frames: i64,
}

#[derive(Debug, Clone)]
pub struct OpenInputStreamReturn {
    pub desc: StreamDescriptor,
    pub stream: Arc<StreamIn>,
}

#[derive(Debug, Clone)]
pub struct OpenOutputStreamArgs {
    pub port_config_id: i32,
    pub source_metadata: StreamMetadata,
    pub offload_info: Option<OffloadInfo>,
    pub buffer_size_frames: i64,
}

#[derive(Debug, Clone)]
pub struct OpenOutputStreamReturn {
    pub desc: StreamDescriptor,
    pub stream: Arc<StreamOut>,
}

#[derive(Debug, Clone)]
struct OpenStream {
    port_id: i32,
    handle: StreamHandle,
}

/// Streams currently open, keyed by port config id
#[derive(Debug, Clone, Default)]
pub struct StreamTable {
    streams: BTreeMap<i32, OpenStream>,
}

impl StreamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_stream(&self, port_config_id: i32) -> bool {
        self.streams.contains_key(&port_config_id)
    }

    /// Number of open streams on configs of `port_id`
    pub fn count_for_port(&self, port_id: i32) -> usize {
        self.streams.values().filter(|s| s.port_id == port_id).count()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn insert(&mut self, port_id: i32, port_config_id: i32, handle: StreamHandle) {
        self.streams.insert(port_config_id, OpenStream { port_id, handle });
    }

    pub fn remove(&mut self, port_config_id: i32) -> Option<StreamHandle> {
        self.streams.remove(&port_config_id).map(|s| s.handle)
    }

    /// Check that a new stream may be opened on `config`, owned by `port`
    pub fn check_admission(&self, config: &AudioPortConfig, port: &AudioPort) -> Result<()> {
        if self.has_stream(config.id) {
            return Err(illegal_state!(
                "port config id {} already has a stream opened on it",
                config.id
            ));
        }
        let PortExt::Mix { max_open_stream_count, .. } = &port.ext else {
            return Err(invalid_argument!(
                "port config id {} does not correspond to a mix port",
                config.id
            ));
        };
        let max_open_stream_count = *max_open_stream_count;
        if max_open_stream_count != 0
            && self.count_for_port(port.id) >= max_open_stream_count as usize
        {
            return Err(illegal_state!(
                "port id {} has already reached maximum allowed opened stream count: {}",
                port.id,
                max_open_stream_count
            ));
        }
        Ok(())
    }
}

/// Size the stream buffer for `config`, rejecting sizes outside `limits`
pub fn create_stream_descriptor(
    config: &AudioPortConfig,
    buffer_size_frames: i64,
    limits: &ModuleLimits,
) -> Result<StreamDescriptor> {
    if buffer_size_frames <= 0 {
        return Err(invalid_argument!(
            "non-positive buffer size {}",
            buffer_size_frames
        ));
    }
    let minimum = i64::from(limits.minimum_stream_buffer_size_frames);
    if buffer_size_frames < minimum {
        return Err(invalid_argument!(
            "insufficient buffer size {}, must be at least {}",
            buffer_size_frames,
            minimum
        ));
    }

    let frame_size = match (&config.format, &config.channel_mask) {
        (Some(format), Some(mask)) => frame_size_in_bytes(format, mask),
        _ => 0,
    };
    if frame_size == 0 {
        return Err(invalid_argument!(
            "could not calculate frame size for port config {}",
            config.id
        ));
    }
    debug!("frame size {} bytes", frame_size);

    // Divide instead of multiplying so huge requests cannot overflow.
    let max_bytes = limits.maximum_stream_buffer_size_bytes;
    let frames = u64::try_from(buffer_size_frames).unwrap_or(u64::MAX);
    if frame_size as u64 > max_bytes as u64 / frames {
        return Err(invalid_argument!(
            "buffer size {} frames is too large, maximum size is {}",
            buffer_size_frames,
            max_bytes / frame_size
        ));
    }

    Ok(StreamDescriptor {
        frame_size_bytes: frame_size,
        buffer_size_frames,
    })
}
