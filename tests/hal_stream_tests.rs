use audiohal::hal::*;

fn input_config(module: &mut Module, mask: ChannelLayout, rate: u32) -> i32 {
    let request = AudioPortConfig {
        port_id: TopologyConfig::PRIMARY_INPUT_PORT_ID,
        format: Some(AudioFormat::pcm(PcmType::Int16)),
        channel_mask: Some(mask),
        sample_rate: Some(rate),
        flags: Some(IoFlags::Input(0)),
        ..Default::default()
    };
    let (config, applied) = module.set_audio_port_config(&request).unwrap();
    assert!(applied);
    config.id
}

fn offload_config(module: &mut Module) -> i32 {
    let port = module
        .audio_port(TopologyConfig::COMPRESSED_OFFLOAD_PORT_ID)
        .unwrap()
        .clone();
    let request = AudioPortConfig {
        port_id: port.id,
        format: Some(AudioFormat::encoded("audio/mpeg")),
        channel_mask: Some(ChannelLayout::stereo()),
        sample_rate: Some(48000),
        flags: Some(port.flags),
        ..Default::default()
    };
    let (config, applied) = module.set_audio_port_config(&request).unwrap();
    assert!(applied);
    config.id
}

fn input_args(port_config_id: i32, buffer_size_frames: i64) -> OpenInputStreamArgs {
    OpenInputStreamArgs {
        port_config_id,
        sink_metadata: StreamMetadata::default(),
        buffer_size_frames,
    }
}

fn output_args(port_config_id: i32, offload_info: Option<OffloadInfo>) -> OpenOutputStreamArgs {
    OpenOutputStreamArgs {
        port_config_id,
        source_metadata: StreamMetadata {
            tracks: vec![TrackMetadata {
                usage: "media".to_string(),
                content_type: "music".to_string(),
                gain: 1.0,
            }],
        },
        offload_info,
        buffer_size_frames: 1024,
    }
}

fn mp3_offload_info() -> OffloadInfo {
    OffloadInfo {
        format: AudioFormat::encoded("audio/mpeg"),
        channel_mask: ChannelLayout::stereo(),
        sample_rate: 48000,
        bit_rate_kbps: 320,
        duration_us: 180_000_000,
        is_streaming: false,
    }
}

#[test]
fn test_open_input_stream() {
    let mut module = Module::null_primary();
    let config = input_config(&mut module, ChannelLayout::mono(), 16000);

    let opened = module.open_input_stream(input_args(config, 320)).unwrap();
    assert_eq!(opened.desc.frame_size_bytes, 2);
    assert_eq!(opened.desc.buffer_size_frames, 320);
    assert_eq!(opened.stream.port_config_id, config);
    assert!(module.has_stream(config));
}

#[test]
fn test_buffer_size_bounds() {
    let mut module = Module::null_primary();
    let config = input_config(&mut module, ChannelLayout::stereo(), 48000);

    for frames in [0, -1, 15, 1 << 30, i64::MAX] {
        let err = module.open_input_stream(input_args(config, frames)).unwrap_err();
        assert!(err.is_invalid_argument(), "{} frames -> {}", frames, err);
    }
    assert!(!module.has_stream(config));

    // 1 MiB of 4-byte frames
    module.open_input_stream(input_args(config, 262_144)).unwrap();
}

#[test]
fn test_one_stream_per_config() {
    let mut module = Module::null_primary();
    let config = input_config(&mut module, ChannelLayout::stereo(), 48000);

    module.open_input_stream(input_args(config, 480)).unwrap();
    let err = module.open_input_stream(input_args(config, 480)).unwrap_err();
    assert!(err.is_illegal_state());
}

#[test]
fn test_per_port_stream_limit() {
    let mut module = Module::null_primary();
    let first = input_config(&mut module, ChannelLayout::stereo(), 48000);
    let second = input_config(&mut module, ChannelLayout::mono(), 16000);
    let third = input_config(&mut module, ChannelLayout::mono(), 8000);

    module.open_input_stream(input_args(first, 480)).unwrap();
    module.open_input_stream(input_args(second, 480)).unwrap();
    let err = module.open_input_stream(input_args(third, 480)).unwrap_err();
    assert!(err.is_illegal_state());

    module.close_stream(first).unwrap();
    module.open_input_stream(input_args(third, 480)).unwrap();
}

#[test]
fn test_direction_must_match() {
    let mut module = Module::null_primary();
    let config = input_config(&mut module, ChannelLayout::stereo(), 48000);

    let err = module.open_output_stream(output_args(config, None)).unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(!module.has_stream(config));
}

#[test]
fn test_streams_only_on_mix_ports() {
    let mut module = Module::null_primary();
    let err = module
        .open_output_stream(output_args(TopologyConfig::SPEAKER_PORT_ID, None))
        .unwrap_err();
    assert!(err.is_invalid_argument());

    let err = module.open_input_stream(input_args(999, 480)).unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_offload_requires_offload_info() {
    let mut module = Module::null_primary();
    let config = offload_config(&mut module);

    let err = module.open_output_stream(output_args(config, None)).unwrap_err();
    assert!(err.is_invalid_argument());

    let opened = module
        .open_output_stream(output_args(config, Some(mp3_offload_info())))
        .unwrap();
    assert_eq!(opened.stream.offload_info, Some(mp3_offload_info()));
    // Compressed data is sized in bytes
    assert_eq!(opened.desc.frame_size_bytes, 1);
}

#[test]
fn test_close_stream_releases_config() {
    let mut module = Module::null_primary();
    let config = input_config(&mut module, ChannelLayout::stereo(), 48000);
    module.open_input_stream(input_args(config, 480)).unwrap();

    module.close_stream(config).unwrap();
    assert!(!module.has_stream(config));
    assert!(module.close_stream(config).unwrap_err().is_invalid_argument());
    module.reset_audio_port_config(config).unwrap();
}
