use audiohal::hal::*;

const SPEAKER_CONFIG: i32 = TopologyConfig::SPEAKER_PORT_ID;
const MIC_CONFIG: i32 = TopologyConfig::MIC_PORT_ID;

fn create_config(module: &mut Module, port_id: i32, format: AudioFormat, rate: u32) -> i32 {
    let flags = module.audio_port(port_id).unwrap().flags;
    let request = AudioPortConfig {
        port_id,
        format: Some(format),
        channel_mask: Some(ChannelLayout::stereo()),
        sample_rate: Some(rate),
        flags: Some(flags),
        ..Default::default()
    };
    let (config, applied) = module.set_audio_port_config(&request).unwrap();
    assert!(applied);
    config.id
}

fn primary_output_config(module: &mut Module) -> i32 {
    create_config(
        module,
        TopologyConfig::PRIMARY_OUTPUT_PORT_ID,
        AudioFormat::pcm(PcmType::Int16),
        48000,
    )
}

fn offload_config(module: &mut Module) -> i32 {
    create_config(
        module,
        TopologyConfig::COMPRESSED_OFFLOAD_PORT_ID,
        AudioFormat::encoded("audio/mpeg"),
        44100,
    )
}

fn patch(sources: Vec<i32>, sinks: Vec<i32>) -> AudioPatch {
    AudioPatch {
        source_port_config_ids: sources,
        sink_port_config_ids: sinks,
        ..Default::default()
    }
}

#[test]
fn test_create_patch() {
    let mut module = Module::null_primary();
    let mix = primary_output_config(&mut module);

    let created = module
        .set_audio_patch(&patch(vec![mix], vec![SPEAKER_CONFIG]))
        .unwrap();
    assert!(created.id > 0);
    assert_eq!(created.minimum_stream_buffer_size_frames, 16);
    assert_eq!(created.latencies_ms, vec![10]);
    assert_eq!(module.audio_patches(), &[created]);
}

#[test]
fn test_malformed_requests_leave_no_trace() {
    let mut module = Module::null_primary();
    let mix = primary_output_config(&mut module);

    let cases = vec![
        patch(vec![], vec![SPEAKER_CONFIG]),
        patch(vec![mix], vec![]),
        patch(vec![mix, mix], vec![SPEAKER_CONFIG]),
        patch(vec![mix], vec![SPEAKER_CONFIG, SPEAKER_CONFIG]),
        patch(vec![mix], vec![999]),
        patch(vec![999], vec![SPEAKER_CONFIG]),
    ];
    for request in cases {
        let err = module.set_audio_patch(&request).unwrap_err();
        assert!(err.is_invalid_argument(), "{:?} -> {}", request, err);
    }
    assert!(module.audio_patches().is_empty());

    // Patch config ids are still free to be reset
    module.reset_audio_port_config(mix).unwrap();
}

#[test]
fn test_patch_without_route_rejected() {
    let mut module = Module::null_primary();
    let err = module
        .set_audio_patch(&patch(vec![MIC_CONFIG], vec![SPEAKER_CONFIG]))
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_exclusive_sink_already_in_use() {
    let mut module = Module::null_primary();
    let mix = primary_output_config(&mut module);
    let offload = offload_config(&mut module);

    module
        .set_audio_patch(&patch(vec![mix], vec![SPEAKER_CONFIG]))
        .unwrap();

    let err = module
        .set_audio_patch(&patch(vec![offload], vec![SPEAKER_CONFIG]))
        .unwrap_err();
    assert!(err.is_illegal_state());
    assert_eq!(module.audio_patches().len(), 1);
}

#[test]
fn test_exclusive_sink_free_after_reset() {
    let mut module = Module::null_primary();
    let mix = primary_output_config(&mut module);
    let offload = offload_config(&mut module);

    let first = module
        .set_audio_patch(&patch(vec![mix], vec![SPEAKER_CONFIG]))
        .unwrap();
    module.reset_audio_patch(first.id).unwrap();

    let second = module
        .set_audio_patch(&patch(vec![offload], vec![SPEAKER_CONFIG]))
        .unwrap();
    assert_ne!(first.id, second.id);
}

#[test]
fn test_update_existing_patch() {
    let mut module = Module::null_primary();
    let mix = primary_output_config(&mut module);
    let other_mix = create_config(
        &mut module,
        TopologyConfig::PRIMARY_OUTPUT_PORT_ID,
        AudioFormat::pcm(PcmType::Int16),
        44100,
    );

    let created = module
        .set_audio_patch(&patch(vec![mix], vec![SPEAKER_CONFIG]))
        .unwrap();

    let mut update = patch(vec![other_mix], vec![SPEAKER_CONFIG]);
    update.id = created.id;
    let updated = module.set_audio_patch(&update).unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(module.audio_patches().len(), 1);
    assert_eq!(module.audio_patches()[0].source_port_config_ids, vec![other_mix]);

    // The replaced source is no longer patched
    module.reset_audio_port_config(mix).unwrap();
    assert!(module
        .reset_audio_port_config(other_mix)
        .unwrap_err()
        .is_illegal_state());
}

#[test]
fn test_failed_update_keeps_original_patch() {
    let mut module = Module::null_primary();
    let mix = primary_output_config(&mut module);
    let offload = offload_config(&mut module);

    let created = module
        .set_audio_patch(&patch(vec![mix], vec![SPEAKER_CONFIG]))
        .unwrap();

    // A second patch holding the speaker blocks the exclusive route
    let other_mix = create_config(
        &mut module,
        TopologyConfig::PRIMARY_OUTPUT_PORT_ID,
        AudioFormat::pcm(PcmType::Int16),
        44100,
    );
    module
        .set_audio_patch(&patch(vec![other_mix], vec![SPEAKER_CONFIG]))
        .unwrap();

    let mut update = patch(vec![offload], vec![SPEAKER_CONFIG]);
    update.id = created.id;
    assert!(module.set_audio_patch(&update).unwrap_err().is_illegal_state());

    let kept = module
        .audio_patches()
        .iter()
        .find(|p| p.id == created.id)
        .cloned()
        .unwrap();
    assert_eq!(kept, created);
    assert!(module.reset_audio_port_config(mix).unwrap_err().is_illegal_state());
}

#[test]
fn test_unknown_patch_ids() {
    let mut module = Module::null_primary();
    let mix = primary_output_config(&mut module);

    let mut update = patch(vec![mix], vec![SPEAKER_CONFIG]);
    update.id = 42;
    assert!(module.set_audio_patch(&update).unwrap_err().is_invalid_argument());
    assert!(module.reset_audio_patch(42).unwrap_err().is_invalid_argument());
}
