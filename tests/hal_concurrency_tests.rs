use audiohal::hal::*;
use std::collections::BTreeSet;

fn create_config(module: &SharedModule, port_id: i32, format: AudioFormat) -> i32 {
    let flags = module.audio_port(port_id).unwrap().flags;
    let request = AudioPortConfig {
        port_id,
        format: Some(format),
        channel_mask: Some(ChannelLayout::stereo()),
        sample_rate: Some(48000),
        flags: Some(flags),
        ..Default::default()
    };
    let (config, applied) = module.set_audio_port_config(&request).unwrap();
    assert!(applied);
    config.id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_one_exclusive_patch_wins() {
    let module = SharedModule::default();
    let sources: Vec<i32> = (0..2)
        .map(|_| {
            create_config(
                &module,
                TopologyConfig::COMPRESSED_OFFLOAD_PORT_ID,
                AudioFormat::encoded("audio/mpeg"),
            )
        })
        .collect();

    for _ in 0..20 {
        let mut handles = Vec::new();
        for &source in &sources {
            let module = module.clone();
            handles.push(tokio::spawn(async move {
                module.set_audio_patch(&AudioPatch {
                    source_port_config_ids: vec![source],
                    sink_port_config_ids: vec![TopologyConfig::SPEAKER_PORT_ID],
                    ..Default::default()
                })
            }));
        }

        let mut created = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(patch) => created.push(patch),
                Err(err) => assert!(err.is_illegal_state()),
            }
        }
        assert_eq!(created.len(), 1);
        assert_eq!(module.audio_patches(), created);

        module.reset_audio_patch(created[0].id).unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_config_creation_allocates_unique_ids() {
    let module = SharedModule::default();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let module = module.clone();
        handles.push(tokio::spawn(async move {
            create_config(
                &module,
                TopologyConfig::PRIMARY_INPUT_PORT_ID,
                AudioFormat::pcm(PcmType::Int16),
            )
        }));
    }

    let mut ids = BTreeSet::new();
    for handle in handles {
        assert!(ids.insert(handle.await.unwrap()));
    }
    assert_eq!(ids.len(), 16);
    assert_eq!(module.audio_port_configs().len(), 18);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stream_opens_respect_port_limit() {
    let module = SharedModule::default();
    let configs: Vec<i32> = (0..6)
        .map(|_| {
            create_config(
                &module,
                TopologyConfig::PRIMARY_INPUT_PORT_ID,
                AudioFormat::pcm(PcmType::Int16),
            )
        })
        .collect();

    let mut handles = Vec::new();
    for config in configs {
        let module = module.clone();
        handles.push(tokio::spawn(async move {
            module.open_input_stream(OpenInputStreamArgs {
                port_config_id: config,
                sink_metadata: StreamMetadata::default(),
                buffer_size_frames: 480,
            })
        }));
    }

    let mut opened = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => opened += 1,
            Err(err) => assert!(err.is_illegal_state()),
        }
    }
    // Primary input allows two open streams
    assert_eq!(opened, 2);
}
