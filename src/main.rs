use audiohal::hal::{
    AudioFormat, AudioPatch, AudioPortConfig, ChannelLayout, ModuleDebug, OpenOutputStreamArgs,
    PcmType, SharedModule, StreamMetadata, TopologyConfig, TopologyStorage,
};
use tracing_subscriber::EnvFilter;

fn pcm16_stereo_48k(port_id: i32, module: &SharedModule) -> anyhow::Result<AudioPortConfig> {
    let port = module.audio_port(port_id)?;
    Ok(AudioPortConfig {
        port_id,
        format: Some(AudioFormat::pcm(PcmType::Int16)),
        channel_mask: Some(ChannelLayout::stereo()),
        sample_rate: Some(48000),
        flags: Some(port.flags),
        ..Default::default()
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("Audio HAL module demo");
    println!("=====================\n");

    let topology = match std::env::args().nth(1) {
        Some(path) => TopologyStorage::new(path).load()?,
        None => TopologyConfig::null_primary(),
    };
    let module = SharedModule::from_topology(topology)?;

    println!("Ports:");
    for port in module.audio_ports() {
        println!("  [{}] {} ({:?})", port.id, port.name, port.flags);
    }

    module.set_module_debug(ModuleDebug::simulated())?;
    let template = module.audio_port(TopologyConfig::USB_OUT_TEMPLATE_ID)?;
    let usb = module.connect_external_device(&template)?;
    println!("\nConnected USB output as port {}", usb.id);

    let mix_request = pcm16_stereo_48k(TopologyConfig::PRIMARY_OUTPUT_PORT_ID, &module)?;
    let (mix_config, _) = module.set_audio_port_config(&mix_request)?;
    let usb_request = pcm16_stereo_48k(usb.id, &module)?;
    let (usb_config, _) = module.set_audio_port_config(&usb_request)?;
    println!("Port configs: mix {}, device {}", mix_config.id, usb_config.id);

    let patch = module.set_audio_patch(&AudioPatch {
        source_port_config_ids: vec![mix_config.id],
        sink_port_config_ids: vec![usb_config.id],
        ..Default::default()
    })?;
    println!(
        "Patch {}: minimum buffer {} frames, latencies {:?} ms",
        patch.id, patch.minimum_stream_buffer_size_frames, patch.latencies_ms
    );

    let opened = module.open_output_stream(OpenOutputStreamArgs {
        port_config_id: mix_config.id,
        source_metadata: StreamMetadata::default(),
        offload_info: None,
        buffer_size_frames: 960,
    })?;
    println!(
        "Output stream open: {} frames of {} bytes",
        opened.desc.buffer_size_frames, opened.desc.frame_size_bytes
    );

    module.close_stream(mix_config.id)?;
    module.reset_audio_patch(patch.id)?;
    module.reset_audio_port_config(usb_config.id)?;
    module.reset_audio_port_config(mix_config.id)?;
    module.disconnect_external_device(usb.id)?;
    println!("\nTorn down; {} ports remain", module.audio_ports().len());

    Ok(())
}
