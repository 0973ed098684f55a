use anyhow::Context;
use std::sync::Arc;
use tracing::debug;

use super::debug::ModuleDebug;
use super::device_manager::DeviceConnections;
use super::error::{illegal_state, invalid_argument, Result};
use super::patches::PatchRegistry;
use super::resolver;
use super::streams::{
    create_stream_descriptor, OpenInputStreamArgs, OpenInputStreamReturn, OpenOutputStreamArgs,
    OpenOutputStreamReturn, StreamHandle, StreamIn, StreamOut, StreamTable,
};
use super::topology::{ModuleLimits, PortGraph, TopologyConfig};
use super::traits::{DeviceProfileQuery, UnavailableProfileQuery};
use super::types::{
    find_by_id, position_by_id, AudioPatch, AudioPort, AudioPortConfig, AudioRoute, Direction,
    OutputFlag,
};

/// Audio HAL module: ports, port configs, patches, routes and open streams.
///
/// Every mutating operation either applies all of its changes or none of
/// them. Callers sharing a module across threads should go through
/// [`SharedModule`](super::shared::SharedModule).
pub struct Module {
    graph: PortGraph,
    patches: PatchRegistry,
    connections: DeviceConnections,
    streams: StreamTable,
    debug: ModuleDebug,
    limits: ModuleLimits,
    profile_query: Box<dyn DeviceProfileQuery>,
}

impl Module {
    /// Build a module from a static topology.
    ///
    /// Initial patches go through the same checks as [`Module::set_audio_patch`].
    pub fn new(topology: TopologyConfig) -> anyhow::Result<Self> {
        topology.validate()?;
        let graph = PortGraph::from_topology(&topology);
        let mut patches = PatchRegistry::new();
        for patch in &topology.patches {
            patches
                .restore(patch, &graph.port_configs, &graph.routes, &topology.limits)
                .with_context(|| format!("Invalid initial patch {}", patch.id))?;
        }

        Ok(Self {
            graph,
            patches,
            connections: DeviceConnections::new(),
            streams: StreamTable::new(),
            debug: ModuleDebug::default(),
            limits: topology.limits,
            profile_query: Box::new(UnavailableProfileQuery),
        })
    }

    /// Module backed by the built-in null primary topology
    pub fn null_primary() -> Self {
        let topology = TopologyConfig::null_primary();
        Self {
            graph: PortGraph::from_topology(&topology),
            patches: PatchRegistry::new(),
            connections: DeviceConnections::new(),
            streams: StreamTable::new(),
            debug: ModuleDebug::default(),
            limits: topology.limits,
            profile_query: Box::new(UnavailableProfileQuery),
        }
    }

    /// Replace the hardware profile discovery backend
    pub fn with_profile_query(mut self, query: impl DeviceProfileQuery + 'static) -> Self {
        self.profile_query = Box::new(query);
        self
    }

    pub fn limits(&self) -> &ModuleLimits {
        &self.limits
    }

    pub fn audio_ports(&self) -> &[AudioPort] {
        debug!("returning {} ports", self.graph.ports.len());
        &self.graph.ports
    }

    pub fn audio_port(&self, port_id: i32) -> Result<&AudioPort> {
        find_by_id(&self.graph.ports, port_id)
            .ok_or_else(|| invalid_argument!("port id {} not found", port_id))
    }

    pub fn audio_port_configs(&self) -> &[AudioPortConfig] {
        debug!("returning {} port configs", self.graph.port_configs.len());
        &self.graph.port_configs
    }

    pub fn audio_patches(&self) -> &[AudioPatch] {
        debug!("returning {} patches", self.patches.patches().len());
        self.patches.patches()
    }

    pub fn audio_routes(&self) -> &[AudioRoute] {
        debug!("returning {} routes", self.graph.routes.len());
        &self.graph.routes
    }

    /// Routes having `port_id` as their sink or one of their sources
    pub fn audio_routes_for_port(&self, port_id: i32) -> Result<Vec<AudioRoute>> {
        self.audio_port(port_id)?;
        Ok(self
            .graph
            .routes
            .iter()
            .filter(|route| route.touches(port_id))
            .cloned()
            .collect())
    }

    pub fn connected_device_ports(&self) -> Vec<i32> {
        self.connections.connected_port_ids().collect()
    }

    pub fn has_stream(&self, port_config_id: i32) -> bool {
        self.streams.has_stream(port_config_id)
    }

    /// Create or update a port config.
    ///
    /// Returns the suggested config and whether it was applied. A config is
    /// created only from a valid, fully specified request; an existing one is
    /// updated from any valid request.
    pub fn set_audio_port_config(
        &mut self,
        requested: &AudioPortConfig,
    ) -> Result<(AudioPortConfig, bool)> {
        debug!("requested port config {:?}", requested);
        let existing = if requested.id != 0 {
            let pos = position_by_id(&self.graph.port_configs, requested.id).ok_or_else(|| {
                invalid_argument!("existing port config id {} not found", requested.id)
            })?;
            Some(pos)
        } else {
            None
        };

        let port_id = match existing {
            Some(pos) => self.graph.port_configs[pos].port_id,
            None => requested.port_id,
        };
        if port_id == 0 {
            return Err(invalid_argument!("input port config does not specify portId"));
        }
        let port = find_by_id(&self.graph.ports, port_id).ok_or_else(|| {
            invalid_argument!("input port config points to non-existent portId {}", port_id)
        })?;

        let current = existing.map(|pos| &self.graph.port_configs[pos]);
        let resolution = resolver::resolve(requested, port, current)?;
        let applied = resolution.can_apply(existing.is_some());
        let mut suggested = resolution.suggested;

        match existing {
            Some(pos) if applied => {
                self.graph.port_configs[pos] = suggested.clone();
                debug!("updated port config {:?}", suggested);
            }
            None if applied => {
                suggested.id = self.graph.allocate_port_id()?;
                self.graph.port_configs.push(suggested.clone());
                debug!("created new port config {:?}", suggested);
            }
            _ => {
                debug!(
                    "not applied; existing config? {}; requested is valid? {}, fully specified? {}",
                    existing.is_some(),
                    resolution.valid,
                    resolution.fully_specified
                );
            }
        }
        Ok((suggested, applied))
    }

    /// Restore a port config to its initial snapshot, or delete it if it has none
    pub fn reset_audio_port_config(&mut self, port_config_id: i32) -> Result<()> {
        let pos = position_by_id(&self.graph.port_configs, port_config_id)
            .ok_or_else(|| invalid_argument!("port config id {} not found", port_config_id))?;
        if self.streams.has_stream(port_config_id) {
            return Err(illegal_state!(
                "port config id {} has a stream opened on it",
                port_config_id
            ));
        }
        if let Some(patch_id) = self.patches.patch_using(port_config_id) {
            return Err(illegal_state!(
                "port config id {} is used by the patch with id {}",
                port_config_id,
                patch_id
            ));
        }

        match find_by_id(&self.graph.initial_configs, port_config_id).cloned() {
            None => {
                self.graph.port_configs.remove(pos);
                debug!("erased port config {}", port_config_id);
            }
            Some(initial) if self.graph.port_configs[pos] != initial => {
                self.graph.port_configs[pos] = initial;
                debug!("reset port config {}", port_config_id);
            }
            Some(_) => {}
        }
        Ok(())
    }

    pub fn set_audio_patch(&mut self, requested: &AudioPatch) -> Result<AudioPatch> {
        self.patches.set_patch(
            requested,
            &self.graph.port_configs,
            &self.graph.routes,
            &self.limits,
        )
    }

    pub fn reset_audio_patch(&mut self, patch_id: i32) -> Result<()> {
        self.patches.reset_patch(patch_id)
    }

    /// Connect an external device using the template port named by `template.id`
    pub fn connect_external_device(&mut self, template: &AudioPort) -> Result<AudioPort> {
        self.connections.connect(
            &mut self.graph,
            template,
            self.debug.simulate_device_connections,
            self.profile_query.as_ref(),
        )
    }

    pub fn disconnect_external_device(&mut self, port_id: i32) -> Result<()> {
        self.connections.disconnect(&mut self.graph, port_id)
    }

    /// Config and port for a stream about to be opened on `port_config_id`
    fn find_port_for_new_stream(
        &self,
        port_config_id: i32,
    ) -> Result<(&AudioPortConfig, &AudioPort)> {
        let config = find_by_id(&self.graph.port_configs, port_config_id).ok_or_else(|| {
            invalid_argument!("existing port config id {} not found", port_config_id)
        })?;
        let port = find_by_id(&self.graph.ports, config.port_id).ok_or_else(|| {
            invalid_argument!(
                "port id {} used by port config id {} not found",
                config.port_id,
                port_config_id
            )
        })?;
        self.streams.check_admission(config, port)?;
        Ok((config, port))
    }

    pub fn open_input_stream(&mut self, args: OpenInputStreamArgs) -> Result<OpenInputStreamReturn> {
        debug!(
            "port config id {}, buffer size {} frames",
            args.port_config_id, args.buffer_size_frames
        );
        let (config, port) = self.find_port_for_new_stream(args.port_config_id)?;
        if !Direction::Input.matches(&port.flags) {
            return Err(invalid_argument!(
                "port config id {} does not correspond to an input mix port",
                args.port_config_id
            ));
        }
        let desc = create_stream_descriptor(config, args.buffer_size_frames, &self.limits)?;
        let port_id = port.id;

        let stream = Arc::new(StreamIn {
            port_config_id: args.port_config_id,
            sink_metadata: args.sink_metadata,
        });
        self.streams
            .insert(port_id, args.port_config_id, StreamHandle::In(stream.clone()));
        Ok(OpenInputStreamReturn { desc, stream })
    }

    pub fn open_output_stream(
        &mut self,
        args: OpenOutputStreamArgs,
    ) -> Result<OpenOutputStreamReturn> {
        debug!(
            "port config id {}, has offload info? {}, buffer size {} frames",
            args.port_config_id,
            args.offload_info.is_some(),
            args.buffer_size_frames
        );
        let (config, port) = self.find_port_for_new_stream(args.port_config_id)?;
        if !Direction::Output.matches(&port.flags) {
            return Err(invalid_argument!(
                "port config id {} does not correspond to an output mix port",
                args.port_config_id
            ));
        }
        if port.flags.has_output_flag(OutputFlag::CompressOffload) && args.offload_info.is_none() {
            return Err(invalid_argument!(
                "port id {} has COMPRESS_OFFLOAD flag set, requires offload info",
                port.id
            ));
        }
        let desc = create_stream_descriptor(config, args.buffer_size_frames, &self.limits)?;
        let port_id = port.id;

        let stream = Arc::new(StreamOut {
            port_config_id: args.port_config_id,
            source_metadata: args.source_metadata,
            offload_info: args.offload_info,
        });
        self.streams
            .insert(port_id, args.port_config_id, StreamHandle::Out(stream.clone()));
        Ok(OpenOutputStreamReturn { desc, stream })
    }

    /// Unregister the stream opened on `port_config_id`
    pub fn close_stream(&mut self, port_config_id: i32) -> Result<()> {
        match self.streams.remove(port_config_id) {
            Some(_) => {
                debug!("closed stream on port config {}", port_config_id);
                Ok(())
            }
            None => Err(invalid_argument!(
                "port config id {} has no stream opened on it",
                port_config_id
            )),
        }
    }

    pub fn module_debug(&self) -> ModuleDebug {
        self.debug
    }

    pub fn set_module_debug(&mut self, requested: ModuleDebug) -> Result<()> {
        debug!("old flags: {:?}, new flags: {:?}", self.debug, requested);
        if self.debug.changes_simulation(&requested) && !self.connections.is_empty() {
            return Err(illegal_state!(
                "attempting to change device connections simulation while having external devices connected"
            ));
        }
        self.debug = requested;
        Ok(())
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::null_primary()
    }
}
