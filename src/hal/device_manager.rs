use std::collections::BTreeSet;
use tracing::debug;

use super::error::{illegal_state, invalid_argument, Result};
use super::topology::PortGraph;
use super::traits::DeviceProfileQuery;
use super::types::{find_by_id, position_by_id, AudioPort, AudioRoute, PortExt};

/// Tracks device ports created for externally connected hardware
#[derive(Debug, Clone, Default)]
pub struct DeviceConnections {
    connected: BTreeSet<i32>,
}

impl DeviceConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self, port_id: i32) -> bool {
        self.connected.contains(&port_id)
    }

    pub fn is_empty(&self) -> bool {
        self.connected.is_empty()
    }

    pub fn connected_port_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.connected.iter().copied()
    }

    /// Create a device port from the template named by `request.id`.
    ///
    /// The new port copies the template, taking the device address and extra
    /// audio descriptors from `request`. Routes of the template are extended
    /// to the new port.
    pub fn connect(
        &mut self,
        graph: &mut PortGraph,
        request: &AudioPort,
        simulate: bool,
        query: &dyn DeviceProfileQuery,
    ) -> Result<AudioPort> {
        let template_id = request.id;
        let template = find_by_id(&graph.ports, template_id)
            .ok_or_else(|| invalid_argument!("port id {} not found", template_id))?;

        let PortExt::Device { device: template_device, .. } = &template.ext else {
            return Err(invalid_argument!("port id {} is not a device port", template_id));
        };
        if !template.profiles.is_empty() {
            return Err(invalid_argument!(
                "port id {} does not have dynamic profiles",
                template_id
            ));
        }
        if template_device.kind.connection.is_empty() {
            return Err(invalid_argument!("port id {} is permanently attached", template_id));
        }

        // Postpone id allocation until there are no client errors.
        let mut connected_port = template.clone();
        connected_port.extra_audio_descriptors = request.extra_audio_descriptors.clone();
        let address = match &request.ext {
            PortExt::Device { device, .. } => device.address.clone(),
            PortExt::Unspecified => Default::default(),
            PortExt::Mix { .. } => {
                return Err(invalid_argument!(
                    "connection request for port id {} carries mix port data",
                    template_id
                ));
            }
        };
        if let PortExt::Device { device, .. } = &mut connected_port.ext {
            device.address = address;
        }
        let device = connected_port
            .ext
            .device()
            .cloned()
            .ok_or_else(|| invalid_argument!("port id {} is not a device port", template_id))?;
        debug!("device port {} device set to {:?}", template_id, device);

        for connected_id in &self.connected {
            let same_device = find_by_id(&graph.ports, *connected_id)
                .and_then(|port| port.ext.device())
                .is_some_and(|existing| *existing == device);
            if same_device {
                return Err(illegal_state!(
                    "device {:?} is already connected at the device port id {}",
                    device,
                    connected_id
                ));
            }
        }

        let queried = if simulate {
            None
        } else {
            match query.query_device_profiles(&device) {
                Some(profiles) => Some(profiles),
                None => {
                    return Err(illegal_state!(
                        "failed to query supported device profiles via {}",
                        query.query_id()
                    ));
                }
            }
        };

        connected_port.id = graph.allocate_port_id()?;
        self.connected.insert(connected_port.id);
        debug!(
            template_id,
            port_id = connected_port.id,
            "external device connected"
        );
        if let Some(profiles) = queried {
            connected_port.profiles = profiles;
        } else if let Some(profiles) = graph.connected_profiles.get(&template_id) {
            connected_port.profiles = profiles.clone();
        }
        graph.ports.push(connected_port.clone());

        extend_routes(&mut graph.routes, template_id, connected_port.id);
        Ok(connected_port)
    }

    /// Remove a connected device port and every route edge to it
    pub fn disconnect(&mut self, graph: &mut PortGraph, port_id: i32) -> Result<()> {
        let pos = position_by_id(&graph.ports, port_id)
            .ok_or_else(|| invalid_argument!("port id {} not found", port_id))?;
        if !graph.ports[pos].ext.is_device() {
            return Err(invalid_argument!("port id {} is not a device port", port_id));
        }
        if !self.connected.contains(&port_id) {
            return Err(invalid_argument!(
                "port id {} is not a connected device port",
                port_id
            ));
        }

        // Configs provided by the client must be reset first.
        let customized = graph.port_configs.iter().find(|config| {
            config.port_id == port_id
                && find_by_id(&graph.initial_configs, config.id) != Some(*config)
        });
        if let Some(config) = customized {
            return Err(illegal_state!(
                "port id {} has a non-default config with id {}",
                port_id,
                config.id
            ));
        }

        graph.ports.remove(pos);
        graph.port_configs.retain(|config| config.port_id != port_id);
        graph.initial_configs.retain(|config| config.port_id != port_id);
        self.connected.remove(&port_id);
        debug!(port_id, "connected device port released");

        prune_routes(&mut graph.routes, port_id);
        Ok(())
    }
}

/// Mirror every route of `template_id` onto `port_id`
fn extend_routes(routes: &mut Vec<AudioRoute>, template_id: i32, port_id: i32) {
    let mut new_routes = Vec::new();
    for route in routes.iter_mut() {
        if route.sink_port_id == template_id {
            new_routes.push(AudioRoute {
                source_port_ids: route.source_port_ids.clone(),
                sink_port_id: port_id,
                is_exclusive: route.is_exclusive,
            });
        } else if route.has_source(template_id) {
            route.source_port_ids.push(port_id);
        }
    }
    routes.extend(new_routes);
}

/// Drop routes ending at `port_id` and strip it from all source lists.
///
/// Source lists never become empty: the template id stays in them.
fn prune_routes(routes: &mut Vec<AudioRoute>, port_id: i32) {
    routes.retain(|route| route.sink_port_id != port_id);
    for route in routes.iter_mut() {
        route.source_port_ids.retain(|&src| src != port_id);
    }
}
