use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::debug::ModuleDebug;
use super::error::Result;
use super::module::Module;
use super::streams::{
    OpenInputStreamArgs, OpenInputStreamReturn, OpenOutputStreamArgs, OpenOutputStreamReturn,
};
use super::topology::TopologyConfig;
use super::types::{AudioPatch, AudioPort, AudioPortConfig, AudioRoute};

/// Cloneable handle serializing access to one [`Module`].
///
/// Each operation holds the lock for its whole duration, so concurrent
/// callers observe operations as if they ran one after another.
#[derive(Clone)]
pub struct SharedModule {
    inner: Arc<RwLock<Module>>,
}

impl SharedModule {
    pub fn new(module: Module) -> Self {
        Self {
            inner: Arc::new(RwLock::new(module)),
        }
    }

    pub fn from_topology(topology: TopologyConfig) -> anyhow::Result<Self> {
        Ok(Self::new(Module::new(topology)?))
    }

    fn read(&self) -> RwLockReadGuard<'_, Module> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Module> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn audio_ports(&self) -> Vec<AudioPort> {
        self.read().audio_ports().to_vec()
    }

    pub fn audio_port(&self, port_id: i32) -> Result<AudioPort> {
        self.read().audio_port(port_id).cloned()
    }

    pub fn audio_port_configs(&self) -> Vec<AudioPortConfig> {
        self.read().audio_port_configs().to_vec()
    }

    pub fn set_audio_port_config(
        &self,
        requested: &AudioPortConfig,
    ) -> Result<(AudioPortConfig, bool)> {
        self.write().set_audio_port_config(requested)
    }

    pub fn reset_audio_port_config(&self, port_config_id: i32) -> Result<()> {
        self.write().reset_audio_port_config(port_config_id)
    }

    pub fn audio_patches(&self) -> Vec<AudioPatch> {
        self.read().audio_patches().to_vec()
    }

    pub fn set_audio_patch(&self, requested: &AudioPatch) -> Result<AudioPatch> {
        self.write().set_audio_patch(requested)
    }

    pub fn reset_audio_patch(&self, patch_id: i32) -> Result<()> {
        self.write().reset_audio_patch(patch_id)
    }

    pub fn audio_routes(&self) -> Vec<AudioRoute> {
        self.read().audio_routes().to_vec()
    }

    pub fn audio_routes_for_port(&self, port_id: i32) -> Result<Vec<AudioRoute>> {
        self.read().audio_routes_for_port(port_id)
    }

    pub fn connect_external_device(&self, template: &AudioPort) -> Result<AudioPort> {
        self.write().connect_external_device(template)
    }

    pub fn disconnect_external_device(&self, port_id: i32) -> Result<()> {
        self.write().disconnect_external_device(port_id)
    }

    pub fn open_input_stream(&self, args: OpenInputStreamArgs) -> Result<OpenInputStreamReturn> {
        self.write().open_input_stream(args)
    }

    pub fn open_output_stream(&self, args: OpenOutputStreamArgs) -> Result<OpenOutputStreamReturn> {
        self.write().open_output_stream(args)
    }

    pub fn close_stream(&self, port_config_id: i32) -> Result<()> {
        self.write().close_stream(port_config_id)
    }

    pub fn module_debug(&self) -> ModuleDebug {
        self.read().module_debug()
    }

    pub fn set_module_debug(&self, requested: ModuleDebug) -> Result<()> {
        self.write().set_module_debug(requested)
    }
}

impl Default for SharedModule {
    fn default() -> Self {
        Self::new(Module::null_primary())
    }
}
