use serde::{Deserialize, Serialize};

/// Debug switches of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleDebug {
    /// Connect external devices without querying hardware for their profiles
    #[serde(default)]
    pub simulate_device_connections: bool,
}

impl ModuleDebug {
    pub fn simulated() -> Self {
        Self {
            simulate_device_connections: true,
        }
    }

    /// Whether switching to `target` changes device connection simulation
    pub fn changes_simulation(&self, target: &ModuleDebug) -> bool {
        self.simulate_device_connections != target.simulate_device_connections
    }
}
