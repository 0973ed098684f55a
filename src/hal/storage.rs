use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::topology::TopologyConfig;

/// Loads and persists the static topology as JSON
pub struct TopologyStorage {
    path: PathBuf,
}

impl TopologyStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the topology file
    pub fn load(&self) -> Result<TopologyConfig> {
        let json = fs::read_to_string(&self.path)
            .context(format!("Failed to read topology from {:?}", self.path))?;

        let topology: TopologyConfig = serde_json::from_str(&json)
            .context("Failed to parse topology JSON")?;

        topology
            .validate()
            .context(format!("Invalid topology in {:?}", self.path))?;

        debug!(
            ports = topology.ports.len(),
            routes = topology.routes.len(),
            "loaded topology from {:?}",
            self.path
        );
        Ok(topology)
    }

    /// Load the topology file, falling back to the built-in topology when absent
    pub fn load_or_default(&self) -> Result<TopologyConfig> {
        if !self.path.exists() {
            info!("no topology at {:?}, using built-in null primary", self.path);
            return Ok(TopologyConfig::null_primary());
        }
        self.load()
    }

    /// Write the topology, replacing the file atomically
    pub fn save(&self, topology: &TopologyConfig) -> Result<()> {
        topology.validate().context("Refusing to save invalid topology")?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .context("Failed to create topology directory")?;
            }
        }

        let json = serde_json::to_string_pretty(topology)
            .context("Failed to serialize topology")?;

        // Write to temporary file first
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json)
            .context(format!("Failed to write topology to {:?}", temp_path))?;

        fs::rename(&temp_path, &self.path)
            .context("Failed to atomically update topology file")?;

        Ok(())
    }
}
