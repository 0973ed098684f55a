use std::collections::{BTreeMap, BTreeSet};

use super::types::{find_by_id, AudioPatch, AudioPortConfig};

/// Reverse index from port config id or port id to the patches using it.
///
/// Ports and port configs share one id space, so a single map answers both
/// "is this config patched" and "is this port patched".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchIndex {
    entries: BTreeMap<i32, BTreeSet<i32>>,
}

impl PatchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add entries for every source and sink config of `patch`, and for each
    /// config's port when its id differs from the config id.
    pub fn register(&mut self, patch: &AudioPatch, configs: &[AudioPortConfig]) {
        let ids = patch
            .source_port_config_ids
            .iter()
            .chain(&patch.sink_port_config_ids);
        for &config_id in ids {
            if let Some(config) = find_by_id(configs, config_id) {
                self.insert(config_id, patch.id);
                if config.port_id != config_id {
                    self.insert(config.port_id, patch.id);
                }
            }
        }
    }

    fn insert(&mut self, key: i32, patch_id: i32) {
        self.entries.entry(key).or_default().insert(patch_id);
    }

    /// Drop every entry pointing at `patch_id`
    pub fn remove_patch(&mut self, patch_id: i32) {
        self.entries.retain(|_, patches| {
            patches.remove(&patch_id);
            !patches.is_empty()
        });
    }

    pub fn is_used(&self, id: i32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Lowest patch id using `id`, if any
    pub fn first_patch_for(&self, id: i32) -> Option<i32> {
        self.entries.get(&id).and_then(|patches| patches.iter().next().copied())
    }

    pub fn patches_for(&self, id: i32) -> impl Iterator<Item = i32> + '_ {
        self.entries.get(&id).into_iter().flatten().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
