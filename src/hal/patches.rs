use std::collections::BTreeMap;
use tracing::debug;

use super::error::{illegal_state, invalid_argument, Result};
use super::patch_index::PatchIndex;
use super::topology::ModuleLimits;
use super::types::{
    all_unique, find_by_id, position_by_id, select_by_ids, AudioPatch, AudioPortConfig, AudioRoute,
};

/// Active patches plus the reverse index used for exclusivity and teardown checks
#[derive(Debug, Clone, Default)]
pub struct PatchRegistry {
    patches: Vec<AudioPatch>,
    index: PatchIndex,
    last_patch_id: i32,
}

/// Sink port id -> whether a non-exclusive route to it is available
type AllowedSinks = BTreeMap<i32, bool>;

fn allowed_sink_ports(sources: &[&AudioPortConfig], routes: &[AudioRoute]) -> AllowedSinks {
    let mut allowed = AllowedSinks::new();
    for source in sources {
        for route in routes.iter().filter(|r| r.has_source(source.port_id)) {
            let non_exclusive = allowed.entry(route.sink_port_id).or_insert(false);
            // prefer non-exclusive
            if !*non_exclusive {
                *non_exclusive = !route.is_exclusive;
            }
        }
    }
    allowed
}

/// List, lookup and route checks shared by every way a patch enters the registry
fn check_request(
    requested: &AudioPatch,
    configs: &[AudioPortConfig],
    routes: &[AudioRoute],
) -> Result<AllowedSinks> {
    if requested.source_port_config_ids.is_empty() {
        return Err(invalid_argument!("requested patch has empty sources list"));
    }
    if !all_unique(&requested.source_port_config_ids) {
        return Err(invalid_argument!(
            "requested patch has duplicate ids in the sources list: {:?}",
            requested.source_port_config_ids
        ));
    }
    if requested.sink_port_config_ids.is_empty() {
        return Err(invalid_argument!("requested patch has empty sinks list"));
    }
    if !all_unique(&requested.sink_port_config_ids) {
        return Err(invalid_argument!(
            "requested patch has duplicate ids in the sinks list: {:?}",
            requested.sink_port_config_ids
        ));
    }

    let (sources, missing) = select_by_ids(configs, &requested.source_port_config_ids);
    if !missing.is_empty() {
        return Err(invalid_argument!(
            "following source port config ids not found: {:?}",
            missing
        ));
    }
    let (sinks, missing) = select_by_ids(configs, &requested.sink_port_config_ids);
    if !missing.is_empty() {
        return Err(invalid_argument!(
            "following sink port config ids not found: {:?}",
            missing
        ));
    }

    let allowed = allowed_sink_ports(&sources, routes);
    if let Some(sink) = sinks.iter().find(|s| !allowed.contains_key(&s.port_id)) {
        return Err(invalid_argument!(
            "there is no route to the sink port id {}",
            sink.port_id
        ));
    }
    Ok(allowed)
}

fn with_derived_fields(requested: &AudioPatch, limits: &ModuleLimits) -> AudioPatch {
    let mut patch = requested.clone();
    patch.minimum_stream_buffer_size_frames = limits.minimum_stream_buffer_size_frames;
    patch.latencies_ms = vec![limits.latency_ms; patch.sink_port_config_ids.len()];
    patch
}

impl PatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patches(&self) -> &[AudioPatch] {
        &self.patches
    }

    pub fn index(&self) -> &PatchIndex {
        &self.index
    }

    /// If only an exclusive route reaches a sink, no other patch may use it
    fn check_exclusive(&self, allowed: &AllowedSinks) -> Result<()> {
        for (&sink_port_id, &non_exclusive) in allowed {
            if !non_exclusive && self.index.is_used(sink_port_id) {
                return Err(illegal_state!(
                    "sink port id {} is exclusive and is already used by some other patch",
                    sink_port_id
                ));
            }
        }
        Ok(())
    }

    fn allocate_patch_id(&mut self) -> Result<i32> {
        let id = self
            .last_patch_id
            .checked_add(1)
            .ok_or_else(|| illegal_state!("no patch ids left after {}", self.last_patch_id))?;
        self.last_patch_id = id;
        Ok(id)
    }

    /// Create a patch (`requested.id == 0`) or replace an existing one
    pub fn set_patch(
        &mut self,
        requested: &AudioPatch,
        configs: &[AudioPortConfig],
        routes: &[AudioRoute],
        limits: &ModuleLimits,
    ) -> Result<AudioPatch> {
        debug!("requested patch {:?}", requested);
        let allowed = check_request(requested, configs, routes)?;

        let mut patch = with_derived_fields(requested, limits);
        if requested.id == 0 {
            self.check_exclusive(&allowed)?;
            patch.id = self.allocate_patch_id()?;
            self.patches.push(patch.clone());
        } else {
            let pos = position_by_id(&self.patches, requested.id).ok_or_else(|| {
                invalid_argument!("not found existing patch id {}", requested.id)
            })?;
            let snapshot = self.index.clone();
            self.index.remove_patch(requested.id);
            if let Err(err) = self.check_exclusive(&allowed) {
                self.index = snapshot;
                return Err(err);
            }
            self.patches[pos] = patch.clone();
        }
        self.index.register(&patch, configs);
        debug!(patch_id = patch.id, "created or updated patch");
        Ok(patch)
    }

    /// Admit a patch that already carries its id, such as one from a topology file
    pub fn restore(
        &mut self,
        patch: &AudioPatch,
        configs: &[AudioPortConfig],
        routes: &[AudioRoute],
        limits: &ModuleLimits,
    ) -> Result<AudioPatch> {
        if patch.id <= 0 {
            return Err(invalid_argument!("patch id {} is not positive", patch.id));
        }
        if position_by_id(&self.patches, patch.id).is_some() {
            return Err(invalid_argument!("patch id {} is already in use", patch.id));
        }
        let allowed = check_request(patch, configs, routes)?;
        self.check_exclusive(&allowed)?;

        let restored = with_derived_fields(patch, limits);
        self.last_patch_id = self.last_patch_id.max(restored.id);
        self.patches.push(restored.clone());
        self.index.register(&restored, configs);
        debug!(patch_id = restored.id, "restored patch");
        Ok(restored)
    }

    /// Remove a patch and every index entry pointing at it
    pub fn reset_patch(&mut self, patch_id: i32) -> Result<()> {
        match position_by_id(&self.patches, patch_id) {
            Some(pos) => {
                self.index.remove_patch(patch_id);
                self.patches.remove(pos);
                debug!(patch_id, "erased patch");
                Ok(())
            }
            None => Err(invalid_argument!("patch id {} not found", patch_id)),
        }
    }

    pub fn get(&self, patch_id: i32) -> Option<&AudioPatch> {
        find_by_id(&self.patches, patch_id)
    }

    /// Patch currently using the port config or port `id`
    pub fn patch_using(&self, id: i32) -> Option<i32> {
        self.index.first_patch_for(id)
    }
}
