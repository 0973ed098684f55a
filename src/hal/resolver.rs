//! Resolution of client-requested port configs against port capabilities.

use tracing::{error, warn};

use super::error::{invalid_argument, HalError, Result};
use super::types::{AudioPort, AudioPortConfig};

/// Outcome of resolving a requested port config
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Best-effort config: the request's accepted fields over the existing or default config
    pub suggested: AudioPortConfig,
    /// False when any requested field is unsupported by the port
    pub valid: bool,
    /// False when any of flags, format, channel mask or sample rate was omitted
    pub fully_specified: bool,
}

impl Resolution {
    /// Whether the suggestion may be committed to the module.
    ///
    /// Partial requests can update an existing config but never create one.
    pub fn can_apply(&self, existing: bool) -> bool {
        self.valid && (existing || self.fully_specified)
    }
}

/// Default config for `port`: its first profile's first format, channel mask and rate
pub fn default_port_config(port: &AudioPort) -> Result<AudioPortConfig> {
    let profile = port.profiles.first().ok_or_else(|| {
        HalError::InvalidArgument(format!("port {} has no profiles", port.id))
    })?;
    let channel_mask = profile.channel_masks.first().copied().ok_or_else(|| {
        HalError::InvalidArgument(format!(
            "the first profile in port {} has no channel masks",
            port.id
        ))
    })?;
    let sample_rate = profile.sample_rates.first().copied().ok_or_else(|| {
        HalError::InvalidArgument(format!(
            "the first profile in port {} has no sample rates",
            port.id
        ))
    })?;

    Ok(AudioPortConfig {
        id: 0,
        port_id: port.id,
        sample_rate: Some(sample_rate),
        channel_mask: Some(channel_mask),
        format: Some(profile.format.clone()),
        gain: None,
        flags: Some(port.flags),
        ext: port.ext.clone(),
    })
}

/// Resolve `requested` against `port`.
///
/// `existing` is the config named by a non-zero `requested.id`; the caller is
/// responsible for looking it up. Resolution never mutates anything.
pub fn resolve(
    requested: &AudioPortConfig,
    port: &AudioPort,
    existing: Option<&AudioPortConfig>,
) -> Result<Resolution> {
    let mut suggested = match existing {
        Some(config) => config.clone(),
        None => default_port_config(port).map_err(|e| {
            error!("unable to generate a default config for port {}: {}", port.id, e);
            e
        })?,
    };

    let mut valid = true;
    let mut fully_specified = true;

    match &requested.flags {
        Some(flags) if *flags != port.flags => {
            warn!(
                port_id = port.id,
                "requested flags {:?} do not match port flags {:?}", flags, port.flags
            );
            valid = false;
        }
        Some(_) => {}
        None => fully_specified = false,
    }

    match &requested.format {
        Some(format) if port.find_profile(format).is_some() => {
            suggested.format = Some(format.clone());
        }
        Some(format) => {
            warn!(port_id = port.id, "requested format {} is not found in port profiles", format);
            valid = false;
        }
        None => fully_specified = false,
    }

    // The resolved format must still be supported, even if it was not requested.
    let profile = suggested
        .format
        .as_ref()
        .and_then(|format| port.find_profile(format))
        .ok_or_else(|| {
            invalid_argument!(
                "port {} does not support format {} anymore",
                port.id,
                suggested
                    .format
                    .as_ref()
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "<unset>".to_string())
            )
        })?;

    match &requested.channel_mask {
        Some(mask) if profile.channel_masks.contains(mask) => {
            suggested.channel_mask = Some(*mask);
        }
        Some(mask) => {
            warn!(
                port_id = port.id,
                "requested channel mask {:?} is not supported for the format {}",
                mask,
                profile.format
            );
            valid = false;
        }
        None => fully_specified = false,
    }

    match requested.sample_rate {
        Some(rate) if profile.sample_rates.contains(&rate) => {
            suggested.sample_rate = Some(rate);
        }
        Some(rate) => {
            warn!(
                port_id = port.id,
                "requested sample rate {} is not supported for the format {}", rate, profile.format
            );
            valid = false;
        }
        None => fully_specified = false,
    }

    // Gain can always be applied.
    if let Some(gain) = &requested.gain {
        suggested.gain = Some(gain.clone());
    }

    Ok(Resolution {
        suggested,
        valid,
        fully_specified,
    })
}
