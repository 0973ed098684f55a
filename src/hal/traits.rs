use super::types::{AudioDevice, AudioProfile};

/// Hardware profile discovery for newly connected external devices.
///
/// Consulted only when device connections are not simulated.
pub trait DeviceProfileQuery: Send + Sync {
    /// Unique identifier of the discovery backend (e.g., "alsa-usb")
    fn query_id(&self) -> &str;

    /// Profiles supported by `device`, or `None` when they cannot be obtained
    fn query_device_profiles(&self, device: &AudioDevice) -> Option<Vec<AudioProfile>>;
}

/// Discovery backend for builds without vendor support: always unavailable
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableProfileQuery;

impl DeviceProfileQuery for UnavailableProfileQuery {
    fn query_id(&self) -> &str {
        "unavailable"
    }

    fn query_device_profiles(&self, _device: &AudioDevice) -> Option<Vec<AudioProfile>> {
        None
    }
}
