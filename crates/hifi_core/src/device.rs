//! Audio Output Device Enumeration
//!
//! Devices are grouped by whether their host API is capable of exclusive
//! mode (tagged "wasapi") or not (grouped under "other"). On non-Windows
//! hosts every device naturally falls under "other".

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Host API name substring that marks a device as exclusive-mode capable.
const EXCLUSIVE_CAPABLE_TAG: &str = "wasapi";

/// A single enumerable output device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDevice {
    pub id: usize,
    pub name: String,
    pub hostapi: String,
    pub max_output_channels: u16,
    pub default_samplerate: u32,
}

/// Output devices grouped by exclusive-mode capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupedDevices {
    pub wasapi: Vec<OutputDevice>,
    pub other: Vec<OutputDevice>,
}

/// Enumerate all output devices on the default host, grouped per §6.
pub fn enumerate_output_devices() -> EngineResult<GroupedDevices> {
    let host = cpal::default_host();
    let hostapi_name = host.id().name();
    let is_exclusive_capable = hostapi_name.to_lowercase().contains(EXCLUSIVE_CAPABLE_TAG);

    let devices = host
        .output_devices()
        .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;

    let mut grouped = GroupedDevices::default();

    for (id, device) in devices.enumerate() {
        let Ok(name) = device.name() else { continue };
        let default_config = device.default_output_config().ok();
        let default_samplerate = default_config.as_ref().map(|c| c.sample_rate().0).unwrap_or(0);
        let max_output_channels = default_config.as_ref().map(|c| c.channels()).unwrap_or(0);

        let entry = OutputDevice {
            id,
            name,
            hostapi: hostapi_name.to_string(),
            max_output_channels,
            default_samplerate,
        };

        if is_exclusive_capable {
            grouped.wasapi.push(entry);
        } else {
            grouped.other.push(entry);
        }
    }

    if grouped.wasapi.is_empty() && grouped.other.is_empty() {
        return Err(EngineError::NoDevicesFound);
    }

    Ok(grouped)
}

/// Resolve a device id to a live `cpal::Device`. `None` selects the host's
/// default output device.
pub fn resolve_output_device(id: Option<usize>) -> EngineResult<cpal::Device> {
    let host = cpal::default_host();
    match id {
        None => host
            .default_output_device()
            .ok_or(EngineError::NoDevicesFound),
        Some(idx) => host
            .output_devices()
            .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?
            .nth(idx)
            .ok_or_else(|| EngineError::DeviceNotFound(idx.to_string())),
    }
}

/// Whether the default host's API is capable of an exclusive-mode path.
pub fn host_is_exclusive_capable() -> bool {
    cpal::default_host()
        .id()
        .name()
        .to_lowercase()
        .contains(EXCLUSIVE_CAPABLE_TAG)
}

/// The device's default sample rate, if queryable.
pub fn device_default_samplerate(device: &cpal::Device) -> Option<u32> {
    device.default_output_config().ok().map(|c| c.sample_rate().0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped_devices_serialization() {
        let mut grouped = GroupedDevices::default();
        grouped.other.push(OutputDevice {
            id: 0,
            name: "Test Device".to_string(),
            hostapi: "alsa".to_string(),
            max_output_channels: 2,
            default_samplerate: 48000,
        });

        let json = serde_json::to_string(&grouped).unwrap();
        let deserialized: GroupedDevices = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.other.len(), 1);
        assert_eq!(deserialized.other[0].name, "Test Device");
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_enumerate_output_devices() {
        let devices = enumerate_output_devices();
        assert!(devices.is_ok());
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_resolve_default_output_device() {
        let device = resolve_output_device(None);
        assert!(device.is_ok());
    }
}
