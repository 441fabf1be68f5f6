use cpal::traits::{DeviceTrait, HostTrait};
use tracing::warn;

use crate::error::{Error, Result};

/// Descriptor for a capture or playback device.
///
/// Ids are enumeration indices rendered as strings; they are stable for
/// the lifetime of the host's device list, which is how the settings
/// layer stores the user's selection.
#[derive(Debug, Clone)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub is_input: bool,
}

/// Enumerate capture devices, in host order.
pub fn list_input_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    Ok(collect_devices(devices, default_name, true))
}

/// Enumerate playback devices, in host order.
pub fn list_output_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let devices = host
        .output_devices()
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    Ok(collect_devices(devices, default_name, false))
}

fn collect_devices(
    devices: impl Iterator<Item = cpal::Device>,
    default_name: Option<String>,
    is_input: bool,
) -> Vec<AudioDevice> {
    devices
        .enumerate()
        .map(|(index, device)| {
            let name = device.name().unwrap_or_else(|e| {
                warn!("Failed to read device name: {}", e);
                format!("Device {}", index)
            });
            AudioDevice {
                id: index.to_string(),
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                is_input,
            }
        })
        .collect()
}

/// Resolve a capture device by id. An empty id selects the default device.
pub(crate) fn input_device_by_id(id: &str) -> Result<cpal::Device> {
    let host = cpal::default_host();

    if id.is_empty() {
        return host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no default input device".to_string()));
    }

    let index: usize = id
        .parse()
        .map_err(|_| Error::DeviceUnavailable(format!("invalid device id: {}", id)))?;

    host.input_devices()
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
        .nth(index)
        .ok_or_else(|| Error::DeviceUnavailable(format!("no input device with id {}", id)))
}

/// Resolve a playback device by id. An empty id selects the default device.
pub(crate) fn output_device_by_id(id: &str) -> Result<cpal::Device> {
    let host = cpal::default_host();

    if id.is_empty() {
        return host
            .default_output_device()
            .ok_or_else(|| Error::DeviceUnavailable("no default output device".to_string()));
    }

    let index: usize = id
        .parse()
        .map_err(|_| Error::DeviceUnavailable(format!("invalid device id: {}", id)))?;

    host.output_devices()
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
        .nth(index)
        .ok_or_else(|| Error::DeviceUnavailable(format!("no output device with id {}", id)))
}
