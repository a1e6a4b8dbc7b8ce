//! Host input device lookup through cpal

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::AcquisitionError;

/// Summary of an input device
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub channels: Vec<u16>,
}

/// List the host's input devices
pub fn list_input_devices() -> Vec<InputDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device.name() {
                let mut channels: Vec<u16> = device
                    .supported_input_configs()
                    .map(|configs| configs.map(|c| c.channels()).collect())
                    .unwrap_or_default();
                channels.sort();
                channels.dedup();

                devices.push(InputDeviceInfo {
                    is_default: default_name.as_ref() == Some(&name),
                    name,
                    channels,
                });
            }
        }
    }
    devices
}

/// Find an input device by name, or the default input when `name` is `None`
pub fn find_input_device(name: Option<&str>) -> Result<cpal::Device, AcquisitionError> {
    let host = cpal::default_host();

    let Some(name) = name else {
        return host
            .default_input_device()
            .ok_or_else(|| AcquisitionError::DeviceNotFound("No default input device".to_string()));
    };

    let devices = host
        .input_devices()
        .map_err(|e| AcquisitionError::DeviceNotFound(e.to_string()))?;

    for device in devices {
        if device.name().map(|n| n == name).unwrap_or(false) {
            return Ok(device);
        }
    }

    Err(AcquisitionError::DeviceNotFound(name.to_string()))
}
