//! Output device enumeration and lookup

use cpal::traits::{DeviceTrait, HostTrait};

use super::error::{AudioError, AudioResult};

/// One output device as shown by `--list-devices`
#[derive(Debug, Clone)]
pub struct AudioDevice {
    pub name: String,
    /// Host backend, e.g. `Alsa` or `Jack`
    pub host: String,
    pub is_default: bool,
    pub max_channels: u16,
}

impl std::fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.host, self.name)?;
        if self.is_default {
            f.write_str(" (default)")?;
        }
        Ok(())
    }
}

/// Every output device of every available host, defaults first
pub fn get_output_devices() -> AudioResult<Vec<AudioDevice>> {
    let mut devices = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };
        let host_name = format!("{:?}", host_id);
        let default_name = host.default_output_device().and_then(|d: cpal::Device| d.name().ok());

        let outputs = match host.output_devices() {
            Ok(d) => d,
            Err(e) => {
                log::debug!("could not enumerate devices for {:?}: {}", host_id, e);
                continue;
            }
        };

        for device in outputs {
            let Ok(name) = device.name() else {
                continue;
            };
            let max_channels = match device.supported_output_configs() {
                Ok(configs) => configs.map(|c| c.channels()).max().unwrap_or(0),
                Err(_) => continue,
            };
            if max_channels == 0 {
                continue;
            }
            devices.push(AudioDevice {
                is_default: default_name.as_ref() == Some(&name),
                name,
                host: host_name.clone(),
                max_channels,
            });
        }
    }

    if devices.is_empty() {
        return Err(AudioError::NoDevices);
    }

    devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.host.cmp(&b.host))
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(devices)
}

/// Find an output device by name across all hosts
pub fn find_device(name: &str) -> AudioResult<cpal::Device> {
    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else {
            continue;
        };
        let Ok(mut outputs) = host.output_devices() else {
            continue;
        };
        if let Some(device) = outputs.find(|d: &cpal::Device| d.name().ok().as_deref() == Some(name)) {
            return Ok(device);
        }
    }
    Err(AudioError::DeviceNotFound(name.to_string()))
}

pub fn default_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AudioError::NoDefaultDevice("no default output device".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_enumeration() {
        // CI machines usually have no audio hardware
        match get_output_devices() {
            Ok(devices) => {
                for device in &devices {
                    println!("{} ({} channels)", device, device.max_channels);
                }
            }
            Err(AudioError::NoDevices) => println!("no audio devices available"),
            Err(e) => println!("error enumerating devices: {}", e),
        }
    }
}
