//! Device discovery and selection (spec.md §6 "Audio device discovery").
//!
//! Grounded on the teacher's `coldvox-audio::device::DeviceManager`: opaque
//! identifiers resolved against the default `cpal` host, falling back to the
//! platform default when no identifier is given. Simplified to a single
//! exact-name lookup — the teacher's fuzzy hardware-pattern matching is a
//! desktop-Linux concern this pipeline does not need to reproduce.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

use voicebridge_foundation::error::AudioError;

pub struct DeviceManager {
    host: Host,
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default_input: bool,
    pub is_default_output: bool,
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn enumerate(&self) -> Vec<DeviceInfo> {
        let default_input = self.host.default_input_device().and_then(|d| d.name().ok());
        let default_output = self.host.default_output_device().and_then(|d| d.name().ok());

        let mut seen = std::collections::HashSet::new();
        let mut devices = Vec::new();

        if let Ok(inputs) = self.host.input_devices() {
            for device in inputs {
                if let Ok(name) = device.name() {
                    if seen.insert(name.clone()) {
                        devices.push(DeviceInfo {
                            is_default_input: Some(&name) == default_input.as_ref(),
                            is_default_output: Some(&name) == default_output.as_ref(),
                            name,
                        });
                    }
                }
            }
        }
        if let Ok(outputs) = self.host.output_devices() {
            for device in outputs {
                if let Ok(name) = device.name() {
                    if seen.insert(name.clone()) {
                        devices.push(DeviceInfo {
                            is_default_input: Some(&name) == default_input.as_ref(),
                            is_default_output: Some(&name) == default_output.as_ref(),
                            name,
                        });
                    }
                }
            }
        }

        devices
    }

    pub fn open_input(&self, id: Option<&str>) -> Result<Device, AudioError> {
        match id {
            Some(name) => self
                .find_input_by_name(name)
                .ok_or_else(|| AudioError::DeviceNotFound {
                    name: Some(name.to_string()),
                }),
            None => self
                .host
                .default_input_device()
                .ok_or(AudioError::DeviceNotFound { name: None }),
        }
    }

    pub fn open_output(&self, id: Option<&str>) -> Result<Device, AudioError> {
        match id {
            Some(name) => self
                .find_output_by_name(name)
                .ok_or_else(|| AudioError::DeviceNotFound {
                    name: Some(name.to_string()),
                }),
            None => self
                .host
                .default_output_device()
                .ok_or(AudioError::DeviceNotFound { name: None }),
        }
    }

    fn find_input_by_name(&self, name: &str) -> Option<Device> {
        self.host
            .input_devices()
            .ok()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
    }

    fn find_output_by_name(&self, name: &str) -> Option<Device> {
        self.host
            .output_devices()
            .ok()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
    }
}
