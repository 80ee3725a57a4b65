//! Platform and device enumeration with index validation.
//!
//! A device index is only meaningful relative to its platform, so every
//! lookup here goes platform first.  Enumerating devices logs one line per
//! discovered device for operator visibility; the log output is advisory and
//! not part of the contract.

use log::info;

use crate::backend::Backend;
use crate::error::{Error, Result};

/// Human-readable description of an enumerated platform.
#[derive(Debug, Clone)]
pub struct PlatformDesc {
    pub index: usize,
    pub name: String,
}

/// Human-readable description of an enumerated device.
#[derive(Debug, Clone)]
pub struct DeviceDesc {
    pub index: usize,
    pub name: String,
}

/// Enumerates platforms and devices and validates index-based selections.
#[derive(Debug, Clone)]
pub struct DeviceRegistry<B: Backend> {
    backend: B,
}

impl<B: Backend> DeviceRegistry<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// List the available platforms.
    pub fn platforms(&self) -> Result<Vec<PlatformDesc>> {
        let platforms = self.backend.platforms()?;
        platforms
            .iter()
            .enumerate()
            .map(|(index, platform)| {
                Ok(PlatformDesc {
                    index,
                    name: self.backend.platform_name(platform)?,
                })
            })
            .collect()
    }

    /// List the devices of the platform at `platform_index`, logging each
    /// device name.
    pub fn devices(&self, platform_index: usize) -> Result<Vec<DeviceDesc>> {
        let platform = self.platform(platform_index)?;
        let devices = self.backend.devices(&platform)?;
        let mut described = Vec::with_capacity(devices.len());
        for (index, device) in devices.iter().enumerate() {
            let name = self.backend.device_name(device)?;
            info!("device name [{index}] : {name}");
            described.push(DeviceDesc { index, name });
        }
        Ok(described)
    }

    /// Fail with a configuration error unless both indices fall inside the
    /// enumerated ranges.
    pub fn validate(&self, platform_index: usize, device_index: usize) -> Result<()> {
        let devices = self.devices(platform_index)?;
        if device_index >= devices.len() {
            return Err(Error::Configuration(format!(
                "unknown device {device_index}: platform {platform_index} exposes {} device(s)",
                devices.len()
            )));
        }
        Ok(())
    }

    pub(crate) fn platform(&self, platform_index: usize) -> Result<B::Platform> {
        let platforms = self.backend.platforms()?;
        let count = platforms.len();
        platforms.into_iter().nth(platform_index).ok_or_else(|| {
            Error::Configuration(format!(
                "unknown platform {platform_index}: {count} platform(s) available"
            ))
        })
    }
}
