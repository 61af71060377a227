//! DiscoveryCoordinator core implementation
//!
//! Finds candidate devices, solicits a selection and resolves the chosen
//! device's identity from its status.

use std::time::Duration;

use contracts::{Device, DeviceClient, DeviceInfo, DeviceNetwork};
use tracing::{debug, info, instrument, warn};

use crate::error::{DiscoveryError, Result};
use crate::selection::{evaluate_input, merge_by_address, DeviceSelector, SelectionInput};

/// Device discovery coordinator
pub struct DiscoveryCoordinator<N: DeviceNetwork> {
    network: N,
    search_timeout: Duration,
    max_attempts: u32,
}

impl<N: DeviceNetwork> DiscoveryCoordinator<N> {
    pub fn new(network: N, search_timeout: Duration, max_attempts: u32) -> Self {
        Self {
            network,
            search_timeout,
            max_attempts,
        }
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Run discovery passes until at least one device is found
    ///
    /// # Errors
    /// `NoDevicesFound` once the attempt counter exceeds `max_attempts`.
    #[instrument(name = "discovery_find_devices", skip(self), fields(max_attempts = self.max_attempts))]
    pub async fn find_devices(&self) -> Result<Vec<DeviceInfo>> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let devices = self.network.discover(self.search_timeout).await?;
            if !devices.is_empty() {
                info!(attempts, found = devices.len(), "devices discovered");
                return Ok(devices);
            }
            if attempts > self.max_attempts {
                warn!(attempts, "giving up device discovery");
                return Err(DiscoveryError::NoDevicesFound { attempts });
            }
            debug!(attempts, "no devices found, searching again");
        }
    }

    /// Let the user pick one device
    ///
    /// Rejected input re-prompts with the same candidates, empty input runs a
    /// fresh discovery pass merged into the list.
    #[instrument(name = "discovery_select_device", skip(self, selector))]
    pub async fn select_device<S: DeviceSelector>(&self, selector: &mut S) -> Result<DeviceInfo> {
        let mut candidates = self.find_devices().await?;
        let mut reloads = 0usize;

        loop {
            let Some(line) = selector.prompt(&candidates, reloads).await? else {
                return Err(DiscoveryError::SelectionAborted);
            };

            match evaluate_input(&line, candidates.len()) {
                SelectionInput::Select(index) => {
                    let device = candidates.swap_remove(index);
                    info!(device = %device.display_name(), address = ?device.address(), "device selected");
                    return Ok(device);
                }
                SelectionInput::Reload => {
                    reloads += 1;
                    debug!(reloads, "reloading the device list");
                    let fresh = self.network.discover(self.search_timeout).await?;
                    merge_by_address(&mut candidates, fresh);
                }
                SelectionInput::Rejected(reason) => {
                    warn!(%reason, "invalid selection");
                }
            }
        }
    }
}

/// Fetch the status of a connected device and build its session identity
///
/// # Errors
/// `DeviceNotFound` if the status query does not answer within `status_timeout`.
#[instrument(name = "discovery_resolve_device", skip(client, status_timeout))]
pub async fn resolve_device<C: DeviceClient>(
    client: &C,
    address: &str,
    port: u16,
    status_timeout: Duration,
) -> Result<Device> {
    let status = tokio::time::timeout(status_timeout, client.get_status())
        .await
        .map_err(|_| DiscoveryError::DeviceNotFound {
            address: format!("{address}:{port}"),
        })??;

    let world_camera_serial = match status.hardware.world_camera_serial {
        Some(serial) if !serial.is_empty() => serial,
        _ => {
            warn!("the world camera is not connected");
            "default".to_string()
        }
    };

    let device = Device {
        address: address.to_string(),
        port,
        identifier: status.phone.device_id,
        world_camera_serial,
    };
    info!(identifier = %device.identifier, serial = %device.world_camera_serial, "device resolved");
    Ok(device)
}
