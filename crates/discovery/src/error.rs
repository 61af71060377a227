//! Discovery error types

use contracts::ContractError;
use thiserror::Error;

/// Discovery specific error
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Retry budget exhausted without finding any device
    #[error("no device found after {attempts} discovery attempts")]
    NoDevicesFound { attempts: u32 },

    /// `--device-address` could not be parsed
    #[error("device address '{input}' could not be parsed: {message} (expected IP:PORT)")]
    InvalidAddress { input: String, message: String },

    /// Status query of the selected device timed out
    #[error(
        "device {address} was not found on the network; check for typos and make sure \
         the device is connected to the same network"
    )]
    DeviceNotFound { address: String },

    /// Selection input closed before a device was chosen
    #[error("device selection aborted")]
    SelectionAborted,

    /// Prompt IO error
    #[error("selection input error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl DiscoveryError {
    /// Create invalid address error
    pub fn invalid_address(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, DiscoveryError>;
