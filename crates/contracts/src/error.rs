//! Layered error definitions
//!
//! Categorized by source: config / device / status / outlet

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Device Errors =====
    /// Device connection error
    #[error("device connection error for {address}: {message}")]
    DeviceConnection { address: String, message: String },

    /// Device connection already closed
    #[error("device {address} is closed")]
    DeviceClosed { address: String },

    /// Sensor stream error (connect or read)
    #[error("sensor stream error at '{url}': {message}")]
    SensorStream { url: String, message: String },

    // ===== Status Errors =====
    /// A status component could not be decoded
    #[error("malformed '{model}' status component: {message}")]
    MalformedStatus { model: String, message: String },

    // ===== Outlet Errors =====
    /// Outlet creation error
    #[error("outlet '{outlet}' creation error: {message}")]
    OutletCreate { outlet: String, message: String },

    /// Outlet push error
    #[error("outlet '{outlet}' push error: {message}")]
    OutletPush { outlet: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create device connection error
    pub fn device_connection(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceConnection {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create malformed status error
    pub fn malformed_status(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedStatus {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create sensor stream error
    pub fn sensor_stream(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SensorStream {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create outlet creation error
    pub fn outlet_create(outlet: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OutletCreate {
            outlet: outlet.into(),
            message: message.into(),
        }
    }

    /// Create outlet push error
    pub fn outlet_push(outlet: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OutletPush {
            outlet: outlet.into(),
            message: message.into(),
        }
    }
}
