//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// `--transport-param` not in KEY=VALUE form
    #[error("Invalid transport parameter '{input}': expected KEY=VALUE")]
    TransportParam { input: String },

    /// Capture file not found
    #[error("Capture file not found: {}", path.display())]
    CaptureNotFound { path: PathBuf },

    /// Export root or output directory missing
    #[error("Directory not found: {}", path.display())]
    DirectoryNotFound { path: PathBuf },

    /// Discovered device without a resolved address
    #[error("Device '{name}' has no resolved address")]
    NoDeviceAddress { name: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn transport_param(input: impl Into<String>) -> Self {
        Self::TransportParam { input: input.into() }
    }

    pub fn capture_not_found(path: impl Into<PathBuf>) -> Self {
        Self::CaptureNotFound { path: path.into() }
    }

    pub fn directory_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DirectoryNotFound { path: path.into() }
    }
}
