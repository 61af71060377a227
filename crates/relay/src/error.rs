//! Relay error types

use contracts::ContractError;
use thiserror::Error;

/// Relay specific error
#[derive(Debug, Error)]
pub enum RelayError {
    /// Transport could not be constructed from its parameters
    #[error("transport '{transport}' setup failed: {message}")]
    TransportSetup { transport: String, message: String },

    /// A supervised task returned an error
    #[error("task '{task}' failed: {message}")]
    TaskFailed { task: String, message: String },

    /// A supervised task panicked
    #[error("task '{task}' panicked: {message}")]
    TaskPanicked { task: String, message: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl RelayError {
    /// Create transport setup error
    pub fn transport_setup(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportSetup {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Create task failure error
    pub fn task_failed(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskFailed {
            task: task.into(),
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, RelayError>;
