//! Output transports
//!
//! Log, file and network outlets behind one enum, plus an in-memory
//! transport that records every push.

mod file;
mod log;
mod memory;
mod network;

use std::sync::OnceLock;
use std::time::Instant;

use contracts::{
    ContractError, Outlet, OutletTransport, SampleValues, StreamInfo, TransportConfig, TransportKind,
};
use tracing::instrument;

use crate::error::{RelayError, Result};

pub use self::file::{FileOutlet, FileTransport};
pub use self::log::{LogOutlet, LogTransport};
pub use self::memory::{MemoryOutlet, MemoryTransport, PushedSample};
pub use self::network::{NetworkFormat, NetworkOutlet, NetworkTransport};

/// Monotonic transport clock, seconds since first use in this process
pub fn monotonic_clock() -> f64 {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    ORIGIN.get_or_init(Instant::now).elapsed().as_secs_f64()
}

/// Transport selected by configuration
pub enum AnyTransport {
    Log(LogTransport),
    File(FileTransport),
    Network(NetworkTransport),
}

impl AnyTransport {
    /// Create the configured transport
    #[instrument(name = "transport_from_config", skip(config), fields(kind = config.kind.as_str()))]
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        let kind = config.kind.as_str();
        match config.kind {
            TransportKind::Log => Ok(Self::Log(LogTransport::new())),
            TransportKind::File => FileTransport::from_params(&config.params)
                .map(Self::File)
                .map_err(|e| RelayError::transport_setup(kind, e.to_string())),
            TransportKind::Network => NetworkTransport::from_params(&config.params)
                .map(Self::Network)
                .map_err(|e| RelayError::transport_setup(kind, e.to_string())),
        }
    }
}

/// Outlet of an `AnyTransport`
pub enum AnyOutlet {
    Log(LogOutlet),
    File(FileOutlet),
    Network(NetworkOutlet),
}

impl Outlet for AnyOutlet {
    fn info(&self) -> &StreamInfo {
        match self {
            Self::Log(o) => o.info(),
            Self::File(o) => o.info(),
            Self::Network(o) => o.info(),
        }
    }

    fn push(&self, values: SampleValues, timestamp: f64) -> std::result::Result<(), ContractError> {
        match self {
            Self::Log(o) => o.push(values, timestamp),
            Self::File(o) => o.push(values, timestamp),
            Self::Network(o) => o.push(values, timestamp),
        }
    }
}

impl OutletTransport for AnyTransport {
    type Outlet = AnyOutlet;

    fn name(&self) -> &str {
        match self {
            Self::Log(t) => t.name(),
            Self::File(t) => t.name(),
            Self::Network(t) => t.name(),
        }
    }

    fn create_outlet(&self, info: StreamInfo) -> std::result::Result<AnyOutlet, ContractError> {
        match self {
            Self::Log(t) => t.create_outlet(info).map(AnyOutlet::Log),
            Self::File(t) => t.create_outlet(info).map(AnyOutlet::File),
            Self::Network(t) => t.create_outlet(info).map(AnyOutlet::Network),
        }
    }

    fn local_clock(&self) -> f64 {
        monotonic_clock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_config_log() {
        let transport = AnyTransport::from_config(&TransportConfig::default()).unwrap();
        assert_eq!(transport.name(), "log");
    }

    #[test]
    fn test_from_config_network_missing_addr() {
        let config = TransportConfig {
            kind: TransportKind::Network,
            params: HashMap::new(),
        };
        let err = AnyTransport::from_config(&config).err().unwrap();
        assert!(matches!(err, RelayError::TransportSetup { .. }));
    }

    #[test]
    fn test_monotonic_clock_advances() {
        let a = monotonic_clock();
        let b = monotonic_clock();
        assert!(b >= a);
    }
}
