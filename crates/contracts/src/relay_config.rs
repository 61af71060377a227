//! Relay configuration
//!
//! Every field has a default so an empty file is a valid configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// `ip:port` of a known device, skips discovery
    pub device_address: Option<String>,
    /// Outlet name prefix
    pub outlet_prefix: String,
    /// Seconds between time-sync events (0 = disabled)
    pub time_sync_interval_s: u64,
    /// Single discovery pass timeout
    pub discovery_timeout_s: u64,
    /// Maximum empty discovery passes before giving up
    pub max_discovery_attempts: u32,
    /// Status fetch timeout after selection
    pub status_timeout_s: u64,
    /// Debounced teardown after the gaze sensor disconnects
    pub teardown_timeout_s: u64,
    /// Bounded wait of the gaze publisher
    pub gaze_wait_timeout_s: u64,
    /// Overall session limit (None = run until interrupted)
    pub session_timeout_s: Option<u64>,
    /// Output transport
    pub transport: TransportConfig,
    /// Prometheus exporter port (0 = disabled)
    pub metrics_port: u16,
    /// Simulated device behaviour
    pub simulation: SimulationConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            device_address: None,
            outlet_prefix: "pupil_invisible".to_string(),
            time_sync_interval_s: 60,
            discovery_timeout_s: 10,
            max_discovery_attempts: 10,
            status_timeout_s: 10,
            teardown_timeout_s: 60,
            gaze_wait_timeout_s: 10,
            session_timeout_s: None,
            transport: TransportConfig::default(),
            metrics_port: 0,
            simulation: SimulationConfig::default(),
        }
    }
}

impl RelayConfig {
    pub fn time_sync_interval(&self) -> Option<Duration> {
        (self.time_sync_interval_s > 0).then(|| Duration::from_secs(self.time_sync_interval_s))
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_s)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_s)
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_secs(self.teardown_timeout_s)
    }

    pub fn gaze_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.gaze_wait_timeout_s)
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_s.map(Duration::from_secs)
    }
}

/// Output transport type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Push to tracing output
    #[default]
    Log,
    /// One JSON-lines file per outlet
    File,
    /// UDP datagrams
    Network,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::File => "file",
            Self::Network => "network",
        }
    }
}

/// Transport selection and parameters
///
/// file: `path` (directory, default `outlets`)
/// network: `addr` (required), `format` (`json` | `bincode`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub params: HashMap<String, String>,
}

/// Behaviour of the in-process simulated device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Gaze sample rate
    pub gaze_rate_hz: f64,
    /// Seconds after which the gaze sensor disconnects (None = never)
    pub disconnect_after_s: Option<f64>,
    /// Seconds after the disconnect at which it reconnects (None = never)
    pub reconnect_after_s: Option<f64>,
    /// Device clock offset relative to the host clock
    pub device_clock_offset_s: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gaze_rate_hz: 200.0,
            disconnect_after_s: None,
            reconnect_after_s: None,
            device_clock_offset_s: 0.0,
        }
    }
}
