//! Sensor data model
//!
//! Sample kinds, endpoints and the samples produced by the device.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of sample relayed to an outlet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Gaze,
    Event,
}

impl SensorKind {
    /// Name used for outlet types and source ids
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gaze => "Gaze",
            Self::Event => "Event",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Currently-known network location of one sensor stream
///
/// Only status updates mutate an endpoint. `url == None` means the sensor
/// has not been located yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEndpoint {
    pub kind: SensorKind,
    pub url: Option<String>,
    pub connected: bool,
}

impl SensorEndpoint {
    /// Endpoint that has not been located yet
    pub fn unknown(kind: SensorKind) -> Self {
        Self {
            kind,
            url: None,
            connected: false,
        }
    }

    /// Connected and located
    pub fn is_available(&self) -> bool {
        self.connected && self.url.is_some()
    }
}

/// Gaze datum decoded by the device SDK
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    /// Scene camera pixel x
    pub x: f64,
    /// Scene camera pixel y
    pub y: f64,
    /// Device clock, Unix seconds
    pub timestamp_unix_seconds: f64,
}

/// Named event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSample {
    pub name: String,
    /// Device clock, Unix seconds
    pub timestamp_unix_seconds: f64,
}

impl EventSample {
    /// Build from a nanosecond Unix timestamp
    pub fn from_nanos(name: impl Into<String>, timestamp_unix_ns: i64) -> Self {
        Self {
            name: name.into(),
            timestamp_unix_seconds: timestamp_unix_ns as f64 * 1e-9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_availability() {
        let mut endpoint = SensorEndpoint::unknown(SensorKind::Gaze);
        assert!(!endpoint.is_available());

        endpoint.connected = true;
        assert!(!endpoint.is_available(), "connected without url is not available");

        endpoint.url = Some("rtsp://10.0.0.2:8086/?camera=gaze".into());
        assert!(endpoint.is_available());
    }

    #[test]
    fn test_event_from_nanos() {
        let event = EventSample::from_nanos("recording.begin", 1_500_000_000);
        assert!((event.timestamp_unix_seconds - 1.5).abs() < 1e-12);
    }
}
