//! Clock offset between the device (Unix) clock and the transport clock

use contracts::OutletTransport;
use tracing::info;

/// Wall-clock now in Unix seconds
pub fn unix_now() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) * 1e-9
}

/// `local_now - transport_now`, measured once per session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockOffset {
    seconds: f64,
}

impl ClockOffset {
    /// Measure against the transport clock
    pub fn measure<T: OutletTransport>(transport: &T) -> Self {
        let offset = Self::from_seconds(unix_now() - transport.local_clock());
        info!(offset_s = offset.seconds, transport = transport.name(), "clock offset measured");
        offset
    }

    pub fn from_seconds(seconds: f64) -> Self {
        Self { seconds }
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Map a Unix timestamp into the transport clock domain
    pub fn apply(&self, unix_seconds: f64) -> f64 {
        unix_seconds - self.seconds
    }
}
