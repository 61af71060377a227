//! LogTransport - pushes samples to tracing output

use contracts::{ContractError, Outlet, OutletTransport, SampleValues, SensorKind, StreamInfo};
use tracing::{info, trace};

/// Transport that logs every push
#[derive(Debug, Default)]
pub struct LogTransport;

impl LogTransport {
    pub fn new() -> Self {
        Self
    }
}

impl OutletTransport for LogTransport {
    type Outlet = LogOutlet;

    fn name(&self) -> &str {
        "log"
    }

    fn create_outlet(&self, info: StreamInfo) -> Result<LogOutlet, ContractError> {
        info!(
            outlet = %info.name,
            source_id = %info.source_id,
            channels = info.channel_count(),
            format = ?info.channel_format,
            "outlet created"
        );
        Ok(LogOutlet { info })
    }

    fn local_clock(&self) -> f64 {
        super::monotonic_clock()
    }
}

/// Outlet writing to tracing: events at info, gaze at trace
pub struct LogOutlet {
    info: StreamInfo,
}

impl Outlet for LogOutlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn push(&self, values: SampleValues, timestamp: f64) -> Result<(), ContractError> {
        match (self.info.kind, &values) {
            (SensorKind::Event, SampleValues::Text(names)) => {
                info!(outlet = %self.info.name, timestamp, event = ?names, "event pushed");
            }
            _ => {
                trace!(outlet = %self.info.name, timestamp, values = ?values, "sample pushed");
            }
        }
        Ok(())
    }
}
