//! Output channels
//!
//! Stream descriptions for the gaze and event outlets, and the adapter that
//! turns device samples into timestamp-corrected pushes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{
    ChannelFormat, ChannelInfo, Device, EventSample, GazeSample, Outlet, SampleValues, SensorKind,
    StreamInfo,
};
use observability::metrics;
use tracing::{debug, warn};

use crate::clock::{unix_now, ClockOffset};

/// Description entry carrying the relay version
pub const RELAY_VERSION_KEY: &str = "pupil_invisible_lsl_relay_version";
pub const RELAY_VERSION: &str = env!("CARGO_PKG_VERSION");

const MANUFACTURER: &str = "Pupil Labs";
const MODEL: &str = "Pupil Invisible";

fn acquisition(device: &Device, session_id: &str) -> Vec<(String, String)> {
    vec![
        ("manufacturer".into(), MANUFACTURER.into()),
        ("model".into(), MODEL.into()),
        ("world_camera_serial".into(), device.world_camera_serial.clone()),
        ("session_id".into(), session_id.into()),
    ]
}

fn stream_info(
    kind: SensorKind,
    channel_format: ChannelFormat,
    channels: Vec<ChannelInfo>,
    device: &Device,
    prefix: &str,
    session_id: &str,
) -> StreamInfo {
    StreamInfo {
        name: format!("{prefix}_{kind}"),
        kind,
        channel_format,
        source_id: format!("{}_{kind}", device.identifier),
        nominal_srate: 0.0,
        channels,
        desc: vec![(RELAY_VERSION_KEY.into(), RELAY_VERSION.into())],
        acquisition: acquisition(device, session_id),
    }
}

/// Gaze outlet: `x`, `y` scene camera pixels
pub fn gaze_stream_info(device: &Device, prefix: &str, session_id: &str) -> StreamInfo {
    let channels = ["x", "y"]
        .into_iter()
        .zip(["ScreenX", "ScreenY"])
        .map(|(label, metatype)| {
            ChannelInfo::new()
                .with("label", label)
                .with("eye", "both")
                .with("metatype", metatype)
                .with("unit", "pixels")
                .with("coordinate_system", "world")
        })
        .collect();
    stream_info(SensorKind::Gaze, ChannelFormat::Double64, channels, device, prefix, session_id)
}

/// Event outlet: one string channel
pub fn event_stream_info(device: &Device, prefix: &str, session_id: &str) -> StreamInfo {
    let channels = vec![ChannelInfo::new().with("label", "Event").with("format", "string")];
    stream_info(SensorKind::Event, ChannelFormat::String, channels, device, prefix, session_id)
}

/// Push counters shared with the session summary
#[derive(Debug, Default)]
pub struct ChannelStats {
    pushed: AtomicU64,
    dropped: AtomicU64,
}

impl ChannelStats {
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Outlet plus the clock offset applied to every sample
pub struct OutputChannel<O> {
    outlet: O,
    offset: ClockOffset,
    stats: Arc<ChannelStats>,
}

impl<O: Outlet> OutputChannel<O> {
    pub fn new(outlet: O, offset: ClockOffset) -> Self {
        Self {
            outlet,
            offset,
            stats: Arc::new(ChannelStats::default()),
        }
    }

    pub fn info(&self) -> &StreamInfo {
        self.outlet.info()
    }

    pub fn stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.stats)
    }

    /// Push a gaze sample; returns false if it was dropped
    pub fn push_gaze(&self, sample: &GazeSample) -> bool {
        let finite = [sample.x, sample.y, sample.timestamp_unix_seconds]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            warn!(outlet = %self.info().name, ?sample, "gaze sample without finite values dropped");
            return self.drop_sample("invalid_sample");
        }
        self.push(
            SampleValues::Numeric(vec![sample.x, sample.y]),
            sample.timestamp_unix_seconds,
        )
    }

    /// Push an event; returns false if it was dropped
    pub fn push_event(&self, event: &EventSample) -> bool {
        if event.name.is_empty() || !event.timestamp_unix_seconds.is_finite() {
            warn!(outlet = %self.info().name, ?event, "event without name or timestamp dropped");
            return self.drop_sample("invalid_sample");
        }
        self.push(
            SampleValues::Text(vec![event.name.clone()]),
            event.timestamp_unix_seconds,
        )
    }

    fn push(&self, values: SampleValues, unix_seconds: f64) -> bool {
        let kind = self.info().kind.as_str();
        let timestamp = self.offset.apply(unix_seconds);
        match self.outlet.push(values, timestamp) {
            Ok(()) => {
                self.stats.pushed.fetch_add(1, Ordering::Relaxed);
                metrics::record_sample_pushed(kind);
                metrics::record_publish_latency_ms(kind, (unix_now() - unix_seconds) * 1000.0);
                true
            }
            Err(e) => {
                debug!(outlet = %self.info().name, error = %e, "push failed");
                self.drop_sample("push_failed")
            }
        }
    }

    fn drop_sample(&self, reason: &'static str) -> bool {
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::record_sample_dropped(self.info().kind.as_str(), reason);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use contracts::OutletTransport;

    fn device() -> Device {
        Device {
            address: "192.168.1.20".into(),
            port: 8080,
            identifier: "phone-1".into(),
            world_camera_serial: "ABC123".into(),
        }
    }

    #[test]
    fn test_gaze_stream_info() {
        let info = gaze_stream_info(&device(), "pupil_invisible", "sess");
        assert_eq!(info.name, "pupil_invisible_Gaze");
        assert_eq!(info.source_id, "phone-1_Gaze");
        assert_eq!(info.channel_format, ChannelFormat::Double64);
        assert_eq!(info.channel_count(), 2);
        assert_eq!(info.channels[1].get("metatype"), Some("ScreenY"));
        assert_eq!(info.channels[0].get("coordinate_system"), Some("world"));
        assert_eq!(info.acquisition_value("world_camera_serial"), Some("ABC123"));
        assert_eq!(info.acquisition_value("session_id"), Some("sess"));
    }

    #[test]
    fn test_event_stream_info() {
        let info = event_stream_info(&device(), "lab", "sess");
        assert_eq!(info.name, "lab_Event");
        assert_eq!(info.source_id, "phone-1_Event");
        assert_eq!(info.channels[0].label(), Some("Event"));
        assert_eq!(info.desc[0].0, RELAY_VERSION_KEY);
    }

    #[test]
    fn test_push_applies_offset() {
        let transport = MemoryTransport::new();
        let outlet = transport
            .create_outlet(gaze_stream_info(&device(), "p", "s"))
            .unwrap();
        let channel = OutputChannel::new(outlet, ClockOffset::from_seconds(1_000.0));

        assert!(channel.push_gaze(&GazeSample {
            x: 10.0,
            y: 20.0,
            timestamp_unix_seconds: 1_012.5,
        }));

        let pushes = transport.pushes();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].values, SampleValues::Numeric(vec![10.0, 20.0]));
        assert!((pushes[0].timestamp - 12.5).abs() < 1e-9);
        assert_eq!(channel.stats().pushed(), 1);
    }

    #[test]
    fn test_invalid_samples_dropped() {
        let transport = MemoryTransport::new();
        let gaze = OutputChannel::new(
            transport.create_outlet(gaze_stream_info(&device(), "p", "s")).unwrap(),
            ClockOffset::from_seconds(0.0),
        );
        let events = OutputChannel::new(
            transport.create_outlet(event_stream_info(&device(), "p", "s")).unwrap(),
            ClockOffset::from_seconds(0.0),
        );

        assert!(!gaze.push_gaze(&GazeSample {
            x: f64::NAN,
            y: 1.0,
            timestamp_unix_seconds: 1.0,
        }));
        assert!(!events.push_event(&EventSample {
            name: String::new(),
            timestamp_unix_seconds: 1.0,
        }));
        assert!(transport.pushes().is_empty());
        assert_eq!(gaze.stats().dropped(), 1);
        assert_eq!(events.stats().dropped(), 1);
    }
}
