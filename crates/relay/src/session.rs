//! Relay session
//!
//! Wires one resolved device to its outlets and supervises the task set
//! until the first task finishes, shutdown is requested or the sensor
//! stays away past the teardown timeout.

use std::sync::Arc;
use std::time::Duration;

use contracts::{Device, DeviceClient, OutletTransport, RelayConfig};
use observability::metrics;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::clock::ClockOffset;
use crate::error::Result;
use crate::outlets::{event_stream_info, gaze_stream_info, OutputChannel};
use crate::queue::sample_queue;
use crate::stream::{publish_events, publish_gaze};
use crate::supervisor::{ConnectionSupervisor, SensorState, SessionTeardown, TeardownReason};
use crate::tasks::TaskSet;
use crate::time_sync::run_time_sync;

/// Session parameters derived from `RelayConfig`
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub outlet_prefix: String,
    /// `None` disables time-sync events
    pub time_sync_interval: Option<Duration>,
    pub teardown_timeout: Duration,
    pub gaze_wait_timeout: Duration,
    /// `None` runs until shutdown or teardown
    pub session_timeout: Option<Duration>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            outlet_prefix: config.outlet_prefix.clone(),
            time_sync_interval: config.time_sync_interval(),
            teardown_timeout: config.teardown_timeout(),
            gaze_wait_timeout: config.gaze_wait_timeout(),
            session_timeout: config.session_timeout(),
        }
    }
}

/// Outcome of a finished session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub gaze_pushed: u64,
    pub events_pushed: u64,
    pub dropped: u64,
    /// Ended by the sensor teardown timeout
    pub torn_down: bool,
    /// Task that finished first
    pub first_finished: &'static str,
}

/// One relay run against one device
pub struct RelaySession<C, T> {
    device: Device,
    client: Arc<C>,
    transport: T,
    settings: RelaySettings,
    session_id: Uuid,
}

impl<C: DeviceClient, T: OutletTransport> RelaySession<C, T> {
    pub fn new(device: Device, client: Arc<C>, transport: T, settings: RelaySettings) -> Self {
        Self {
            device,
            client,
            transport,
            settings,
            session_id: Uuid::new_v4(),
        }
    }

    /// Fixed session id instead of a random one
    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Run until a task finishes, then clean up
    ///
    /// # Errors
    /// Outlet creation, status subscription or any supervised task failure.
    #[instrument(
        name = "relay_session",
        skip_all,
        fields(device = %self.device.endpoint(), session = %self.session_id)
    )]
    pub async fn run(self, shutdown: CancellationToken) -> Result<SessionSummary> {
        let session_id = self.session_id.to_string();
        let offset = ClockOffset::measure(&self.transport);

        let gaze_outlet = self.transport.create_outlet(gaze_stream_info(
            &self.device,
            &self.settings.outlet_prefix,
            &session_id,
        ))?;
        let event_outlet = self.transport.create_outlet(event_stream_info(
            &self.device,
            &self.settings.outlet_prefix,
            &session_id,
        ))?;
        let gaze_channel = OutputChannel::new(gaze_outlet, offset);
        let event_channel = OutputChannel::new(event_outlet, offset);
        let gaze_stats = gaze_channel.stats();
        let event_stats = event_channel.stats();
        info!(
            gaze = %gaze_channel.info().name,
            event = %event_channel.info().name,
            transport = self.transport.name(),
            "outlets created"
        );

        let feed = self.client.receive_updates_start().await?;
        metrics::record_sensor_state(SensorState::Unconnected.code());

        let mut tasks = TaskSet::new(&shutdown);
        let teardown = Arc::new(SessionTeardown::new(Arc::clone(&self.client), tasks.token().clone()));
        let (gaze_tx, gaze_rx) = sample_queue();
        let (event_tx, event_rx) = sample_queue();

        let supervisor = ConnectionSupervisor::new(
            Arc::clone(&self.client),
            gaze_tx,
            event_tx,
            self.settings.teardown_timeout,
            Arc::clone(&teardown),
            tasks.token().clone(),
        );
        tasks.spawn("status", move |_| supervisor.run(feed));

        let wait = self.settings.gaze_wait_timeout;
        tasks.spawn("gaze_publisher", move |_| publish_gaze(gaze_rx, gaze_channel, wait));
        tasks.spawn("event_publisher", move |_| publish_events(event_rx, event_channel));

        if let Some(interval) = self.settings.time_sync_interval {
            let client = Arc::clone(&self.client);
            let id = self.session_id;
            tasks.spawn("time_sync", move |_| run_time_sync(client, id, interval));
        }
        if let Some(limit) = self.settings.session_timeout {
            tasks.spawn("session_timer", move |_| async move {
                tokio::time::sleep(limit).await;
                info!(limit_s = limit.as_secs_f64(), "session duration reached");
                Ok(())
            });
        }

        info!(tasks = tasks.len(), "relay session started");
        let report = tasks.run_until_first().await;
        let reason = teardown.run(TeardownReason::SessionEnded).await;

        let first_finished = report.as_ref().map_or("none", |r| r.first.0);
        let summary = SessionSummary {
            session_id: self.session_id,
            gaze_pushed: gaze_stats.pushed(),
            events_pushed: event_stats.pushed(),
            dropped: gaze_stats.dropped() + event_stats.dropped(),
            torn_down: reason == TeardownReason::SensorTimeout,
            first_finished,
        };

        if let Some(report) = report {
            if let Err(e) = report.into_result() {
                warn!(error = %e, "relay session ended with a failed task");
                return Err(e);
            }
        }
        info!(
            gaze_pushed = summary.gaze_pushed,
            events_pushed = summary.events_pushed,
            dropped = summary.dropped,
            torn_down = summary.torn_down,
            first_finished,
            "relay session finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use contracts::{SensorKind, SimulationConfig};
    use discovery::SimulatedDevice;

    fn device(sim: &SimulatedDevice) -> Device {
        Device {
            address: "10.0.0.9".into(),
            port: 8080,
            identifier: sim.device_id().to_string(),
            world_camera_serial: "SIM-WORLD-0001".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_timer_ends_session() {
        let sim = SimulatedDevice::new("10.0.0.9", 8080, SimulationConfig::default());
        let transport = MemoryTransport::new();
        let settings = RelaySettings {
            session_timeout: Some(Duration::from_secs(5)),
            time_sync_interval: Some(Duration::from_secs(2)),
            ..RelaySettings::default()
        };
        let session = RelaySession::new(device(&sim), Arc::new(sim.clone()), transport.clone(), settings);
        let session_id = session.session_id();

        let summary = session.run(CancellationToken::new()).await.unwrap();
        assert_eq!(summary.first_finished, "session_timer");
        assert!(!summary.torn_down);
        assert!(summary.gaze_pushed > 0);
        assert_eq!(sim.close_calls(), 1);

        let outlets = transport.outlets();
        assert_eq!(outlets.len(), 2);
        assert_eq!(outlets[0].source_id, format!("{}_Gaze", sim.device_id()));

        let sent = sim.sent_events();
        assert!(sent.len() >= 2, "sent: {sent:?}");
        assert_eq!(sent[0], format!("lsl.time_sync.{session_id}.0"));
        assert!(transport.push_count(SensorKind::Event) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_token_cleans_up() {
        let sim = SimulatedDevice::new("10.0.0.9", 8080, SimulationConfig::default());
        let session = RelaySession::new(
            device(&sim),
            Arc::new(sim.clone()),
            MemoryTransport::new(),
            RelaySettings::default(),
        );
        let shutdown = CancellationToken::new();
        let run = tokio::spawn(session.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.cancel();

        let summary = run.await.unwrap().unwrap();
        assert!(!summary.torn_down);
        assert_eq!(sim.close_calls(), 1);
        assert_eq!(sim.stop_calls(), 1);
    }
}
