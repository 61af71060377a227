//! Connection supervisor
//!
//! Status notifications become typed sensor events fed to a pure transition
//! function. The supervisor owns the gaze receive task and the debounced
//! teardown timer.
//!
//! ```text
//! Unconnected --available--> Connected --unavailable--> DisconnectedPendingTimeout
//!                                ^                          |            |
//!                                +-------available----------+     timer elapsed
//!                                                                        v
//!                                                                    TornDown
//! ```

use std::sync::Arc;
use std::time::Duration;

use contracts::{
    DeviceClient, EventSample, GazeSample, RawComponent, SensorEndpoint, SensorKind, StatusComponent,
    StatusFeed,
};
use observability::metrics;
use tokio::sync::{watch, OnceCell};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::queue::QueueSender;
use crate::stream::receive_gaze;
use crate::tasks::TaskHandle;

/// Gaze sensor connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    Unconnected,
    Connected,
    DisconnectedPendingTimeout,
    /// Terminal
    TornDown,
}

impl SensorState {
    /// Gauge value
    pub fn code(&self) -> u8 {
        match self {
            Self::Unconnected => 0,
            Self::Connected => 1,
            Self::DisconnectedPendingTimeout => 2,
            Self::TornDown => 3,
        }
    }
}

/// Input of the transition function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorEvent {
    GazeAvailable,
    GazeUnavailable,
    TeardownElapsed,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartStreaming,
    /// Cancel streaming and arm the teardown timer
    SuspendStreaming,
    /// Disarm the timer and restart streaming
    ResumeStreaming,
    Teardown,
    Ignore,
}

/// Pure state transition
pub fn transition(state: SensorState, event: SensorEvent) -> (SensorState, Action) {
    use SensorEvent::*;
    use SensorState::*;

    match (state, event) {
        (Unconnected, GazeAvailable) => (Connected, Action::StartStreaming),
        (Connected, GazeUnavailable) => (DisconnectedPendingTimeout, Action::SuspendStreaming),
        (DisconnectedPendingTimeout, GazeAvailable) => (Connected, Action::ResumeStreaming),
        (DisconnectedPendingTimeout, TeardownElapsed) => (TornDown, Action::Teardown),
        (state, _) => (state, Action::Ignore),
    }
}

/// Why the session was cleaned up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// Gaze sensor stayed away past the teardown timeout
    SensorTimeout,
    /// A supervised task finished or shutdown was requested
    SessionEnded,
}

/// Full session cleanup, runs at most once
pub struct SessionTeardown<C> {
    client: Arc<C>,
    token: CancellationToken,
    done: OnceCell<TeardownReason>,
}

impl<C: DeviceClient> SessionTeardown<C> {
    /// `token` is cancelled last, stopping every residual task
    pub fn new(client: Arc<C>, token: CancellationToken) -> Self {
        Self {
            client,
            token,
            done: OnceCell::new(),
        }
    }

    /// Run cleanup unless it already ran; returns the reason of the run that happened
    pub async fn run(&self, reason: TeardownReason) -> TeardownReason {
        *self
            .done
            .get_or_init(|| async {
                info!(?reason, "tearing down relay session");
                if let Err(e) = self.client.receive_updates_stop().await {
                    warn!(error = %e, "failed to stop status updates");
                }
                if let Err(e) = self.client.close().await {
                    warn!(error = %e, "failed to close device connection");
                }
                self.token.cancel();
                reason
            })
            .await
    }

    pub fn reason(&self) -> Option<TeardownReason> {
        self.done.get().copied()
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Drives the sensor state machine from status notifications
pub struct ConnectionSupervisor<C: DeviceClient> {
    client: Arc<C>,
    state: SensorState,
    endpoint: watch::Sender<SensorEndpoint>,
    gaze_queue: QueueSender<GazeSample>,
    event_queue: QueueSender<EventSample>,
    teardown_timeout: Duration,
    deadline: Option<Instant>,
    streaming: Option<TaskHandle>,
    teardown: Arc<SessionTeardown<C>>,
    token: CancellationToken,
    reconnects: u32,
}

impl<C: DeviceClient> ConnectionSupervisor<C> {
    /// Streaming tasks run under child tokens of `token`
    pub fn new(
        client: Arc<C>,
        gaze_queue: QueueSender<GazeSample>,
        event_queue: QueueSender<EventSample>,
        teardown_timeout: Duration,
        teardown: Arc<SessionTeardown<C>>,
        token: CancellationToken,
    ) -> Self {
        let (endpoint, _) = watch::channel(SensorEndpoint::unknown(SensorKind::Gaze));
        Self {
            client,
            state: SensorState::Unconnected,
            endpoint,
            gaze_queue,
            event_queue,
            teardown_timeout,
            deadline: None,
            streaming: None,
            teardown,
            token,
            reconnects: 0,
        }
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    /// Pending teardown deadline
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn endpoint(&self) -> watch::Receiver<SensorEndpoint> {
        self.endpoint.subscribe()
    }

    /// Process one status notification
    pub async fn on_status_update(&mut self, raw: &RawComponent) {
        let component = match StatusComponent::try_from(raw) {
            Ok(component) => component,
            Err(e) => {
                warn!(error = %e, "malformed status update dropped");
                metrics::record_malformed_status(&raw.model);
                return;
            }
        };

        match component {
            StatusComponent::Sensor(sensor) if sensor.is_direct_gaze() => {
                let endpoint = sensor.endpoint();
                let event = if endpoint.is_available() {
                    SensorEvent::GazeAvailable
                } else {
                    SensorEvent::GazeUnavailable
                };
                debug!(url = ?endpoint.url, connected = endpoint.connected, "gaze endpoint update");
                self.endpoint.send_replace(endpoint);
                self.handle(event).await;
            }
            StatusComponent::Sensor(sensor) => {
                debug!(sensor = %sensor.sensor, conn_type = ?sensor.conn_type, connected = sensor.connected, "ignoring sensor update");
            }
            StatusComponent::Event(event) => {
                debug!(event = %event.name, "device event");
                if self.event_queue.try_send(event).is_err() {
                    debug!("event queue closed, event dropped");
                }
            }
            StatusComponent::Phone(_) | StatusComponent::Hardware(_) | StatusComponent::Other { .. } => {
                debug!(model = %raw.model, "ignoring status update");
            }
        }
    }

    /// Apply one sensor event
    pub async fn handle(&mut self, event: SensorEvent) {
        let (next, action) = transition(self.state, event);
        if next != self.state {
            info!(from = ?self.state, to = ?next, ?event, "sensor state changed");
            metrics::record_sensor_state(next.code());
        }
        self.state = next;

        match action {
            Action::StartStreaming => self.start_streaming(),
            Action::SuspendStreaming => {
                self.stop_streaming();
                self.deadline = Some(Instant::now() + self.teardown_timeout);
                warn!(timeout_s = self.teardown_timeout.as_secs_f64(), "gaze sensor disconnected, waiting for reconnect");
            }
            Action::ResumeStreaming => {
                self.deadline = None;
                self.reconnects += 1;
                metrics::record_reconnect();
                info!(reconnects = self.reconnects, "gaze sensor reconnected");
                self.start_streaming();
            }
            Action::Teardown => {
                self.deadline = None;
                self.stop_streaming();
                self.teardown.run(TeardownReason::SensorTimeout).await;
            }
            Action::Ignore => {}
        }
    }

    fn start_streaming(&mut self) {
        self.stop_streaming();
        let client = Arc::clone(&self.client);
        let endpoint = self.endpoint.subscribe();
        let queue = self.gaze_queue.clone();
        self.streaming = Some(TaskHandle::spawn("gaze_receive", &self.token, move |_| {
            receive_gaze(client, endpoint, queue)
        }));
    }

    fn stop_streaming(&mut self) {
        if let Some(handle) = self.streaming.take() {
            debug!(task = handle.name(), "cancelling streaming task");
            handle.cancel();
        }
    }

    /// Consume notifications until teardown or the feed ends
    #[instrument(name = "connection_supervisor", skip_all)]
    pub async fn run<F: StatusFeed>(mut self, mut feed: F) -> Result<()> {
        loop {
            tokio::select! {
                update = feed.next_update() => match update {
                    Some(raw) => self.on_status_update(&raw).await,
                    None => {
                        info!("status updates ended");
                        break;
                    }
                },
                _ = wait_deadline(self.deadline) => self.handle(SensorEvent::TeardownElapsed).await,
            }
            if self.state == SensorState::TornDown {
                break;
            }
        }
        self.stop_streaming();
        Ok(())
    }
}

impl<C: DeviceClient> Drop for ConnectionSupervisor<C> {
    fn drop(&mut self) {
        self.stop_streaming();
    }
}
