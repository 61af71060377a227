//! Stream tasks: gaze receive loop and per-kind publishers

use std::sync::Arc;
use std::time::Duration;

use contracts::{DeviceClient, EventSample, GazeReceiver, GazeSample, Outlet, SensorEndpoint, SensorKind};
use observability::metrics;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::error::Result;
use crate::outlets::OutputChannel;
use crate::queue::{Dequeue, QueueReceiver, QueueSender};

/// Delay before rechecking an unknown endpoint or reopening a stream
pub const ENDPOINT_RECHECK: Duration = Duration::from_secs(1);

/// Time without data after which warnings escalate to errors
pub const NO_DATA_ESCALATION: Duration = Duration::from_secs(60);

/// Accumulates time spent without data on one publisher
#[derive(Debug)]
pub struct NoDataWatchdog {
    kind: SensorKind,
    without_data: Duration,
}

impl NoDataWatchdog {
    pub fn new(kind: SensorKind) -> Self {
        Self {
            kind,
            without_data: Duration::ZERO,
        }
    }

    pub fn without_data(&self) -> Duration {
        self.without_data
    }

    pub fn on_data(&mut self) {
        if !self.without_data.is_zero() {
            debug!(kind = %self.kind, after_s = self.without_data.as_secs_f64(), "data resumed");
        }
        self.without_data = Duration::ZERO;
    }

    /// Record a wait without data; returns true once escalated
    pub fn on_timeout(&mut self, waited: Duration) -> bool {
        self.without_data += waited;
        let seconds = self.without_data.as_secs_f64();
        if self.without_data >= NO_DATA_ESCALATION {
            error!(kind = %self.kind, without_data_s = seconds, "no data received for over a minute");
            true
        } else {
            warn!(kind = %self.kind, without_data_s = seconds, "no data received");
            false
        }
    }
}

fn available_url(endpoint: &watch::Receiver<SensorEndpoint>) -> Option<String> {
    let endpoint = endpoint.borrow();
    if endpoint.is_available() {
        endpoint.url.clone()
    } else {
        None
    }
}

/// Pull gaze samples from the current endpoint into the queue
///
/// Runs until cancelled or the queue consumer is gone.
#[instrument(name = "gaze_receive", skip_all)]
pub async fn receive_gaze<C: DeviceClient>(
    client: Arc<C>,
    endpoint: watch::Receiver<SensorEndpoint>,
    queue: QueueSender<GazeSample>,
) -> Result<()> {
    loop {
        let Some(url) = available_url(&endpoint) else {
            debug!("gaze endpoint not available yet");
            tokio::time::sleep(ENDPOINT_RECHECK).await;
            continue;
        };

        match client.open_gaze(&url).await {
            Ok(mut gaze) => {
                info!(url = %url, "gaze stream opened");
                loop {
                    match gaze.next_gaze().await {
                        Ok(Some(sample)) => {
                            if queue.send(sample).await.is_err() {
                                debug!("gaze queue closed");
                                return Ok(());
                            }
                        }
                        Ok(None) => {
                            info!(url = %url, "gaze stream ended");
                            break;
                        }
                        Err(e) => {
                            warn!(url = %url, error = %e, "gaze stream error");
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!(url = %url, error = %e, "failed to open gaze stream"),
        }
        tokio::time::sleep(ENDPOINT_RECHECK).await;
    }
}

/// Publish gaze samples with a bounded dequeue wait
///
/// Completes when every queue producer is gone.
#[instrument(name = "gaze_publish", skip_all, fields(outlet = %channel.info().name))]
pub async fn publish_gaze<O: Outlet>(
    queue: QueueReceiver<GazeSample>,
    channel: OutputChannel<O>,
    wait: Duration,
) -> Result<()> {
    let mut watchdog = NoDataWatchdog::new(SensorKind::Gaze);
    loop {
        match queue.recv_timeout(Some(wait)).await {
            Dequeue::Item(sample) => {
                watchdog.on_data();
                channel.push_gaze(&sample);
            }
            Dequeue::TimedOut => {
                metrics::record_dequeue_timeout(SensorKind::Gaze.as_str());
                watchdog.on_timeout(wait);
            }
            Dequeue::Closed => {
                debug!("gaze queue closed");
                return Ok(());
            }
        }
    }
}

/// Publish events as they arrive
#[instrument(name = "event_publish", skip_all, fields(outlet = %channel.info().name))]
pub async fn publish_events<O: Outlet>(
    queue: QueueReceiver<EventSample>,
    channel: OutputChannel<O>,
) -> Result<()> {
    loop {
        match queue.recv_timeout(None).await {
            Dequeue::Item(event) => {
                debug!(event = %event.name, "publishing event");
                channel.push_event(&event);
            }
            Dequeue::TimedOut => {}
            Dequeue::Closed => {
                debug!("event queue closed");
                return Ok(());
            }
        }
    }
}
