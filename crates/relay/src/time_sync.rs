//! Periodic time-sync events
//!
//! Named events sent to the device end up both in the live event outlet and
//! in the cloud export, giving post-hoc alignment matching anchors.

use std::sync::Arc;
use std::time::Duration;

use contracts::DeviceClient;
use observability::metrics;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::Result;

pub const TIME_SYNC_PREFIX: &str = "lsl.time_sync";

/// `lsl.time_sync.<session uuid>.<counter>`
pub fn time_sync_event_name(session_id: &Uuid, counter: u64) -> String {
    format!("{TIME_SYNC_PREFIX}.{session_id}.{counter}")
}

/// Send one event per interval, the first immediately
///
/// Failed sends are logged; the task only ends on cancellation.
#[instrument(name = "time_sync", skip(client, interval), fields(interval_s = interval.as_secs_f64()))]
pub async fn run_time_sync<C: DeviceClient>(client: Arc<C>, session_id: Uuid, interval: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut counter = 0u64;
    loop {
        ticker.tick().await;
        let name = time_sync_event_name(&session_id, counter);
        match client.send_event(&name).await {
            Ok(event) => {
                debug!(event = %event.name, timestamp = event.timestamp_unix_seconds, "time sync event sent");
                metrics::record_time_sync_event(true);
            }
            Err(e) => {
                warn!(event = %name, error = %e, "failed to send time sync event");
                metrics::record_time_sync_event(false);
            }
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(
            time_sync_event_name(&id, 3),
            "lsl.time_sync.67e55044-10b1-426f-9247-bb680e5fe0c8.3"
        );
    }
}
