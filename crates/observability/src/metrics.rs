//! Relay metrics
//!
//! Thin recorders over the `metrics` facade.

use metrics::{counter, gauge, histogram};

/// Sample pushed to an outlet
pub fn record_sample_pushed(kind: &str) {
    counter!("gaze_relay_samples_pushed_total", "kind" => kind.to_string()).increment(1);
}

/// Sample dropped before reaching the outlet
pub fn record_sample_dropped(kind: &str, reason: &'static str) {
    counter!(
        "gaze_relay_samples_dropped_total",
        "kind" => kind.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Bounded dequeue wait elapsed without data
pub fn record_dequeue_timeout(kind: &str) {
    counter!("gaze_relay_dequeue_timeouts_total", "kind" => kind.to_string()).increment(1);
}

/// Connection supervisor state (0 unconnected, 1 connected, 2 pending teardown, 3 torn down)
pub fn record_sensor_state(code: u8) {
    gauge!("gaze_relay_sensor_state").set(f64::from(code));
}

/// Gaze sensor came back before the teardown timer elapsed
pub fn record_reconnect() {
    counter!("gaze_relay_reconnects_total").increment(1);
}

/// Time-sync event send attempt
pub fn record_time_sync_event(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("gaze_relay_time_sync_events_total", "status" => status).increment(1);
}

/// Device timestamp to publish delay
pub fn record_publish_latency_ms(kind: &str, latency_ms: f64) {
    histogram!("gaze_relay_publish_latency_ms", "kind" => kind.to_string()).record(latency_ms);
}

/// Malformed status component dropped
pub fn record_malformed_status(model: &str) {
    counter!("gaze_relay_malformed_status_total", "model" => model.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: calls are no-ops
        record_sample_pushed("Gaze");
        record_sample_dropped("Event", "invalid");
        record_sensor_state(1);
        record_time_sync_event(false);
    }
}
