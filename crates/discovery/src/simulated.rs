//! Simulated device network
//!
//! In-process stand-ins for the device SDK, used by the CLI when no hardware
//! SDK is linked and by tests to inject disconnects and failures.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{
    ContractError, DeviceClient, DeviceInfo, DeviceNetwork, DeviceStatus, EventSample, GazeReceiver,
    GazeSample, RawComponent, SimulationConfig, StatusFeed,
};
use rand::Rng;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

const GAZE_PORT: u16 = 8086;
const WORLD_PORT: u16 = 8086;
const SCENE_WIDTH: f64 = 1088.0;
const SCENE_HEIGHT: f64 = 1080.0;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_unix_ns() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

// ============================================================================
// Network
// ============================================================================

/// Simulated discovery over a fixed device list
pub struct SimulatedNetwork {
    devices: Vec<DeviceInfo>,
    /// Passes that find nothing before the devices appear
    empty_passes: u32,
    passes: AtomicU32,
}

impl SimulatedNetwork {
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self::appearing_after(0, devices)
    }

    /// Devices only show up after `empty_passes` empty passes
    pub fn appearing_after(empty_passes: u32, devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices,
            empty_passes,
            passes: AtomicU32::new(0),
        }
    }

    /// Number of discovery passes run
    pub fn passes(&self) -> u32 {
        self.passes.load(Ordering::SeqCst)
    }
}

impl DeviceNetwork for SimulatedNetwork {
    #[instrument(name = "simulated_discover", skip(self))]
    async fn discover(&self, timeout: Duration) -> Result<Vec<DeviceInfo>, ContractError> {
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        if pass <= self.empty_passes || self.devices.is_empty() {
            // Nothing answers, the full search window elapses
            tokio::time::sleep(timeout).await;
            return Ok(Vec::new());
        }
        Ok(self.devices.clone())
    }
}

// ============================================================================
// Device
// ============================================================================

struct DeviceState {
    address: String,
    port: u16,
    device_id: String,
    config: SimulationConfig,
    world_camera_serial: Mutex<Option<String>>,
    status_delay: Mutex<Duration>,
    gaze_connected: watch::Sender<bool>,
    updates: Mutex<Option<mpsc::UnboundedSender<RawComponent>>>,
    script: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    fail_event_sends: AtomicBool,
    close_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    gaze_opened: AtomicUsize,
    sent_events: Mutex<Vec<String>>,
}

/// Simulated device connection
///
/// Cloning yields another handle to the same device, so tests can drive the
/// device while the relay owns it.
#[derive(Clone)]
pub struct SimulatedDevice {
    inner: Arc<DeviceState>,
}

impl SimulatedDevice {
    pub fn new(address: &str, port: u16, config: SimulationConfig) -> Self {
        let (gaze_connected, _) = watch::channel(true);
        Self {
            inner: Arc::new(DeviceState {
                address: address.to_string(),
                port,
                device_id: format!("sim-{}", address.replace(['.', ':'], "")),
                config,
                world_camera_serial: Mutex::new(Some("SIM-WORLD-0001".to_string())),
                status_delay: Mutex::new(Duration::ZERO),
                gaze_connected,
                updates: Mutex::new(None),
                script: Mutex::new(None),
                closed: AtomicBool::new(false),
                fail_event_sends: AtomicBool::new(false),
                close_calls: AtomicUsize::new(0),
                stop_calls: AtomicUsize::new(0),
                gaze_opened: AtomicUsize::new(0),
                sent_events: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Scene camera reported as not connected
    pub fn without_world_camera(self) -> Self {
        *lock(&self.inner.world_camera_serial) = None;
        self
    }

    /// Delay every status query
    pub fn with_status_delay(self, delay: Duration) -> Self {
        *lock(&self.inner.status_delay) = delay;
        self
    }

    /// Discovery record of this device
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!(
                "PI monitor:Simulated Companion:{}._http._tcp.local.",
                self.inner.device_id
            ),
            addresses: vec![self.inner.address.clone()],
            port: self.inner.port,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    // ===== Test controls =====

    /// Gaze sensor drops off
    pub fn disconnect_gaze(&self) {
        self.set_gaze_connected(false);
    }

    /// Gaze sensor comes back
    pub fn reconnect_gaze(&self) {
        self.set_gaze_connected(true);
    }

    /// Deliver an arbitrary status component to subscribers
    pub fn push_component(&self, component: RawComponent) {
        if let Some(tx) = lock(&self.inner.updates).as_ref() {
            let _ = tx.send(component);
        }
    }

    /// Device-originated event (e.g. recording begin)
    pub fn emit_event(&self, name: &str) -> EventSample {
        let timestamp_ns = self.device_now_ns();
        self.push_component(RawComponent::new(
            "Event",
            json!({ "name": name, "timestamp": timestamp_ns }),
        ));
        EventSample::from_nanos(name, timestamp_ns)
    }

    /// Make subsequent `send_event` calls fail
    pub fn fail_event_sends(&self, fail: bool) {
        self.inner.fail_event_sends.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.inner.close_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.inner.stop_calls.load(Ordering::SeqCst)
    }

    /// Number of gaze streams opened
    pub fn gaze_opened(&self) -> usize {
        self.inner.gaze_opened.load(Ordering::SeqCst)
    }

    /// Names passed to `send_event`
    pub fn sent_events(&self) -> Vec<String> {
        lock(&self.inner.sent_events).clone()
    }

    // ===== Internals =====

    fn device_now_ns(&self) -> i64 {
        now_unix_ns() + (self.inner.config.device_clock_offset_s * 1e9) as i64
    }

    fn set_gaze_connected(&self, connected: bool) {
        self.inner.gaze_connected.send_replace(connected);
        info!(device = %self.inner.address, connected, "simulated gaze sensor changed");
        self.push_component(self.gaze_component(connected));
    }

    fn gaze_component(&self, connected: bool) -> RawComponent {
        RawComponent::new(
            "Sensor",
            json!({
                "sensor": "gaze",
                "conn_type": "DIRECT",
                "connected": connected,
                "ip": self.inner.address,
                "port": GAZE_PORT,
                "protocol": "rtsp",
                "params": "camera=gaze&audioenable=on",
            }),
        )
    }

    fn world_component(&self) -> RawComponent {
        RawComponent::new(
            "Sensor",
            json!({
                "sensor": "world",
                "conn_type": "DIRECT",
                "connected": true,
                "ip": self.inner.address,
                "port": WORLD_PORT,
                "protocol": "rtsp",
                "params": "camera=world",
            }),
        )
    }

    fn status_components(&self) -> Vec<RawComponent> {
        vec![
            RawComponent::new(
                "Phone",
                json!({
                    "device_id": self.inner.device_id,
                    "device_name": "Simulated Companion",
                    "battery_level": 0.87,
                }),
            ),
            RawComponent::new(
                "Hardware",
                json!({
                    "world_camera_serial": *lock(&self.inner.world_camera_serial),
                    "glasses_serial": "SIM-GLASSES-0001",
                }),
            ),
            self.gaze_component(*self.inner.gaze_connected.borrow()),
            self.world_component(),
        ]
    }

    fn ensure_open(&self) -> Result<(), ContractError> {
        if self.is_closed() {
            return Err(ContractError::DeviceClosed {
                address: self.inner.address.clone(),
            });
        }
        Ok(())
    }

    /// Scripted disconnect/reconnect from the simulation config
    fn spawn_script(&self) {
        let Some(disconnect_after) = self.inner.config.disconnect_after_s else {
            return;
        };
        let reconnect_after = self.inner.config.reconnect_after_s;
        let Ok(disconnect_after) = Duration::try_from_secs_f64(disconnect_after) else {
            warn!(disconnect_after, "invalid disconnect delay, script disabled");
            return;
        };
        let reconnect_after = match reconnect_after.map(Duration::try_from_secs_f64).transpose() {
            Ok(delay) => delay,
            Err(_) => {
                warn!(?reconnect_after, "invalid reconnect delay, device stays disconnected");
                None
            }
        };
        let device = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(disconnect_after).await;
            device.disconnect_gaze();
            if let Some(reconnect_after) = reconnect_after {
                tokio::time::sleep(reconnect_after).await;
                device.reconnect_gaze();
            }
        });
        if let Some(previous) = lock(&self.inner.script).replace(handle) {
            previous.abort();
        }
    }
}

impl DeviceClient for SimulatedDevice {
    type Gaze = SimulatedGaze;
    type Feed = SimulatedFeed;

    #[instrument(name = "simulated_get_status", skip(self), fields(device = %self.inner.address))]
    async fn get_status(&self) -> Result<DeviceStatus, ContractError> {
        let delay = *lock(&self.inner.status_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.ensure_open()?;
        DeviceStatus::from_components(&self.status_components())
    }

    #[instrument(name = "simulated_updates_start", skip(self), fields(device = %self.inner.address))]
    async fn receive_updates_start(&self) -> Result<SimulatedFeed, ContractError> {
        self.ensure_open()?;
        let (tx, rx) = mpsc::unbounded_channel();
        // Current sensor state first, as the SDK does on subscription
        let _ = tx.send(self.gaze_component(*self.inner.gaze_connected.borrow()));
        *lock(&self.inner.updates) = Some(tx);
        self.spawn_script();
        Ok(SimulatedFeed { rx })
    }

    async fn receive_updates_stop(&self) -> Result<(), ContractError> {
        self.inner.stop_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.updates).take();
        Ok(())
    }

    #[instrument(name = "simulated_open_gaze", skip(self))]
    async fn open_gaze(&self, url: &str) -> Result<SimulatedGaze, ContractError> {
        self.ensure_open()?;
        let connected = self.inner.gaze_connected.subscribe();
        if !*connected.borrow() {
            return Err(ContractError::sensor_stream(url, "gaze sensor not connected"));
        }
        self.inner.gaze_opened.fetch_add(1, Ordering::SeqCst);

        let rate_hz = self.inner.config.gaze_rate_hz;
        let period = Duration::try_from_secs_f64(1.0 / rate_hz)
            .ok()
            .filter(|period| !period.is_zero())
            .ok_or_else(|| ContractError::sensor_stream(url, format!("invalid gaze rate {rate_hz} Hz")))?;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        debug!(%url, rate_hz = self.inner.config.gaze_rate_hz, "gaze stream opened");

        Ok(SimulatedGaze {
            ticker,
            connected,
            clock_offset_s: self.inner.config.device_clock_offset_s,
            phase: 0.0,
            step: period.as_secs_f64(),
        })
    }

    #[instrument(name = "simulated_send_event", skip(self))]
    async fn send_event(&self, name: &str) -> Result<EventSample, ContractError> {
        self.ensure_open()?;
        if self.inner.fail_event_sends.load(Ordering::SeqCst) {
            return Err(ContractError::device_connection(
                self.inner.address.clone(),
                "event request rejected",
            ));
        }
        lock(&self.inner.sent_events).push(name.to_string());
        Ok(self.emit_event(name))
    }

    #[instrument(name = "simulated_close", skip(self), fields(device = %self.inner.address))]
    async fn close(&self) -> Result<(), ContractError> {
        self.inner.close_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.closed.store(true, Ordering::SeqCst);
        if let Some(script) = lock(&self.inner.script).take() {
            script.abort();
        }
        lock(&self.inner.updates).take();
        self.inner.gaze_connected.send_replace(false);
        Ok(())
    }
}

/// Simulated gaze stream: a slow circular sweep with jitter
pub struct SimulatedGaze {
    ticker: tokio::time::Interval,
    connected: watch::Receiver<bool>,
    clock_offset_s: f64,
    phase: f64,
    step: f64,
}

impl GazeReceiver for SimulatedGaze {
    async fn next_gaze(&mut self) -> Result<Option<GazeSample>, ContractError> {
        tokio::select! {
            _ = self.ticker.tick() => {}
            _ = self.connected.wait_for(|connected| !*connected) => return Ok(None),
        }
        if !*self.connected.borrow() {
            return Ok(None);
        }

        self.phase += self.step;
        let (jx, jy) = {
            let mut rng = rand::rng();
            (rng.random_range(-2.0..2.0), rng.random_range(-2.0..2.0))
        };
        let timestamp = now_unix_ns() as f64 * 1e-9 + self.clock_offset_s;
        Ok(Some(GazeSample {
            x: SCENE_WIDTH / 2.0 + 200.0 * self.phase.sin() + jx,
            y: SCENE_HEIGHT / 2.0 + 150.0 * self.phase.cos() + jy,
            timestamp_unix_seconds: timestamp,
        }))
    }
}

/// Simulated status notifications
pub struct SimulatedFeed {
    rx: mpsc::UnboundedReceiver<RawComponent>,
}

impl StatusFeed for SimulatedFeed {
    async fn next_update(&mut self) -> Option<RawComponent> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::StatusComponent;

    #[tokio::test(start_paused = true)]
    async fn test_feed_starts_with_sensor_state() {
        let device = SimulatedDevice::new("10.0.0.1", 8080, SimulationConfig::default());
        let mut feed = device.receive_updates_start().await.unwrap();
        let first = feed.next_update().await.unwrap();
        let StatusComponent::Sensor(sensor) = StatusComponent::try_from(&first).unwrap() else {
            panic!("expected sensor component");
        };
        assert!(sensor.is_direct_gaze());
        assert!(sensor.connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gaze_stream_ends_on_disconnect() {
        let device = SimulatedDevice::new("10.0.0.1", 8080, SimulationConfig::default());
        let mut gaze = device.open_gaze("rtsp://10.0.0.1:8086/?camera=gaze").await.unwrap();
        assert!(gaze.next_gaze().await.unwrap().is_some());

        device.disconnect_gaze();
        assert!(gaze.next_gaze().await.unwrap().is_none());
        assert!(device.open_gaze("rtsp://10.0.0.1:8086/?camera=gaze").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_updates_ends_feed() {
        let device = SimulatedDevice::new("10.0.0.1", 8080, SimulationConfig::default());
        let mut feed = device.receive_updates_start().await.unwrap();
        let _ = feed.next_update().await;
        device.receive_updates_stop().await.unwrap();
        assert!(feed.next_update().await.is_none());
        assert_eq!(device.stop_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sent_event_is_notified() {
        let device = SimulatedDevice::new("10.0.0.1", 8080, SimulationConfig::default());
        let mut feed = device.receive_updates_start().await.unwrap();
        let _ = feed.next_update().await;

        let event = device.send_event("lsl.time_sync.abc.0").await.unwrap();
        let raw = feed.next_update().await.unwrap();
        let StatusComponent::Event(notified) = StatusComponent::try_from(&raw).unwrap() else {
            panic!("expected event component");
        };
        assert_eq!(notified.name, event.name);
        assert_eq!(device.sent_events(), vec!["lsl.time_sync.abc.0".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_device_rejects_calls() {
        let device = SimulatedDevice::new("10.0.0.1", 8080, SimulationConfig::default());
        device.close().await.unwrap();
        assert!(device.is_closed());
        assert!(matches!(
            device.get_status().await.unwrap_err(),
            ContractError::DeviceClosed { .. }
        ));
        assert!(device.send_event("x").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_disconnect() {
        let config = SimulationConfig {
            disconnect_after_s: Some(2.0),
            reconnect_after_s: Some(3.0),
            ..Default::default()
        };
        let device = SimulatedDevice::new("10.0.0.1", 8080, config);
        let mut feed = device.receive_updates_start().await.unwrap();
        let _initial = feed.next_update().await.unwrap();

        let mut states = Vec::new();
        for _ in 0..2 {
            let raw = feed.next_update().await.unwrap();
            if let StatusComponent::Sensor(sensor) = StatusComponent::try_from(&raw).unwrap() {
                states.push(sensor.connected);
            }
        }
        assert_eq!(states, vec![false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_script_delays() {
        let config = SimulationConfig {
            disconnect_after_s: Some(-1.0),
            ..Default::default()
        };
        let device = SimulatedDevice::new("10.0.0.1", 8080, config);
        let _feed = device.receive_updates_start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(device.open_gaze("rtsp://10.0.0.1:8086/?camera=gaze").await.is_ok());

        let config = SimulationConfig {
            disconnect_after_s: Some(1.0),
            reconnect_after_s: Some(f64::NAN),
            ..Default::default()
        };
        let device = SimulatedDevice::new("10.0.0.1", 8080, config);
        let _feed = device.receive_updates_start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(device.open_gaze("rtsp://10.0.0.1:8086/?camera=gaze").await.is_err());
    }
}
