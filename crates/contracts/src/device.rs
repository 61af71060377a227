//! Device identity and status components
//!
//! The device SDK reports its state as a list of `(model, data)` components,
//! both in the one-shot status query and in push notifications. Decoding is
//! fallible: a malformed component yields `ContractError::MalformedStatus`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ContractError, EventSample, SensorEndpoint, SensorKind};

/// Device found by network discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Full service name, e.g. `"PI monitor:Companion:abc123._http._tcp.local."`
    pub name: String,
    /// Resolved addresses, first one is used
    pub addresses: Vec<String>,
    pub port: u16,
}

impl DeviceInfo {
    /// Human-readable name (second segment of the service name)
    pub fn display_name(&self) -> &str {
        self.name.split(':').nth(1).unwrap_or(&self.name)
    }

    /// First resolved address, if any
    pub fn address(&self) -> Option<&str> {
        self.addresses.first().map(String::as_str)
    }
}

/// Identity of the device a relay session is bound to
///
/// Resolved once after selection, immutable for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub address: String,
    pub port: u16,
    /// Phone device id, used to derive outlet source ids
    pub identifier: String,
    /// Scene camera serial, `"default"` when the camera is not connected
    pub world_camera_serial: String,
}

impl Device {
    /// `ip:port` form used in logs
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Raw status component as delivered by the SDK
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComponent {
    pub model: String,
    #[serde(default)]
    pub data: Value,
}

impl RawComponent {
    pub fn new(model: impl Into<String>, data: Value) -> Self {
        Self {
            model: model.into(),
            data,
        }
    }
}

/// Sensor connection type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionType {
    Direct,
    Websocket,
}

/// Status of one sensor stream on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorStatus {
    /// Sensor name, e.g. `"gaze"` or `"world"`
    pub sensor: String,
    pub conn_type: ConnectionType,
    pub connected: bool,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub params: Option<String>,
}

impl SensorStatus {
    /// Stream url, only while connected
    pub fn url(&self) -> Option<String> {
        if !self.connected {
            return None;
        }
        let ip = self.ip.as_deref()?;
        let port = self.port?;
        let protocol = self.protocol.as_deref().unwrap_or("rtsp");
        let params = self.params.as_deref().unwrap_or_default();
        Some(format!("{protocol}://{ip}:{port}/?{params}"))
    }

    /// Whether this is the direct gaze stream the relay consumes
    pub fn is_direct_gaze(&self) -> bool {
        self.sensor == "gaze" && self.conn_type == ConnectionType::Direct
    }

    /// Endpoint view of this sensor
    pub fn endpoint(&self) -> SensorEndpoint {
        SensorEndpoint {
            kind: SensorKind::Gaze,
            url: self.url(),
            connected: self.connected,
        }
    }
}

/// Phone (companion app) information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneInfo {
    pub device_id: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub battery_level: Option<f64>,
}

/// Glasses hardware information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareInfo {
    #[serde(default)]
    pub world_camera_serial: Option<String>,
    #[serde(default)]
    pub glasses_serial: Option<String>,
}

/// Device event notification payload (nanosecond timestamp)
#[derive(Debug, Clone, Deserialize)]
struct EventData {
    name: String,
    timestamp: i64,
}

/// Decoded status component
#[derive(Debug, Clone, PartialEq)]
pub enum StatusComponent {
    Sensor(SensorStatus),
    Event(EventSample),
    Phone(PhoneInfo),
    Hardware(HardwareInfo),
    /// Models the relay does not consume (recording, battery, ...)
    Other { model: String },
}

impl TryFrom<&RawComponent> for StatusComponent {
    type Error = ContractError;

    fn try_from(raw: &RawComponent) -> Result<Self, Self::Error> {
        let decode_err = |e: serde_json::Error| ContractError::malformed_status(&raw.model, e.to_string());
        match raw.model.as_str() {
            "Sensor" => Ok(Self::Sensor(
                serde_json::from_value(raw.data.clone()).map_err(decode_err)?,
            )),
            "Event" => {
                let data: EventData = serde_json::from_value(raw.data.clone()).map_err(decode_err)?;
                if data.name.is_empty() {
                    return Err(ContractError::malformed_status(&raw.model, "empty event name"));
                }
                Ok(Self::Event(EventSample::from_nanos(data.name, data.timestamp)))
            }
            "Phone" => Ok(Self::Phone(
                serde_json::from_value(raw.data.clone()).map_err(decode_err)?,
            )),
            "Hardware" => Ok(Self::Hardware(
                serde_json::from_value(raw.data.clone()).map_err(decode_err)?,
            )),
            other => Ok(Self::Other {
                model: other.to_string(),
            }),
        }
    }
}

/// Full device status snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    pub phone: PhoneInfo,
    pub hardware: HardwareInfo,
    pub sensors: Vec<SensorStatus>,
}

impl DeviceStatus {
    /// Assemble a snapshot from raw components
    ///
    /// # Errors
    /// Fails if any component is malformed or no `Phone` component is present.
    pub fn from_components(components: &[RawComponent]) -> Result<Self, ContractError> {
        let mut phone = None;
        let mut hardware = HardwareInfo::default();
        let mut sensors = Vec::new();

        for raw in components {
            match StatusComponent::try_from(raw)? {
                StatusComponent::Phone(p) => phone = Some(p),
                StatusComponent::Hardware(h) => hardware = h,
                StatusComponent::Sensor(s) => sensors.push(s),
                StatusComponent::Event(_) | StatusComponent::Other { .. } => {}
            }
        }

        let phone = phone.ok_or_else(|| ContractError::malformed_status("Phone", "missing component"))?;
        Ok(Self {
            phone,
            hardware,
            sensors,
        })
    }

    /// Direct gaze sensor, if reported
    pub fn direct_gaze_sensor(&self) -> Option<&SensorStatus> {
        self.sensors.iter().find(|s| s.is_direct_gaze())
    }
}
