//! Outlet contracts - output transport interface
//!
//! An outlet is a named, typed, append-only channel group identified by a
//! stable source id. Pushes carry a timestamp in the transport clock domain
//! and are not acknowledged.

use serde::{Deserialize, Serialize};

use crate::{ContractError, SensorKind};

/// Value format of every channel in a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelFormat {
    Double64,
    Float32,
    String,
}

/// Per-channel metadata, kept in insertion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub entries: Vec<(String, String)>,
}

impl ChannelInfo {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a metadata entry
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.entries.push((key.to_string(), value.to_string()));
        self
    }

    /// Look up a metadata entry
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Channel label
    pub fn label(&self) -> Option<&str> {
        self.get("label")
    }
}

impl Default for ChannelInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream description handed to the transport on outlet creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// e.g. `"pupil_invisible_Gaze"`
    pub name: String,
    pub kind: SensorKind,
    pub channel_format: ChannelFormat,
    /// Stable id, `"{device_identifier}_{kind}"`
    pub source_id: String,
    /// 0.0 for irregular rate
    pub nominal_srate: f64,
    pub channels: Vec<ChannelInfo>,
    /// Top-level description entries (relay version, ...)
    pub desc: Vec<(String, String)>,
    /// `desc/acquisition` entries
    pub acquisition: Vec<(String, String)>,
}

impl StreamInfo {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Look up an acquisition entry
    pub fn acquisition_value(&self, key: &str) -> Option<&str> {
        self.acquisition
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// One pushed sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValues {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl SampleValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Created outlet
pub trait Outlet: Send + Sync {
    /// Stream description the outlet was created with
    fn info(&self) -> &StreamInfo;

    /// Push one sample (fire-and-forget)
    ///
    /// # Errors
    /// Local transport failure only; there is no delivery acknowledgment.
    fn push(&self, values: SampleValues, timestamp: f64) -> Result<(), ContractError>;
}

/// Output transport: creates outlets and exposes its clock
pub trait OutletTransport: Send + Sync {
    type Outlet: Outlet + 'static;

    /// Transport name (used for logging)
    fn name(&self) -> &str;

    /// Create an outlet for the given description
    fn create_outlet(&self, info: StreamInfo) -> Result<Self::Outlet, ContractError>;

    /// Current time in the transport clock domain (seconds)
    fn local_clock(&self) -> f64;
}
