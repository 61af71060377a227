//! NetworkTransport - UDP fire-and-forget streaming

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use contracts::{ContractError, Outlet, OutletTransport, SampleValues, StreamInfo};
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

#[derive(Serialize)]
enum Packet<'a> {
    /// Sent once on outlet creation
    Stream(&'a StreamInfo),
    Sample {
        source_id: &'a str,
        timestamp: f64,
        values: &'a SampleValues,
    },
}

/// Transport sending datagrams to one target
pub struct NetworkTransport {
    target: SocketAddr,
    format: NetworkFormat,
    socket: Arc<UdpSocket>,
}

impl NetworkTransport {
    #[instrument(name = "network_transport_new", skip(format))]
    pub fn new(target: SocketAddr, format: NetworkFormat) -> std::io::Result<Self> {
        let bind: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind)?;
        socket.connect(target)?;
        socket.set_nonblocking(true)?;
        debug!(target = %target, "network transport connected");

        Ok(Self {
            target,
            format,
            socket: Arc::new(socket),
        })
    }

    /// Create from params map (`addr` required, `format` json | bincode)
    pub fn from_params(params: &HashMap<String, String>) -> std::io::Result<Self> {
        let invalid = |message: String| std::io::Error::new(std::io::ErrorKind::InvalidInput, message);

        let addr = params
            .get("addr")
            .ok_or_else(|| invalid("missing 'addr' parameter".to_string()))?;
        let target: SocketAddr = addr
            .parse()
            .map_err(|e| invalid(format!("invalid address '{addr}': {e}")))?;
        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(invalid(format!("unknown format '{other}'"))),
        };
        Self::new(target, format)
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

fn encode(format: NetworkFormat, packet: &Packet<'_>) -> Result<Vec<u8>, String> {
    match format {
        NetworkFormat::Json => serde_json::to_vec(packet).map_err(|e| format!("json error: {e}")),
        NetworkFormat::Bincode => bincode::serialize(packet).map_err(|e| format!("bincode error: {e}")),
    }
}

impl OutletTransport for NetworkTransport {
    type Outlet = NetworkOutlet;

    fn name(&self) -> &str {
        "network"
    }

    fn create_outlet(&self, info: StreamInfo) -> Result<NetworkOutlet, ContractError> {
        let data = encode(self.format, &Packet::Stream(&info))
            .map_err(|e| ContractError::outlet_create(&info.name, e))?;
        if let Err(e) = self.socket.send(&data) {
            // Best effort: receivers may join later
            warn!(outlet = %info.name, error = %e, "stream announcement not sent");
        }
        Ok(NetworkOutlet {
            info,
            format: self.format,
            socket: Arc::clone(&self.socket),
        })
    }

    fn local_clock(&self) -> f64 {
        super::monotonic_clock()
    }
}

pub struct NetworkOutlet {
    info: StreamInfo,
    format: NetworkFormat,
    socket: Arc<UdpSocket>,
}

impl Outlet for NetworkOutlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn push(&self, values: SampleValues, timestamp: f64) -> Result<(), ContractError> {
        let packet = Packet::Sample {
            source_id: &self.info.source_id,
            timestamp,
            values: &values,
        };
        let data = encode(self.format, &packet).map_err(|e| ContractError::outlet_push(&self.info.name, e))?;
        self.socket
            .send(&data)
            .map(|_| ())
            .map_err(|e| ContractError::outlet_push(&self.info.name, format!("UDP send failed: {e}")))
    }
}
