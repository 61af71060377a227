//! FileTransport - one JSON-lines file per outlet
//!
//! First line holds the stream description, every further line one sample.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use contracts::{ContractError, Outlet, OutletTransport, SampleValues, StreamInfo};
use serde::Serialize;
use tracing::{debug, instrument};

#[derive(Serialize)]
struct HeaderLine<'a> {
    stream: &'a StreamInfo,
}

#[derive(Serialize)]
struct SampleLine<'a> {
    timestamp: f64,
    values: &'a SampleValues,
}

/// Transport writing below a base directory
#[derive(Debug)]
pub struct FileTransport {
    base_path: PathBuf,
}

impl FileTransport {
    pub fn new(base_path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Create from params map (`path`, default `./outlets`)
    pub fn from_params(params: &HashMap<String, String>) -> std::io::Result<Self> {
        let base_path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./outlets"));
        Self::new(base_path)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// File an outlet of this name is written to
    pub fn outlet_path(&self, outlet_name: &str) -> PathBuf {
        self.base_path.join(format!("{outlet_name}.jsonl"))
    }
}

impl OutletTransport for FileTransport {
    type Outlet = FileOutlet;

    fn name(&self) -> &str {
        "file"
    }

    #[instrument(name = "file_transport_create_outlet", skip(self, info), fields(outlet = %info.name))]
    fn create_outlet(&self, info: StreamInfo) -> Result<FileOutlet, ContractError> {
        let path = self.outlet_path(&info.name);
        let create_err = |e: std::io::Error| ContractError::outlet_create(&info.name, e.to_string());

        let mut writer = LineWriter::new(File::create(&path).map_err(create_err)?);
        let header = serde_json::to_string(&HeaderLine { stream: &info })
            .map_err(|e| ContractError::outlet_create(&info.name, e.to_string()))?;
        writeln!(writer, "{header}").map_err(create_err)?;

        debug!(path = %path.display(), "file outlet created");
        Ok(FileOutlet {
            info,
            path,
            writer: Mutex::new(writer),
        })
    }

    fn local_clock(&self) -> f64 {
        super::monotonic_clock()
    }
}

pub struct FileOutlet {
    info: StreamInfo,
    path: PathBuf,
    writer: Mutex<LineWriter<File>>,
}

impl FileOutlet {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Outlet for FileOutlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn push(&self, values: SampleValues, timestamp: f64) -> Result<(), ContractError> {
        let line = serde_json::to_string(&SampleLine {
            timestamp,
            values: &values,
        })
        .map_err(|e| ContractError::outlet_push(&self.info.name, e.to_string()))?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| ContractError::outlet_push(&self.info.name, "writer lock poisoned"))?;
        writeln!(writer, "{line}").map_err(|e| ContractError::outlet_push(&self.info.name, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ChannelFormat, ChannelInfo, SensorKind};
    use tempfile::tempdir;

    fn event_info() -> StreamInfo {
        StreamInfo {
            name: "test_Event".into(),
            kind: SensorKind::Event,
            channel_format: ChannelFormat::String,
            source_id: "dev_Event".into(),
            nominal_srate: 0.0,
            channels: vec![ChannelInfo::new().with("label", "Event")],
            desc: vec![],
            acquisition: vec![],
        }
    }

    #[test]
    fn test_header_then_samples() {
        let dir = tempdir().unwrap();
        let transport = FileTransport::new(dir.path()).unwrap();
        let outlet = transport.create_outlet(event_info()).unwrap();
        outlet
            .push(SampleValues::Text(vec!["recording.begin".into()]), 12.5)
            .unwrap();

        let content = fs::read_to_string(outlet.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let header: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(header["stream"]["source_id"], "dev_Event");
        let sample: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(sample["timestamp"], 12.5);
        assert_eq!(sample["values"][0], "recording.begin");
    }
}
