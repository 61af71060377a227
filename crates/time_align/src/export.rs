//! Cloud export reader
//!
//! An export directory holds an `info.json` and, somewhere below it, one
//! `events.csv` and one `gaze.csv` with nanosecond `timestamp [ns]` columns.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{AlignmentError, Result};
use crate::events::{EventLog, EventRecord};

pub const INFO_FILE: &str = "info.json";
pub const EVENTS_FILE: &str = "events.csv";
pub const GAZE_FILE: &str = "gaze.csv";

pub const NAME_COLUMN: &str = "name";
pub const TIMESTAMP_NS_COLUMN: &str = "timestamp [ns]";
pub const TIMESTAMP_S_COLUMN: &str = "timestamp [s]";
pub const CAPTURE_TIME_COLUMN: &str = "lsl_time [s]";

const SERIAL_FIELD: &str = "scene_camera_serial_number";

/// One export directory found below a root
#[derive(Debug, Clone, PartialEq)]
pub struct CloudExport {
    /// Directory holding `info.json`
    pub dir: PathBuf,
    /// Scene camera serial, `None` if `info.json` has none
    pub serial: Option<String>,
}

impl CloudExport {
    pub fn info_path(&self) -> PathBuf {
        self.dir.join(INFO_FILE)
    }

    pub fn events_path(&self) -> Result<PathBuf> {
        locate_unique(&self.dir, EVENTS_FILE)
    }

    pub fn gaze_path(&self) -> Result<PathBuf> {
        locate_unique(&self.dir, GAZE_FILE)
    }

    pub fn read_events(&self) -> Result<EventLog> {
        read_events_csv(&self.events_path()?)
    }

    pub fn read_gaze(&self) -> Result<GazeTable> {
        GazeTable::read(&self.gaze_path()?)
    }
}

/// Every `info.json` below the roots
///
/// Unreadable `info.json` files are skipped with a warning.
pub fn discover_exports<P: AsRef<Path>>(roots: &[P]) -> Vec<CloudExport> {
    let mut exports = Vec::new();
    for root in roots {
        let root = root.as_ref();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "cannot walk export root");
                    continue;
                }
            };
            if !entry.file_type().is_file() || entry.file_name() != INFO_FILE {
                continue;
            }
            let Some(dir) = entry.path().parent() else {
                continue;
            };
            match read_info_serial(entry.path()) {
                Ok(serial) => exports.push(CloudExport {
                    dir: dir.to_path_buf(),
                    serial,
                }),
                Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping unreadable info.json"),
            }
        }
    }
    debug!(count = exports.len(), "exports discovered");
    exports
}

/// `scene_camera_serial_number` of an `info.json`
pub fn read_info_serial(path: &Path) -> Result<Option<String>> {
    let info: Value = serde_json::from_reader(File::open(path)?)?;
    Ok(match info.get(SERIAL_FIELD) {
        Some(Value::String(serial)) => Some(serial.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// The single file called `file_name` below `dir`
pub fn locate_unique(dir: &Path, file_name: &str) -> Result<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
        .map(|entry| entry.into_path())
        .collect();
    if found.len() != 1 {
        return Err(AlignmentError::FileCount {
            dir: dir.to_path_buf(),
            file: file_name.to_string(),
            found: found.len(),
        });
    }
    Ok(found.remove(0))
}

fn column(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| AlignmentError::invalid_export(path, format!("missing column '{name}'")))
}

fn parse_ns(value: &str, path: &Path, row: usize) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|e| AlignmentError::invalid_export(path, format!("row {row}: invalid timestamp '{value}': {e}")))
}

/// `events.csv` rows as an event log (seconds)
pub fn read_events_csv(path: &Path) -> Result<EventLog> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let name_col = column(&headers, NAME_COLUMN, path)?;
    let ts_col = column(&headers, TIMESTAMP_NS_COLUMN, path)?;

    let mut records = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let name = record.get(name_col).unwrap_or_default().to_string();
        let ns = parse_ns(record.get(ts_col).unwrap_or_default(), path, row + 1)?;
        records.push(EventRecord {
            name,
            timestamp: ns as f64 * 1e-9,
        });
    }
    Ok(EventLog::new(records))
}

/// Gaze table with its original columns kept verbatim
#[derive(Debug, Clone, PartialEq)]
pub struct GazeTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Export clock per row, seconds
    pub timestamps: Vec<f64>,
}

impl GazeTable {
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let header_record = reader.headers()?.clone();
        let ts_col = column(&header_record, TIMESTAMP_NS_COLUMN, path)?;

        let mut rows = Vec::new();
        let mut timestamps = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let ns = parse_ns(record.get(ts_col).unwrap_or_default(), path, row + 1)?;
            timestamps.push(ns as f64 * 1e-9);
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self {
            headers: header_record.iter().map(str::to_string).collect(),
            rows,
            timestamps,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
