//! Alignment output files
//!
//! Per session a directory `<output>/<key>/` with `parameters.json` and the
//! annotated `gaze.csv`. Files are staged in a hidden sibling directory and
//! moved into place once complete.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::engine::{AlignmentOutput, ClockMapping};
use crate::error::Result;
use crate::export::{CAPTURE_TIME_COLUMN, GAZE_FILE, TIMESTAMP_S_COLUMN};
use crate::model::AffineClockModel;
use crate::session::SessionKey;

pub const PARAMETERS_FILE: &str = "parameters.json";
pub const MODEL_TYPE: &str = "LinearRegression";

#[derive(Debug, Serialize)]
struct ModelInfo {
    model_type: &'static str,
}

/// Serialized form of a `ClockMapping`
#[derive(Debug, Serialize)]
pub struct MappingParameters {
    cloud_to_lsl: AffineClockModel,
    lsl_to_cloud: AffineClockModel,
    info: ModelInfo,
}

impl From<&ClockMapping> for MappingParameters {
    fn from(mapping: &ClockMapping) -> Self {
        Self {
            cloud_to_lsl: mapping.cloud_to_capture,
            lsl_to_cloud: mapping.capture_to_cloud,
            info: ModelInfo { model_type: MODEL_TYPE },
        }
    }
}

/// First directory name for `key` not in `taken`
///
/// The plain `key.dir_name()` when free, otherwise suffixed `_2`, `_3`, ...
pub fn unique_dir_name(key: &SessionKey, taken: &HashSet<String>) -> String {
    let base = key.dir_name();
    let mut name = base.clone();
    let mut n = 1;
    while taken.contains(&name) {
        n += 1;
        name = format!("{base}_{n}");
    }
    name
}

/// Write one session's files into `dir`; returns `dir`
///
/// An existing `dir` is replaced only after every file was written. On
/// failure nothing is left behind and an existing `dir` is untouched.
pub fn write_alignment(dir: &Path, output: &AlignmentOutput) -> Result<PathBuf> {
    let parameters = serde_json::to_string_pretty(&MappingParameters::from(&output.mapping))?;
    let capture_times = output.capture_times();

    let (Some(parent), Some(name)) = (dir.parent(), dir.file_name()) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a session directory: {}", dir.display()),
        )
        .into());
    };
    fs::create_dir_all(parent)?;
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{}.", name.to_string_lossy()))
        .tempdir_in(parent)?;

    fs::write(staging.path().join(PARAMETERS_FILE), parameters)?;
    write_gaze(&staging.path().join(GAZE_FILE), output, &capture_times)?;

    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::rename(staging.path(), dir)?;

    debug!(dir = %dir.display(), rows = output.gaze.len(), "alignment written");
    Ok(dir.to_path_buf())
}

fn write_gaze(path: &Path, output: &AlignmentOutput, capture_times: &[f64]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut headers = output.gaze.headers.clone();
    headers.push(TIMESTAMP_S_COLUMN.to_string());
    headers.push(CAPTURE_TIME_COLUMN.to_string());
    writer.write_record(&headers)?;

    for ((row, cloud_s), capture_s) in output
        .gaze
        .rows
        .iter()
        .zip(&output.gaze.timestamps)
        .zip(capture_times)
    {
        let mut record = row.clone();
        record.push(cloud_s.to_string());
        record.push(capture_s.to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::GazeTable;

    fn output(rows: Vec<Vec<String>>) -> AlignmentOutput {
        let timestamps = vec![2.0; rows.len()];
        AlignmentOutput {
            key: SessionKey::Serial("CAM1".into()),
            export_dir: PathBuf::from("export"),
            mapping: ClockMapping {
                cloud_to_capture: AffineClockModel {
                    intercept: -0.5,
                    slope: 1.0,
                },
                capture_to_cloud: AffineClockModel {
                    intercept: 0.5,
                    slope: 1.0,
                },
                matched_events: 2,
            },
            gaze: GazeTable {
                headers: vec!["timestamp [ns]".into(), "gaze x [px]".into()],
                rows,
                timestamps,
            },
        }
    }

    #[test]
    fn test_write_alignment() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("serial_CAM1");
        let output = output(vec![vec!["2000000000".into(), "10".into()]]);

        let dir = write_alignment(&target, &output).unwrap();
        assert_eq!(dir, target);

        let params: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join(PARAMETERS_FILE)).unwrap()).unwrap();
        assert_eq!(params["cloud_to_lsl"]["intercept"], -0.5);
        assert_eq!(params["lsl_to_cloud"]["slope"], 1.0);
        assert_eq!(params["info"]["model_type"], "LinearRegression");

        let gaze = fs::read_to_string(dir.join(GAZE_FILE)).unwrap();
        let lines: Vec<_> = gaze.lines().collect();
        assert_eq!(lines[0], "timestamp [ns],gaze x [px],timestamp [s],lsl_time [s]");
        assert_eq!(lines[1], "2000000000,10,2,1.5");

        // staging directory is gone
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_rewrite_replaces_previous_files() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("serial_CAM1");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("stale.txt"), "old").unwrap();

        write_alignment(&target, &output(vec![vec!["1".into(), "2".into()]])).unwrap();
        assert!(!target.join("stale.txt").exists());
        assert!(target.join(GAZE_FILE).exists());
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("serial_CAM1");
        // second row is short, the csv writer rejects it
        let broken = output(vec![vec!["1".into(), "2".into()], vec!["3".into()]]);

        assert!(write_alignment(&target, &broken).is_err());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);

        fs::create_dir_all(&target).unwrap();
        fs::write(target.join(PARAMETERS_FILE), "previous").unwrap();
        assert!(write_alignment(&target, &broken).is_err());
        assert_eq!(fs::read_to_string(target.join(PARAMETERS_FILE)).unwrap(), "previous");
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_unique_dir_name() {
        let key = SessionKey::Serial("CAM1".into());
        let mut taken = HashSet::new();
        assert_eq!(unique_dir_name(&key, &taken), "serial_CAM1");
        taken.insert("serial_CAM1".to_string());
        assert_eq!(unique_dir_name(&key, &taken), "serial_CAM1_2");
        taken.insert("serial_CAM1_2".to_string());
        assert_eq!(unique_dir_name(&key, &taken), "serial_CAM1_3");
    }
}
