//! Time alignment engine
//!
//! Pairs capture event streams with cloud exports by session key, fits the
//! clock mapping in both directions and annotates the export gaze table.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, instrument, warn};

use crate::error::{AlignmentError, Result};
use crate::events::{filter_common, pair_by_name, EventLog};
use crate::export::{discover_exports, CloudExport, GazeTable};
use crate::model::AffineClockModel;
use crate::output::{unique_dir_name, write_alignment};
use crate::session::{session_id_from_events, MatchStrategy, SessionKey};
use crate::xdf::{read_xdf, XdfFile};

/// Fitted mapping between export (cloud) and capture clocks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockMapping {
    pub cloud_to_capture: AffineClockModel,
    pub capture_to_cloud: AffineClockModel,
    pub matched_events: usize,
}

/// Fit both directions over the events the two logs have in common
pub fn align_events(session: &str, capture: &EventLog, export: &EventLog) -> Result<ClockMapping> {
    let (capture, export) = filter_common(capture, export);
    if capture.is_empty() {
        return Err(AlignmentError::NoMatchingEvents {
            session: session.to_string(),
        });
    }

    let pairs = pair_by_name(&export, &capture).map_err(|m| AlignmentError::MatchedCountMismatch {
        session: session.to_string(),
        capture: m.right,
        export: m.left,
    })?;
    let (cloud, captured): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();

    let fit = |source: &[f64], target: &[f64]| {
        AffineClockModel::fit(source, target).map_err(|e| AlignmentError::degenerate_fit(session, e.to_string()))
    };
    Ok(ClockMapping {
        cloud_to_capture: fit(&cloud, &captured)?,
        capture_to_cloud: fit(&captured, &cloud)?,
        matched_events: cloud.len(),
    })
}

/// Everything persisted for one aligned session
#[derive(Debug, Clone)]
pub struct AlignmentOutput {
    pub key: SessionKey,
    pub export_dir: PathBuf,
    pub mapping: ClockMapping,
    pub gaze: GazeTable,
}

impl AlignmentOutput {
    /// Capture-domain time of every gaze row
    pub fn capture_times(&self) -> Vec<f64> {
        self.gaze
            .timestamps
            .iter()
            .map(|&t| self.mapping.cloud_to_capture.predict(t))
            .collect()
    }
}

/// One successfully written session
#[derive(Debug, Clone)]
pub struct AlignedSession {
    pub key: SessionKey,
    pub export_dir: PathBuf,
    pub output_dir: PathBuf,
    pub mapping: ClockMapping,
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct AlignmentReport {
    pub aligned: Vec<AlignedSession>,
    /// `(export dir, error)`
    pub failures: Vec<(PathBuf, AlignmentError)>,
    /// Exports without a usable key
    pub skipped: usize,
    /// Exports whose key no capture stream carries
    pub unmatched: usize,
}

impl AlignmentReport {
    /// Error if any session failed
    pub fn into_result(self) -> Result<Vec<AlignedSession>> {
        if self.failures.is_empty() {
            return Ok(self.aligned);
        }
        Err(AlignmentError::SessionsFailed {
            failed: self.failures.len(),
            total: self.failures.len() + self.aligned.len(),
        })
    }
}

/// Batch alignment of one capture file against export roots
#[derive(Debug, Clone, Copy, Default)]
pub struct AlignmentEngine {
    strategy: MatchStrategy,
}

impl AlignmentEngine {
    pub fn new(strategy: MatchStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Keyed event logs of the capture's event streams
    pub fn capture_sessions(&self, file: &XdfFile) -> BTreeMap<SessionKey, EventLog> {
        let mut sessions = BTreeMap::new();
        for stream in file.event_streams() {
            let Some(log) = stream.event_log() else {
                debug!(stream = %stream.header.name, "skipping non-string event stream");
                continue;
            };
            let key = match self.strategy {
                MatchStrategy::Serial => match stream.header.world_camera_serial() {
                    Some(serial) => SessionKey::Serial(serial.to_string()),
                    None => {
                        debug!(stream = %stream.header.name, "skipping stream without world camera serial");
                        continue;
                    }
                },
                MatchStrategy::Session => match session_id_from_events(&log) {
                    Some(id) => SessionKey::Session(id),
                    None => {
                        warn!(stream = %stream.header.name, "skipping capture stream without session id");
                        continue;
                    }
                },
            };
            if sessions.contains_key(&key) {
                warn!(stream = %stream.header.name, %key, "duplicate capture stream ignored");
                continue;
            }
            sessions.insert(key, log);
        }
        sessions
    }

    /// Key of an export, `None` if it has none
    fn export_key(&self, export: &CloudExport) -> Result<Option<SessionKey>> {
        match self.strategy {
            MatchStrategy::Serial => {
                if export.serial.is_none() {
                    warn!(path = %export.info_path().display(), "skipping invalid info.json without serial");
                }
                Ok(export.serial.clone().map(SessionKey::Serial))
            }
            MatchStrategy::Session => {
                let id = session_id_from_events(&export.read_events()?);
                if id.is_none() {
                    warn!(dir = %export.dir.display(), "skipping export without session id");
                }
                Ok(id.map(SessionKey::Session))
            }
        }
    }

    /// Align one export against its capture events
    pub fn align_export(&self, key: &SessionKey, capture: &EventLog, export: &CloudExport) -> Result<AlignmentOutput> {
        let export_events = export.read_events()?;
        let mapping = align_events(&key.to_string(), capture, &export_events)?;
        let gaze = export.read_gaze()?;
        Ok(AlignmentOutput {
            key: key.clone(),
            export_dir: export.dir.clone(),
            mapping,
            gaze,
        })
    }

    /// Align every matching export and write results below `output_dir`
    ///
    /// # Errors
    /// Invalid capture, a capture without usable event streams, or no
    /// export at all that could be processed. Per-session failures are in
    /// the report.
    #[instrument(name = "align", skip(self, roots), fields(strategy = self.strategy.as_str()))]
    pub fn run<P: AsRef<Path>>(&self, capture: &Path, roots: &[P], output_dir: &Path) -> Result<AlignmentReport> {
        let file = read_xdf(capture)?;
        let captures = self.capture_sessions(&file);
        if captures.is_empty() {
            return Err(AlignmentError::NoCaptureStreams {
                path: capture.to_path_buf(),
            });
        }
        info!(sessions = captures.len(), "capture sessions found");

        let mut report = AlignmentReport::default();
        let mut written_dirs = HashSet::new();
        for export in discover_exports(roots) {
            let key = match self.export_key(&export) {
                Ok(Some(key)) => key,
                Ok(None) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(dir = %export.dir.display(), error = %e, "export unreadable");
                    report.failures.push((export.dir.clone(), e));
                    continue;
                }
            };
            let Some(capture_events) = captures.get(&key) else {
                debug!(dir = %export.dir.display(), %key, "export not present in capture");
                report.unmatched += 1;
                continue;
            };

            let dir_name = unique_dir_name(&key, &written_dirs);
            let written = self
                .align_export(&key, capture_events, &export)
                .and_then(|output| {
                    write_alignment(&output_dir.join(&dir_name), &output).map(|dir| (output, dir))
                });
            match written {
                Ok((output, dir)) => {
                    if dir_name != key.dir_name() {
                        warn!(
                            %key,
                            dir = %export.dir.display(),
                            output = %dir.display(),
                            "session already written in this run, using a new directory"
                        );
                    }
                    written_dirs.insert(dir_name);
                    info!(
                        %key,
                        slope = output.mapping.cloud_to_capture.slope,
                        intercept = output.mapping.cloud_to_capture.intercept,
                        matched = output.mapping.matched_events,
                        output = %dir.display(),
                        "session aligned"
                    );
                    report.aligned.push(AlignedSession {
                        key,
                        export_dir: output.export_dir,
                        output_dir: dir,
                        mapping: output.mapping,
                    });
                }
                Err(e) => {
                    error!(%key, dir = %export.dir.display(), error = %e, "session alignment failed");
                    report.failures.push((export.dir.clone(), e));
                }
            }
        }

        if report.aligned.is_empty() && report.failures.is_empty() {
            return Err(AlignmentError::NoValidExports);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventRecord;
    use crate::xdf::{XdfChannelFormat, XdfStreamHeader, XdfWriter};

    fn log(events: &[(&str, f64)]) -> EventLog {
        events
            .iter()
            .map(|(name, ts)| EventRecord {
                name: name.to_string(),
                timestamp: *ts,
            })
            .collect()
    }

    #[test]
    fn test_nanosecond_example() {
        let export = EventLog::from_nanos([("a", 1_000_000_000i64), ("b", 2_000_000_000)]);
        let capture = log(&[("a", 0.5), ("b", 1.5)]);
        let mapping = align_events("s", &capture, &export).unwrap();
        assert!((mapping.cloud_to_capture.slope - 1.0).abs() < 1e-9);
        assert!((mapping.cloud_to_capture.intercept + 0.5).abs() < 1e-9);
        assert!((mapping.capture_to_cloud.intercept - 0.5).abs() < 1e-9);
        assert_eq!(mapping.matched_events, 2);
    }

    #[test]
    fn test_no_matching_events() {
        let err = align_events("serial X", &log(&[("a", 1.0)]), &log(&[("b", 1.0)])).unwrap_err();
        assert!(matches!(err, AlignmentError::NoMatchingEvents { ref session } if session == "serial X"));
    }

    #[test]
    fn test_single_match_is_degenerate() {
        let err = align_events("s", &log(&[("a", 1.0), ("x", 2.0)]), &log(&[("a", 5.0)])).unwrap_err();
        assert!(matches!(err, AlignmentError::DegenerateFit { .. }));
    }

    #[test]
    fn test_duplicate_names_mismatch() {
        let err = align_events(
            "s",
            &log(&[("a", 1.0), ("a", 2.0), ("b", 3.0)]),
            &log(&[("a", 5.0), ("b", 6.0)]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AlignmentError::MatchedCountMismatch {
                capture: 3,
                export: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_capture_sessions_by_strategy() {
        let id = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        let mut writer = XdfWriter::new();
        writer
            .stream_header(
                1,
                &XdfStreamHeader::new("p_Event", "Event", XdfChannelFormat::String, 1)
                    .with_acquisition("world_camera_serial", "CAM1"),
            )
            .string_samples(1, &[(Some(1.0), vec![format!("lsl.time_sync.{id}.0")])])
            .stream_header(
                2,
                &XdfStreamHeader::new("other", "Event", XdfChannelFormat::String, 1),
            )
            .string_samples(2, &[(Some(1.0), vec!["marker".into()])])
            .stream_header(3, &XdfStreamHeader::new("p_Gaze", "Gaze", XdfChannelFormat::Double64, 2));
        let file = crate::xdf::parse_xdf(writer.bytes()).unwrap();

        let by_serial = AlignmentEngine::new(MatchStrategy::Serial).capture_sessions(&file);
        assert_eq!(by_serial.keys().collect::<Vec<_>>(), [&SessionKey::Serial("CAM1".into())]);

        let by_session = AlignmentEngine::new(MatchStrategy::Session).capture_sessions(&file);
        assert_eq!(by_session.len(), 1);
        assert!(matches!(by_session.keys().next(), Some(SessionKey::Session(u)) if u.to_string() == id));
    }
}
