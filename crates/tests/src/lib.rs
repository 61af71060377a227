//! # Integration Tests
//!
//! End-to-end scenarios across crates.
//!
//! Covers:
//! - Relay sessions against the simulated device (reconnect, teardown)
//! - Discovery retry budget
//! - Capture/export time alignment on disk

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_config_round_trip_through_loader() {
        let config = ConfigLoader::load_from_str(
            r#"
            outlet_prefix = "lab"
            time_sync_interval_s = 30

            [transport]
            kind = "network"
            params = { addr = "127.0.0.1:9999", format = "json" }
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(config.outlet_prefix, "lab");

        let json = ConfigLoader::to_json(&config).unwrap();
        let reloaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(reloaded, config);
    }
}

#[cfg(test)]
mod relay_e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{Device, SensorKind, SimulationConfig};
    use discovery::SimulatedDevice;
    use relay::{MemoryTransport, RelaySession, RelaySettings};
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    fn simulated(disconnect_after_s: f64, reconnect_after_s: Option<f64>) -> SimulatedDevice {
        SimulatedDevice::new(
            "10.0.0.7",
            8080,
            SimulationConfig {
                gaze_rate_hz: 10.0,
                disconnect_after_s: Some(disconnect_after_s),
                reconnect_after_s,
                device_clock_offset_s: 0.0,
            },
        )
    }

    fn device(sim: &SimulatedDevice) -> Device {
        Device {
            address: "10.0.0.7".into(),
            port: 8080,
            identifier: sim.device_id().to_string(),
            world_camera_serial: "SIM-WORLD-0001".into(),
        }
    }

    fn settings(session_timeout: Option<Duration>) -> RelaySettings {
        RelaySettings {
            outlet_prefix: "pupil_invisible".into(),
            time_sync_interval: None,
            teardown_timeout: Duration::from_secs(60),
            gaze_wait_timeout: Duration::from_secs(10),
            session_timeout,
        }
    }

    /// Disconnect after 5 s, reconnect 30 s later with a 60 s teardown timeout
    #[tokio::test(start_paused = true)]
    async fn test_reconnect_within_timeout_keeps_session_alive() {
        let sim = simulated(5.0, Some(30.0));
        let transport = MemoryTransport::new();
        let session = RelaySession::new(
            device(&sim),
            Arc::new(sim.clone()),
            transport.clone(),
            settings(Some(Duration::from_secs(120))),
        );

        let observe = async {
            tokio::time::sleep(Duration::from_secs(15)).await;
            let early = transport.push_count(SensorKind::Gaze);
            tokio::time::sleep(Duration::from_secs(15)).await;
            let late = transport.push_count(SensorKind::Gaze);
            (early, late)
        };
        let (summary, (early, late)) = tokio::join!(session.run(CancellationToken::new()), observe);
        let summary = summary.unwrap();

        assert!(!summary.torn_down);
        assert_eq!(summary.first_finished, "session_timer");
        // Streamed before the disconnect, nothing while the sensor was gone
        assert!(early > 0);
        assert_eq!(early, late);
        // Streaming resumed after the reconnect
        assert_eq!(sim.gaze_opened(), 2);
        assert!(transport.push_count(SensorKind::Gaze) > late);
        assert_eq!(sim.close_calls(), 1);
    }

    /// No reconnect within 61 s: device closed once, session ends once
    #[tokio::test(start_paused = true)]
    async fn test_disconnect_past_timeout_tears_down_once() {
        let sim = simulated(1.0, None);
        let session = RelaySession::new(
            device(&sim),
            Arc::new(sim.clone()),
            MemoryTransport::new(),
            settings(None),
        );

        let started = Instant::now();
        let summary = session.run(CancellationToken::new()).await.unwrap();
        let elapsed = started.elapsed();

        assert!(summary.torn_down);
        assert!(elapsed >= Duration::from_secs(61), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(63), "elapsed {elapsed:?}");
        assert!(sim.is_closed());
        assert_eq!(sim.close_calls(), 1);
        assert_eq!(sim.stop_calls(), 1);
    }

    /// A reconnect after the timeout fired does not revive the session
    #[tokio::test(start_paused = true)]
    async fn test_late_reconnect_is_too_late() {
        let sim = simulated(1.0, Some(90.0));
        let session = RelaySession::new(
            device(&sim),
            Arc::new(sim.clone()),
            MemoryTransport::new(),
            settings(Some(Duration::from_secs(300))),
        );

        let summary = session.run(CancellationToken::new()).await.unwrap();
        assert!(summary.torn_down);
        assert_eq!(sim.close_calls(), 1);
    }
}

#[cfg(test)]
mod discovery_e2e_tests {
    use std::time::Duration;

    use contracts::DeviceInfo;
    use discovery::{DiscoveryCoordinator, DiscoveryError, ScriptedSelector, SimulatedNetwork};

    fn device(address: &str) -> DeviceInfo {
        DeviceInfo {
            name: format!("PI monitor:Companion {address}:id._http._tcp.local."),
            addresses: vec![address.to_string()],
            port: 8080,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_eleven_empty_passes_give_up() {
        let coordinator = DiscoveryCoordinator::new(SimulatedNetwork::new(vec![]), Duration::from_secs(10), 10);
        let err = coordinator.find_devices().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::NoDevicesFound { attempts: 11 }));
        assert_eq!(coordinator.network().passes(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_found_on_third_pass_is_selected() {
        let network = SimulatedNetwork::appearing_after(2, vec![device("10.0.0.3")]);
        let coordinator = DiscoveryCoordinator::new(network, Duration::from_secs(10), 10);
        let mut selector = ScriptedSelector::new(["0"]);

        let selected = coordinator.select_device(&mut selector).await.unwrap();
        assert_eq!(selected.address(), Some("10.0.0.3"));
        assert_eq!(coordinator.network().passes(), 3);
    }
}

#[cfg(test)]
mod alignment_e2e_tests {
    use std::fs;
    use std::path::Path;

    use time_align::{
        AlignmentEngine, AlignmentError, MatchStrategy, XdfChannelFormat, XdfStreamHeader, XdfWriter,
    };
    use uuid::Uuid;

    const SERIAL: &str = "CAM-42";

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn event_names(session: Uuid) -> Vec<String> {
        (0..3).map(|i| format!("lsl.time_sync.{session}.{i}")).collect()
    }

    /// Capture with one event stream; capture clock = cloud clock - 0.5 s
    fn write_capture(path: &Path, session: Uuid) {
        let samples: Vec<(Option<f64>, Vec<String>)> = event_names(session)
            .into_iter()
            .enumerate()
            .map(|(i, name)| (Some(10.5 + 10.0 * i as f64), vec![name]))
            .collect();
        let mut writer = XdfWriter::new();
        writer
            .stream_header(
                1,
                &XdfStreamHeader::new("pupil_invisible_Event", "Event", XdfChannelFormat::String, 1)
                    .with_source_id("sim_Event")
                    .with_acquisition("world_camera_serial", SERIAL),
            )
            .string_samples(1, &samples)
            .stream_footer(1, samples.len());
        writer.write_to(path).unwrap();
    }

    fn write_export(dir: &Path, serial: Option<&str>, event_names: &[String]) {
        let info = match serial {
            Some(serial) => format!(r#"{{"scene_camera_serial_number": "{serial}"}}"#),
            None => r#"{"duration": 1}"#.to_string(),
        };
        write(&dir.join("info.json"), &info);

        let mut events = String::from("recording id,timestamp [ns],name,type\n");
        for (i, name) in event_names.iter().enumerate() {
            events.push_str(&format!("rec,{},{name},cloud\n", 11_000_000_000i64 + 10_000_000_000 * i as i64));
        }
        write(&dir.join("events.csv"), &events);
        write(
            &dir.join("gaze.csv"),
            "section id,timestamp [ns],gaze x [px],gaze y [px]\n\
             s,15000000000,100.0,200.0\n\
             s,25000000000,110.0,210.0\n",
        );
    }

    fn lsl_times(gaze_csv: &Path) -> Vec<f64> {
        let content = fs::read_to_string(gaze_csv).unwrap();
        let mut lines = content.lines();
        let header: Vec<_> = lines.next().unwrap().split(',').collect();
        assert_eq!(header.last(), Some(&"lsl_time [s]"));
        lines
            .map(|line| line.rsplit(',').next().unwrap().parse::<f64>().unwrap())
            .collect()
    }

    #[test]
    fn test_align_by_serial() {
        let root = tempfile::tempdir().unwrap();
        let session = Uuid::new_v4();
        let capture = root.path().join("capture.xdf");
        write_capture(&capture, session);
        write_export(&root.path().join("exports").join("rec1"), Some(SERIAL), &event_names(session));
        // Not in the capture
        write_export(&root.path().join("exports").join("rec2"), Some("OTHER"), &event_names(session));
        // No serial
        write_export(&root.path().join("exports").join("rec3"), None, &event_names(session));
        let output = root.path().join("out");
        fs::create_dir_all(&output).unwrap();

        let report = AlignmentEngine::new(MatchStrategy::Serial)
            .run(&capture, &[root.path().join("exports")], &output)
            .unwrap();
        assert_eq!(report.aligned.len(), 1);
        assert_eq!(report.unmatched, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.failures.is_empty());

        let aligned = &report.aligned[0];
        assert!((aligned.mapping.cloud_to_capture.slope - 1.0).abs() < 1e-9);
        assert!((aligned.mapping.cloud_to_capture.intercept + 0.5).abs() < 1e-6);
        assert_eq!(aligned.mapping.matched_events, 3);

        let dir = output.join(format!("serial_{SERIAL}"));
        let params: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("parameters.json")).unwrap()).unwrap();
        assert_eq!(params["info"]["model_type"], "LinearRegression");
        assert!((params["lsl_to_cloud"]["intercept"].as_f64().unwrap() - 0.5).abs() < 1e-6);

        let times = lsl_times(&dir.join("gaze.csv"));
        assert_eq!(times.len(), 2);
        assert!((times[0] - 14.5).abs() < 1e-6);
        assert!((times[1] - 24.5).abs() < 1e-6);
    }

    #[test]
    fn test_exports_sharing_a_serial_get_separate_directories() {
        let root = tempfile::tempdir().unwrap();
        let session = Uuid::new_v4();
        let capture = root.path().join("capture.xdf");
        write_capture(&capture, session);
        write_export(&root.path().join("exports").join("morning"), Some(SERIAL), &event_names(session));
        write_export(&root.path().join("exports").join("evening"), Some(SERIAL), &event_names(session));
        let output = root.path().join("out");
        fs::create_dir_all(&output).unwrap();

        let report = AlignmentEngine::new(MatchStrategy::Serial)
            .run(&capture, &[root.path().join("exports")], &output)
            .unwrap();
        assert_eq!(report.aligned.len(), 2);
        assert!(report.failures.is_empty());

        let mut dirs: Vec<_> = report.aligned.iter().map(|s| s.output_dir.clone()).collect();
        dirs.sort();
        assert_eq!(
            dirs,
            vec![output.join(format!("serial_{SERIAL}")), output.join(format!("serial_{SERIAL}_2"))]
        );
        for dir in &dirs {
            assert_eq!(lsl_times(&dir.join("gaze.csv")).len(), 2);
        }
        assert_ne!(report.aligned[0].export_dir, report.aligned[1].export_dir);
        assert_eq!(fs::read_dir(&output).unwrap().count(), 2);
    }

    #[test]
    fn test_align_by_session() {
        let root = tempfile::tempdir().unwrap();
        let session = Uuid::new_v4();
        let capture = root.path().join("capture.xdf");
        write_capture(&capture, session);
        write_export(&root.path().join("rec"), None, &event_names(session));
        let output = root.path().join("out");
        fs::create_dir_all(&output).unwrap();

        let report = AlignmentEngine::new(MatchStrategy::Session)
            .run(&capture, &[root.path().join("rec")], &output)
            .unwrap();
        assert_eq!(report.aligned.len(), 1);
        assert!(output.join(format!("session_{session}")).join("gaze.csv").is_file());
    }

    #[test]
    fn test_zero_matched_events_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let capture = root.path().join("capture.xdf");
        write_capture(&capture, Uuid::new_v4());
        write_export(
            &root.path().join("rec"),
            Some(SERIAL),
            &["recording.begin".to_string(), "recording.end".to_string()],
        );
        let output = root.path().join("out");
        fs::create_dir_all(&output).unwrap();

        let report = AlignmentEngine::new(MatchStrategy::Serial)
            .run(&capture, &[root.path().join("rec")], &output)
            .unwrap();
        assert!(report.aligned.is_empty());
        assert!(matches!(report.failures[0].1, AlignmentError::NoMatchingEvents { .. }));
        assert_eq!(fs::read_dir(&output).unwrap().count(), 0);
        assert!(matches!(
            report.into_result(),
            Err(AlignmentError::SessionsFailed { failed: 1, total: 1 })
        ));
    }

    #[test]
    fn test_no_serials_anywhere_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let session = Uuid::new_v4();
        let capture = root.path().join("capture.xdf");
        write_capture(&capture, session);
        write_export(&root.path().join("rec"), None, &event_names(session));

        let err = AlignmentEngine::new(MatchStrategy::Serial)
            .run(&capture, &[root.path().join("rec")], root.path())
            .unwrap_err();
        assert!(matches!(err, AlignmentError::NoValidExports));
    }

    #[test]
    fn test_garbage_capture_names_path() {
        let root = tempfile::tempdir().unwrap();
        let capture = root.path().join("broken.xdf");
        fs::write(&capture, b"not an xdf file").unwrap();

        let err = AlignmentEngine::default()
            .run(&capture, &[root.path()], root.path())
            .unwrap_err();
        assert!(matches!(err, AlignmentError::InvalidCapture { .. }));
        assert!(err.to_string().contains("broken.xdf"));
    }
}
