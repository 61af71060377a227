//! `relay` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{Device, DeviceInfo, RelayConfig};
use discovery::{
    parse_device_address, resolve_device, DiscoveryCoordinator, SimulatedDevice, SimulatedNetwork, StdinSelector,
};
use relay::{AnyTransport, RelaySession, RelaySettings, SessionSummary};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::RelayArgs;
use crate::error::CliError;

const SIMULATED_SERVICE: &str = "PI monitor:Simulated Companion:sim0001._http._tcp.local.";
const SIMULATED_ADDRESS: &str = "127.0.0.1";
const SIMULATED_PORT: u16 = 8080;

/// Execute the `relay` command
pub async fn run_relay(args: &RelayArgs) -> Result<()> {
    let config = build_config(args)?;

    if config.metrics_port > 0 {
        observability::init_metrics_only(config.metrics_port)?;
    }

    info!(
        prefix = %config.outlet_prefix,
        transport = config.transport.kind.as_str(),
        time_sync_interval_s = config.time_sync_interval_s,
        teardown_timeout_s = config.teardown_timeout_s,
        "Configuration loaded"
    );

    let transport = AnyTransport::from_config(&config.transport).context("Failed to set up output transport")?;
    let (client, device) = connect(&config).await?;

    let session = RelaySession::new(device, Arc::new(client), transport, RelaySettings::from(&config));
    info!(session = %session.session_id(), device = %session.device().endpoint(), "Starting relay...");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping relay...");
        signal_token.cancel();
    });

    let summary = session.run(shutdown).await.context("Relay session failed")?;
    print_summary(&summary);

    info!("The relay was closed");
    Ok(())
}

/// Configuration file (or defaults) with CLI overrides applied and validated
pub fn build_config(args: &RelayArgs) -> Result<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path).into());
            }
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => RelayConfig::default(),
    };

    if let Some(address) = &args.device_address {
        config.device_address = Some(address.clone());
    }
    if let Some(prefix) = &args.outlet_prefix {
        config.outlet_prefix = prefix.clone();
    }
    if let Some(interval) = args.time_sync_interval {
        config.time_sync_interval_s = interval;
    }
    if let Some(timeout) = args.timeout {
        config.discovery_timeout_s = timeout;
        config.status_timeout_s = timeout;
    }
    if let Some(timeout) = args.teardown_timeout {
        config.teardown_timeout_s = timeout;
    }
    if let Some(duration) = args.duration {
        config.session_timeout_s = Some(duration);
    }
    if let Some(kind) = args.transport {
        config.transport.kind = kind.into();
    }
    for param in &args.transport_params {
        let (key, value) = param
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| CliError::transport_param(param))?;
        config.transport.params.insert(key.to_string(), value.to_string());
    }
    if let Some(port) = args.metrics_port {
        config.metrics_port = port;
    }

    config_loader::validate(&config).context("Configuration validation failed")?;
    Ok(config)
}

/// Resolve the device to relay, by address or by interactive discovery
async fn connect(config: &RelayConfig) -> Result<(SimulatedDevice, Device)> {
    let (address, port) = match &config.device_address {
        Some(input) => parse_device_address(input)?,
        None => {
            let network = SimulatedNetwork::new(vec![DeviceInfo {
                name: SIMULATED_SERVICE.to_string(),
                addresses: vec![SIMULATED_ADDRESS.to_string()],
                port: SIMULATED_PORT,
            }]);
            let coordinator =
                DiscoveryCoordinator::new(network, config.discovery_timeout(), config.max_discovery_attempts);
            let info = coordinator.select_device(&mut StdinSelector).await?;
            let address = info.address().ok_or_else(|| CliError::NoDeviceAddress {
                name: info.display_name().to_string(),
            })?;
            (address.to_string(), info.port)
        }
    };

    info!(address = %address, port, "Connecting to device");
    let client = SimulatedDevice::new(&address, port, config.simulation.clone());
    let device = resolve_device(&client, &address, port, config.status_timeout()).await?;
    Ok((client, device))
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_summary(summary: &SessionSummary) {
    println!("\n=== Relay Session ===\n");
    println!("  Session: {}", summary.session_id);
    println!("  Gaze samples pushed: {}", summary.gaze_pushed);
    println!("  Events pushed: {}", summary.events_pushed);
    println!("  Samples dropped: {}", summary.dropped);
    if summary.torn_down {
        println!("  Ended: gaze sensor did not reconnect in time");
    } else {
        println!("  Ended by: {}", summary.first_finished);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::TransportArg;
    use contracts::TransportKind;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = build_config(&RelayArgs::default()).unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "outlet_prefix = \"from_file\"\nteardown_timeout_s = 30").unwrap();

        let config = build_config(&RelayArgs {
            config: Some(file.path().to_path_buf()),
            outlet_prefix: Some("from_flag".into()),
            timeout: Some(5),
            duration: Some(120),
            transport: Some(TransportArg::File),
            transport_params: vec!["path=outlets".into()],
            ..Default::default()
        })
        .unwrap();

        assert_eq!(config.outlet_prefix, "from_flag");
        assert_eq!(config.teardown_timeout_s, 30);
        assert_eq!(config.discovery_timeout_s, 5);
        assert_eq!(config.status_timeout_s, 5);
        assert_eq!(config.session_timeout_s, Some(120));
        assert_eq!(config.transport.kind, TransportKind::File);
        assert_eq!(config.transport.params.get("path").map(String::as_str), Some("outlets"));
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let bad_param = build_config(&RelayArgs {
            transport_params: vec!["novalue".into()],
            ..Default::default()
        });
        assert!(bad_param.is_err());

        let bad_address = build_config(&RelayArgs {
            device_address: Some("192.168.1.5".into()),
            ..Default::default()
        });
        assert!(bad_address.is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let err = build_config(&RelayArgs {
            config: Some("does/not/exist.toml".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
