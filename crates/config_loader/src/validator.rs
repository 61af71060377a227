//! Config validation
//!
//! Rules:
//! - outlet_prefix non-empty, no whitespace
//! - device_address has `ip:port` form
//! - timeouts > 0, at least one discovery attempt
//! - transport params complete for the selected kind
//! - simulated gaze rate > 0

use std::net::SocketAddr;

use contracts::{ContractError, RelayConfig, TransportKind};

/// Validate a relay configuration
///
/// Returns the first error encountered.
pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
    validate_prefix(config)?;
    validate_device_address(config)?;
    validate_timeouts(config)?;
    validate_transport(config)?;
    validate_simulation(config)?;
    Ok(())
}

fn validate_prefix(config: &RelayConfig) -> Result<(), ContractError> {
    if config.outlet_prefix.is_empty() {
        return Err(ContractError::config_validation(
            "outlet_prefix",
            "outlet prefix cannot be empty",
        ));
    }
    if config.outlet_prefix.chars().any(char::is_whitespace) {
        return Err(ContractError::config_validation(
            "outlet_prefix",
            format!("outlet prefix '{}' contains whitespace", config.outlet_prefix),
        ));
    }
    Ok(())
}

fn validate_device_address(config: &RelayConfig) -> Result<(), ContractError> {
    let Some(address) = &config.device_address else {
        return Ok(());
    };
    let valid = address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if !valid {
        return Err(ContractError::config_validation(
            "device_address",
            format!("expected IP:PORT, got '{address}'"),
        ));
    }
    Ok(())
}

fn validate_timeouts(config: &RelayConfig) -> Result<(), ContractError> {
    let positive = [
        ("discovery_timeout_s", config.discovery_timeout_s),
        ("status_timeout_s", config.status_timeout_s),
        ("teardown_timeout_s", config.teardown_timeout_s),
        ("gaze_wait_timeout_s", config.gaze_wait_timeout_s),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(ContractError::config_validation(field, "must be > 0"));
        }
    }
    if config.session_timeout_s == Some(0) {
        return Err(ContractError::config_validation(
            "session_timeout_s",
            "must be > 0 when set",
        ));
    }
    if config.max_discovery_attempts == 0 {
        return Err(ContractError::config_validation(
            "max_discovery_attempts",
            "at least one discovery attempt is required",
        ));
    }
    Ok(())
}

fn validate_transport(config: &RelayConfig) -> Result<(), ContractError> {
    let params = &config.transport.params;
    match config.transport.kind {
        TransportKind::Log => Ok(()),
        TransportKind::File => {
            if params.get("path").is_some_and(|p| p.is_empty()) {
                return Err(ContractError::config_validation(
                    "transport.params.path",
                    "path cannot be empty",
                ));
            }
            Ok(())
        }
        TransportKind::Network => {
            let addr = params.get("addr").ok_or_else(|| {
                ContractError::config_validation(
                    "transport.params.addr",
                    "network transport requires 'addr'",
                )
            })?;
            addr.parse::<SocketAddr>().map_err(|e| {
                ContractError::config_validation("transport.params.addr", format!("'{addr}': {e}"))
            })?;
            match params.get("format").map(String::as_str) {
                None | Some("json") | Some("bincode") => Ok(()),
                Some(other) => Err(ContractError::config_validation(
                    "transport.params.format",
                    format!("unknown format '{other}', expected json or bincode"),
                )),
            }
        }
    }
}

fn validate_simulation(config: &RelayConfig) -> Result<(), ContractError> {
    let rate = config.simulation.gaze_rate_hz;
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ContractError::config_validation(
            "simulation.gaze_rate_hz",
            format!("gaze_rate_hz must be > 0, got {rate}"),
        ));
    }
    let delays = [
        ("simulation.disconnect_after_s", config.simulation.disconnect_after_s),
        ("simulation.reconnect_after_s", config.simulation.reconnect_after_s),
    ];
    for (field, delay) in delays {
        if let Some(delay) = delay.filter(|d| !d.is_finite() || *d < 0.0) {
            return Err(ContractError::config_validation(
                field,
                format!("delay must be a finite number of seconds >= 0, got {delay}"),
            ));
        }
    }
    let offset = config.simulation.device_clock_offset_s;
    if !offset.is_finite() {
        return Err(ContractError::config_validation(
            "simulation.device_clock_offset_s",
            format!("clock offset must be finite, got {offset}"),
        ));
    }
    Ok(())
}
