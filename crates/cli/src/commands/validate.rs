//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{RelayConfig, TransportKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    outlet_prefix: String,
    device_address: Option<String>,
    transport: String,
    time_sync_interval_s: u64,
    teardown_timeout_s: u64,
    session_timeout_s: Option<u64>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() { None } else { Some(warnings) },
                summary: Some(ConfigSummary {
                    outlet_prefix: config.outlet_prefix.clone(),
                    device_address: config.device_address.clone(),
                    transport: config.transport.kind.as_str().to_string(),
                    time_sync_interval_s: config.time_sync_interval_s,
                    teardown_timeout_s: config.teardown_timeout_s,
                    session_timeout_s: config.session_timeout_s,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &RelayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.time_sync_interval_s == 0 {
        warnings.push("time_sync_interval_s is 0 - no time-sync events, post-hoc alignment will not work".to_string());
    }

    if config.transport.kind == TransportKind::Log {
        warnings.push("transport is 'log' - samples only reach the log output".to_string());
    }

    if config.teardown_timeout_s < config.gaze_wait_timeout_s {
        warnings.push(format!(
            "teardown_timeout_s ({}) is shorter than gaze_wait_timeout_s ({})",
            config.teardown_timeout_s, config.gaze_wait_timeout_s
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Outlet prefix: {}", summary.outlet_prefix);
            println!(
                "  Device: {}",
                summary.device_address.as_deref().unwrap_or("discovered at startup")
            );
            println!("  Transport: {}", summary.transport);
            println!("  Time-sync interval: {}s", summary.time_sync_interval_s);
            println!("  Teardown timeout: {}s", summary.teardown_timeout_s);
            if let Some(limit) = summary.session_timeout_s {
                println!("  Session limit: {}s", limit);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
