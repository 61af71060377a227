//! # Gaze Relay CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Relay sessions with discovery and graceful shutdown
//! - Post-hoc time alignment of captures with cloud exports
//! - Configuration validation

mod cli;
mod commands;
mod error;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use observability::{ObservabilityConfig, ALIGN_LOG_FILE, RELAY_LOG_FILE};
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_align, run_relay, run_validate};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Gaze Relay CLI starting");

    let result = match &cli.command {
        Commands::Relay(args) => run_relay(args).await,
        Commands::Align(args) => run_align(args),
        Commands::Validate(args) => run_validate(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let log_file = match (&cli.command, &cli.log_file) {
        _ if cli.no_log_file => None,
        (_, Some(path)) => Some(path.clone()),
        (Commands::Relay(_), None) => Some(PathBuf::from(RELAY_LOG_FILE)),
        (Commands::Align(_), None) => Some(PathBuf::from(ALIGN_LOG_FILE)),
        (Commands::Validate(_), None) => None,
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
        log_file,
    })
}
