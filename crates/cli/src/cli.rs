//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Gaze Relay - eye-tracker stream relay and post-hoc time alignment
#[derive(Parser, Debug)]
#[command(
    name = "gaze-relay",
    author,
    version,
    about = "Relay eye-tracker gaze and events to stream outlets",
    long_about = "Relays gaze samples and events of a wearable eye tracker to typed stream \n\
                  outlets, sending periodic time-sync events, and aligns recorded captures \n\
                  with cloud exports after the fact."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "GAZE_RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "GAZE_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Debug log file (defaults to gaze_relay.log / time_sync_posthoc.log)
    #[arg(long, global = true, env = "GAZE_RELAY_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Do not write a log file
    #[arg(long, global = true, conflicts_with = "log_file")]
    pub no_log_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Relay a device's gaze and events to stream outlets
    Relay(RelayArgs),

    /// Align a capture file with cloud exports
    Align(AlignArgs),

    /// Validate a relay configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `relay` command
#[derive(Parser, Debug, Clone, Default)]
pub struct RelayArgs {
    /// Relay configuration file (TOML or JSON)
    #[arg(short, long, env = "GAZE_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// IP:PORT of the device, skips discovery
    #[arg(long, env = "GAZE_RELAY_DEVICE_ADDRESS")]
    pub device_address: Option<String>,

    /// Prefix of the outlet names
    #[arg(long, env = "GAZE_RELAY_OUTLET_PREFIX")]
    pub outlet_prefix: Option<String>,

    /// Seconds between time-sync events (0 = never)
    #[arg(long, env = "GAZE_RELAY_TIME_SYNC_INTERVAL")]
    pub time_sync_interval: Option<u64>,

    /// Seconds to search for and connect to the device
    #[arg(long, env = "GAZE_RELAY_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Seconds a disconnected gaze sensor may stay away before the session ends
    #[arg(long, env = "GAZE_RELAY_TEARDOWN_TIMEOUT")]
    pub teardown_timeout: Option<u64>,

    /// Stop the session after this many seconds
    #[arg(long, env = "GAZE_RELAY_DURATION")]
    pub duration: Option<u64>,

    /// Output transport
    #[arg(long, value_enum, env = "GAZE_RELAY_TRANSPORT")]
    pub transport: Option<TransportArg>,

    /// Transport parameter as KEY=VALUE (repeatable)
    #[arg(long = "transport-param", value_name = "KEY=VALUE")]
    pub transport_params: Vec<String>,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, env = "GAZE_RELAY_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `align` command
#[derive(Parser, Debug, Clone)]
pub struct AlignArgs {
    /// Capture file (XDF)
    pub capture: PathBuf,

    /// Directories searched recursively for cloud exports (default: current directory)
    pub export_roots: Vec<PathBuf>,

    /// Output directory
    #[arg(long, default_value = ".", env = "GAZE_RELAY_OUTPUT_PATH")]
    pub output_path: PathBuf,

    /// How exports are matched to capture streams
    #[arg(long, value_enum, default_value = "serial")]
    pub match_by: MatchArg,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Output transport
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportArg {
    Log,
    File,
    Network,
}

impl From<TransportArg> for contracts::TransportKind {
    fn from(kind: TransportArg) -> Self {
        match kind {
            TransportArg::Log => Self::Log,
            TransportArg::File => Self::File,
            TransportArg::Network => Self::Network,
        }
    }
}

/// Session matching strategy
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchArg {
    /// World camera serial vs. info.json
    #[default]
    Serial,
    /// Session id parsed from time-sync event names
    Session,
}

impl From<MatchArg> for time_align::MatchStrategy {
    fn from(strategy: MatchArg) -> Self {
        match strategy {
            MatchArg::Serial => Self::Serial,
            MatchArg::Session => Self::Session,
        }
    }
}
