//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Ironscan -- vulnerability scan orchestration client.
///
/// Talks to a running `ironscand` over its control socket.
/// Use `ironscan <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "ironscan", version, about, long_about = None)]
pub struct Cli {
    /// Path to the ironscan.toml configuration file.
    #[arg(short, long, default_value = "/etc/ironscan/ironscan.toml")]
    pub config: PathBuf,

    /// Control socket path (default: `socket.path` from the configuration).
    #[arg(short, long, global = true)]
    pub socket: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show scanner name, version, parameters and feed state.
    Details,

    /// Create and start a scan.
    Start(StartArgs),

    /// Show one scan or all scans.
    Status(StatusArgs),

    /// Stop a running or queued scan.
    Stop(ScanIdArgs),

    /// Delete a finished scan and its results.
    Delete(ScanIdArgs),

    /// List VT descriptors from the loaded feed.
    Vts(VtsArgs),

    /// Show aggregated daemon health.
    Health,

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- start ----

/// Create and start a scan.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Hosts, addresses or ranges to scan.
    #[arg(required = true)]
    pub targets: Vec<String>,

    /// Scanner parameter as `name=value` (repeatable).
    #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
    pub options: Vec<String>,

    /// Wait until the scan ends and print its final status.
    #[arg(short, long)]
    pub wait: bool,

    /// Polling interval while waiting, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub poll_ms: u64,
}

// ---- status ----

/// Show scan status.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Scan id (all scans when omitted).
    pub scan_id: Option<String>,

    /// Include results.
    #[arg(short, long)]
    pub results: bool,

    /// First result index to include.
    #[arg(long, default_value_t = 0)]
    pub since: usize,
}

// ---- stop / delete ----

#[derive(Args, Debug)]
pub struct ScanIdArgs {
    /// Scan id.
    pub scan_id: String,
}

// ---- vts ----

/// Filter VT descriptors.
#[derive(Args, Debug)]
pub struct VtsArgs {
    /// Exact OID.
    #[arg(long)]
    pub oid: Option<String>,

    /// Family name.
    #[arg(long)]
    pub family: Option<String>,
}

// ---- config ----

/// Manage ironscan configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, socket, store, feed, supervisor, publisher, controller, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}
