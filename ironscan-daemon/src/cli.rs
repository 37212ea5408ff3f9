//! CLI argument definitions for ironscand.
//!
//! Uses `clap` v4 derive macros. Every flag overrides the matching
//! `ironscan.toml` value and its environment variable.

use std::path::PathBuf;

use clap::Parser;

use ironscan_core::config::IronscanConfig;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ironscan/ironscan.toml";

/// Ironscan vulnerability scan orchestration daemon.
///
/// Accepts scan requests on a local control socket, supervises one scanner
/// process per scan and keeps scan state in the configured state store.
#[derive(Parser, Debug, Default)]
#[command(name = "ironscand")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to ironscan.toml. Built-in defaults are used when the default file is absent.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Control socket path.
    #[arg(short, long)]
    pub socket: Option<String>,

    /// Write logs to this file instead of stdout.
    #[arg(long)]
    pub log_file: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Load feed content even when it fails signature verification.
    #[arg(long, visible_alias = "disable-notus-hashsum-verification")]
    pub disable_integrity_check: bool,

    /// Maximum number of scanner processes running at once.
    #[arg(long)]
    pub max_concurrent_scans: Option<usize>,

    /// Directory holding trusted feed signing keys (*.pub).
    #[arg(long)]
    pub trust_keys_dir: Option<String>,

    /// Advisory feed directory.
    #[arg(long)]
    pub feed_dir: Option<String>,

    /// Override PID file path (empty string disables the PID file).
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut IronscanConfig) {
        if let Some(path) = &self.socket {
            config.socket.path = path.clone();
        }
        if let Some(path) = &self.log_file {
            config.general.log_file = path.clone();
        }
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if self.disable_integrity_check {
            config.feed.disable_integrity_check = true;
        }
        if let Some(n) = self.max_concurrent_scans {
            config.supervisor.max_concurrent_scans = n;
        }
        if let Some(dir) = &self.trust_keys_dir {
            config.feed.trust_keys_dir = dir.clone();
        }
        if let Some(dir) = &self.feed_dir {
            config.feed.feed_dir = dir.clone();
        }
        if let Some(path) = &self.pid_file {
            config.general.pid_file = path.clone();
        }
    }
}
