//! `ironscan details` and `ironscan health` command handlers

use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::DaemonClient;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, age, colored_health, now_secs};

/// Execute the `details` command.
pub async fn execute_details(
    client: &mut DaemonClient,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let reply: DetailsReply = client
        .call(&json!({"command": "get_scanner_details"}))
        .await?;
    writer.render(&reply.scanner)
}

/// Execute the `health` command.
///
/// Unhealthy daemons still render; the exit code stays 0 so that scripts
/// read the report instead of guessing from the status.
pub async fn execute_health(
    client: &mut DaemonClient,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let reply: HealthReply = client.call(&json!({"command": "get_health"})).await?;
    writer.render(&reply.health)
}

#[derive(Deserialize)]
struct DetailsReply {
    scanner: ScannerDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScannerDetails {
    pub name: String,
    pub version: String,
    pub description: String,
    pub params: Vec<ScannerParam>,
    pub max_concurrent_scans: usize,
    pub running_scans: usize,
    pub feed: FeedSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScannerParam {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub default: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedSummary {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub policy: String,
    pub vts: usize,
    pub files_rejected: usize,
    pub loaded_at: u64,
}

impl Render for ScannerDetails {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "{} {}", self.name.bold(), self.version)?;
        writeln!(w, "{}", self.description.dimmed())?;
        writeln!(w)?;
        writeln!(
            w,
            "Scans: {} running / {} max",
            self.running_scans, self.max_concurrent_scans
        )?;

        let loaded = if self.feed.loaded_at == 0 {
            "never".to_owned()
        } else {
            age(self.feed.loaded_at, now_secs())
        };
        writeln!(
            w,
            "Feed:  {} ({} policy), {} VTs, {} files rejected, loaded {}",
            colored_health(&self.feed.state),
            self.feed.policy,
            self.feed.vts,
            self.feed.files_rejected,
            loaded
        )?;
        if let Some(reason) = &self.feed.reason {
            writeln!(w, "       {}", reason.red())?;
        }

        writeln!(w)?;
        writeln!(w, "{:<24} {:<8} {:<10} Description", "Parameter", "Type", "Default")?;
        writeln!(w, "{}", "-".repeat(80))?;
        for p in &self.params {
            writeln!(
                w,
                "{:<24} {:<8} {:<10} {}",
                p.id, p.kind, p.default, p.description
            )?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct HealthReply {
    health: DaemonHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DaemonHealth {
    pub status: HealthState,
    pub uptime_secs: u64,
    pub active_scans: usize,
    pub components: Vec<ComponentHealth>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthState {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub enabled: bool,
    pub status: HealthState,
}

impl Render for DaemonHealth {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Daemon: {} (uptime: {}s, active scans: {})",
            colored_health(&self.status.state),
            self.uptime_secs,
            self.active_scans
        )?;
        writeln!(w)?;
        writeln!(w, "{:<20} {:<10} Health", "Component", "Enabled")?;
        writeln!(w, "{}", "-".repeat(60))?;

        for c in &self.components {
            let enabled = if c.enabled { "yes" } else { "no" };
            let state = if c.enabled {
                colored_health(&c.status.state)
            } else {
                "-".dimmed()
            };
            writeln!(w, "{:<20} {:<10} {}", c.name, enabled, state)?;
            if let Some(reason) = c.status.reason.as_ref().filter(|_| c.enabled) {
                writeln!(w, "  {}", reason.dimmed())?;
            }
        }
        Ok(())
    }
}
