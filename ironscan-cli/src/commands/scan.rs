//! `ironscan stop` and `ironscan delete` command handlers

use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cli::ScanIdArgs;
use crate::client::DaemonClient;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, colored_status};

/// Execute the `stop` command.
///
/// Returns once the daemon reports the scanner has exited.
pub async fn execute_stop(
    args: ScanIdArgs,
    client: &mut DaemonClient,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let report: StoppedReport = client
        .call(&json!({"command": "stop_scan", "scan_id": args.scan_id}))
        .await?;
    writer.render(&report)
}

/// Execute the `delete` command.
pub async fn execute_delete(
    args: ScanIdArgs,
    client: &mut DaemonClient,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let report: DeletedReport = client
        .call(&json!({"command": "delete_scan", "scan_id": args.scan_id}))
        .await?;
    writer.render(&report)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoppedReport {
    pub scan_id: String,
    pub scan_status: String,
}

impl Render for StoppedReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "Scan {} stopped: {}",
            self.scan_id,
            colored_status(&self.scan_status)
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedReport {
    pub scan_id: String,
}

impl Render for DeletedReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Scan {} deleted", self.scan_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(payload: &impl Render) -> String {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        payload.render_text(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn stopped_reply_renders_final_status() {
        let report: StoppedReport = serde_json::from_value(json!({
            "status": "ok",
            "scan_id": "5f1e",
            "scan_status": "STOPPED"
        }))
        .unwrap();
        assert_eq!(render(&report), "Scan 5f1e stopped: STOPPED\n");
    }

    #[test]
    fn already_finished_scan_keeps_its_status() {
        let report = StoppedReport {
            scan_id: "5f1e".to_owned(),
            scan_status: "FINISHED".to_owned(),
        };
        assert!(render(&report).ends_with("FINISHED\n"));
    }

    #[test]
    fn deleted_reply() {
        let report: DeletedReport =
            serde_json::from_value(json!({"status": "ok", "scan_id": "5f1e"})).unwrap();
        assert_eq!(render(&report), "Scan 5f1e deleted\n");
    }
}
