//! `ironscan status` command handler

use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::json;

use ironscan_core::types::{Scan, ScanResult, Severity};

use crate::cli::StatusArgs;
use crate::client::DaemonClient;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, age, colored_status, now_secs};

/// Execute the `status` command.
pub async fn execute(
    args: StatusArgs,
    client: &mut DaemonClient,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let mut request = json!({
        "command": "get_scans",
        "details": args.results,
        "since_index": args.since,
    });
    if let Some(id) = &args.scan_id {
        request["scan_id"] = json!(id);
    }

    let report: ScanListReport = client.call(&request).await?;
    writer.render(&report)
}

/// `get_scans` reply.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanListReport {
    pub scans: Vec<ScanEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanEntry {
    #[serde(flatten)]
    pub scan: Scan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ScanResult>>,
}

impl Render for ScanListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.scans.is_empty() {
            return writeln!(w, "No scans.");
        }

        let now = now_secs();
        writeln!(
            w,
            "{:<36}  {:<11}  {:>8}  {:<10}  Targets",
            "Scan", "Status", "Progress", "Updated"
        )?;
        writeln!(w, "{}", "-".repeat(90))?;

        for entry in &self.scans {
            let scan = &entry.scan;
            let status = scan.status.as_str();
            // escape codes break width specifiers, pad by hand
            let padding = " ".repeat(11usize.saturating_sub(status.len()));
            let mut progress = format!("{}%", scan.progress);
            if scan.stalled {
                progress = format!("{progress} !");
            }
            writeln!(
                w,
                "{:<36}  {}{}  {:>8}  {:<10}  {}",
                scan.id.to_string(),
                colored_status(status),
                padding,
                progress,
                age(scan.last_update, now),
                scan.targets.join(",")
            )?;

            if scan.stalled {
                writeln!(w, "  {}", "no progress reported within the stall window".yellow())?;
            }
            if let Some(error) = &scan.error {
                writeln!(w, "  {}", error.red())?;
            }

            if let Some(results) = &entry.results {
                render_results(w, results)?;
            }
        }
        Ok(())
    }
}

fn render_results(w: &mut dyn Write, results: &[ScanResult]) -> std::io::Result<()> {
    use colored::Colorize;

    if results.is_empty() {
        return writeln!(w, "  {}", "no results".dimmed());
    }
    for r in results {
        let severity = format!("{:<8}", r.severity.to_string());
        let severity = match r.severity {
            Severity::Critical | Severity::High => severity.red().bold(),
            Severity::Medium => severity.yellow(),
            Severity::Low | Severity::Info => severity.normal(),
        };
        let location = match &r.port {
            Some(port) => format!("{} {}", r.host, port),
            None => r.host.clone(),
        };
        writeln!(w, "  {} {:<24} {:<32} {}", severity, location, r.vt_oid, r.description)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ScanListReport {
        serde_json::from_value(json!({
            "status": "ok",
            "scans": [{
                "id": "6a0c6d1e-6a8a-4f57-9f1f-3b2f0b0f6b11",
                "targets": ["10.0.0.1", "10.0.0.2"],
                "options": {"max_hosts": "5"},
                "status": "INTERRUPTED",
                "created_time": 100,
                "start_time": 101,
                "end_time": 160,
                "progress": 40,
                "host_progress": [{"host": "10.0.0.1", "percent": 40}],
                "error": "scanner exited with code 3",
                "last_update": 160,
                "stalled": false,
                "results": [{
                    "host": "10.0.0.1",
                    "port": "22/tcp",
                    "vt_oid": "1.3.6.1.4.1.25623.1.0.1",
                    "severity": "high",
                    "description": "weak ssh ciphers",
                    "result_type": "alarm",
                    "timestamp": 150
                }]
            }]
        }))
        .unwrap()
    }

    fn render(report: &ScanListReport) -> String {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn decodes_flattened_scan_with_results() {
        let report = report();
        let entry = &report.scans[0];
        assert_eq!(entry.scan.progress, 40);
        assert_eq!(entry.results.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn renders_status_error_and_results() {
        let output = render(&report());
        assert!(output.contains("6a0c6d1e-6a8a-4f57-9f1f-3b2f0b0f6b11"));
        assert!(output.contains("INTERRUPTED"));
        assert!(output.contains("40%"));
        assert!(output.contains("10.0.0.1,10.0.0.2"));
        assert!(output.contains("scanner exited with code 3"));
        assert!(output.contains("10.0.0.1 22/tcp"));
        assert!(output.contains("weak ssh ciphers"));
    }

    #[test]
    fn stalled_scans_are_flagged() {
        let mut report = report();
        report.scans[0].scan.stalled = true;
        let output = render(&report);
        assert!(output.contains("40% !"));
        assert!(output.contains("stall window"));
    }

    #[test]
    fn empty_list() {
        let report = ScanListReport { scans: Vec::new() };
        assert_eq!(render(&report), "No scans.\n");
    }

    #[test]
    fn json_output_keeps_flattened_shape() {
        let value = serde_json::to_value(report()).unwrap();
        assert_eq!(value["scans"][0]["status"], "INTERRUPTED");
        assert!(value["scans"][0]["results"].is_array());
    }
}
