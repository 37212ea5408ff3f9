//! `ironscan start` command handler

use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use ironscan_core::types::ScanStatus;

use crate::cli::StartArgs;
use crate::client::DaemonClient;
use crate::commands::status::ScanListReport;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, colored_status};

/// Execute the `start` command.
pub async fn execute(
    args: StartArgs,
    client: &mut DaemonClient,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let options = parse_options(&args.options)?;
    let started: StartedReport = client
        .call(&json!({
            "command": "start_scan",
            "targets": args.targets,
            "options": options,
        }))
        .await?;

    if !args.wait {
        return writer.render(&started);
    }

    debug!(scan_id = %started.scan_id, "waiting for scan to end");
    let poll = Duration::from_millis(args.poll_ms.max(50));
    let scan = loop {
        let report: ScanListReport = client
            .call(&json!({"command": "get_scans", "scan_id": started.scan_id}))
            .await?;
        let Some(scan) = report.scans.into_iter().next() else {
            return Err(CliError::Protocol("get_scans returned no scan".to_owned()));
        };
        if scan.scan.status.is_terminal() {
            break scan;
        }
        tokio::time::sleep(poll).await;
    };

    let status = scan.scan.status;
    writer.render(&ScanListReport { scans: vec![scan] })?;
    if status == ScanStatus::Finished {
        Ok(())
    } else {
        Err(CliError::ScanNotFinished {
            id: started.scan_id,
            status: status.to_string(),
        })
    }
}

/// Parse repeated `name=value` options.
pub fn parse_options(raw: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    raw.iter()
        .map(|item| {
            let (name, value) = item.split_once('=').ok_or_else(|| {
                CliError::Command(format!("option '{item}' is not in NAME=VALUE form"))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(CliError::Command(format!("option '{item}' has an empty name")));
            }
            Ok((name.to_owned(), value.trim().to_owned()))
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartedReport {
    pub scan_id: String,
    pub scan_status: String,
}

impl Render for StartedReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "Scan {} {}",
            self.scan_id,
            colored_status(&self.scan_status)
        )
    }
}
