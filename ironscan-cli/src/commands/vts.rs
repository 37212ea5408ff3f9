//! `ironscan vts` command handler

use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::json;

use ironscan_core::types::VtDescriptor;

use crate::cli::VtsArgs;
use crate::client::DaemonClient;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `vts` command.
pub async fn execute(
    args: VtsArgs,
    client: &mut DaemonClient,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let mut request = json!({"command": "get_vts"});
    if let Some(oid) = args.oid {
        request["oid"] = json!(oid);
    }
    if let Some(family) = args.family {
        request["family"] = json!(family);
    }

    let report: VtListReport = client.call(&request).await?;
    writer.render(&report)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VtListReport {
    pub vts: Vec<VtDescriptor>,
}

impl Render for VtListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.vts.is_empty() {
            return writeln!(w, "No VTs match.");
        }

        // a single descriptor gets the long form
        if let [vt] = self.vts.as_slice() {
            writeln!(w, "{} {}", vt.oid.bold(), vt.name)?;
            writeln!(w, "  Family:    {}", vt.family)?;
            writeln!(w, "  Category:  {}", vt.category)?;
            writeln!(w, "  QoD type:  {}", vt.qod_type)?;
            if let Some(vector) = &vt.severity_vector {
                writeln!(w, "  Severity:  {vector}")?;
            }
            if !vt.summary.is_empty() {
                writeln!(w, "  Summary:   {}", vt.summary)?;
            }
            writeln!(w, "  Solution:  {} ({})", vt.solution, vt.solution_type)?;
            if !vt.refs.cve.is_empty() {
                writeln!(w, "  CVEs:      {}", vt.refs.cve.join(", "))?;
            }
            return Ok(());
        }

        writeln!(w, "{:<36} {:<24} Name", "OID", "Family")?;
        writeln!(w, "{}", "-".repeat(90))?;
        for vt in &self.vts {
            writeln!(w, "{:<36} {:<24} {}", vt.oid, vt.family, vt.name)?;
        }
        writeln!(w)?;
        writeln!(w, "{} VTs", self.vts.len())
    }
}
