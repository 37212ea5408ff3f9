//! Control socket request/response schema.
//!
//! One JSON document per line in each direction. Requests are tagged by
//! `"command"`; responses carry `"status": "ok"` or `"status": "fault"`.
//! Payloads are validated here, before they reach the scan controller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ironscan_controller::{ControllerError, ScannerDetails};
use ironscan_core::types::{Scan, ScanId, ScanOptions, ScanResult, ScanStatus, VtDescriptor};

use crate::health::DaemonHealth;

/// Maximum accepted request line, in bytes.
pub const MAX_REQUEST_BYTES: u64 = 1024 * 1024;

/// A client request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    /// Scanner name, version, parameters and feed state.
    GetScannerDetails,
    /// Create a scan and start it.
    StartScan {
        /// Hosts, addresses or ranges.
        targets: Vec<String>,
        /// Scanner parameters; numbers and booleans are accepted as values.
        #[serde(default)]
        options: BTreeMap<String, serde_json::Value>,
    },
    /// Status of one scan, or of all scans.
    GetScans {
        /// Restrict to one scan.
        #[serde(default)]
        scan_id: Option<ScanId>,
        /// Include results.
        #[serde(default)]
        details: bool,
        /// First result index to include.
        #[serde(default)]
        since_index: usize,
    },
    /// Stop a scan and wait for the scanner to exit.
    StopScan {
        /// Target scan.
        scan_id: ScanId,
    },
    /// Remove a finished scan and its results.
    DeleteScan {
        /// Target scan.
        scan_id: ScanId,
    },
    /// VT descriptors from the loaded feed.
    GetVts {
        /// Exact OID.
        #[serde(default)]
        oid: Option<String>,
        /// Family name.
        #[serde(default)]
        family: Option<String>,
    },
    /// Aggregated daemon health.
    GetHealth,
}

impl Request {
    /// Parse one request line.
    pub fn parse(line: &str) -> Result<Self, Fault> {
        serde_json::from_str(line)
            .map_err(|e| Fault::new(FaultCode::BadRequest, format!("malformed request: {e}")))
    }

    /// Command name, used as a metric label.
    pub fn command(&self) -> &'static str {
        match self {
            Self::GetScannerDetails => "get_scanner_details",
            Self::StartScan { .. } => "start_scan",
            Self::GetScans { .. } => "get_scans",
            Self::StopScan { .. } => "stop_scan",
            Self::DeleteScan { .. } => "delete_scan",
            Self::GetVts { .. } => "get_vts",
            Self::GetHealth => "get_health",
        }
    }
}

/// Convert loosely typed option values into scanner option strings.
///
/// Strings pass through, numbers are rendered in decimal, booleans become `1`/`0`.
pub fn normalize_options(
    raw: BTreeMap<String, serde_json::Value>,
) -> Result<ScanOptions, Fault> {
    raw.into_iter()
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => if b { "1" } else { "0" }.to_owned(),
                other => {
                    return Err(Fault::new(
                        FaultCode::InvalidOptions,
                        format!("option '{name}' has unsupported value {other}"),
                    ));
                }
            };
            Ok((name, value))
        })
        .collect()
}

/// A response line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Request succeeded.
    Ok(Reply),
    /// Request failed.
    Fault(Fault),
}

impl Response {
    /// Fault response shortcut.
    pub fn fault(code: FaultCode, message: impl Into<String>) -> Self {
        Self::Fault(Fault::new(code, message))
    }

    /// Serialize as a single line, without the trailing newline.
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"status":"fault","code":"internal","message":"response encoding failed: {e}"}}"#)
        })
    }
}

/// Successful payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// `get_scanner_details`
    Details {
        /// Scanner description.
        scanner: ScannerDetails,
    },
    /// `start_scan`
    Started {
        /// New scan id.
        scan_id: ScanId,
        /// `RUNNING`, or `QUEUED` when every slot is taken.
        scan_status: ScanStatus,
    },
    /// `get_scans`
    Scans {
        /// Matching scans.
        scans: Vec<ScanReport>,
    },
    /// `stop_scan`
    Stopped {
        /// Stopped scan.
        scan_id: ScanId,
        /// Final status.
        scan_status: ScanStatus,
    },
    /// `delete_scan`
    Deleted {
        /// Deleted scan.
        scan_id: ScanId,
    },
    /// `get_vts`
    Vts {
        /// Matching descriptors.
        vts: Vec<VtDescriptor>,
    },
    /// `get_health`
    Health {
        /// Health report.
        health: DaemonHealth,
    },
}

/// One scan in a `get_scans` reply.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Scan snapshot.
    #[serde(flatten)]
    pub scan: Scan,
    /// Results from `since_index` on, when details were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ScanResult>>,
}

/// Fault category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultCode {
    /// Malformed JSON, unknown command or missing field.
    BadRequest,
    /// Targets or options failed validation.
    InvalidOptions,
    /// No such scan.
    NotFound,
    /// No connection or process slot available.
    ResourceExhausted,
    /// State store unreachable after retries.
    StoreUnavailable,
    /// Feed failed verification.
    IntegrityFailure,
    /// Request not valid in the scan's current status.
    InvalidTransition,
    /// Request not answered in time.
    Timeout,
    /// Anything else.
    Internal,
}

/// Structured error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    /// Category.
    pub code: FaultCode,
    /// Human-readable detail.
    pub message: String,
}

impl Fault {
    /// Create a fault.
    pub fn new(code: FaultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ControllerError> for Fault {
    fn from(err: ControllerError) -> Self {
        let code = match &err {
            ControllerError::InvalidOptions(_) => FaultCode::InvalidOptions,
            ControllerError::ScanNotFound(_) => FaultCode::NotFound,
            ControllerError::InvalidTransition { .. } | ControllerError::ScanActive { .. } => {
                FaultCode::InvalidTransition
            }
            ControllerError::ResourceExhausted(_) => FaultCode::ResourceExhausted,
            ControllerError::StoreUnavailable(_) => FaultCode::StoreUnavailable,
            ControllerError::IntegrityFailure(_) => FaultCode::IntegrityFailure,
            ControllerError::ResourceLimitExceeded(_)
            | ControllerError::ProcessFailure(_)
            | ControllerError::Internal(_) => FaultCode::Internal,
        };
        Self::new(code, err.to_string())
    }
}
