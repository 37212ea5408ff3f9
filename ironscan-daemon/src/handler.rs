//! Request dispatch.
//!
//! Turns a parsed [`Request`] into controller calls and a [`Response`].
//! Status and result queries are plain reads and never wait on a scan.

use std::time::Instant;

use ironscan_controller::{ControllerError, ScanController, VtFilter};
use ironscan_core::metrics as m;
use ironscan_core::pipeline::HealthStatus;
use ironscan_publisher::PublisherHandle;
use ironscan_store::StateStore;

use crate::health::{ComponentHealth, DaemonHealth, aggregate_status};
use crate::protocol::{Fault, Reply, Request, Response, ScanReport, normalize_options};

/// Serves control socket requests against a scan controller.
pub struct RequestHandler<S> {
    controller: ScanController<S>,
    publisher: Option<PublisherHandle>,
    started: Instant,
}

impl<S: StateStore> RequestHandler<S> {
    /// Create a handler. `publisher` is `None` when publishing is disabled.
    pub fn new(controller: ScanController<S>, publisher: Option<PublisherHandle>) -> Self {
        Self {
            controller,
            publisher,
            started: Instant::now(),
        }
    }

    /// The controller requests are dispatched to.
    pub fn controller(&self) -> &ScanController<S> {
        &self.controller
    }

    /// Parse and handle one request line.
    pub async fn handle_line(&self, line: &str) -> Response {
        match Request::parse(line) {
            Ok(request) => self.handle(request).await,
            Err(fault) => {
                metrics::counter!(
                    m::SOCKET_REQUESTS_TOTAL,
                    m::LABEL_COMMAND => "invalid",
                    m::LABEL_RESULT => "fault"
                )
                .increment(1);
                tracing::debug!(message = %fault.message, "rejected malformed request");
                Response::Fault(fault)
            }
        }
    }

    /// Handle a parsed request.
    pub async fn handle(&self, request: Request) -> Response {
        let command = request.command();
        let response = match self.dispatch(request).await {
            Ok(reply) => Response::Ok(reply),
            Err(fault) => {
                tracing::debug!(command, code = ?fault.code, message = %fault.message, "request failed");
                Response::Fault(fault)
            }
        };
        let result = match &response {
            Response::Ok(_) => "ok",
            Response::Fault(_) => "fault",
        };
        metrics::counter!(m::SOCKET_REQUESTS_TOTAL, m::LABEL_COMMAND => command, m::LABEL_RESULT => result)
            .increment(1);
        response
    }

    async fn dispatch(&self, request: Request) -> Result<Reply, Fault> {
        let controller = &self.controller;
        match request {
            Request::GetScannerDetails => Ok(Reply::Details {
                scanner: controller.scanner_details().await,
            }),
            Request::StartScan { targets, options } => {
                let options = normalize_options(options)?;
                let (scan_id, scan_status) = controller.create_and_start(targets, options).await?;
                Ok(Reply::Started {
                    scan_id,
                    scan_status,
                })
            }
            Request::GetScans {
                scan_id,
                details,
                since_index,
            } => {
                let scans = match scan_id {
                    Some(id) => vec![controller.get_scan_status(id).await?],
                    None => controller.list_scans().await?,
                };
                let mut reports = Vec::with_capacity(scans.len());
                for scan in scans {
                    let results = if details {
                        match controller.get_results(scan.id, since_index).await {
                            Ok(results) => Some(results),
                            // deleted between listing and reading
                            Err(ControllerError::ScanNotFound(_)) if scan_id.is_none() => continue,
                            Err(e) => return Err(e.into()),
                        }
                    } else {
                        None
                    };
                    reports.push(ScanReport { scan, results });
                }
                Ok(Reply::Scans { scans: reports })
            }
            Request::StopScan { scan_id } => {
                let scan_status = controller.stop_scan(scan_id).await?;
                Ok(Reply::Stopped {
                    scan_id,
                    scan_status,
                })
            }
            Request::DeleteScan { scan_id } => {
                controller.delete_scan(scan_id).await?;
                Ok(Reply::Deleted { scan_id })
            }
            Request::GetVts { oid, family } => {
                let vts = controller.get_vts(&VtFilter { oid, family }).await?;
                Ok(Reply::Vts { vts })
            }
            Request::GetHealth => Ok(Reply::Health {
                health: self.health().await,
            }),
        }
    }

    /// Aggregated daemon health.
    pub async fn health(&self) -> DaemonHealth {
        let mut components = vec![ComponentHealth::enabled(
            "controller",
            self.controller.health().await,
        )];
        components.push(match &self.publisher {
            Some(publisher) => {
                let dropped = publisher.dropped();
                let status = if dropped > 0 {
                    HealthStatus::Degraded(format!("{dropped} messages dropped"))
                } else {
                    HealthStatus::Healthy
                };
                ComponentHealth::enabled("publisher", status)
            }
            None => ComponentHealth::disabled("publisher"),
        });

        let uptime_secs = self.started.elapsed().as_secs();
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);

        DaemonHealth {
            status: aggregate_status(&components),
            uptime_secs,
            active_scans: self.controller.active_scans().await,
            components,
        }
    }
}
