//! Aggregated health check reporting.
//!
//! Combines the scan controller (state store and feed) and the result
//! publisher into one [`DaemonHealth`] report. The overall status is the
//! worst status among enabled components.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use ironscan_core::pipeline::HealthStatus;

/// Aggregated health report for the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall status (worst of all components).
    pub status: HealthStatus,
    /// Seconds since the daemon started.
    pub uptime_secs: u64,
    /// Scans currently running or waiting for a slot.
    pub active_scans: usize,
    /// Per-component reports.
    pub components: Vec<ComponentHealth>,
}

/// Health status of a single component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    /// Component name (e.g. "controller", "publisher").
    pub name: String,
    /// Whether the component is enabled in configuration.
    pub enabled: bool,
    /// Current status.
    pub status: HealthStatus,
}

impl ComponentHealth {
    /// Report for an enabled component.
    pub fn enabled(name: &str, status: HealthStatus) -> Self {
        Self {
            name: name.to_owned(),
            enabled: true,
            status,
        }
    }

    /// Report for a component turned off in configuration.
    pub fn disabled(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            enabled: false,
            status: HealthStatus::Healthy,
        }
    }
}

/// Aggregate component statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
/// Only enabled components are considered.
pub fn aggregate_status(components: &[ComponentHealth]) -> HealthStatus {
    let mut worst = HealthStatus::Healthy;
    let mut reasons = Vec::new();

    for component in components.iter().filter(|c| c.enabled) {
        match &component.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                reasons.push(format!("{}: {}", component.name, reason));
                if !worst.is_unhealthy() {
                    worst = HealthStatus::Degraded(String::new());
                }
            }
            HealthStatus::Unhealthy(reason) => {
                reasons.push(format!("{}: {}", component.name, reason));
                worst = HealthStatus::Unhealthy(String::new());
            }
        }
    }

    match worst {
        HealthStatus::Healthy => HealthStatus::Healthy,
        HealthStatus::Degraded(_) => HealthStatus::Degraded(reasons.join("; ")),
        HealthStatus::Unhealthy(_) => HealthStatus::Unhealthy(reasons.join("; ")),
    }
}

/// Spawn a task that logs the aggregated health every `interval`.
///
/// Healthy reports are logged at debug, anything else at warn.
pub fn spawn_health_log_task<F, Fut>(
    interval: Duration,
    shutdown: CancellationToken,
    check: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = DaemonHealth> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let health = check().await;
                    match &health.status {
                        HealthStatus::Healthy => tracing::debug!(
                            active_scans = health.active_scans,
                            "daemon healthy"
                        ),
                        status => tracing::warn!(
                            status = status.as_str(),
                            reason = ?status,
                            active_scans = health.active_scans,
                            "daemon health check"
                        ),
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::debug!("health log task shutting down");
                    break;
                }
            }
        }
    })
}
