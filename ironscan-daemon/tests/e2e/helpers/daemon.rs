//! Running daemon handle.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ironscan_controller::ScanController;
use ironscan_core::config::IronscanConfig;
use ironscan_daemon::orchestrator::{DaemonStore, Orchestrator};

use super::client::{Client, ok};
use super::config::TestConfigBuilder;

/// A daemon running on a background task.
#[allow(dead_code)]
pub struct TestDaemon {
    pub socket: PathBuf,
    pub config: IronscanConfig,
    pub controller: ScanController<DaemonStore>,
    shutdown: CancellationToken,
    task: JoinHandle<anyhow::Result<()>>,
    _dir: TempDir,
}

#[allow(dead_code)]
impl TestDaemon {
    /// Start a daemon with the default test configuration.
    pub async fn start() -> Self {
        Self::start_with(|b| b).await
    }

    /// Start a daemon after customizing the test configuration.
    pub async fn start_with(customize: impl FnOnce(TestConfigBuilder) -> TestConfigBuilder) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = customize(TestConfigBuilder::new(dir.path())).build();

        let orchestrator = Orchestrator::build_from_config(config.clone())
            .await
            .expect("daemon builds");
        let controller = orchestrator.controller().clone();
        let shutdown = orchestrator.shutdown_token();
        let task = tokio::spawn(orchestrator.run_until(std::future::pending()));

        Self {
            socket: PathBuf::from(&config.socket.path),
            config,
            controller,
            shutdown,
            task,
            _dir: dir,
        }
    }

    pub async fn client(&self) -> Client {
        Client::connect(&self.socket).await
    }

    /// Cancel the daemon and wait for `run_until` to return.
    pub async fn stop(self) -> (anyhow::Result<()>, ScanController<DaemonStore>, TempDir) {
        self.shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(15), self.task)
            .await
            .expect("daemon stops in time")
            .expect("daemon task does not panic");
        (result, self.controller, self._dir)
    }
}

/// Start a scan and return its id.
#[allow(dead_code)]
pub async fn start_scan(client: &mut Client, targets: &[&str]) -> String {
    let response = ok(client
        .send(json!({"command": "start_scan", "targets": targets}))
        .await);
    response["scan_id"].as_str().expect("scan_id").to_owned()
}

/// Poll `get_scans` until `wanted` accepts the status.
#[allow(dead_code)]
pub async fn wait_for_status(client: &mut Client, scan_id: &str, wanted: impl Fn(&str) -> bool) -> Value {
    for _ in 0..500 {
        let response = ok(client
            .send(json!({"command": "get_scans", "scan_id": scan_id}))
            .await);
        let scan = response["scans"][0].clone();
        if wanted(scan["status"].as_str().unwrap_or_default()) {
            return scan;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("scan {scan_id} did not reach the expected status");
}

/// Poll until the scan reaches a terminal status.
#[allow(dead_code)]
pub async fn wait_terminal(client: &mut Client, scan_id: &str) -> Value {
    wait_for_status(client, scan_id, |s| {
        matches!(s, "FINISHED" | "STOPPED" | "INTERRUPTED")
    })
    .await
}
