//! Graceful shutdown with scans in flight.

use ironscan_controller::DAEMON_SHUTDOWN;
use ironscan_core::types::{ScanId, ScanStatus};

use crate::helpers::config::LONG_SCAN;
use crate::helpers::daemon::{TestDaemon, start_scan, wait_for_status};

#[tokio::test]
async fn shutdown_interrupts_running_scans_and_keeps_queued_ones() {
    let daemon = TestDaemon::start_with(|b| b.script(LONG_SCAN).ceiling(1)).await;
    let mut client = daemon.client().await;

    let running = start_scan(&mut client, &["10.0.0.1"]).await;
    wait_for_status(&mut client, &running, |s| s == "RUNNING").await;
    let queued = start_scan(&mut client, &["10.0.0.2"]).await;
    wait_for_status(&mut client, &queued, |s| s == "QUEUED").await;
    drop(client);

    let (result, controller, _dir) = daemon.stop().await;
    result.unwrap();

    let running: ScanId = running.parse().unwrap();
    let scan = controller.get_scan_status(running).await.unwrap();
    assert_eq!(scan.status, ScanStatus::Interrupted);
    assert_eq!(scan.error.as_deref(), Some(DAEMON_SHUTDOWN));

    let queued: ScanId = queued.parse().unwrap();
    let scan = controller.get_scan_status(queued).await.unwrap();
    assert_eq!(scan.status, ScanStatus::Queued);
}

#[tokio::test]
async fn shutdown_with_idle_daemon_is_clean() {
    let daemon = TestDaemon::start().await;
    let started = std::time::Instant::now();
    daemon.stop().await.0.unwrap();
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}
