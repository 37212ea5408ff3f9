//! Scans driven end to end over the control socket.

use serde_json::json;

use crate::helpers::client::{fault, ok};
use crate::helpers::config::LONG_SCAN;
use crate::helpers::daemon::{TestDaemon, start_scan, wait_for_status, wait_terminal};

#[tokio::test]
async fn scan_runs_to_finished_with_ordered_results() {
    let daemon = TestDaemon::start().await;
    let mut client = daemon.client().await;

    let response = ok(client
        .send(json!({
            "command": "start_scan",
            "targets": ["10.0.0.1"],
            "options": {"max_hosts": 5, "safe_checks": true}
        }))
        .await);
    assert_eq!(response["scan_status"], "RUNNING");
    let scan_id = response["scan_id"].as_str().unwrap().to_owned();

    let scan = wait_terminal(&mut client, &scan_id).await;
    assert_eq!(scan["status"], "FINISHED");
    assert_eq!(scan["progress"], 100);
    assert_eq!(scan["options"]["max_hosts"], "5");
    assert_eq!(scan["options"]["safe_checks"], "1");
    assert!(scan.get("results").is_none());

    let response = ok(client
        .send(json!({"command": "get_scans", "scan_id": scan_id, "details": true}))
        .await);
    let results = response["scans"][0]["results"].as_array().unwrap();
    let oids: Vec<_> = results.iter().map(|r| r["vt_oid"].as_str().unwrap()).collect();
    assert_eq!(oids, ["1.1", "1.2"]);
    assert_eq!(results[0]["port"], "22/tcp");
    assert_eq!(results[0]["severity"], "high");

    let response = ok(client
        .send(json!({"command": "get_scans", "scan_id": scan_id, "details": true, "since_index": 1}))
        .await);
    let results = response["scans"][0]["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["vt_oid"], "1.2");

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn stop_scan_waits_for_the_scanner_and_is_idempotent() {
    let daemon = TestDaemon::start_with(|b| b.script(LONG_SCAN)).await;
    let mut client = daemon.client().await;

    let scan_id = start_scan(&mut client, &["10.0.0.1"]).await;
    wait_for_status(&mut client, &scan_id, |s| s == "RUNNING").await;

    let response = ok(client
        .send(json!({"command": "stop_scan", "scan_id": scan_id}))
        .await);
    assert_eq!(response["scan_status"], "STOPPED");

    let scan = wait_terminal(&mut client, &scan_id).await;
    assert_eq!(scan["status"], "STOPPED");
    assert_eq!(scan["error"], "scan stopped by operator request");

    let response = ok(client
        .send(json!({"command": "stop_scan", "scan_id": scan_id}))
        .await);
    assert_eq!(response["scan_status"], "STOPPED");

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn excess_scans_queue_behind_the_ceiling() {
    let daemon = TestDaemon::start_with(|b| b.script(LONG_SCAN).ceiling(1)).await;
    let mut client = daemon.client().await;

    let first = start_scan(&mut client, &["10.0.0.1"]).await;
    let response = ok(client
        .send(json!({"command": "start_scan", "targets": ["10.0.0.2"]}))
        .await);
    assert_eq!(response["scan_status"], "QUEUED");
    let second = response["scan_id"].as_str().unwrap().to_owned();

    let response = ok(client.send(json!({"command": "get_health"})).await);
    assert_eq!(response["health"]["active_scans"], 2);

    ok(client.send(json!({"command": "stop_scan", "scan_id": first})).await);
    wait_for_status(&mut client, &second, |s| s == "RUNNING").await;
    ok(client.send(json!({"command": "stop_scan", "scan_id": second})).await);

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn get_scans_without_id_lists_every_scan() {
    let daemon = TestDaemon::start().await;
    let mut client = daemon.client().await;

    let a = start_scan(&mut client, &["10.0.0.1"]).await;
    let b = start_scan(&mut client, &["10.0.0.2"]).await;
    wait_terminal(&mut client, &a).await;
    wait_terminal(&mut client, &b).await;

    let response = ok(client.send(json!({"command": "get_scans"})).await);
    let ids: Vec<_> = response["scans"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&a) && ids.contains(&b));

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn delete_scan_only_after_it_ends() {
    let daemon = TestDaemon::start_with(|b| b.script(LONG_SCAN)).await;
    let mut client = daemon.client().await;

    let scan_id = start_scan(&mut client, &["10.0.0.1"]).await;
    let response = client
        .send(json!({"command": "delete_scan", "scan_id": scan_id}))
        .await;
    fault(&response, "invalid_transition");

    ok(client.send(json!({"command": "stop_scan", "scan_id": scan_id})).await);
    let response = ok(client
        .send(json!({"command": "delete_scan", "scan_id": scan_id}))
        .await);
    assert_eq!(response["scan_id"], scan_id.as_str());

    let response = client
        .send(json!({"command": "get_scans", "scan_id": scan_id}))
        .await;
    fault(&response, "not_found");

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn failing_scanner_interrupts_the_scan() {
    let daemon = TestDaemon::start_with(|b| b.script("cat > /dev/null; exit 3")).await;
    let mut client = daemon.client().await;

    let scan_id = start_scan(&mut client, &["10.0.0.1"]).await;
    let scan = wait_terminal(&mut client, &scan_id).await;
    assert_eq!(scan["status"], "INTERRUPTED");
    assert!(scan["error"].as_str().is_some_and(|e| !e.is_empty()));

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn vts_filter_by_oid_and_family() {
    let daemon = TestDaemon::start().await;
    let mut client = daemon.client().await;

    let response = ok(client.send(json!({"command": "get_vts"})).await);
    assert_eq!(response["vts"].as_array().unwrap().len(), 2);

    let response = ok(client
        .send(json!({"command": "get_vts", "oid": "1.3.6.1.4.1.25623.1.1.2.2024.2"}))
        .await);
    let vts = response["vts"].as_array().unwrap();
    assert_eq!(vts.len(), 1);
    assert_eq!(vts[0]["name"], "DSA-2");

    let response = ok(client
        .send(json!({"command": "get_vts", "family": "Debian Local Security Checks"}))
        .await);
    assert_eq!(response["vts"].as_array().unwrap().len(), 2);

    let response = ok(client
        .send(json!({"command": "get_vts", "family": "no such family"}))
        .await);
    assert!(response["vts"].as_array().unwrap().is_empty());

    daemon.stop().await.0.unwrap();
}
