//! Malformed input, invalid requests and resource limits.

use serde_json::json;

use crate::helpers::client::{Client, fault, ok};
use crate::helpers::daemon::{TestDaemon, wait_terminal};

#[tokio::test]
async fn malformed_lines_get_a_fault_and_the_connection_survives() {
    let daemon = TestDaemon::start().await;
    let mut client = daemon.client().await;

    fault(&client.raw("this is not json").await, "bad_request");
    fault(&client.raw(r#"{"command":"format_disk"}"#).await, "bad_request");
    fault(&client.raw(r#"{"command":"stop_scan"}"#).await, "bad_request");

    ok(client.send(json!({"command": "get_health"})).await);

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn non_utf8_request_gets_a_fault_and_the_connection_survives() {
    let daemon = TestDaemon::start().await;
    let mut client = daemon.client().await;

    fault(&client.raw_bytes(b"{\"command\":\"get_scans\xff\"}").await, "bad_request");
    fault(&client.raw_bytes(b"\xfe\xff").await, "bad_request");

    ok(client.send(json!({"command": "get_health"})).await);

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn invalid_targets_and_options_store_nothing() {
    let daemon = TestDaemon::start().await;
    let mut client = daemon.client().await;

    let response = client
        .send(json!({"command": "start_scan", "targets": []}))
        .await;
    fault(&response, "invalid_options");

    let response = client
        .send(json!({"command": "start_scan", "targets": ["10.0.0.1"], "options": {"max_hosts": "many"}}))
        .await;
    fault(&response, "invalid_options");

    let response = client
        .send(json!({"command": "start_scan", "targets": ["10.0.0.1"], "options": {"no_such_option": "1"}}))
        .await;
    fault(&response, "invalid_options");

    let response = client
        .send(json!({"command": "start_scan", "targets": ["10.0.0.1"], "options": {"port_range": ["1-10"]}}))
        .await;
    fault(&response, "invalid_options");

    let response = ok(client.send(json!({"command": "get_scans"})).await);
    assert!(response["scans"].as_array().unwrap().is_empty());

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn unknown_scan_ids_are_not_found() {
    let daemon = TestDaemon::start().await;
    let mut client = daemon.client().await;
    let unknown = "7f1c2a3e-0000-4000-8000-000000000000";

    for command in ["get_scans", "stop_scan", "delete_scan"] {
        let response = client
            .send(json!({"command": command, "scan_id": unknown}))
            .await;
        fault(&response, "not_found");
    }

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn refused_feed_blocks_scans_but_not_startup() {
    let daemon = TestDaemon::start_with(|b| b.integrity_check(true)).await;
    let mut client = daemon.client().await;

    let response = ok(client.send(json!({"command": "get_scanner_details"})).await);
    assert_eq!(response["scanner"]["feed"]["state"], "refused");

    let response = client
        .send(json!({"command": "start_scan", "targets": ["10.0.0.1"]}))
        .await;
    fault(&response, "integrity_failure");

    fault(&client.send(json!({"command": "get_vts"})).await, "integrity_failure");

    let response = ok(client.send(json!({"command": "get_scans"})).await);
    assert!(response["scans"].as_array().unwrap().is_empty());

    let response = ok(client.send(json!({"command": "get_health"})).await);
    assert_eq!(response["health"]["status"]["state"], "degraded");

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn missing_scanner_binary_interrupts_the_scan() {
    let daemon = TestDaemon::start_with(|b| b.scanner_binary("/nonexistent/ironscan-scanner")).await;
    let mut client = daemon.client().await;

    let response = ok(client
        .send(json!({"command": "start_scan", "targets": ["10.0.0.1"]}))
        .await);
    let scan_id = response["scan_id"].as_str().unwrap().to_owned();

    let scan = wait_terminal(&mut client, &scan_id).await;
    assert_eq!(scan["status"], "INTERRUPTED");
    assert!(
        scan["error"]
            .as_str()
            .is_some_and(|e| e.contains("failed to start scanner"))
    );

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn oversized_request_is_rejected_and_closed() {
    let daemon = TestDaemon::start().await;
    let mut client = daemon.client().await;

    let padding = "x".repeat(1024 * 1024 + 16);
    let line = format!(r#"{{"command":"get_health","padding":"{padding}"}}"#);
    fault(&client.raw(&line).await, "bad_request");
    assert!(client.read().await.is_null());

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn connections_beyond_the_limit_are_turned_away() {
    let daemon = TestDaemon::start_with(|b| b.max_connections(1)).await;

    let mut first = daemon.client().await;
    ok(first.send(json!({"command": "get_health"})).await);

    let mut second = Client::connect(&daemon.socket).await;
    let response = second.read().await;
    fault(&response, "resource_exhausted");

    drop(first);
    let mut third = None;
    for _ in 0..50 {
        let mut client = Client::connect(&daemon.socket).await;
        let response = client.send(json!({"command": "get_health"})).await;
        if response["status"] == "ok" {
            third = Some(client);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(third.is_some(), "slot is released when a connection closes");

    daemon.stop().await.0.unwrap();
}
