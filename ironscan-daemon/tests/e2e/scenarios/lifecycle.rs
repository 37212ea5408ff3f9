//! Startup, introspection and PID file handling.

use serde_json::json;

use ironscan_daemon::orchestrator::Orchestrator;

use crate::helpers::client::ok;
use crate::helpers::config::TestConfigBuilder;
use crate::helpers::daemon::TestDaemon;

#[tokio::test]
async fn scanner_details_describe_feed_and_ceiling() {
    let daemon = TestDaemon::start_with(|b| b.ceiling(3)).await;
    let mut client = daemon.client().await;

    let response = ok(client.send(json!({"command": "get_scanner_details"})).await);
    let scanner = &response["scanner"];
    assert_eq!(scanner["name"], "ironscan");
    assert_eq!(scanner["max_concurrent_scans"], 3);
    assert_eq!(scanner["running_scans"], 0);
    assert_eq!(scanner["feed"]["state"], "bypassed");
    assert_eq!(scanner["feed"]["vts"], 2);
    assert!(
        scanner["params"]
            .as_array()
            .is_some_and(|params| !params.is_empty())
    );

    let (result, _, _) = daemon.stop().await;
    result.unwrap();
}

#[tokio::test]
async fn health_reports_components() {
    let daemon = TestDaemon::start().await;
    let mut client = daemon.client().await;

    let response = ok(client.send(json!({"command": "get_health"})).await);
    let health = &response["health"];
    assert_eq!(health["status"]["state"], "healthy");
    assert_eq!(health["active_scans"], 0);

    let components = health["components"].as_array().unwrap();
    let publisher = components
        .iter()
        .find(|c| c["name"] == "publisher")
        .unwrap();
    assert_eq!(publisher["enabled"], false);
    assert!(components.iter().any(|c| c["name"] == "controller"));

    daemon.stop().await.0.unwrap();
}

#[tokio::test]
async fn socket_file_is_removed_on_shutdown() {
    let daemon = TestDaemon::start().await;
    let socket = daemon.socket.clone();
    assert!(socket.exists());

    daemon.stop().await.0.unwrap();
    assert!(!socket.exists());
}

#[tokio::test]
async fn pid_file_lives_as_long_as_the_daemon() {
    let daemon = TestDaemon::start_with(|b| b.with_pid_file()).await;
    let pid_path = std::path::PathBuf::from(&daemon.config.general.pid_file);

    // run_until writes the PID file before serving
    let mut client = daemon.client().await;
    ok(client.send(json!({"command": "get_health"})).await);
    let content = std::fs::read_to_string(&pid_path).unwrap();
    assert_eq!(content.trim(), std::process::id().to_string());

    daemon.stop().await.0.unwrap();
    assert!(!pid_path.exists());
}

#[tokio::test]
async fn existing_pid_file_stops_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(dir.path()).with_pid_file().build();
    let pid_path = std::path::PathBuf::from(&config.general.pid_file);
    std::fs::create_dir_all(pid_path.parent().unwrap()).unwrap();
    std::fs::write(&pid_path, "4242\n").unwrap();

    let orchestrator = Orchestrator::build_from_config(config).await.unwrap();
    let err = orchestrator
        .run_until(std::future::pending())
        .await
        .unwrap_err()
        .to_string();
    assert!(err.contains("already exists"), "{err}");
    assert_eq!(std::fs::read_to_string(&pid_path).unwrap(), "4242\n");
}

#[tokio::test]
async fn invalid_config_is_rejected_before_binding() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = TestConfigBuilder::new(dir.path()).build();
    config.supervisor.max_concurrent_scans = 0;
    let socket = std::path::PathBuf::from(&config.socket.path);

    assert!(Orchestrator::build_from_config(config).await.is_err());
    assert!(!socket.exists());
}

#[tokio::test]
async fn unbindable_socket_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = TestConfigBuilder::new(dir.path()).build();
    let blocker = dir.path().join("not-a-socket");
    std::fs::write(&blocker, "occupied").unwrap();
    config.socket.path = blocker.display().to_string();

    assert!(Orchestrator::build_from_config(config).await.is_err());
    assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "occupied");
}
