//! ironscan.toml 통합 설정 테스트
//!
//! - ironscan.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use ironscan_core::config::IronscanConfig;
use ironscan_core::error::{ConfigError, IronscanError};

const EXAMPLE: &str = include_str!("../../../ironscan.toml.example");

// =============================================================================
// ironscan.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let config = IronscanConfig::parse(EXAMPLE).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.socket.path, "/run/ironscan/ironscan.sock");
}

#[test]
fn example_config_matches_code_defaults() {
    let example = IronscanConfig::parse(EXAMPLE).expect("should parse");
    let defaults = IronscanConfig::default();

    assert_eq!(example.general.log_file, defaults.general.log_file);
    assert_eq!(example.general.pid_file, defaults.general.pid_file);
    assert_eq!(example.socket.max_connections, defaults.socket.max_connections);
    assert_eq!(
        example.socket.request_timeout_secs,
        defaults.socket.request_timeout_secs
    );
    assert_eq!(example.store.backend, defaults.store.backend);
    assert_eq!(example.store.redis_url, defaults.store.redis_url);
    assert_eq!(example.store.max_retries, defaults.store.max_retries);
    assert_eq!(example.store.backoff_base_ms, defaults.store.backoff_base_ms);
    assert_eq!(example.feed.feed_dir, defaults.feed.feed_dir);
    assert_eq!(example.feed.trust_keys_dir, defaults.feed.trust_keys_dir);
    assert_eq!(
        example.feed.disable_integrity_check,
        defaults.feed.disable_integrity_check
    );
    assert_eq!(
        example.supervisor.max_concurrent_scans,
        defaults.supervisor.max_concurrent_scans
    );
    assert_eq!(
        example.supervisor.scanner_binary,
        defaults.supervisor.scanner_binary
    );
    assert_eq!(
        example.supervisor.stop_grace_secs,
        defaults.supervisor.stop_grace_secs
    );
    assert_eq!(
        example.supervisor.cpu_violation_samples,
        defaults.supervisor.cpu_violation_samples
    );
    assert_eq!(example.publisher.enabled, defaults.publisher.enabled);
    assert_eq!(example.publisher.topic_prefix, defaults.publisher.topic_prefix);
    assert_eq!(
        example.publisher.batch_window_ms,
        defaults.publisher.batch_window_ms
    );
    assert_eq!(
        example.controller.stall_window_secs,
        defaults.controller.stall_window_secs
    );
    assert_eq!(example.metrics.port, defaults.metrics.port);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_socket_only() {
    let toml = r#"
[socket]
path = "/tmp/ironscan-test.sock"
"#;
    let config = IronscanConfig::parse(toml).expect("should parse");
    assert_eq!(config.socket.path, "/tmp/ironscan-test.sock");
    assert_eq!(config.socket.max_connections, 64);
    assert_eq!(config.supervisor.max_concurrent_scans, 4);
}

#[test]
fn partial_config_two_sections() {
    let toml = r#"
[store]
backend = "memory"
required = false

[publisher]
enabled = true
topic_prefix = "osp"
"#;
    let config = IronscanConfig::parse(toml).expect("should parse");
    assert_eq!(config.store.backend, "memory");
    assert!(!config.store.required);
    assert!(config.publisher.enabled);
    assert_eq!(config.publisher.topic_prefix, "osp");
    assert_eq!(config.publisher.batch_window_ms, 250);
    config.validate().expect("should validate");
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

fn with_env<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
    let original = std::env::var(key).ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe { std::env::set_var(key, value) };
    let out = f();
    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }
    out
}

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[supervisor]
max_concurrent_scans = 8
"#;
    let result = with_env("IRONSCAN_SUPERVISOR_MAX_CONCURRENT_SCANS", "2", || {
        let mut config = IronscanConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.supervisor.max_concurrent_scans
    });
    assert_eq!(result, 2);
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let result = with_env("IRONSCAN_FEED_DISABLE_INTEGRITY_CHECK", "true", || {
        let mut config = IronscanConfig::default();
        config.apply_env_overrides();
        config.feed.disable_integrity_check
    });
    assert!(result);
}

#[test]
#[serial_test::serial]
fn env_override_csv_for_scanner_args() {
    let result = with_env("IRONSCAN_SUPERVISOR_SCANNER_ARGS", "--a,--b", || {
        let mut config = IronscanConfig::default();
        config.apply_env_overrides();
        config.supervisor.scanner_args
    });
    assert_eq!(result, vec!["--a", "--b"]);
}

#[test]
#[serial_test::serial]
fn env_override_unparsable_value_keeps_toml_value() {
    let toml = r#"
[store]
max_retries = 9
"#;
    let result = with_env("IRONSCAN_STORE_MAX_RETRIES", "many", || {
        let mut config = IronscanConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.store.max_retries
    });
    assert_eq!(result, 9);
}

// =============================================================================
// 에러 케이스
// =============================================================================

#[test]
fn comments_only_parses_with_defaults() {
    let config = IronscanConfig::parse("# nothing here\n").expect("should parse");
    assert_eq!(config.general.log_format, "json");
}

#[test]
fn wrong_type_for_numeric_field() {
    let toml = r#"
[supervisor]
max_concurrent_scans = "four"
"#;
    let err = IronscanConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        IronscanError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn unknown_section_is_ignored() {
    let toml = r#"
[unknown]
foo = "bar"
"#;
    IronscanConfig::parse(toml).expect("unknown sections should be ignored");
}

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let result = IronscanConfig::from_file("/tmp/ironscan_test_nonexistent_12345.toml").await;
    assert!(matches!(
        result.unwrap_err(),
        IronscanError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
async fn from_file_rejects_invalid_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ironscan.toml");
    tokio::fs::write(&path, "[socket]\nmax_connections = 0\n")
        .await
        .expect("write");

    let err = IronscanConfig::from_file(&path).await.unwrap_err();
    assert!(err.to_string().contains("socket.max_connections"));
}

#[test]
fn example_config_serialize_roundtrip() {
    let config = IronscanConfig::parse(EXAMPLE).expect("should parse");
    let serialized = toml::to_string_pretty(&config).expect("should serialize");
    let reparsed = IronscanConfig::parse(&serialized).expect("should reparse");
    assert_eq!(config.feed.feed_dir, reparsed.feed.feed_dir);
    assert_eq!(
        config.supervisor.max_cpu_percent,
        reparsed.supervisor.max_cpu_percent
    );
}
