//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `ironscan_`
//! - 컴포넌트명: `store_`, `feed_`, `supervisor_`, `publisher_`, `controller_`, `socket_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 스캔 상태 레이블 키
pub const LABEL_STATUS: &str = "status";

/// 프로토콜 명령 레이블 키
pub const LABEL_COMMAND: &str = "command";

/// 결과 레이블 키 (ok, fault)
pub const LABEL_RESULT: &str = "result";

/// 리소스 종류 레이블 키 (cpu, memory)
pub const LABEL_RESOURCE: &str = "resource";

// ─── State Store 메트릭 ────────────────────────────────────────────

/// Store: 재시도 횟수 (counter)
pub const STORE_RETRIES_TOTAL: &str = "ironscan_store_retries_total";

/// Store: 재시도 소진으로 실패한 연산 수 (counter)
pub const STORE_FAILURES_TOTAL: &str = "ironscan_store_failures_total";

// ─── Feed 메트릭 ────────────────────────────────────────────────────

/// Feed: 로드된 VT 수 (gauge)
pub const FEED_VTS_LOADED: &str = "ironscan_feed_vts_loaded";

/// Feed: 무결성 검증 실패로 거부된 파일 수 (counter)
pub const FEED_FILES_REJECTED_TOTAL: &str = "ironscan_feed_files_rejected_total";

/// Feed: fail-open 정책으로 우회된 검증 수 (counter)
pub const FEED_INTEGRITY_BYPASS_TOTAL: &str = "ironscan_feed_integrity_bypass_total";

// ─── Supervisor 메트릭 ──────────────────────────────────────────────

/// Supervisor: 실행 중인 스캐너 프로세스 수 (gauge)
pub const SUPERVISOR_ACTIVE_PROCESSES: &str = "ironscan_supervisor_active_processes";

/// Supervisor: 리소스 한도 초과로 종료된 프로세스 수 (counter, label: resource)
pub const SUPERVISOR_LIMIT_KILLS_TOTAL: &str = "ironscan_supervisor_limit_kills_total";

/// Supervisor: 파싱할 수 없는 출력 줄 수 (counter)
pub const SUPERVISOR_MALFORMED_LINES_TOTAL: &str = "ironscan_supervisor_malformed_lines_total";

// ─── Publisher 메트릭 ───────────────────────────────────────────────

/// Publisher: 발행된 메시지 수 (counter)
pub const PUBLISHER_MESSAGES_TOTAL: &str = "ironscan_publisher_messages_total";

/// Publisher: 드롭된 메시지 수 (counter)
pub const PUBLISHER_DROPPED_TOTAL: &str = "ironscan_publisher_dropped_total";

// ─── Controller 메트릭 ──────────────────────────────────────────────

/// Controller: 생성된 스캔 수 (counter)
pub const CONTROLLER_SCANS_CREATED_TOTAL: &str = "ironscan_controller_scans_created_total";

/// Controller: 종료된 스캔 수 (counter, label: status)
pub const CONTROLLER_SCANS_TERMINAL_TOTAL: &str = "ironscan_controller_scans_terminal_total";

/// Controller: 대기 중인 스캔 수 (gauge)
pub const CONTROLLER_SCANS_QUEUED: &str = "ironscan_controller_scans_queued";

/// Controller: 저장된 결과 수 (counter)
pub const CONTROLLER_RESULTS_TOTAL: &str = "ironscan_controller_results_total";

/// Controller: 정체로 보고된 스캔 수 (counter)
pub const CONTROLLER_STALLED_TOTAL: &str = "ironscan_controller_stalled_total";

/// Controller: 스캔 소요 시간 (histogram, 초)
pub const CONTROLLER_SCAN_DURATION_SECONDS: &str = "ironscan_controller_scan_duration_seconds";

// ─── Socket 메트릭 ──────────────────────────────────────────────────

/// Socket: 처리된 요청 수 (counter, labels: command, result)
pub const SOCKET_REQUESTS_TOTAL: &str = "ironscan_socket_requests_total";

/// Socket: 활성 연결 수 (gauge)
pub const SOCKET_ACTIVE_CONNECTIONS: &str = "ironscan_socket_active_connections";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "ironscan_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1)
pub const DAEMON_BUILD_INFO: &str = "ironscan_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 스캔 소요 시간 히스토그램 버킷 (초)
///
/// 1s ~ 24h 범위
pub const SCAN_DURATION_BUCKETS: [f64; 9] = [
    1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 14400.0, 86400.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        STORE_RETRIES_TOTAL,
        "Total number of state store operation retries"
    );
    describe_counter!(
        STORE_FAILURES_TOTAL,
        "Total number of state store operations that exhausted their retries"
    );

    describe_gauge!(FEED_VTS_LOADED, "Number of VT descriptors currently loaded");
    describe_counter!(
        FEED_FILES_REJECTED_TOTAL,
        "Total number of feed files refused by the integrity verifier"
    );
    describe_counter!(
        FEED_INTEGRITY_BYPASS_TOTAL,
        "Total number of integrity failures bypassed under fail-open policy"
    );

    describe_gauge!(
        SUPERVISOR_ACTIVE_PROCESSES,
        "Number of scanner subprocesses currently running"
    );
    describe_counter!(
        SUPERVISOR_LIMIT_KILLS_TOTAL,
        "Scanner subprocesses terminated for exceeding a resource limit"
    );
    describe_counter!(
        SUPERVISOR_MALFORMED_LINES_TOTAL,
        "Scanner output lines that could not be parsed"
    );

    describe_counter!(
        PUBLISHER_MESSAGES_TOTAL,
        "Total number of messages published to the message bus"
    );
    describe_counter!(
        PUBLISHER_DROPPED_TOTAL,
        "Total number of messages dropped by the publisher"
    );

    describe_counter!(CONTROLLER_SCANS_CREATED_TOTAL, "Total number of scans created");
    describe_counter!(
        CONTROLLER_SCANS_TERMINAL_TOTAL,
        "Total number of scans that reached a terminal state"
    );
    describe_gauge!(CONTROLLER_SCANS_QUEUED, "Number of scans waiting for a slot");
    describe_counter!(
        CONTROLLER_RESULTS_TOTAL,
        "Total number of results persisted to the state store"
    );
    describe_counter!(
        CONTROLLER_STALLED_TOTAL,
        "Total number of scans reported as stalled"
    );
    describe_histogram!(
        CONTROLLER_SCAN_DURATION_SECONDS,
        "Wall-clock duration of completed scans in seconds"
    );

    describe_counter!(
        SOCKET_REQUESTS_TOTAL,
        "Total number of control socket requests by command and result"
    );
    describe_gauge!(
        SOCKET_ACTIVE_CONNECTIONS,
        "Number of open control socket connections"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "Ironscan daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
