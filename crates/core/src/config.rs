//! 설정 관리 — ironscan.toml 파싱 및 런타임 설정
//!
//! [`IronscanConfig`]는 데몬의 모든 컴포넌트 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`IRONSCAN_SUPERVISOR_MAX_CONCURRENT_SCANS=4` 형식)
//! 3. 설정 파일 (`ironscan.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), ironscan_core::error::IronscanError> {
//! use ironscan_core::config::IronscanConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = IronscanConfig::load("ironscan.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = IronscanConfig::parse("[supervisor]\nmax_concurrent_scans = 2")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, IronscanError};

/// Ironscan 통합 설정
///
/// `ironscan.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 컴포넌트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IronscanConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 제어 소켓 설정
    #[serde(default)]
    pub socket: SocketConfig,
    /// 상태 저장소 설정
    #[serde(default)]
    pub store: StoreConfig,
    /// VT 피드 설정
    #[serde(default)]
    pub feed: FeedConfig,
    /// 프로세스 감독자 설정
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    /// 결과 발행자 설정
    #[serde(default)]
    pub publisher: PublisherConfig,
    /// 스캔 컨트롤러 설정
    #[serde(default)]
    pub controller: ControllerConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl IronscanConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, IronscanError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, IronscanError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IronscanError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                IronscanError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, IronscanError> {
        toml::from_str(toml_str).map_err(|e| {
            IronscanError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `IRONSCAN_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "IRONSCAN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "IRONSCAN_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.log_file, "IRONSCAN_GENERAL_LOG_FILE");
        override_string(&mut self.general.pid_file, "IRONSCAN_GENERAL_PID_FILE");

        // Socket
        override_string(&mut self.socket.path, "IRONSCAN_SOCKET_PATH");
        override_usize(
            &mut self.socket.max_connections,
            "IRONSCAN_SOCKET_MAX_CONNECTIONS",
        );
        override_u64(
            &mut self.socket.request_timeout_secs,
            "IRONSCAN_SOCKET_REQUEST_TIMEOUT_SECS",
        );

        // Store
        override_string(&mut self.store.backend, "IRONSCAN_STORE_BACKEND");
        override_string(&mut self.store.redis_url, "IRONSCAN_STORE_REDIS_URL");
        override_bool(&mut self.store.required, "IRONSCAN_STORE_REQUIRED");
        override_u32(&mut self.store.max_retries, "IRONSCAN_STORE_MAX_RETRIES");
        override_u64(
            &mut self.store.backoff_base_ms,
            "IRONSCAN_STORE_BACKOFF_BASE_MS",
        );

        // Feed
        override_string(&mut self.feed.feed_dir, "IRONSCAN_FEED_FEED_DIR");
        override_string(&mut self.feed.trust_keys_dir, "IRONSCAN_FEED_TRUST_KEYS_DIR");
        override_bool(
            &mut self.feed.disable_integrity_check,
            "IRONSCAN_FEED_DISABLE_INTEGRITY_CHECK",
        );

        // Supervisor
        override_usize(
            &mut self.supervisor.max_concurrent_scans,
            "IRONSCAN_SUPERVISOR_MAX_CONCURRENT_SCANS",
        );
        override_string(
            &mut self.supervisor.scanner_binary,
            "IRONSCAN_SUPERVISOR_SCANNER_BINARY",
        );
        override_csv(
            &mut self.supervisor.scanner_args,
            "IRONSCAN_SUPERVISOR_SCANNER_ARGS",
        );
        override_u64(
            &mut self.supervisor.stop_grace_secs,
            "IRONSCAN_SUPERVISOR_STOP_GRACE_SECS",
        );
        override_u64(
            &mut self.supervisor.monitor_interval_ms,
            "IRONSCAN_SUPERVISOR_MONITOR_INTERVAL_MS",
        );
        override_u64(
            &mut self.supervisor.max_memory_mb,
            "IRONSCAN_SUPERVISOR_MAX_MEMORY_MB",
        );
        override_f32(
            &mut self.supervisor.max_cpu_percent,
            "IRONSCAN_SUPERVISOR_MAX_CPU_PERCENT",
        );
        override_u32(
            &mut self.supervisor.cpu_violation_samples,
            "IRONSCAN_SUPERVISOR_CPU_VIOLATION_SAMPLES",
        );

        // Publisher
        override_bool(&mut self.publisher.enabled, "IRONSCAN_PUBLISHER_ENABLED");
        override_string(&mut self.publisher.redis_url, "IRONSCAN_PUBLISHER_REDIS_URL");
        override_string(
            &mut self.publisher.topic_prefix,
            "IRONSCAN_PUBLISHER_TOPIC_PREFIX",
        );
        override_u64(
            &mut self.publisher.batch_window_ms,
            "IRONSCAN_PUBLISHER_BATCH_WINDOW_MS",
        );
        override_usize(
            &mut self.publisher.queue_capacity,
            "IRONSCAN_PUBLISHER_QUEUE_CAPACITY",
        );

        // Controller
        override_u64(
            &mut self.controller.stall_window_secs,
            "IRONSCAN_CONTROLLER_STALL_WINDOW_SECS",
        );
        override_u64(
            &mut self.controller.stop_timeout_secs,
            "IRONSCAN_CONTROLLER_STOP_TIMEOUT_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "IRONSCAN_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "IRONSCAN_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "IRONSCAN_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IronscanError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.socket.path.is_empty() {
            return Err(invalid("socket.path", "must not be empty".to_owned()));
        }
        if self.socket.max_connections == 0 {
            return Err(invalid(
                "socket.max_connections",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.socket.request_timeout_secs == 0 {
            return Err(invalid(
                "socket.request_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        let valid_backends = ["redis", "memory"];
        if !valid_backends.contains(&self.store.backend.as_str()) {
            return Err(invalid(
                "store.backend",
                format!("must be one of: {}", valid_backends.join(", ")),
            ));
        }
        if self.store.backend == "redis" && self.store.redis_url.is_empty() {
            return Err(invalid(
                "store.redis_url",
                "must not be empty when backend is redis".to_owned(),
            ));
        }

        // 0은 허용하지 않음: 모든 스캔이 영원히 QUEUED 상태로 남음
        if self.supervisor.max_concurrent_scans == 0 {
            return Err(invalid(
                "supervisor.max_concurrent_scans",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.supervisor.scanner_binary.is_empty() {
            return Err(invalid(
                "supervisor.scanner_binary",
                "must not be empty".to_owned(),
            ));
        }
        if self.supervisor.monitor_interval_ms == 0 {
            return Err(invalid(
                "supervisor.monitor_interval_ms",
                "must be greater than 0".to_owned(),
            ));
        }
        let cpu = self.supervisor.max_cpu_percent;
        if cpu.is_nan() || cpu <= 0.0 {
            return Err(invalid(
                "supervisor.max_cpu_percent",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.supervisor.cpu_violation_samples == 0 {
            return Err(invalid(
                "supervisor.cpu_violation_samples",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.publisher.enabled {
            if self.publisher.redis_url.is_empty() {
                return Err(invalid(
                    "publisher.redis_url",
                    "must not be empty when publisher is enabled".to_owned(),
                ));
            }
            if self.publisher.queue_capacity == 0 {
                return Err(invalid(
                    "publisher.queue_capacity",
                    "must be greater than 0".to_owned(),
                ));
            }
        }

        if self.controller.stall_window_secs == 0 {
            return Err(invalid(
                "controller.stall_window_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        // stop_scan은 유예 시간과 종료 대기 시간을 모두 쓸 수 있어야 합니다.
        let stop_budget = self
            .supervisor
            .stop_grace_secs
            .saturating_add(self.controller.stop_timeout_secs);
        if self.socket.request_timeout_secs <= stop_budget {
            return Err(invalid(
                "socket.request_timeout_secs",
                format!(
                    "must exceed supervisor.stop_grace_secs + controller.stop_timeout_secs ({stop_budget})"
                ),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> IronscanError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 로그 파일 경로 (빈 문자열이면 stdout)
    pub log_file: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            log_file: String::new(),
            pid_file: "/run/ironscan/ironscan.pid".to_owned(),
        }
    }
}

/// 제어 소켓 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Unix 도메인 소켓 경로
    pub path: String,
    /// 최대 동시 연결 수
    pub max_connections: usize,
    /// 요청당 응답 제한 시간 (초)
    pub request_timeout_secs: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            path: "/run/ironscan/ironscan.sock".to_owned(),
            max_connections: 64,
            request_timeout_secs: 30,
        }
    }
}

/// 상태 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 백엔드 (redis, memory)
    pub backend: String,
    /// Redis 연결 문자열
    pub redis_url: String,
    /// 시작 시 저장소 연결 실패를 치명적 오류로 처리할지 여부
    pub required: bool,
    /// 연산당 최대 재시도 횟수
    pub max_retries: u32,
    /// 재시도 백오프 기본 간격 (밀리초, 선형 증가)
    pub backoff_base_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "redis".to_owned(),
            redis_url: "redis://127.0.0.1:6379".to_owned(),
            required: true,
            max_retries: 3,
            backoff_base_ms: 200,
        }
    }
}

/// VT 피드 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// 어드바이저리 피드 디렉토리
    pub feed_dir: String,
    /// 신뢰 키(`*.pub`) 디렉토리
    pub trust_keys_dir: String,
    /// 무결성 검증 비활성화 (fail-open)
    pub disable_integrity_check: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            feed_dir: "/var/lib/notus/advisories".to_owned(),
            trust_keys_dir: "/etc/ironscan/trusted-keys".to_owned(),
            disable_integrity_check: false,
        }
    }
}

/// 프로세스 감독자 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// 동시 실행 스캔 상한
    pub max_concurrent_scans: usize,
    /// 스캐너 실행 파일
    pub scanner_binary: String,
    /// 스캐너 인자
    pub scanner_args: Vec<String>,
    /// SIGTERM 후 SIGKILL까지 대기 시간 (초)
    pub stop_grace_secs: u64,
    /// 리소스 샘플링 주기 (밀리초)
    pub monitor_interval_ms: u64,
    /// 최대 상주 메모리 (MB, 0이면 제한 없음)
    pub max_memory_mb: u64,
    /// 최대 CPU 사용률 (%)
    pub max_cpu_percent: f32,
    /// CPU 한도 초과 연속 샘플 수
    pub cpu_violation_samples: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scans: 4,
            scanner_binary: "/usr/bin/ironscan-engine".to_owned(),
            scanner_args: Vec::new(),
            stop_grace_secs: 10,
            monitor_interval_ms: 2_000,
            max_memory_mb: 0,
            max_cpu_percent: 400.0,
            cpu_violation_samples: 5,
        }
    }
}

/// 결과 발행자 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 메시지 버스 (Redis pub/sub) 연결 문자열
    pub redis_url: String,
    /// 토픽 접두사
    pub topic_prefix: String,
    /// 스캔별 결과 배치 창 (밀리초)
    pub batch_window_ms: u64,
    /// 발행 큐 용량 (가득 차면 드롭)
    pub queue_capacity: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            redis_url: "redis://127.0.0.1:6379".to_owned(),
            topic_prefix: "scanner".to_owned(),
            batch_window_ms: 250,
            queue_capacity: 4_096,
        }
    }
}

/// 스캔 컨트롤러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// 진행 보고가 없으면 stalled로 표시하는 시간 (초)
    pub stall_window_secs: u64,
    /// stop_scan이 종료 확인을 기다리는 최대 시간 (초, grace 기간에 더해짐)
    pub stop_timeout_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            stall_window_secs: 600,
            stop_timeout_secs: 5,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_f32(target: &mut f32, env_key: &str) {
    override_parsed(target, env_key, "f32");
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
