//! 에러 타입 — 도메인별 에러 정의
//!
//! 각 크레이트는 자체 세부 에러 타입을 가지며,
//! `From` 구현을 통해 [`IronscanError`]로 전파됩니다.

use crate::types::ScanStatus;

/// Ironscan 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum IronscanError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 상태 저장소 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 피드 무결성 에러
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// 스캐너 프로세스 에러
    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    /// 스캔 요청/상태 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// 제어 소켓 프로토콜 에러
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("not running")]
    NotRunning,

    /// 초기화 실패
    #[error("init failed: {0}")]
    InitFailed(String),

    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),
}

/// 상태 저장소 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 저장소에 접근할 수 없음 (재시도 소진 포함)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// 저장된 데이터가 손상됨
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// 피드 무결성 에러
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// 신뢰할 수 없는 콘텐츠
    #[error("untrusted content: {0}")]
    Untrusted(String),

    /// 피드 로딩 실패
    #[error("feed error: {0}")]
    Feed(String),
}

/// 스캐너 프로세스 에러
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// 프로세스 생성 실패
    #[error("spawn failed: {0}")]
    Spawn(String),

    /// 시그널 전송 실패
    #[error("signal failed: {0}")]
    Signal(String),

    /// 리소스 한도 초과
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    /// 비정상 종료
    #[error("process failed: {0}")]
    Failed(String),
}

/// 스캔 요청/상태 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 잘못된 대상 또는 옵션
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// 존재하지 않는 스캔
    #[error("scan not found: {0}")]
    NotFound(String),

    /// 허용되지 않는 상태 전이
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: ScanStatus, to: ScanStatus },

    /// 동시 실행 한도에 도달할 수 없음
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

/// 제어 소켓 프로토콜 에러
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 파싱할 수 없는 요청
    #[error("malformed request: {0}")]
    Malformed(String),

    /// 요청 크기 초과
    #[error("request too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: IronscanError = ConfigError::InvalidValue {
            field: "supervisor.max_concurrent_scans".to_owned(),
            reason: "must be greater than 0".to_owned(),
        }
        .into();
        assert!(err.to_string().contains("max_concurrent_scans"));
        assert!(matches!(err, IronscanError::Config(_)));
    }

    #[test]
    fn invalid_transition_display_names_both_states() {
        let err = ScanError::InvalidTransition {
            from: ScanStatus::Finished,
            to: ScanStatus::Running,
        };
        let msg = err.to_string();
        assert!(msg.contains("FINISHED"));
        assert!(msg.contains("RUNNING"));
    }

    #[test]
    fn storage_error_display() {
        let err = StorageError::Unavailable("connection refused".to_owned());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: IronscanError = io.into();
        assert!(matches!(err, IronscanError::Io(_)));
    }
}
