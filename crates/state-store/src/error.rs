//! 상태 저장소 에러 타입
//!
//! [`StoreError`]는 `From<StoreError> for IronscanError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use ironscan_core::error::{IronscanError, ScanError, StorageError};
use ironscan_core::types::{ScanId, ScanStatus};

/// 상태 저장소 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 저장소에 접근할 수 없음 (연결 끊김, 타임아웃, 재시도 소진)
    ///
    /// 요청이 이미 적용되었을 수 있습니다.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// 연결이 거부되어 요청이 저장소에 전달되지 않음
    #[error("store refused connection: {0}")]
    Refused(String),

    /// 스캔이 존재하지 않음
    #[error("scan not found: {0}")]
    NotFound(ScanId),

    /// 이미 사용 중인 스캔 ID
    #[error("scan id already exists: {0}")]
    IdCollision(ScanId),

    /// 현재 상태에서 허용되지 않는 전이
    #[error("invalid transition for scan {id}: {from} -> {to}")]
    InvalidTransition {
        /// 스캔 ID
        id: ScanId,
        /// 저장된 현재 상태
        from: ScanStatus,
        /// 요청된 상태
        to: ScanStatus,
    },

    /// 저장된 레코드를 해석할 수 없음
    #[error("corrupt record for scan {id}: field '{field}': {reason}")]
    Corrupt {
        /// 스캔 ID
        id: ScanId,
        /// 필드명
        field: String,
        /// 사유
        reason: String,
    },

    /// 재시도해도 성공할 수 없는 백엔드 에러
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// 재시도로 회복 가능한 일시적 에러인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Refused(_))
    }

    /// 요청이 저장소에 적용되지 않았음이 확실한지 확인합니다.
    ///
    /// 멱등이 아닌 연산은 이 경우에만 재시도할 수 있습니다.
    pub fn is_unsent(&self) -> bool {
        matches!(self, Self::Refused(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() {
            Self::Refused(err.to_string())
        } else if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}

impl From<StoreError> for IronscanError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) | StoreError::Refused(msg) => {
                IronscanError::Storage(StorageError::Unavailable(msg))
            }
            StoreError::NotFound(id) => IronscanError::Scan(ScanError::NotFound(id.to_string())),
            StoreError::InvalidTransition { from, to, .. } => {
                IronscanError::Scan(ScanError::InvalidTransition { from, to })
            }
            other @ (StoreError::IdCollision(_)
            | StoreError::Corrupt { .. }
            | StoreError::Backend(_)) => {
                IronscanError::Storage(StorageError::Corrupt(other.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_transient() {
        assert!(StoreError::Unavailable("down".into()).is_transient());
        assert!(StoreError::Refused("refused".into()).is_transient());
        assert!(!StoreError::NotFound(ScanId::new()).is_transient());
        assert!(!StoreError::Backend("WRONGTYPE".into()).is_transient());
    }

    #[test]
    fn only_refused_is_known_unsent() {
        assert!(StoreError::Refused("refused".into()).is_unsent());
        assert!(!StoreError::Unavailable("timed out".into()).is_unsent());
        assert!(!StoreError::Backend("WRONGTYPE".into()).is_unsent());
    }

    #[test]
    fn not_found_converts_to_scan_error() {
        let id = ScanId::new();
        let err: IronscanError = StoreError::NotFound(id).into();
        assert!(matches!(err, IronscanError::Scan(ScanError::NotFound(_))));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn invalid_transition_display() {
        let err = StoreError::InvalidTransition {
            id: ScanId::new(),
            from: ScanStatus::Finished,
            to: ScanStatus::Running,
        };
        assert!(err.to_string().contains("FINISHED -> RUNNING"));
    }
}
