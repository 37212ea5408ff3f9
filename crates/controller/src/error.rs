//! 컨트롤러 에러 타입
//!
//! 클라이언트에게 보이는 에러 분류입니다. 각 변형은 제어 소켓의 fault 코드 하나에 대응합니다.

use ironscan_core::error::{IntegrityError, IronscanError, ProcessError, ScanError, StorageError};
use ironscan_core::types::{ScanId, ScanStatus};
use ironscan_store::StoreError;
use ironscan_supervisor::SupervisorError;

/// 스캔 컨트롤러 에러
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControllerError {
    /// 대상 또는 옵션 형식 오류 (상태 변경 없음)
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// 존재하지 않는 스캔
    #[error("scan not found: {0}")]
    ScanNotFound(ScanId),

    /// 현재 상태에서 허용되지 않는 요청
    #[error("scan {id} is {from}, cannot move to {to}")]
    InvalidTransition {
        /// 스캔 ID
        id: ScanId,
        /// 현재 상태
        from: ScanStatus,
        /// 요청된 상태
        to: ScanStatus,
    },

    /// 아직 종료되지 않은 스캔에 대한 정리 요청
    #[error("scan {id} is still {status}")]
    ScanActive {
        /// 스캔 ID
        id: ScanId,
        /// 현재 상태
        status: ScanStatus,
    },

    /// 실행 슬롯을 얻을 수 없음
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// 재시도 후에도 상태 저장소에 접근할 수 없음
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// VT 피드를 신뢰할 수 없음
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    /// 리소스 한도 초과로 스캐너 종료
    #[error("{0}")]
    ResourceLimitExceeded(String),

    /// 스캐너 실행 또는 종료 확인 실패
    #[error("process failure: {0}")]
    ProcessFailure(String),

    /// 내부 오류
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ControllerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) | StoreError::Refused(reason) => {
                Self::StoreUnavailable(reason)
            }
            StoreError::NotFound(id) => Self::ScanNotFound(id),
            StoreError::InvalidTransition { id, from, to } => Self::InvalidTransition { id, from, to },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<SupervisorError> for ControllerError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::CeilingUnreachable(_) => Self::ResourceExhausted(err.to_string()),
            other => Self::ProcessFailure(other.to_string()),
        }
    }
}

impl From<ControllerError> for IronscanError {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::InvalidOptions(reason) => ScanError::InvalidOptions(reason).into(),
            ControllerError::ScanNotFound(id) => ScanError::NotFound(id.to_string()).into(),
            ControllerError::InvalidTransition { from, to, .. } => {
                ScanError::InvalidTransition { from, to }.into()
            }
            ControllerError::ScanActive { status, .. } => ScanError::InvalidTransition {
                from: status,
                to: status,
            }
            .into(),
            ControllerError::ResourceExhausted(reason) => {
                ScanError::ResourceExhausted(reason).into()
            }
            ControllerError::StoreUnavailable(reason) => StorageError::Unavailable(reason).into(),
            ControllerError::IntegrityFailure(reason) => IntegrityError::Untrusted(reason).into(),
            ControllerError::ResourceLimitExceeded(reason) => {
                ProcessError::ResourceLimit(reason).into()
            }
            ControllerError::ProcessFailure(reason) | ControllerError::Internal(reason) => {
                ProcessError::Failed(reason).into()
            }
        }
    }
}
