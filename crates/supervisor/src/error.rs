//! 감독자 에러 타입

use ironscan_core::error::{IronscanError, ProcessError, ScanError};

/// 프로세스 감독 에러
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// 스캐너 실행 실패
    #[error("failed to spawn scanner: {0}")]
    Spawn(String),

    /// 시그널 전송 실패
    #[error("failed to signal scanner process group {pgid}: {reason}")]
    Signal {
        /// 프로세스 그룹 ID
        pgid: i32,
        /// 사유
        reason: String,
    },

    /// 종료 대기 실패
    #[error("failed to wait for scanner: {0}")]
    Wait(String),

    /// 동시 실행 상한이 0이라 슬롯을 얻을 수 없음
    #[error("concurrency ceiling is {0}, no scan can ever be admitted")]
    CeilingUnreachable(usize),

    /// 감독 태스크가 이미 종료됨
    #[error("supervisor for scan is gone")]
    Gone,
}

impl From<SupervisorError> for IronscanError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::CeilingUnreachable(_) => {
                IronscanError::Scan(ScanError::ResourceExhausted(err.to_string()))
            }
            SupervisorError::Spawn(reason) => IronscanError::Process(ProcessError::Spawn(reason)),
            SupervisorError::Signal { .. } => {
                IronscanError::Process(ProcessError::Signal(err.to_string()))
            }
            SupervisorError::Wait(_) | SupervisorError::Gone => {
                IronscanError::Process(ProcessError::Failed(err.to_string()))
            }
        }
    }
}
