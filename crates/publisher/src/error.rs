//! 발행자 에러 타입

use ironscan_core::error::{IronscanError, PipelineError};

/// 결과 발행 에러
#[derive(Debug, thiserror::Error)]
pub enum PublisherError {
    /// 브로커 연결 실패
    #[error("message bus unavailable: {0}")]
    Unavailable(String),

    /// 발행 실패
    #[error("publish to {topic} failed: {reason}")]
    Publish {
        /// 토픽
        topic: String,
        /// 사유
        reason: String,
    },

    /// 직렬화 실패
    #[error("failed to serialize event: {0}")]
    Serialize(String),
}

impl From<redis::RedisError> for PublisherError {
    fn from(err: redis::RedisError) -> Self {
        PublisherError::Unavailable(err.to_string())
    }
}

impl From<PublisherError> for IronscanError {
    fn from(err: PublisherError) -> Self {
        IronscanError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}
