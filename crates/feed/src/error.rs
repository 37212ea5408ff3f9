//! 피드 에러 타입

use ironscan_core::error::{IntegrityError, IronscanError};

/// 피드 도메인 에러
///
/// 검증 실패 자체는 에러가 아니라 [`Verdict::Untrusted`](crate::Verdict::Untrusted)로
/// 표현됩니다. 이 타입은 피드를 읽는 과정의 실패만 다룹니다.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// 파일 또는 디렉토리를 읽을 수 없음
    #[error("feed io error: {path}: {reason}")]
    Io {
        /// 경로
        path: String,
        /// 사유
        reason: String,
    },

    /// 피드 파일 파싱 실패
    #[error("failed to parse {path}: {reason}")]
    Parse {
        /// 경로
        path: String,
        /// 사유
        reason: String,
    },

    /// 신뢰 키 로딩 실패
    #[error("invalid trusted key {path}: {reason}")]
    Key {
        /// 경로
        path: String,
        /// 사유
        reason: String,
    },

    /// 백그라운드 로딩 태스크 실패
    #[error("feed load task failed: {0}")]
    Task(String),
}

impl From<FeedError> for IronscanError {
    fn from(err: FeedError) -> Self {
        IronscanError::Integrity(IntegrityError::Feed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_integrity_error() {
        let err: IronscanError = FeedError::Key {
            path: "/etc/keys/a.pub".to_owned(),
            reason: "bad hex".to_owned(),
        }
        .into();
        assert!(matches!(err, IronscanError::Integrity(_)));
        assert!(err.to_string().contains("a.pub"));
    }
}
