//! 상태 저장소 trait
//!
//! 모든 스캔 상태 변경은 [`StateStore`]의 원자적 연산을 통해서만 이루어집니다.
//! 구현체는 Redis([`RedisStateStore`](crate::RedisStateStore))와
//! 인메모리([`MemoryStateStore`](crate::MemoryStateStore))가 있습니다.

use std::future::Future;

use ironscan_core::types::{Scan, ScanId, ScanResult, ScanStatus};

use crate::error::StoreError;

/// 단일 필드 갱신 단위
///
/// 상태(`status`)는 포함되지 않습니다. 상태 변경은 반드시
/// [`StateStore::transition`]을 거쳐야 합니다.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanField {
    /// 전체 진행률
    Progress(u8),
    /// 에러 상세 (`None`이면 삭제)
    Error(Option<String>),
    /// 마지막 갱신 시각
    LastUpdate(u64),
}

impl ScanField {
    /// 저장소 필드명
    pub fn name(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::Error(_) => "error",
            Self::LastUpdate(_) => "last_update",
        }
    }

    /// 저장 값 (`None`이면 필드 삭제)
    pub fn encode(&self) -> Option<String> {
        match self {
            Self::Progress(p) => Some(p.to_string()),
            Self::Error(e) => e.clone(),
            Self::LastUpdate(t) => Some(t.to_string()),
        }
    }
}

/// 상태 전이 요청
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// 목표 상태
    pub to: ScanStatus,
    /// 전이 시각 (유닉스 초)
    pub at: u64,
    /// 함께 기록할 에러 상세
    pub error: Option<String>,
}

impl Transition {
    /// 에러 상세 없는 전이
    pub fn to(to: ScanStatus, at: u64) -> Self {
        Self {
            to,
            at,
            error: None,
        }
    }

    /// 에러 상세를 포함한 전이
    pub fn with_error(to: ScanStatus, at: u64, error: impl Into<String>) -> Self {
        Self {
            to,
            at,
            error: Some(error.into()),
        }
    }

    /// 전이 시 함께 기록되는 시각 필드명
    ///
    /// RUNNING 진입은 `start_time`, 종료 상태 진입은 `end_time`을 기록합니다.
    pub fn time_field(&self) -> Option<&'static str> {
        if self.to == ScanStatus::Running {
            Some("start_time")
        } else if self.to.is_terminal() {
            Some("end_time")
        } else {
            None
        }
    }
}

/// 스캔 상태 저장소
///
/// `Send + Sync + 'static` 바운드로 여러 태스크에서 공유할 수 있습니다.
/// 모든 연산은 스캔 단위로 원자적이며, 다른 스캔의 연산과 독립적입니다.
pub trait StateStore: Send + Sync + 'static {
    /// QUEUED 상태의 새 스캔을 저장합니다.
    ///
    /// 같은 ID가 이미 존재하면 `StoreError::IdCollision`을 반환합니다.
    fn create_scan(&self, scan: &Scan) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 단일 필드를 덮어씁니다 (멱등).
    fn put_field(
        &self,
        id: ScanId,
        field: ScanField,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 저장된 상태가 목표 상태의 허용된 이전 상태일 때만 전이합니다 (compare-and-set).
    ///
    /// 성공 시 전이 전 상태를 반환합니다. 허용되지 않으면
    /// `StoreError::InvalidTransition`을 반환하며 아무것도 변경하지 않습니다.
    fn transition(
        &self,
        id: ScanId,
        transition: Transition,
    ) -> impl Future<Output = Result<ScanStatus, StoreError>> + Send;

    /// 호스트 진행률을 기록하고 `last_update`를 갱신합니다.
    fn put_host_progress(
        &self,
        id: ScanId,
        host: &str,
        percent: u8,
        at: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 결과를 끝에 추가하고 `last_update`를 갱신합니다.
    ///
    /// 추가 후 결과 개수를 반환합니다.
    fn append_result(
        &self,
        id: ScanId,
        result: &ScanResult,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// 스캔 스냅샷을 읽습니다.
    fn get_scan(&self, id: ScanId) -> impl Future<Output = Result<Scan, StoreError>> + Send;

    /// `since` 인덱스부터의 결과를 추가 순서대로 반환합니다.
    fn list_results(
        &self,
        id: ScanId,
        since: usize,
    ) -> impl Future<Output = Result<Vec<ScanResult>, StoreError>> + Send;

    /// 스캔의 모든 저장 데이터를 삭제합니다.
    fn delete(&self, id: ScanId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 저장된 모든 스캔 ID를 반환합니다.
    fn list_scan_ids(&self) -> impl Future<Output = Result<Vec<ScanId>, StoreError>> + Send;

    /// 저장소 연결 상태를 확인합니다.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_encoding() {
        assert_eq!(ScanField::Progress(42).encode().as_deref(), Some("42"));
        assert_eq!(ScanField::Error(None).encode(), None);
        assert_eq!(ScanField::LastUpdate(7).name(), "last_update");
    }

    #[test]
    fn transition_time_fields() {
        assert_eq!(
            Transition::to(ScanStatus::Running, 0).time_field(),
            Some("start_time")
        );
        assert_eq!(
            Transition::to(ScanStatus::Stopped, 0).time_field(),
            Some("end_time")
        );
        assert_eq!(Transition::to(ScanStatus::Queued, 0).time_field(), None);
    }
}
