//! 이벤트 — 메시지 버스로 재발행되는 페이로드
//!
//! 데몬은 구독자를 두지 않으며, 외부 소비자가 스캔 ID 단위 토픽을 구독합니다.
//! 모든 이벤트는 [`EventMetadata`]를 포함하여 JSON으로 직렬화됩니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ScanId, ScanResult, ScanStatus, unix_now};

// --- 컴포넌트명 상수 ---

/// 스캔 컨트롤러
pub const MODULE_CONTROLLER: &str = "scan-controller";
/// 결과 발행자
pub const MODULE_PUBLISHER: &str = "result-publisher";

// --- 이벤트 타입 상수 ---

/// 결과 배치 이벤트 타입
pub const EVENT_TYPE_RESULTS: &str = "results";
/// 상태 변경 이벤트 타입
pub const EVENT_TYPE_STATUS: &str = "status";

/// 이벤트 메타데이터 — 모든 이벤트에 공통으로 포함되는 추적 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 발생 시각 (유닉스 초)
    pub timestamp: u64,
    /// 이벤트를 생성한 컴포넌트
    pub source_module: String,
    /// 추적 ID
    pub trace_id: String,
}

impl EventMetadata {
    /// 새로운 trace_id로 메타데이터를 생성합니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self {
            timestamp: unix_now(),
            source_module: source_module.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] source={} trace={}",
            self.timestamp, self.source_module, self.trace_id
        )
    }
}

/// 한 스캔의 결과 묶음
///
/// 배치 창 안에 도착한 결과를 발견 순서대로 담습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBatchEvent {
    /// 메타데이터
    pub metadata: EventMetadata,
    /// 스캔 ID
    pub scan_id: ScanId,
    /// 결과 목록
    pub results: Vec<ScanResult>,
}

impl ResultBatchEvent {
    /// 새 배치 이벤트를 생성합니다.
    pub fn new(scan_id: ScanId, results: Vec<ScanResult>) -> Self {
        Self {
            metadata: EventMetadata::with_new_trace(MODULE_PUBLISHER),
            scan_id,
            results,
        }
    }

    /// 이벤트 타입명
    pub fn event_type(&self) -> &'static str {
        EVENT_TYPE_RESULTS
    }
}

/// 스캔 상태 변경 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// 메타데이터
    pub metadata: EventMetadata,
    /// 스캔 ID
    pub scan_id: ScanId,
    /// 새 상태
    pub status: ScanStatus,
    /// 에러 상세
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusEvent {
    /// 새 상태 이벤트를 생성합니다.
    pub fn new(scan_id: ScanId, status: ScanStatus, error: Option<String>) -> Self {
        Self {
            metadata: EventMetadata::with_new_trace(MODULE_CONTROLLER),
            scan_id,
            status,
            error,
        }
    }

    /// 이벤트 타입명
    pub fn event_type(&self) -> &'static str {
        EVENT_TYPE_STATUS
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.metadata, self.scan_id, self.status)
    }
}
