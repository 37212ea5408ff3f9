//! 스캐너 정보 및 VT 조회 응답 타입

use serde::Serialize;

use ironscan_feed::FeedState;

use crate::options::ScannerParam;

/// 데몬 이름
pub const SCANNER_NAME: &str = "ironscan";

/// 스캐너 정보 (`get_scanner_details`)
#[derive(Debug, Clone, Serialize)]
pub struct ScannerDetails {
    /// 데몬 이름
    pub name: &'static str,
    /// 데몬 버전
    pub version: &'static str,
    /// 설명
    pub description: &'static str,
    /// 지원하는 스캔 옵션
    pub params: Vec<ScannerParam>,
    /// 동시 실행 상한
    pub max_concurrent_scans: usize,
    /// 현재 실행 중인 스캐너 수
    pub running_scans: usize,
    /// 피드 요약
    pub feed: FeedSummary,
}

/// 현재 피드 스냅샷 요약
#[derive(Debug, Clone, Serialize)]
pub struct FeedSummary {
    /// 신뢰 상태
    #[serde(flatten)]
    pub state: FeedState,
    /// 무결성 정책 (`fail_closed` / `fail_open`)
    pub policy: &'static str,
    /// 로드된 VT 수
    pub vts: usize,
    /// 거부된 파일 수
    pub files_rejected: usize,
    /// 로드 시각 (Unix 초)
    pub loaded_at: u64,
}

/// VT 조회 조건 (`get_vts`)
///
/// 둘 다 비어 있으면 전체를 반환합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VtFilter {
    /// 정확히 일치하는 OID
    pub oid: Option<String>,
    /// 패밀리 이름
    pub family: Option<String>,
}

impl VtFilter {
    /// OID로 조회합니다.
    pub fn oid(oid: impl Into<String>) -> Self {
        Self {
            oid: Some(oid.into()),
            family: None,
        }
    }

    /// 패밀리로 조회합니다.
    pub fn family(family: impl Into<String>) -> Self {
        Self {
            oid: None,
            family: Some(family.into()),
        }
    }
}
