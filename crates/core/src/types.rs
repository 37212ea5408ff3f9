//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 스캔, 스캔 상태 머신, 결과, VT 디스크립터를 정의합니다.
//! 저장소, 감독자, 컨트롤러, 데몬이 모두 이 타입들로 데이터를 교환합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// 스캔 옵션 (옵션 이름 → 값)
pub type ScanOptions = BTreeMap<String, String>;

/// 현재 시각을 유닉스 초로 반환합니다.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// 스캔 식별자
///
/// UUID v4로 생성되며 재사용되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(uuid::Uuid);

impl ScanId {
    /// 새 무작위 식별자를 생성합니다.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// 내부 UUID를 반환합니다.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScanId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

/// 스캔 상태
///
/// ```text
/// QUEUED ──> RUNNING ──> FINISHED
///   │           ├──────> STOPPED
///   │           └──────> INTERRUPTED
///   ├──────────────────> STOPPED
///   └──────────────────> INTERRUPTED
/// ```
///
/// `FINISHED`, `STOPPED`, `INTERRUPTED`는 종료 상태이며 더 이상 전이하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    /// 승인됨, 프로세스 슬롯 대기 중
    Queued,
    /// 서브프로세스 실행 중
    Running,
    /// 정상 종료, 모든 결과 저장 완료
    Finished,
    /// 운영자 요청으로 종료됨
    Stopped,
    /// 서브프로세스 비정상 종료 또는 데몬 재시작
    Interrupted,
}

impl ScanStatus {
    /// 모든 상태 목록
    pub const ALL: [ScanStatus; 5] = [
        Self::Queued,
        Self::Running,
        Self::Finished,
        Self::Stopped,
        Self::Interrupted,
    ];

    /// 종료 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Stopped | Self::Interrupted)
    }

    /// `next`로의 전이가 허용되는지 확인합니다.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Running | Self::Stopped | Self::Interrupted),
            Self::Running => matches!(
                next,
                Self::Finished | Self::Stopped | Self::Interrupted
            ),
            Self::Finished | Self::Stopped | Self::Interrupted => false,
        }
    }

    /// `next`로 전이할 수 있는 이전 상태 목록을 반환합니다.
    ///
    /// 저장소의 compare-and-set 전이에 사용됩니다.
    pub fn predecessors(next: ScanStatus) -> Vec<ScanStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }

    /// 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Stopped => "STOPPED",
            Self::Interrupted => "INTERRUPTED",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(Self::Queued),
            "RUNNING" => Ok(Self::Running),
            "FINISHED" => Ok(Self::Finished),
            "STOPPED" => Ok(Self::Stopped),
            "INTERRUPTED" => Ok(Self::Interrupted),
            other => Err(format!("unknown scan status: {other}")),
        }
    }
}

/// 호스트별 진행률
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostProgress {
    /// 호스트
    pub host: String,
    /// 진행률 (0-100, 100이면 완료)
    pub percent: u8,
}

impl HostProgress {
    /// 완료 여부
    pub fn is_done(&self) -> bool {
        self.percent >= 100
    }
}

/// 스캔 스냅샷
///
/// 저장소에서 읽어온 스캔의 현재 상태입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    /// 스캔 ID
    pub id: ScanId,
    /// 대상 목록 (순서 유지)
    pub targets: Vec<String>,
    /// 스캔 옵션
    pub options: ScanOptions,
    /// 상태
    pub status: ScanStatus,
    /// 생성 시각 (유닉스 초)
    pub created_time: u64,
    /// 시작 시각 (RUNNING 진입 시 기록)
    pub start_time: Option<u64>,
    /// 종료 시각 (종료 상태 진입 시 기록)
    pub end_time: Option<u64>,
    /// 전체 진행률 (0-100)
    pub progress: u8,
    /// 호스트별 진행률
    pub host_progress: Vec<HostProgress>,
    /// 에러 상세 (정상 종료가 아닐 때)
    pub error: Option<String>,
    /// 마지막 갱신 시각 (유닉스 초)
    pub last_update: u64,
    /// 진행 보고가 정체된 상태인지 여부
    #[serde(default)]
    pub stalled: bool,
}

impl fmt::Display for Scan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] targets={} progress={}%",
            self.id,
            self.status,
            self.targets.len(),
            self.progress,
        )
    }
}

/// 결과 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    /// 취약점 발견
    Alarm,
    /// 정보성 로그
    Log,
    /// 검사 중 오류
    Error,
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alarm => write!(f, "alarm"),
            Self::Log => write!(f, "log"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// 심각도 레벨
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Info < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 정보성
    #[default]
    Info,
    /// 낮음
    Low,
    /// 중간
    Medium,
    /// 높음
    High,
    /// 치명적
    Critical,
}

impl Severity {
    /// CVSS 점수(0.0-10.0)를 심각도로 변환합니다.
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Self::Critical
        } else if score >= 7.0 {
            Self::High
        } else if score >= 4.0 {
            Self::Medium
        } else if score > 0.0 {
            Self::Low
        } else {
            Self::Info
        }
    }

    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" | "informational" | "log" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "Info"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 스캔 결과
///
/// 스캔에 종속되며 추가 전용입니다. 추가 순서가 곧 발견 순서입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// 호스트
    pub host: String,
    /// 포트 (예: `443/tcp`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// VT 식별자
    pub vt_oid: String,
    /// 심각도
    pub severity: Severity,
    /// 설명
    pub description: String,
    /// 결과 유형
    pub result_type: ResultType,
    /// 발견 시각 (유닉스 초)
    pub timestamp: u64,
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}{} {}",
            self.severity,
            self.result_type,
            self.host,
            self.port
                .as_deref()
                .map(|p| format!(":{p}"))
                .unwrap_or_default(),
            self.vt_oid,
        )
    }
}

/// VT 참조 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtRefs {
    /// 참조 URL
    #[serde(default)]
    pub url: Vec<String>,
    /// CVE 목록
    #[serde(default)]
    pub cve: Vec<String>,
    /// 어드바이저리 ID
    #[serde(default)]
    pub advisory_id: Vec<String>,
}

/// VT (취약점 검사) 디스크립터
///
/// 피드 버전 단위로 불변이며, 피드 갱신 시 통째로 교체됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VtDescriptor {
    /// OID 형식의 식별자
    pub oid: String,
    /// 이름
    pub name: String,
    /// 패밀리
    pub family: String,
    /// 카테고리
    pub category: String,
    /// QoD 유형
    pub qod_type: String,
    /// 심각도 벡터 (CVSS v3 우선, 없으면 v2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_vector: Option<String>,
    /// 요약
    #[serde(default)]
    pub summary: String,
    /// 영향
    #[serde(default)]
    pub impact: String,
    /// 영향받는 대상
    #[serde(default)]
    pub affected: String,
    /// 상세 분석
    #[serde(default)]
    pub insight: String,
    /// 해결 방법
    pub solution: String,
    /// 해결 방법 유형
    pub solution_type: String,
    /// 탐지 방법
    pub vuldetect: String,
    /// 생성일
    #[serde(default)]
    pub creation_date: Option<i64>,
    /// 최종 수정일
    #[serde(default)]
    pub modification_date: Option<i64>,
    /// 참조
    #[serde(default)]
    pub refs: VtRefs,
    /// 원본 파일명
    pub filename: String,
    /// 원본 파일 콘텐츠 해시 (sha256 hex)
    pub content_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_id_roundtrips_through_string() {
        let id = ScanId::new();
        let parsed: ScanId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn scan_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<ScanId>().is_err());
    }

    #[test]
    fn scan_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| ScanId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn terminal_states_never_transition() {
        for from in ScanStatus::ALL.into_iter().filter(ScanStatus::is_terminal) {
            for to in ScanStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn forward_transitions_allowed() {
        assert!(ScanStatus::Queued.can_transition_to(ScanStatus::Running));
        assert!(ScanStatus::Queued.can_transition_to(ScanStatus::Stopped));
        assert!(ScanStatus::Running.can_transition_to(ScanStatus::Finished));
        assert!(ScanStatus::Running.can_transition_to(ScanStatus::Interrupted));
        assert!(!ScanStatus::Running.can_transition_to(ScanStatus::Queued));
        assert!(!ScanStatus::Running.can_transition_to(ScanStatus::Running));
        assert!(!ScanStatus::Queued.can_transition_to(ScanStatus::Finished));
    }

    #[test]
    fn predecessors_of_running_is_queued_only() {
        assert_eq!(
            ScanStatus::predecessors(ScanStatus::Running),
            vec![ScanStatus::Queued]
        );
        assert_eq!(
            ScanStatus::predecessors(ScanStatus::Stopped),
            vec![ScanStatus::Queued, ScanStatus::Running]
        );
        assert!(ScanStatus::predecessors(ScanStatus::Queued).is_empty());
    }

    #[test]
    fn status_string_roundtrip() {
        for status in ScanStatus::ALL {
            assert_eq!(status.as_str().parse::<ScanStatus>().unwrap(), status);
        }
        assert!("running".parse::<ScanStatus>().is_err());
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&ScanStatus::Interrupted).unwrap();
        assert_eq!(json, "\"INTERRUPTED\"");
    }

    #[test]
    fn severity_from_score_boundaries() {
        assert_eq!(Severity::from_score(0.0), Severity::Info);
        assert_eq!(Severity::from_score(0.1), Severity::Low);
        assert_eq!(Severity::from_score(4.0), Severity::Medium);
        assert_eq!(Severity::from_score(6.9), Severity::Medium);
        assert_eq!(Severity::from_score(7.5), Severity::High);
        assert_eq!(Severity::from_score(10.0), Severity::Critical);
    }

    #[test]
    fn severity_from_str_loose() {
        assert_eq!(Severity::from_str_loose("HIGH"), Some(Severity::High));
        assert_eq!(Severity::from_str_loose("log"), Some(Severity::Info));
        assert_eq!(Severity::from_str_loose("unknown"), None);
    }

    #[test]
    fn result_display_includes_port() {
        let result = ScanResult {
            host: "10.0.0.1".to_owned(),
            port: Some("443/tcp".to_owned()),
            vt_oid: "1.3.6.1.4.1.25623.1.0.1".to_owned(),
            severity: Severity::High,
            description: "weak cipher".to_owned(),
            result_type: ResultType::Alarm,
            timestamp: 0,
        };
        let display = result.to_string();
        assert!(display.contains("10.0.0.1:443/tcp"));
        assert!(display.contains("alarm"));
    }

    #[test]
    fn result_without_port_omits_field() {
        let result = ScanResult {
            host: "h".to_owned(),
            port: None,
            vt_oid: "oid".to_owned(),
            severity: Severity::Info,
            description: String::new(),
            result_type: ResultType::Log,
            timestamp: 1,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("port"));
    }

    #[test]
    fn host_progress_done_at_hundred() {
        let hp = HostProgress {
            host: "a".to_owned(),
            percent: 100,
        };
        assert!(hp.is_done());
    }
}
