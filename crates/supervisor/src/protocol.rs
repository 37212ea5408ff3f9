//! 스캐너 출력 라인 프로토콜
//!
//! 스캐너는 stdout에 한 줄에 하나씩 `kind`로 구분되는 JSON 메시지를 씁니다.
//!
//! ```text
//! {"kind":"host_progress","host":"10.0.0.1","completed":12,"total":40}
//! {"kind":"result","host":"10.0.0.1","port":"22/tcp","vt_oid":"1.3.6...","severity":7.5,"description":"...","result_type":"alarm"}
//! {"kind":"host_done","host":"10.0.0.1"}
//! {"kind":"log","message":"loading plugins"}
//! ```

use serde::{Deserialize, Serialize};

use ironscan_core::types::{ResultType, ScanOptions, ScanResult, Severity};

/// 스캐너 stdin으로 전달되는 작업 정의
#[derive(Debug, Clone, Serialize)]
pub struct ScanJob {
    /// 스캔 ID
    pub scan_id: String,
    /// 대상 목록
    pub targets: Vec<String>,
    /// 옵션
    pub options: ScanOptions,
}

/// 스캐너가 보고하는 심각도 (CVSS 점수 또는 레벨 이름)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawSeverity {
    /// CVSS 점수
    Score(f64),
    /// 레벨 이름
    Label(String),
}

impl RawSeverity {
    fn resolve(&self) -> Result<Severity, String> {
        match self {
            Self::Score(score) if (0.0..=10.0).contains(score) => Ok(Severity::from_score(*score)),
            Self::Score(score) => Err(format!("severity score {score} out of range")),
            Self::Label(label) => {
                Severity::from_str_loose(label).ok_or_else(|| format!("unknown severity '{label}'"))
            }
        }
    }
}

/// stdout 한 줄에 해당하는 메시지
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScannerMessage {
    /// 호스트 진행률
    HostProgress {
        /// 호스트
        host: String,
        /// 완료된 테스트 단계 수
        completed: u64,
        /// 전체 테스트 단계 수
        total: u64,
    },
    /// 호스트 완료
    HostDone {
        /// 호스트
        host: String,
    },
    /// 결과
    Result {
        /// 호스트
        host: String,
        /// 포트
        #[serde(default)]
        port: Option<String>,
        /// VT OID
        vt_oid: String,
        /// 심각도
        severity: RawSeverity,
        /// 설명
        #[serde(default)]
        description: String,
        /// 결과 유형
        #[serde(default = "default_result_type")]
        result_type: ResultType,
    },
    /// 로그 메시지
    Log {
        /// 메시지
        message: String,
    },
}

fn default_result_type() -> ResultType {
    ResultType::Alarm
}

/// 컨트롤러로 전달되는 정규화된 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// 호스트 진행률 (0-100)
    HostProgress {
        /// 호스트
        host: String,
        /// 백분율
        percent: u8,
    },
    /// 결과
    Result(ScanResult),
    /// 로그
    Log(String),
}

/// stdout 한 줄을 파싱합니다.
///
/// 빈 줄은 `Ok(None)`입니다.
pub fn parse_line(line: &str) -> Result<Option<ScannerMessage>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some).map_err(|e| e.to_string())
}

impl ScannerMessage {
    /// 정규화된 이벤트로 변환합니다.
    pub fn into_event(self, timestamp: u64) -> Result<ScanEvent, String> {
        match self {
            Self::HostProgress { host, completed, total } => Ok(ScanEvent::HostProgress {
                host,
                percent: percent(completed, total),
            }),
            Self::HostDone { host } => Ok(ScanEvent::HostProgress { host, percent: 100 }),
            Self::Result {
                host,
                port,
                vt_oid,
                severity,
                description,
                result_type,
            } => {
                if vt_oid.is_empty() {
                    return Err("result without vt_oid".to_owned());
                }
                Ok(ScanEvent::Result(ScanResult {
                    host,
                    port: port.filter(|p| !p.is_empty()),
                    vt_oid,
                    severity: severity.resolve()?,
                    description,
                    result_type,
                    timestamp,
                }))
            }
            Self::Log { message } => Ok(ScanEvent::Log(message)),
        }
    }
}

/// 완료/전체 단계 수를 백분율로 변환합니다. 전체가 0이면 0입니다.
fn percent(completed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = u128::from(completed.min(total)) * 100 / u128::from(total);
    u8::try_from(pct).unwrap_or(100)
}
