//! 스캔 대상 및 옵션 검증
//!
//! 잘못된 요청은 상태를 바꾸기 전에 [`ControllerError::InvalidOptions`]로 거부합니다.

use std::collections::HashSet;

use serde::Serialize;

use ironscan_core::types::ScanOptions;

use crate::error::ControllerError;

/// 한 스캔에 허용되는 최대 대상 수
pub const MAX_TARGETS: usize = 4096;

/// 대상 문자열 최대 길이
pub const MAX_TARGET_LEN: usize = 255;

/// 스캐너 파라미터 값 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// `0` 또는 `1`
    Boolean,
    /// 0 이상의 정수
    Integer,
    /// 자유 문자열
    String,
}

/// 스캐너가 받는 파라미터 정의
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScannerParam {
    /// 이름
    pub id: &'static str,
    /// 값 유형
    #[serde(rename = "type")]
    pub kind: ParamKind,
    /// 기본값
    pub default: &'static str,
    /// 최솟값 (정수형만)
    #[serde(skip)]
    pub min: u64,
    /// 설명
    pub description: &'static str,
}

/// 지원하는 스캐너 파라미터
pub const SCANNER_PARAMS: &[ScannerParam] = &[
    ScannerParam {
        id: "safe_checks",
        kind: ParamKind::Boolean,
        default: "1",
        min: 0,
        description: "Disable tests that may crash or disrupt the target",
    },
    ScannerParam {
        id: "optimize_test",
        kind: ParamKind::Boolean,
        default: "1",
        min: 0,
        description: "Only run tests relevant to detected services",
    },
    ScannerParam {
        id: "expand_vhosts",
        kind: ParamKind::Boolean,
        default: "1",
        min: 0,
        description: "Scan virtual hosts discovered for a target",
    },
    ScannerParam {
        id: "table_driven_lsc",
        kind: ParamKind::Boolean,
        default: "1",
        min: 0,
        description: "Run local security checks against the advisory feed",
    },
    ScannerParam {
        id: "max_hosts",
        kind: ParamKind::Integer,
        default: "20",
        min: 1,
        description: "Maximum number of hosts scanned in parallel",
    },
    ScannerParam {
        id: "max_checks",
        kind: ParamKind::Integer,
        default: "4",
        min: 1,
        description: "Maximum number of tests run in parallel per host",
    },
    ScannerParam {
        id: "checks_read_timeout",
        kind: ParamKind::Integer,
        default: "5",
        min: 1,
        description: "Seconds to wait for a network read during a test",
    },
    ScannerParam {
        id: "plugins_timeout",
        kind: ParamKind::Integer,
        default: "320",
        min: 1,
        description: "Seconds a single test may run",
    },
    ScannerParam {
        id: "scan_instance_timeout",
        kind: ParamKind::Integer,
        default: "0",
        min: 0,
        description: "Seconds the whole scan may run, 0 for no limit",
    },
    ScannerParam {
        id: "port_range",
        kind: ParamKind::String,
        default: "1-65535",
        min: 0,
        description: "Ports to scan, e.g. 1-1024,T:3389,U:53",
    },
];

/// 이름으로 파라미터 정의를 찾습니다.
pub fn param(id: &str) -> Option<&'static ScannerParam> {
    SCANNER_PARAMS.iter().find(|p| p.id == id)
}

/// 대상 목록을 검증하고 정규화합니다.
///
/// 앞뒤 공백을 제거하고 중복을 없애며 처음 나온 순서를 유지합니다.
pub fn validate_targets(targets: &[String]) -> Result<Vec<String>, ControllerError> {
    if targets.is_empty() {
        return Err(invalid("at least one target is required"));
    }
    if targets.len() > MAX_TARGETS {
        return Err(invalid(format!(
            "{} targets given, at most {MAX_TARGETS} allowed",
            targets.len()
        )));
    }

    let mut seen = HashSet::with_capacity(targets.len());
    let mut normalized = Vec::with_capacity(targets.len());
    for raw in targets {
        let target = raw.trim();
        if target.is_empty() {
            return Err(invalid("empty target"));
        }
        if target.len() > MAX_TARGET_LEN {
            return Err(invalid(format!(
                "target longer than {MAX_TARGET_LEN} characters"
            )));
        }
        if let Some(c) = target.chars().find(|c| !is_target_char(*c)) {
            return Err(invalid(format!("target '{target}' contains invalid character {c:?}")));
        }
        if seen.insert(target.to_owned()) {
            normalized.push(target.to_owned());
        }
    }
    Ok(normalized)
}

/// 호스트명, IPv4/IPv6 주소, CIDR, 범위(`10.0.0.1-20`)에 쓰이는 문자만 허용
fn is_target_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '-' | '/' | '_' | '[' | ']' | '%')
}

/// 스캔 옵션을 검증합니다.
///
/// 알 수 없는 이름이나 유형에 맞지 않는 값은 거부합니다.
pub fn validate_options(options: &ScanOptions) -> Result<ScanOptions, ControllerError> {
    let mut validated = ScanOptions::new();
    for (name, value) in options {
        let def = param(name).ok_or_else(|| invalid(format!("unknown option '{name}'")))?;
        let value = value.trim();
        match def.kind {
            ParamKind::Boolean => {
                if !matches!(value, "0" | "1") {
                    return Err(invalid(format!("option '{name}' must be 0 or 1, got '{value}'")));
                }
            }
            ParamKind::Integer => {
                let n: u64 = value.parse().map_err(|_| {
                    invalid(format!("option '{name}' must be an integer, got '{value}'"))
                })?;
                if n < def.min {
                    return Err(invalid(format!("option '{name}' must be at least {}", def.min)));
                }
            }
            ParamKind::String => {
                if name == "port_range" {
                    validate_port_range(value)?;
                } else if value.is_empty() {
                    return Err(invalid(format!("option '{name}' must not be empty")));
                }
            }
        }
        validated.insert(name.clone(), value.to_owned());
    }
    Ok(validated)
}

/// 포트 범위를 검증합니다. 예: `1-1024,T:3389,U:53`
pub fn validate_port_range(ranges: &str) -> Result<(), ControllerError> {
    if ranges.is_empty() {
        return Err(invalid("port_range must not be empty"));
    }
    for part in ranges.split(',') {
        let part = part.trim();
        let body = part
            .strip_prefix("T:")
            .or_else(|| part.strip_prefix("U:"))
            .unwrap_or(part);
        let (lo, hi) = match body.split_once('-') {
            Some((lo, hi)) => (port(lo, ranges)?, port(hi, ranges)?),
            None => {
                let p = port(body, ranges)?;
                (p, p)
            }
        };
        if lo > hi {
            return Err(invalid(format!("port range '{part}' is reversed")));
        }
    }
    Ok(())
}

fn port(s: &str, ranges: &str) -> Result<u16, ControllerError> {
    match s.trim().parse::<u16>() {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(invalid(format!("invalid port '{s}' in port_range '{ranges}'"))),
    }
}

fn invalid(reason: impl Into<String>) -> ControllerError {
    ControllerError::InvalidOptions(reason.into())
}
