//! Redis 키 레이아웃
//!
//! ```text
//! ironscan:scans                 SET   모든 스캔 ID
//! ironscan:scan:{id}             HASH  스캔 필드
//! ironscan:scan:{id}:hosts       HASH  호스트 → 진행률
//! ironscan:scan:{id}:results     LIST  결과 JSON (추가 순서)
//! ```

use ironscan_core::types::ScanId;

/// 키 접두사
pub const PREFIX: &str = "ironscan";

/// 스캔 ID 집합 키
pub fn scans_set() -> String {
    format!("{PREFIX}:scans")
}

/// 스캔 해시 키
pub fn scan(id: ScanId) -> String {
    format!("{PREFIX}:scan:{id}")
}

/// 호스트 진행률 해시 키
pub fn hosts(id: ScanId) -> String {
    format!("{PREFIX}:scan:{id}:hosts")
}

/// 결과 리스트 키
pub fn results(id: ScanId) -> String {
    format!("{PREFIX}:scan:{id}:results")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_scoped_by_scan_id() {
        let id = ScanId::new();
        let base = scan(id);
        assert!(base.ends_with(&id.to_string()));
        assert_eq!(hosts(id), format!("{base}:hosts"));
        assert_eq!(results(id), format!("{base}:results"));
        assert_eq!(scans_set(), "ironscan:scans");
    }
}
