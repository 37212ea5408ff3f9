//! 전체 진행률 계산

use ironscan_core::types::HostProgress;

/// 호스트별 진행률로 전체 진행률을 계산합니다.
///
/// - 보고한 호스트가 없으면 0
/// - 모든 호스트가 완료되었으면 100
/// - 그 외에는 아직 진행 중인 호스트 중 가장 낮은 값
///
/// 가장 느린 호스트가 끝나야 스캔이 끝나므로 평균이 아닌 최솟값을 씁니다.
pub fn overall_progress(hosts: &[HostProgress]) -> u8 {
    if hosts.is_empty() {
        return 0;
    }
    hosts
        .iter()
        .filter(|h| !h.is_done())
        .map(|h| h.percent)
        .min()
        .unwrap_or(100)
}
