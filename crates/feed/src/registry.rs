//! 현재 피드 스냅샷 보관소

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::error::FeedError;
use crate::loader::{FeedLoader, FeedSnapshot};
use crate::verifier::IntegrityPolicy;

/// 현재 피드 스냅샷을 보관하고 재로딩 시 통째로 교체합니다.
///
/// 읽는 쪽은 [`snapshot`](Self::snapshot)으로 `Arc`를 받아가므로
/// 재로딩 중에도 이전 스냅샷을 계속 사용할 수 있습니다.
#[derive(Debug)]
pub struct FeedRegistry {
    loader: FeedLoader,
    current: RwLock<Arc<FeedSnapshot>>,
}

impl FeedRegistry {
    /// 아직 로드되지 않은 상태로 생성합니다.
    pub fn new(loader: FeedLoader) -> Self {
        Self {
            loader,
            current: RwLock::new(Arc::new(FeedSnapshot::unloaded())),
        }
    }

    /// 주어진 스냅샷으로 생성합니다.
    pub fn with_snapshot(loader: FeedLoader, snapshot: FeedSnapshot) -> Self {
        Self {
            loader,
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// 적용 중인 무결성 정책
    pub fn policy(&self) -> IntegrityPolicy {
        self.loader.policy()
    }

    /// 현재 스냅샷
    pub async fn snapshot(&self) -> Arc<FeedSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// 피드를 다시 읽어 스냅샷을 교체합니다.
    ///
    /// 로딩 에러가 나면 기존 스냅샷을 유지합니다.
    pub async fn reload(&self) -> Result<Arc<FeedSnapshot>, FeedError> {
        let loader = self.loader.clone();
        let snapshot = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| FeedError::Task(format!("spawn_blocking failed: {e}")))??;

        let snapshot = Arc::new(snapshot);
        let previous = {
            let mut current = self.current.write().await;
            std::mem::replace(&mut *current, Arc::clone(&snapshot))
        };
        info!(
            previous_vts = previous.index.len(),
            vts = snapshot.index.len(),
            state = snapshot.state.as_str(),
            "feed snapshot swapped"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::FeedState;

    #[tokio::test]
    async fn starts_unloaded_and_swaps_on_reload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.notus"), r#"{"advisories":[{"oid":"1.2"}]}"#).unwrap();
        let registry = FeedRegistry::new(FeedLoader::new(
            dir.path(),
            dir.path().join("keys"),
            IntegrityPolicy::FailOpen,
        ));

        let before = registry.snapshot().await;
        assert!(!before.state.allows_scans());

        registry.reload().await.unwrap();
        let after = registry.snapshot().await;
        assert_eq!(after.state, FeedState::Bypassed);
        assert_eq!(after.index.len(), 1);
        // 이전 스냅샷은 그대로 남아 있음
        assert!(before.index.is_empty());
    }
}
