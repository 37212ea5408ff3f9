//! 스캔별 배타 잠금
//!
//! 한 스캔의 상태 전이는 직렬화하되, 서로 다른 스캔은 독립적으로 진행합니다.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use ironscan_core::types::ScanId;

/// 스캔 ID별 잠금 테이블
#[derive(Debug, Default)]
pub struct ScanLocks {
    table: Mutex<HashMap<ScanId, Arc<Mutex<()>>>>,
}

impl ScanLocks {
    /// 빈 테이블을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 스캔 잠금을 얻습니다.
    pub async fn lock(&self, id: ScanId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().await;
            Arc::clone(table.entry(id).or_default())
        };
        lock.lock_owned().await
    }

    /// 삭제된 스캔의 잠금 항목을 제거합니다.
    pub async fn forget(&self, id: ScanId) {
        self.table.lock().await.remove(&id);
    }

    /// 잠금 항목 수
    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }
}
