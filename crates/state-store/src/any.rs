//! 런타임에 선택되는 저장소 백엔드

use ironscan_core::types::{Scan, ScanId, ScanResult, ScanStatus};

use crate::error::StoreError;
use crate::memory::MemoryStateStore;
use crate::redis_store::RedisStateStore;
use crate::store::{ScanField, StateStore, Transition};

/// 설정(`store.backend`)에 따라 선택되는 백엔드
#[derive(Debug, Clone)]
pub enum AnyStateStore {
    /// Redis
    Redis(RedisStateStore),
    /// 인메모리 (재시작 시 상태 유실)
    Memory(MemoryStateStore),
}

impl AnyStateStore {
    /// 백엔드 이름
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Redis(_) => "redis",
            Self::Memory(_) => "memory",
        }
    }

    /// 재시작 후에도 상태가 유지되는 백엔드인지 확인합니다.
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Redis(_))
    }
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            AnyStateStore::Redis($store) => $call.await,
            AnyStateStore::Memory($store) => $call.await,
        }
    };
}

impl StateStore for AnyStateStore {
    async fn create_scan(&self, scan: &Scan) -> Result<(), StoreError> {
        dispatch!(self, s => s.create_scan(scan))
    }

    async fn put_field(&self, id: ScanId, field: ScanField) -> Result<(), StoreError> {
        dispatch!(self, s => s.put_field(id, field))
    }

    async fn transition(&self, id: ScanId, transition: Transition) -> Result<ScanStatus, StoreError> {
        dispatch!(self, s => s.transition(id, transition))
    }

    async fn put_host_progress(
        &self,
        id: ScanId,
        host: &str,
        percent: u8,
        at: u64,
    ) -> Result<(), StoreError> {
        dispatch!(self, s => s.put_host_progress(id, host, percent, at))
    }

    async fn append_result(&self, id: ScanId, result: &ScanResult) -> Result<usize, StoreError> {
        dispatch!(self, s => s.append_result(id, result))
    }

    async fn get_scan(&self, id: ScanId) -> Result<Scan, StoreError> {
        dispatch!(self, s => s.get_scan(id))
    }

    async fn list_results(&self, id: ScanId, since: usize) -> Result<Vec<ScanResult>, StoreError> {
        dispatch!(self, s => s.list_results(id, since))
    }

    async fn delete(&self, id: ScanId) -> Result<(), StoreError> {
        dispatch!(self, s => s.delete(id))
    }

    async fn list_scan_ids(&self) -> Result<Vec<ScanId>, StoreError> {
        dispatch!(self, s => s.list_scan_ids())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        dispatch!(self, s => s.ping())
    }
}
