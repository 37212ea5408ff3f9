//! 인메모리 상태 저장소
//!
//! 저장소가 필수가 아닌 실행 모드(재시작 시 상태 유실)와 테스트에서 사용합니다.
//! [`MemoryStateStore::fail_next`]로 일시적 장애를 주입할 수 있습니다.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::RwLock;

use ironscan_core::types::{HostProgress, Scan, ScanId, ScanResult, ScanStatus};

use crate::error::StoreError;
use crate::store::{ScanField, StateStore, Transition};

#[derive(Debug, Clone)]
struct Entry {
    scan: Scan,
    hosts: BTreeMap<String, u8>,
    results: Vec<ScanResult>,
}

/// 인메모리 상태 저장소
///
/// `Clone`은 같은 저장소를 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    scans: Arc<RwLock<HashMap<ScanId, Entry>>>,
    fail_next: Arc<AtomicU32>,
}

impl MemoryStateStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 다음 `n`개의 연산이 적용되지 않은 채 `StoreError::Refused`로 실패하도록 설정합니다.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            Err(StoreError::Refused("injected failure".to_owned()))
        } else {
            Ok(())
        }
    }
}

impl StateStore for MemoryStateStore {
    async fn create_scan(&self, scan: &Scan) -> Result<(), StoreError> {
        self.check_available()?;
        let mut scans = self.scans.write().await;
        if scans.contains_key(&scan.id) {
            return Err(StoreError::IdCollision(scan.id));
        }
        scans.insert(
            scan.id,
            Entry {
                scan: scan.clone(),
                hosts: BTreeMap::new(),
                results: Vec::new(),
            },
        );
        Ok(())
    }

    async fn put_field(&self, id: ScanId, field: ScanField) -> Result<(), StoreError> {
        self.check_available()?;
        let mut scans = self.scans.write().await;
        let entry = scans.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        match field {
            ScanField::Progress(p) => entry.scan.progress = p,
            ScanField::Error(e) => entry.scan.error = e,
            ScanField::LastUpdate(t) => entry.scan.last_update = t,
        }
        Ok(())
    }

    async fn transition(&self, id: ScanId, transition: Transition) -> Result<ScanStatus, StoreError> {
        self.check_available()?;
        let mut scans = self.scans.write().await;
        let entry = scans.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let from = entry.scan.status;
        if !from.can_transition_to(transition.to) {
            return Err(StoreError::InvalidTransition {
                id,
                from,
                to: transition.to,
            });
        }

        entry.scan.status = transition.to;
        entry.scan.last_update = transition.at;
        match transition.time_field() {
            Some("start_time") => entry.scan.start_time = Some(transition.at),
            Some(_) => entry.scan.end_time = Some(transition.at),
            None => {}
        }
        if transition.error.is_some() {
            entry.scan.error = transition.error;
        }
        Ok(from)
    }

    async fn put_host_progress(
        &self,
        id: ScanId,
        host: &str,
        percent: u8,
        at: u64,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut scans = self.scans.write().await;
        let entry = scans.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        entry.hosts.insert(host.to_owned(), percent.min(100));
        entry.scan.last_update = at;
        Ok(())
    }

    async fn append_result(&self, id: ScanId, result: &ScanResult) -> Result<usize, StoreError> {
        self.check_available()?;
        let mut scans = self.scans.write().await;
        let entry = scans.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        entry.results.push(result.clone());
        entry.scan.last_update = entry.scan.last_update.max(result.timestamp);
        Ok(entry.results.len())
    }

    async fn get_scan(&self, id: ScanId) -> Result<Scan, StoreError> {
        self.check_available()?;
        let scans = self.scans.read().await;
        let entry = scans.get(&id).ok_or(StoreError::NotFound(id))?;
        let mut scan = entry.scan.clone();
        scan.host_progress = entry
            .hosts
            .iter()
            .map(|(host, percent)| HostProgress {
                host: host.clone(),
                percent: *percent,
            })
            .collect();
        Ok(scan)
    }

    async fn list_results(&self, id: ScanId, since: usize) -> Result<Vec<ScanResult>, StoreError> {
        self.check_available()?;
        let scans = self.scans.read().await;
        let entry = scans.get(&id).ok_or(StoreError::NotFound(id))?;
        Ok(entry.results.iter().skip(since).cloned().collect())
    }

    async fn delete(&self, id: ScanId) -> Result<(), StoreError> {
        self.check_available()?;
        self.scans.write().await.remove(&id);
        Ok(())
    }

    async fn list_scan_ids(&self) -> Result<Vec<ScanId>, StoreError> {
        self.check_available()?;
        Ok(self.scans.read().await.keys().copied().collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}
