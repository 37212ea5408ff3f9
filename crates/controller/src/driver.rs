//! 스캔 드라이버
//!
//! 실행 중인 스캔 하나의 감독자 이벤트를 받아 저장소에 반영합니다.
//!
//! - 호스트 진행률은 호스트별로 기록하고 전체 진행률을 다시 계산합니다.
//! - 결과는 받은 순서대로 저장하며, 저장에 성공한 뒤에만 발행합니다.
//! - 저장소가 일시적으로 실패하면 결과를 버퍼에 남겨 다음 이벤트에서 다시 씁니다.
//! - 종료 보고는 최종 상태로 매핑됩니다.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use ironscan_core::metrics as m;
use ironscan_core::types::{HostProgress, ScanId, ScanResult, ScanStatus, unix_now};
use ironscan_store::{ScanField, StateStore};
use ironscan_supervisor::{ExitOutcome, ExitReport, ScanEvent, SupervisorEvent};

use crate::controller::{DAEMON_SHUTDOWN, Inner, STOPPED_BY_OPERATOR};
use crate::progress::overall_progress;

/// 종료 후 남은 결과를 저장하는 시도 횟수
const FINAL_FLUSH_ATTEMPTS: u32 = 5;

/// 종료 후 재시도 간격 (시도 횟수에 비례)
const FINAL_FLUSH_BACKOFF: Duration = Duration::from_millis(500);

pub(crate) struct ScanDriver<S> {
    inner: Arc<Inner<S>>,
    id: ScanId,
    started_at: u64,
    hosts: BTreeMap<String, u8>,
    dirty_hosts: BTreeSet<String>,
    pending: VecDeque<ScanResult>,
    done: watch::Sender<Option<ScanStatus>>,
    operator_stop: Arc<AtomicBool>,
}

impl<S: StateStore> ScanDriver<S> {
    pub(crate) fn new(
        inner: Arc<Inner<S>>,
        id: ScanId,
        started_at: u64,
        done: watch::Sender<Option<ScanStatus>>,
        operator_stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            inner,
            id,
            started_at,
            hosts: BTreeMap::new(),
            dirty_hosts: BTreeSet::new(),
            pending: VecDeque::new(),
            done,
            operator_stop,
        }
    }

    pub(crate) async fn run(mut self, mut events: mpsc::Receiver<SupervisorEvent>) {
        let report = loop {
            match events.recv().await {
                Some(SupervisorEvent::Scan(ScanEvent::HostProgress { host, percent })) => {
                    let entry = self.hosts.entry(host.clone()).or_insert(0);
                    *entry = (*entry).max(percent);
                    self.dirty_hosts.insert(host);
                    self.flush().await;
                }
                Some(SupervisorEvent::Scan(ScanEvent::Result(result))) => {
                    self.pending.push_back(result);
                    self.flush().await;
                }
                Some(SupervisorEvent::Scan(ScanEvent::Log(_))) => {}
                Some(SupervisorEvent::Exited(report)) => break Some(report),
                None => break None,
            }
        };

        for attempt in 1..=FINAL_FLUSH_ATTEMPTS {
            if self.flush().await {
                break;
            }
            if attempt < FINAL_FLUSH_ATTEMPTS {
                tokio::time::sleep(FINAL_FLUSH_BACKOFF * attempt).await;
            }
        }

        let (status, error) = self.outcome(report.as_ref());
        let Self {
            inner,
            id,
            started_at,
            done,
            ..
        } = self;
        inner.complete(id, status, error, started_at, done).await;
    }

    /// 종료 보고를 최종 상태와 사유로 매핑합니다.
    fn outcome(&self, report: Option<&ExitReport>) -> (ScanStatus, Option<String>) {
        let Some(report) = report else {
            return (
                ScanStatus::Interrupted,
                Some("scanner supervision ended unexpectedly".to_owned()),
            );
        };
        match report.outcome() {
            ExitOutcome::Clean if self.pending.is_empty() => (ScanStatus::Finished, None),
            ExitOutcome::Clean => (
                ScanStatus::Interrupted,
                Some(format!(
                    "store unavailable: {} results could not be persisted",
                    self.pending.len()
                )),
            ),
            ExitOutcome::Stopped if self.operator_stop.load(Ordering::SeqCst) => {
                (ScanStatus::Stopped, Some(STOPPED_BY_OPERATOR.to_owned()))
            }
            ExitOutcome::Stopped => (ScanStatus::Interrupted, Some(DAEMON_SHUTDOWN.to_owned())),
            ExitOutcome::LimitExceeded(reason) | ExitOutcome::Failed(reason) => {
                (ScanStatus::Interrupted, Some(reason))
            }
        }
    }

    /// 밀린 진행률과 결과를 저장합니다. 모두 저장했으면 `true`.
    async fn flush(&mut self) -> bool {
        let inner = Arc::clone(&self.inner);
        let store = &inner.store;
        let now = unix_now();

        let mut hosts_written = false;
        while let Some(host) = self.dirty_hosts.first().cloned() {
            let percent = self.hosts.get(&host).copied().unwrap_or(0);
            if let Err(e) = store.put_host_progress(self.id, &host, percent, now).await {
                return self.write_failed("host progress", e).await;
            }
            self.dirty_hosts.remove(&host);
            hosts_written = true;
        }
        if hosts_written {
            let snapshot: Vec<HostProgress> = self
                .hosts
                .iter()
                .map(|(host, percent)| HostProgress {
                    host: host.clone(),
                    percent: *percent,
                })
                .collect();
            let progress = overall_progress(&snapshot);
            if let Err(e) = store.put_field(self.id, ScanField::Progress(progress)).await {
                debug!(scan_id = %self.id, error = %e, "overall progress not stored, recomputed on read");
            }
        }

        while let Some(result) = self.pending.front() {
            match store.append_result(self.id, result).await {
                Ok(_) => {
                    metrics::counter!(m::CONTROLLER_RESULTS_TOTAL).increment(1);
                    if let Some(result) = self.pending.pop_front() {
                        if let Some(publisher) = &inner.publisher {
                            publisher.publish(self.id, result);
                        }
                    }
                }
                Err(e) if e.is_transient() => {
                    return self.write_failed("result", e).await;
                }
                Err(e) => {
                    error!(scan_id = %self.id, vt_oid = %result.vt_oid, error = %e, "result rejected by store, discarding");
                    self.pending.pop_front();
                }
            }
        }

        inner.clear_degraded().await;
        true
    }

    async fn write_failed(&self, what: &str, err: ironscan_store::StoreError) -> bool {
        warn!(
            scan_id = %self.id,
            pending_results = self.pending.len(),
            error = %err,
            "{what} not stored, will retry"
        );
        self.inner
            .mark_degraded(format!("state store writes failing: {err}"))
            .await;
        false
    }
}
