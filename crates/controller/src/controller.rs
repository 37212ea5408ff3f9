//! 스캔 컨트롤러
//!
//! 스캔 생성부터 종료 상태까지의 수명 주기를 소유합니다.
//! 모든 상태 변경은 상태 저장소를 거치며, 한 스캔의 전이는 [`ScanLocks`]로 직렬화됩니다.
//!
//! 실행 중인 스캔마다 드라이버 태스크 하나가 감독자 이벤트를 저장소에 반영하고
//! 종료 보고를 최종 상태로 매핑합니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ironscan_core::config::ControllerConfig;
use ironscan_core::metrics as m;
use ironscan_core::pipeline::HealthStatus;
use ironscan_core::types::{
    Scan, ScanId, ScanOptions, ScanResult, ScanStatus, VtDescriptor, unix_now,
};
use ironscan_feed::{FeedRegistry, FeedSnapshot, FeedState};
use ironscan_publisher::PublisherHandle;
use ironscan_store::{StateStore, StoreError, Transition};
use ironscan_supervisor::{ProcessSupervisor, Slot, StopHandle};

use crate::details::{FeedSummary, SCANNER_NAME, ScannerDetails, VtFilter};
use crate::driver::ScanDriver;
use crate::error::ControllerError;
use crate::locks::ScanLocks;
use crate::options::{SCANNER_PARAMS, validate_options, validate_targets};
use crate::progress::overall_progress;

/// 운영자 중지 시 기록되는 사유
pub const STOPPED_BY_OPERATOR: &str = "scan stopped by operator request";

/// 데몬 재시작으로 고아가 된 스캔에 기록되는 사유
pub const DAEMON_RESTARTED: &str = "daemon restarted while scan was running";

/// 데몬 종료로 중단된 스캔에 기록되는 사유
pub const DAEMON_SHUTDOWN: &str = "daemon shut down while scan was running";

/// ID 충돌 시 새 ID로 재시도하는 횟수
const MAX_ID_ATTEMPTS: usize = 3;

/// 컨트롤러 설정
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// 진행 보고 없이 이 시간이 지나면 stalled로 표시
    pub stall_window: Duration,
    /// stop_scan이 유예 기간 이후 추가로 기다리는 시간
    pub stop_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&ControllerConfig::default())
    }
}

impl ControllerSettings {
    /// 설정에서 생성합니다.
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            stall_window: Duration::from_secs(config.stall_window_secs),
            stop_timeout: Duration::from_secs(config.stop_timeout_secs),
        }
    }
}

/// 기동 시 정합성 복구 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// RUNNING으로 남아 있다가 INTERRUPTED로 전이된 스캔
    pub interrupted: Vec<ScanId>,
    /// QUEUED 상태로 남아 있는 스캔 (다시 시작 요청 가능)
    pub queued: Vec<ScanId>,
}

/// 실행 중이거나 슬롯을 기다리는 스캔
pub(crate) struct LiveScan {
    pub(crate) phase: LivePhase,
    pub(crate) done: watch::Receiver<Option<ScanStatus>>,
    pub(crate) operator_stop: Arc<AtomicBool>,
    pub(crate) stall_reported: bool,
}

pub(crate) enum LivePhase {
    /// 실행 슬롯 대기 중
    Waiting(CancellationToken),
    /// 스캐너 프로세스 실행 중
    Running(StopHandle),
}

pub(crate) struct Inner<S> {
    pub(crate) store: S,
    pub(crate) supervisor: ProcessSupervisor,
    pub(crate) feed: Arc<FeedRegistry>,
    pub(crate) publisher: Option<PublisherHandle>,
    pub(crate) settings: ControllerSettings,
    pub(crate) locks: ScanLocks,
    pub(crate) live: Mutex<HashMap<ScanId, LiveScan>>,
    /// 저장하지 못한 최종 상태. 다음 조회 시 다시 기록합니다.
    pub(crate) lost: Mutex<HashMap<ScanId, (ScanStatus, Option<String>)>>,
    pub(crate) degraded: RwLock<Option<String>>,
    pub(crate) shutting_down: AtomicBool,
}

/// 스캔 컨트롤러
///
/// `Clone`은 같은 컨트롤러를 공유합니다.
///
/// # 사용 예시
///
/// ```ignore
/// let controller = ScanController::builder(store, supervisor, feed)
///     .publisher(publisher.handle())
///     .settings(ControllerSettings::from_config(&config.controller))
///     .build();
///
/// let id = controller.create_scan(targets, options).await?;
/// controller.start_scan(id).await?;
/// ```
pub struct ScanController<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for ScanController<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// [`ScanController`] 빌더
pub struct ScanControllerBuilder<S> {
    store: S,
    supervisor: ProcessSupervisor,
    feed: Arc<FeedRegistry>,
    publisher: Option<PublisherHandle>,
    settings: ControllerSettings,
}

impl<S: StateStore> ScanControllerBuilder<S> {
    /// 결과 발행 핸들을 설정합니다. 설정하지 않으면 발행하지 않습니다.
    pub fn publisher(mut self, publisher: PublisherHandle) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// 컨트롤러 설정을 지정합니다.
    pub fn settings(mut self, settings: ControllerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 컨트롤러를 생성합니다.
    pub fn build(self) -> ScanController<S> {
        ScanController {
            inner: Arc::new(Inner {
                store: self.store,
                supervisor: self.supervisor,
                feed: self.feed,
                publisher: self.publisher,
                settings: self.settings,
                locks: ScanLocks::new(),
                live: Mutex::new(HashMap::new()),
                lost: Mutex::new(HashMap::new()),
                degraded: RwLock::new(None),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }
}

impl<S: StateStore> ScanController<S> {
    /// 빌더를 생성합니다.
    pub fn builder(
        store: S,
        supervisor: ProcessSupervisor,
        feed: Arc<FeedRegistry>,
    ) -> ScanControllerBuilder<S> {
        ScanControllerBuilder {
            store,
            supervisor,
            feed,
            publisher: None,
            settings: ControllerSettings::default(),
        }
    }

    /// 상태 저장소
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// 피드 레지스트리
    pub fn feed(&self) -> &Arc<FeedRegistry> {
        &self.inner.feed
    }

    /// 새 스캔을 QUEUED 상태로 생성합니다.
    ///
    /// 대상과 옵션은 저장 전에 검증되며, 실패 시 아무것도 저장하지 않습니다.
    pub async fn create_scan(
        &self,
        targets: Vec<String>,
        options: ScanOptions,
    ) -> Result<ScanId, ControllerError> {
        let targets = validate_targets(&targets)?;
        let options = validate_options(&options)?;

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let now = unix_now();
            let scan = Scan {
                id: ScanId::new(),
                targets: targets.clone(),
                options: options.clone(),
                status: ScanStatus::Queued,
                created_time: now,
                start_time: None,
                end_time: None,
                progress: 0,
                host_progress: Vec::new(),
                error: None,
                last_update: now,
                stalled: false,
            };
            match self.inner.store.create_scan(&scan).await {
                Ok(()) => {
                    metrics::counter!(m::CONTROLLER_SCANS_CREATED_TOTAL).increment(1);
                    info!(scan_id = %scan.id, targets = scan.targets.len(), "scan created");
                    return Ok(scan.id);
                }
                Err(StoreError::IdCollision(id)) => {
                    warn!(scan_id = %id, attempt, "scan id collision, generating a new id");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ControllerError::Internal(format!(
            "could not allocate a unique scan id after {MAX_ID_ATTEMPTS} attempts"
        )))
    }

    /// 스캔을 생성하고 바로 시작합니다.
    ///
    /// 피드가 거부된 상태이면 아무것도 저장하지 않고 실패합니다.
    pub async fn create_and_start(
        &self,
        targets: Vec<String>,
        options: ScanOptions,
    ) -> Result<(ScanId, ScanStatus), ControllerError> {
        if let FeedState::Refused(reason) = &self.inner.feed.snapshot().await.state {
            return Err(ControllerError::IntegrityFailure(reason.clone()));
        }
        let id = self.create_scan(targets, options).await?;
        let status = self.start_scan(id).await?;
        Ok((id, status))
    }

    /// QUEUED 스캔을 시작합니다.
    ///
    /// 슬롯이 있으면 즉시 RUNNING을, 없으면 QUEUED를 반환하고 슬롯이 날 때까지
    /// 선착순으로 대기합니다. 이미 시작 요청된 스캔에는 현재 상태를 반환합니다.
    pub async fn start_scan(&self, id: ScanId) -> Result<ScanStatus, ControllerError> {
        let inner = &self.inner;
        if inner.shutting_down.load(Ordering::SeqCst) {
            return Err(ControllerError::ResourceExhausted(
                "daemon is shutting down".to_owned(),
            ));
        }

        let _guard = inner.locks.lock(id).await;

        let feed = inner.feed.snapshot().await;
        if let FeedState::Refused(reason) = &feed.state {
            return Err(ControllerError::IntegrityFailure(reason.clone()));
        }

        let scan = inner.store.get_scan(id).await?;
        if inner.live.lock().await.contains_key(&id) {
            return Ok(scan.status);
        }
        if scan.status != ScanStatus::Queued {
            return Err(ControllerError::InvalidTransition {
                id,
                from: scan.status,
                to: ScanStatus::Running,
            });
        }

        let gate = inner.supervisor.gate().clone();
        let slot = gate.try_acquire()?;

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(None);
        inner.live.lock().await.insert(
            id,
            LiveScan {
                phase: LivePhase::Waiting(cancel.clone()),
                done: done_rx,
                operator_stop: Arc::new(AtomicBool::new(false)),
                stall_reported: false,
            },
        );

        match slot {
            Some(slot) => inner.launch(scan, slot, done_tx).await,
            None => {
                metrics::gauge!(m::CONTROLLER_SCANS_QUEUED).increment(1.0);
                info!(scan_id = %id, ceiling = gate.ceiling(), "no free slot, scan waits in queue");

                let inner = Arc::clone(inner);
                tokio::spawn(async move {
                    let acquired = tokio::select! {
                        _ = cancel.cancelled() => None,
                        slot = gate.acquire() => Some(slot),
                    };
                    metrics::gauge!(m::CONTROLLER_SCANS_QUEUED).decrement(1.0);

                    let slot = match acquired {
                        None => {
                            debug!(scan_id = %id, "queued scan cancelled before a slot freed up");
                            return;
                        }
                        Some(Err(e)) => {
                            error!(scan_id = %id, error = %e, "slot acquisition failed");
                            inner.live.lock().await.remove(&id);
                            return;
                        }
                        Some(Ok(slot)) => slot,
                    };

                    let _guard = inner.locks.lock(id).await;
                    if cancel.is_cancelled() {
                        return;
                    }
                    let scan = match inner.store.get_scan(id).await {
                        Ok(scan) => scan,
                        Err(e) => {
                            error!(scan_id = %id, error = %e, "queued scan could not be read, leaving it queued");
                            inner.live.lock().await.remove(&id);
                            return;
                        }
                    };
                    if let Err(e) = inner.launch(scan, slot, done_tx).await {
                        warn!(scan_id = %id, error = %e, "queued scan failed to launch");
                    }
                });
                Ok(ScanStatus::Queued)
            }
        }
    }

    /// 스캔을 중지합니다.
    ///
    /// 실행 중이면 스캐너 종료가 확인될 때까지 기다리며, 확인되면 STOPPED를 반환합니다.
    /// 이미 종료된 스캔에는 현재 상태를 그대로 반환합니다.
    pub async fn stop_scan(&self, id: ScanId) -> Result<ScanStatus, ControllerError> {
        let inner = &self.inner;
        let mut done = {
            let _guard = inner.locks.lock(id).await;
            let scan = inner.store.get_scan(id).await?;
            if scan.status.is_terminal() {
                return Ok(scan.status);
            }

            let mut live = inner.live.lock().await;
            match live.get_mut(&id) {
                Some(entry) => match &entry.phase {
                    LivePhase::Running(stopper) => {
                        entry.operator_stop.store(true, Ordering::SeqCst);
                        stopper.stop();
                        info!(scan_id = %id, "stop requested");
                        entry.done.clone()
                    }
                    LivePhase::Waiting(cancel) => {
                        cancel.cancel();
                        live.remove(&id);
                        drop(live);
                        inner
                            .finish(id, ScanStatus::Stopped, Some(STOPPED_BY_OPERATOR.to_owned()), None)
                            .await?;
                        return Ok(ScanStatus::Stopped);
                    }
                },
                None => {
                    drop(live);
                    return match scan.status {
                        ScanStatus::Queued => {
                            inner
                                .finish(id, ScanStatus::Stopped, Some(STOPPED_BY_OPERATOR.to_owned()), None)
                                .await?;
                            Ok(ScanStatus::Stopped)
                        }
                        _ => Ok(inner.settle_orphan_locked(scan).await?.status),
                    };
                }
            }
        };

        let bound = inner.supervisor.settings().stop_grace + inner.settings.stop_timeout;
        match tokio::time::timeout(bound, done.wait_for(Option::is_some)).await {
            Ok(Ok(status)) => Ok((*status).unwrap_or(ScanStatus::Stopped)),
            Ok(Err(_)) => Err(ControllerError::StoreUnavailable(format!(
                "final status of scan {id} could not be persisted"
            ))),
            Err(_) => Err(ControllerError::ProcessFailure(format!(
                "termination of scan {id} not confirmed within {}s",
                bound.as_secs()
            ))),
        }
    }

    /// 스캔 스냅샷을 반환합니다.
    ///
    /// 저장소에 RUNNING으로 남아 있지만 이 데몬이 실행하지 않는 스캔은
    /// 조회 시점에 INTERRUPTED로 정리됩니다.
    pub async fn get_scan_status(&self, id: ScanId) -> Result<Scan, ControllerError> {
        let inner = &self.inner;
        let mut scan = inner.store.get_scan(id).await?;
        if scan.status == ScanStatus::Running && !inner.is_live(id).await {
            scan = inner.settle_orphan(scan).await?;
        }
        if !scan.host_progress.is_empty() {
            scan.progress = overall_progress(&scan.host_progress);
        }
        scan.stalled = inner.check_stalled(&scan).await;
        Ok(scan)
    }

    /// `since` 인덱스 이후의 결과를 추가 순서대로 반환합니다.
    pub async fn get_results(
        &self,
        id: ScanId,
        since: usize,
    ) -> Result<Vec<ScanResult>, ControllerError> {
        self.inner.store.get_scan(id).await?;
        Ok(self.inner.store.list_results(id, since).await?)
    }

    /// 모든 스캔 스냅샷을 생성 시각 순으로 반환합니다.
    pub async fn list_scans(&self) -> Result<Vec<Scan>, ControllerError> {
        let ids = self.inner.store.list_scan_ids().await?;
        let mut scans = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_scan_status(id).await {
                Ok(scan) => scans.push(scan),
                Err(ControllerError::ScanNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        scans.sort_by_key(|s| (s.created_time, s.id));
        Ok(scans)
    }

    /// 종료된 스캔과 결과를 삭제합니다.
    pub async fn delete_scan(&self, id: ScanId) -> Result<(), ControllerError> {
        let inner = &self.inner;
        {
            let _guard = inner.locks.lock(id).await;
            let scan = inner.store.get_scan(id).await?;
            if !scan.status.is_terminal() {
                return Err(ControllerError::ScanActive {
                    id,
                    status: scan.status,
                });
            }
            inner.store.delete(id).await?;
            inner.lost.lock().await.remove(&id);
        }
        inner.locks.forget(id).await;
        info!(scan_id = %id, "scan deleted");
        Ok(())
    }

    /// 기동 시 저장소를 점검합니다.
    ///
    /// 이전 프로세스에서 RUNNING이던 스캔은 INTERRUPTED로 전이합니다.
    pub async fn reconcile_on_startup(&self) -> Result<ReconcileReport, ControllerError> {
        let inner = &self.inner;
        let mut report = ReconcileReport::default();
        for id in inner.store.list_scan_ids().await? {
            let scan = match inner.store.get_scan(id).await {
                Ok(scan) => scan,
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            match scan.status {
                ScanStatus::Running if !inner.is_live(id).await => {
                    inner.settle_orphan(scan).await?;
                    report.interrupted.push(id);
                }
                ScanStatus::Queued => report.queued.push(id),
                _ => {}
            }
        }
        info!(
            interrupted = report.interrupted.len(),
            queued = report.queued.len(),
            "state store reconciled"
        );
        Ok(report)
    }

    /// 피드를 다시 로드합니다.
    pub async fn reload_feed(&self) -> Result<Arc<FeedSnapshot>, ControllerError> {
        self.inner
            .feed
            .reload()
            .await
            .map_err(|e| ControllerError::IntegrityFailure(e.to_string()))
    }

    /// 스캐너 정보를 반환합니다.
    pub async fn scanner_details(&self) -> ScannerDetails {
        let inner = &self.inner;
        let feed = inner.feed.snapshot().await;
        let gate = inner.supervisor.gate();
        ScannerDetails {
            name: SCANNER_NAME,
            version: env!("CARGO_PKG_VERSION"),
            description: "Vulnerability scanner orchestration daemon",
            params: SCANNER_PARAMS.to_vec(),
            max_concurrent_scans: gate.ceiling(),
            running_scans: gate.in_use(),
            feed: FeedSummary {
                state: feed.state.clone(),
                policy: inner.feed.policy().as_str(),
                vts: feed.index.len(),
                files_rejected: feed.report.files_rejected,
                loaded_at: feed.loaded_at,
            },
        }
    }

    /// 피드의 VT 정의를 조회합니다.
    ///
    /// fail-closed로 거부된 피드에서는 아무것도 반환하지 않고 에러를 냅니다.
    pub async fn get_vts(&self, filter: &VtFilter) -> Result<Vec<VtDescriptor>, ControllerError> {
        let feed = self.inner.feed.snapshot().await;
        if let FeedState::Refused(reason) = &feed.state {
            return Err(ControllerError::IntegrityFailure(reason.clone()));
        }
        let vts = match (&filter.oid, &filter.family) {
            (Some(oid), family) => feed
                .index
                .get(oid)
                .filter(|vt| family.as_deref().is_none_or(|f| vt.family == f))
                .cloned()
                .into_iter()
                .collect(),
            (None, Some(family)) => feed.index.by_family(family).cloned().collect(),
            (None, None) => feed.index.iter().cloned().collect(),
        };
        Ok(vts)
    }

    /// 컨트롤러 상태를 점검합니다.
    pub async fn health(&self) -> HealthStatus {
        let inner = &self.inner;
        if let Err(e) = inner.store.ping().await {
            return HealthStatus::Unhealthy(format!("state store: {e}"));
        }
        if let FeedState::Refused(reason) = &inner.feed.snapshot().await.state {
            return HealthStatus::Degraded(format!("feed refused: {reason}"));
        }
        if let Some(reason) = inner.degraded.read().await.clone() {
            return HealthStatus::Degraded(reason);
        }
        HealthStatus::Healthy
    }

    /// 실행 중이거나 대기 중인 스캔 수
    pub async fn active_scans(&self) -> usize {
        self.inner.live.lock().await.len()
    }

    /// 데몬 종료를 위해 모든 스캔을 정리합니다.
    ///
    /// 대기 중인 스캔은 QUEUED로 남기고, 실행 중인 스캔은 중지 후 INTERRUPTED로 기록합니다.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.shutting_down.store(true, Ordering::SeqCst);

        let mut waiting = Vec::new();
        {
            let mut live = inner.live.lock().await;
            live.retain(|id, entry| match &entry.phase {
                LivePhase::Waiting(cancel) => {
                    cancel.cancel();
                    debug!(scan_id = %id, "queued scan left in queue for next start");
                    false
                }
                LivePhase::Running(stopper) => {
                    stopper.stop();
                    waiting.push((*id, entry.done.clone()));
                    true
                }
            });
        }
        if waiting.is_empty() {
            return;
        }

        info!(running = waiting.len(), "stopping running scans");
        let bound = inner.supervisor.settings().stop_grace + inner.settings.stop_timeout;
        for (id, mut done) in waiting {
            if tokio::time::timeout(bound, done.wait_for(Option::is_some))
                .await
                .is_err()
            {
                warn!(scan_id = %id, "scan did not finish before shutdown deadline");
            }
        }
    }
}

impl<S: StateStore> Inner<S> {
    pub(crate) async fn is_live(&self, id: ScanId) -> bool {
        self.live.lock().await.contains_key(&id)
    }

    /// 슬롯을 얻은 스캔을 RUNNING으로 전이하고 스캐너를 실행합니다.
    ///
    /// 스캐너 실행에 실패하면 INTERRUPTED를 저장하고 그 상태를 반환합니다.
    /// 호출자는 스캔 잠금을 보유해야 합니다.
    async fn launch(
        self: &Arc<Self>,
        scan: Scan,
        slot: Slot,
        done_tx: watch::Sender<Option<ScanStatus>>,
    ) -> Result<ScanStatus, ControllerError> {
        let id = scan.id;
        let started_at = unix_now();
        if let Err(e) = self
            .store
            .transition(id, Transition::to(ScanStatus::Running, started_at))
            .await
        {
            self.live.lock().await.remove(&id);
            return Err(e.into());
        }

        let handle = match self
            .supervisor
            .spawn(slot, id, scan.targets, scan.options)
        {
            Ok(handle) => handle,
            Err(e) => {
                let reason = format!("failed to start scanner: {e}");
                error!(scan_id = %id, error = %e, "scanner could not be started");
                self.live.lock().await.remove(&id);
                let finished = self
                    .finish(id, ScanStatus::Interrupted, Some(reason), Some(started_at))
                    .await;
                done_tx.send_replace(Some(ScanStatus::Interrupted));
                finished?;
                return Ok(ScanStatus::Interrupted);
            }
        };

        let operator_stop = {
            let mut live = self.live.lock().await;
            match live.get_mut(&id) {
                Some(entry) => {
                    entry.phase = LivePhase::Running(handle.stopper.clone());
                    Arc::clone(&entry.operator_stop)
                }
                None => {
                    handle.stopper.stop();
                    Arc::new(AtomicBool::new(true))
                }
            }
        };
        info!(scan_id = %id, pid = handle.pid, "scan running");

        let driver = ScanDriver::new(Arc::clone(self), id, started_at, done_tx, operator_stop);
        tokio::spawn(driver.run(handle.events));
        Ok(ScanStatus::Running)
    }

    /// 종료 상태로 전이하고 발행/메트릭을 처리합니다.
    pub(crate) async fn finish(
        &self,
        id: ScanId,
        status: ScanStatus,
        error: Option<String>,
        started_at: Option<u64>,
    ) -> Result<(), ControllerError> {
        let at = unix_now();
        let transition = match &error {
            Some(reason) => Transition::with_error(status, at, reason.clone()),
            None => Transition::to(status, at),
        };
        self.store.transition(id, transition).await?;

        metrics::counter!(m::CONTROLLER_SCANS_TERMINAL_TOTAL, m::LABEL_STATUS => status.as_str())
            .increment(1);
        if let Some(started_at) = started_at {
            metrics::histogram!(m::CONTROLLER_SCAN_DURATION_SECONDS)
                .record(at.saturating_sub(started_at) as f64);
        }
        match &error {
            Some(reason) => info!(scan_id = %id, status = %status, reason = %reason, "scan ended"),
            None => info!(scan_id = %id, status = %status, "scan ended"),
        }
        if let Some(publisher) = &self.publisher {
            publisher.publish_status(id, status, error);
        }
        Ok(())
    }

    /// 드라이버가 결정한 최종 상태를 기록하고 대기자를 깨웁니다.
    pub(crate) async fn complete(
        &self,
        id: ScanId,
        status: ScanStatus,
        error: Option<String>,
        started_at: u64,
        done_tx: watch::Sender<Option<ScanStatus>>,
    ) {
        let _guard = self.locks.lock(id).await;
        let outcome = self.finish(id, status, error.clone(), Some(started_at)).await;
        self.live.lock().await.remove(&id);
        match outcome {
            Ok(()) => {
                done_tx.send_replace(Some(status));
            }
            Err(ControllerError::InvalidTransition { from, .. }) => {
                debug!(scan_id = %id, current = %from, "scan already settled");
                done_tx.send_replace(Some(from));
            }
            Err(e) => {
                error!(scan_id = %id, status = %status, error = %e, "final scan status could not be persisted");
                self.mark_degraded(format!("final status of scan {id} not persisted: {e}"))
                    .await;
                self.lost.lock().await.insert(id, (status, error));
            }
        }
    }

    /// 실행 주체가 없는 RUNNING 스캔을 종료 상태로 정리합니다.
    async fn settle_orphan(&self, scan: Scan) -> Result<Scan, ControllerError> {
        let _guard = self.locks.lock(scan.id).await;
        let current = self.store.get_scan(scan.id).await?;
        if current.status != ScanStatus::Running || self.is_live(scan.id).await {
            return Ok(current);
        }
        self.settle_orphan_locked(current).await
    }

    /// [`Self::settle_orphan`]과 같으나 호출자가 스캔 잠금을 보유합니다.
    async fn settle_orphan_locked(&self, current: Scan) -> Result<Scan, ControllerError> {
        let id = current.id;
        let recorded = self.lost.lock().await.remove(&id);
        let (status, error) = recorded
            .clone()
            .unwrap_or((ScanStatus::Interrupted, Some(DAEMON_RESTARTED.to_owned())));
        if let Err(e) = self.finish(id, status, error, current.start_time).await {
            if let Some(recorded) = recorded {
                self.lost.lock().await.insert(id, recorded);
            }
            return Err(e);
        }
        warn!(scan_id = %id, status = %status, "orphaned running scan settled");
        Ok(self.store.get_scan(id).await?)
    }

    async fn check_stalled(&self, scan: &Scan) -> bool {
        let stalled = scan.status == ScanStatus::Running
            && unix_now().saturating_sub(scan.last_update) >= self.settings.stall_window.as_secs();

        let mut live = self.live.lock().await;
        if let Some(entry) = live.get_mut(&scan.id) {
            if stalled && !entry.stall_reported {
                warn!(
                    scan_id = %scan.id,
                    last_update = scan.last_update,
                    "no progress reported within stall window"
                );
                metrics::counter!(m::CONTROLLER_STALLED_TOTAL).increment(1);
            }
            entry.stall_reported = stalled;
        }
        stalled
    }

    pub(crate) async fn mark_degraded(&self, reason: String) {
        *self.degraded.write().await = Some(reason);
    }

    pub(crate) async fn clear_degraded(&self) {
        let mut degraded = self.degraded.write().await;
        if degraded.is_some() && self.lost.lock().await.is_empty() {
            info!("state store writes recovered");
            *degraded = None;
        }
    }
}
