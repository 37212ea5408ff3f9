//! 배치 결과 발행자
//!
//! 쓰기 경로(상태 저장소에 결과 저장)를 막지 않도록 발행 요청은 제한된 큐에
//! `try_send`로 넣습니다. 큐가 가득 차면 해당 메시지를 드롭하고 카운트합니다.
//!
//! 백그라운드 태스크는 스캔별로 `batch_window` 동안 결과를 모았다가
//! `{topic_prefix}/{scan_id}/results` 토픽에 한 메시지로 발행합니다.
//! 종료 상태 변경은 `{topic_prefix}/{scan_id}/status` 토픽에 발행합니다.
//! 발행 실패는 로그를 남기고 드롭하며 재시도하지 않습니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ironscan_core::config::PublisherConfig;
use ironscan_core::error::{IronscanError, PipelineError};
use ironscan_core::event::{ResultBatchEvent, StatusEvent};
use ironscan_core::metrics as m;
use ironscan_core::pipeline::{HealthStatus, Pipeline};
use ironscan_core::types::{ScanId, ScanResult, ScanStatus};

use crate::bus::MessageBus;
use crate::error::PublisherError;

/// 발행 1건당 최대 대기 시간
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);

/// 발행 요청
#[derive(Debug, Clone, PartialEq)]
pub enum PublishRequest {
    /// 새 결과
    Result {
        /// 스캔 ID
        scan_id: ScanId,
        /// 결과
        result: ScanResult,
    },
    /// 상태 변경
    Status {
        /// 스캔 ID
        scan_id: ScanId,
        /// 새 상태
        status: ScanStatus,
        /// 에러 상세
        error: Option<String>,
    },
}

/// 토픽 이름 규칙
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    /// 새 규칙을 생성합니다.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// 결과 토픽
    pub fn results(&self, scan_id: ScanId) -> String {
        format!("{}/{}/results", self.prefix, scan_id)
    }

    /// 상태 토픽
    pub fn status(&self, scan_id: ScanId) -> String {
        format!("{}/{}/status", self.prefix, scan_id)
    }
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    dropped: AtomicU64,
}

/// 발행 요청을 넣는 핸들
///
/// 복제해서 여러 곳에서 사용할 수 있으며, 어떤 메서드도 대기하지 않습니다.
#[derive(Debug, Clone)]
pub struct PublisherHandle {
    tx: mpsc::Sender<PublishRequest>,
    counters: Arc<Counters>,
}

impl PublisherHandle {
    /// 결과 발행을 요청합니다.
    pub fn publish(&self, scan_id: ScanId, result: ScanResult) {
        self.enqueue(PublishRequest::Result { scan_id, result });
    }

    /// 상태 변경 발행을 요청합니다.
    pub fn publish_status(&self, scan_id: ScanId, status: ScanStatus, error: Option<String>) {
        self.enqueue(PublishRequest::Status {
            scan_id,
            status,
            error,
        });
    }

    /// 발행된 메시지 수
    pub fn published(&self) -> u64 {
        self.counters.published.load(Ordering::Relaxed)
    }

    /// 드롭된 요청 수
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    fn enqueue(&self, request: PublishRequest) {
        if let Err(e) = self.tx.try_send(request) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(m::PUBLISHER_DROPPED_TOTAL).increment(1);
            debug!(error = %e, "publish queue unavailable, dropping message");
        }
    }
}

/// 발행자 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PublisherState {
    Initialized,
    Running,
    Stopped,
}

/// 배치 결과 발행자
pub struct ResultPublisher<B: MessageBus> {
    bus: Arc<B>,
    topics: Topics,
    batch_window: Duration,
    rx: Option<mpsc::Receiver<PublishRequest>>,
    handle: PublisherHandle,
    state: PublisherState,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<B: MessageBus> ResultPublisher<B> {
    /// 발행자와 요청 핸들을 생성합니다.
    pub fn new(bus: B, config: &PublisherConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            bus: Arc::new(bus),
            topics: Topics::new(config.topic_prefix.clone()),
            batch_window: Duration::from_millis(config.batch_window_ms.max(1)),
            rx: Some(rx),
            handle: PublisherHandle {
                tx,
                counters: Arc::new(Counters::default()),
            },
            state: PublisherState::Initialized,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// 요청 핸들
    pub fn handle(&self) -> PublisherHandle {
        self.handle.clone()
    }

    /// 버스 참조
    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<B: MessageBus> Pipeline for ResultPublisher<B> {
    async fn start(&mut self) -> Result<(), IronscanError> {
        if self.state == PublisherState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let rx = self
            .rx
            .take()
            .ok_or_else(|| PipelineError::InitFailed("publisher cannot be restarted".to_owned()))?;

        let worker = BatchWorker {
            bus: Arc::clone(&self.bus),
            topics: self.topics.clone(),
            counters: Arc::clone(&self.handle.counters),
            pending: HashMap::new(),
        };
        let window = self.batch_window;
        let cancel = self.cancel.clone();
        self.tasks
            .push(tokio::spawn(async move { worker.run(rx, window, cancel).await }));

        self.state = PublisherState::Running;
        info!(bus = self.bus.name(), window_ms = window.as_millis() as u64, "result publisher started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), IronscanError> {
        if self.state != PublisherState::Running {
            return Err(PipelineError::NotRunning.into());
        }
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "publisher task ended abnormally");
            }
        }
        self.state = PublisherState::Stopped;
        info!(
            published = self.handle.published(),
            dropped = self.handle.dropped(),
            "result publisher stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PublisherState::Running => {
                let dropped = self.handle.dropped();
                if dropped > 0 {
                    HealthStatus::Degraded(format!("{dropped} messages dropped"))
                } else {
                    HealthStatus::Healthy
                }
            }
            PublisherState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PublisherState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

struct BatchWorker<B: MessageBus> {
    bus: Arc<B>,
    topics: Topics,
    counters: Arc<Counters>,
    pending: HashMap<ScanId, Vec<ScanResult>>,
}

impl<B: MessageBus> BatchWorker<B> {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<PublishRequest>,
        window: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(window);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    while let Ok(request) = rx.try_recv() {
                        self.accept(request).await;
                    }
                    self.flush_all().await;
                    break;
                }
                request = rx.recv() => match request {
                    Some(request) => self.accept(request).await,
                    None => {
                        self.flush_all().await;
                        break;
                    }
                },
                _ = ticker.tick() => self.flush_all().await,
            }
        }
        debug!("publisher worker exited");
    }

    async fn accept(&mut self, request: PublishRequest) {
        match request {
            PublishRequest::Result { scan_id, result } => {
                self.pending.entry(scan_id).or_default().push(result);
            }
            PublishRequest::Status {
                scan_id,
                status,
                error,
            } => {
                // 같은 스캔의 대기 중인 결과를 상태보다 먼저 발행
                self.flush(scan_id).await;
                let event = StatusEvent::new(scan_id, status, error);
                let topic = self.topics.status(scan_id);
                self.send(&topic, serde_json::to_vec(&event), 1).await;
            }
        }
    }

    async fn flush_all(&mut self) {
        let ids: Vec<ScanId> = self.pending.keys().copied().collect();
        for id in ids {
            self.flush(id).await;
        }
    }

    async fn flush(&mut self, scan_id: ScanId) {
        let Some(results) = self.pending.remove(&scan_id) else {
            return;
        };
        if results.is_empty() {
            return;
        }
        let count = results.len() as u64;
        let event = ResultBatchEvent::new(scan_id, results);
        let topic = self.topics.results(scan_id);
        self.send(&topic, serde_json::to_vec(&event), count).await;
    }

    async fn send(&self, topic: &str, payload: Result<Vec<u8>, serde_json::Error>, count: u64) {
        let outcome = match payload {
            Ok(payload) => {
                match tokio::time::timeout(PUBLISH_TIMEOUT, self.bus.publish(topic, payload)).await {
                    Ok(result) => result,
                    Err(_) => Err(PublisherError::Publish {
                        topic: topic.to_owned(),
                        reason: "timed out".to_owned(),
                    }),
                }
            }
            Err(e) => Err(PublisherError::Serialize(e.to_string())),
        };

        match outcome {
            Ok(()) => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::PUBLISHER_MESSAGES_TOTAL, m::LABEL_RESULT => "ok").increment(1);
            }
            Err(e) => {
                self.counters.dropped.fetch_add(count, Ordering::Relaxed);
                metrics::counter!(m::PUBLISHER_MESSAGES_TOTAL, m::LABEL_RESULT => "error").increment(1);
                metrics::counter!(m::PUBLISHER_DROPPED_TOTAL).increment(count);
                warn!(topic, error = %e, dropped = count, "publish failed, dropping message");
            }
        }
    }
}
