//! 재시도 정책 및 재시도 래퍼
//!
//! 일시적 에러(`StoreError::Unavailable`, `StoreError::Refused`)만 선형 백오프로
//! 재시도합니다. 재시도를 모두 소진하면 `Unavailable`로 표면화되며, 호출자는 결과를
//! 버리지 않고 상위로 전달해야 합니다.
//!
//! 결과 추가는 멱등이 아니므로 요청이 전달되지 않았음이 확실한 `Refused`만
//! 재시도합니다. 타임아웃이나 연결 끊김은 적용 여부를 알 수 없어 바로 표면화됩니다.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use ironscan_core::config::StoreConfig;
use ironscan_core::metrics as m;
use ironscan_core::types::{Scan, ScanId, ScanResult, ScanStatus};

use crate::error::StoreError;
use crate::store::{ScanField, StateStore, Transition};

/// 재시도 정책
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 최대 재시도 횟수 (최초 시도 제외)
    pub max_retries: u32,
    /// 백오프 기본 간격 (시도 횟수에 비례)
    pub backoff_base: Duration,
    /// 시도당 제한 시간
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(200),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// 설정에서 정책을 생성합니다.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            ..Self::default()
        }
    }

    /// 재시도 없이 한 번만 시도하는 정책
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// 연산을 정책에 따라 실행합니다.
    pub async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.run_with(op, true, f).await
    }

    /// 멱등이 아닌 연산을 실행합니다.
    ///
    /// 요청이 전달되지 않은 `Refused`만 재시도하고, 적용 여부를 알 수 없는
    /// 타임아웃과 `Unavailable`은 재시도 없이 반환합니다.
    pub async fn run_at_most_once<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.run_with(op, false, f).await
    }

    async fn run_with<T, F, Fut>(
        &self,
        op: &'static str,
        replayable: bool,
        mut f: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.backoff_base * attempt;
                warn!(
                    op,
                    attempt,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    "retrying store operation"
                );
                metrics::counter!(m::STORE_RETRIES_TOTAL).increment(1);
                tokio::time::sleep(backoff).await;
            }

            match tokio::time::timeout(self.attempt_timeout, f()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if e.is_unsent() || (replayable && e.is_transient()) => {
                    last_error = Some(e)
                }
                Ok(Err(e)) => return Err(e),
                Err(_elapsed) if replayable => {
                    last_error = Some(StoreError::Unavailable("operation timed out".to_owned()))
                }
                Err(_elapsed) => {
                    metrics::counter!(m::STORE_FAILURES_TOTAL).increment(1);
                    return Err(StoreError::Unavailable(format!(
                        "{op}: operation timed out, outcome unknown"
                    )));
                }
            }
        }

        metrics::counter!(m::STORE_FAILURES_TOTAL).increment(1);
        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_owned());
        Err(StoreError::Unavailable(format!(
            "{op}: retries exhausted after {} attempts: {reason}",
            self.max_retries + 1
        )))
    }
}

/// 모든 연산에 [`RetryPolicy`]를 적용하는 저장소 래퍼
#[derive(Debug, Clone)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: StateStore> RetryingStore<S> {
    /// 래퍼를 생성합니다.
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// 내부 저장소
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: StateStore> StateStore for RetryingStore<S> {
    async fn create_scan(&self, scan: &Scan) -> Result<(), StoreError> {
        let mut attempts = 0u32;
        let outcome = self
            .policy
            .run("create_scan", || {
                attempts += 1;
                self.inner.create_scan(scan)
            })
            .await;
        match outcome {
            // 앞선 시도가 적용된 뒤 타임아웃되었을 수 있습니다.
            Err(StoreError::IdCollision(id)) if attempts > 1 => {
                let stored = self.get_scan(id).await?;
                if stored.created_time == scan.created_time && stored.targets == scan.targets {
                    debug!(scan_id = %id, "create_scan replay matched the stored record");
                    Ok(())
                } else {
                    Err(StoreError::IdCollision(id))
                }
            }
            other => other,
        }
    }

    async fn put_field(&self, id: ScanId, field: ScanField) -> Result<(), StoreError> {
        self.policy
            .run("put_field", || self.inner.put_field(id, field.clone()))
            .await
    }

    async fn transition(&self, id: ScanId, transition: Transition) -> Result<ScanStatus, StoreError> {
        self.policy
            .run("transition", || self.inner.transition(id, transition.clone()))
            .await
    }

    async fn put_host_progress(
        &self,
        id: ScanId,
        host: &str,
        percent: u8,
        at: u64,
    ) -> Result<(), StoreError> {
        self.policy
            .run("put_host_progress", || {
                self.inner.put_host_progress(id, host, percent, at)
            })
            .await
    }

    async fn append_result(&self, id: ScanId, result: &ScanResult) -> Result<usize, StoreError> {
        self.policy
            .run_at_most_once("append_result", || self.inner.append_result(id, result))
            .await
    }

    async fn get_scan(&self, id: ScanId) -> Result<Scan, StoreError> {
        self.policy.run("get_scan", || self.inner.get_scan(id)).await
    }

    async fn list_results(&self, id: ScanId, since: usize) -> Result<Vec<ScanResult>, StoreError> {
        self.policy
            .run("list_results", || self.inner.list_results(id, since))
            .await
    }

    async fn delete(&self, id: ScanId) -> Result<(), StoreError> {
        self.policy.run("delete", || self.inner.delete(id)).await
    }

    async fn list_scan_ids(&self) -> Result<Vec<ScanId>, StoreError> {
        self.policy
            .run("list_scan_ids", || self.inner.list_scan_ids())
            .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.policy.run("ping", || self.inner.ping()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStateStore;
    use ironscan_core::types::{ResultType, Severity};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// 첫 쓰기를 적용한 뒤 응답 없이 멈추는 저장소
    #[derive(Clone, Default)]
    struct StallAfterFirstWrite {
        inner: MemoryStateStore,
        stalled: Arc<AtomicBool>,
    }

    impl StallAfterFirstWrite {
        async fn stall_once(&self) {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        }
    }

    impl StateStore for StallAfterFirstWrite {
        async fn create_scan(&self, scan: &Scan) -> Result<(), StoreError> {
            self.inner.create_scan(scan).await?;
            self.stall_once().await;
            Ok(())
        }

        async fn put_field(&self, id: ScanId, field: ScanField) -> Result<(), StoreError> {
            self.inner.put_field(id, field).await
        }

        async fn transition(
            &self,
            id: ScanId,
            transition: Transition,
        ) -> Result<ScanStatus, StoreError> {
            self.inner.transition(id, transition).await
        }

        async fn put_host_progress(
            &self,
            id: ScanId,
            host: &str,
            percent: u8,
            at: u64,
        ) -> Result<(), StoreError> {
            self.inner.put_host_progress(id, host, percent, at).await
        }

        async fn append_result(&self, id: ScanId, result: &ScanResult) -> Result<usize, StoreError> {
            let len = self.inner.append_result(id, result).await?;
            self.stall_once().await;
            Ok(len)
        }

        async fn get_scan(&self, id: ScanId) -> Result<Scan, StoreError> {
            self.inner.get_scan(id).await
        }

        async fn list_results(&self, id: ScanId, since: usize) -> Result<Vec<ScanResult>, StoreError> {
            self.inner.list_results(id, since).await
        }

        async fn delete(&self, id: ScanId) -> Result<(), StoreError> {
            self.inner.delete(id).await
        }

        async fn list_scan_ids(&self) -> Result<Vec<ScanId>, StoreError> {
            self.inner.list_scan_ids().await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
    }

    fn queued_scan() -> Scan {
        Scan {
            id: ScanId::new(),
            targets: vec!["10.0.0.1".to_owned()],
            options: Default::default(),
            status: ScanStatus::Queued,
            created_time: 100,
            start_time: None,
            end_time: None,
            progress: 0,
            host_progress: Vec::new(),
            error: None,
            last_update: 100,
            stalled: false,
        }
    }

    fn alarm() -> ScanResult {
        ScanResult {
            host: "10.0.0.1".to_owned(),
            port: None,
            vt_oid: "1.3.6.1.4.1.25623.1.0.1".to_owned(),
            severity: Severity::Low,
            description: String::new(),
            result_type: ResultType::Alarm,
            timestamp: 200,
        }
    }

    fn timing_out_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_base: Duration::from_millis(1),
            attempt_timeout: Duration::from_millis(50),
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_base: Duration::from_millis(1),
            attempt_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = fast_policy(3)
            .run("test", || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(StoreError::Unavailable("down".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let id = ScanId::new();
        let result: Result<(), _> = fast_policy(3)
            .run("test", || {
                c.fetch_add(1, Ordering::SeqCst);
                async move { Err(StoreError::NotFound(id)) }
            })
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_unavailable() {
        let result: Result<(), _> = fast_policy(2)
            .run("append_result", || async {
                Err(StoreError::Unavailable("connection refused".into()))
            })
            .await;
        let err = result.unwrap_err();
        assert!(err.is_transient());
        let msg = err.to_string();
        assert!(msg.contains("append_result"));
        assert!(msg.contains("3 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out() {
        let policy = RetryPolicy {
            max_retries: 0,
            backoff_base: Duration::from_millis(1),
            attempt_timeout: Duration::from_millis(50),
        };
        let result: Result<(), _> = policy
            .run("slow", || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_append_is_not_replayed() {
        let backend = StallAfterFirstWrite::default();
        let store = RetryingStore::new(backend.clone(), timing_out_policy());
        let scan = queued_scan();
        backend.inner.create_scan(&scan).await.unwrap();

        let err = store.append_result(scan.id, &alarm()).await.unwrap_err();
        assert!(err.to_string().contains("outcome unknown"));
        assert_eq!(backend.inner.list_results(scan.id, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refused_append_is_retried() {
        let memory = MemoryStateStore::new();
        let store = RetryingStore::new(memory.clone(), fast_policy(3));
        let scan = queued_scan();
        memory.create_scan(&scan).await.unwrap();

        memory.fail_next(2);
        assert_eq!(store.append_result(scan.id, &alarm()).await.unwrap(), 1);
        assert_eq!(memory.list_results(scan.id, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropped_append_is_surfaced_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<usize, _> = fast_policy(3)
            .run_at_most_once("append_result", || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(StoreError::Unavailable("connection reset".into())) }
            })
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn replayed_create_after_timeout_succeeds_once() {
        let backend = StallAfterFirstWrite::default();
        let store = RetryingStore::new(backend.clone(), timing_out_policy());
        let scan = queued_scan();

        store.create_scan(&scan).await.unwrap();
        assert_eq!(backend.inner.list_scan_ids().await.unwrap(), vec![scan.id]);

        let err = store.create_scan(&scan).await.unwrap_err();
        assert!(matches!(err, StoreError::IdCollision(id) if id == scan.id));
    }

    #[tokio::test]
    async fn retrying_store_rides_out_injected_failures() {
        let memory = MemoryStateStore::new();
        let store = RetryingStore::new(memory.clone(), fast_policy(3));
        memory.fail_next(2);
        store.ping().await.unwrap();
    }
}
