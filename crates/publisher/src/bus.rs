//! 메시지 버스 추상화
//!
//! 데몬은 발행만 하며 구독자를 두지 않습니다.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;

use crate::error::PublisherError;

/// 메시지 버스 trait
pub trait MessageBus: Send + Sync + 'static {
    /// 토픽에 페이로드를 발행합니다.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), PublisherError>> + Send;

    /// 버스 이름
    fn name(&self) -> &'static str;
}

/// Redis pub/sub 버스
#[derive(Clone)]
pub struct RedisMessageBus {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisMessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisMessageBus").finish_non_exhaustive()
    }
}

impl RedisMessageBus {
    /// 브로커에 연결합니다.
    pub async fn connect(url: &str) -> Result<Self, PublisherError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("connected to message bus");
        Ok(Self { conn })
    }
}

impl MessageBus for RedisMessageBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublisherError> {
        let mut conn = self.conn.clone();
        let _receivers: i64 = conn
            .publish(topic, payload)
            .await
            .map_err(|e| PublisherError::Publish {
                topic: topic.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// 발행된 메시지를 기록하는 인메모리 버스
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    messages: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryBus {
    /// 새 버스를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 발행 실패를 흉내냅니다.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 지금까지 발행된 메시지 (토픽, 페이로드)
    pub fn messages(&self) -> Vec<(String, Vec<u8>)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// 토픽별로 발행된 페이로드를 JSON으로 파싱해 반환합니다.
    pub fn json_on(&self, topic: &str) -> Vec<serde_json::Value> {
        self.messages()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .filter_map(|(_, payload)| serde_json::from_slice(&payload).ok())
            .collect()
    }
}

impl MessageBus for MemoryBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublisherError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublisherError::Unavailable("memory bus set to fail".to_owned()));
        }
        let mut messages = self
            .messages
            .lock()
            .map_err(|e| PublisherError::Unavailable(e.to_string()))?;
        messages.push((topic.to_owned(), payload));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
