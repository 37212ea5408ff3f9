//! Ironscan 결과 발행자
//!
//! 저장된 스캔 결과를 메시지 버스로 재발행합니다.
//! 메시지 버스는 관찰용 팬아웃이며 내구성을 보장하지 않습니다.
//! 발행 실패나 큐 포화 시 메시지를 드롭하고 스캔 진행을 막지 않습니다.

pub mod bus;
pub mod error;
pub mod publisher;

pub use bus::{MemoryBus, MessageBus, RedisMessageBus};
pub use error::PublisherError;
pub use publisher::{PublishRequest, PublisherHandle, ResultPublisher, Topics};
