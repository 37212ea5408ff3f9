//! Ironscan 상태 저장소 어댑터
//!
//! 공유 키-값 저장소 위의 타입 안전한 파사드입니다.
//! 스캔 상태의 단일 진실 공급원이며 데몬 재시작 후에도 유지됩니다.
//!
//! # 구성
//!
//! - [`StateStore`]: 저장소 trait (필드 갱신, CAS 상태 전이, 결과 추가/조회)
//! - [`RedisStateStore`]: Redis 백엔드 (Lua CAS 스크립트)
//! - [`MemoryStateStore`]: 인메모리 백엔드
//! - [`RetryingStore`]: 일시적 장애를 선형 백오프로 재시도하는 래퍼
//! - [`AnyStateStore`]: 설정으로 선택되는 백엔드
//!
//! # 사용 예시
//!
//! ```no_run
//! # async fn example() -> Result<(), ironscan_store::StoreError> {
//! use ironscan_store::{RedisStateStore, RetryPolicy, RetryingStore, StateStore};
//!
//! let redis = RedisStateStore::connect("redis://127.0.0.1:6379").await?;
//! let store = RetryingStore::new(redis, RetryPolicy::default());
//! store.ping().await?;
//! # Ok(())
//! # }
//! ```

pub mod any;
pub mod error;
pub mod keys;
pub mod memory;
pub mod redis_store;
pub mod retry;
pub mod store;

pub use any::AnyStateStore;
pub use error::StoreError;
pub use memory::MemoryStateStore;
pub use redis_store::RedisStateStore;
pub use retry::{RetryPolicy, RetryingStore};
pub use store::{ScanField, StateStore, Transition};
