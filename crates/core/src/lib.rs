//! Ironscan 공통 크레이트
//!
//! 모든 ironscan 크레이트가 공유하는 도메인 타입, 스캔 상태 머신,
//! 에러 분류, 설정, 생명주기 trait, 메트릭 이름을 정의합니다.
//!
//! # 모듈 구성
//!
//! - [`types`]: `ScanId`, `ScanStatus`, `Scan`, `ScanResult`, `VtDescriptor` 등 도메인 타입
//! - [`error`]: 최상위 에러 `IronscanError`와 도메인별 에러
//! - [`config`]: `ironscan.toml` 설정 (`IronscanConfig`)
//! - [`event`]: 메시지 버스로 재발행되는 이벤트 (`ResultBatchEvent`, `StatusEvent`)
//! - [`pipeline`]: 장기 실행 컴포넌트의 생명주기 trait (`Pipeline`, `HealthStatus`)
//! - [`metrics`]: Prometheus 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, IronscanError, ProtocolError};

// 설정
pub use config::IronscanConfig;

// 이벤트
pub use event::{EventMetadata, ResultBatchEvent, StatusEvent};

// 파이프라인 trait
pub use pipeline::{BoxFuture, DynPipeline, HealthStatus, Pipeline};

// 도메인 타입
pub use types::{
    HostProgress, ResultType, Scan, ScanId, ScanOptions, ScanResult, ScanStatus, Severity,
    VtDescriptor, VtRefs,
};
