//! 파이프라인 trait — 장기 실행 컴포넌트의 생명주기
//!
//! 결과 발행자, 스캔 컨트롤러 등 데몬이 시작/정지하는 컴포넌트는
//! [`Pipeline`]을 구현합니다. 데몬은 [`DynPipeline`]으로 이들을 한 목록에서 관리합니다.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::IronscanError;

/// `dyn` 호환 Future 박스
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 컴포넌트 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 일부 기능 저하
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }

    /// 상태 문자열 (`healthy`, `degraded`, `unhealthy`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded(_) => "degraded",
            Self::Unhealthy(_) => "unhealthy",
        }
    }
}

/// 생명주기 trait
///
/// `start` 중복 호출은 `PipelineError::AlreadyRunning`,
/// 실행 중이 아닐 때 `stop`은 `PipelineError::NotRunning`을 반환해야 합니다.
pub trait Pipeline: Send + Sync {
    /// 컴포넌트를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), IronscanError>> + Send;

    /// 컴포넌트를 정지합니다. 진행 중인 작업은 가능한 범위에서 정리합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), IronscanError>> + Send;

    /// 현재 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// [`Pipeline`]의 `dyn` 호환 버전
pub trait DynPipeline: Send + Sync {
    /// 컴포넌트를 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), IronscanError>>;

    /// 컴포넌트를 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), IronscanError>>;

    /// 현재 상태를 반환합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), IronscanError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), IronscanError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}
