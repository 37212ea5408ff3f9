//! Ironscan 스캔 컨트롤러
//!
//! 스캔 수명 주기(생성, 시작, 진행, 중지, 삭제)를 관리합니다.
//!
//! # 구성
//!
//! - [`ScanController`]: 클라이언트 요청을 처리하는 진입점
//! - [`validate_targets`], [`validate_options`]: 요청 검증
//! - [`overall_progress`]: 호스트별 진행률 집계
//! - [`ScanLocks`]: 스캔 단위 전이 직렬화
//!
//! # 상태 흐름
//!
//! ```text
//! create_scan ─> QUEUED ─start_scan─> RUNNING ─exit 0─> FINISHED
//!                  │                     ├─stop_scan──> STOPPED
//!                  │                     └─failure────> INTERRUPTED
//!                  └─stop_scan──> STOPPED
//! ```

pub mod controller;
pub mod details;
mod driver;
pub mod error;
pub mod locks;
pub mod options;
pub mod progress;

pub use controller::{
    ControllerSettings, DAEMON_RESTARTED, DAEMON_SHUTDOWN, ReconcileReport, STOPPED_BY_OPERATOR,
    ScanController, ScanControllerBuilder,
};
pub use details::{FeedSummary, SCANNER_NAME, ScannerDetails, VtFilter};
pub use error::ControllerError;
pub use locks::ScanLocks;
pub use options::{ParamKind, SCANNER_PARAMS, ScannerParam, validate_options, validate_targets};
pub use progress::overall_progress;
