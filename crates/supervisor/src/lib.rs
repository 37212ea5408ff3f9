//! Ironscan 스캐너 프로세스 감독자
//!
//! 스캔 하나당 스캐너 서브프로세스 하나를 실행하고 감독합니다.
//!
//! # 구성
//!
//! - [`AdmissionGate`]: 동시 실행 상한 (초과 요청은 대기)
//! - [`ScannerProcess`]: 프로세스 그룹 단위 시작/시그널/대기/강제 종료
//! - [`parse_line`]: stdout JSON 라인 프로토콜
//! - [`ResourceMonitor`]: CPU/메모리 샘플링과 한도 판정
//! - [`ProcessSupervisor`]: 위 구성 요소를 묶어 스캔별 감독 태스크 실행

pub mod admission;
pub mod error;
pub mod monitor;
pub mod process;
pub mod protocol;
pub mod supervisor;

pub use admission::{AdmissionGate, Slot};
pub use error::SupervisorError;
pub use monitor::{ResourceLimits, ResourceMonitor, ResourceSample};
pub use process::{ScannerCommand, ScannerProcess, StopSignal};
pub use protocol::{ScanEvent, ScanJob, ScannerMessage, parse_line};
pub use supervisor::{
    ExitOutcome, ExitReport, ProcessSupervisor, ScanHandle, StopHandle, SupervisorEvent,
    SupervisorSettings,
};
