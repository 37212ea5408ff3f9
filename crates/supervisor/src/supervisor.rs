//! 스캔별 프로세스 감독
//!
//! 스캔 하나당 감독 태스크 하나가 스캐너 프로세스를 소유합니다.
//! 감독 태스크는 다음을 동시에 처리합니다.
//!
//! - stdout 파싱 결과를 이벤트 채널로 즉시 전달
//! - 주기적인 리소스 샘플링과 한도 위반 시 종료
//! - 중지 요청 처리 (SIGTERM, 유예 후 SIGKILL)
//! - 종료 상태 기록 후 [`SupervisorEvent::Exited`] 전송
//!
//! 실행 슬롯([`Slot`])은 감독 태스크가 끝날 때 반환됩니다.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ironscan_core::config::SupervisorConfig;
use ironscan_core::metrics as m;
use ironscan_core::types::{ScanId, ScanOptions, unix_now};

use crate::admission::{AdmissionGate, Slot};
use crate::error::SupervisorError;
use crate::monitor::{ResourceLimits, ResourceMonitor};
use crate::process::{ProcessOutput, ScannerCommand, ScannerProcess};
use crate::protocol::{ScanEvent, ScanJob, parse_line};

/// 이벤트 채널 버퍼 크기
const EVENT_BUFFER: usize = 1024;

/// 프로세스 종료 후 stdout 잔여분을 기다리는 최대 시간
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// 감독자 설정
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// 스캐너 명령
    pub command: ScannerCommand,
    /// SIGTERM 후 SIGKILL까지 유예 시간
    pub stop_grace: Duration,
    /// 리소스 샘플링 주기
    pub monitor_interval: Duration,
    /// 리소스 한도
    pub limits: ResourceLimits,
    /// 동시 실행 상한
    pub max_concurrent_scans: usize,
}

impl SupervisorSettings {
    /// 설정 파일 값으로부터 생성합니다.
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self {
            command: ScannerCommand::new(&config.scanner_binary, config.scanner_args.clone()),
            stop_grace: Duration::from_secs(config.stop_grace_secs),
            monitor_interval: Duration::from_millis(config.monitor_interval_ms.max(1)),
            limits: ResourceLimits::from_config(config),
            max_concurrent_scans: config.max_concurrent_scans,
        }
    }
}

/// 감독 태스크가 보내는 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    /// 스캐너 출력에서 나온 이벤트
    Scan(ScanEvent),
    /// 프로세스 종료 (마지막 이벤트)
    Exited(ExitReport),
}

/// 종료 보고
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// 종료 코드
    pub code: Option<i32>,
    /// 종료 시그널
    pub signal: Option<i32>,
    /// 중지 요청이 있었는지
    pub stop_requested: bool,
    /// 리소스 한도 위반 사유
    pub limit_exceeded: Option<String>,
}

/// 종료 보고를 해석한 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// 정상 종료 (코드 0)
    Clean,
    /// 운영자 중지
    Stopped,
    /// 리소스 한도 초과로 종료됨
    LimitExceeded(String),
    /// 비정상 종료
    Failed(String),
}

impl ExitReport {
    fn from_status(status: &ExitStatus, stop_requested: bool, limit_exceeded: Option<String>) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
            stop_requested,
            limit_exceeded,
        }
    }

    /// 종료 결과를 해석합니다.
    ///
    /// 중지 요청이 가장 우선하고, 그다음 리소스 한도 위반, 종료 코드 순입니다.
    pub fn outcome(&self) -> ExitOutcome {
        if self.stop_requested {
            return ExitOutcome::Stopped;
        }
        if let Some(reason) = &self.limit_exceeded {
            return ExitOutcome::LimitExceeded(format!("resource limit exceeded: {reason}"));
        }
        match (self.code, self.signal) {
            (Some(0), _) => ExitOutcome::Clean,
            (Some(code), _) => ExitOutcome::Failed(format!("scanner exited with status {code}")),
            (None, Some(signal)) => {
                ExitOutcome::Failed(format!("scanner killed by signal {signal}"))
            }
            (None, None) => ExitOutcome::Failed("scanner exited abnormally".to_owned()),
        }
    }
}

/// 실행 중인 스캔에 중지를 요청하는 핸들
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: mpsc::Sender<()>,
}

impl StopHandle {
    /// 중지를 요청합니다. 대기하지 않습니다.
    ///
    /// 이미 요청했거나 종료된 프로세스에 대한 요청은 무시됩니다.
    pub fn stop(&self) {
        match self.tx.try_send(()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!("stop already requested");
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                debug!("stop requested for a scanner that already exited");
            }
        }
    }
}

/// 실행 중인 스캔 핸들
#[derive(Debug)]
pub struct ScanHandle {
    /// 스캔 ID
    pub scan_id: ScanId,
    /// 프로세스 ID
    pub pid: u32,
    /// 이벤트 수신 채널 (`Exited`가 마지막)
    pub events: mpsc::Receiver<SupervisorEvent>,
    /// 중지 핸들
    pub stopper: StopHandle,
    /// 감독 태스크
    pub task: JoinHandle<()>,
}

/// 프로세스 감독자
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    settings: SupervisorSettings,
    gate: AdmissionGate,
}

impl ProcessSupervisor {
    /// 새 감독자를 생성합니다.
    pub fn new(settings: SupervisorSettings) -> Self {
        let gate = AdmissionGate::new(settings.max_concurrent_scans);
        Self { settings, gate }
    }

    /// 설정 파일 값으로부터 생성합니다.
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(SupervisorSettings::from_config(config))
    }

    /// 동시 실행 게이트
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// 현재 설정
    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// 슬롯을 받아 스캐너를 실행합니다.
    ///
    /// 슬롯은 [`AdmissionGate`]에서 얻어야 하며, 프로세스가 끝나면 반환됩니다.
    pub fn spawn(
        &self,
        slot: Slot,
        scan_id: ScanId,
        targets: Vec<String>,
        options: ScanOptions,
    ) -> Result<ScanHandle, SupervisorError> {
        let job = ScanJob {
            scan_id: scan_id.to_string(),
            targets,
            options,
        };
        let (process, output) = ScannerProcess::spawn(&self.settings.command, &job)?;
        let pid = process.pid();

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (stop_tx, stop_rx) = mpsc::channel(1);

        metrics::gauge!(m::SUPERVISOR_ACTIVE_PROCESSES).increment(1.0);
        info!(scan_id = %scan_id, pid, "scanner started");

        let task = tokio::spawn(supervise(
            scan_id,
            process,
            output,
            slot,
            self.settings.clone(),
            event_tx,
            stop_rx,
        ));

        Ok(ScanHandle {
            scan_id,
            pid,
            events: event_rx,
            stopper: StopHandle { tx: stop_tx },
            task,
        })
    }
}

async fn supervise(
    scan_id: ScanId,
    mut process: ScannerProcess,
    output: ProcessOutput,
    slot: Slot,
    settings: SupervisorSettings,
    events: mpsc::Sender<SupervisorEvent>,
    mut stop_rx: mpsc::Receiver<()>,
) {
    let stdout_task = tokio::spawn(read_stdout(scan_id, output.stdout, events.clone()));
    let stderr_task = tokio::spawn(read_stderr(scan_id, output.stderr));

    let mut monitor = ResourceMonitor::new(process.pid(), settings.limits);
    let mut ticker = tokio::time::interval(settings.monitor_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut stop_requested = false;
    let mut limit_exceeded = None;

    let status = loop {
        tokio::select! {
            status = process.wait() => break status,
            Some(()) = stop_rx.recv(), if !stop_requested => {
                stop_requested = true;
                info!(scan_id = %scan_id, "stopping scanner");
                break process.terminate(settings.stop_grace).await;
            }
            _ = ticker.tick() => {
                let Some(sample) = monitor.sample() else { continue };
                if let Some(reason) = monitor.check(sample) {
                    warn!(scan_id = %scan_id, reason = %reason, "scanner exceeded resource limit, terminating");
                    metrics::counter!(m::SUPERVISOR_LIMIT_KILLS_TOTAL).increment(1);
                    limit_exceeded = Some(reason);
                    break process.terminate(settings.stop_grace).await;
                }
            }
        }
    };

    // stdout 잔여 결과를 모두 전달한 뒤에 종료를 알림
    match tokio::time::timeout(DRAIN_TIMEOUT, stdout_task).await {
        Ok(_) => {}
        Err(_) => warn!(scan_id = %scan_id, "scanner stdout still open after exit, abandoning reader"),
    }
    stderr_task.abort();

    let report = match status {
        Ok(status) => ExitReport::from_status(&status, stop_requested, limit_exceeded),
        Err(e) => {
            warn!(scan_id = %scan_id, error = %e, "failed to collect scanner exit status");
            ExitReport {
                code: None,
                signal: None,
                stop_requested,
                limit_exceeded,
            }
        }
    };

    info!(
        scan_id = %scan_id,
        code = ?report.code,
        signal = ?report.signal,
        stop_requested = report.stop_requested,
        "scanner exited"
    );
    metrics::gauge!(m::SUPERVISOR_ACTIVE_PROCESSES).decrement(1.0);

    drop(slot);
    if events.send(SupervisorEvent::Exited(report)).await.is_err() {
        debug!(scan_id = %scan_id, "exit report dropped, no receiver");
    }
}

async fn read_stdout(
    scan_id: ScanId,
    stdout: tokio::process::ChildStdout,
    events: mpsc::Sender<SupervisorEvent>,
) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(scan_id = %scan_id, error = %e, "failed to read scanner stdout");
                break;
            }
        }
        let line = match std::str::from_utf8(trim_newline(&buf)) {
            Ok(line) => line,
            Err(e) => {
                warn!(
                    scan_id = %scan_id,
                    error = %e,
                    line = %String::from_utf8_lossy(&buf[..buf.len().min(200)]),
                    "skipping scanner output that is not UTF-8"
                );
                metrics::counter!(m::SUPERVISOR_MALFORMED_LINES_TOTAL).increment(1);
                continue;
            }
        };

        let parsed = parse_line(line)
            .and_then(|parsed| parsed.map(|msg| msg.into_event(unix_now())).transpose());
        let event = match parsed {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(reason) => {
                warn!(
                    scan_id = %scan_id,
                    reason = %reason,
                    line = %truncate(line, 200),
                    "skipping malformed scanner output"
                );
                metrics::counter!(m::SUPERVISOR_MALFORMED_LINES_TOTAL).increment(1);
                continue;
            }
        };

        if let ScanEvent::Log(message) = &event {
            info!(scan_id = %scan_id, message = %message, "scanner log");
            continue;
        }

        if events.send(SupervisorEvent::Scan(event)).await.is_err() {
            debug!(scan_id = %scan_id, "event receiver dropped, discarding scanner output");
            break;
        }
    }
}

async fn read_stderr(scan_id: ScanId, stderr: tokio::process::ChildStderr) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(trim_newline(&buf));
                debug!(scan_id = %scan_id, line = %line, "scanner stderr");
            }
        }
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
