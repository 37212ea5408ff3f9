//! 스캐너 프로세스 핸들
//!
//! 스캐너는 자체 프로세스 그룹에서 실행되며, 시그널은 그룹 전체로 보냅니다.
//! 스캐너가 띄운 하위 프로세스까지 함께 정리하기 위함입니다.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, warn};

use crate::error::SupervisorError;
use crate::protocol::ScanJob;

/// 스캔 ID를 전달하는 환경 변수
pub const SCAN_ID_ENV: &str = "IRONSCAN_SCAN_ID";

/// 스캐너 실행 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerCommand {
    /// 실행 파일
    pub binary: PathBuf,
    /// 인자
    pub args: Vec<String>,
}

impl ScannerCommand {
    /// 새 명령을 생성합니다.
    pub fn new(binary: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }
}

/// 종료 시그널
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGTERM
    Terminate,
    /// SIGKILL
    Kill,
}

impl StopSignal {
    fn raw(self) -> libc::c_int {
        match self {
            Self::Terminate => libc::SIGTERM,
            Self::Kill => libc::SIGKILL,
        }
    }
}

/// 실행 중인 스캐너 프로세스
#[derive(Debug)]
pub struct ScannerProcess {
    child: Child,
    pid: u32,
}

/// 프로세스 출력 스트림
#[derive(Debug)]
pub struct ProcessOutput {
    /// stdout
    pub stdout: ChildStdout,
    /// stderr
    pub stderr: ChildStderr,
}

impl ScannerProcess {
    /// 스캐너를 실행하고 작업 정의를 stdin에 씁니다.
    pub fn spawn(
        command: &ScannerCommand,
        job: &ScanJob,
    ) -> Result<(Self, ProcessOutput), SupervisorError> {
        let payload = serde_json::to_vec(job).map_err(|e| SupervisorError::Spawn(e.to_string()))?;

        let mut child = Command::new(&command.binary)
            .args(&command.args)
            .env(SCAN_ID_ENV, &job.scan_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SupervisorError::Spawn(format!("{}: {e}", command.binary.display()))
            })?;

        let pid = child
            .id()
            .ok_or_else(|| SupervisorError::Spawn("process exited before pid was read".to_owned()))?;

        let (Some(mut stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(SupervisorError::Spawn("stdio pipes unavailable".to_owned()));
        };

        let scan_id = job.scan_id.clone();
        tokio::spawn(async move {
            let write = async {
                stdin.write_all(&payload).await?;
                stdin.write_all(b"\n").await?;
                stdin.shutdown().await
            };
            if let Err(e) = write.await {
                debug!(scan_id = %scan_id, error = %e, "scanner did not read its job from stdin");
            }
        });

        Ok((Self { child, pid }, ProcessOutput { stdout, stderr }))
    }

    /// 프로세스 ID (프로세스 그룹 ID와 같음)
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// 프로세스 그룹에 시그널을 보냅니다.
    ///
    /// 그룹이 이미 없으면 성공으로 취급합니다.
    pub fn signal(&self, signal: StopSignal) -> Result<(), SupervisorError> {
        let pgid = self.pid as libc::pid_t;
        // SAFETY: kill(2)은 메모리를 건드리지 않으며, 음수 pid는 프로세스 그룹을 의미합니다.
        let rc = unsafe { libc::kill(-pgid, signal.raw()) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(SupervisorError::Signal {
            pgid,
            reason: err.to_string(),
        })
    }

    /// 종료를 기다립니다.
    pub async fn wait(&mut self) -> Result<ExitStatus, SupervisorError> {
        self.child
            .wait()
            .await
            .map_err(|e| SupervisorError::Wait(e.to_string()))
    }

    /// SIGTERM을 보내고 유예 시간 안에 끝나지 않으면 SIGKILL을 보냅니다.
    pub async fn terminate(&mut self, grace: Duration) -> Result<ExitStatus, SupervisorError> {
        self.signal(StopSignal::Terminate)?;
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => status.map_err(|e| SupervisorError::Wait(e.to_string())),
            Err(_) => {
                warn!(
                    pid = self.pid,
                    grace_secs = grace.as_secs(),
                    "scanner did not exit after SIGTERM, sending SIGKILL"
                );
                self.signal(StopSignal::Kill)?;
                self.wait().await
            }
        }
    }
}
