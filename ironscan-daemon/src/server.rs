//! Local control socket.
//!
//! A Unix domain socket accepting newline-delimited JSON requests. Each
//! connection may send any number of requests; every request gets exactly
//! one response line. Connections beyond `socket.max_connections` receive a
//! `resource_exhausted` fault and are closed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use ironscan_core::config::SocketConfig;
use ironscan_core::metrics as m;
use ironscan_store::StateStore;

use crate::handler::RequestHandler;
use crate::protocol::{FaultCode, MAX_REQUEST_BYTES, Response};

/// Per-connection settings.
#[derive(Debug, Clone, Copy)]
struct ConnectionSettings {
    request_timeout: Duration,
}

/// The control socket listener.
pub struct ControlServer<S> {
    listener: UnixListener,
    path: PathBuf,
    handler: Arc<RequestHandler<S>>,
    permits: Arc<Semaphore>,
    settings: ConnectionSettings,
}

impl<S: StateStore> ControlServer<S> {
    /// Bind the socket at `config.path`.
    ///
    /// A leftover socket file from an earlier run is replaced. The socket is
    /// made owner-only (0600).
    pub fn bind(handler: Arc<RequestHandler<S>>, config: &SocketConfig) -> Result<Self> {
        let path = PathBuf::from(&config.path);
        prepare_socket_path(&path)?;

        let listener = UnixListener::bind(&path).map_err(|e| {
            anyhow::anyhow!("failed to bind control socket '{}': {}", path.display(), e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!(
            path = %path.display(),
            max_connections = config.max_connections,
            "control socket listening"
        );

        Ok(Self {
            listener,
            path,
            handler,
            permits: Arc::new(Semaphore::new(config.max_connections)),
            settings: ConnectionSettings {
                request_timeout: Duration::from_secs(config.request_timeout_secs),
            },
        })
    }

    /// Socket file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until `shutdown` is cancelled.
    ///
    /// Open connections are closed and the socket file is removed on return.
    pub async fn serve(self, shutdown: CancellationToken) {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let stream = match accepted {
                        Ok((stream, _)) => stream,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to accept control connection");
                            continue;
                        }
                    };
                    let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                        tracing::warn!("connection limit reached, rejecting control connection");
                        connections.spawn(reject(stream));
                        continue;
                    };
                    let handler = Arc::clone(&self.handler);
                    let settings = self.settings;
                    let shutdown = shutdown.clone();
                    connections.spawn(async move {
                        metrics::gauge!(m::SOCKET_ACTIVE_CONNECTIONS).increment(1.0);
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = serve_connection(reader, writer, &handler, settings, &shutdown).await {
                            tracing::debug!(error = %e, "control connection closed with error");
                        }
                        metrics::gauge!(m::SOCKET_ACTIVE_CONNECTIONS).decrement(1.0);
                        drop(permit);
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = shutdown.cancelled() => break,
            }
        }

        connections.shutdown().await;
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove control socket");
        }
        tracing::info!("control socket closed");
    }
}

/// Replace a stale socket file and make sure the parent directory exists.
fn prepare_socket_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    match std::fs::symlink_metadata(path) {
        Ok(meta) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::FileTypeExt;
                if !meta.file_type().is_socket() {
                    return Err(anyhow::anyhow!(
                        "'{}' exists and is not a socket",
                        path.display()
                    ));
                }
            }
            #[cfg(not(unix))]
            let _ = meta;
            std::fs::remove_file(path)?;
            tracing::debug!(path = %path.display(), "removed stale control socket");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn reject(mut stream: UnixStream) {
    let line = Response::fault(FaultCode::ResourceExhausted, "too many control connections").to_line();
    let _ = stream.write_all(line.as_bytes()).await;
    let _ = stream.write_all(b"\n").await;
    let _ = stream.shutdown().await;
}

/// Read request lines and write one response line each.
async fn serve_connection<R, W, S>(
    reader: R,
    mut writer: W,
    handler: &RequestHandler<S>,
    settings: ConnectionSettings,
    shutdown: &CancellationToken,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: StateStore,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let mut limited = (&mut reader).take(MAX_REQUEST_BYTES + 1);
        let read = tokio::select! {
            read = limited.read_until(b'\n', &mut buf) => read?,
            _ = shutdown.cancelled() => return Ok(()),
        };
        if read == 0 {
            return Ok(());
        }

        if read as u64 > MAX_REQUEST_BYTES {
            let response = Response::fault(
                FaultCode::BadRequest,
                format!("request exceeds {MAX_REQUEST_BYTES} bytes"),
            );
            write_response(&mut writer, &response).await?;
            return Ok(());
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(error = %e, "control request is not valid UTF-8");
                metrics::counter!(
                    m::SOCKET_REQUESTS_TOTAL,
                    m::LABEL_COMMAND => "invalid",
                    m::LABEL_RESULT => "fault"
                )
                .increment(1);
                let response = Response::fault(FaultCode::BadRequest, "request is not valid UTF-8");
                write_response(&mut writer, &response).await?;
                continue;
            }
        };
        let request = line.trim();
        if request.is_empty() {
            continue;
        }

        let response = match tokio::time::timeout(settings.request_timeout, handler.handle_line(request)).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = settings.request_timeout.as_secs(),
                    "control request timed out"
                );
                Response::fault(FaultCode::Timeout, "request timed out")
            }
        };
        write_response(&mut writer, &response).await?;
    }
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &Response) -> std::io::Result<()> {
    let mut line = response.to_line();
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}
