//! Control socket client.
//!
//! Sends one JSON request per line and reads one JSON response per line.
//! Fault responses become [`CliError::Fault`].

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use crate::error::CliError;

/// How long to wait for a single response.
///
/// `stop_scan` waits for the scanner to exit, so this is generous.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);

/// A connection to `ironscand`.
pub struct DaemonClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl DaemonClient {
    /// Connect to the control socket at `path`.
    pub async fn connect(path: &Path) -> Result<Self, CliError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| CliError::DaemonUnavailable(format!("{}: {}", path.display(), e)))?;
        debug!(socket = %path.display(), "connected to daemon");
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    /// Send a request and return the `ok` response body.
    pub async fn request(&mut self, request: &Value) -> Result<Value, CliError> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;

        let mut response = String::new();
        let read = tokio::time::timeout(RESPONSE_TIMEOUT, self.reader.read_line(&mut response))
            .await
            .map_err(|_| CliError::Protocol("timed out waiting for the daemon".to_owned()))??;
        if read == 0 {
            return Err(CliError::DaemonUnavailable(
                "connection closed by daemon".to_owned(),
            ));
        }
        parse_response(&response)
    }

    /// Send a request and decode the `ok` response into `T`.
    pub async fn call<T: DeserializeOwned>(&mut self, request: &Value) -> Result<T, CliError> {
        let body = self.request(request).await?;
        serde_json::from_value(body)
            .map_err(|e| CliError::Protocol(format!("unexpected response shape: {e}")))
    }
}

/// Split a response line into its body or a fault.
pub fn parse_response(line: &str) -> Result<Value, CliError> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| CliError::Protocol(format!("invalid response: {e}")))?;
    match value.get("status").and_then(Value::as_str) {
        Some("ok") => Ok(value),
        Some("fault") => Err(CliError::Fault {
            code: value
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("internal")
                .to_owned(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
        }),
        _ => Err(CliError::Protocol(format!("response without status: {line}"))),
    }
}
