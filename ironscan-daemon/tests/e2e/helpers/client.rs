//! Minimal control socket client.

use std::path::Path;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

/// One control connection. Requests are sent one at a time.
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

#[allow(dead_code)]
impl Client {
    pub async fn connect(path: &Path) -> Self {
        let stream = UnixStream::connect(path).await.expect("connect control socket");
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Send a raw line and read one response line.
    ///
    /// Write errors are ignored: the daemon may answer and close before the
    /// whole line is written (oversized requests, rejected connections).
    pub async fn raw(&mut self, line: &str) -> Value {
        self.raw_bytes(line.as_bytes()).await
    }

    /// Send arbitrary bytes followed by a newline and read one response line.
    pub async fn raw_bytes(&mut self, line: &[u8]) -> Value {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line);
        buf.push(b'\n');
        let _ = self.writer.write_all(&buf).await;
        self.read().await
    }

    /// Send a request and read its response.
    pub async fn send(&mut self, request: Value) -> Value {
        self.raw(&request.to_string()).await
    }

    /// Read one response line. `Value::Null` once the daemon closed the connection.
    pub async fn read(&mut self) -> Value {
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return Value::Null,
            Ok(_) => {}
        }
        serde_json::from_str(&line).expect("response is JSON")
    }
}

/// Assert an `ok` response and return it.
pub fn ok(response: Value) -> Value {
    assert_eq!(response["status"], "ok", "unexpected response: {response}");
    response
}

/// Assert a fault with the given code.
pub fn fault(response: &Value, code: &str) {
    assert_eq!(response["status"], "fault", "unexpected response: {response}");
    assert_eq!(response["code"], code, "unexpected response: {response}");
}
