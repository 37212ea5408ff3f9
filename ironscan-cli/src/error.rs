//! CLI-specific error types and exit code mapping

use ironscan_core::error::IronscanError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Cannot connect to the daemon's control socket.
    #[error("daemon not reachable: {0}")]
    DaemonUnavailable(String),

    /// The daemon answered with a fault.
    #[error("{code}: {message}")]
    Fault {
        /// Fault code (e.g. `not_found`).
        code: String,
        /// Detail from the daemon.
        message: String,
    },

    /// The daemon's answer could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A waited-for scan ended without finishing.
    #[error("scan {id} ended {status}")]
    ScanNotFinished {
        /// Scan id.
        id: String,
        /// Final status.
        status: String,
    },

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (socket, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from ironscan-core.
    #[error("{0}")]
    Core(#[from] IronscanError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                               |
    /// |------|---------------------------------------|
    /// | 0    | Success                               |
    /// | 1    | General / command error               |
    /// | 2    | Configuration error                   |
    /// | 3    | Daemon unreachable                    |
    /// | 4    | Waited-for scan did not finish        |
    /// | 5    | Daemon rejected the request           |
    /// | 10   | IO error                              |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(_) => 2,
            Self::DaemonUnavailable(_) => 3,
            Self::ScanNotFinished { .. } => 4,
            Self::Fault { .. } => 5,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Protocol(_) => 1,
        }
    }
}
