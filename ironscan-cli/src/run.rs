//! Command dispatch.

use std::path::{Path, PathBuf};

use tracing::debug;

use ironscan_core::config::IronscanConfig;

use crate::cli::{Cli, Commands};
use crate::client::DaemonClient;
use crate::commands;
use crate::error::CliError;
use crate::output::OutputWriter;

/// Run the parsed command line.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);

    // config needs no daemon
    let command = match cli.command {
        Commands::Config(args) => return commands::config::execute(args, &cli.config, &writer).await,
        other => other,
    };

    let socket = resolve_socket(cli.socket, &cli.config).await?;
    let mut client = DaemonClient::connect(&socket).await?;

    match command {
        Commands::Details => commands::details::execute_details(&mut client, &writer).await,
        Commands::Health => commands::details::execute_health(&mut client, &writer).await,
        Commands::Start(args) => commands::start::execute(args, &mut client, &writer).await,
        Commands::Status(args) => commands::status::execute(args, &mut client, &writer).await,
        Commands::Stop(args) => commands::scan::execute_stop(args, &mut client, &writer).await,
        Commands::Delete(args) => commands::scan::execute_delete(args, &mut client, &writer).await,
        Commands::Vts(args) => commands::vts::execute(args, &mut client, &writer).await,
        // handled before connecting
        Commands::Config(_) => Ok(()),
    }
}

/// Socket path from `--socket`, else from the configuration.
///
/// A missing configuration file falls back to defaults plus env overrides,
/// so the client works on hosts that only set `IRONSCAN_SOCKET_PATH`.
pub async fn resolve_socket(
    flag: Option<PathBuf>,
    config_path: &Path,
) -> Result<PathBuf, CliError> {
    if let Some(path) = flag {
        return Ok(path);
    }

    let mut config = if tokio::fs::try_exists(config_path).await? {
        IronscanConfig::from_file(config_path).await?
    } else {
        debug!(path = %config_path.display(), "config file not found, using defaults");
        IronscanConfig::default()
    };
    config.apply_env_overrides();

    if config.socket.path.is_empty() {
        return Err(CliError::Config("socket.path is empty".to_owned()));
    }
    Ok(PathBuf::from(config.socket.path))
}
