use std::path::Path;

use anyhow::Result;
use clap::Parser;

use ironscan_core::config::IronscanConfig;
use ironscan_daemon::cli::{DEFAULT_CONFIG_PATH, DaemonCli};
use ironscan_daemon::logging::init_tracing;
use ironscan_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = load_config(&cli).await?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ironscand starting");

    let orchestrator = Orchestrator::build_from_config(config).await.map_err(|e| {
        tracing::error!(error = %e, "startup failed");
        e
    })?;
    orchestrator.run().await
}

/// Load the explicit config file, the default file if present, or built-in defaults.
///
/// Environment overrides apply in every case.
async fn load_config(cli: &DaemonCli) -> Result<IronscanConfig> {
    let path = match &cli.config {
        Some(path) => Some(path.as_path()),
        None => Some(Path::new(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
    };

    let mut config = match path {
        Some(path) => IronscanConfig::from_file(path).await.map_err(|e| {
            anyhow::anyhow!("failed to load config '{}': {}", path.display(), e)
        })?,
        None => IronscanConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}
