//! Logging initialization for ironscand.
//!
//! Configures `tracing-subscriber` from the `[general]` section. Supports
//! JSON structured logging and a human-readable pretty format, written to
//! stdout or appended to `general.log_file`.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ironscan_core::config::GeneralConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `RUST_LOG` takes precedence over `general.log_level`.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines (default)
/// * `"pretty"` - Human-readable output (for development)
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let layer = build_layer(config)?;
    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))?;
    Ok(())
}

fn build_layer(config: &GeneralConfig) -> Result<BoxedLayer> {
    let layer = tracing_subscriber::fmt::layer();

    if config.log_file.is_empty() {
        return match config.log_format.as_str() {
            "json" => Ok(layer.json().boxed()),
            "pretty" => Ok(layer.pretty().boxed()),
            other => Err(unknown_format(other)),
        };
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .map_err(|e| anyhow::anyhow!("failed to open log file '{}': {}", config.log_file, e))?;
    let layer = layer.with_ansi(false).with_writer(Mutex::new(file));

    match config.log_format.as_str() {
        "json" => Ok(layer.json().boxed()),
        "pretty" => Ok(layer.pretty().boxed()),
        other => Err(unknown_format(other)),
    }
}

fn unknown_format(format: &str) -> anyhow::Error {
    anyhow::anyhow!("unknown log format '{}', expected 'json' or 'pretty'", format)
}
