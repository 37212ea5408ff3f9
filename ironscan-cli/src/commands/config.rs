//! `ironscan config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use ironscan_core::config::IronscanConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Sections accepted by `config show --section`.
pub const SECTIONS: [&str; 8] = [
    "general",
    "socket",
    "store",
    "feed",
    "supervisor",
    "publisher",
    "controller",
    "metrics",
];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load, apply env overrides and validate the file.
///
/// # Errors
///
/// Returns `CliError::Config` after rendering the report when the file is invalid.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let errors = match IronscanConfig::load(config_path).await {
        Ok(_) => Vec::new(),
        Err(e) => vec![e.to_string()],
    };
    let report = ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: errors.is_empty(),
        errors,
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Show the effective configuration with Redis credentials redacted.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let mut config = IronscanConfig::load(config_path).await?;
    redact_credentials(&mut config);

    let report = ConfigReport {
        source: config_path.display().to_string(),
        config_toml: match section.as_deref() {
            None => to_toml(&config),
            Some(name) => section_toml(&config, name)?,
        },
        section,
    };

    writer.render(&report)
}

fn section_toml(config: &IronscanConfig, name: &str) -> Result<String, CliError> {
    Ok(match name {
        "general" => to_toml(&config.general),
        "socket" => to_toml(&config.socket),
        "store" => to_toml(&config.store),
        "feed" => to_toml(&config.feed),
        "supervisor" => to_toml(&config.supervisor),
        "publisher" => to_toml(&config.publisher),
        "controller" => to_toml(&config.controller),
        "metrics" => to_toml(&config.metrics),
        other => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: {})",
                SECTIONS.join(", ")
            )));
        }
    })
}

fn to_toml<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).unwrap_or_else(|e| format!("(serialization error: {e})"))
}

fn redact_credentials(config: &mut IronscanConfig) {
    config.store.redis_url = redact_url(&config.store.redis_url);
    config.publisher.redis_url = redact_url(&config.publisher.redis_url);
}

/// Replace the userinfo part of a connection URL.
///
/// `redis://:secret@cache:6379/0` becomes `redis://***REDACTED***@cache:6379/0`.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_owned();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{scheme}://***REDACTED***{}", &rest[at..]),
        None => url.to_owned(),
    }
}

/// Effective configuration, rendered as TOML in text mode.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.section {
            Some(section) => writeln!(
                w,
                "Configuration {} (source: {})",
                format!("[{section}]").bold(),
                self.source
            )?,
            None => writeln!(w, "Configuration (source: {})", self.source.bold())?,
        }
        writeln!(w)?;
        write!(w, "{}", self.config_toml)
    }
}

/// Result of `config validate`.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}
