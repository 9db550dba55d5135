//! Logging setup for the audit binary and structured run events.
//!
//! Events go to stderr so the report on stdout stays machine-pipeable.

use std::env;
use std::path::Path;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            include_target: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Reads `QC_LOG_LEVEL`, `QC_LOG_FORMAT` and `QC_LOG_TARGET`; unparseable
/// values keep the default.
pub fn logging_config_from_env() -> LoggingConfig {
    let defaults = LoggingConfig::default();
    LoggingConfig {
        level: env::var("QC_LOG_LEVEL")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .unwrap_or(defaults.level),
        format: env::var("QC_LOG_FORMAT")
            .ok()
            .and_then(|raw| parse_log_format(&raw))
            .unwrap_or(defaults.format),
        include_target: env::var("QC_LOG_TARGET")
            .ok()
            .and_then(|raw| parse_bool(&raw))
            .unwrap_or(defaults.include_target),
    }
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_writer(std::io::stderr)
        .with_ansi(!matches!(config.format, LogFormat::Json));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
        LogFormat::Compact => {
            tracing::subscriber::set_global_default(builder.compact().finish())?
        }
    }

    Ok(())
}

pub fn log_run_start(config: &LoggingConfig) {
    info!(
        component = "qc_audit",
        event = "app.start",
        log_level = %config.level,
        log_format = ?config.format,
        include_target = config.include_target
    );
}

pub fn log_dataset_selected(source: &str, rows: usize, channels: usize, reason: Option<&str>) {
    match reason {
        Some(reason) => info!(
            component = "qc_audit",
            event = "dataset.selected",
            source,
            rows,
            channels,
            reason
        ),
        None => info!(
            component = "qc_audit",
            event = "dataset.selected",
            source,
            rows,
            channels
        ),
    }
}

pub fn log_output_written(kind: &str, path: &Path) {
    info!(
        component = "qc_audit",
        event = "output.written",
        kind,
        path = %path.display()
    );
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        "compact" | "text" => Some(LogFormat::Compact),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
