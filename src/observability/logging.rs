//! Structured logging configuration.

use crate::config::LoggingSettings;
use crate::{Error, Result};
use std::path::PathBuf;

/// Filter used when neither `RUST_LOG` nor a configured level is set.
const DEFAULT_LEVEL: &str = "info";

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for anything but `pretty` or `json`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidInput(format!("unknown log format: {other}"))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive.
    pub filter: String,
    /// Log file; stderr when `None`.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds logging configuration from config settings.
    ///
    /// `RUST_LOG`, when set, takes precedence over the configured level;
    /// `verbose` raises the default level to `debug`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured format is unknown.
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Result<Self> {
        let format = settings
            .format
            .as_deref()
            .map(LogFormat::parse)
            .transpose()?
            .unwrap_or_default();

        let filter = std::env::var("RUST_LOG")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| settings.level.clone())
            .unwrap_or_else(|| {
                if verbose {
                    "debug".to_string()
                } else {
                    DEFAULT_LEVEL.to_string()
                }
            });

        Ok(Self {
            format,
            filter,
            file: settings.file.clone(),
        })
    }
}
