//! Logging and metrics for the retention scanner.
//!
//! [`init_from_config`] installs one `tracing` subscriber writing pretty or
//! JSON lines to stderr or an append-only file, then the Prometheus recorder
//! when `[metrics]` enables it. Both are process-global: a second call fails.

mod logging;
mod metrics;

pub use logging::{LogFormat, LoggingConfig};
pub use metrics::{DEFAULT_METRICS_PORT, MetricsConfig, install_prometheus};

use crate::config::RetentionAppConfig;
use crate::{Error, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Full observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
    /// Whether to expose metrics via HTTP listener.
    pub metrics_expose: bool,
}

/// Options for initialization from the application config.
#[derive(Debug, Clone, Copy)]
pub struct InitOptions {
    /// Whether verbose output was requested via CLI.
    pub verbose: bool,
    /// Whether to expose metrics via HTTP listener.
    pub metrics_expose: bool,
}

/// Handle for observability runtime components.
#[derive(Debug)]
pub struct ObservabilityHandle {
    metrics_handle: Option<PrometheusHandle>,
}

impl ObservabilityHandle {
    /// Renders the current metrics in Prometheus text format, if enabled.
    #[must_use]
    pub fn render_metrics(&self) -> Option<String> {
        self.metrics_handle.as_ref().map(PrometheusHandle::render)
    }
}

static OBSERVABILITY_INIT: OnceLock<()> = OnceLock::new();

/// Initializes observability from the application configuration.
///
/// # Errors
///
/// Returns an error if observability has already been initialized, the
/// logging settings are invalid, or any component fails to start.
pub fn init_from_config(
    config: &RetentionAppConfig,
    options: InitOptions,
) -> Result<ObservabilityHandle> {
    let config = ObservabilityConfig {
        logging: LoggingConfig::from_settings(&config.logging, options.verbose)?,
        metrics: MetricsConfig::from_settings(&config.metrics),
        metrics_expose: options.metrics_expose,
    };

    init(&config)
}

/// Initializes logging and metrics for the process.
///
/// # Errors
///
/// Returns an error if observability has already been initialized or if any
/// component fails to initialize.
pub fn init(config: &ObservabilityConfig) -> Result<ObservabilityHandle> {
    if OBSERVABILITY_INIT.get().is_some() {
        return Err(init_failed("observability already initialized"));
    }

    let filter = EnvFilter::try_new(&config.logging.filter).map_err(|e| {
        Error::InvalidInput(format!("invalid log filter '{}': {e}", config.logging.filter))
    })?;

    let to_file = config.logging.file.is_some();
    let writer = match &config.logging.file {
        Some(path) => BoxMakeWriter::new(Mutex::new(open_log_file(path)?)),
        None => BoxMakeWriter::new(io::stderr),
    };

    // Span fields carry the repository being scanned, so they are kept in
    // both formats.
    let fmt_layer = match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(!to_file)
            .with_target(true)
            .with_thread_names(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .map_err(|e| init_failed(e.to_string()))?;

    let metrics_handle = metrics::install_prometheus(&config.metrics, config.metrics_expose)?;

    OBSERVABILITY_INIT
        .set(())
        .map_err(|()| init_failed("failed to mark observability initialized"))?;

    Ok(ObservabilityHandle { metrics_handle })
}

/// Opens a log file for appending, creating its directory.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_log_dir".to_string(),
            cause: format!("{}: {e}", parent.display()),
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::OperationFailed {
            operation: "open_log_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })
}

fn init_failed(cause: impl Into<String>) -> Error {
    Error::OperationFailed {
        operation: "observability_init".to_string(),
        cause: cause.into(),
    }
}
