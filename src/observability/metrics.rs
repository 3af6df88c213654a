//! Prometheus metrics.
//!
//! | Metric | Kind | Labels |
//! |--------|------|--------|
//! | `retention_upload_expirer_runs_total` | counter | `status` |
//! | `retention_upload_expirer_errors_total` | counter | |
//! | `retention_upload_expirer_duration_ms` | histogram | |
//! | `retention_upload_expirer_repositories_scanned_total` | counter | |
//! | `retention_upload_expirer_repositories_failed_total` | counter | |
//! | `retention_upload_expirer_uploads_protected_total` | counter | |
//! | `retention_upload_expirer_uploads_expired_total` | counter | |
//! | `retention_protected_uploads_total` | counter | `path` |
//! | `retention_branches_containing_queries_total` | counter | |
//! | `retention_sqlite_mutex_poison_recovery_total` | counter | |

use crate::config::MetricsSettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Port of the Prometheus endpoint when none is configured.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether metrics are recorded at all.
    pub enabled: bool,
    /// Address of the scrape endpoint.
    pub listen_addr: SocketAddr,
}

impl MetricsConfig {
    /// Builds metrics configuration from config settings.
    #[must_use]
    pub fn from_settings(settings: &MetricsSettings) -> Self {
        let port = settings.port.unwrap_or(DEFAULT_METRICS_PORT);
        Self {
            enabled: settings.enabled.unwrap_or(false),
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        }
    }
}

fn exporter_failed(operation: &'static str) -> impl Fn(String) -> Error {
    move |cause| Error::OperationFailed {
        operation: operation.to_string(),
        cause,
    }
}

/// Installs the global Prometheus recorder.
///
/// With `expose`, the scrape endpoint is served on `listen_addr` from the
/// current Tokio runtime; one-shot commands record without serving.
/// Returns `None` when metrics are disabled.
///
/// # Errors
///
/// Returns an error if a recorder is already installed, if `expose` is set
/// outside a Tokio runtime, or if the listener cannot be built.
pub fn install_prometheus(config: &MetricsConfig, expose: bool) -> Result<Option<PrometheusHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    let (recorder, exporter) = if expose {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| exporter_failed("metrics_runtime")(e.to_string()))?;
        let _guard = runtime.enter();
        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(config.listen_addr)
            .build()
            .map_err(|e| exporter_failed("metrics_exporter_build")(e.to_string()))?;
        (recorder, Some((runtime.clone(), exporter)))
    } else {
        (PrometheusBuilder::new().build_recorder(), None)
    };

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|e| exporter_failed("metrics_recorder_install")(e.to_string()))?;
    if let Some((runtime, exporter)) = exporter {
        runtime.spawn(exporter);
    }
    describe_metrics();

    tracing::info!(listen_addr = %config.listen_addr, expose, "Installed Prometheus recorder");
    Ok(Some(handle))
}

fn describe_metrics() {
    metrics::describe_counter!(
        "retention_upload_expirer_runs_total",
        "Upload expirer runs by outcome"
    );
    metrics::describe_histogram!(
        "retention_upload_expirer_duration_ms",
        metrics::Unit::Milliseconds,
        "Duration of upload expirer runs"
    );
    metrics::describe_counter!(
        "retention_upload_expirer_uploads_expired_total",
        "Uploads marked expired"
    );
    metrics::describe_counter!(
        "retention_protected_uploads_total",
        "Protected uploads by the path that proved protection"
    );
    metrics::describe_counter!(
        "retention_branches_containing_queries_total",
        "Branch containment queries sent to the reference provider"
    );
}
