//! Periodic driver for the upload expirer.

use super::expirer::UploadExpirer;
use crate::Error;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runs the upload expirer every configured interval until `token` fires.
///
/// Each run executes on the blocking thread pool and is awaited before the
/// next one is scheduled, so runs never overlap. A failed run is logged and
/// retried on the next tick; there is no in-place retry.
///
/// Returns the number of runs started.
pub async fn run_upload_expirer(expirer: Arc<UploadExpirer>, token: CancellationToken) -> usize {
    let interval = expirer.config().interval;
    info!(
        interval_secs = interval.as_secs(),
        repository_batch_size = expirer.config().repository_batch_size,
        upload_batch_size = expirer.config().upload_batch_size,
        "Starting upload expirer worker"
    );

    let mut runs = 0;
    while !token.is_cancelled() {
        runs += 1;

        let run_expirer = Arc::clone(&expirer);
        let run_token = token.clone();
        match tokio::task::spawn_blocking(move || run_expirer.handle(&run_token)).await {
            Ok(Ok(summary)) => {
                if summary.uploads_scanned() > 0 {
                    info!(summary = %summary.summary(), "Upload expirer run complete");
                } else {
                    debug!("Upload expirer run complete, nothing to scan");
                }
            },
            Ok(Err(Error::Cancelled)) => break,
            Ok(Err(e)) => {
                error!(error = %e, "Failed to expire old codeintel records");
                metrics::counter!("retention_upload_expirer_errors_total").increment(1);
            },
            Err(e) => {
                error!(error = %e, "Upload expirer task join error");
                metrics::counter!("retention_upload_expirer_errors_total").increment(1);
            },
        }

        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(interval) => {},
        }
    }

    info!(runs, "Upload expirer worker stopped");
    runs
}
