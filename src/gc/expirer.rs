//! Upload expirer.
//!
//! Periodically compares the age of completed uploads against the global and
//! repository-scoped retention policies protecting them. Protected uploads
//! have their last retention scan time bumped; the rest are marked expired
//! and left for a downstream process to delete once unreferenced.
//!
//! # Processing Order
//!
//! Repositories are scanned one after another. Within a repository, uploads
//! are fetched oldest first in batches and evaluated in that order against a
//! [`RepositoryCache`] created for that repository alone. The order is what
//! makes cached protection facts valid for later uploads; it must not be
//! parallelized or reordered.
//!
//! # Example
//!
//! ```rust,ignore
//! use codeintel_retention::gc::{ExpirerConfig, UploadExpirer};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ExpirerConfig {
//!     repository_process_delay: Duration::from_secs(86_400),
//!     repository_batch_size: 100,
//!     upload_process_delay: Duration::from_secs(86_400),
//!     upload_batch_size: 100,
//!     interval: Duration::from_secs(60),
//! };
//! let expirer = UploadExpirer::new(store, refs, config);
//!
//! let summary = expirer.handle(&CancellationToken::new())?;
//! println!("{}", summary.summary());
//! ```

use super::cache::RepositoryCache;
use super::patterns::CompiledPatterns;
use super::protection::{ProtectionEvaluator, ScanContext};
use crate::models::{PolicyScope, RepositoryId, RetentionPolicy, Upload};
use crate::storage::{RefProvider, RetentionStore};
use crate::{Error, RepositoryScanErrors, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, warn};

/// Safely converts Duration to milliseconds as u64, capping at `u64::MAX`.
#[inline]
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Converts u64 to f64 for metrics, capping at `u32::MAX`.
#[inline]
fn u64_to_f64(value: u64) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

/// Converts usize to u64 for metrics counters.
#[inline]
fn usize_to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Returns `now - delay`, clamped to the earliest representable time.
fn boundary(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    let delay = TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
    now.checked_sub_signed(delay)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Upload expirer configuration.
///
/// Every value is required; nothing is defaulted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirerConfig {
    /// Minimum time between two scans of the same repository.
    pub repository_process_delay: Duration,

    /// Maximum repositories scanned per run.
    pub repository_batch_size: usize,

    /// Minimum time between two evaluations of the same upload.
    pub upload_process_delay: Duration,

    /// Uploads fetched, evaluated and persisted together.
    pub upload_batch_size: usize,

    /// Time between two runs of the periodic worker.
    pub interval: Duration,
}

impl ExpirerConfig {
    /// Checks that the configuration can make progress.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a batch size or the interval is
    /// zero.
    pub fn validate(&self) -> Result<()> {
        if self.repository_batch_size == 0 {
            return Err(Error::InvalidInput(
                "repository_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.upload_batch_size == 0 {
            return Err(Error::InvalidInput(
                "upload_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.interval.is_zero() {
            return Err(Error::InvalidInput(
                "interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a single expirer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpirerRunSummary {
    /// Repositories selected for this run.
    pub repositories_selected: usize,

    /// Repositories whose scan ran to completion.
    pub repositories_scanned: usize,

    /// Repositories whose scan was abandoned.
    pub repositories_failed: usize,

    /// Upload batches persisted.
    pub batches_persisted: usize,

    /// Uploads whose scan time was bumped.
    pub uploads_protected: usize,

    /// Uploads marked expired.
    pub uploads_expired: usize,

    /// Branch-containment queries sent to the reference provider.
    pub branch_queries: usize,

    /// Duration of the run in milliseconds.
    pub duration_ms: u64,
}

impl ExpirerRunSummary {
    /// Number of uploads with a persisted decision.
    #[must_use]
    pub const fn uploads_scanned(&self) -> usize {
        self.uploads_protected + self.uploads_expired
    }

    /// Returns a human-readable summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.repositories_selected == 0 {
            return format!(
                "No repositories due for retention scan ({}ms)",
                self.duration_ms
            );
        }

        format!(
            "Scanned {}/{} repositories: {} uploads protected, {} expired, {} failed, \
             {} branch queries in {}ms",
            self.repositories_scanned,
            self.repositories_selected,
            self.uploads_protected,
            self.uploads_expired,
            self.repositories_failed,
            self.branch_queries,
            self.duration_ms
        )
    }
}

/// Retention scanner marking completed uploads as protected or expired.
///
/// # Thread Safety
///
/// Collaborators are shared through `Arc`. A single expirer must not run
/// two scans at once; the periodic worker guarantees this by awaiting each
/// run before scheduling the next.
pub struct UploadExpirer {
    store: Arc<dyn RetentionStore>,
    refs: Arc<dyn RefProvider>,
    config: ExpirerConfig,
}

impl UploadExpirer {
    /// Creates a new upload expirer.
    #[must_use]
    pub fn new(
        store: Arc<dyn RetentionStore>,
        refs: Arc<dyn RefProvider>,
        config: ExpirerConfig,
    ) -> Self {
        // Arc::strong_count prevents clippy::missing_const_for_fn false positive
        let _ = Arc::strong_count(&store);
        Self {
            store,
            refs,
            config,
        }
    }

    /// Returns the expirer configuration.
    #[must_use]
    pub const fn config(&self) -> &ExpirerConfig {
        &self.config
    }

    /// Runs one retention scan over the repositories currently due.
    ///
    /// A repository failure does not stop the others: failures are collected
    /// and reported together once every selected repository was attempted.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `token` fired; the repository in progress is
    ///   abandoned and the remaining ones are left for the next run
    /// - [`Error::RepositoryScans`] if any repository failed
    /// - Any store error raised while selecting repositories or loading the
    ///   global policies
    #[instrument(
        name = "retention.expirer.run",
        skip(self, token),
        fields(
            component = "gc",
            operation = "upload_expirer",
            repository_batch_size = self.config.repository_batch_size,
            upload_batch_size = self.config.upload_batch_size
        )
    )]
    pub fn handle(&self, token: &CancellationToken) -> Result<ExpirerRunSummary> {
        let start = Instant::now();
        let mut summary = ExpirerRunSummary::default();

        let outcome = self.scan_due_repositories(token, &mut summary);

        summary.duration_ms = duration_to_millis(start.elapsed());
        self.record_run(&summary, outcome.as_ref().err());

        outcome.map(|()| summary)
    }

    fn scan_due_repositories(
        &self,
        token: &CancellationToken,
        summary: &mut ExpirerRunSummary,
    ) -> Result<()> {
        let repository_ids = self.store.repositories_due_for_scan(
            self.config.repository_process_delay,
            self.config.repository_batch_size,
        )?;
        summary.repositories_selected = repository_ids.len();
        if repository_ids.is_empty() {
            debug!("All repositories scanned recently enough");
            return Ok(());
        }

        let global_policies = self.store.retention_policies(PolicyScope::Global)?;
        debug!(
            repositories = repository_ids.len(),
            global_policies = global_policies.len(),
            "Starting retention scan"
        );

        let mut errors = RepositoryScanErrors::new();
        for repository_id in repository_ids {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match self.handle_repository(repository_id, &global_policies, token, summary) {
                Ok(()) => summary.repositories_scanned += 1,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(repository_id, error = %e, "Repository retention scan failed");
                    summary.repositories_failed += 1;
                    errors.push(repository_id, e);
                },
            }
        }

        errors.into_result()
    }

    fn handle_repository(
        &self,
        repository_id: RepositoryId,
        global_policies: &[RetentionPolicy],
        token: &CancellationToken,
        summary: &mut ExpirerRunSummary,
    ) -> Result<()> {
        let span = info_span!("retention.expirer.repository", repository_id);
        let _enter = span.enter();

        let mut policies = global_policies.to_vec();
        policies.extend(
            self.store
                .retention_policies(PolicyScope::Repository(repository_id))?,
        );

        let patterns = CompiledPatterns::compile(&policies)?;
        let ref_descriptions = self.refs.ref_descriptions(repository_id)?;

        let now = Utc::now();
        let scan = ScanContext {
            repository_id,
            policies,
            patterns,
            ref_descriptions,
            now,
        };
        let evaluator = ProtectionEvaluator::new(self.store.as_ref(), self.refs.as_ref(), &scan);
        let mut cache = RepositoryCache::new();

        // Fixed for the whole repository: every upload handled below is
        // persisted with a later scan time, so no batch can return it again.
        let scan_before = boundary(now, self.config.upload_process_delay);

        let result = self.drain_uploads(
            &evaluator,
            &mut cache,
            repository_id,
            scan_before,
            token,
            summary,
        );
        summary.branch_queries += cache.branch_lookups();

        debug!(
            protected_commits = cache.protected_len(),
            branch_lookups = cache.branch_lookups(),
            "Repository retention scan finished"
        );
        result
    }

    /// Handles batches until no upload is left before `scan_before`.
    fn drain_uploads(
        &self,
        evaluator: &ProtectionEvaluator<'_, dyn RetentionStore, dyn RefProvider>,
        cache: &mut RepositoryCache,
        repository_id: RepositoryId,
        scan_before: DateTime<Utc>,
        token: &CancellationToken,
        summary: &mut ExpirerRunSummary,
    ) -> Result<()> {
        loop {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let uploads = self.store.completed_uploads(
                repository_id,
                self.config.upload_batch_size,
                scan_before,
            )?;
            if uploads.is_empty() {
                return Ok(());
            }

            self.handle_uploads(evaluator, cache, &uploads, token, summary)?;
        }
    }

    fn handle_uploads(
        &self,
        evaluator: &ProtectionEvaluator<'_, dyn RetentionStore, dyn RefProvider>,
        cache: &mut RepositoryCache,
        uploads: &[Upload],
        token: &CancellationToken,
        summary: &mut ExpirerRunSummary,
    ) -> Result<()> {
        let mut protected_ids = Vec::with_capacity(uploads.len());
        let mut expired_ids = Vec::with_capacity(uploads.len());

        for upload in uploads {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if evaluator.is_protected(upload, cache)? {
                protected_ids.push(upload.id);
            } else {
                expired_ids.push(upload.id);
            }
        }

        self.store
            .persist_retention_decision(&protected_ids, &expired_ids)?;

        summary.batches_persisted += 1;
        summary.uploads_protected += protected_ids.len();
        summary.uploads_expired += expired_ids.len();
        metrics::counter!("retention_upload_expirer_uploads_protected_total")
            .increment(usize_to_u64(protected_ids.len()));
        metrics::counter!("retention_upload_expirer_uploads_expired_total")
            .increment(usize_to_u64(expired_ids.len()));

        debug!(
            protected = protected_ids.len(),
            expired = expired_ids.len(),
            "Persisted retention decisions"
        );
        Ok(())
    }

    fn record_run(&self, summary: &ExpirerRunSummary, error: Option<&Error>) {
        let status = match error {
            None => "success",
            Some(Error::Cancelled) => "cancelled",
            Some(_) => "error",
        };

        metrics::counter!("retention_upload_expirer_runs_total", "status" => status).increment(1);
        metrics::counter!("retention_upload_expirer_repositories_scanned_total")
            .increment(usize_to_u64(summary.repositories_scanned));
        metrics::counter!("retention_upload_expirer_repositories_failed_total")
            .increment(usize_to_u64(summary.repositories_failed));
        metrics::histogram!("retention_upload_expirer_duration_ms")
            .record(u64_to_f64(summary.duration_ms));

        info!(
            repositories_selected = summary.repositories_selected,
            repositories_scanned = summary.repositories_scanned,
            repositories_failed = summary.repositories_failed,
            uploads_protected = summary.uploads_protected,
            uploads_expired = summary.uploads_expired,
            branch_queries = summary.branch_queries,
            duration_ms = summary.duration_ms,
            status,
            repository_batch_size = self.config.repository_batch_size,
            "Upload expirer run completed"
        );
    }
}
