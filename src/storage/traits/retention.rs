//! Retention store trait.
//!
//! The retention store owns upload records, retention policies and the
//! per-repository scan cursor. The scanner only reads from it, except for
//! [`RetentionStore::persist_retention_decision`], which is the single write
//! path for scan results.
//!
//! # Error Modes and Guarantees
//!
//! All methods return [`crate::Result`]. Any error is treated as transient by
//! the scanner: the repository being scanned is abandoned and the next
//! scheduled run retries it. No decision is persisted for a batch whose
//! evaluation failed, so a store error can never cause an upload to be
//! marked expired.
//!
//! ## Ordering Contract
//!
//! | Method | Ordering |
//! |--------|----------|
//! | `repositories_due_for_scan` | Never-scanned first, then least recently scanned |
//! | `completed_uploads` | Oldest completion first, ties by id |
//! | `commits_visible_to_upload` | Stable across pages of one upload |

use crate::Result;
use crate::models::{PolicyScope, RepositoryId, RetentionPolicy, Upload, UploadId};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Trait for stores backing the retention scanner.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn RetentionStore>`
/// - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
/// - `repositories_due_for_scan` must advance its cursor so repeated calls
///   eventually cover every repository
pub trait RetentionStore: Send + Sync {
    /// Returns up to `limit` repositories not scanned within `process_delay`,
    /// least recently scanned first, and records them as scanned now.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried or updated.
    fn repositories_due_for_scan(
        &self,
        process_delay: Duration,
        limit: usize,
    ) -> Result<Vec<RepositoryId>>;

    /// Returns the retention-enabled policies for the given scope.
    ///
    /// [`PolicyScope::Repository`] returns only policies bound to that
    /// repository; global policies are loaded separately.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn retention_policies(&self, scope: PolicyScope) -> Result<Vec<RetentionPolicy>>;

    /// Returns up to `limit` completed, unexpired uploads of a repository
    /// whose last retention scan precedes `last_scan_before` (or never
    /// happened), oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn completed_uploads(
        &self,
        repository_id: RepositoryId,
        limit: usize,
        last_scan_before: DateTime<Utc>,
    ) -> Result<Vec<Upload>>;

    /// Returns one page of the commits an upload is visible from.
    ///
    /// An empty page signals the end of the set.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn commits_visible_to_upload(
        &self,
        upload_id: UploadId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<String>>;

    /// Bumps the last retention scan time of `protected_ids` and sets the
    /// expired flag on `expired_ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails; implementations should apply
    /// both sets atomically.
    fn persist_retention_decision(
        &self,
        protected_ids: &[UploadId],
        expired_ids: &[UploadId],
    ) -> Result<()>;
}
