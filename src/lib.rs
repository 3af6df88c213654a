//! # codeintel-retention
//!
//! Data retention scanning for precise code-intelligence uploads.
//!
//! Uploads are compiled code-intelligence indexes attached to a single commit.
//! This crate periodically evaluates global and repository-scoped retention
//! policies against each repository's git topology and marks every completed
//! upload as either protected (its scan timestamp is bumped) or expired (a
//! downstream process removes it once nothing depends on it).
//!
//! ## Features
//!
//! - Two-phase policy matching: cheap branch/tag tip matching first, branch
//!   containment queries only when needed
//! - Scan-scoped memoization of protected commits and containing branches
//! - Fair, rotating selection of repositories across successive runs
//! - Pluggable collaborators (`RetentionStore`, `RefProvider`) with `SQLite`
//!   and `git2` implementations
//!
//! ## Example
//!
//! ```rust,ignore
//! use codeintel_retention::gc::{ExpirerConfig, UploadExpirer};
//! use codeintel_retention::git::GitRefProvider;
//! use codeintel_retention::storage::SqliteRetentionStore;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let store = Arc::new(SqliteRetentionStore::new("retention.db")?);
//! let refs = Arc::new(GitRefProvider::new("/var/lib/repos"));
//! let expirer = UploadExpirer::new(store, refs, config);
//!
//! let summary = expirer.handle(&CancellationToken::new())?;
//! println!("{}", summary.summary());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod gc;
pub mod git;
pub mod models;
pub mod observability;
pub mod storage;

// Re-exports for convenience
pub use config::RetentionAppConfig;
pub use gc::{ExpirerConfig, ExpirerRunSummary, UploadExpirer};
pub use models::{
    PolicyKind, PolicyScope, RefDescription, RefDescriptions, RefKind, RepositoryId,
    RetentionPolicy, Upload, UploadId, UploadState,
};
pub use storage::{RefProvider, RetentionStore};

/// Error type for retention operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Unknown policy kind, malformed CLI or config values |
/// | `OperationFailed` | Store queries fail, git operations fail, I/O errors |
/// | `InvalidPattern` | A retention policy pattern does not compile |
/// | `Cancelled` | The driving cancellation token fired mid-scan |
/// | `RepositoryScans` | One or more repositories failed during a run |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation against a collaborator failed.
    ///
    /// These failures are treated as transient: the repository being
    /// scanned is abandoned and picked up again by a later run.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A retention policy pattern failed to compile.
    ///
    /// Deterministic: the owning repository cannot be scanned until the
    /// policy is corrected.
    #[error("failed to compile glob pattern `{pattern}` in configuration policy {policy_id}: {cause}")]
    InvalidPattern {
        /// Identifier of the offending policy.
        policy_id: i64,
        /// The pattern as written in the policy.
        pattern: String,
        /// The compiler's explanation.
        cause: String,
    },

    /// The scan was cancelled before it completed.
    #[error("retention scan cancelled")]
    Cancelled,

    /// One or more repositories failed during a single run.
    #[error("{0}")]
    RepositoryScans(RepositoryScanErrors),
}

/// Result type alias for retention operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A failure scanning a single repository.
#[derive(Debug)]
pub struct RepositoryScanError {
    /// The repository whose scan was abandoned.
    pub repository_id: RepositoryId,
    /// Why it was abandoned.
    pub source: Error,
}

/// Per-repository failures collected over one run.
///
/// Every underlying message is kept so the combined error stays useful for
/// diagnostics; nothing is dropped in favour of the first failure.
#[derive(Debug, Default)]
pub struct RepositoryScanErrors {
    errors: Vec<RepositoryScanError>,
}

impl RepositoryScanErrors {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Records a failed repository.
    pub fn push(&mut self, repository_id: RepositoryId, source: Error) {
        self.errors.push(RepositoryScanError {
            repository_id,
            source,
        });
    }

    /// Returns `true` if no repository failed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failed repositories.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterates over the recorded failures.
    pub fn iter(&self) -> impl Iterator<Item = &RepositoryScanError> {
        self.errors.iter()
    }

    /// Converts into `Ok(())` when empty, otherwise into an aggregate error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RepositoryScans`] if any failure was recorded.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::RepositoryScans(self))
        }
    }
}

impl std::fmt::Display for RepositoryScanErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} repositories failed retention scan:", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n\t* repository {}: {}", err.repository_id, err.source)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::InvalidPattern {
            policy_id: 7,
            pattern: "[".to_string(),
            cause: "invalid range pattern".to_string(),
        };
        assert!(err.to_string().contains("`[`"));
        assert!(err.to_string().contains("policy 7"));
    }

    #[test]
    fn test_repository_scan_errors_keep_every_message() {
        let mut errors = RepositoryScanErrors::new();
        assert!(errors.is_empty());

        errors.push(
            50,
            Error::OperationFailed {
                operation: "ref_descriptions".to_string(),
                cause: "connection reset".to_string(),
            },
        );
        errors.push(51, Error::Cancelled);
        assert_eq!(errors.len(), 2);

        let message = errors.to_string();
        assert!(message.contains("2 repositories failed"));
        assert!(message.contains("repository 50"));
        assert!(message.contains("connection reset"));
        assert!(message.contains("repository 51"));
        assert!(message.contains("cancelled"));
    }

    #[test]
    fn test_repository_scan_errors_into_result() {
        assert!(RepositoryScanErrors::new().into_result().is_ok());

        let mut errors = RepositoryScanErrors::new();
        errors.push(1, Error::Cancelled);
        assert!(matches!(
            errors.into_result(),
            Err(Error::RepositoryScans(ref e)) if e.len() == 1
        ));
    }
}
