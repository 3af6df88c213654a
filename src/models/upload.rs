//! Upload records.

use super::{RepositoryId, UploadId};
use crate::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    /// Waiting to be processed.
    #[default]
    Queued,
    /// Being converted into an index.
    Processing,
    /// Processed successfully; the only state retention scans consider.
    Completed,
    /// Processing failed.
    Errored,
    /// Removed by the downstream deleter.
    Deleted,
}

impl UploadState {
    /// Returns the stored representation of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::Deleted => "deleted",
        }
    }

    /// Parses an upload state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown state.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "errored" => Ok(Self::Errored),
            "deleted" => Ok(Self::Deleted),
            _ => Err(Error::InvalidInput(format!("unknown upload state: {s}"))),
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A precise code-intelligence upload tied to one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    /// Upload identifier.
    pub id: UploadId,
    /// Repository the upload belongs to.
    pub repository_id: RepositoryId,
    /// Commit the index was built for.
    pub commit: String,
    /// Lifecycle state.
    pub state: UploadState,
    /// When processing finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// When a retention scan last found the upload protected.
    pub last_retention_scan_at: Option<DateTime<Utc>>,
    /// Whether a retention scan marked the upload expired.
    pub expired: bool,
}

impl Upload {
    /// Creates a completed upload that finished at `finished_at`.
    #[must_use]
    pub fn completed(
        id: UploadId,
        repository_id: RepositoryId,
        commit: impl Into<String>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            repository_id,
            commit: commit.into(),
            state: UploadState::Completed,
            finished_at: Some(finished_at),
            last_retention_scan_at: None,
            expired: false,
        }
    }

    /// Age of the upload as seen from `now`.
    ///
    /// An upload without a completion time is treated as brand new, so it
    /// is covered by every policy rather than expired early.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        self.finished_at
            .map_or(TimeDelta::zero(), |finished_at| {
                now.signed_duration_since(finished_at)
            })
    }
}
