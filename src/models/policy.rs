//! Retention policy types.

use super::RepositoryId;
use crate::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a policy pattern is matched against.
///
/// The set is closed: every consumer matches exhaustively, so a new kind
/// cannot be silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyKind {
    /// Pattern is matched against the commit hash itself.
    GitCommit,
    /// Pattern is matched against tag names.
    GitTag,
    /// Pattern is matched against branch names.
    GitTree,
}

impl PolicyKind {
    /// Returns all policy kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::GitCommit, Self::GitTag, Self::GitTree]
    }

    /// Returns the stored representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GitCommit => "GIT_COMMIT",
            Self::GitTag => "GIT_TAG",
            Self::GitTree => "GIT_TREE",
        }
    }

    /// Parses a policy kind.
    ///
    /// Accepts the stored form (`GIT_TREE`) as well as the short CLI forms
    /// (`tree`, `branch`, `tag`, `commit`), case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown kind.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "git_commit" | "commit" => Ok(Self::GitCommit),
            "git_tag" | "tag" => Ok(Self::GitTag),
            "git_tree" | "tree" | "branch" => Ok(Self::GitTree),
            _ => Err(Error::InvalidInput(format!("unknown policy kind: {s}"))),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which policies to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyScope {
    /// Policies applying to every repository.
    Global,
    /// Policies bound to a single repository.
    Repository(RepositoryId),
}

/// A data retention policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Policy identifier.
    pub id: i64,
    /// Owning repository; `None` for global policies.
    pub repository_id: Option<RepositoryId>,
    /// What the pattern is matched against.
    pub kind: PolicyKind,
    /// Glob pattern.
    pub pattern: String,
    /// Whether the policy participates in data retention.
    pub retention_enabled: bool,
    /// How long after completion an upload stays protected; `None` is indefinite.
    pub retention_duration: Option<TimeDelta>,
    /// Whether commits contained in (not only tipping) a matching branch are protected.
    pub retain_intermediate_commits: bool,
}

impl RetentionPolicy {
    /// Creates an enabled global policy with indefinite retention.
    #[must_use]
    pub fn new(id: i64, kind: PolicyKind, pattern: impl Into<String>) -> Self {
        Self {
            id,
            repository_id: None,
            kind,
            pattern: pattern.into(),
            retention_enabled: true,
            retention_duration: None,
            retain_intermediate_commits: false,
        }
    }

    /// Binds the policy to a repository.
    #[must_use]
    pub fn for_repository(mut self, repository_id: RepositoryId) -> Self {
        self.repository_id = Some(repository_id);
        self
    }

    /// Sets the retention duration.
    #[must_use]
    pub fn with_duration(mut self, duration: TimeDelta) -> Self {
        self.retention_duration = Some(duration);
        self
    }

    /// Sets whether intermediate branch commits are retained.
    #[must_use]
    pub fn with_retain_intermediate_commits(mut self, retain: bool) -> Self {
        self.retain_intermediate_commits = retain;
        self
    }

    /// Sets whether the policy participates in retention.
    #[must_use]
    pub fn with_retention_enabled(mut self, enabled: bool) -> Self {
        self.retention_enabled = enabled;
        self
    }

    /// Returns the policy scope.
    #[must_use]
    pub const fn scope(&self) -> PolicyScope {
        match self.repository_id {
            Some(id) => PolicyScope::Repository(id),
            None => PolicyScope::Global,
        }
    }

    /// Returns `true` if the policy still covers an upload that finished at
    /// `finished_at`, as seen from `now`.
    ///
    /// A policy without a duration covers every age.
    #[must_use]
    pub fn covers(&self, finished_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.retention_duration
            .is_none_or(|duration| now.signed_duration_since(finished_at) <= duration)
    }
}
