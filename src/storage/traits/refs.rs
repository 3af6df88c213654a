//! Git reference provider trait.

use crate::Result;
use crate::models::{RefDescriptions, RepositoryId};

/// Trait for sources of git reference topology.
///
/// Both calls may block on network or disk I/O. The scanner fetches
/// [`RefProvider::ref_descriptions`] once per repository per run and calls
/// [`RefProvider::branches_containing`] only when tip matching was
/// inconclusive, caching the answers itself.
pub trait RefProvider: Send + Sync {
    /// Returns every branch and tag tip of a repository, keyed by commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn ref_descriptions(&self, repository_id: RepositoryId) -> Result<RefDescriptions>;

    /// Returns the names of the branches whose history contains `commit`.
    ///
    /// A branch contains its own tip. An unknown commit yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn branches_containing(&self, repository_id: RepositoryId, commit: &str)
    -> Result<Vec<String>>;
}
