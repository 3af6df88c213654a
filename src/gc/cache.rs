//! Scan-scoped repository cache.

use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;

/// Bound on the commit → containing-branches cache for one repository.
///
/// Trades duplicate reference queries on very large repositories for a
/// fixed memory ceiling.
pub const BRANCHES_CONTAINING_CAPACITY: usize = 10_000;

/// Memoized facts about one repository, valid for a single scan only.
///
/// Commit hashes are only unique within a repository and reference
/// topology changes between runs, so a cache is never shared across
/// repositories or reused by a later run. It is passed explicitly through
/// the evaluation call chain and owned by the single thread scanning the
/// repository, so it needs no locking.
#[derive(Debug)]
pub struct RepositoryCache {
    /// Commits shown to be protected.
    ///
    /// Uploads are visited oldest first, so every later upload visible from
    /// one of these commits is younger and protected by the same policy.
    protected_commits: HashSet<String>,

    /// Branches containing a commit, as last reported by the ref provider.
    ///
    /// Commit order and upload order are usually correlated, so recently
    /// queried commits tend to be queried again soon.
    branches_containing: LruCache<String, Vec<String>>,

    /// Number of containment answers inserted, i.e. provider queries made.
    branch_lookups: usize,
}

impl Default for RepositoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryCache {
    /// Creates an empty cache with the default containment capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(BRANCHES_CONTAINING_CAPACITY)
    }

    /// Creates an empty cache holding at most `capacity` containment entries.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            protected_commits: HashSet::new(),
            branches_containing: LruCache::new(capacity),
            branch_lookups: 0,
        }
    }

    /// Returns `true` if `commit` was shown to be protected.
    #[must_use]
    pub fn is_protected(&self, commit: &str) -> bool {
        self.protected_commits.contains(commit)
    }

    /// Returns `true` if any of `commits` was shown to be protected.
    #[must_use]
    pub fn any_protected(&self, commits: &[String]) -> bool {
        commits.iter().any(|commit| self.is_protected(commit))
    }

    /// Records `commit` as protected.
    pub fn mark_protected(&mut self, commit: impl Into<String>) {
        self.protected_commits.insert(commit.into());
    }

    /// Number of commits known to be protected.
    #[must_use]
    pub fn protected_len(&self) -> usize {
        self.protected_commits.len()
    }

    /// Looks up the branches containing `commit`, refreshing its recency.
    pub fn branches_containing(&mut self, commit: &str) -> Option<&[String]> {
        self.branches_containing.get(commit).map(Vec::as_slice)
    }

    /// Stores the branches containing `commit`, evicting the least recently
    /// used entry when full.
    pub fn insert_branches_containing(&mut self, commit: impl Into<String>, branches: Vec<String>) {
        self.branch_lookups += 1;
        self.branches_containing.put(commit.into(), branches);
    }

    /// Number of containment answers currently cached.
    #[must_use]
    pub fn branches_containing_len(&self) -> usize {
        self.branches_containing.len()
    }

    /// Number of containment answers ever inserted.
    #[must_use]
    pub const fn branch_lookups(&self) -> usize {
        self.branch_lookups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_commits_are_monotonic() {
        let mut cache = RepositoryCache::new();
        assert!(!cache.is_protected("deadbeef01"));

        cache.mark_protected("deadbeef01");
        cache.mark_protected("deadbeef01");
        assert!(cache.is_protected("deadbeef01"));
        assert_eq!(cache.protected_len(), 1);

        assert!(cache.any_protected(&["cafebabe".to_string(), "deadbeef01".to_string()]));
        assert!(!cache.any_protected(&["cafebabe".to_string()]));
        assert!(!cache.any_protected(&[]));
    }

    #[test]
    fn test_branches_containing_roundtrip() {
        let mut cache = RepositoryCache::new();
        assert!(cache.branches_containing("deadbeef08").is_none());

        cache.insert_branches_containing("deadbeef08", vec!["ef/feature-x".to_string()]);
        assert_eq!(
            cache.branches_containing("deadbeef08"),
            Some(&["ef/feature-x".to_string()][..])
        );
        assert_eq!(cache.branch_lookups(), 1);
    }

    #[test]
    fn test_branches_containing_evicts_least_recently_used() {
        let mut cache = RepositoryCache::with_capacity(2);
        cache.insert_branches_containing("a", vec!["main".to_string()]);
        cache.insert_branches_containing("b", vec![]);

        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.branches_containing("a").is_some());
        cache.insert_branches_containing("c", vec![]);

        assert_eq!(cache.branches_containing_len(), 2);
        assert!(cache.branches_containing("a").is_some());
        assert!(cache.branches_containing("b").is_none());
        assert!(cache.branches_containing("c").is_some());
        assert_eq!(cache.branch_lookups(), 3);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut cache = RepositoryCache::with_capacity(0);
        cache.insert_branches_containing("a", vec![]);
        assert_eq!(cache.branches_containing_len(), 1);
    }
}
