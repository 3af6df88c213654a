//! Upload protection evaluation.
//!
//! Decides whether an upload is still protected by a retention policy by
//! walking the commits it is visible from, one page at a time:
//!
//! 1. A commit already shown to be protected settles the question.
//! 2. Fast path: policies covering the upload's age are matched against the
//!    commit hash and the branch/tag tips fetched once per repository.
//! 3. Slow path: covering policies that retain intermediate commits are
//!    matched against every branch containing the commit, queried from the
//!    [`RefProvider`] on demand and cached.
//!
//! Any protecting commit is recorded in the [`RepositoryCache`], so younger
//! uploads visible from it are settled by step 1.

use super::cache::RepositoryCache;
use super::matcher::{contains_policy_matches, tip_policy_matches};
use super::patterns::CompiledPatterns;
use crate::Result;
use crate::models::{RefDescriptions, RepositoryId, RetentionPolicy, Upload};
use crate::storage::{RefProvider, RetentionStore};
use chrono::{DateTime, Utc};

/// Number of visible commits fetched per page.
pub const VISIBLE_COMMITS_PAGE_SIZE: usize = 100;

/// Everything about one repository that stays fixed for a whole scan.
#[derive(Debug)]
pub struct ScanContext {
    /// Repository being scanned.
    pub repository_id: RepositoryId,
    /// Global and repository policies, retention-enabled only.
    pub policies: Vec<RetentionPolicy>,
    /// Compiled form of every policy pattern.
    pub patterns: CompiledPatterns,
    /// Branch and tag tips, keyed by commit.
    pub ref_descriptions: RefDescriptions,
    /// Reference time for upload ages.
    pub now: DateTime<Utc>,
}

impl ScanContext {
    /// Builds a scan context, compiling the pattern of every policy.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidPattern`] if any pattern does not
    /// compile.
    pub fn new(
        repository_id: RepositoryId,
        policies: Vec<RetentionPolicy>,
        ref_descriptions: RefDescriptions,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let patterns = CompiledPatterns::compile(&policies)?;
        Ok(Self {
            repository_id,
            policies,
            patterns,
            ref_descriptions,
            now,
        })
    }

    /// Policies whose retention window still covers `upload`.
    fn policies_covering(&self, upload: &Upload) -> Vec<&RetentionPolicy> {
        let finished_at = upload.finished_at.unwrap_or(self.now);
        self.policies
            .iter()
            .filter(|policy| policy.covers(finished_at, self.now))
            .collect()
    }
}

/// Evaluates uploads of one repository against its retention policies.
pub struct ProtectionEvaluator<'a, S: RetentionStore + ?Sized, R: RefProvider + ?Sized> {
    store: &'a S,
    refs: &'a R,
    scan: &'a ScanContext,
}

impl<'a, S: RetentionStore + ?Sized, R: RefProvider + ?Sized> ProtectionEvaluator<'a, S, R> {
    /// Creates an evaluator over the given collaborators and scan context.
    pub const fn new(store: &'a S, refs: &'a R, scan: &'a ScanContext) -> Self {
        Self { store, refs, scan }
    }

    /// Returns `true` if any commit `upload` is visible from is protected.
    ///
    /// Uploads must be evaluated oldest first against the same `cache`:
    /// a cached protected commit is only known to protect uploads no older
    /// than the one that put it there.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the ref provider fails. No partial
    /// answer is produced.
    pub fn is_protected(&self, upload: &Upload, cache: &mut RepositoryCache) -> Result<bool> {
        let covering = self.scan.policies_covering(upload);
        let intermediate: Vec<&RetentionPolicy> = covering
            .iter()
            .copied()
            .filter(|policy| policy.retain_intermediate_commits)
            .collect();

        let mut offset = 0;
        loop {
            let commits =
                self.store
                    .commits_visible_to_upload(upload.id, VISIBLE_COMMITS_PAGE_SIZE, offset)?;
            if commits.is_empty() {
                return Ok(false);
            }
            offset += commits.len();

            if cache.any_protected(&commits) {
                record_decision("cache");
                return Ok(true);
            }

            if self.fast_path(&covering, &commits, cache) {
                record_decision("tip");
                return Ok(true);
            }

            if self.slow_path(&intermediate, &commits, cache)? {
                record_decision("containment");
                return Ok(true);
            }
        }
    }

    fn fast_path(
        &self,
        policies: &[&RetentionPolicy],
        commits: &[String],
        cache: &mut RepositoryCache,
    ) -> bool {
        if policies.is_empty() {
            return false;
        }

        let Some(commit) = commits.iter().find(|commit| {
            let tips = self
                .scan
                .ref_descriptions
                .get(commit.as_str())
                .map_or(&[][..], Vec::as_slice);
            tip_policy_matches(policies, &self.scan.patterns, commit, tips)
        }) else {
            return false;
        };

        cache.mark_protected(commit.as_str());
        true
    }

    fn slow_path(
        &self,
        policies: &[&RetentionPolicy],
        commits: &[String],
        cache: &mut RepositoryCache,
    ) -> Result<bool> {
        if policies.is_empty() {
            return Ok(false);
        }

        for commit in commits {
            let matched = match cache.branches_containing(commit) {
                Some(branches) => contains_policy_matches(policies, &self.scan.patterns, branches),
                None => {
                    metrics::counter!("retention_branches_containing_queries_total").increment(1);
                    let branches = self
                        .refs
                        .branches_containing(self.scan.repository_id, commit)?;
                    let matched =
                        contains_policy_matches(policies, &self.scan.patterns, &branches);
                    cache.insert_branches_containing(commit.as_str(), branches);
                    matched
                },
            };

            if matched {
                cache.mark_protected(commit.as_str());
                return Ok(true);
            }
        }

        Ok(false)
    }
}

fn record_decision(path: &'static str) {
    metrics::counter!("retention_protected_uploads_total", "path" => path).increment(1);
}
