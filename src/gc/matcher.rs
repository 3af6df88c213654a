//! Policy matchers.
//!
//! Both matchers assume the policy list was already narrowed by the caller:
//! they do not check that a policy is enabled, that its duration covers the
//! upload, or (for containment) that it retains intermediate commits.

use super::patterns::CompiledPatterns;
use crate::models::{PolicyKind, RefDescription, RefKind, RetentionPolicy};

/// Returns `true` if any policy matches `commit` or a reference tipping it.
///
/// - `GitCommit` policies match the commit hash
/// - `GitTag` policies match the name of any tag pointing at the commit
/// - `GitTree` policies match the name of any branch whose head is the commit
pub fn tip_policy_matches(
    policies: &[&RetentionPolicy],
    patterns: &CompiledPatterns,
    commit: &str,
    ref_descriptions: &[RefDescription],
) -> bool {
    let names_of = |kind: RefKind| {
        ref_descriptions
            .iter()
            .filter(move |r| r.kind == kind)
            .map(|r| r.name.as_str())
    };

    policies.iter().any(|policy| match policy.kind {
        PolicyKind::GitCommit => patterns.matches(&policy.pattern, commit),
        PolicyKind::GitTag => patterns.matches_any(&policy.pattern, names_of(RefKind::Tag)),
        PolicyKind::GitTree => patterns.matches_any(&policy.pattern, names_of(RefKind::Branch)),
    })
}

/// Returns `true` if any policy matches a branch containing the commit.
///
/// `branches` is every branch whose history contains the commit, tip or not.
pub fn contains_policy_matches(
    policies: &[&RetentionPolicy],
    patterns: &CompiledPatterns,
    branches: &[String],
) -> bool {
    policies.iter().any(|policy| {
        patterns.matches_any(&policy.pattern, branches.iter().map(String::as_str))
    })
}
