//! Property-based tests for retention decisions.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Policy coverage is monotonic in upload age
//! - Pattern matching agrees with literal equality for plain names
//! - The repository cache never forgets a protected commit
//! - Decisions do not depend on the upload batch size

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use chrono::{TimeDelta, Utc};
use codeintel_retention::gc::{CompiledPatterns, RepositoryCache};
use codeintel_retention::{PolicyKind, RetentionPolicy, UploadExpirer};
use common::{FIXTURE_EXPIRED, FIXTURE_PROTECTED, decisions, expirer_config, fixture_refs, fixture_store};
use proptest::prelude::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Policy coverage
// ============================================================================

proptest! {
    /// Property: a policy covering an upload also covers every younger upload.
    #[test]
    fn prop_coverage_monotonic_in_age(
        duration_hours in 1i64..100_000,
        older in 0i64..200_000,
        younger in 0i64..200_000,
    ) {
        let (older, younger) = if older >= younger { (older, younger) } else { (younger, older) };
        let now = Utc::now();
        let policy = RetentionPolicy::new(1, PolicyKind::GitTree, "*")
            .with_duration(TimeDelta::hours(duration_hours));

        if policy.covers(now - TimeDelta::hours(older), now) {
            prop_assert!(policy.covers(now - TimeDelta::hours(younger), now));
        }
    }

    /// Property: a policy without a duration covers every age.
    #[test]
    fn prop_indefinite_policy_covers_everything(age_days in 0i64..100_000) {
        let now = Utc::now();
        let policy = RetentionPolicy::new(1, PolicyKind::GitTag, "*");
        prop_assert!(policy.covers(now - TimeDelta::days(age_days), now));
    }
}

// ============================================================================
// Pattern matching
// ============================================================================

proptest! {
    /// Property: a pattern without metacharacters matches exactly itself.
    #[test]
    fn prop_literal_pattern_is_equality(
        pattern in "[a-z0-9][a-z0-9/._-]{0,30}",
        value in "[a-z0-9][a-z0-9/._-]{0,30}",
    ) {
        let policies = vec![RetentionPolicy::new(1, PolicyKind::GitTree, pattern.clone())];
        let patterns = CompiledPatterns::compile(&policies).unwrap();

        prop_assert!(patterns.matches(&pattern, &pattern));
        prop_assert_eq!(patterns.matches(&pattern, &value), pattern == value);
    }

    /// Property: `*` matches any branch name, including nested ones.
    #[test]
    fn prop_star_matches_any_name(value in "[a-zA-Z0-9/._-]{0,60}") {
        let policies = vec![RetentionPolicy::new(1, PolicyKind::GitTree, "*")];
        let patterns = CompiledPatterns::compile(&policies).unwrap();
        prop_assert!(patterns.matches("*", &value));
    }

    /// Property: a prefix pattern matches exactly the names under the prefix.
    #[test]
    fn prop_prefix_pattern(prefix in "[a-z]{1,8}", rest in "[a-z0-9-]{0,20}", other in "[a-z]{1,8}") {
        let pattern = format!("{prefix}/*");
        let policies = vec![RetentionPolicy::new(1, PolicyKind::GitTree, pattern.clone())];
        let patterns = CompiledPatterns::compile(&policies).unwrap();

        let inside = format!("{prefix}/{rest}");
        let outside = format!("{other}/{rest}");
        prop_assert!(patterns.matches(&pattern, &inside));
        prop_assert_eq!(patterns.matches(&pattern, &outside), other == prefix);
    }
}

// ============================================================================
// Repository cache
// ============================================================================

proptest! {
    /// Property: once marked, a commit stays protected regardless of later
    /// containment traffic.
    #[test]
    fn prop_protected_commits_never_forgotten(
        marked in prop::collection::vec("[0-9a-f]{8}", 1..20),
        lookups in prop::collection::vec("[0-9a-f]{8}", 0..200),
        capacity in 1usize..16,
    ) {
        let mut cache = RepositoryCache::with_capacity(capacity);
        for commit in &marked {
            cache.mark_protected(commit.as_str());
        }
        for commit in &lookups {
            cache.insert_branches_containing(commit.as_str(), vec!["main".to_string()]);
        }

        prop_assert!(cache.branches_containing_len() <= capacity);
        for commit in &marked {
            prop_assert!(cache.is_protected(commit));
        }
    }
}

// ============================================================================
// Expirer
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Property: the batch size only changes how decisions are persisted.
    #[test]
    fn prop_decisions_independent_of_batch_size(batch_size in 1usize..16) {
        let store = Arc::new(fixture_store(Utc::now()));
        let refs = Arc::new(fixture_refs());
        let expirer = UploadExpirer::new(store.clone(), refs, expirer_config(batch_size));

        let summary = expirer.handle(&CancellationToken::new()).unwrap();

        let (protected, expired) = decisions(&store, 1..=13);
        prop_assert_eq!(protected, FIXTURE_PROTECTED.to_vec());
        prop_assert_eq!(expired, FIXTURE_EXPIRED.to_vec());
        prop_assert_eq!(summary.uploads_scanned(), 13);
    }
}
