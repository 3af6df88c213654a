//! Shared fixtures for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use chrono::{DateTime, TimeDelta, Utc};
use codeintel_retention::storage::SqliteRetentionStore;
use codeintel_retention::{
    Error, PolicyKind, RefDescription, RefDescriptions, RefProvider, RepositoryId,
    RetentionPolicy, Result, Upload,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory reference provider built from maps.
#[derive(Default)]
pub struct FakeRefs {
    tips: HashMap<RepositoryId, RefDescriptions>,
    containing: HashMap<(RepositoryId, String), Vec<String>>,
    failing: HashSet<RepositoryId>,
    tip_queries: Mutex<Vec<RepositoryId>>,
    containment_queries: Mutex<Vec<(RepositoryId, String)>>,
}

impl FakeRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a branch whose head is `commit`.
    pub fn with_branch_tip(mut self, repository_id: RepositoryId, commit: &str, branch: &str) -> Self {
        self.tips
            .entry(repository_id)
            .or_default()
            .entry(commit.to_string())
            .or_default()
            .push(RefDescription::branch(branch));
        self
    }

    /// Registers a tag pointing at `commit`.
    pub fn with_tag(mut self, repository_id: RepositoryId, commit: &str, tag: &str) -> Self {
        self.tips
            .entry(repository_id)
            .or_default()
            .entry(commit.to_string())
            .or_default()
            .push(RefDescription::tag(tag));
        self
    }

    /// Registers the branches whose history contains `commit`.
    pub fn with_containing(
        mut self,
        repository_id: RepositoryId,
        commit: &str,
        branches: &[&str],
    ) -> Self {
        self.containing.insert(
            (repository_id, commit.to_string()),
            branches.iter().map(ToString::to_string).collect(),
        );
        self
    }

    /// Makes every query for `repository_id` fail.
    pub fn failing_for(mut self, repository_id: RepositoryId) -> Self {
        self.failing.insert(repository_id);
        self
    }

    pub fn tip_queries(&self) -> Vec<RepositoryId> {
        self.tip_queries.lock().unwrap().clone()
    }

    pub fn containment_queries(&self) -> Vec<(RepositoryId, String)> {
        self.containment_queries.lock().unwrap().clone()
    }

    fn check(&self, repository_id: RepositoryId, operation: &str) -> Result<()> {
        if self.failing.contains(&repository_id) {
            return Err(Error::OperationFailed {
                operation: operation.to_string(),
                cause: format!("gitserver unavailable for repository {repository_id}"),
            });
        }
        Ok(())
    }
}

impl RefProvider for FakeRefs {
    fn ref_descriptions(&self, repository_id: RepositoryId) -> Result<RefDescriptions> {
        self.tip_queries.lock().unwrap().push(repository_id);
        self.check(repository_id, "ref_descriptions")?;
        Ok(self.tips.get(&repository_id).cloned().unwrap_or_default())
    }

    fn branches_containing(&self, repository_id: RepositoryId, commit: &str) -> Result<Vec<String>> {
        self.containment_queries
            .lock()
            .unwrap()
            .push((repository_id, commit.to_string()));
        self.check(repository_id, "branches_containing")?;
        Ok(self
            .containing
            .get(&(repository_id, commit.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

pub const WEEK: TimeDelta = TimeDelta::days(7);
pub const FIVE_MONTHS: TimeDelta = TimeDelta::days(150);
pub const NINE_MONTHS: TimeDelta = TimeDelta::days(270);
pub const EIGHTEEN_MONTHS: TimeDelta = TimeDelta::days(540);
pub const THREE_YEARS: TimeDelta = TimeDelta::days(3 * 365);
pub const FIFTEEN_YEARS: TimeDelta = TimeDelta::days(15 * 365);

/// Global policies shared by every fixture repository.
pub fn global_policies() -> Vec<RetentionPolicy> {
    vec![
        RetentionPolicy::new(0, PolicyKind::GitTree, "*").with_duration(TimeDelta::days(90)),
        RetentionPolicy::new(0, PolicyKind::GitTag, "*").with_duration(TimeDelta::days(180)),
        RetentionPolicy::new(0, PolicyKind::GitTree, "main"),
    ]
}

/// Seeds policies into `store`.
pub fn seed_policies(store: &SqliteRetentionStore, policies: &[RetentionPolicy]) {
    for policy in policies {
        store.create_policy(policy).unwrap();
    }
}

/// Seeds uploads `(id, repository, commit, age)` relative to `now`.
pub fn seed_uploads(
    store: &SqliteRetentionStore,
    now: DateTime<Utc>,
    uploads: &[(i64, RepositoryId, &str, TimeDelta)],
) {
    for (id, repository_id, commit, age) in uploads {
        store
            .insert_upload(&Upload::completed(*id, *repository_id, *commit, now - *age))
            .unwrap();
    }
}

/// The reference topology of the mixed fixture.
///
/// Repository 50 has `develop` with a linear history deadbeef05 (tag v1.2.2)
/// to deadbeef01 (tip), `feat/blank` at deadbeef02, `es/feature-z` at
/// deadbeef06, `ef/feature-x` at deadbeef07 containing deadbeef08 and
/// `ef/feature-y` at deadbeef09. Repository 51 has `ef/feature-w` at
/// deadbeef10 and repository 52 has `main` at deadbeef11 containing
/// deadbeef12.
pub fn fixture_refs() -> FakeRefs {
    FakeRefs::new()
        .with_branch_tip(50, "deadbeef01", "develop")
        .with_branch_tip(50, "deadbeef02", "feat/blank")
        .with_tag(50, "deadbeef04", "v1.2.3")
        .with_tag(50, "deadbeef05", "v1.2.2")
        .with_branch_tip(50, "deadbeef06", "es/feature-z")
        .with_branch_tip(50, "deadbeef07", "ef/feature-x")
        .with_branch_tip(50, "deadbeef09", "ef/feature-y")
        .with_branch_tip(51, "deadbeef10", "ef/feature-w")
        .with_branch_tip(52, "deadbeef11", "main")
        .with_containing(50, "deadbeef01", &["develop"])
        .with_containing(50, "deadbeef02", &["develop", "feat/blank"])
        .with_containing(50, "deadbeef03", &["develop"])
        .with_containing(50, "deadbeef04", &["develop"])
        .with_containing(50, "deadbeef05", &["develop"])
        .with_containing(50, "deadbeef06", &["es/feature-z"])
        .with_containing(50, "deadbeef07", &["ef/feature-x"])
        .with_containing(50, "deadbeef08", &["ef/feature-x"])
        .with_containing(50, "deadbeef09", &["ef/feature-y"])
        .with_containing(51, "deadbeef10", &["ef/feature-w"])
        .with_containing(52, "deadbeef11", &["main"])
        .with_containing(52, "deadbeef12", &["main"])
}

/// Builds the mixed fixture store: global policies, two repository policies
/// and thirteen uploads across repositories 50 to 53.
pub fn fixture_store(now: DateTime<Utc>) -> SqliteRetentionStore {
    let store = SqliteRetentionStore::in_memory().unwrap();
    seed_policies(&store, &global_policies());
    seed_policies(
        &store,
        &[
            RetentionPolicy::new(0, PolicyKind::GitTree, "ef/*")
                .for_repository(50)
                .with_retain_intermediate_commits(true)
                .with_duration(TimeDelta::days(2 * 365)),
            RetentionPolicy::new(0, PolicyKind::GitCommit, "*")
                .for_repository(53)
                .with_duration(TimeDelta::days(1)),
        ],
    );
    seed_uploads(
        &store,
        now,
        &[
            (1, 50, "deadbeef01", WEEK),
            (2, 50, "deadbeef02", WEEK),
            (3, 50, "deadbeef03", FIVE_MONTHS),
            (4, 50, "deadbeef04", FIVE_MONTHS),
            (5, 50, "deadbeef05", NINE_MONTHS),
            (6, 50, "deadbeef06", FIVE_MONTHS),
            (7, 50, "deadbeef07", NINE_MONTHS),
            (8, 50, "deadbeef08", EIGHTEEN_MONTHS),
            (9, 50, "deadbeef09", THREE_YEARS),
            (10, 51, "deadbeef10", NINE_MONTHS),
            (11, 52, "deadbeef11", FIFTEEN_YEARS),
            (12, 52, "deadbeef12", FIFTEEN_YEARS),
            (13, 53, "deadbeef13", TimeDelta::hours(1)),
        ],
    );
    store
}

pub const FIXTURE_PROTECTED: [i64; 7] = [1, 2, 4, 7, 8, 11, 13];
pub const FIXTURE_EXPIRED: [i64; 6] = [3, 5, 6, 9, 10, 12];

/// Expirer configuration with one-hour delays.
pub fn expirer_config(upload_batch_size: usize) -> codeintel_retention::ExpirerConfig {
    codeintel_retention::ExpirerConfig {
        repository_process_delay: Duration::from_secs(3600),
        repository_batch_size: 100,
        upload_process_delay: Duration::from_secs(3600),
        upload_batch_size,
        interval: Duration::from_secs(60),
    }
}

/// Returns `(protected, expired)` upload ids among `ids`.
///
/// Protected uploads are those with a scan timestamp that were not expired.
pub fn decisions(store: &SqliteRetentionStore, ids: impl IntoIterator<Item = i64>) -> (Vec<i64>, Vec<i64>) {
    let mut protected = Vec::new();
    let mut expired = Vec::new();
    for id in ids {
        let upload = store.get_upload(id).unwrap().unwrap();
        if upload.expired {
            expired.push(id);
        } else if upload.last_retention_scan_at.is_some() {
            protected.push(id);
        }
    }
    (protected, expired)
}
