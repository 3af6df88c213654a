//! `SQLite`-backed retention store.

use super::connection::{acquire_lock, configure_connection};
use super::schema::SCHEMA;
use crate::models::{
    PolicyKind, PolicyScope, RepositoryId, RetentionPolicy, Upload, UploadId, UploadState,
};
use crate::storage::traits::RetentionStore;
use crate::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::instrument;

/// Builds an error mapper for a named store operation.
fn failed(operation: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

fn to_sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

/// Raw policy columns, converted outside the row closure so parse errors
/// surface as crate errors.
type PolicyRow = (i64, Option<i64>, String, String, bool, Option<i64>, bool);

/// Raw upload columns.
type UploadRow = (i64, i64, String, String, Option<i64>, Option<i64>, bool);

fn policy_from_row(row: PolicyRow) -> Result<RetentionPolicy> {
    let (id, repository_id, kind, pattern, enabled, hours, retain) = row;
    let retention_duration = hours
        .map(|h| {
            TimeDelta::try_hours(h).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "policy {id}: retention duration of {h} hours out of range"
                ))
            })
        })
        .transpose()?;
    Ok(RetentionPolicy {
        id,
        repository_id,
        kind: PolicyKind::parse(&kind)?,
        pattern,
        retention_enabled: enabled,
        retention_duration,
        retain_intermediate_commits: retain,
    })
}

fn upload_from_row(row: UploadRow) -> Result<Upload> {
    let (id, repository_id, commit, state, finished_at, last_scan, expired) = row;
    Ok(Upload {
        id,
        repository_id,
        commit,
        state: UploadState::parse(&state)?,
        finished_at: from_millis(finished_at),
        last_retention_scan_at: from_millis(last_scan),
        expired,
    })
}

const POLICY_COLUMNS: &str = "id, repository_id, kind, pattern, retention_enabled, \
     retention_duration_hours, retain_intermediate_commits";

const UPLOAD_COLUMNS: &str =
    "id, repository_id, commit_hash, state, finished_at, last_retention_scan_at, expired";

/// Retention store persisted in a single `SQLite` database.
///
/// # Concurrency Model
///
/// A `Mutex<Connection>` serializes access. The scanner is the only writer
/// of scan results; administrative writes (new policies, new uploads) may
/// interleave with it between statements.
///
/// # Visible Commits
///
/// Every upload is visible from its own commit; [`Self::insert_upload`]
/// records that row. Additional commits are added with
/// [`Self::add_visible_commits`].
pub struct SqliteRetentionStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteRetentionStore {
    /// Opens (creating if needed) a store at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_db_dir".to_string(),
                cause: format!("{}: {e}", parent.display()),
            })?;
        }

        let conn = Connection::open(db_path).map_err(failed("open_database"))?;
        let store = Self::from_connection(conn, Some(db_path.to_path_buf()))?;
        tracing::debug!(path = %db_path.display(), "Opened retention store");
        Ok(store)
    }

    /// Creates a store backed by an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(failed("open_database"))?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        configure_connection(&conn)?;
        conn.execute_batch(SCHEMA).map_err(failed("create_schema"))?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Returns the database path, or `None` for in-memory stores.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Stores a new policy and returns it with its assigned id.
    ///
    /// The id of `policy` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn create_policy(&self, policy: &RetentionPolicy) -> Result<RetentionPolicy> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO retention_policies (repository_id, kind, pattern, retention_enabled, \
             retention_duration_hours, retain_intermediate_commits) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                policy.repository_id,
                policy.kind.as_str(),
                policy.pattern,
                policy.retention_enabled,
                policy.retention_duration.map(|d| d.num_hours()),
                policy.retain_intermediate_commits,
            ],
        )
        .map_err(failed("create_policy"))?;

        Ok(RetentionPolicy {
            id: conn.last_insert_rowid(),
            ..policy.clone()
        })
    }

    /// Lists every policy, enabled or not, global ones first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_policies(&self) -> Result<Vec<RetentionPolicy>> {
        let conn = acquire_lock(&self.conn);
        let sql = format!(
            "SELECT {POLICY_COLUMNS} FROM retention_policies \
             ORDER BY repository_id IS NOT NULL, repository_id, id"
        );
        let mut stmt = conn.prepare(&sql).map_err(failed("prepare_list_policies"))?;
        let rows = stmt
            .query_map([], read_policy_row)
            .map_err(failed("list_policies"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(failed("list_policies"))?;

        rows.into_iter().map(policy_from_row).collect()
    }

    /// Stores an upload and makes it visible from its own commit.
    ///
    /// A zero id lets the database assign one.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_upload(&self, upload: &Upload) -> Result<UploadId> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn.transaction().map_err(failed("begin_insert_upload"))?;

        tx.execute(
            "INSERT INTO uploads (id, repository_id, commit_hash, state, finished_at, \
             last_retention_scan_at, expired) VALUES (NULLIF(?1, 0), ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                upload.id,
                upload.repository_id,
                upload.commit,
                upload.state.as_str(),
                upload.finished_at.map(to_millis),
                upload.last_retention_scan_at.map(to_millis),
                upload.expired,
            ],
        )
        .map_err(failed("insert_upload"))?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT OR IGNORE INTO upload_visible_commits (upload_id, commit_hash) VALUES (?1, ?2)",
            params![id, upload.commit],
        )
        .map_err(failed("insert_visible_commit"))?;

        tx.commit().map_err(failed("commit_insert_upload"))?;
        Ok(id)
    }

    /// Makes an upload visible from additional commits.
    ///
    /// Returns how many commits were newly recorded; commits the upload is
    /// already visible from are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload does not exist or the insert fails.
    pub fn add_visible_commits(&self, upload_id: UploadId, commits: &[String]) -> Result<usize> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn.transaction().map_err(failed("begin_add_visible_commits"))?;
        let mut added = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO upload_visible_commits (upload_id, commit_hash) \
                     VALUES (?1, ?2)",
                )
                .map_err(failed("prepare_add_visible_commits"))?;
            for commit in commits {
                added += stmt
                    .execute(params![upload_id, commit])
                    .map_err(failed("add_visible_commits"))?;
            }
        }
        tx.commit().map_err(failed("commit_add_visible_commits"))?;
        Ok(added)
    }

    /// Fetches a single upload.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_upload(&self, upload_id: UploadId) -> Result<Option<Upload>> {
        let conn = acquire_lock(&self.conn);
        let sql = format!("SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = ?1");
        let row = conn
            .query_row(&sql, params![upload_id], read_upload_row)
            .optional()
            .map_err(failed("get_upload"))?;

        row.map(upload_from_row).transpose()
    }

    /// Returns when a repository was last selected for a retention scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn last_repository_scan(
        &self,
        repository_id: RepositoryId,
    ) -> Result<Option<DateTime<Utc>>> {
        let conn = acquire_lock(&self.conn);
        let millis: Option<i64> = conn
            .query_row(
                "SELECT last_retention_scan_at FROM repository_retention_scans \
                 WHERE repository_id = ?1",
                params![repository_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(failed("last_repository_scan"))?;

        Ok(from_millis(millis))
    }
}

fn read_policy_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PolicyRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn read_upload_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UploadRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

impl RetentionStore for SqliteRetentionStore {
    #[instrument(name = "retention.store.repositories_due", skip(self))]
    fn repositories_due_for_scan(
        &self,
        process_delay: Duration,
        limit: usize,
    ) -> Result<Vec<RepositoryId>> {
        let now = Utc::now();
        let delay = TimeDelta::from_std(process_delay).unwrap_or(TimeDelta::MAX);
        let cutoff = now.checked_sub_signed(delay).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut conn = acquire_lock(&self.conn);
        let tx = conn.transaction().map_err(failed("begin_repositories_due"))?;

        let repository_ids = {
            let mut stmt = tx
                .prepare(
                    "SELECT u.repository_id \
                     FROM (SELECT DISTINCT repository_id FROM uploads \
                           WHERE state = 'completed' AND expired = 0) u \
                     LEFT JOIN repository_retention_scans s ON s.repository_id = u.repository_id \
                     WHERE s.last_retention_scan_at IS NULL OR s.last_retention_scan_at < ?1 \
                     ORDER BY s.last_retention_scan_at IS NOT NULL, s.last_retention_scan_at, \
                              u.repository_id \
                     LIMIT ?2",
                )
                .map_err(failed("prepare_repositories_due"))?;
            let ids = stmt
                .query_map(params![to_millis(cutoff), to_sql_count(limit)], |row| {
                    row.get::<_, i64>(0)
                })
                .map_err(failed("repositories_due"))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(failed("repositories_due"))?;
            ids
        };

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO repository_retention_scans (repository_id, last_retention_scan_at) \
                     VALUES (?1, ?2) \
                     ON CONFLICT (repository_id) \
                     DO UPDATE SET last_retention_scan_at = excluded.last_retention_scan_at",
                )
                .map_err(failed("prepare_mark_repositories_scanned"))?;
            for repository_id in &repository_ids {
                stmt.execute(params![repository_id, to_millis(now)])
                    .map_err(failed("mark_repositories_scanned"))?;
            }
        }

        tx.commit().map_err(failed("commit_repositories_due"))?;
        Ok(repository_ids)
    }

    fn retention_policies(&self, scope: PolicyScope) -> Result<Vec<RetentionPolicy>> {
        let conn = acquire_lock(&self.conn);
        let rows = match scope {
            PolicyScope::Global => {
                let sql = format!(
                    "SELECT {POLICY_COLUMNS} FROM retention_policies \
                     WHERE retention_enabled = 1 AND repository_id IS NULL ORDER BY id"
                );
                let mut stmt = conn.prepare(&sql).map_err(failed("prepare_policies"))?;
                let rows = stmt
                    .query_map([], read_policy_row)
                    .map_err(failed("retention_policies"))?
                    .collect::<std::result::Result<Vec<_>, _>>();
                rows
            },
            PolicyScope::Repository(repository_id) => {
                let sql = format!(
                    "SELECT {POLICY_COLUMNS} FROM retention_policies \
                     WHERE retention_enabled = 1 AND repository_id = ?1 ORDER BY id"
                );
                let mut stmt = conn.prepare(&sql).map_err(failed("prepare_policies"))?;
                let rows = stmt
                    .query_map(params![repository_id], read_policy_row)
                    .map_err(failed("retention_policies"))?
                    .collect::<std::result::Result<Vec<_>, _>>();
                rows
            },
        }
        .map_err(failed("retention_policies"))?;

        rows.into_iter().map(policy_from_row).collect()
    }

    fn completed_uploads(
        &self,
        repository_id: RepositoryId,
        limit: usize,
        last_scan_before: DateTime<Utc>,
    ) -> Result<Vec<Upload>> {
        let conn = acquire_lock(&self.conn);
        let sql = format!(
            "SELECT {UPLOAD_COLUMNS} FROM uploads \
             WHERE repository_id = ?1 AND state = 'completed' AND expired = 0 \
               AND (last_retention_scan_at IS NULL OR last_retention_scan_at < ?2) \
             ORDER BY finished_at IS NULL, finished_at, id \
             LIMIT ?3"
        );
        let mut stmt = conn.prepare(&sql).map_err(failed("prepare_completed_uploads"))?;
        let rows = stmt
            .query_map(
                params![
                    repository_id,
                    to_millis(last_scan_before),
                    to_sql_count(limit)
                ],
                read_upload_row,
            )
            .map_err(failed("completed_uploads"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(failed("completed_uploads"))?;

        rows.into_iter().map(upload_from_row).collect()
    }

    fn commits_visible_to_upload(
        &self,
        upload_id: UploadId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<String>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT commit_hash FROM upload_visible_commits WHERE upload_id = ?1 \
                 ORDER BY commit_hash LIMIT ?2 OFFSET ?3",
            )
            .map_err(failed("prepare_visible_commits"))?;
        let commits = stmt
            .query_map(
                params![upload_id, to_sql_count(limit), to_sql_count(offset)],
                |row| row.get::<_, String>(0),
            )
            .map_err(failed("visible_commits"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(failed("visible_commits"))?;
        Ok(commits)
    }

    #[instrument(
        name = "retention.store.persist_decision",
        skip(self, protected_ids, expired_ids),
        fields(protected = protected_ids.len(), expired = expired_ids.len())
    )]
    fn persist_retention_decision(
        &self,
        protected_ids: &[UploadId],
        expired_ids: &[UploadId],
    ) -> Result<()> {
        let now = to_millis(Utc::now());
        let mut conn = acquire_lock(&self.conn);
        let tx = conn.transaction().map_err(failed("begin_persist_decision"))?;
        {
            let mut protect = tx
                .prepare("UPDATE uploads SET last_retention_scan_at = ?1 WHERE id = ?2")
                .map_err(failed("prepare_mark_protected"))?;
            for id in protected_ids {
                protect
                    .execute(params![now, id])
                    .map_err(failed("mark_protected"))?;
            }

            let mut expire = tx
                .prepare("UPDATE uploads SET expired = 1 WHERE id = ?1")
                .map_err(failed("prepare_mark_expired"))?;
            for id in expired_ids {
                expire.execute(params![id]).map_err(failed("mark_expired"))?;
            }
        }
        tx.commit().map_err(failed("commit_persist_decision"))
    }
}
