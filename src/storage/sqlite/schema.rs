//! Schema for the `SQLite` retention store.
//!
//! Timestamps are stored as Unix milliseconds; retention durations as whole
//! hours, matching the granularity operators configure policies with.

/// Statements creating every table and index, safe to run repeatedly.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS retention_policies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER,
    kind TEXT NOT NULL,
    pattern TEXT NOT NULL,
    retention_enabled INTEGER NOT NULL DEFAULT 1,
    retention_duration_hours INTEGER,
    retain_intermediate_commits INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS retention_policies_repository_id
    ON retention_policies (repository_id);

CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL,
    commit_hash TEXT NOT NULL,
    state TEXT NOT NULL,
    finished_at INTEGER,
    last_retention_scan_at INTEGER,
    expired INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS uploads_retention_scan
    ON uploads (repository_id, state, expired, finished_at);

CREATE TABLE IF NOT EXISTS upload_visible_commits (
    upload_id INTEGER NOT NULL REFERENCES uploads (id) ON DELETE CASCADE,
    commit_hash TEXT NOT NULL,
    PRIMARY KEY (upload_id, commit_hash)
);

CREATE TABLE IF NOT EXISTS repository_retention_scans (
    repository_id INTEGER PRIMARY KEY,
    last_retention_scan_at INTEGER NOT NULL
);
";
