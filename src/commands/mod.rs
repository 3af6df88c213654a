//! Command handlers module.
//!
//! This module organizes the CLI command implementations into separate files:
//! - `run.rs`: Expirer commands (periodic run, single scan)
//! - `policies.rs`: Retention policy management
//! - `uploads.rs`: Upload registration
//! - `config.rs`: Configuration display command

mod config;
mod policies;
mod run;
mod uploads;

use anyhow::Context;
use clap::Subcommand;
use codeintel_retention::config::RetentionAppConfig;
use codeintel_retention::storage::SqliteRetentionStore;
use std::path::PathBuf;

// Re-export command functions
pub use config::cmd_config;
pub use policies::cmd_policies;
pub use run::{cmd_run, cmd_scan};
pub use uploads::cmd_uploads;

/// Policy subcommands.
#[derive(Subcommand)]
pub enum PolicyAction {
    /// List every policy.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Add a policy.
    Add {
        /// What the pattern matches: commit, tag or tree.
        #[arg(short, long)]
        kind: String,

        /// Glob pattern.
        #[arg(short, long)]
        pattern: String,

        /// Bind the policy to a repository; global when omitted.
        #[arg(short, long)]
        repository: Option<i64>,

        /// Retention in hours after upload completion; indefinite when omitted.
        #[arg(long)]
        retention_hours: Option<i64>,

        /// Also protect commits contained in a matching branch.
        #[arg(long)]
        retain_intermediate: bool,

        /// Store the policy without enabling it for retention.
        #[arg(long)]
        disabled: bool,
    },
}

/// Upload subcommands.
#[derive(Subcommand)]
pub enum UploadAction {
    /// Register a completed upload.
    Add {
        /// Repository the upload belongs to.
        #[arg(short, long)]
        repository: i64,

        /// Commit the upload was built from.
        #[arg(short, long)]
        commit: String,

        /// Completion time (RFC 3339); now when omitted.
        #[arg(long)]
        finished_at: Option<String>,

        /// Additional commits the upload is visible from.
        #[arg(long = "visible", value_delimiter = ',')]
        visible: Vec<String>,
    },
}

/// Opens the configured retention store.
fn open_store(config: &RetentionAppConfig) -> anyhow::Result<SqliteRetentionStore> {
    let path: PathBuf = config.db_path();
    SqliteRetentionStore::new(&path)
        .with_context(|| format!("failed to open retention store at {}", path.display()))
}
