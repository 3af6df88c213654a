//! Upload command handlers.

use super::{UploadAction, open_store};
use anyhow::Context;
use chrono::{DateTime, Utc};
use codeintel_retention::Upload;
use codeintel_retention::config::RetentionAppConfig;

/// Uploads command.
pub fn cmd_uploads(config: &RetentionAppConfig, action: UploadAction) -> anyhow::Result<()> {
    let store = open_store(config)?;

    match action {
        UploadAction::Add {
            repository,
            commit,
            finished_at,
            visible,
        } => {
            let finished_at = match finished_at {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .with_context(|| format!("invalid --finished-at '{raw}'"))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };

            let upload = Upload::completed(0, repository, commit, finished_at);
            let upload_id = store
                .insert_upload(&upload)
                .context("failed to register upload")?;
            let added = store
                .add_visible_commits(upload_id, &visible)
                .context("failed to record visible commits")?;

            // The upload's own commit is always visible
            println!(
                "Registered upload {upload_id} for repository {repository} ({} visible commits)",
                added + 1
            );
        },
    }

    Ok(())
}
