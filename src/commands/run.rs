//! Expirer command handlers.

use super::open_store;
use anyhow::Context;
use codeintel_retention::config::RetentionAppConfig;
use codeintel_retention::gc::{UploadExpirer, run_upload_expirer};
use codeintel_retention::git::GitRefProvider;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builds an expirer from the configuration.
fn build_expirer(config: &RetentionAppConfig) -> anyhow::Result<UploadExpirer> {
    let expirer_config = config
        .expirer_config()
        .context("invalid [expirer] configuration")?;
    let store = Arc::new(open_store(config)?);
    let refs = Arc::new(GitRefProvider::new(config.repos_root()?));

    Ok(UploadExpirer::new(store, refs, expirer_config))
}

/// Returns a token cancelled on Ctrl-C.
fn cancel_on_interrupt() -> anyhow::Result<CancellationToken> {
    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Interrupt received, stopping after the current repository");
        handler_token.cancel();
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(token)
}

/// Run command.
///
/// Drives the upload expirer on its configured interval until interrupted.
pub async fn cmd_run(config: &RetentionAppConfig) -> anyhow::Result<()> {
    let expirer = Arc::new(build_expirer(config)?);
    let token = cancel_on_interrupt()?;

    let runs = run_upload_expirer(expirer, token).await;
    println!("Upload expirer stopped after {runs} runs");
    Ok(())
}

/// Scan command.
///
/// Runs a single scan over the repositories currently due.
pub async fn cmd_scan(config: &RetentionAppConfig) -> anyhow::Result<()> {
    let expirer = build_expirer(config)?;
    let token = cancel_on_interrupt()?;

    let summary = tokio::task::spawn_blocking(move || expirer.handle(&token))
        .await
        .context("retention scan task failed")?
        .context("retention scan failed")?;

    println!("{}", summary.summary());
    Ok(())
}
