//! Policy command handlers.

use super::{PolicyAction, open_store};
use anyhow::Context;
use chrono::TimeDelta;
use codeintel_retention::config::RetentionAppConfig;
use codeintel_retention::gc::CompiledPatterns;
use codeintel_retention::{PolicyKind, RetentionPolicy};

/// Policies command.
pub fn cmd_policies(config: &RetentionAppConfig, action: PolicyAction) -> anyhow::Result<()> {
    let store = open_store(config)?;

    match action {
        PolicyAction::List { json } => {
            let policies = store.list_policies().context("failed to list policies")?;
            if json {
                let rendered: Vec<_> = policies.iter().map(policy_json).collect();
                println!("{}", serde_json::to_string_pretty(&rendered)?);
            } else {
                display_policies(&policies);
            }
        },
        PolicyAction::Add {
            kind,
            pattern,
            repository,
            retention_hours,
            retain_intermediate,
            disabled,
        } => {
            let kind = PolicyKind::parse(&kind)?;
            let duration = retention_hours
                .map(|hours| {
                    TimeDelta::try_hours(hours)
                        .filter(|d| *d > TimeDelta::zero())
                        .with_context(|| format!("--retention-hours {hours} is out of range"))
                })
                .transpose()?;

            let mut policy = RetentionPolicy::new(0, kind, pattern)
                .with_retain_intermediate_commits(retain_intermediate)
                .with_retention_enabled(!disabled);
            if let Some(repository_id) = repository {
                policy = policy.for_repository(repository_id);
            }
            if let Some(duration) = duration {
                policy = policy.with_duration(duration);
            }

            CompiledPatterns::compile(std::iter::once(&policy))
                .with_context(|| format!("invalid glob pattern `{}`", policy.pattern))?;

            let created = store
                .create_policy(&policy)
                .context("failed to create policy")?;
            println!("Created policy {}", created.id);
        },
    }

    Ok(())
}

fn policy_json(policy: &RetentionPolicy) -> serde_json::Value {
    serde_json::json!({
        "id": policy.id,
        "repository_id": policy.repository_id,
        "kind": policy.kind,
        "pattern": policy.pattern,
        "retention_enabled": policy.retention_enabled,
        "retention_hours": policy.retention_duration.map(|d| d.num_hours()),
        "retain_intermediate_commits": policy.retain_intermediate_commits,
    })
}

fn display_policies(policies: &[RetentionPolicy]) {
    if policies.is_empty() {
        println!("No retention policies");
        return;
    }

    println!(
        "{:>5}  {:<10}  {:<10}  {:<24}  {:>10}  {:<12}  {:<7}",
        "ID", "SCOPE", "KIND", "PATTERN", "RETENTION", "INTERMEDIATE", "ENABLED"
    );
    for policy in policies {
        let scope = policy
            .repository_id
            .map_or_else(|| "global".to_string(), |id| format!("repo {id}"));
        let retention = policy
            .retention_duration
            .map_or_else(|| "forever".to_string(), |d| format!("{}h", d.num_hours()));
        println!(
            "{:>5}  {:<10}  {:<10}  {:<24}  {:>10}  {:<12}  {:<7}",
            policy.id,
            scope,
            policy.kind,
            policy.pattern,
            retention,
            policy.retain_intermediate_commits,
            policy.retention_enabled
        );
    }
}
