use crate::context::{block_on, print_json, Context};
use anyhow::Context as _;
use drift_core::compliance::ComplianceData;
use drift_core::{format_timestamp, Fingerprint, WorkspaceScope};
use drift_store::{ProjectAnalysisResultStore, StoreError};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct Stats {
    workspace: String,
    repos: u64,
    latest: Option<String>,
    average_fingerprints: f64,
}

/// Execute `drift stats`
pub fn stats(ctx: &Context, workspace: &str, json: bool) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let stats = block_on(async {
        let repos = store.distinct_repo_count(workspace).await?;
        let latest = match store.latest_timestamp(workspace).await {
            Ok(ts) => Some(format_timestamp(ts)),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        let scope = WorkspaceScope::parse(workspace)?;
        let average_fingerprints = store.average_fingerprint_count(scope.id()).await?;
        Ok::<_, StoreError>(Stats {
            workspace: workspace.to_string(),
            repos,
            latest,
            average_fingerprints,
        })
    })??;

    if json {
        return print_json(&stats);
    }
    println!("Workspace: {}", stats.workspace);
    println!("Repositories: {}", stats.repos);
    println!("Latest analysis: {}", stats.latest.as_deref().unwrap_or("(none)"));
    println!("Fingerprints per repository: {:.1}", stats.average_fingerprints);
    Ok(())
}

/// Execute `drift kinds`
pub fn kinds(ctx: &Context, workspace: &str, json: bool) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let kinds = block_on(store.distinct_fingerprint_kinds(workspace))??;
    if json {
        return print_json(&kinds);
    }
    let catalog = ctx.catalog()?;
    for kind in &kinds {
        println!("{kind}  ({})", catalog.display_name(&kind.fp_type));
    }
    if kinds.is_empty() {
        println!("No fingerprints in workspace {workspace}.");
    }
    Ok(())
}

/// Execute `drift fingerprints`
pub fn fingerprints(
    ctx: &Context,
    workspace: &str,
    fp_type: Option<&str>,
    name: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let found = block_on(store.fingerprints_in_workspace(workspace, fp_type, name))??;
    if json {
        return print_json(&found);
    }
    for fp in &found {
        println!(
            "{}  {}:{}  {}",
            fp.id,
            fp.fingerprint.fp_type,
            fp.fingerprint.name,
            short_sha(&fp.fingerprint.sha)
        );
    }
    println!("{} fingerprint(s)", found.len());
    Ok(())
}

/// Execute `drift usage`
pub fn usage(ctx: &Context, workspace: &str, fp_type: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let catalog = ctx.catalog()?;
    let mut usage = block_on(store.fingerprint_usage_for_type(workspace, fp_type))??;
    for u in &mut usage {
        catalog.annotate_usage(u);
    }
    if json {
        return print_json(&usage);
    }
    if usage.is_empty() {
        println!("No analytics for workspace {workspace}; run `drift analytics` first.");
        return Ok(());
    }
    for u in &usage {
        let categories: Vec<&str> = u.categories.iter().map(String::as_str).collect();
        println!(
            "{}:{}  count={} variants={} entropy={:.3}  [{}]",
            u.fp_type,
            u.name,
            u.cohort.count,
            u.cohort.variants,
            u.cohort.entropy,
            categories.join(", ")
        );
    }
    Ok(())
}

/// Execute `drift show <id>`
pub fn show(ctx: &Context, id: &str, json: bool) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let Some(result) = block_on(store.load_by_id(id))?? else {
        anyhow::bail!("no analysis with id {id}");
    };
    if json {
        return print_json(&result);
    }
    println!("{} {}", id, result.repo_ref);
    println!("Workspace: {}", result.workspace_id);
    println!("Analyzed: {}", format_timestamp(result.timestamp));
    if let Some(score) = result.score {
        println!("Score: {score:.2}");
    }
    if !result.tags.is_empty() {
        println!("Tags: {}", result.tags.join(", "));
    }
    if result.is_incomplete() {
        println!("Data incomplete, failed rules:");
        for err in &result.evaluation_errors {
            println!("  {err}");
        }
    }
    println!("Fingerprints:");
    for fp in &result.fingerprints {
        println!(
            "  {}:{}  {}",
            fp.fp_type,
            fp.display_name.as_deref().unwrap_or(&fp.name),
            fp.display_value.as_deref().unwrap_or_else(|| short_sha(&fp.sha))
        );
    }
    Ok(())
}

/// Execute `drift compliance <id> --targets <file>`
pub fn compliance(ctx: &Context, id: &str, targets: &Path, json: bool) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(targets)
        .with_context(|| format!("failed to read {}", targets.display()))?;
    let targets: Vec<Fingerprint> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of fingerprints", targets.display()))?;

    let store = ctx.open_store()?;
    let Some(project) = block_on(store.load_by_id(id))?? else {
        anyhow::bail!("no analysis with id {id}");
    };
    let data = ComplianceData::evaluate(&project, &targets, &ctx.catalog()?);
    if json {
        return print_json(&data);
    }
    println!("{} {}: {}", data.owner, project.repo_ref.repo, data.state);
    for diff in &data.differences {
        println!(
            "  {} {}: {} (target differs)",
            diff.aspect_name, diff.display_name, diff.display_value
        );
    }
    Ok(())
}

fn short_sha(sha: &str) -> &str {
    sha.get(..12).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortens_hashes() {
        assert_eq!(short_sha("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_sha("abc"), "abc");
    }
}
