//! Turning a checkout into fingerprints.

use crate::clone::ClonedProject;
use crate::error::{SpiderError, SpiderResult};
use drift_core::catalog::names;
use drift_core::{AspectKind, Fingerprint, FingerprintCatalog};
use drift_rules::build_tool_marker;
use drift_rules::payload::{BranchCountData, GitRecencyData, GlobAspectData, GlobMatch};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[async_trait::async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, project: &ClonedProject) -> SpiderResult<Vec<Fingerprint>>;
}

/// Fingerprints derivable from the file tree and clone metadata alone:
/// build-tool markers, every glob aspect in the catalog, branch count and
/// commit recency.
#[derive(Debug, Clone)]
pub struct FileScanAnalyzer {
    catalog: Arc<FingerprintCatalog>,
}

/// A file found under the checkout, relative path with `/` separators.
#[derive(Debug, Clone)]
struct ScannedFile {
    relative: String,
    absolute: PathBuf,
    size: u64,
}

impl FileScanAnalyzer {
    pub fn new(catalog: Arc<FingerprintCatalog>) -> Self {
        Self { catalog }
    }

    fn scan(&self, root: &Path, repo: &str) -> SpiderResult<Vec<Fingerprint>> {
        let files = walk(root)?;
        let mut fingerprints = Vec::new();

        for file in &files {
            let file_name = file.relative.rsplit('/').next().unwrap_or(&file.relative);
            if !is_marker_name(file_name) {
                continue;
            }
            let content = std::fs::read_to_string(&file.absolute).unwrap_or_default();
            if let Some(fp) = build_tool_marker(&file.relative, &content) {
                fingerprints.push(fp);
            }
        }

        for aspect in self.catalog.iter() {
            let AspectKind::Glob { glob } = &aspect.kind else {
                continue;
            };
            let matcher = globset::Glob::new(glob)
                .map_err(|e| SpiderError::Analyze {
                    repo: repo.to_string(),
                    message: format!("aspect '{}' has invalid glob '{glob}': {e}", aspect.name),
                })?
                .compile_matcher();
            let data = GlobAspectData {
                glob: glob.clone(),
                matches: files
                    .iter()
                    .filter(|f| matcher.is_match(&f.relative))
                    .map(|f| GlobMatch {
                        path: f.relative.clone(),
                        size: f.size,
                    })
                    .collect(),
            };
            // Zero matches is still a fact worth recording
            fingerprints.push(Fingerprint::new(
                &aspect.name,
                &aspect.name,
                serde_json::to_value(data).map_err(|e| SpiderError::Analyze {
                    repo: repo.to_string(),
                    message: e.to_string(),
                })?,
            ));
        }

        Ok(fingerprints)
    }
}

fn is_marker_name(file_name: &str) -> bool {
    drift_rules::classify::build_tool::BUILD_TOOL_MARKERS
        .iter()
        .any(|(_, marker)| *marker == file_name)
}

/// Every regular file under `root`, sorted by path.
///
/// Honors `.gitignore` and `.git/info/exclude` even when the checkout has
/// no `.git` directory. Hidden files are included, `.git` itself is not,
/// and symlinks are not followed.
fn walk(root: &Path) -> SpiderResult<Vec<ScannedFile>> {
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .git_global(false)
        .require_git(false)
        .follow_links(false)
        .filter_entry(|entry| entry.file_name() != ".git");

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = entry?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(ScannedFile {
            relative,
            size: entry.metadata()?.len(),
            absolute: path.to_path_buf(),
        });
    }
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

fn history_fingerprints(project: &ClonedProject) -> SpiderResult<Vec<Fingerprint>> {
    let mut fingerprints = Vec::new();
    if let Some(count) = project.branch_count {
        fingerprints.push(Fingerprint::new(
            names::BRANCH_COUNT,
            names::BRANCH_COUNT,
            serde_json::to_value(BranchCountData { count }).map_err(|e| analyze_error(project, e))?,
        ));
    }
    if let Some(last_commit) = project.last_commit {
        fingerprints.push(Fingerprint::new(
            names::GIT_RECENCY,
            names::GIT_RECENCY,
            serde_json::to_value(GitRecencyData { last_commit })
                .map_err(|e| analyze_error(project, e))?,
        ));
    }
    Ok(fingerprints)
}

fn analyze_error(project: &ClonedProject, err: impl std::fmt::Display) -> SpiderError {
    SpiderError::Analyze {
        repo: project.repo_ref.slug(),
        message: err.to_string(),
    }
}

#[async_trait::async_trait]
impl Analyzer for FileScanAnalyzer {
    async fn analyze(&self, project: &ClonedProject) -> SpiderResult<Vec<Fingerprint>> {
        let this = self.clone();
        let root = project.path.clone();
        let repo = project.repo_ref.slug();
        let mut fingerprints = tokio::task::spawn_blocking(move || this.scan(&root, &repo))
            .await
            .map_err(|e| analyze_error(project, format!("scan task failed: {e}")))??;
        fingerprints.extend(history_fingerprints(project)?);
        tracing::debug!(
            repo = %project.repo_ref,
            count = fingerprints.len(),
            "extracted fingerprints"
        );
        Ok(fingerprints)
    }
}
