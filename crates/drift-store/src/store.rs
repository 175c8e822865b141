//! The storage and query contract for analysis results.

use crate::error::{StoreError, StoreResult};
use crate::input::PersistInput;
use drift_core::{
    AnalyticsRecord, Fingerprint, FingerprintKind, FingerprintUsage, FingerprintWithId,
    PersistResult, PersistenceResult, ProjectAnalysisResult, RepoRef, SpiderFailure,
    WorkspaceScope,
};
use time::OffsetDateTime;
use tokio_stream::StreamExt;

/// Storage and query operations over persisted analysis results.
///
/// Workspace arguments accept a workspace id or `"*"` for every workspace.
/// Single-item lookups return `Ok(None)` when nothing matches; `Err` always
/// means the query itself failed.
#[async_trait::async_trait]
pub trait ProjectAnalysisResultStore: Send + Sync {
    /// Number of distinct `owner/repo` pairs analyzed.
    async fn distinct_repo_count(&self, workspace_id: &str) -> StoreResult<u64>;

    /// Most recent analysis timestamp; `NotFound` for an empty workspace.
    async fn latest_timestamp(&self, workspace_id: &str) -> StoreResult<OffsetDateTime>;

    /// `deep = false` allows results without fingerprints.
    async fn load_in_workspace(
        &self,
        workspace_id: &str,
        deep: bool,
    ) -> StoreResult<Vec<ProjectAnalysisResult>>;

    /// Latest result matching owner/repo and, when given, sha and branch.
    async fn load_by_repo_ref(&self, repo: &RepoRef) -> StoreResult<Option<ProjectAnalysisResult>>;

    async fn load_by_id(&self, id: &str) -> StoreResult<Option<ProjectAnalysisResult>>;

    /// Store one snapshot and assign its id.
    async fn persist_single(&self, result: &ProjectAnalysisResult) -> StoreResult<PersistenceResult>;

    /// Persist every item, folding each outcome into one summary. A failed
    /// item is recorded and the rest are still attempted.
    async fn persist(&self, input: PersistInput) -> PersistResult {
        let mut results = input.into_stream();
        let mut total = PersistResult::empty();
        while let Some(result) = results.next().await {
            total = total.combine(attempt(self, &result).await);
        }
        total
    }

    /// Distinct `{type, name}` pairs, sorted.
    async fn distinct_fingerprint_kinds(&self, workspace_id: &str) -> StoreResult<Vec<FingerprintKind>>;

    /// Persisted cohort statistics, optionally for one fingerprint type.
    async fn fingerprint_usage_for_type(
        &self,
        workspace_id: &str,
        fp_type: Option<&str>,
    ) -> StoreResult<Vec<FingerprintUsage>>;

    /// All-or-nothing: `Ok(false)` means nothing was written.
    async fn persist_analytics(&self, batch: &[AnalyticsRecord]) -> StoreResult<bool>;

    async fn fingerprints_in_workspace(
        &self,
        workspace_id: &str,
        fp_type: Option<&str>,
        name: Option<&str>,
    ) -> StoreResult<Vec<FingerprintWithId>>;

    /// `NotFound` for an unknown id.
    async fn fingerprints_for_project(&self, id: &str) -> StoreResult<Vec<Fingerprint>>;

    /// Mean fingerprints per project; `None` means every workspace.
    async fn average_fingerprint_count(&self, workspace_id: Option<&str>) -> StoreResult<f64>;
}

/// Persist one result, turning any error into a recorded failure.
pub async fn attempt<S>(store: &S, result: &ProjectAnalysisResult) -> PersistResult
where
    S: ProjectAnalysisResultStore + ?Sized,
{
    match store.persist_single(result).await {
        Ok(persisted) => {
            tracing::debug!(id = %persisted.id, repo = %result.repo_ref, "persisted analysis");
            PersistResult::succeeded(persisted)
        }
        Err(err) => {
            tracing::warn!(repo = %result.repo_ref, error = %err, "failed to persist analysis");
            PersistResult::failed(SpiderFailure::new(
                result.repo_ref.display_url(),
                "persist",
                err.to_string(),
            ))
        }
    }
}

/// Parse a workspace argument.
pub fn scope(workspace_id: &str) -> StoreResult<WorkspaceScope> {
    Ok(WorkspaceScope::parse(workspace_id)?)
}

/// Reject results that cannot be keyed.
pub fn validate_result(result: &ProjectAnalysisResult) -> StoreResult<()> {
    if result.workspace_id.trim().is_empty() {
        return Err(StoreError::InvalidInput("workspace id is empty".into()));
    }
    if result.workspace_id == WorkspaceScope::WILDCARD {
        return Err(StoreError::InvalidInput(
            "results must belong to a concrete workspace".into(),
        ));
    }
    if result.repo_ref.owner.trim().is_empty() || result.repo_ref.repo.trim().is_empty() {
        return Err(StoreError::InvalidInput(format!(
            "repository owner and name are required (got '{}')",
            result.repo_ref.slug()
        )));
    }
    Ok(())
}

/// Reject analytics batches containing unusable entries.
pub fn validate_analytics(batch: &[AnalyticsRecord]) -> StoreResult<()> {
    for record in batch {
        if record.workspace_id.trim().is_empty() {
            return Err(StoreError::InvalidInput("analytics workspace id is empty".into()));
        }
        if record.kind.fp_type.is_empty() || record.kind.name.is_empty() {
            return Err(StoreError::InvalidInput(format!(
                "analytics kind '{}' is incomplete",
                record.kind
            )));
        }
        if !record.cohort_analysis.entropy.is_finite() {
            return Err(StoreError::InvalidInput(format!(
                "analytics for '{}' has non-finite entropy",
                record.kind
            )));
        }
    }
    Ok(())
}

/// Store-assigned id for a new snapshot.
pub fn new_analysis_id() -> String {
    format!("{}{}", drift_core::ANALYSIS_ID_PREFIX, ulid::Ulid::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::CohortAnalysis;

    #[test]
    fn wildcard_results_rejected() {
        let r = ProjectAnalysisResult::new("*", RepoRef::new("a", "b"), vec![]);
        assert!(matches!(validate_result(&r), Err(StoreError::InvalidInput(_))));
        let r = ProjectAnalysisResult::new("W1", RepoRef::new("a", ""), vec![]);
        assert!(validate_result(&r).is_err());
        let r = ProjectAnalysisResult::new("W1", RepoRef::new("a", "b"), vec![]);
        assert!(validate_result(&r).is_ok());
    }

    #[test]
    fn analytics_batch_validated() {
        let good = AnalyticsRecord {
            workspace_id: "*".into(),
            kind: FingerprintKind::new("npm-project-deps", "lodash"),
            cohort_analysis: CohortAnalysis::default(),
        };
        assert!(validate_analytics(std::slice::from_ref(&good)).is_ok());

        let mut bad = good.clone();
        bad.workspace_id = String::new();
        assert!(validate_analytics(&[good, bad]).is_err());
    }

    #[test]
    fn ids_are_prefixed() {
        let id = new_analysis_id();
        assert!(id.starts_with("par_"));
        assert_ne!(id, new_analysis_id());
    }
}
