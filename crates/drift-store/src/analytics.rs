//! Cohort statistics derived from persisted fingerprints.

use crate::error::{StoreError, StoreResult};
use crate::store::ProjectAnalysisResultStore;
use drift_core::{AnalyticsRecord, CohortAnalysis, Fingerprint, FingerprintKind};
use std::collections::BTreeMap;

/// Recompute one [`AnalyticsRecord`] per fingerprint kind in the workspace
/// and persist the batch. `"*"` computes across every workspace and stores
/// the records under `"*"`.
pub async fn compute_analytics<S>(store: &S, workspace_id: &str) -> StoreResult<Vec<AnalyticsRecord>>
where
    S: ProjectAnalysisResultStore + ?Sized,
{
    let fingerprints = store.fingerprints_in_workspace(workspace_id, None, None).await?;
    let mut by_kind: BTreeMap<FingerprintKind, Vec<Fingerprint>> = BTreeMap::new();
    for fp in fingerprints {
        by_kind
            .entry(fp.fingerprint.kind())
            .or_default()
            .push(fp.fingerprint);
    }

    let records: Vec<AnalyticsRecord> = by_kind
        .into_iter()
        .map(|(kind, fps)| AnalyticsRecord {
            workspace_id: workspace_id.to_string(),
            kind,
            cohort_analysis: CohortAnalysis::compute(&fps),
        })
        .collect();

    if !store.persist_analytics(&records).await? {
        return Err(StoreError::InvalidInput(format!(
            "analytics for workspace {workspace_id} were rejected"
        )));
    }
    tracing::info!(workspace = workspace_id, kinds = records.len(), "computed analytics");
    Ok(records)
}
