//! In-memory store, used for tests and one-shot runs.

use crate::error::{StoreError, StoreResult};
use crate::store::{new_analysis_id, scope, validate_analytics, validate_result, ProjectAnalysisResultStore};
use drift_core::{
    AnalyticsRecord, Fingerprint, FingerprintKind, FingerprintUsage, FingerprintWithId,
    PersistenceResult, ProjectAnalysisResult, RepoRef,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    /// Insertion order.
    results: Vec<ProjectAnalysisResult>,
    keys: HashSet<String>,
    analytics: BTreeMap<(String, FingerprintKind), AnalyticsRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.results.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl ProjectAnalysisResultStore for InMemoryStore {
    async fn distinct_repo_count(&self, workspace_id: &str) -> StoreResult<u64> {
        let scope = scope(workspace_id)?;
        let inner = self.inner.read().await;
        let repos: HashSet<(&str, &str)> = inner
            .results
            .iter()
            .filter(|r| scope.includes(&r.workspace_id))
            .map(|r| (r.repo_ref.owner.as_str(), r.repo_ref.repo.as_str()))
            .collect();
        Ok(repos.len() as u64)
    }

    async fn latest_timestamp(&self, workspace_id: &str) -> StoreResult<OffsetDateTime> {
        let scope = scope(workspace_id)?;
        let inner = self.inner.read().await;
        inner
            .results
            .iter()
            .filter(|r| scope.includes(&r.workspace_id))
            .map(|r| r.timestamp)
            .max()
            .ok_or_else(|| StoreError::NotFound(format!("no analyses in workspace {scope}")))
    }

    async fn load_in_workspace(
        &self,
        workspace_id: &str,
        _deep: bool,
    ) -> StoreResult<Vec<ProjectAnalysisResult>> {
        let scope = scope(workspace_id)?;
        let inner = self.inner.read().await;
        Ok(inner
            .results
            .iter()
            .filter(|r| scope.includes(&r.workspace_id))
            .cloned()
            .collect())
    }

    async fn load_by_repo_ref(&self, repo: &RepoRef) -> StoreResult<Option<ProjectAnalysisResult>> {
        let inner = self.inner.read().await;
        // Later insertions win ties.
        Ok(inner
            .results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.repo_ref.matches(repo))
            .max_by_key(|(i, r)| (r.timestamp, *i))
            .map(|(_, r)| r.clone()))
    }

    async fn load_by_id(&self, id: &str) -> StoreResult<Option<ProjectAnalysisResult>> {
        let inner = self.inner.read().await;
        Ok(inner
            .results
            .iter()
            .find(|r| r.id.as_deref() == Some(id))
            .cloned())
    }

    async fn persist_single(&self, result: &ProjectAnalysisResult) -> StoreResult<PersistenceResult> {
        validate_result(result)?;
        let key = result.snapshot_key();
        let mut inner = self.inner.write().await;
        if !inner.keys.insert(key.clone()) {
            return Err(StoreError::Duplicate(key));
        }
        let id = new_analysis_id();
        let mut stored = result.clone();
        stored.id = Some(id.clone());
        inner.results.push(stored);
        Ok(PersistenceResult {
            id,
            repo_ref: result.repo_ref.clone(),
        })
    }

    async fn distinct_fingerprint_kinds(&self, workspace_id: &str) -> StoreResult<Vec<FingerprintKind>> {
        let scope = scope(workspace_id)?;
        let inner = self.inner.read().await;
        let kinds: BTreeSet<FingerprintKind> = inner
            .results
            .iter()
            .filter(|r| scope.includes(&r.workspace_id))
            .flat_map(|r| r.fingerprints.iter().map(Fingerprint::kind))
            .collect();
        Ok(kinds.into_iter().collect())
    }

    async fn fingerprint_usage_for_type(
        &self,
        workspace_id: &str,
        fp_type: Option<&str>,
    ) -> StoreResult<Vec<FingerprintUsage>> {
        let scope = scope(workspace_id)?;
        let inner = self.inner.read().await;
        Ok(inner
            .analytics
            .values()
            .filter(|a| scope.includes(&a.workspace_id))
            .filter(|a| fp_type.map_or(true, |t| a.kind.fp_type == t))
            .map(|a| FingerprintUsage {
                name: a.kind.name.clone(),
                fp_type: a.kind.fp_type.clone(),
                categories: BTreeSet::new(),
                cohort: a.cohort_analysis.clone(),
            })
            .collect())
    }

    async fn persist_analytics(&self, batch: &[AnalyticsRecord]) -> StoreResult<bool> {
        if let Err(err) = validate_analytics(batch) {
            tracing::warn!(error = %err, "rejected analytics batch");
            return Ok(false);
        }
        let mut inner = self.inner.write().await;
        for record in batch {
            inner.analytics.insert(
                (record.workspace_id.clone(), record.kind.clone()),
                record.clone(),
            );
        }
        tracing::info!(records = batch.len(), "persisted analytics");
        Ok(true)
    }

    async fn fingerprints_in_workspace(
        &self,
        workspace_id: &str,
        fp_type: Option<&str>,
        name: Option<&str>,
    ) -> StoreResult<Vec<FingerprintWithId>> {
        let scope = scope(workspace_id)?;
        let inner = self.inner.read().await;
        let mut out = Vec::new();
        for result in inner.results.iter().filter(|r| scope.includes(&r.workspace_id)) {
            let id = result.id.clone().unwrap_or_default();
            out.extend(
                result
                    .fingerprints
                    .iter()
                    .filter(|fp| fp_type.map_or(true, |t| fp.fp_type == t))
                    .filter(|fp| name.map_or(true, |n| fp.name == n))
                    .map(|fp| FingerprintWithId {
                        id: id.clone(),
                        fingerprint: fp.clone(),
                    }),
            );
        }
        Ok(out)
    }

    async fn fingerprints_for_project(&self, id: &str) -> StoreResult<Vec<Fingerprint>> {
        self.load_by_id(id)
            .await?
            .map(|r| r.fingerprints)
            .ok_or_else(|| StoreError::NotFound(format!("analysis {id}")))
    }

    async fn average_fingerprint_count(&self, workspace_id: Option<&str>) -> StoreResult<f64> {
        let scope = scope(workspace_id.unwrap_or(drift_core::WorkspaceScope::WILDCARD))?;
        let inner = self.inner.read().await;
        let counts: Vec<usize> = inner
            .results
            .iter()
            .filter(|r| scope.includes(&r.workspace_id))
            .map(|r| r.fingerprints.len())
            .collect();
        if counts.is_empty() {
            return Ok(0.0);
        }
        Ok(counts.iter().sum::<usize>() as f64 / counts.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PersistInput;
    use drift_core::CohortAnalysis;
    use time::macros::datetime;

    fn fp(name: &str, version: &str) -> Fingerprint {
        Fingerprint::new("npm-project-deps", name, serde_json::json!(version))
    }

    fn result(ws: &str, repo: &str, sha: &str, fps: Vec<Fingerprint>) -> ProjectAnalysisResult {
        ProjectAnalysisResult::new(ws, RepoRef::new("atomist", repo).with_sha(sha).with_branch("main"), fps)
    }

    #[tokio::test]
    async fn empty_workspace() {
        let store = InMemoryStore::new();
        assert_eq!(store.distinct_repo_count("W1").await.unwrap(), 0);
        assert_eq!(store.average_fingerprint_count(Some("W1")).await.unwrap(), 0.0);
        assert!(store.load_in_workspace("W1", false).await.unwrap().is_empty());
        assert!(matches!(
            store.latest_timestamp("W1").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn batch_with_duplicate_middle_item() {
        let store = InMemoryStore::new();
        store.persist(result("W1", "b", "2", vec![]).into()).await;

        let batch = vec![
            result("W1", "a", "1", vec![]),
            result("W1", "b", "2", vec![]),
            result("W1", "c", "3", vec![]),
        ];
        let outcome = store.persist(PersistInput::Many(batch)).await;
        assert_eq!(outcome.attempted_count(), 3);
        assert!(outcome.is_well_formed());
        assert_eq!(outcome.failures().len(), 1);
        assert_eq!(outcome.failures()[0].repo_url, "https://github.com/atomist/b");
        assert_eq!(outcome.failures()[0].while_trying_to, "persist");
        let repos: Vec<&str> = outcome.successes().iter().map(|s| s.repo_ref.repo.as_str()).collect();
        assert_eq!(repos, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn persist_consumes_streams() {
        let store = InMemoryStore::new();
        let results = async_stream::stream! {
            for i in 0..4 {
                yield result("W1", &format!("r{i}"), "s", vec![fp("lodash", "4")]);
            }
        };
        let outcome = store.persist(PersistInput::stream(results)).await;
        assert_eq!(outcome.successes().len(), 4);
        assert_eq!(store.distinct_repo_count("W1").await.unwrap(), 4);
        assert_eq!(store.distinct_repo_count("*").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn lookups() {
        let store = InMemoryStore::new();
        let older = result("W1", "a", "1", vec![fp("lodash", "3")]).at(datetime!(2019-01-01 0:00 UTC));
        let newer = result("W1", "a", "2", vec![fp("lodash", "4"), fp("react", "16")])
            .at(datetime!(2019-06-01 0:00 UTC));
        let outcome = store.persist(vec![older, newer].into()).await;
        let newer_id = outcome.successes()[1].id.clone();

        let latest = store.load_by_repo_ref(&RepoRef::new("atomist", "a")).await.unwrap().unwrap();
        assert_eq!(latest.id.as_deref(), Some(newer_id.as_str()));
        let pinned = store
            .load_by_repo_ref(&RepoRef::new("atomist", "a").with_sha("1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pinned.repo_ref.sha.as_deref(), Some("1"));
        assert!(store.load_by_repo_ref(&RepoRef::new("other", "a")).await.unwrap().is_none());

        assert_eq!(store.latest_timestamp("W1").await.unwrap(), datetime!(2019-06-01 0:00 UTC));
        assert_eq!(store.fingerprints_for_project(&newer_id).await.unwrap().len(), 2);
        assert!(store.load_by_id("par_missing").await.unwrap().is_none());
        assert!(matches!(
            store.fingerprints_for_project("par_missing").await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.average_fingerprint_count(None).await.unwrap(), 1.5);

        let kinds = store.distinct_fingerprint_kinds("W1").await.unwrap();
        assert_eq!(kinds.len(), 2);
        let lodash = store
            .fingerprints_in_workspace("W1", Some("npm-project-deps"), Some("lodash"))
            .await
            .unwrap();
        assert_eq!(lodash.len(), 2);
    }

    #[tokio::test]
    async fn analytics_all_or_nothing() {
        let store = InMemoryStore::new();
        let good = AnalyticsRecord {
            workspace_id: "W1".into(),
            kind: FingerprintKind::new("npm-project-deps", "lodash"),
            cohort_analysis: CohortAnalysis {
                count: 2,
                variants: 2,
                entropy: 1.0,
            },
        };
        let mut bad = good.clone();
        bad.kind = FingerprintKind::new("npm-project-deps", "");
        assert!(!store.persist_analytics(&[good.clone(), bad]).await.unwrap());
        assert!(store.fingerprint_usage_for_type("W1", None).await.unwrap().is_empty());

        assert!(store.persist_analytics(&[good]).await.unwrap());
        let usage = store
            .fingerprint_usage_for_type("W1", Some("npm-project-deps"))
            .await
            .unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].cohort.variants, 2);
        assert!(store.fingerprint_usage_for_type("W1", Some("docker-ports")).await.unwrap().is_empty());
        assert_eq!(store.fingerprint_usage_for_type(" W1 ", None).await.unwrap(), usage);
    }

    #[tokio::test]
    async fn empty_workspace_id_is_an_error() {
        let store = InMemoryStore::new();
        assert!(store.distinct_repo_count("").await.is_err());
    }
}
