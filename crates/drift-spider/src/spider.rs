//! Clone, analyze, classify, score and persist a batch of repositories.

use crate::analyze::Analyzer;
use crate::clone::Cloner;
use crate::config::SourceSpec;
use crate::error::SpiderError;
use drift_core::{FingerprintCatalog, PersistResult, ProjectAnalysisResult, SpiderFailure};
use drift_rules::{collect_violations, ClassificationAspect, ScoreComposer, ScoringInput};
use drift_store::store::attempt;
use drift_store::ProjectAnalysisResultStore;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Drives every source through the pipeline with bounded parallelism.
///
/// Each source contributes exactly one attempt to the returned
/// [`PersistResult`], whichever step it fails at.
#[derive(Clone)]
pub struct Spider {
    workspace_id: String,
    cloner: Arc<dyn Cloner>,
    analyzer: Arc<dyn Analyzer>,
    classifiers: Arc<Vec<ClassificationAspect>>,
    composer: Arc<ScoreComposer>,
    catalog: Arc<FingerprintCatalog>,
    store: Arc<dyn ProjectAnalysisResultStore>,
    workers: usize,
}

impl Spider {
    pub fn new(
        workspace_id: impl Into<String>,
        cloner: Arc<dyn Cloner>,
        analyzer: Arc<dyn Analyzer>,
        catalog: Arc<FingerprintCatalog>,
        store: Arc<dyn ProjectAnalysisResultStore>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            cloner,
            analyzer,
            classifiers: Arc::new(Vec::new()),
            composer: Arc::new(ScoreComposer::new(Default::default(), Vec::new())),
            catalog,
            store,
            workers: 4,
        }
    }

    pub fn with_classifiers(mut self, classifiers: Vec<ClassificationAspect>) -> Self {
        self.classifiers = Arc::new(classifiers);
        self
    }

    pub fn with_composer(mut self, composer: ScoreComposer) -> Self {
        self.composer = Arc::new(composer);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub async fn run(&self, sources: Vec<SourceSpec>) -> PersistResult {
        let mut pending = sources.into_iter().enumerate();
        let mut join_set = JoinSet::new();
        let mut outcomes: Vec<(usize, PersistResult)> = Vec::new();

        loop {
            while join_set.len() < self.workers {
                let Some((index, source)) = pending.next() else {
                    break;
                };
                let spider = self.clone();
                join_set.spawn(async move { (index, spider.process(&source).await) });
            }
            match join_set.join_next().await {
                Some(Ok(outcome)) => outcomes.push(outcome),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "spider task failed");
                    outcomes.push((
                        usize::MAX,
                        PersistResult::failed(SpiderFailure::new("<unknown>", "spider", format!("task error: {e}"))),
                    ));
                }
                None => break,
            }
        }

        outcomes.sort_by_key(|(index, _)| *index);
        let total: PersistResult = outcomes.into_iter().map(|(_, outcome)| outcome).sum();
        tracing::info!(
            attempted = total.attempted_count(),
            failed = total.failures().len(),
            "spider run finished"
        );
        total
    }

    /// One source through every step.
    pub async fn process(&self, source: &SourceSpec) -> PersistResult {
        match self.analyze_source(source).await {
            Ok(result) => attempt(self.store.as_ref(), &result).await,
            Err(err) => {
                tracing::warn!(source = %source, step = err.stage(), error = %err, "spider step failed");
                PersistResult::failed(SpiderFailure::new(
                    self.cloner.source_url(source),
                    err.stage(),
                    err.to_string(),
                ))
            }
        }
    }

    async fn analyze_source(&self, source: &SourceSpec) -> Result<ProjectAnalysisResult, SpiderError> {
        let project = self.cloner.clone_project(source).await?;
        let analyzed = self.analyzer.analyze(&project).await;
        if let Err(err) = self.cloner.release(&project).await {
            tracing::warn!(path = %project.path.display(), error = %err, "failed to remove checkout");
        }
        let mut fingerprints = analyzed?;

        let mut tags = std::collections::BTreeSet::new();
        let mut evaluation_errors = Vec::new();
        let mut classified = Vec::with_capacity(self.classifiers.len());
        for classifier in self.classifiers.iter() {
            let outcome = classifier.classify(&fingerprints).await;
            tags.extend(outcome.result.tags.iter().cloned());
            evaluation_errors.extend(outcome.error_messages());
            classified.push(outcome.to_fingerprint());
        }
        fingerprints.extend(classified);

        let violations = collect_violations(&fingerprints, &self.catalog).map_err(|e| {
            SpiderError::Analyze {
                repo: project.repo_ref.slug(),
                message: e.to_string(),
            }
        })?;
        let score = self.composer.score(&ScoringInput::new(&fingerprints, &violations));
        evaluation_errors.extend(score.errors.iter().map(|e| format!("score/{e}")));

        let mut result = ProjectAnalysisResult::new(&self.workspace_id, project.repo_ref, fingerprints);
        result.tags = tags.into_iter().collect();
        result.score = Some(score.total);
        result.evaluation_errors = evaluation_errors;
        if result.is_incomplete() {
            tracing::warn!(
                repo = %result.repo_ref,
                errors = result.evaluation_errors.len(),
                "analysis stored with failed rules"
            );
        }
        Ok(result)
    }
}

impl std::fmt::Debug for Spider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spider")
            .field("workspace_id", &self.workspace_id)
            .field("classifiers", &self.classifiers.len())
            .field("composer", &self.composer)
            .field("workers", &self.workers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::FileScanAnalyzer;
    use crate::clone::ClonedProject;
    use crate::error::SpiderResult;
    use drift_core::RepoRef;
    use drift_rules::error::{RuleError, RuleResult};
    use drift_rules::{build_tool_classification, Adjustment, ClassificationRule, ScorePolicy, ScoringRule};
    use drift_store::InMemoryStore;
    use std::path::PathBuf;

    /// Serves a fixed directory per repository; unknown repos fail to clone.
    struct FixtureCloner {
        root: PathBuf,
    }

    #[async_trait::async_trait]
    impl Cloner for FixtureCloner {
        async fn clone_project(&self, source: &SourceSpec) -> SpiderResult<ClonedProject> {
            let path = self.root.join(&source.repo);
            if !path.exists() {
                return Err(SpiderError::Git {
                    command: "clone".into(),
                    url: self.source_url(source),
                    message: "repository not found".into(),
                });
            }
            Ok(ClonedProject {
                path,
                repo_ref: RepoRef::new(&source.owner, &source.repo).with_sha("abc123"),
                branch_count: Some(2),
                last_commit: None,
            })
        }

        async fn release(&self, _project: &ClonedProject) -> SpiderResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failures_are_counted_per_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("legacy")).unwrap();
        std::fs::write(dir.path().join("legacy/ivy.xml"), "<ivy-module/>").unwrap();

        let catalog = Arc::new(FingerprintCatalog::default());
        let store = Arc::new(InMemoryStore::new());
        let spider = Spider::new(
            "W1",
            Arc::new(FixtureCloner {
                root: dir.path().to_path_buf(),
            }),
            Arc::new(FileScanAnalyzer::new(catalog.clone())),
            catalog,
            store.clone(),
        )
        .with_classifiers(vec![build_tool_classification().unwrap()])
        .with_workers(2);

        let outcome = spider
            .run(vec![SourceSpec::new("atomist", "legacy"), SourceSpec::new("atomist", "missing")])
            .await;

        assert_eq!(outcome.attempted_count(), 2);
        assert!(outcome.is_well_formed());
        assert_eq!(outcome.failures().len(), 1);
        assert_eq!(outcome.failures()[0].while_trying_to, "clone");
        assert_eq!(outcome.failures()[0].repo_url, "https://github.com/atomist/missing");

        let id = &outcome.successes()[0].id;
        let stored = store.load_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.tags, vec!["ivy".to_string()]);
        assert_eq!(stored.score, Some(3.0));
        assert!(stored
            .fingerprints
            .iter()
            .any(|fp| fp.fp_type == drift_core::catalog::names::BUILD_TOOL));
    }

    struct AlwaysFails;

    impl ScoringRule for AlwaysFails {
        fn name(&self) -> &str {
            "always-fails"
        }

        fn adjust(&self, _input: &ScoringInput<'_>) -> RuleResult<Option<Adjustment>> {
            Err(RuleError::Predicate {
                rule: "always-fails".into(),
                message: "no data".into(),
            })
        }
    }

    #[tokio::test]
    async fn failed_rules_are_stored_with_the_result() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("legacy")).unwrap();

        let broken = ClassificationAspect::new(
            "broken-classification",
            None,
            vec![ClassificationRule::with_predicate(
                "boom",
                ["never"],
                "never matches",
                |_: &[drift_core::Fingerprint]| {
                    Err(RuleError::Predicate {
                        rule: "boom".into(),
                        message: "boom".into(),
                    })
                },
            )],
        )
        .unwrap();

        let catalog = Arc::new(FingerprintCatalog::default());
        let store = Arc::new(InMemoryStore::new());
        let spider = Spider::new(
            "W1",
            Arc::new(FixtureCloner {
                root: dir.path().to_path_buf(),
            }),
            Arc::new(FileScanAnalyzer::new(catalog.clone())),
            catalog,
            store.clone(),
        )
        .with_classifiers(vec![broken])
        .with_composer(ScoreComposer::new(ScorePolicy::default(), vec![Box::new(AlwaysFails)]));

        let outcome = spider.run(vec![SourceSpec::new("atomist", "legacy")]).await;
        assert_eq!(outcome.attempted_count(), 1);
        assert!(outcome.failures().is_empty());

        let stored = store
            .load_by_id(&outcome.successes()[0].id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.tags.is_empty());
        assert!(stored.is_incomplete());
        assert_eq!(stored.evaluation_errors.len(), 2);
        assert!(stored.evaluation_errors[0].starts_with("broken-classification/boom:"));
        assert!(stored.evaluation_errors[1].starts_with("score/always-fails:"));

        let classified = stored
            .fingerprints
            .iter()
            .find(|fp| fp.fp_type == "broken-classification")
            .unwrap();
        assert_eq!(classified.data["errors"][0]["rule"], "boom");
    }

    #[tokio::test]
    async fn empty_batch() {
        let catalog = Arc::new(FingerprintCatalog::default());
        let spider = Spider::new(
            "W1",
            Arc::new(FixtureCloner {
                root: PathBuf::from("/nonexistent"),
            }),
            Arc::new(FileScanAnalyzer::new(catalog.clone())),
            catalog,
            Arc::new(InMemoryStore::new()),
        );
        assert_eq!(spider.run(Vec::new()).await, PersistResult::empty());
    }
}
