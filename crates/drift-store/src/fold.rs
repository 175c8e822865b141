//! Persisting a stream with bounded parallelism.

use crate::input::PersistInput;
use crate::store::{attempt, ProjectAnalysisResultStore};
use drift_core::{PersistResult, SpiderFailure};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_stream::StreamExt;

/// Like [`ProjectAnalysisResultStore::persist`], but with up to `workers`
/// items in flight. Outcomes are combined in input order.
pub async fn persist_concurrently(
    store: Arc<dyn ProjectAnalysisResultStore>,
    input: PersistInput,
    workers: usize,
) -> PersistResult {
    let workers = workers.max(1);
    let mut results = input.into_stream();
    let mut join_set = JoinSet::new();
    let mut outcomes: Vec<(usize, PersistResult)> = Vec::new();
    let mut next_index = 0usize;
    let mut exhausted = false;

    loop {
        while !exhausted && join_set.len() < workers {
            let Some(result) = results.next().await else {
                exhausted = true;
                break;
            };
            let store = Arc::clone(&store);
            let index = next_index;
            next_index += 1;
            join_set.spawn(async move { (index, attempt(store.as_ref(), &result).await) });
        }
        match join_set.join_next().await {
            Some(Ok(outcome)) => outcomes.push(outcome),
            Some(Err(e)) => {
                // Task panicked or was cancelled
                tracing::warn!(error = %e, "persist task failed");
                outcomes.push((
                    usize::MAX,
                    PersistResult::failed(SpiderFailure::new("<unknown>", "persist", format!("task error: {e}"))),
                ));
            }
            None => break,
        }
    }

    outcomes.sort_by_key(|(index, _)| *index);
    outcomes.into_iter().map(|(_, outcome)| outcome).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use drift_core::{ProjectAnalysisResult, RepoRef};

    fn result(repo: &str) -> ProjectAnalysisResult {
        ProjectAnalysisResult::new("W1", RepoRef::new("atomist", repo).with_sha("1"), vec![])
    }

    #[tokio::test]
    async fn keeps_input_order() {
        let store: Arc<dyn ProjectAnalysisResultStore> = Arc::new(InMemoryStore::new());
        let batch: Vec<_> = (0..20).map(|i| result(&format!("r{i:02}"))).collect();
        let outcome = persist_concurrently(store.clone(), batch.into(), 4).await;
        assert_eq!(outcome.attempted_count(), 20);
        assert!(outcome.is_well_formed());
        let repos: Vec<String> = outcome.successes().iter().map(|s| s.repo_ref.repo.clone()).collect();
        let expected: Vec<String> = (0..20).map(|i| format!("r{i:02}")).collect();
        assert_eq!(repos, expected);
        assert_eq!(store.distinct_repo_count("W1").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn duplicates_fail_individually() {
        let store: Arc<dyn ProjectAnalysisResultStore> = Arc::new(InMemoryStore::new());
        let batch = vec![result("a"), result("a"), result("b")];
        let outcome = persist_concurrently(store, batch.into(), 2).await;
        assert_eq!(outcome.attempted_count(), 3);
        assert_eq!(outcome.failures().len(), 1);
        assert_eq!(outcome.successes().len(), 2);
    }

    #[tokio::test]
    async fn empty_input() {
        let store: Arc<dyn ProjectAnalysisResultStore> = Arc::new(InMemoryStore::new());
        let outcome = persist_concurrently(store, Vec::<ProjectAnalysisResult>::new().into(), 8).await;
        assert_eq!(outcome, PersistResult::empty());
    }
}
