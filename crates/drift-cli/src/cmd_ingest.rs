use crate::context::{block_on, report_persist, Context};
use anyhow::Context as _;
use async_stream::stream;
use drift_core::{PersistResult, ProjectAnalysisResult, SpiderFailure};
use drift_store::{persist_concurrently, PersistInput, ProjectAnalysisResultStore};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// Execute `drift ingest <path>`
pub fn execute(ctx: &Context, path: &Path, workers: usize, json: bool) -> anyhow::Result<()> {
    let origin = path.display().to_string();
    let store: Arc<dyn ProjectAnalysisResultStore> = Arc::new(ctx.open_store()?);
    let result = block_on(async {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = if origin == "-" {
            Box::new(BufReader::new(tokio::io::stdin()))
        } else {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {origin}"))?;
            Box::new(BufReader::new(file))
        };
        Ok::<_, anyhow::Error>(ingest(store, reader, &origin, workers).await)
    })??;
    report_persist(&result, json)
}

/// Persist JSON Lines as they are read. Malformed lines are recorded as
/// `parse` failures after the persisted items.
async fn ingest<R>(
    store: Arc<dyn ProjectAnalysisResultStore>,
    reader: R,
    origin: &str,
    workers: usize,
) -> PersistResult
where
    R: AsyncBufRead + Send + Unpin + 'static,
{
    let (rejected_tx, mut rejected_rx) = mpsc::unbounded_channel();
    let results = parse_lines(reader, origin.to_string(), rejected_tx);
    let persisted = persist_concurrently(store, PersistInput::stream(results), workers).await;

    let mut rejected = PersistResult::empty();
    while let Some(failure) = rejected_rx.recv().await {
        rejected = rejected.combine(PersistResult::failed(failure));
    }
    tracing::info!(
        persisted = persisted.successes().len(),
        rejected = rejected.attempted_count(),
        "ingested input"
    );
    persisted.combine(rejected)
}

/// One result per well-formed line. Blank lines are skipped; a read error
/// ends the stream.
fn parse_lines<R>(
    reader: R,
    origin: String,
    rejected: mpsc::UnboundedSender<SpiderFailure>,
) -> impl Stream<Item = ProjectAnalysisResult> + Send + 'static
where
    R: AsyncBufRead + Send + Unpin + 'static,
{
    stream! {
        let mut lines = reader.lines();
        let mut line_no = 0usize;
        loop {
            line_no += 1;
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(line = line_no, error = %e, "stopped reading input");
                    let _ = rejected.send(SpiderFailure::new(
                        format!("{origin}:{line_no}"),
                        "read",
                        e.to_string(),
                    ));
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ProjectAnalysisResult>(&line) {
                Ok(result) => yield result,
                Err(e) => {
                    tracing::warn!(line = line_no, error = %e, "skipping malformed result");
                    let _ = rejected.send(SpiderFailure::new(
                        format!("{origin}:{line_no}"),
                        "parse",
                        e.to_string(),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_store::InMemoryStore;
    use std::io::Cursor;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    const GOOD: &str = r#"{"workspace_id":"W1","repo_ref":{"owner":"atomist","repo":"sdm","sha":"1"},"timestamp":"2026-03-01T10:00:00Z"}"#;

    #[tokio::test]
    async fn malformed_lines_become_failures() {
        let input = format!("{GOOD}\n\nnot json\n{{\"workspace_id\":\"W1\"}}\n");
        let store = Arc::new(InMemoryStore::new());
        let total = ingest(store, Cursor::new(input.into_bytes()), "batch.jsonl", 2).await;
        assert_eq!(total.attempted_count(), 3);
        assert_eq!(total.successes().len(), 1);
        assert_eq!(total.failures()[0].repo_url, "batch.jsonl:3");
        assert_eq!(total.failures()[1].repo_url, "batch.jsonl:4");
        assert!(total.failures().iter().all(|f| f.while_trying_to == "parse"));
    }

    #[tokio::test]
    async fn parsed_results_fold_with_rejections() {
        let input = format!("{GOOD}\nnot json\n{GOOD}\n");
        let store = Arc::new(InMemoryStore::new());
        let total = ingest(store, Cursor::new(input.into_bytes()), "-", 2).await;
        assert_eq!(total.attempted_count(), 3);
        assert!(total.is_well_formed());
        // duplicate snapshot plus the parse failure
        assert_eq!(total.failures().len(), 2);
        assert_eq!(total.successes().len(), 1);
    }

    #[tokio::test]
    async fn lines_are_persisted_as_they_arrive() {
        let store = Arc::new(InMemoryStore::new());
        let (mut writer, reader) = tokio::io::duplex(4096);
        let ingesting = tokio::spawn(ingest(store.clone(), BufReader::new(reader), "-", 1));

        writer.write_all(format!("{GOOD}\n").as_bytes()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.distinct_repo_count("W1").await.unwrap() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("first line stored while input is still open");

        writer.write_all(b"not json\n").await.unwrap();
        drop(writer);

        let total = ingesting.await.unwrap();
        assert_eq!(total.attempted_count(), 2);
        assert_eq!(total.successes().len(), 1);
        assert_eq!(total.failures()[0].repo_url, "-:2");
    }
}
