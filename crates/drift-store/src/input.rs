use drift_core::ProjectAnalysisResult;
use std::pin::Pin;
use tokio_stream::Stream;

/// An incrementally produced, possibly unbounded sequence of results.
pub type ResultStream = Pin<Box<dyn Stream<Item = ProjectAnalysisResult> + Send>>;

/// What `persist` accepts: one result, a finite batch, or a stream.
pub enum PersistInput {
    One(ProjectAnalysisResult),
    Many(Vec<ProjectAnalysisResult>),
    Stream(ResultStream),
}

impl PersistInput {
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = ProjectAnalysisResult> + Send + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    /// View every variant as a stream, consumed one item at a time.
    pub fn into_stream(self) -> ResultStream {
        match self {
            Self::One(result) => Box::pin(tokio_stream::once(result)),
            Self::Many(results) => Box::pin(tokio_stream::iter(results)),
            Self::Stream(stream) => stream,
        }
    }
}

impl std::fmt::Debug for PersistInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::One(r) => f.debug_tuple("One").field(&r.repo_ref).finish(),
            Self::Many(rs) => f.debug_tuple("Many").field(&rs.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<ProjectAnalysisResult> for PersistInput {
    fn from(result: ProjectAnalysisResult) -> Self {
        Self::One(result)
    }
}

impl From<Vec<ProjectAnalysisResult>> for PersistInput {
    fn from(results: Vec<ProjectAnalysisResult>) -> Self {
        Self::Many(results)
    }
}

impl From<ResultStream> for PersistInput {
    fn from(stream: ResultStream) -> Self {
        Self::Stream(stream)
    }
}
