/// Errors raised while fetching or analyzing a repository.
#[derive(Debug, thiserror::Error)]
pub enum SpiderError {
    #[error("git {command} failed for {url}: {message}")]
    Git {
        command: String,
        /// Clone URL with credentials masked.
        url: String,
        message: String,
    },

    #[error("git {command} timed out after {seconds}s for {url}")]
    Timeout {
        command: String,
        url: String,
        seconds: u64,
    },

    #[error("analysis of {repo} failed: {message}")]
    Analyze { repo: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("walking checkout failed: {0}")]
    Walk(#[from] ignore::Error),

    #[error(transparent)]
    Core(#[from] drift_core::CoreError),
}

impl SpiderError {
    /// Step name recorded in a `SpiderFailure`.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Git { .. } | Self::Timeout { .. } => "clone",
            Self::Analyze { .. } | Self::Io(_) | Self::Walk(_) | Self::Core(_) => "analyze",
        }
    }
}

pub type SpiderResult<T> = Result<T, SpiderError>;
