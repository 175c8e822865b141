use drift_core::CoreError;

/// Errors raised by analysis result stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("analysis already stored for {0}")]
    Duplicate(String),

    #[error("storage engine error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("malformed stored data: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl StoreError {
    /// Transport or engine failure, as opposed to a problem with the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Sqlite(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
