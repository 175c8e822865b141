/// Errors raised while building or validating the core model.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("workspace id must not be empty (use \"*\" for all workspaces)")]
    EmptyWorkspaceId,

    #[error("aspect '{0}' is registered more than once")]
    DuplicateAspect(String),

    #[error("aspect '{name}' has an invalid glob '{glob}': {source}")]
    InvalidGlob {
        name: String,
        glob: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: time::error::Parse,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;
