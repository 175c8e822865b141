use serde::{Deserialize, Serialize};

/// Errors raised by rule registration and evaluation.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("malformed '{fp_type}' fingerprint '{name}': {source}")]
    Decode {
        fp_type: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rule '{rule}' failed: {message}")]
    Predicate { rule: String, message: String },

    #[error("invalid rule '{rule}': {message}")]
    InvalidRule { rule: String, message: String },

    #[error("rule '{0}' is registered more than once")]
    DuplicateRule(String),
}

pub type RuleResult<T> = Result<T, RuleError>;

/// A rule that failed to evaluate, kept apart from rules that did not match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEvaluationError {
    pub rule: String,
    pub message: String,
}

impl RuleEvaluationError {
    pub fn new(rule: &str, err: &RuleError) -> Self {
        Self {
            rule: rule.to_string(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for RuleEvaluationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.rule, self.message)
    }
}
