pub mod classify;
pub mod config;
pub mod error;
pub mod payload;
pub mod score;

pub use classify::build_tool::{build_tool_classification, build_tool_marker};
pub use classify::spring::spring_classification;
pub use classify::{
    classify_all, ClassificationAspect, ClassificationOutcome, ClassificationReason,
    ClassificationResult, ClassificationRule, FingerprintTest,
};
pub use config::{DriftConfig, GlobPenalty, ScoringConfig};
pub use error::{RuleError, RuleEvaluationError, RuleResult};
pub use payload::TypedKind;
pub use score::scorers::standard_scorers;
pub use score::{
    collect_violations, Adjustment, ReviewViolation, ScoreComposer, ScoreOutcome, ScorePolicy,
    ScoringInput, ScoringRule,
};
