//! Repository health scoring: additive point adjustments around an anchor.

pub mod scorers;

use crate::error::{RuleEvaluationError, RuleResult};
use crate::payload::{ReviewData, TypedKind};
use drift_core::{AspectKind, Fingerprint, FingerprintCatalog};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A review comment attributed to the reviewer aspect that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewViolation {
    pub reviewer: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Flatten the payloads of every review-kind fingerprint into violations.
pub fn collect_violations(
    fingerprints: &[Fingerprint],
    catalog: &FingerprintCatalog,
) -> RuleResult<Vec<ReviewViolation>> {
    let mut out = Vec::new();
    for fp in fingerprints {
        let is_review = catalog
            .get(&fp.fp_type)
            .is_some_and(|a| matches!(a.kind, AspectKind::Review));
        if !is_review {
            continue;
        }
        let Some(review) = TypedKind::<ReviewData>::owned(fp.fp_type.clone()).decode(fp)? else {
            continue;
        };
        out.extend(review.violations.into_iter().map(|c| ReviewViolation {
            reviewer: fp.fp_type.clone(),
            detail: c.detail,
            path: c.path,
        }));
    }
    Ok(out)
}

/// Everything a scoring rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub fingerprints: &'a [Fingerprint],
    pub violations: &'a [ReviewViolation],
    /// Reference time for recency rules.
    pub now: OffsetDateTime,
}

impl<'a> ScoringInput<'a> {
    pub fn new(fingerprints: &'a [Fingerprint], violations: &'a [ReviewViolation]) -> Self {
        Self {
            fingerprints,
            violations,
            now: OffsetDateTime::now_utc(),
        }
    }

    pub fn at(mut self, now: OffsetDateTime) -> Self {
        self.now = now;
        self
    }
}

/// A point change proposed by one rule. Negative is a penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub points: f64,
    pub reason: String,
}

impl Adjustment {
    pub fn penalty(points: f64, reason: impl Into<String>) -> Self {
        Self {
            points: -points.abs(),
            reason: reason.into(),
        }
    }
}

pub trait ScoringRule: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` when the rule has nothing to say about this project.
    fn adjust(&self, input: &ScoringInput<'_>) -> RuleResult<Option<Adjustment>>;
}

/// Anchor score and optional bounds applied to the summed adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorePolicy {
    pub anchor: f64,
    pub floor: Option<f64>,
    pub ceiling: Option<f64>,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self {
            anchor: 3.0,
            floor: Some(0.0),
            ceiling: None,
        }
    }
}

impl ScorePolicy {
    pub fn clamp(&self, raw: f64) -> f64 {
        let mut score = raw;
        if let Some(floor) = self.floor {
            score = score.max(floor);
        }
        if let Some(ceiling) = self.ceiling {
            score = score.min(ceiling);
        }
        score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedAdjustment {
    pub rule: String,
    pub points: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    /// Anchor plus adjustments, clamped to the policy bounds.
    pub total: f64,
    /// Anchor plus adjustments before clamping.
    pub raw_total: f64,
    pub adjustments: Vec<AppliedAdjustment>,
    pub errors: Vec<RuleEvaluationError>,
}

/// Runs scoring rules in order and sums their adjustments.
pub struct ScoreComposer {
    policy: ScorePolicy,
    rules: Vec<Box<dyn ScoringRule>>,
}

impl std::fmt::Debug for ScoreComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreComposer")
            .field("policy", &self.policy)
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl ScoreComposer {
    pub fn new(policy: ScorePolicy, rules: Vec<Box<dyn ScoringRule>>) -> Self {
        Self { policy, rules }
    }

    pub fn policy(&self) -> &ScorePolicy {
        &self.policy
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name())
    }

    /// Score one project. A failing rule contributes nothing and is reported
    /// in `errors`; the remaining rules still run.
    pub fn score(&self, input: &ScoringInput<'_>) -> ScoreOutcome {
        let mut adjustments = Vec::new();
        let mut errors = Vec::new();
        for rule in &self.rules {
            match rule.adjust(input) {
                Ok(Some(adj)) => adjustments.push(AppliedAdjustment {
                    rule: rule.name().to_string(),
                    points: adj.points,
                    reason: adj.reason,
                }),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(rule = rule.name(), error = %err, "scoring rule failed");
                    errors.push(RuleEvaluationError::new(rule.name(), &err));
                }
            }
        }
        let raw_total = self.policy.anchor + adjustments.iter().map(|a| a.points).sum::<f64>();
        ScoreOutcome {
            total: self.policy.clamp(raw_total),
            raw_total,
            adjustments,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;
    use drift_core::catalog::names;
    use drift_core::RegistryConfig;

    struct Fixed(&'static str, f64);

    impl ScoringRule for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn adjust(&self, _input: &ScoringInput<'_>) -> RuleResult<Option<Adjustment>> {
            Ok(Some(Adjustment {
                points: self.1,
                reason: format!("{} points", self.1),
            }))
        }
    }

    struct Broken;

    impl ScoringRule for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn adjust(&self, _input: &ScoringInput<'_>) -> RuleResult<Option<Adjustment>> {
            Err(RuleError::Predicate {
                rule: "broken".into(),
                message: "boom".into(),
            })
        }
    }

    #[test]
    fn sums_from_anchor() {
        let composer = ScoreComposer::new(
            ScorePolicy::default(),
            vec![Box::new(Fixed("a", -1.0)), Box::new(Fixed("b", -2.0))],
        );
        let outcome = composer.score(&ScoringInput::new(&[], &[]));
        assert_eq!(outcome.total, 0.0);
        assert_eq!(outcome.raw_total, 0.0);
        assert_eq!(outcome.adjustments.len(), 2);
    }

    #[test]
    fn floor_and_ceiling_clamp() {
        let policy = ScorePolicy {
            anchor: 5.0,
            floor: Some(0.0),
            ceiling: Some(6.0),
        };
        let low = ScoreComposer::new(policy, vec![Box::new(Fixed("a", -9.0))]);
        let outcome = low.score(&ScoringInput::new(&[], &[]));
        assert_eq!(outcome.total, 0.0);
        assert_eq!(outcome.raw_total, -4.0);

        let high = ScoreComposer::new(policy, vec![Box::new(Fixed("bonus", 3.0))]);
        assert_eq!(high.score(&ScoringInput::new(&[], &[])).total, 6.0);
    }

    #[test]
    fn unbounded_policy_keeps_raw() {
        let policy = ScorePolicy {
            anchor: 0.0,
            floor: None,
            ceiling: None,
        };
        let composer = ScoreComposer::new(policy, vec![Box::new(Fixed("a", -3.5))]);
        assert_eq!(composer.score(&ScoringInput::new(&[], &[])).total, -3.5);
    }

    #[test]
    fn failing_rule_reported_separately() {
        let composer = ScoreComposer::new(
            ScorePolicy::default(),
            vec![Box::new(Broken), Box::new(Fixed("a", -1.0))],
        );
        let outcome = composer.score(&ScoringInput::new(&[], &[]));
        assert_eq!(outcome.total, 2.0);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].rule, "broken");
    }

    #[test]
    fn violations_collected_from_review_aspects() {
        let catalog = FingerprintCatalog::standard(&RegistryConfig::default()).unwrap();
        let fps = vec![
            Fingerprint::new(
                names::HARD_CODED_PROPERTY,
                names::HARD_CODED_PROPERTY,
                serde_json::json!({"violations": [
                    {"detail": "server.port hard-coded", "path": "src/main/resources/application.properties"},
                    {"detail": "spring.datasource.url hard-coded"}
                ]}),
            ),
            Fingerprint::new(names::NPM_DEPS, "lodash", serde_json::json!("4.17.21")),
        ];
        let violations = collect_violations(&fps, &catalog).unwrap();
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.reviewer == names::HARD_CODED_PROPERTY));
        assert!(violations[1].path.is_none());
    }
}
