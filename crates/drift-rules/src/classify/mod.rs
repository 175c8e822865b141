//! Project classification: named predicates over a fingerprint set that
//! contribute tags.

pub mod build_tool;
pub mod spring;

use crate::error::{RuleError, RuleEvaluationError, RuleResult};
use drift_core::{Fingerprint, FingerprintCatalog};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Predicate over a project's full fingerprint set.
///
/// Implementations must be pure: no shared mutable state, safe to call
/// concurrently for different projects.
#[async_trait::async_trait]
pub trait FingerprintTest: Send + Sync {
    async fn test(&self, fingerprints: &[Fingerprint]) -> RuleResult<bool>;
}

#[async_trait::async_trait]
impl<F> FingerprintTest for F
where
    F: Fn(&[Fingerprint]) -> RuleResult<bool> + Send + Sync,
{
    async fn test(&self, fingerprints: &[Fingerprint]) -> RuleResult<bool> {
        self(fingerprints)
    }
}

/// One classification rule: when `test` passes, the project gets `tags`.
pub struct ClassificationRule {
    name: String,
    tags: Vec<String>,
    reason: String,
    reads: Vec<String>,
    test: Box<dyn FingerprintTest>,
}

impl std::fmt::Debug for ClassificationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationRule")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("reason", &self.reason)
            .field("reads", &self.reads)
            .finish_non_exhaustive()
    }
}

impl ClassificationRule {
    pub fn new<I, S>(name: &str, tags: I, reason: &str, test: impl FingerprintTest + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            tags: tags.into_iter().map(Into::into).collect(),
            reason: reason.to_string(),
            reads: Vec::new(),
            test: Box::new(test),
        }
    }

    /// Rule with a synchronous predicate.
    pub fn with_predicate<I, S, F>(name: &str, tags: I, reason: &str, predicate: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&[Fingerprint]) -> RuleResult<bool> + Send + Sync + 'static,
    {
        Self::new(name, tags, reason, predicate)
    }

    /// Declare a fingerprint type this rule inspects.
    pub fn reads(mut self, fp_type: &str) -> Self {
        self.reads.push(fp_type.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn read_types(&self) -> &[String] {
        &self.reads
    }

    fn validate(&self) -> RuleResult<()> {
        let invalid = |message: &str| RuleError::InvalidRule {
            rule: self.name.clone(),
            message: message.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.tags.is_empty() || self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(invalid("needs at least one non-empty tag"));
        }
        if self.reason.trim().is_empty() {
            return Err(invalid("reason is empty"));
        }
        Ok(())
    }
}

/// Why a tag was attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationReason {
    pub rule: String,
    pub tags: Vec<String>,
    pub reason: String,
}

/// Tags for a project, with one reason per matching rule in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub tags: BTreeSet<String>,
    pub reasons: Vec<ClassificationReason>,
}

impl ClassificationResult {
    /// All reasons joined for display.
    pub fn reason(&self) -> String {
        self.reasons
            .iter()
            .map(|r| r.reason.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn merge(&mut self, other: ClassificationResult) {
        self.tags.extend(other.tags);
        self.reasons.extend(other.reasons);
    }
}

/// Result of classifying one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    pub aspect: String,
    pub result: ClassificationResult,
    pub errors: Vec<RuleEvaluationError>,
}

impl ClassificationOutcome {
    /// The fingerprint a classification aspect emits: `{tags, reasons}`,
    /// plus `errors` when any rule failed to evaluate.
    pub fn to_fingerprint(&self) -> Fingerprint {
        let tags: Vec<&String> = self.result.tags.iter().collect();
        let reasons: Vec<&str> = self.result.reasons.iter().map(|r| r.reason.as_str()).collect();
        let mut data = serde_json::json!({ "tags": tags, "reasons": reasons });
        if !self.errors.is_empty() {
            data["errors"] = serde_json::json!(self.errors);
        }
        Fingerprint::new(&self.aspect, &self.aspect, data)
    }

    /// Failed rules, each prefixed with this aspect's name.
    pub fn error_messages(&self) -> impl Iterator<Item = String> + '_ {
        self.errors.iter().map(move |e| format!("{}/{e}", self.aspect))
    }
}

/// A named, ordered set of classification rules.
#[derive(Debug)]
pub struct ClassificationAspect {
    name: String,
    display_name: Option<String>,
    rules: Vec<ClassificationRule>,
}

impl ClassificationAspect {
    /// Register rules; fails on malformed or duplicate rules.
    pub fn new(name: &str, display_name: Option<&str>, rules: Vec<ClassificationRule>) -> RuleResult<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            rule.validate()?;
            if !seen.insert(rule.name.as_str()) {
                return Err(RuleError::DuplicateRule(rule.name.clone()));
            }
        }
        Ok(Self {
            name: name.to_string(),
            display_name: display_name.map(str::to_string),
            rules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Declared read types the catalog does not know about.
    pub fn unknown_kinds(&self, catalog: &FingerprintCatalog) -> BTreeSet<String> {
        self.rules
            .iter()
            .flat_map(|r| r.reads.iter())
            .filter(|t| !catalog.contains(t))
            .cloned()
            .collect()
    }

    /// Evaluate every rule against `fingerprints`. A failing rule is recorded
    /// in `errors` and does not stop the others.
    pub async fn classify(&self, fingerprints: &[Fingerprint]) -> ClassificationOutcome {
        let mut outcome = ClassificationOutcome {
            aspect: self.name.clone(),
            ..Default::default()
        };
        for rule in &self.rules {
            match rule.test.test(fingerprints).await {
                Ok(true) => {
                    outcome.result.tags.extend(rule.tags.iter().cloned());
                    outcome.result.reasons.push(ClassificationReason {
                        rule: rule.name.clone(),
                        tags: rule.tags.clone(),
                        reason: rule.reason.clone(),
                    });
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(aspect = %self.name, rule = %rule.name, error = %err, "classification rule failed");
                    outcome.errors.push(RuleEvaluationError::new(&rule.name, &err));
                }
            }
        }
        outcome
    }
}

/// Run several aspects over one project and merge their results.
pub async fn classify_all(aspects: &[ClassificationAspect], fingerprints: &[Fingerprint]) -> ClassificationOutcome {
    let mut merged = ClassificationOutcome {
        aspect: "classification".to_string(),
        ..Default::default()
    };
    for aspect in aspects {
        let outcome = aspect.classify(fingerprints).await;
        merged.result.merge(outcome.result);
        merged.errors.extend(outcome.errors);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(fp_type: &str) -> Fingerprint {
        Fingerprint::new(fp_type, fp_type, serde_json::json!({}))
    }

    fn has_type(fp_type: &'static str) -> impl Fn(&[Fingerprint]) -> RuleResult<bool> + Send + Sync {
        move |fps: &[Fingerprint]| Ok(fps.iter().any(|fp| fp.fp_type == fp_type))
    }

    struct SlowTest;

    #[async_trait::async_trait]
    impl FingerprintTest for SlowTest {
        async fn test(&self, fingerprints: &[Fingerprint]) -> RuleResult<bool> {
            tokio::task::yield_now().await;
            Ok(fingerprints.len() > 1)
        }
    }

    #[tokio::test]
    async fn duplicate_tags_deduplicated_reasons_kept() {
        let aspect = ClassificationAspect::new(
            "security",
            None,
            vec![
                ClassificationRule::with_predicate("starter", ["spring-security"], "has security starter", has_type("a")),
                ClassificationRule::with_predicate("config", ["spring-security"], "has security config", has_type("b")),
            ],
        )
        .unwrap();

        let outcome = aspect.classify(&[marker("a"), marker("b")]).await;
        assert_eq!(outcome.result.tags.len(), 1);
        assert!(outcome.result.tags.contains("spring-security"));
        assert_eq!(outcome.result.reasons.len(), 2);
        assert_eq!(outcome.result.reasons[0].reason, "has security starter");
        assert_eq!(outcome.result.reasons[1].reason, "has security config");
        assert_eq!(
            outcome.result.reason(),
            "has security starter; has security config"
        );
    }

    #[tokio::test]
    async fn empty_fingerprints_match_nothing() {
        let aspect = ClassificationAspect::new(
            "t",
            None,
            vec![ClassificationRule::with_predicate("a", ["a"], "has a", has_type("a"))],
        )
        .unwrap();
        let outcome = aspect.classify(&[]).await;
        assert!(outcome.result.tags.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn failing_rule_is_reported_and_others_still_run() {
        let aspect = ClassificationAspect::new(
            "t",
            None,
            vec![
                ClassificationRule::with_predicate("broken", ["x"], "never", |_: &[Fingerprint]| {
                    Err(RuleError::Predicate {
                        rule: "broken".into(),
                        message: "payload too large".into(),
                    })
                }),
                ClassificationRule::with_predicate("a", ["a"], "has a", has_type("a")),
            ],
        )
        .unwrap();
        let outcome = aspect.classify(&[marker("a")]).await;
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].rule, "broken");
        assert!(outcome.errors[0].message.contains("payload too large"));
        assert_eq!(outcome.result.tags.iter().collect::<Vec<_>>(), vec!["a"]);

        let fp = outcome.to_fingerprint();
        assert_eq!(fp.data["errors"][0]["rule"], "broken");
        assert_eq!(
            outcome.error_messages().collect::<Vec<_>>(),
            vec!["t/broken: rule 'broken' failed: payload too large".to_string()]
        );
    }

    #[tokio::test]
    async fn async_tests_are_awaited() {
        let aspect = ClassificationAspect::new(
            "t",
            None,
            vec![ClassificationRule::new("multi", ["multi"], "has several facts", SlowTest)],
        )
        .unwrap();
        assert!(aspect.classify(&[marker("a")]).await.result.tags.is_empty());
        let outcome = aspect.classify(&[marker("a"), marker("b")]).await;
        assert!(outcome.result.tags.contains("multi"));
    }

    #[test]
    fn registration_rejects_bad_rules() {
        let no_tags = ClassificationAspect::new(
            "t",
            None,
            vec![ClassificationRule::with_predicate("r", Vec::<String>::new(), "why", has_type("a"))],
        );
        assert!(matches!(no_tags, Err(RuleError::InvalidRule { .. })));

        let dup = ClassificationAspect::new(
            "t",
            None,
            vec![
                ClassificationRule::with_predicate("r", ["a"], "why", has_type("a")),
                ClassificationRule::with_predicate("r", ["b"], "why", has_type("b")),
            ],
        );
        assert!(matches!(dup, Err(RuleError::DuplicateRule(name)) if name == "r"));
    }

    #[test]
    fn unknown_kinds_reported_against_catalog() {
        let catalog = FingerprintCatalog::standard(&Default::default()).unwrap();
        let aspect = ClassificationAspect::new(
            "t",
            None,
            vec![
                ClassificationRule::with_predicate("a", ["a"], "why", has_type("a")).reads("spring-boot-starter"),
                ClassificationRule::with_predicate("b", ["b"], "why", has_type("b")).reads("mystery-kind"),
            ],
        )
        .unwrap();
        let unknown = aspect.unknown_kinds(&catalog);
        assert_eq!(unknown.into_iter().collect::<Vec<_>>(), vec!["mystery-kind"]);
    }

    #[tokio::test]
    async fn outcome_becomes_fingerprint() {
        let aspect = ClassificationAspect::new(
            "build-tool",
            Some("Build tool"),
            vec![ClassificationRule::with_predicate("ivy", ["ivy"], "has ivy.xml", has_type("ivy"))],
        )
        .unwrap();
        let fp = aspect.classify(&[marker("ivy")]).await.to_fingerprint();
        assert_eq!(fp.fp_type, "build-tool");
        assert_eq!(fp.data["tags"], serde_json::json!(["ivy"]));
        assert!(fp.data.get("errors").is_none());
    }
}
