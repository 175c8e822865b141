//! Standard scoring rules.

use super::{Adjustment, ScoreComposer, ScoringInput, ScoringRule};
use crate::config::ScoringConfig;
use crate::error::RuleResult;
use crate::payload::{GlobAspectData, TypedKind, BRANCH_COUNT, GIT_RECENCY};
use drift_core::catalog::names;
use drift_core::{AspectGroup, RegistryConfig};

/// One point lost per started `branch_limit` branches over the limit.
#[derive(Debug, Clone)]
pub struct PenalizeExcessiveBranches {
    pub branch_limit: u32,
}

impl ScoringRule for PenalizeExcessiveBranches {
    fn name(&self) -> &str {
        "excessive-branches"
    }

    fn adjust(&self, input: &ScoringInput<'_>) -> RuleResult<Option<Adjustment>> {
        let Some(branches) = BRANCH_COUNT.first(input.fingerprints)? else {
            return Ok(None);
        };
        let limit = self.branch_limit.max(1);
        if branches.count <= limit {
            return Ok(None);
        }
        let excess = branches.count - limit;
        let points = excess.div_ceil(limit);
        Ok(Some(Adjustment::penalty(
            f64::from(points),
            format!("{} branches, limit is {limit}", branches.count),
        )))
    }
}

/// One point lost when the last commit is older than the window.
#[derive(Debug, Clone)]
pub struct RequireRecentCommit {
    pub days: u32,
}

impl ScoringRule for RequireRecentCommit {
    fn name(&self) -> &str {
        "recent-commit"
    }

    fn adjust(&self, input: &ScoringInput<'_>) -> RuleResult<Option<Adjustment>> {
        let Some(recency) = GIT_RECENCY.first(input.fingerprints)? else {
            return Ok(None);
        };
        let age = input.now - recency.last_commit;
        if age <= time::Duration::days(i64::from(self.days)) {
            return Ok(None);
        }
        Ok(Some(Adjustment::penalty(
            1.0,
            format!("no commit in the last {} days", self.days),
        )))
    }
}

/// Points lost for violations from the named reviewers, rounding down.
#[derive(Debug, Clone)]
pub struct PenalizeReviewViolations {
    name: String,
    reviewers: Vec<String>,
    violations_per_point_lost: u32,
}

impl PenalizeReviewViolations {
    pub fn new(reviewer: &str, violations_per_point_lost: u32) -> Self {
        Self::for_reviewers(&[reviewer], violations_per_point_lost)
    }

    pub fn for_reviewers(reviewers: &[&str], violations_per_point_lost: u32) -> Self {
        Self {
            name: format!("review-violations:{}", reviewers.join(",")),
            reviewers: reviewers.iter().map(|r| r.to_string()).collect(),
            violations_per_point_lost: violations_per_point_lost.max(1),
        }
    }
}

impl ScoringRule for PenalizeReviewViolations {
    fn name(&self) -> &str {
        &self.name
    }

    fn adjust(&self, input: &ScoringInput<'_>) -> RuleResult<Option<Adjustment>> {
        let count = input
            .violations
            .iter()
            .filter(|v| self.reviewers.iter().any(|r| *r == v.reviewer))
            .count() as u64;
        if count == 0 {
            return Ok(None);
        }
        let points = count / u64::from(self.violations_per_point_lost);
        if points == 0 {
            return Ok(None);
        }
        Ok(Some(Adjustment::penalty(
            points as f64,
            format!("{count} violations from {}", self.reviewers.join(", ")),
        )))
    }
}

/// Flat penalty per file matched by a glob aspect.
#[derive(Debug, Clone)]
pub struct PenalizeGlobMatches {
    name: String,
    kind: TypedKind<GlobAspectData>,
    points_lost_per_match: f64,
}

impl PenalizeGlobMatches {
    pub fn new(fp_type: &str, points_lost_per_match: f64) -> Self {
        Self {
            name: format!("glob-matches:{fp_type}"),
            kind: TypedKind::owned(fp_type),
            points_lost_per_match,
        }
    }
}

impl ScoringRule for PenalizeGlobMatches {
    fn name(&self) -> &str {
        &self.name
    }

    fn adjust(&self, input: &ScoringInput<'_>) -> RuleResult<Option<Adjustment>> {
        let matches: usize = self
            .kind
            .decode_all(input.fingerprints)?
            .iter()
            .map(|d| d.matches.len())
            .sum();
        if matches == 0 {
            return Ok(None);
        }
        Ok(Some(Adjustment::penalty(
            matches as f64 * self.points_lost_per_match,
            format!("{matches} files match {}", self.kind.fp_type()),
        )))
    }
}

pub fn general_scorers(config: &ScoringConfig) -> Vec<Box<dyn ScoringRule>> {
    vec![
        Box::new(PenalizeExcessiveBranches {
            branch_limit: config.branch_limit,
        }),
        Box::new(RequireRecentCommit {
            days: config.recent_commit_window_days,
        }),
    ]
}

pub fn spring_idiom_scorers(config: &ScoringConfig) -> Vec<Box<dyn ScoringRule>> {
    let mut rules: Vec<Box<dyn ScoringRule>> = [
        names::NON_SPECIFIC_MVC_ANNOTATION,
        names::HARD_CODED_PROPERTY,
        names::DOT_STAR_USAGE,
        names::MUTABLE_INJECTION_USAGE,
    ]
    .into_iter()
    .map(|reviewer| {
        Box::new(PenalizeReviewViolations::new(reviewer, config.violations_per_point_lost))
            as Box<dyn ScoringRule>
    })
    .collect();
    rules.extend(config.glob_penalties.iter().map(|p| {
        Box::new(PenalizeGlobMatches::new(&p.fp_type, p.points_lost_per_match)) as Box<dyn ScoringRule>
    }));
    rules
}

pub fn twelve_factor_scorers(config: &ScoringConfig) -> Vec<Box<dyn ScoringRule>> {
    vec![Box::new(PenalizeReviewViolations::new(
        names::FILE_IO_USAGE,
        config.twelve_factor_violations_per_point_lost,
    ))]
}

/// Scorers for the groups the registry has switched on.
pub fn standard_scorers(config: &ScoringConfig, registry: &RegistryConfig) -> Vec<Box<dyn ScoringRule>> {
    let groups = registry.effective_groups();
    let mut rules = general_scorers(config);
    if groups.contains(&AspectGroup::SpringIdioms) {
        rules.extend(spring_idiom_scorers(config));
    }
    if groups.contains(&AspectGroup::TwelveFactors) {
        rules.extend(twelve_factor_scorers(config));
    }
    rules
}

impl ScoreComposer {
    pub fn standard(config: &ScoringConfig, registry: &RegistryConfig) -> Self {
        Self::new(config.policy(), standard_scorers(config, registry))
    }
}
