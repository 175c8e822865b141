//! Outcome of persisting analysis results.
//!
//! `PersistResult` is a monoid: `empty()` is the identity and `combine()`
//! sums the attempted count and concatenates the failure and success lists
//! left-then-right. Batch persistence is a fold of single-item outcomes, so
//! one failing item never hides the others.

use crate::types::RepoRef;
use serde::{Deserialize, Serialize};

/// A single item that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiderFailure {
    pub repo_url: String,
    pub while_trying_to: String,
    pub message: String,
}

impl SpiderFailure {
    pub fn new(
        repo_url: impl Into<String>,
        while_trying_to: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            repo_url: repo_url.into(),
            while_trying_to: while_trying_to.into(),
            message: message.into(),
        }
    }
}

/// A single item that was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceResult {
    pub id: String,
    pub repo_ref: RepoRef,
}

/// Summary of a batch of persist attempts.
///
/// Fields are private: every constructor keeps
/// `attempted_count == failed.len() + succeeded.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistResult {
    attempted_count: usize,
    failed: Vec<SpiderFailure>,
    succeeded: Vec<PersistenceResult>,
}

impl PersistResult {
    /// The identity: nothing attempted.
    pub fn empty() -> Self {
        Self::default()
    }

    /// One attempt that succeeded.
    pub fn succeeded(result: PersistenceResult) -> Self {
        Self {
            attempted_count: 1,
            failed: Vec::new(),
            succeeded: vec![result],
        }
    }

    /// One attempt that failed.
    pub fn failed(failure: SpiderFailure) -> Self {
        Self {
            attempted_count: 1,
            failed: vec![failure],
            succeeded: Vec::new(),
        }
    }

    /// Fold a single-item outcome into one result.
    pub fn from_outcome(outcome: Result<PersistenceResult, SpiderFailure>) -> Self {
        match outcome {
            Ok(ok) => Self::succeeded(ok),
            Err(failure) => Self::failed(failure),
        }
    }

    /// Associative combination; `self` entries come before `other` entries.
    pub fn combine(mut self, other: PersistResult) -> Self {
        self.attempted_count += other.attempted_count;
        self.failed.extend(other.failed);
        self.succeeded.extend(other.succeeded);
        self
    }

    pub fn attempted_count(&self) -> usize {
        self.attempted_count
    }

    pub fn failures(&self) -> &[SpiderFailure] {
        &self.failed
    }

    pub fn successes(&self) -> &[PersistenceResult] {
        &self.succeeded
    }

    pub fn is_well_formed(&self) -> bool {
        self.attempted_count == self.failed.len() + self.succeeded.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl std::iter::Sum for PersistResult {
    fn sum<I: Iterator<Item = PersistResult>>(iter: I) -> Self {
        iter.fold(PersistResult::empty(), PersistResult::combine)
    }
}
