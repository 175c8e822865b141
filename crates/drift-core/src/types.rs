use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Prefix of store-assigned analysis ids: `par_<ulid>`.
pub const ANALYSIS_ID_PREFIX: &str = "par_";

/// Identifies a class of fact, e.g. `npm-project-deps` / `typescript`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FingerprintKind {
    #[serde(rename = "type")]
    pub fp_type: String,
    pub name: String,
}

impl FingerprintKind {
    pub fn new(fp_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            fp_type: fp_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FingerprintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.fp_type, self.name)
    }
}

/// A typed, named, versioned fact extracted from a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    #[serde(rename = "type")]
    pub fp_type: String,
    pub name: String,
    pub data: serde_json::Value,
    pub sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
}

impl Fingerprint {
    /// Build a fingerprint, deriving `sha` from the canonical form of `data`.
    pub fn new(fp_type: impl Into<String>, name: impl Into<String>, data: serde_json::Value) -> Self {
        let sha = crate::hash::payload_sha(&data);
        Self {
            fp_type: fp_type.into(),
            name: name.into(),
            data,
            sha,
            display_name: None,
            display_value: None,
        }
    }

    pub fn with_display(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self.display_value = Some(value.into());
        self
    }

    pub fn kind(&self) -> FingerprintKind {
        FingerprintKind::new(&self.fp_type, &self.name)
    }

    pub fn is_kind(&self, kind: &FingerprintKind) -> bool {
        self.fp_type == kind.fp_type && self.name == kind.name
    }
}

/// A fingerprint tagged with the persisted id of the project it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintWithId {
    pub id: String,
    #[serde(flatten)]
    pub fingerprint: Fingerprint,
}

/// Repository identity: owner/repo plus an optional sha and branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            ..Default::default()
        }
    }

    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = Some(sha.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// `owner/repo`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn display_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("https://github.com/{}/{}", self.owner, self.repo),
        }
    }

    /// Does this (stored) ref satisfy `query`? Owner and repo must be equal;
    /// sha and branch are compared only when the query sets them.
    pub fn matches(&self, query: &RepoRef) -> bool {
        self.owner == query.owner
            && self.repo == query.repo
            && query.sha.as_ref().map_or(true, |s| self.sha.as_ref() == Some(s))
            && query
                .branch
                .as_ref()
                .map_or(true, |b| self.branch.as_ref() == Some(b))
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())?;
        if let Some(branch) = &self.branch {
            write!(f, "@{branch}")?;
        }
        if let Some(sha) = &self.sha {
            let short: String = sha.chars().take(7).collect();
            write!(f, "#{short}")?;
        }
        Ok(())
    }
}

/// Workspace scope for queries. `"*"` selects every workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkspaceScope {
    All,
    Id(String),
}

impl WorkspaceScope {
    pub const WILDCARD: &'static str = "*";

    pub fn parse(workspace_id: &str) -> CoreResult<Self> {
        match workspace_id.trim() {
            "" => Err(CoreError::EmptyWorkspaceId),
            Self::WILDCARD => Ok(Self::All),
            id => Ok(Self::Id(id.to_string())),
        }
    }

    pub fn includes(&self, workspace_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Id(id) => id == workspace_id,
        }
    }

    /// The concrete workspace id, or `None` for the wildcard.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Id(id) => Some(id),
        }
    }
}

impl fmt::Display for WorkspaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id().unwrap_or(Self::WILDCARD))
    }
}

/// One analysis run of one repository, scoped to a workspace.
///
/// Persisted as an immutable snapshot; `id` is `None` until a store assigns one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectAnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub workspace_id: String,
    pub repo_ref: RepoRef,
    #[serde(default)]
    pub fingerprints: Vec<Fingerprint>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Rules that failed to evaluate. Non-empty means tags and score were
    /// computed from incomplete data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evaluation_errors: Vec<String>,
}

impl ProjectAnalysisResult {
    pub fn new(workspace_id: impl Into<String>, repo_ref: RepoRef, fingerprints: Vec<Fingerprint>) -> Self {
        Self {
            id: None,
            workspace_id: workspace_id.into(),
            repo_ref,
            fingerprints,
            timestamp: OffsetDateTime::now_utc(),
            tags: Vec::new(),
            score: None,
            evaluation_errors: Vec::new(),
        }
    }

    pub fn is_incomplete(&self) -> bool {
        !self.evaluation_errors.is_empty()
    }

    pub fn at(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Key that must be unique among persisted snapshots.
    pub fn snapshot_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.workspace_id,
            self.repo_ref.slug(),
            self.repo_ref.sha.as_deref().unwrap_or("")
        )
    }
}

/// Persisted cohort statistics for one fingerprint kind in one workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub workspace_id: String,
    pub kind: FingerprintKind,
    pub cohort_analysis: crate::cohort::CohortAnalysis,
}

/// Data about the use of a fingerprint kind in a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintUsage {
    pub name: String,
    #[serde(rename = "type")]
    pub fp_type: String,
    #[serde(default)]
    pub categories: std::collections::BTreeSet<String>,
    #[serde(flatten)]
    pub cohort: crate::cohort::CohortAnalysis,
}

/// Parse an RFC 3339 timestamp.
pub fn parse_timestamp(value: &str) -> CoreResult<OffsetDateTime> {
    OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339).map_err(
        |source| CoreError::Timestamp {
            value: value.to_string(),
            source,
        },
    )
}

/// Format a timestamp as RFC 3339.
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
