//! Compliance of a project against workspace targets.
//!
//! A target is the desired fingerprint for a kind. A project differs from a
//! target when it carries the same kind with a different sha. Kinds the
//! project does not carry at all are not differences.

use crate::catalog::FingerprintCatalog;
use crate::types::{Fingerprint, ProjectAnalysisResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const STATE_COMPLIANT: &str = "compliant";
pub const STATE_NOT_COMPLIANT: &str = "not_compliant";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceTarget {
    #[serde(rename = "type")]
    pub fp_type: String,
    pub name: String,
    pub sha: String,
    pub data: String,
    pub display_name: String,
    pub display_value: String,
    pub display_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceDifference {
    #[serde(rename = "type")]
    pub fp_type: String,
    pub name: String,
    pub sha: String,
    pub data: String,
    pub display_name: String,
    pub display_value: String,
    pub aspect_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceAspect {
    #[serde(rename = "type")]
    pub fp_type: String,
    pub display_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceData {
    pub owner: String,
    pub state: String,
    pub sha: String,
    pub branch: String,
    pub targets: Vec<ComplianceTarget>,
    pub differences: Vec<ComplianceDifference>,
    pub aspects: Vec<ComplianceAspect>,
}

impl ComplianceData {
    /// Compare a project's fingerprints with the target fingerprints.
    pub fn evaluate(
        project: &ProjectAnalysisResult,
        targets: &[Fingerprint],
        catalog: &FingerprintCatalog,
    ) -> Self {
        let target_rows: Vec<ComplianceTarget> = targets
            .iter()
            .map(|t| ComplianceTarget {
                fp_type: t.fp_type.clone(),
                name: t.name.clone(),
                sha: t.sha.clone(),
                data: t.data.to_string(),
                display_name: t.display_name.clone().unwrap_or_else(|| t.name.clone()),
                display_value: display_value(t),
                display_type: catalog.display_name(&t.fp_type).to_string(),
            })
            .collect();

        let differences: Vec<ComplianceDifference> = targets
            .iter()
            .filter_map(|target| {
                let actual = project
                    .fingerprints
                    .iter()
                    .find(|fp| fp.fp_type == target.fp_type && fp.name == target.name)?;
                (actual.sha != target.sha).then(|| ComplianceDifference {
                    fp_type: actual.fp_type.clone(),
                    name: actual.name.clone(),
                    sha: actual.sha.clone(),
                    data: actual.data.to_string(),
                    display_name: actual.display_name.clone().unwrap_or_else(|| actual.name.clone()),
                    display_value: display_value(actual),
                    aspect_name: catalog.display_name(&actual.fp_type).to_string(),
                })
            })
            .collect();

        let types: BTreeSet<&str> = targets.iter().map(|t| t.fp_type.as_str()).collect();
        let aspects = types
            .into_iter()
            .map(|t| ComplianceAspect {
                fp_type: t.to_string(),
                display_type: catalog.display_name(t).to_string(),
            })
            .collect();

        let state = if differences.is_empty() {
            STATE_COMPLIANT
        } else {
            STATE_NOT_COMPLIANT
        };

        Self {
            owner: project.repo_ref.owner.clone(),
            state: state.to_string(),
            sha: project.repo_ref.sha.clone().unwrap_or_default(),
            branch: project.repo_ref.branch.clone().unwrap_or_default(),
            targets: target_rows,
            differences,
            aspects,
        }
    }

    pub fn is_compliant(&self) -> bool {
        self.state == STATE_COMPLIANT
    }
}

fn display_value(fp: &Fingerprint) -> String {
    match (&fp.display_value, &fp.data) {
        (Some(v), _) => v.clone(),
        (None, serde_json::Value::String(s)) => s.clone(),
        (None, other) => other.to_string(),
    }
}
