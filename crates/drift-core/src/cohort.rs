use crate::types::Fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Distribution of one fingerprint kind's values across a cohort of repositories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortAnalysis {
    /// Number of fingerprints in the cohort.
    pub count: u64,
    /// Number of distinct values (by sha).
    pub variants: u64,
    /// Shannon entropy of the value distribution, in bits.
    pub entropy: f64,
}

impl CohortAnalysis {
    pub fn compute<'a>(fingerprints: impl IntoIterator<Item = &'a Fingerprint>) -> Self {
        let mut by_sha: BTreeMap<&str, u64> = BTreeMap::new();
        for fp in fingerprints {
            *by_sha.entry(fp.sha.as_str()).or_default() += 1;
        }
        let count: u64 = by_sha.values().sum();
        if count == 0 {
            return Self::default();
        }
        let total = count as f64;
        let entropy = by_sha
            .values()
            .map(|&n| {
                let p = n as f64 / total;
                -p * p.log2()
            })
            .sum::<f64>();
        Self {
            count,
            variants: by_sha.len() as u64,
            // -0.0 for a single variant reads badly in reports
            entropy: entropy.max(0.0),
        }
    }
}
