use crate::score::ScorePolicy;
use anyhow::Context;
use drift_core::catalog::names;
use drift_core::RegistryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Flat per-match penalty for one glob aspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobPenalty {
    #[serde(rename = "type")]
    pub fp_type: String,
    pub points_lost_per_match: f64,
}

impl GlobPenalty {
    pub fn new(fp_type: &str, points_lost_per_match: f64) -> Self {
        Self {
            fp_type: fp_type.to_string(),
            points_lost_per_match,
        }
    }
}

/// Thresholds for the standard scorers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub anchor: f64,
    pub floor: Option<f64>,
    pub ceiling: Option<f64>,
    pub branch_limit: u32,
    pub recent_commit_window_days: u32,
    pub violations_per_point_lost: u32,
    pub twelve_factor_violations_per_point_lost: u32,
    pub glob_penalties: Vec<GlobPenalty>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            anchor: 3.0,
            floor: Some(0.0),
            ceiling: None,
            branch_limit: 5,
            recent_commit_window_days: 10,
            violations_per_point_lost: 2,
            twelve_factor_violations_per_point_lost: 2,
            glob_penalties: vec![
                GlobPenalty::new(names::XML_BEAN_DEFINITIONS, 2.0),
                GlobPenalty::new(names::JSP_FILES, 2.0),
                GlobPenalty::new(names::DEFAULT_PACKAGE_JAVA, 3.0),
            ],
        }
    }
}

impl ScoringConfig {
    pub fn policy(&self) -> ScorePolicy {
        ScorePolicy {
            anchor: self.anchor,
            floor: self.floor,
            ceiling: self.ceiling,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.branch_limit == 0 {
            anyhow::bail!("scoring.branch_limit must be at least 1");
        }
        if self.violations_per_point_lost == 0 || self.twelve_factor_violations_per_point_lost == 0 {
            anyhow::bail!("violations per point lost must be at least 1");
        }
        if let (Some(floor), Some(ceiling)) = (self.floor, self.ceiling) {
            if floor > ceiling {
                anyhow::bail!("scoring.floor ({floor}) is above scoring.ceiling ({ceiling})");
            }
        }
        for penalty in &self.glob_penalties {
            if penalty.points_lost_per_match < 0.0 {
                anyhow::bail!(
                    "glob penalty for '{}' must not be negative",
                    penalty.fp_type
                );
            }
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    pub scoring: ScoringConfig,
    pub registry: RegistryConfig,
}

impl DriftConfig {
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        // An empty file deserializes as null
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content).context("failed to parse drift config")?
        };
        config.scoring.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Config file if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::{AspectGroup, Environment};

    #[test]
    fn empty_file_is_defaults() {
        let config = DriftConfig::from_yaml_str("").unwrap();
        assert_eq!(config, DriftConfig::default());
        assert_eq!(config.scoring.branch_limit, 5);
        assert_eq!(config.scoring.glob_penalties.len(), 3);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = DriftConfig::from_yaml_str(
            "scoring:\n  branch_limit: 8\n  floor: null\nregistry:\n  environment: staging\n",
        )
        .unwrap();
        assert_eq!(config.scoring.branch_limit, 8);
        assert_eq!(config.scoring.floor, None);
        assert_eq!(config.scoring.recent_commit_window_days, 10);
        assert_eq!(config.registry.environment, Environment::Staging);
        assert!(config.registry.groups.contains(&AspectGroup::Core));
    }

    #[test]
    fn zero_divisor_rejected() {
        let err = DriftConfig::from_yaml_str("scoring:\n  violations_per_point_lost: 0\n").unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn floor_above_ceiling_rejected() {
        assert!(DriftConfig::from_yaml_str("scoring:\n  floor: 3\n  ceiling: 1\n").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift.yaml");
        std::fs::write(
            &path,
            "scoring:\n  glob_penalties:\n    - type: jsp-files\n      points_lost_per_match: 1.5\n",
        )
        .unwrap();
        let config = DriftConfig::load(&path).unwrap();
        assert_eq!(config.scoring.glob_penalties, vec![GlobPenalty::new("jsp-files", 1.5)]);

        let missing = DriftConfig::load(&dir.path().join("nope.yaml"));
        assert!(missing.is_err());
    }
}
