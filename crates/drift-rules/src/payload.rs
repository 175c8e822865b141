//! Typed access to fingerprint payloads.
//!
//! A fingerprint's `data` is opaque JSON. Rules never poke at it directly:
//! each rule declares the [`TypedKind`]s it reads, and a `TypedKind<T>`
//! decodes the payload of its fingerprint type into `T`.

use crate::error::{RuleError, RuleResult};
use drift_core::catalog::names;
use drift_core::Fingerprint;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::marker::PhantomData;
use time::OffsetDateTime;

/// A fingerprint type paired with the shape of its payload.
pub struct TypedKind<T> {
    fp_type: Cow<'static, str>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedKind<T> {
    fn clone(&self) -> Self {
        Self {
            fp_type: self.fp_type.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for TypedKind<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TypedKind").field(&self.fp_type).finish()
    }
}

impl<T: DeserializeOwned> TypedKind<T> {
    pub const fn new(fp_type: &'static str) -> Self {
        Self {
            fp_type: Cow::Borrowed(fp_type),
            _payload: PhantomData,
        }
    }

    pub fn owned(fp_type: impl Into<String>) -> Self {
        Self {
            fp_type: Cow::Owned(fp_type.into()),
            _payload: PhantomData,
        }
    }

    pub fn fp_type(&self) -> &str {
        &self.fp_type
    }

    /// `Ok(None)` for fingerprints of another type; `Err` for malformed payloads.
    pub fn decode(&self, fp: &Fingerprint) -> RuleResult<Option<T>> {
        if fp.fp_type != self.fp_type {
            return Ok(None);
        }
        T::deserialize(&fp.data)
            .map(Some)
            .map_err(|source| RuleError::Decode {
                fp_type: fp.fp_type.clone(),
                name: fp.name.clone(),
                source,
            })
    }

    /// Decode every fingerprint of this type.
    pub fn decode_all(&self, fps: &[Fingerprint]) -> RuleResult<Vec<T>> {
        let mut out = Vec::new();
        for fp in fps {
            if let Some(payload) = self.decode(fp)? {
                out.push(payload);
            }
        }
        Ok(out)
    }

    /// Does any fingerprint of this type satisfy `pred`?
    pub fn any(&self, fps: &[Fingerprint], pred: impl Fn(&T) -> bool) -> RuleResult<bool> {
        for fp in fps {
            if let Some(payload) = self.decode(fp)? {
                if pred(&payload) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// First fingerprint of this type, decoded.
    pub fn first(&self, fps: &[Fingerprint]) -> RuleResult<Option<T>> {
        for fp in fps {
            if let Some(payload) = self.decode(fp)? {
                return Ok(Some(payload));
            }
        }
        Ok(None)
    }
}

// ── Payload shapes ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpringBootStarterData {
    pub group: String,
    pub artifact: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobMatch {
    pub path: String,
    #[serde(default)]
    pub size: u64,
}

/// Files matched by a glob aspect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobAspectData {
    #[serde(default)]
    pub glob: String,
    #[serde(default)]
    pub matches: Vec<GlobMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCountData {
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRecencyData {
    #[serde(with = "time::serde::rfc3339")]
    pub last_commit: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub detail: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Violations emitted by one reviewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewData {
    #[serde(default)]
    pub violations: Vec<ReviewComment>,
}

/// Presence of a build-tool marker file (e.g. `ivy.xml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMarkerData {
    pub path: String,
    #[serde(default)]
    pub size: u64,
}

pub const SPRING_BOOT_STARTER: TypedKind<SpringBootStarterData> =
    TypedKind::new(names::SPRING_BOOT_STARTER);
pub const XML_BEAN_DEFINITIONS: TypedKind<GlobAspectData> =
    TypedKind::new(names::XML_BEAN_DEFINITIONS);
pub const BRANCH_COUNT: TypedKind<BranchCountData> = TypedKind::new(names::BRANCH_COUNT);
pub const GIT_RECENCY: TypedKind<GitRecencyData> = TypedKind::new(names::GIT_RECENCY);

/// A glob-aspect fingerprint over `paths`.
pub fn glob_fingerprint(fp_type: &str, glob: &str, paths: &[&str]) -> Fingerprint {
    let data = GlobAspectData {
        glob: glob.to_string(),
        matches: paths
            .iter()
            .map(|p| GlobMatch {
                path: p.to_string(),
                size: 0,
            })
            .collect(),
    };
    Fingerprint::new(fp_type, fp_type, serde_json::to_value(data).unwrap_or_default())
}

/// A marker fingerprint recording that `path` exists.
pub fn file_marker_fingerprint(fp_type: &str, path: &str, content: &str) -> Fingerprint {
    let data = FileMarkerData {
        path: path.to_string(),
        size: content.len() as u64,
    };
    Fingerprint::new(fp_type, path, serde_json::to_value(data).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn starter(artifact: &str) -> Fingerprint {
        Fingerprint::new(
            names::SPRING_BOOT_STARTER,
            artifact,
            serde_json::json!({"group": "org.springframework.boot", "artifact": artifact}),
        )
    }

    #[test]
    fn decode_skips_other_types() {
        let fp = Fingerprint::new("npm-project-deps", "lodash", serde_json::json!("4.17.21"));
        assert!(SPRING_BOOT_STARTER.decode(&fp).unwrap().is_none());
    }

    #[test]
    fn decode_reads_payload() {
        let data = SPRING_BOOT_STARTER
            .decode(&starter("spring-boot-starter-web"))
            .unwrap()
            .unwrap();
        assert_eq!(data.artifact, "spring-boot-starter-web");
        assert!(data.version.is_none());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let fp = Fingerprint::new(names::SPRING_BOOT_STARTER, "x", serde_json::json!({"group": 3}));
        let err = SPRING_BOOT_STARTER.decode(&fp).unwrap_err();
        assert!(matches!(err, RuleError::Decode { .. }));
    }

    #[test]
    fn any_and_first() {
        let fps = vec![starter("spring-boot-starter-web"), starter("spring-boot-starter-actuator")];
        assert!(SPRING_BOOT_STARTER
            .any(&fps, |d| d.artifact.ends_with("actuator"))
            .unwrap());
        assert!(!SPRING_BOOT_STARTER.any(&fps, |d| d.artifact == "nope").unwrap());
        assert_eq!(
            SPRING_BOOT_STARTER.first(&fps).unwrap().unwrap().artifact,
            "spring-boot-starter-web"
        );
        assert_eq!(SPRING_BOOT_STARTER.decode_all(&fps).unwrap().len(), 2);
    }

    #[test]
    fn glob_fingerprint_round_trips() {
        let fp = glob_fingerprint("jsp-files", "**/*.jsp", &["web/index.jsp", "web/login.jsp"]);
        let data = TypedKind::<GlobAspectData>::owned("jsp-files")
            .decode(&fp)
            .unwrap()
            .unwrap();
        assert_eq!(data.matches.len(), 2);
        assert_eq!(data.glob, "**/*.jsp");
    }

    #[test]
    fn git_recency_parses_rfc3339() {
        let fp = Fingerprint::new(
            names::GIT_RECENCY,
            names::GIT_RECENCY,
            serde_json::json!({"last_commit": "2019-10-01T09:30:00Z"}),
        );
        let data = GIT_RECENCY.decode(&fp).unwrap().unwrap();
        assert_eq!(data.last_commit.year(), 2019);
    }
}
