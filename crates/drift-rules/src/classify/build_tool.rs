use super::{ClassificationAspect, ClassificationRule};
use crate::error::RuleResult;
use crate::payload::file_marker_fingerprint;
use drift_core::catalog::names;
use drift_core::Fingerprint;

/// Build tools recognised by the presence of a marker file: `(tag, file)`.
///
/// Marker fingerprints carry the tag as their type.
pub const BUILD_TOOL_MARKERS: &[(&str, &str)] = &[
    ("maven", "pom.xml"),
    ("gradle", "build.gradle"),
    ("ivy", "ivy.xml"),
    ("npm", "package.json"),
    ("lein", "project.clj"),
    ("sbt", "build.sbt"),
];

/// Marker fingerprint for a build file found at `path`.
///
/// Returns `None` when the file name is not a known marker.
pub fn build_tool_marker(path: &str, content: &str) -> Option<Fingerprint> {
    let file = path.rsplit('/').next().unwrap_or(path);
    BUILD_TOOL_MARKERS
        .iter()
        .find(|(_, marker)| *marker == file)
        .map(|(tool, _)| file_marker_fingerprint(tool, path, content))
}

/// One tag per build tool whose marker is present.
pub fn build_tool_classification() -> RuleResult<ClassificationAspect> {
    let rules = BUILD_TOOL_MARKERS
        .iter()
        .map(|&(tool, file)| {
            ClassificationRule::with_predicate(
                tool,
                [tool],
                &format!("has {file}"),
                move |fps: &[Fingerprint]| Ok(fps.iter().any(|fp| fp.fp_type == tool)),
            )
        })
        .collect();
    ClassificationAspect::new(names::BUILD_TOOL, Some("Build tool"), rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tags_ivy() {
        let aspect = build_tool_classification().unwrap();
        let marker = build_tool_marker("ivy.xml", "").unwrap();
        assert_eq!(marker.fp_type, "ivy");

        let outcome = aspect.classify(&[marker]).await;
        let tags: Vec<&str> = outcome.result.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["ivy"]);
        assert_eq!(outcome.result.reason(), "has ivy.xml");

        let fp = outcome.to_fingerprint();
        assert_eq!(fp.fp_type, names::BUILD_TOOL);
        assert_eq!(fp.data["tags"], serde_json::json!(["ivy"]));
    }

    #[tokio::test]
    async fn several_tools() {
        let aspect = build_tool_classification().unwrap();
        let fps: Vec<Fingerprint> = [("pom.xml", "<project/>"), ("web/package.json", "{}")]
            .iter()
            .filter_map(|(path, content)| build_tool_marker(path, content))
            .collect();
        let outcome = aspect.classify(&fps).await;
        let tags: Vec<&str> = outcome.result.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["maven", "npm"]);
    }

    #[tokio::test]
    async fn no_markers_no_tags() {
        let aspect = build_tool_classification().unwrap();
        assert!(build_tool_marker("README.md", "# hi").is_none());
        let outcome = aspect.classify(&[]).await;
        assert!(outcome.result.tags.is_empty());
        assert!(outcome.errors.is_empty());
    }
}
