use super::{ClassificationAspect, ClassificationRule};
use crate::error::RuleResult;
use crate::payload::{SPRING_BOOT_STARTER, XML_BEAN_DEFINITIONS};
use drift_core::catalog::names;
use drift_core::Fingerprint;

fn has_starter(artifact: &'static str) -> impl Fn(&[Fingerprint]) -> RuleResult<bool> + Send + Sync {
    move |fps: &[Fingerprint]| SPRING_BOOT_STARTER.any(fps, |d| d.artifact == artifact)
}

/// Tags Spring Boot projects by the starters and XML configuration they use.
pub fn spring_classification() -> RuleResult<ClassificationAspect> {
    ClassificationAspect::new(
        names::SPRING_CLASSIFICATION,
        None,
        vec![
            ClassificationRule::with_predicate(
                "spring-security",
                ["spring-security"],
                "has spring security",
                has_starter("spring-boot-starter-security"),
            )
            .reads(names::SPRING_BOOT_STARTER),
            ClassificationRule::with_predicate(
                "actuator",
                ["actuator"],
                "has spring boot actuator",
                has_starter("spring-boot-starter-actuator"),
            )
            .reads(names::SPRING_BOOT_STARTER),
            ClassificationRule::with_predicate(
                "spring-xml",
                ["spring-xml"],
                "uses spring XML",
                |fps: &[Fingerprint]| XML_BEAN_DEFINITIONS.any(fps, |d| !d.matches.is_empty()),
            )
            .reads(names::XML_BEAN_DEFINITIONS),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::glob_fingerprint;
    use drift_core::{FingerprintCatalog, RegistryConfig};

    fn starter(artifact: &str) -> Fingerprint {
        Fingerprint::new(
            names::SPRING_BOOT_STARTER,
            artifact,
            serde_json::json!({"group": "org.springframework.boot", "artifact": artifact}),
        )
    }

    #[tokio::test]
    async fn security_and_actuator() {
        let aspect = spring_classification().unwrap();
        let fps = vec![
            starter("spring-boot-starter-web"),
            starter("spring-boot-starter-security"),
            starter("spring-boot-starter-actuator"),
        ];
        let outcome = aspect.classify(&fps).await;
        let tags: Vec<&str> = outcome.result.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["actuator", "spring-security"]);
        assert_eq!(outcome.result.reasons[0].reason, "has spring security");
    }

    #[tokio::test]
    async fn xml_needs_at_least_one_match() {
        let aspect = spring_classification().unwrap();
        let none = glob_fingerprint(names::XML_BEAN_DEFINITIONS, "**/*.xml", &[]);
        assert!(aspect.classify(&[none]).await.result.tags.is_empty());

        let some = glob_fingerprint(names::XML_BEAN_DEFINITIONS, "**/*.xml", &["src/main/resources/beans.xml"]);
        let outcome = aspect.classify(&[some]).await;
        assert!(outcome.result.tags.contains("spring-xml"));
    }

    #[tokio::test]
    async fn malformed_starter_is_an_error_not_a_miss() {
        let aspect = spring_classification().unwrap();
        let bad = Fingerprint::new(names::SPRING_BOOT_STARTER, "x", serde_json::json!("1.0"));
        let outcome = aspect.classify(&[bad]).await;
        assert!(outcome.result.tags.is_empty());
        let failed: Vec<&str> = outcome.errors.iter().map(|e| e.rule.as_str()).collect();
        assert_eq!(failed, vec!["spring-security", "actuator"]);
    }

    #[test]
    fn reads_only_known_kinds() {
        let catalog = FingerprintCatalog::standard(&RegistryConfig::default()).unwrap();
        assert!(spring_classification().unwrap().unknown_kinds(&catalog).is_empty());
    }
}
