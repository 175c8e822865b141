//! Registry of fingerprint-producing aspects and their display metadata.
//!
//! The registry is an immutable table built once from a [`RegistryConfig`].
//! Which optional groups are active is decided by the config (and its
//! [`Environment`]), never by ambient process state.

use crate::error::{CoreError, CoreResult};
use crate::types::FingerprintUsage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ── Aspect names ──

pub mod names {
    pub const SPRING_BOOT_STARTER: &str = "spring-boot-starter";
    pub const TYPESCRIPT_VERSION: &str = "typescript-version";
    pub const NPM_DEPS: &str = "npm-project-deps";
    pub const TRAVIS_SCRIPTS: &str = "travis-scripts";
    pub const SPRING_BOOT_VERSION: &str = "spring-boot-version";
    pub const MAVEN_DIRECT_DEP: &str = "maven-direct-dep";
    pub const MAVEN_PARENT: &str = "maven-parent";
    pub const LEIN_DEPS: &str = "clojure-project-deps";
    pub const DOCKER_BASE_IMAGE: &str = "docker-base-image";
    pub const DOCKER_PATH: &str = "docker-path";
    pub const DOCKER_PORTS: &str = "docker-ports";
    pub const K8S_SPECS: &str = "k8s-specs";
    pub const BRANCH_COUNT: &str = "branch-count";
    pub const GIT_RECENCY: &str = "git-recency";
    pub const FRAMEWORK: &str = "framework";
    pub const CI: &str = "ci";
    pub const BUILD_TOOL: &str = "build-tool";
    pub const LANGUAGE: &str = "language";
    pub const INFRASTRUCTURE: &str = "infrastructure";
    pub const XML_BEAN_DEFINITIONS: &str = "xml-bean-definitions";
    pub const SPRING_BOOT_APP_CLASS: &str = "spring-boot-app-class";
    pub const LOGBACK: &str = "logback";
    pub const CONSOLE_LOGGING: &str = "console-logging";
    pub const JSP_FILES: &str = "jsp-files";
    pub const DEFAULT_PACKAGE_JAVA: &str = "default-package-java";
    pub const SPRING_CLASSIFICATION: &str = "spring-boot-classification";

    // Review aspects: each emits the violations found by one reviewer.
    pub const HARD_CODED_PROPERTY: &str = "hard-coded-property";
    pub const NON_SPECIFIC_MVC_ANNOTATION: &str = "non-specific-mvc-annotation";
    pub const DOT_STAR_USAGE: &str = "dot-star-usage";
    pub const FILE_IO_USAGE: &str = "file-io-usage";
    pub const MUTABLE_INJECTION_USAGE: &str = "mutable-injection-usage";
    pub const TWELVE_FACTOR_SINGLE_APP: &str = "twelve-factor-single-app";
    pub const TWELVE_FACTOR_CONFIG: &str = "twelve-factor-config-externalized";
}

/// Deployment environment the registry is built for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Production,
    Staging,
}

/// A group of aspects that is switched on or off as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectGroup {
    Core,
    SpringIdioms,
    TwelveFactors,
    /// Aspects still under evaluation; registered in staging only.
    Preview,
}

/// Which aspect groups the registry should contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub environment: Environment,
    pub groups: BTreeSet<AspectGroup>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            groups: [
                AspectGroup::Core,
                AspectGroup::SpringIdioms,
                AspectGroup::TwelveFactors,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl RegistryConfig {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            ..Default::default()
        }
    }

    /// Configured groups plus those implied by the environment.
    pub fn effective_groups(&self) -> BTreeSet<AspectGroup> {
        let mut groups = self.groups.clone();
        if self.environment == Environment::Staging {
            groups.insert(AspectGroup::Preview);
        }
        groups
    }
}

/// Presentation metadata attached to an aspect at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetadata {
    pub short_name: String,
    pub category: String,
    pub unit: String,
    /// Report URL template, relative to the reporting UI.
    pub url: String,
    pub description: String,
    /// Whether drift in this aspect can be managed with targets.
    #[serde(default = "default_manage")]
    pub manage: bool,
}

fn default_manage() -> bool {
    true
}

impl DisplayMetadata {
    pub fn new(short_name: &str, category: &str, unit: &str, url: &str, description: &str) -> Self {
        Self {
            short_name: short_name.to_string(),
            category: category.to_string(),
            unit: unit.to_string(),
            url: url.to_string(),
            description: description.to_string(),
            manage: true,
        }
    }

    pub fn unmanaged(mut self) -> Self {
        self.manage = false;
        self
    }
}

/// How an aspect produces its fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AspectKind {
    /// Structured facts from manifests or history.
    Fingerprint,
    /// File paths matching a glob.
    Glob { glob: String },
    /// Tags derived from other fingerprints.
    Classification,
    /// Violations reported by a code reviewer.
    Review,
}

/// A registered aspect. `name` doubles as the type of the fingerprints it emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub group: AspectGroup,
    #[serde(flatten)]
    pub kind: AspectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DisplayMetadata>,
}

impl AspectDescriptor {
    pub fn new(name: &str, display_name: Option<&str>, kind: AspectKind) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.map(str::to_string),
            group: AspectGroup::Core,
            kind,
            metadata: None,
        }
    }

    pub fn fingerprint(name: &str, display_name: &str) -> Self {
        Self::new(name, Some(display_name), AspectKind::Fingerprint)
    }

    pub fn classification(name: &str, display_name: Option<&str>) -> Self {
        Self::new(name, display_name, AspectKind::Classification)
    }

    pub fn review(name: &str, display_name: &str) -> Self {
        Self::new(name, Some(display_name), AspectKind::Review)
    }

    pub fn in_group(mut self, group: AspectGroup) -> Self {
        self.group = group;
        self
    }

    /// Label for reports: display name, falling back to the aspect name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Attach display metadata to an aspect.
pub fn enrich(mut aspect: AspectDescriptor, metadata: DisplayMetadata) -> AspectDescriptor {
    aspect.metadata = Some(metadata);
    aspect
}

/// An aspect that fingerprints the files matching `glob`.
pub fn glob_aspect(name: &str, display_name: &str, glob: &str) -> AspectDescriptor {
    AspectDescriptor::new(
        name,
        Some(display_name),
        AspectKind::Glob {
            glob: glob.to_string(),
        },
    )
}

/// Immutable registration table of aspects, in registration order.
#[derive(Debug, Clone, Default)]
pub struct FingerprintCatalog {
    aspects: Vec<AspectDescriptor>,
    index: HashMap<String, usize>,
}

impl FingerprintCatalog {
    /// Build a catalog, rejecting duplicate names and malformed globs.
    pub fn from_descriptors(aspects: Vec<AspectDescriptor>) -> CoreResult<Self> {
        let mut index = HashMap::with_capacity(aspects.len());
        for (i, aspect) in aspects.iter().enumerate() {
            if let AspectKind::Glob { glob } = &aspect.kind {
                globset::Glob::new(glob).map_err(|source| CoreError::InvalidGlob {
                    name: aspect.name.clone(),
                    glob: glob.clone(),
                    source,
                })?;
            }
            if index.insert(aspect.name.clone(), i).is_some() {
                return Err(CoreError::DuplicateAspect(aspect.name.clone()));
            }
        }
        Ok(Self { aspects, index })
    }

    /// The standard registration table, filtered to the config's active groups.
    pub fn standard(config: &RegistryConfig) -> CoreResult<Self> {
        let groups = config.effective_groups();
        let aspects = standard_aspects()
            .into_iter()
            .filter(|a| groups.contains(&a.group))
            .collect();
        Self::from_descriptors(aspects)
    }

    pub fn get(&self, fp_type: &str) -> Option<&AspectDescriptor> {
        self.index.get(fp_type).map(|&i| &self.aspects[i])
    }

    pub fn contains(&self, fp_type: &str) -> bool {
        self.index.contains_key(fp_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AspectDescriptor> {
        self.aspects.iter()
    }

    pub fn len(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }

    /// Display label for a fingerprint type; unknown types label themselves.
    pub fn display_name<'a>(&'a self, fp_type: &'a str) -> &'a str {
        self.get(fp_type).map(|a| a.label()).unwrap_or(fp_type)
    }

    /// Categories recorded for a fingerprint type.
    pub fn categories_for(&self, fp_type: &str) -> BTreeSet<String> {
        self.get(fp_type)
            .and_then(|a| a.metadata.as_ref())
            .map(|m| BTreeSet::from([m.category.clone()]))
            .unwrap_or_default()
    }

    /// Fill in `usage.categories` from registered metadata.
    pub fn annotate_usage(&self, usage: &mut FingerprintUsage) {
        usage.categories.extend(self.categories_for(&usage.fp_type));
    }

    /// Enriched aspects grouped by category, for report navigation.
    pub fn by_category(&self) -> BTreeMap<&str, Vec<&AspectDescriptor>> {
        let mut out: BTreeMap<&str, Vec<&AspectDescriptor>> = BTreeMap::new();
        for aspect in &self.aspects {
            if let Some(meta) = &aspect.metadata {
                out.entry(meta.category.as_str()).or_default().push(aspect);
            }
        }
        out
    }
}

// ── Standard registrations ──

fn standard_aspects() -> Vec<AspectDescriptor> {
    use names::*;

    let mut aspects = vec![
        AspectDescriptor::fingerprint(SPRING_BOOT_STARTER, "Spring Boot starter"),
        enrich(
            AspectDescriptor::fingerprint(TYPESCRIPT_VERSION, "TypeScript version"),
            DisplayMetadata::new(
                "version",
                "Node.js",
                "version",
                "fingerprint/typescript-version/typescript-version?byOrg=true&trim=false",
                "TypeScript versions in use across all repositories in your workspace, \
                 broken out by version and repositories that use each version.",
            ),
        ),
        enrich(
            AspectDescriptor::fingerprint(NPM_DEPS, "NPM dependencies"),
            DisplayMetadata::new(
                "dependency",
                "Node.js",
                "version",
                "drift?type=npm-project-deps&band=true&repos=false",
                "Node direct dependencies in use across all repositories in your workspace, \
                 grouped by Drift Level.",
            ),
        ),
        AspectDescriptor::fingerprint(TRAVIS_SCRIPTS, "Travis scripts"),
        AspectDescriptor::fingerprint(SPRING_BOOT_VERSION, "Spring Boot version"),
        enrich(
            AspectDescriptor::fingerprint(MAVEN_DIRECT_DEP, "Maven dependencies"),
            DisplayMetadata::new(
                "dependency",
                "Java",
                "version",
                "drift?type=maven-direct-dep&band=true&repos=false",
                "Maven declared dependencies in use across all repositories in your workspace, \
                 grouped by Drift Level.",
            ),
        ),
        enrich(
            AspectDescriptor::fingerprint(MAVEN_PARENT, "Maven parent POM"),
            DisplayMetadata::new(
                "parent",
                "Java",
                "version",
                &format!("drift?type={MAVEN_PARENT}&band=true&repos=false"),
                "Maven parent POM in use across all repositories in your workspace, \
                 grouped by Drift Level.",
            ),
        ),
        enrich(
            AspectDescriptor::fingerprint(LEIN_DEPS, "Leiningen dependencies"),
            DisplayMetadata::new(
                "dependency",
                "Java",
                "version",
                "drift?type=clojure-project-deps&band=true&repos=false",
                "Leiningen direct dependencies in use across all repositories in your workspace, \
                 grouped by Drift Level.",
            ),
        ),
        enrich(
            AspectDescriptor::fingerprint(DOCKER_BASE_IMAGE, "Docker base image"),
            DisplayMetadata::new(
                "images",
                "Docker",
                "tag",
                "fingerprint/docker-base-image/*?byOrg=true&trim=false",
                "Docker base images in use across all repositories in your workspace, \
                 broken out by image label and repositories where used.",
            ),
        ),
        AspectDescriptor::fingerprint(DOCKER_PATH, "Dockerfile path"),
        enrich(
            AspectDescriptor::fingerprint(DOCKER_PORTS, "Docker ports"),
            DisplayMetadata::new(
                "ports",
                "Docker",
                "port",
                "fingerprint/docker-ports/docker-ports?byOrg=true&trim=false",
                "Ports exposed in Docker configuration in use across all repositories in your workspace, \
                 broken out by port number and repositories where used.",
            )
            .unmanaged(),
        ),
        AspectDescriptor::fingerprint(K8S_SPECS, "Kubernetes specs"),
        enrich(
            AspectDescriptor::fingerprint(BRANCH_COUNT, "Branch count"),
            DisplayMetadata::new(
                "branches",
                "Git",
                "branch",
                &format!("fingerprint/{BRANCH_COUNT}/{BRANCH_COUNT}?byOrg=true&trim=false"),
                "Number of Git branches across repositories in your workspace, \
                 grouped by Drift Level.",
            )
            .unmanaged(),
        ),
        enrich(
            AspectDescriptor::fingerprint(GIT_RECENCY, "Last commit"),
            DisplayMetadata::new(
                "recency",
                "Git",
                "commit",
                &format!("fingerprint/{GIT_RECENCY}/{GIT_RECENCY}?byOrg=true&trim=false"),
                "Time of the most recent commit to the default branch of each repository.",
            )
            .unmanaged(),
        ),
        AspectDescriptor::classification(FRAMEWORK, Some("Framework")),
        AspectDescriptor::classification(CI, Some("CI")),
        AspectDescriptor::classification(BUILD_TOOL, Some("Build tool")),
        AspectDescriptor::classification(LANGUAGE, Some("Language")),
        AspectDescriptor::classification(INFRASTRUCTURE, Some("Infrastructure")),
        glob_aspect(XML_BEAN_DEFINITIONS, "Spring XML bean definitions", "src/main/resources/**/*.xml"),
        AspectDescriptor::fingerprint(SPRING_BOOT_APP_CLASS, "Spring Boot application class"),
        AspectDescriptor::fingerprint(LOGBACK, "Logback configuration"),
        AspectDescriptor::fingerprint(CONSOLE_LOGGING, "Console logging"),
        glob_aspect(JSP_FILES, "JSP files", "**/*.jsp"),
        glob_aspect(DEFAULT_PACKAGE_JAVA, "Java files in default package", "src/main/java/*.java"),
    ];

    aspects.extend(
        [
            (HARD_CODED_PROPERTY, "Hard-coded property"),
            (NON_SPECIFIC_MVC_ANNOTATION, "Non-specific MVC annotation"),
            (DOT_STAR_USAGE, "Dot-star usage"),
            (FILE_IO_USAGE, "File I/O usage"),
            (MUTABLE_INJECTION_USAGE, "Mutable injection"),
        ]
        .into_iter()
        .map(|(name, display)| AspectDescriptor::review(name, display).in_group(AspectGroup::SpringIdioms)),
    );

    aspects.extend(
        [
            (TWELVE_FACTOR_SINGLE_APP, "Twelve factors: one codebase, one app"),
            (TWELVE_FACTOR_CONFIG, "Twelve factors: config in the environment"),
        ]
        .into_iter()
        .map(|(name, display)| AspectDescriptor::review(name, display).in_group(AspectGroup::TwelveFactors)),
    );

    // No display name: not shown in reports.
    aspects.push(
        AspectDescriptor::classification(SPRING_CLASSIFICATION, None).in_group(AspectGroup::Preview),
    );

    aspects
}
