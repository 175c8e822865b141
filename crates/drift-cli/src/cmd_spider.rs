use crate::context::{block_on, report_persist, Context};
use drift_core::catalog::names;
use drift_rules::{build_tool_classification, spring_classification, ScoreComposer};
use drift_spider::{CloneConfig, FileScanAnalyzer, GitCommandCloner, SourceSpec, Spider};
use std::path::PathBuf;
use std::sync::Arc;

pub struct SpiderParams<'a> {
    pub ctx: &'a Context,
    pub workspace: &'a str,
    pub sources: &'a [String],
    pub token: Option<String>,
    pub api_base: String,
    pub checkout_dir: Option<PathBuf>,
    pub workers: usize,
    pub json: bool,
}

/// Execute `drift spider`
pub fn execute(params: SpiderParams<'_>) -> anyhow::Result<()> {
    let sources = parse_sources(params.sources)?;
    let ctx = params.ctx;

    let catalog = Arc::new(ctx.catalog()?);
    let mut classifiers = vec![build_tool_classification()?];
    if catalog.contains(names::SPRING_CLASSIFICATION) {
        classifiers.push(spring_classification()?);
    }
    let composer = ScoreComposer::standard(&ctx.config.scoring, &ctx.config.registry);

    let clone_config = CloneConfig {
        token: params.token,
        api_base: params.api_base,
    };
    let checkout_dir = params
        .checkout_dir
        .unwrap_or_else(|| std::env::temp_dir().join("drift-checkouts"));
    let cloner = GitCommandCloner::new(clone_config, checkout_dir);

    let spider = Spider::new(
        params.workspace,
        Arc::new(cloner),
        Arc::new(FileScanAnalyzer::new(Arc::clone(&catalog))),
        catalog,
        Arc::new(ctx.open_store()?),
    )
    .with_classifiers(classifiers)
    .with_composer(composer)
    .with_workers(params.workers);

    let result = block_on(spider.run(sources))?;
    report_persist(&result, params.json)
}

fn parse_sources(raw: &[String]) -> anyhow::Result<Vec<SourceSpec>> {
    raw.iter()
        .map(|s| {
            SourceSpec::parse(s)
                .ok_or_else(|| anyhow::anyhow!("invalid source '{s}', expected owner/repo[#branch]"))
        })
        .collect()
}
