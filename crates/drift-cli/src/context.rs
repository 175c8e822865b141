use anyhow::Context as _;
use drift_core::{FingerprintCatalog, PersistResult};
use drift_rules::DriftConfig;
use drift_store::SqliteStore;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Resolved global options shared by every subcommand.
pub struct Context {
    pub db_path: PathBuf,
    pub config: DriftConfig,
}

impl Context {
    pub fn new(db: Option<PathBuf>, config: Option<&Path>) -> anyhow::Result<Self> {
        let db_path = match db {
            Some(path) => path,
            None => default_db_path()?,
        };
        Ok(Self {
            db_path,
            config: DriftConfig::load_or_default(config)?,
        })
    }

    pub fn open_store(&self) -> anyhow::Result<SqliteStore> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        SqliteStore::open_or_create(&self.db_path)
            .with_context(|| format!("failed to open {}", self.db_path.display()))
    }

    pub fn catalog(&self) -> anyhow::Result<FingerprintCatalog> {
        Ok(FingerprintCatalog::standard(&self.config.registry)?)
    }
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    let data_dir = dirs::data_dir().context("no data directory on this platform; pass --db")?;
    Ok(data_dir.join("drift").join("drift.db"))
}

/// Run an async command body to completion.
pub fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    Ok(tokio::runtime::Runtime::new()?.block_on(future))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a persist summary and fail the command if any item failed.
pub fn report_persist(result: &PersistResult, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(result)?;
    } else {
        println!(
            "Attempted {}, persisted {}, failed {}",
            result.attempted_count(),
            result.successes().len(),
            result.failures().len()
        );
        for ok in result.successes() {
            println!("  + {} {}", ok.id, ok.repo_ref);
        }
        for failure in result.failures() {
            println!(
                "  ! {} ({}): {}",
                failure.repo_url, failure.while_trying_to, failure.message
            );
        }
    }
    if result.has_failures() {
        anyhow::bail!(
            "{} of {} items failed",
            result.failures().len(),
            result.attempted_count()
        );
    }
    Ok(())
}
