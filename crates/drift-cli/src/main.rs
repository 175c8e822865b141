mod cmd_analytics;
mod cmd_catalog;
mod cmd_ingest;
mod cmd_query;
mod cmd_spider;
mod context;

use clap::{Parser, Subcommand};
use context::Context;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "drift", version, about = "Fingerprint drift across repositories")]
struct Cli {
    /// SQLite database (default: <data dir>/drift/drift.db)
    #[arg(long, global = true, env = "DRIFT_DB")]
    db: Option<PathBuf>,
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at info level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Persist analysis results from a JSON Lines file ("-" for stdin)
    Ingest {
        path: PathBuf,
        /// Results persisted concurrently
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Repository count, latest analysis and mean fingerprint count
    Stats {
        /// Workspace id, or "*" for all workspaces
        #[arg(long, short, default_value = "*")]
        workspace: String,
        #[arg(long)]
        json: bool,
    },
    /// Distinct fingerprint kinds
    Kinds {
        #[arg(long, short, default_value = "*")]
        workspace: String,
        #[arg(long)]
        json: bool,
    },
    /// Fingerprints across a workspace
    Fingerprints {
        #[arg(long, short, default_value = "*")]
        workspace: String,
        /// Filter by fingerprint type
        #[arg(long = "type")]
        fp_type: Option<String>,
        /// Filter by fingerprint name
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Persisted cohort statistics per fingerprint kind
    Usage {
        #[arg(long, short, default_value = "*")]
        workspace: String,
        #[arg(long = "type")]
        fp_type: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Recompute and persist cohort statistics
    Analytics {
        #[arg(long, short, default_value = "*")]
        workspace: String,
        #[arg(long)]
        json: bool,
    },
    /// Show one persisted analysis
    Show {
        /// Analysis id (par_...)
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Compare an analysis with target fingerprints
    Compliance {
        id: String,
        /// JSON file holding an array of target fingerprints
        #[arg(long)]
        targets: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List registered aspects
    Catalog {
        #[arg(long)]
        json: bool,
    },
    /// Clone, analyze, classify, score and persist repositories
    Spider {
        /// Workspace the results belong to
        #[arg(long, short)]
        workspace: String,
        /// Sources as owner/repo or owner/repo#branch
        #[arg(required = true)]
        sources: Vec<String>,
        /// Access token for private repositories
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
        /// API root; GitHub Enterprise uses https://<host>/api/v3
        #[arg(long, default_value = drift_spider::GITHUB_API_BASE)]
        api_base: String,
        /// Directory for temporary checkouts
        #[arg(long)]
        checkout_dir: Option<PathBuf>,
        #[arg(long, default_value_t = 4)]
        workers: usize,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let ctx = Context::new(cli.db, cli.config.as_deref())?;

    match cli.cmd {
        Command::Ingest {
            path,
            workers,
            json,
        } => cmd_ingest::execute(&ctx, &path, workers, json),
        Command::Stats { workspace, json } => cmd_query::stats(&ctx, &workspace, json),
        Command::Kinds { workspace, json } => cmd_query::kinds(&ctx, &workspace, json),
        Command::Fingerprints {
            workspace,
            fp_type,
            name,
            json,
        } => cmd_query::fingerprints(&ctx, &workspace, fp_type.as_deref(), name.as_deref(), json),
        Command::Usage {
            workspace,
            fp_type,
            json,
        } => cmd_query::usage(&ctx, &workspace, fp_type.as_deref(), json),
        Command::Analytics { workspace, json } => cmd_analytics::execute(&ctx, &workspace, json),
        Command::Show { id, json } => cmd_query::show(&ctx, &id, json),
        Command::Compliance { id, targets, json } => {
            cmd_query::compliance(&ctx, &id, &targets, json)
        }
        Command::Catalog { json } => cmd_catalog::execute(&ctx, json),
        Command::Spider {
            workspace,
            sources,
            token,
            api_base,
            checkout_dir,
            workers,
            json,
        } => cmd_spider::execute(cmd_spider::SpiderParams {
            ctx: &ctx,
            workspace: &workspace,
            sources: &sources,
            token,
            api_base,
            checkout_dir,
            workers,
            json,
        }),
    }
}
