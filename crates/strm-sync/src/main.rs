use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strm_sync::{
    config::Config,
    models::{ContentDomain, SyncOutcome, SyncTarget},
    sync::SyncService,
};

#[derive(Parser)]
#[command(name = "strm-sync")]
#[command(version)]
#[command(about = "Mirror an IPTV provider catalog into .strm libraries, an M3U playlist and an XMLTV guide")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Synchronize one domain, or every enabled domain
    Sync {
        #[arg(long)]
        domain: Option<ContentDomain>,
    },
    /// Show cache statistics
    Stats,
    /// List the categories of a domain
    Categories { domain: ContentDomain },
    /// Make a category visible
    Show {
        domain: ContentDomain,
        category_id: String,
    },
    /// Hide a category; its items are dropped on the next sync
    Hide {
        domain: ContentDomain,
        category_id: String,
    },
    /// Delete cached items, keeping categories and their visibility
    ClearCache {
        #[arg(long)]
        domain: Option<ContentDomain>,
    },
    /// Show the most recent sync runs
    Runs {
        #[arg(long)]
        domain: Option<ContentDomain>,
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },
    /// Reclaim space in the cache database
    Vacuum,
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("strm_sync={level}").into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    let mut config = Config::load_from_file(&cli.config)
        .with_context(|| format!("Loading configuration from {}", cli.config))?;
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }
    info!("Using database: {}", config.database.url);

    let service = SyncService::from_config(&config).await?;

    match cli.command {
        Command::Sync { domain } => {
            let target = domain.map_or(SyncTarget::All, SyncTarget::Domain);
            let handle = service.trigger_sync(target).await?;
            let run_id = handle.run_id();

            let canceller = service.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling run {}", run_id);
                    canceller.cancel_run(run_id).await;
                }
            });

            let report = handle.wait().await?;
            let mut failed = false;
            for domain in &report.domains {
                println!(
                    "{:<7} {:<10} +{} ~{} -{}{}",
                    domain.domain.to_string(),
                    domain.outcome.to_string(),
                    domain.counts.added,
                    domain.counts.updated,
                    domain.counts.removed,
                    domain
                        .error
                        .as_deref()
                        .map(|e| format!("  {e}"))
                        .unwrap_or_default()
                );
                if let Some(generation) = &domain.generation {
                    println!(
                        "        files: {} written, {} deleted, {} unchanged, {} failed",
                        generation.written,
                        generation.deleted,
                        generation.unchanged,
                        generation.failed
                    );
                }
                if !domain.omitted.is_empty() {
                    println!("        omitted: {}", domain.omitted.join(", "));
                }
                failed |= domain.outcome == SyncOutcome::Failed;
            }
            if failed {
                anyhow::bail!("Sync run {} failed", run_id);
            }
        }
        Command::Stats => {
            let stats = service.get_statistics().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Categories { domain } => {
            for category in service.list_categories(domain).await? {
                println!(
                    "{:>8}  {}  {}{}",
                    category.remote_id,
                    if category.visible { "shown " } else { "hidden" },
                    category.name,
                    if category.missing_runs > 0 {
                        format!("  (missing {} run(s))", category.missing_runs)
                    } else {
                        String::new()
                    }
                );
            }
        }
        Command::Show {
            domain,
            category_id,
        } => {
            let category = service
                .set_category_visibility(domain, &category_id, true)
                .await?;
            println!("Showing {} category '{}'", domain, category.name);
        }
        Command::Hide {
            domain,
            category_id,
        } => {
            let category = service
                .set_category_visibility(domain, &category_id, false)
                .await?;
            println!("Hiding {} category '{}'", domain, category.name);
        }
        Command::ClearCache { domain } => {
            let removed = service.clear_cache(domain).await?;
            println!("Removed {removed} cached rows");
        }
        Command::Runs { domain, limit } => {
            for run in service.recent_runs(domain, limit).await? {
                println!(
                    "{}  {:<7} {:<10} {:<12} +{} ~{} -{}{}",
                    run.started_at.format("%Y-%m-%d %H:%M:%S"),
                    run.domain.to_string(),
                    run.outcome.to_string(),
                    run.stage.map(|s| s.to_string()).unwrap_or_default(),
                    run.items_added,
                    run.items_updated,
                    run.items_removed,
                    run.error.map(|e| format!("  {e}")).unwrap_or_default()
                );
            }
        }
        Command::Vacuum => {
            service.vacuum().await?;
            println!("Vacuum complete");
        }
    }

    Ok(())
}
