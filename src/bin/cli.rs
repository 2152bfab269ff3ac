//! hncrawl CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hncrawl::{
    error::{AppError, Result},
    models::{Config, Frontier, RecordKind, StorageBackend},
    pipeline,
    queue::{InterruptToken, ShutdownPolicy},
    services::{CrawlOptions, HnClient, RemoteApi},
    storage::{self, RecordStorage},
    utils,
};

/// hncrawl - Hacker News graph crawler
#[derive(Parser, Debug)]
#[command(
    name = "hncrawl",
    version,
    about = "Crawls the Hacker News item graph into local JSON files"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Overrides shared by the crawl commands.
#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Concurrent workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Run deadline in seconds (0 = none)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Maximum pending work items (0 = unbounded)
    #[arg(long)]
    capacity: Option<usize>,

    /// Shutdown policy: cancel, finish or complete-priority
    #[arg(long, value_parser = parse_policy)]
    policy: Option<ShutdownPolicy>,

    /// Keep records in memory instead of writing them to disk
    #[arg(long)]
    memory: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl outward from the frontier lists
    Crawl {
        /// Frontier category to seed from (repeatable)
        #[arg(long = "category", value_parser = parse_frontier)]
        categories: Vec<Frontier>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Crawl outward from recently changed items and profiles
    Update {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Validate the configuration file
    Validate,

    /// Show storage contents and the last run
    Info,
}

fn parse_frontier(s: &str) -> std::result::Result<Frontier, String> {
    s.parse().map_err(|e: AppError| e.to_string())
}

fn parse_policy(s: &str) -> std::result::Result<ShutdownPolicy, String> {
    match s.to_lowercase().as_str() {
        "cancel" => Ok(ShutdownPolicy::Cancel),
        "finish" => Ok(ShutdownPolicy::Finish),
        "complete-priority" => Ok(ShutdownPolicy::CompletePriority),
        other => Err(format!(
            "unknown policy '{}' (expected cancel, finish or complete-priority)",
            other
        )),
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
    utils::log::init(level);
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut Config, run: &RunArgs) {
    if let Some(workers) = run.workers {
        config.queue.workers = workers;
    }
    if let Some(timeout) = run.timeout {
        config.queue.run_timeout_secs = timeout;
    }
    if let Some(capacity) = run.capacity {
        config.queue.capacity = capacity;
    }
    if let Some(policy) = run.policy {
        config.queue.shutdown_policy = policy;
    }
    if run.memory {
        config.storage.backend = StorageBackend::Memory;
    }
}

/// Ctrl-C feeds the interrupt token: the first one applies the shutdown
/// policy, another one during that shutdown forces a cancel.
fn spawn_interrupt_listener() -> Arc<InterruptToken> {
    let token = Arc::new(InterruptToken::new());
    let listener = Arc::clone(&token);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received");
            listener.interrupt();
        }
    });
    token
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    init_logging(cli.verbose, &config.logging.level);

    log::info!("hncrawl starting...");
    if cli.config.exists() {
        log::info!("Loaded configuration from {}", cli.config.display());
    } else {
        log::warn!("{} not found; using defaults", cli.config.display());
    }

    match cli.command {
        Command::Crawl { categories, run } => {
            apply_overrides(&mut config, &run);
            if !categories.is_empty() {
                config.crawler.frontier = categories;
            }
            config.validate()?;

            let api: Arc<dyn RemoteApi> = Arc::new(HnClient::new(&config.crawler)?);
            let storage = storage::from_config(&config.storage);
            let interrupt = spawn_interrupt_listener();

            let summary = pipeline::run_crawler(
                api,
                storage,
                CrawlOptions::from(&config.queue),
                &config.crawler.frontier,
                &interrupt,
            )
            .await?;

            log::info!("Crawl complete: {} record(s) saved", summary.saved_count);
        }

        Command::Update { run } => {
            apply_overrides(&mut config, &run);
            config.validate()?;

            let api: Arc<dyn RemoteApi> = Arc::new(HnClient::new(&config.crawler)?);
            let storage = storage::from_config(&config.storage);
            let interrupt = spawn_interrupt_listener();

            let summary = pipeline::run_update(
                api,
                storage,
                CrawlOptions::from(&config.queue),
                &interrupt,
            )
            .await?;

            log::info!("Update complete: {} record(s) saved", summary.saved_count);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
            log::info!(
                "  {} worker(s), policy {}, frontier [{}]",
                config.queue.workers,
                config.queue.shutdown_policy,
                config
                    .crawler
                    .frontier
                    .iter()
                    .map(Frontier::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Command::Info => {
            let storage = storage::LocalStorage::new(&config.storage.root_dir);
            log::info!("Storage directory: {}", storage.root_dir().display());

            for kind in RecordKind::all() {
                let dir = storage.root_dir().join(kind.as_str());
                if dir.exists() {
                    log::info!("  {}/ present", kind);
                }
            }
            log::info!("Stored records: {}", storage.count().await?);

            match storage.last_run().await? {
                Some(run) => {
                    log::info!("Last run finished: {}", run.finished_at);
                    log::info!(
                        "  visited {}, saved {}, stopped by {:?}",
                        run.visited_count,
                        run.saved_count,
                        run.queue.trigger
                    );
                }
                None => log::info!("No run recorded yet."),
            }

            let api = HnClient::new(&config.crawler)?;
            match api.max_item_id().await {
                Ok(max) => log::info!("Remote max item id: {}", max),
                Err(e) => log::warn!("Remote API unreachable: {}", e),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
