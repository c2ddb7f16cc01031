//! Shelf-Harvest main entry point
//!
//! This is the command-line interface for the Shelf-Harvest catalogue scraper.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use shelf_harvest::config::{hash_content, load_config_with_hash, validate, Config};
use shelf_harvest::crawler::{run_daemon, Coordinator, DailyTrigger};
use shelf_harvest::output::{export_json, load_statistics, print_statistics};
use shelf_harvest::storage::{open_storage, Source};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Shelf-Harvest: a two-source catalogue scraper
///
/// Shelf-Harvest walks a book catalogue and a quote site, follows each book
/// to its detail page, and replaces a persisted snapshot per source on every
/// run. By default it runs once at startup and then once a day.
#[derive(Parser, Debug)]
#[command(name = "shelf-harvest")]
#[command(version)]
#[command(about = "A two-source catalogue scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl once and exit instead of running the daily scheduler
    #[arg(long)]
    once: bool,

    /// Restrict a one-shot crawl to a single source
    #[arg(long, value_enum, requires = "once")]
    source: Option<SourceArg>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "export", "once"])]
    dry_run: bool,

    /// Show snapshot statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export", "once"])]
    stats: bool,

    /// Print a persisted snapshot as JSON and exit
    #[arg(long, value_enum, value_name = "SOURCE", conflicts_with_all = ["dry_run", "stats", "once"])]
    export: Option<SourceArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
    Books,
    Quotes,
}

impl From<SourceArg> for Source {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Books => Source::Books,
            SourceArg::Quotes => Source::Quotes,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load(cli.config.as_deref())?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if let Some(source) = cli.export {
        handle_export(&config, source.into())
    } else if cli.once {
        handle_once(config, config_hash, cli.source.map(Source::from)).await
    } else {
        handle_daemon(config, config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shelf_harvest=info,warn"),
            1 => EnvFilter::new("shelf_harvest=debug,info"),
            2 => EnvFilter::new("shelf_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, or the validated defaults when none is given
fn load(path: Option<&Path>) -> anyhow::Result<(Config, String)> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok((config, hash))
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            let config = Config::default();
            validate(&config).context("default configuration is invalid")?;
            Ok((config, hash_content("")))
        }
    }
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Shelf-Harvest Dry Run ===\n");

    println!("HTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Timeout: {}s", config.http.timeout_secs);
    println!("  Connect timeout: {}s", config.http.connect_timeout_secs);

    println!("\nCrawler:");
    println!("  Max pages per source: {}", config.crawler.max_pages);
    println!("  Detail concurrency: {}", config.crawler.detail_concurrency);
    println!(
        "  Description max length: {}",
        config.crawler.description_max_length
    );
    println!("  Fetch details: {}", config.crawler.fetch_details);

    let trigger = DailyTrigger::from_config(&config.schedule)?;
    println!("\nSchedule:");
    println!("  Daily at {} ({})", config.schedule.daily_at, trigger.zone());
    println!("  Run on startup: {}", config.schedule.run_on_startup);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nSources:");
    println!("  Books start: {}", config.books.start_url());
    println!("  Quotes start: {}", config.quotes.start_url());

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Next daily crawl would start at {}",
        trigger.next_fire_after(chrono::Utc::now())
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: prints one snapshot as JSON
fn handle_export(config: &Config, source: Source) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stdout = std::io::stdout();
    let count = export_json(&storage, source, stdout.lock())?;
    tracing::info!("Exported {} {} records", count, source);
    Ok(())
}

/// Handles --once: crawls one or both sources and exits
async fn handle_once(
    config: Config,
    config_hash: String,
    source: Option<Source>,
) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config, config_hash)?;

    match source {
        Some(Source::Books) => {
            let count = coordinator.run_book_crawl().await?;
            tracing::info!("Book crawl completed with {} books", count);
        }
        Some(Source::Quotes) => {
            let count = coordinator.run_quote_crawl().await?;
            tracing::info!("Quote crawl completed with {} quotes", count);
        }
        None => {
            let report = coordinator.run_all().await;
            tracing::info!("Crawl finished: {:?}", report);
            if report.books.is_none() || report.quotes.is_none() {
                anyhow::bail!("at least one source failed to crawl");
            }
        }
    }

    Ok(())
}

/// Handles the default mode: startup run plus the daily trigger
async fn handle_daemon(config: Config, config_hash: String) -> anyhow::Result<()> {
    let trigger = DailyTrigger::from_config(&config.schedule)?;
    let run_on_startup = config.schedule.run_on_startup;
    let coordinator = Coordinator::new(config, config_hash)?;

    run_daemon(&coordinator, trigger, run_on_startup).await;
    tracing::info!("Scheduler stopped");
    Ok(())
}
