//! Crawl binary entry point.
//!
//! Walks the DBLP listings of every selected conference and year, inserts
//! new papers and optionally resolves their abstracts.
//!
//! # Examples
//!
//! Crawl everything (titles only):
//! ```bash
//! ingestion
//! ```
//!
//! Fill in abstracts for years that still have gaps:
//! ```bash
//! ingestion --load-abstracts --missing-only
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use confgrep::{
    abstracts::{
        fallback::{SemanticScholarClient, API_KEY_ENV},
        render::{DisabledRenderer, Renderer, WebDriverRenderer, DEFAULT_WEBDRIVER_URL},
        AbstractResolver, ExtractorSet,
    },
    fetch::{HttpFetcher, PageFetcher, Sleeper, TokioSleeper},
    ingestion::{current_year, CrawlOptions, CrawlPipeline, CrawlStats, FIRST_YEAR},
    models::Conference,
    provider::dblp::DblpProvider,
    storage::{sqlite::SqliteStorage, PaperStorage, YearRange},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Crawl CLI for building and updating the paper database
#[derive(Parser, Debug)]
#[command(
    name = "ingestion",
    version,
    about = "Crawl security conference papers into the local database",
    long_about = "Crawl DBLP listings of top security conferences, store new papers and \
                  optionally fetch their abstracts from the publisher pages.

EXAMPLES:
  Crawl every conference and year:
    ingestion

  Crawl two venues, recent years only, with abstracts:
    ingestion --conference ndss --conference ccs --start-year 2020 --load-abstracts

  Backfill abstracts where they are missing:
    SEMANTIC_SCHOLAR_API_KEY=... ingestion --load-abstracts --missing-only"
)]
struct IngestionArgs {
    /// Database file path (default: <data dir>/confgrep/papers.db)
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// Fetch abstracts for new papers and papers missing one
    #[arg(long)]
    load_abstracts: bool,

    /// Only visit years that have papers without an abstract
    #[arg(long)]
    missing_only: bool,

    /// Conference to crawl (repeatable; default: all)
    #[arg(long = "conference", value_name = "NAME")]
    conferences: Vec<Conference>,

    /// First year to crawl (inclusive)
    #[arg(long, value_name = "YEAR", default_value_t = FIRST_YEAR)]
    start_year: i32,

    /// Last year to crawl (inclusive; default: current year)
    #[arg(long, value_name = "YEAR")]
    end_year: Option<i32>,

    /// WebDriver endpoint used to render IEEE and ACM pages
    #[arg(long, value_name = "URL", default_value = DEFAULT_WEBDRIVER_URL)]
    webdriver_url: String,

    /// Skip browser rendering (IEEE and ACM abstracts come from the fallback only)
    #[arg(long)]
    no_browser: bool,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Create storage instance, making sure the parent directory exists
fn create_storage(db_path: &Path) -> Result<SqliteStorage> {
    debug!("Creating SQLite storage at: {}", db_path.display());

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
            info!("Created database directory: {:?}", parent);
        }
    }

    Ok(SqliteStorage::new(db_path))
}

/// Build the abstract resolver: publisher extractors plus the optional
/// Semantic Scholar fallback.
fn create_resolver(args: &IngestionArgs, fetcher: Arc<dyn PageFetcher>) -> Result<AbstractResolver> {
    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);

    let renderer: Arc<dyn Renderer> = if args.no_browser {
        info!("Browser rendering disabled");
        Arc::new(DisabledRenderer)
    } else {
        info!("Rendering dynamic pages via WebDriver at {}", args.webdriver_url);
        Arc::new(WebDriverRenderer::new(args.webdriver_url.clone()))
    };

    let resolver = AbstractResolver::new(
        ExtractorSet::new(fetcher, renderer, sleeper.clone()),
        sleeper.clone(),
    );

    let fallback =
        SemanticScholarClient::from_env(sleeper).context("Failed to create Semantic Scholar client")?;
    Ok(match fallback {
        Some(client) => {
            info!("Semantic Scholar fallback enabled");
            resolver.with_fallback(Box::new(client))
        }
        None => {
            warn!("{} is not set, Semantic Scholar fallback disabled", API_KEY_ENV);
            resolver
        }
    })
}

/// Resolve CLI arguments into crawl options
fn crawl_options(args: &IngestionArgs) -> Result<CrawlOptions> {
    let end_year = args.end_year.unwrap_or_else(current_year);
    if args.start_year > end_year {
        anyhow::bail!(
            "Invalid year range: start year ({}) cannot be greater than end year ({})",
            args.start_year,
            end_year
        );
    }

    let conferences = if args.conferences.is_empty() {
        Conference::ALL.to_vec()
    } else {
        args.conferences.clone()
    };

    Ok(CrawlOptions {
        conferences,
        years: YearRange::new(args.start_year, end_year),
        load_abstracts: args.load_abstracts,
        missing_only: args.missing_only,
    })
}

/// Create a progress bar over conference-years
fn create_progress_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );
    Ok(pb)
}

fn print_summary(stats: &CrawlStats, total_papers: usize, elapsed: Duration) {
    println!("\n╔════════════════════════════════════════╗");
    println!("║      Crawl Completed                   ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Entries seen:         {:>16} ║", stats.seen);
    println!("║ Inserted:             {:>16} ║", stats.inserted);
    println!("║ Abstracts filled:     {:>16} ║", stats.abstracts_filled);
    println!("║ URLs filled:          {:>16} ║", stats.urls_filled);
    println!("║ Unchanged:            {:>16} ║", stats.unchanged);
    println!("║ Failed listings:      {:>16} ║", stats.failed_units);
    println!("║ Papers in database:   {:>16} ║", total_papers);
    println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
    println!("╚════════════════════════════════════════╝");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = IngestionArgs::parse();
    init_logging(&args.log_level);

    info!("Starting paper crawl");
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();
    let options = crawl_options(&args)?;

    let db_path = args.db_path.clone().unwrap_or_else(confgrep::default_db_path);
    let storage = create_storage(&db_path).context("Failed to create storage")?;
    info!("Database path: {}", db_path.display());

    let fetcher: Arc<dyn PageFetcher> =
        Arc::new(HttpFetcher::new(HTTP_TIMEOUT).context("Failed to create HTTP client")?);
    let provider = DblpProvider::new(fetcher.clone());
    let resolver = create_resolver(&args, fetcher)?;

    let mut pipeline = CrawlPipeline::new(storage, provider, resolver)
        .await
        .context("Failed to initialize database")?;

    let units = pipeline
        .plan(&options)
        .await
        .context("Failed to plan crawl")?;
    if units.is_empty() {
        warn!("Nothing to crawl");
        return Ok(());
    }
    info!("Crawling {} conference-years", units.len());

    let progress = create_progress_bar(units.len())?;
    let mut stats = CrawlStats::new();
    for (conference, year) in units {
        progress.set_message(format!("{conference} {year}"));
        let unit = pipeline
            .crawl_unit(conference, year, options.load_abstracts)
            .await
            .with_context(|| format!("Crawl aborted at {conference} {year}"))?;
        stats.merge(&unit);
        progress.inc(1);
    }
    progress.finish_with_message(format!("{} inserted", stats.inserted));

    let total_papers = pipeline
        .storage()
        .count_papers()
        .await
        .context("Failed to count papers")?;
    print_summary(&stats, total_papers, start_time.elapsed());

    if stats.failed_units > 0 {
        warn!(
            "{} conference-years could not be fetched - check logs for details",
            stats.failed_units
        );
    }

    info!("Crawl completed successfully");
    Ok(())
}
