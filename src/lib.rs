//! confgrep - crawl security conference papers into a local database and
//! grep them offline.
//!
//! # Architecture
//!
//! The system is organized into several key modules:
//!
//! - **models**: Core data structures (Conference, Paper)
//! - **storage**: Database persistence and retrieval (SQLite-based)
//! - **fetch**: HTTP fetching, retry and rate-limit plumbing
//! - **provider**: Bibliography listing sources (DBLP)
//! - **abstracts**: Per-publisher abstract extractors and the title-search fallback
//! - **ingestion**: The crawl/update pipeline
//! - **query**: Keyword search and ranking
//!
//! # Workflow
//!
//! ## Crawl
//!
//! 1. For every selected conference and year, fetch the DBLP listing pages
//! 2. Insert papers that are not yet stored, keyed by (conference, year, title)
//! 3. Optionally resolve abstracts from the publisher page, falling back to
//!    Semantic Scholar when the page yields nothing
//! 4. Fill in abstracts and URLs on records that are missing them
//!
//! ## Search
//!
//! 1. Load stored papers (optionally restricted to a year range)
//! 2. Keep papers whose title and abstract contain every keyword
//! 3. Rank newest first, breaking ties by venue prestige
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use confgrep::{
//!     abstracts::{render::DisabledRenderer, AbstractResolver, ExtractorSet},
//!     fetch::{HttpFetcher, TokioSleeper},
//!     ingestion::{CrawlOptions, CrawlPipeline},
//!     provider::dblp::DblpProvider,
//!     storage::sqlite::SqliteStorage,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = Arc::new(HttpFetcher::new(std::time::Duration::from_secs(30))?);
//!     let sleeper = Arc::new(TokioSleeper);
//!     let extractors = ExtractorSet::new(fetcher.clone(), Arc::new(DisabledRenderer), sleeper.clone());
//!
//!     let mut pipeline = CrawlPipeline::new(
//!         SqliteStorage::new("papers.db"),
//!         DblpProvider::new(fetcher),
//!         AbstractResolver::new(extractors, sleeper),
//!     )
//!     .await?;
//!
//!     let stats = pipeline.run(&CrawlOptions::default()).await?;
//!     println!("{} papers inserted", stats.inserted);
//!     Ok(())
//! }
//! ```

// Public modules
pub mod abstracts;
pub mod fetch;
pub mod ingestion;
pub mod models;
pub mod provider;
pub mod query;
pub mod storage;

// Re-export commonly used types at the crate root
pub use models::{Conference, Paper};
pub use query::{KeywordSearchEngine, SearchEngine, SearchQuery};
pub use storage::{PaperStorage, YearRange};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default database file name inside the data directory
pub const DEFAULT_DB_FILE: &str = "papers.db";

/// Default database location: `<user data dir>/confgrep/papers.db`, or
/// `papers.db` in the working directory when no data dir is known.
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("confgrep").join(DEFAULT_DB_FILE))
        .unwrap_or_else(|| std::path::PathBuf::from(DEFAULT_DB_FILE))
}
