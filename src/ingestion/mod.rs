//! Crawl/update pipeline.
//!
//! This module walks conferences x years, pulls every listing page from a
//! [`ListingProvider`], and reconciles each entry with the store:
//!
//! | Store state                           | Action                                  |
//! |---------------------------------------|-----------------------------------------|
//! | no record                             | insert (resolve abstract first if enabled) |
//! | record, abstract empty, fetching on   | resolve abstract, fill url if newly known |
//! | record, abstract present              | fill url if stored url is empty         |
//! | record, abstract empty, fetching off  | nothing                                 |
//!
//! # Usage
//!
//! ```ignore
//! use confgrep::ingestion::{CrawlOptions, CrawlPipeline};
//!
//! let mut pipeline = CrawlPipeline::new(storage, dblp, resolver).await?;
//! let stats = pipeline.run(&CrawlOptions::default()).await?;
//! println!("Inserted: {}, abstracts filled: {}", stats.inserted, stats.abstracts_filled);
//! ```
//!
//! A failed listing fetch only costs that conference-year; store errors end
//! the run.

use chrono::Datelike;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::abstracts::AbstractSource;
use crate::models::{Conference, Paper};
use crate::provider::{ListingEntry, ListingProvider, ProviderError};
use crate::storage::{PaperStorage, StorageError, YearRange};

/// First year crawled by default.
pub const FIRST_YEAR: i32 = 2000;

/// Errors that end a crawl.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Storage operation failed
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// Provider operation failed
    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    /// Invalid options or inconsistent store data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Current calendar year (local time).
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

/// What to crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlOptions {
    /// Conferences to visit, in order
    pub conferences: Vec<Conference>,

    /// Years to visit per conference
    pub years: YearRange,

    /// Resolve abstracts for new records and records missing one
    pub load_abstracts: bool,

    /// Only visit years with at least one stored record missing an abstract
    pub missing_only: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            conferences: Conference::ALL.to_vec(),
            years: YearRange::new(FIRST_YEAR, current_year()),
            load_abstracts: false,
            missing_only: false,
        }
    }
}

/// Statistics from a crawl run (or a single conference-year).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    /// Listing entries seen
    pub seen: usize,

    /// Records newly inserted
    pub inserted: usize,

    /// Existing records whose abstract was filled
    pub abstracts_filled: usize,

    /// Existing records whose url was filled
    pub urls_filled: usize,

    /// Entries that changed nothing
    pub unchanged: usize,

    /// Conference-years whose listing could not be fetched
    pub failed_units: usize,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, outcome: EntryOutcome) {
        self.seen += 1;
        match outcome {
            EntryOutcome::Inserted => self.inserted += 1,
            EntryOutcome::Updated {
                abstract_filled,
                url_filled,
            } => {
                if abstract_filled {
                    self.abstracts_filled += 1;
                }
                if url_filled {
                    self.urls_filled += 1;
                }
            }
            EntryOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Record a conference-year whose listing failed.
    pub fn record_failed_unit(&mut self) {
        self.failed_units += 1;
    }

    /// Add another run's counts to this one.
    pub fn merge(&mut self, other: &CrawlStats) {
        self.seen += other.seen;
        self.inserted += other.inserted;
        self.abstracts_filled += other.abstracts_filled;
        self.urls_filled += other.urls_filled;
        self.unchanged += other.unchanged;
        self.failed_units += other.failed_units;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Inserted,
    Updated { abstract_filled: bool, url_filled: bool },
    Unchanged,
}

/// Crawl pipeline coordinator.
///
/// Owns the store and borrows nothing; everything runs sequentially, one
/// request at a time.
pub struct CrawlPipeline<S, L, A>
where
    S: PaperStorage,
    L: ListingProvider,
    A: AbstractSource,
{
    storage: S,
    provider: L,
    abstracts: A,
}

impl<S, L, A> CrawlPipeline<S, L, A>
where
    S: PaperStorage,
    L: ListingProvider,
    A: AbstractSource,
{
    /// Prepare the store (idempotent schema creation) and build a pipeline.
    ///
    /// # Errors
    /// Returns `IngestionError::StorageError` if the schema cannot be created
    pub async fn new(mut storage: S, provider: L, abstracts: A) -> IngestionResult<Self> {
        storage.initialize().await?;
        Ok(Self {
            storage,
            provider,
            abstracts,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Conference-years a run with `options` will visit, in order.
    ///
    /// In backfill mode only years that still have a record without an
    /// abstract (and fall inside `options.years`) are kept.
    pub async fn plan(&self, options: &CrawlOptions) -> IngestionResult<Vec<(Conference, i32)>> {
        let mut units = Vec::new();
        for &conference in &options.conferences {
            if options.missing_only {
                let years = self.storage.years_missing_abstract(conference).await?;
                units.extend(
                    years
                        .into_iter()
                        .filter(|year| options.years.contains(*year))
                        .map(|year| (conference, year)),
                );
            } else {
                units.extend(options.years.years().map(|year| (conference, year)));
            }
        }
        Ok(units)
    }

    /// Crawl everything `options` selects.
    pub async fn run(&mut self, options: &CrawlOptions) -> IngestionResult<CrawlStats> {
        let units = self.plan(options).await?;
        info!("Crawling {} conference-years via {}", units.len(), self.provider.name());

        let mut stats = CrawlStats::new();
        for (conference, year) in units {
            let unit = self.crawl_unit(conference, year, options.load_abstracts).await?;
            stats.merge(&unit);
        }
        Ok(stats)
    }

    /// Crawl one conference-year.
    ///
    /// Listing failures are logged and counted, not returned.
    ///
    /// # Errors
    /// Only store failures
    pub async fn crawl_unit(
        &mut self,
        conference: Conference,
        year: i32,
        load_abstracts: bool,
    ) -> IngestionResult<CrawlStats> {
        let mut stats = CrawlStats::new();
        let listing_ids = self.provider.listing_ids(conference, year);
        let mut found_listing = false;
        let mut failed = false;

        for listing_id in &listing_ids {
            let entries = match self.provider.fetch_listing(listing_id).await {
                Ok(Some(entries)) => entries,
                Ok(None) => {
                    debug!("Listing {} does not exist", listing_id);
                    continue;
                }
                Err(e) => {
                    warn!("Failed to obtain papers at {} {} ({}): {}", conference, year, listing_id, e);
                    failed = true;
                    continue;
                }
            };
            found_listing = true;

            for entry in &entries {
                let outcome = self
                    .process_entry(conference, year, entry, load_abstracts)
                    .await?;
                stats.record(outcome);
            }
        }

        if failed {
            stats.record_failed_unit();
        } else if !found_listing {
            warn!("No listing for {} {}, skipping", conference, year);
        }
        info!(
            "{} {}: {} papers seen, {} inserted",
            conference, year, stats.seen, stats.inserted
        );
        Ok(stats)
    }

    async fn process_entry(
        &mut self,
        conference: Conference,
        year: i32,
        entry: &ListingEntry,
        load_abstracts: bool,
    ) -> IngestionResult<EntryOutcome> {
        let existing = self
            .storage
            .find_paper(conference, year, &entry.title)
            .await?;

        let Some(existing) = existing else {
            let abstract_text = if load_abstracts {
                self.abstracts.resolve(conference, entry).await
            } else {
                String::new()
            };
            let paper = Paper::new(conference, year, entry.title.clone(), entry.authors.clone())
                .with_abstract(abstract_text)
                .with_url(entry.publisher_url.clone().unwrap_or_default());
            self.storage.insert_paper(&paper).await?;
            debug!("Inserted {}", paper);
            return Ok(EntryOutcome::Inserted);
        };

        let id = existing.id.ok_or_else(|| {
            IngestionError::InvalidInput(format!("Stored paper '{}' has no id", existing.title))
        })?;
        let new_url = entry
            .publisher_url
            .as_deref()
            .filter(|url| existing.url.is_empty() && !url.is_empty());

        if !existing.has_abstract() && !load_abstracts {
            return Ok(EntryOutcome::Unchanged);
        }

        let mut abstract_filled = false;
        if !existing.has_abstract() {
            let abstract_text = self.abstracts.resolve(conference, entry).await;
            if !abstract_text.is_empty() {
                self.storage.update_abstract(id, &abstract_text).await?;
                abstract_filled = true;
            }
        }

        let url_filled = match new_url {
            Some(url) => {
                self.storage.update_url(id, url).await?;
                true
            }
            None => false,
        };

        if abstract_filled || url_filled {
            Ok(EntryOutcome::Updated {
                abstract_filled,
                url_filled,
            })
        } else {
            Ok(EntryOutcome::Unchanged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use crate::fetch::FetchError;
    use crate::provider::ProviderResult;
    use crate::storage::StorageResult;

    // ===== Mock Implementations =====

    /// In-memory store.
    #[derive(Clone, Default)]
    struct MockStorage {
        state: Arc<Mutex<MockStorageState>>,
    }

    #[derive(Default)]
    struct MockStorageState {
        papers: Vec<Paper>,
        initialized: bool,
        fail_inserts: bool,
    }

    impl MockStorage {
        fn with_paper(self, paper: Paper) -> Self {
            {
                let mut state = self.state.lock().unwrap();
                let id = state.papers.len() as i64 + 1;
                let mut paper = paper;
                paper.id = Some(id);
                state.papers.push(paper);
            }
            self
        }

        fn failing_inserts(self) -> Self {
            self.state.lock().unwrap().fail_inserts = true;
            self
        }

        fn papers(&self) -> Vec<Paper> {
            self.state.lock().unwrap().papers.clone()
        }
    }

    #[async_trait]
    impl PaperStorage for MockStorage {
        async fn initialize(&mut self) -> StorageResult<()> {
            self.state.lock().unwrap().initialized = true;
            Ok(())
        }

        async fn insert_paper(&mut self, paper: &Paper) -> StorageResult<i64> {
            let mut state = self.state.lock().unwrap();
            if state.fail_inserts {
                return Err(StorageError::QueryError("disk full".to_string()));
            }
            let id = state.papers.len() as i64 + 1;
            let mut paper = paper.clone();
            paper.id = Some(id);
            state.papers.push(paper);
            Ok(id)
        }

        async fn find_paper(&self, conference: Conference, year: i32, title: &str) -> StorageResult<Option<Paper>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .papers
                .iter()
                .find(|p| p.conference == conference && p.year == year && p.title == title)
                .cloned())
        }

        async fn update_abstract(&mut self, id: i64, abstract_text: &str) -> StorageResult<()> {
            let mut state = self.state.lock().unwrap();
            let paper = state
                .papers
                .iter_mut()
                .find(|p| p.id == Some(id))
                .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
            paper.abstract_text = abstract_text.to_string();
            Ok(())
        }

        async fn update_url(&mut self, id: i64, url: &str) -> StorageResult<()> {
            let mut state = self.state.lock().unwrap();
            let paper = state
                .papers
                .iter_mut()
                .find(|p| p.id == Some(id))
                .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
            paper.url = url.to_string();
            Ok(())
        }

        async fn get_all_papers(&self, _year_range: Option<YearRange>) -> StorageResult<Vec<Paper>> {
            Ok(self.papers())
        }

        async fn papers_missing_abstract(&self) -> StorageResult<Vec<Paper>> {
            Ok(self.papers().into_iter().filter(|p| !p.has_abstract()).collect())
        }

        async fn years_missing_abstract(&self, conference: Conference) -> StorageResult<Vec<i32>> {
            let mut years: Vec<i32> = self
                .papers()
                .into_iter()
                .filter(|p| p.conference == conference && !p.has_abstract())
                .map(|p| p.year)
                .collect();
            years.sort_unstable();
            years.dedup();
            Ok(years)
        }

        async fn count_papers(&self) -> StorageResult<usize> {
            Ok(self.state.lock().unwrap().papers.len())
        }
    }

    enum Listing {
        Entries(Vec<ListingEntry>),
        Failing,
    }

    /// Provider with one listing per conference-year, keyed `"{conf}-{year}"`.
    #[derive(Clone, Default)]
    struct MockProvider {
        listings: Arc<Mutex<HashMap<String, Listing>>>,
        fetched: Arc<Mutex<Vec<String>>>,
    }

    impl MockProvider {
        fn with_listing(self, conference: Conference, year: i32, entries: Vec<ListingEntry>) -> Self {
            self.listings
                .lock()
                .unwrap()
                .insert(format!("{conference}-{year}"), Listing::Entries(entries));
            self
        }

        fn with_failure(self, conference: Conference, year: i32) -> Self {
            self.listings
                .lock()
                .unwrap()
                .insert(format!("{conference}-{year}"), Listing::Failing);
            self
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ListingProvider for MockProvider {
        fn listing_ids(&self, conference: Conference, year: i32) -> Vec<String> {
            vec![format!("{conference}-{year}")]
        }

        async fn fetch_listing(&self, listing_id: &str) -> ProviderResult<Option<Vec<ListingEntry>>> {
            self.fetched.lock().unwrap().push(listing_id.to_string());
            match self.listings.lock().unwrap().get(listing_id) {
                Some(Listing::Entries(entries)) => Ok(Some(entries.clone())),
                Some(Listing::Failing) => Err(ProviderError::FetchError(FetchError::StatusError {
                    url: listing_id.to_string(),
                    status: 500,
                })),
                None => Ok(None),
            }
        }

        fn name(&self) -> &str {
            "MockProvider"
        }
    }

    /// Abstract source answering from a title map and recording lookups.
    #[derive(Clone, Default)]
    struct MockAbstracts {
        abstracts: HashMap<String, String>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockAbstracts {
        fn with_abstract(mut self, title: &str, text: &str) -> Self {
            self.abstracts.insert(title.to_string(), text.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AbstractSource for MockAbstracts {
        async fn resolve(&self, _conference: Conference, entry: &ListingEntry) -> String {
            self.calls.lock().unwrap().push(entry.title.clone());
            self.abstracts.get(&entry.title).cloned().unwrap_or_default()
        }
    }

    // ===== Test Helper Functions =====

    fn entry(title: &str, url: Option<&str>) -> ListingEntry {
        ListingEntry {
            title: title.to_string(),
            authors: vec!["Alice".to_string(), "Bob".to_string()],
            publisher_url: url.map(str::to_string),
            fragment: String::new(),
        }
    }

    fn options(conference: Conference, start: i32, end: i32, load_abstracts: bool) -> CrawlOptions {
        CrawlOptions {
            conferences: vec![conference],
            years: YearRange::new(start, end),
            load_abstracts,
            missing_only: false,
        }
    }

    async fn pipeline(
        storage: &MockStorage,
        provider: &MockProvider,
        abstracts: &MockAbstracts,
    ) -> CrawlPipeline<MockStorage, MockProvider, MockAbstracts> {
        CrawlPipeline::new(storage.clone(), provider.clone(), abstracts.clone())
            .await
            .unwrap()
    }

    // ===== Insert / Dedup Tests =====

    #[tokio::test]
    async fn test_new_initializes_storage() {
        let storage = MockStorage::default();
        pipeline(&storage, &MockProvider::default(), &MockAbstracts::default()).await;
        assert!(storage.state.lock().unwrap().initialized);
    }

    #[tokio::test]
    async fn test_single_entry_inserted_without_abstract() {
        let storage = MockStorage::default();
        let provider = MockProvider::default().with_listing(
            Conference::Ccs,
            2023,
            vec![entry("Kernel Fuzzing.", Some("https://doi.org/10.1145/1"))],
        );
        let abstracts = MockAbstracts::default().with_abstract("Kernel Fuzzing.", "unused");
        let mut pipeline = pipeline(&storage, &provider, &abstracts).await;

        let stats = pipeline.run(&options(Conference::Ccs, 2023, 2023, false)).await.unwrap();

        assert_eq!(stats.seen, 1);
        assert_eq!(stats.inserted, 1);
        let papers = storage.papers();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].abstract_text, "");
        assert_eq!(papers[0].url, "https://doi.org/10.1145/1");
        assert_eq!(papers[0].authors, vec!["Alice", "Bob"]);
        assert!(abstracts.calls().is_empty());
    }

    #[tokio::test]
    async fn test_new_entry_resolves_abstract_when_enabled() {
        let storage = MockStorage::default();
        let provider =
            MockProvider::default().with_listing(Conference::Ndss, 2020, vec![entry("T.", None)]);
        let abstracts = MockAbstracts::default().with_abstract("T.", "Abstract text.");
        let mut pipeline = pipeline(&storage, &provider, &abstracts).await;

        pipeline.run(&options(Conference::Ndss, 2020, 2020, true)).await.unwrap();

        assert_eq!(storage.papers()[0].abstract_text, "Abstract text.");
        assert_eq!(abstracts.calls(), vec!["T."]);
    }

    #[tokio::test]
    async fn test_crawl_is_idempotent() {
        let storage = MockStorage::default();
        let provider = MockProvider::default()
            .with_listing(Conference::Usenix, 2021, vec![entry("A.", None), entry("B.", None)])
            .with_listing(Conference::Usenix, 2022, vec![entry("A.", None)]);
        let abstracts = MockAbstracts::default();
        let mut pipeline = pipeline(&storage, &provider, &abstracts).await;
        let opts = options(Conference::Usenix, 2021, 2022, false);

        let first = pipeline.run(&opts).await.unwrap();
        let second = pipeline.run(&opts).await.unwrap();

        assert_eq!(first.inserted, 3);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.unchanged, 3);
        // Same title in two different years is two records
        assert_eq!(storage.papers().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_title_in_one_listing_is_not_reinserted() {
        let storage = MockStorage::default();
        let provider = MockProvider::default().with_listing(
            Conference::Raid,
            2019,
            vec![entry("Dup.", None), entry("Dup.", None)],
        );
        let mut pipeline = pipeline(&storage, &provider, &MockAbstracts::default()).await;

        let stats = pipeline.run(&options(Conference::Raid, 2019, 2019, false)).await.unwrap();

        assert_eq!(stats.seen, 2);
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(storage.papers().len(), 1);
    }

    // ===== Update Tests =====

    #[tokio::test]
    async fn test_existing_record_gets_abstract_and_url() {
        let storage = MockStorage::default()
            .with_paper(Paper::new(Conference::IeeeSp, 2022, "Old.".into(), vec!["Alice".into()]));
        let provider = MockProvider::default().with_listing(
            Conference::IeeeSp,
            2022,
            vec![entry("Old.", Some("https://doi.org/10.1109/x"))],
        );
        let abstracts = MockAbstracts::default().with_abstract("Old.", "Filled in.");
        let mut pipeline = pipeline(&storage, &provider, &abstracts).await;

        let stats = pipeline.run(&options(Conference::IeeeSp, 2022, 2022, true)).await.unwrap();

        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.abstracts_filled, 1);
        assert_eq!(stats.urls_filled, 1);
        let paper = &storage.papers()[0];
        assert_eq!(paper.abstract_text, "Filled in.");
        assert_eq!(paper.url, "https://doi.org/10.1109/x");
    }

    #[tokio::test]
    async fn test_existing_url_is_preserved() {
        let storage = MockStorage::default().with_paper(
            Paper::new(Conference::IeeeSp, 2022, "Old.".into(), vec![]).with_url("https://keep.me".into()),
        );
        let provider = MockProvider::default().with_listing(
            Conference::IeeeSp,
            2022,
            vec![entry("Old.", Some("https://doi.org/new"))],
        );
        let abstracts = MockAbstracts::default().with_abstract("Old.", "Filled in.");
        let mut pipeline = pipeline(&storage, &provider, &abstracts).await;

        let stats = pipeline.run(&options(Conference::IeeeSp, 2022, 2022, true)).await.unwrap();

        assert_eq!(stats.abstracts_filled, 1);
        assert_eq!(stats.urls_filled, 0);
        assert_eq!(storage.papers()[0].url, "https://keep.me");
    }

    #[tokio::test]
    async fn test_present_abstract_only_fills_url() {
        let storage = MockStorage::default().with_paper(
            Paper::new(Conference::Acsac, 2018, "Done.".into(), vec![]).with_abstract("Have it.".into()),
        );
        let provider = MockProvider::default().with_listing(
            Conference::Acsac,
            2018,
            vec![entry("Done.", Some("https://doi.org/acsac"))],
        );
        let abstracts = MockAbstracts::default();
        let mut pipeline = pipeline(&storage, &provider, &abstracts).await;

        let stats = pipeline.run(&options(Conference::Acsac, 2018, 2018, true)).await.unwrap();

        assert_eq!(stats.urls_filled, 1);
        assert!(abstracts.calls().is_empty());
        assert_eq!(storage.papers()[0].abstract_text, "Have it.");
        assert_eq!(storage.papers()[0].url, "https://doi.org/acsac");
    }

    #[tokio::test]
    async fn test_missing_abstract_left_alone_when_fetching_disabled() {
        let storage = MockStorage::default()
            .with_paper(Paper::new(Conference::Ccs, 2021, "Empty.".into(), vec![]));
        let provider = MockProvider::default().with_listing(
            Conference::Ccs,
            2021,
            vec![entry("Empty.", Some("https://doi.org/ccs"))],
        );
        let abstracts = MockAbstracts::default().with_abstract("Empty.", "x");
        let mut pipeline = pipeline(&storage, &provider, &abstracts).await;

        let stats = pipeline.run(&options(Conference::Ccs, 2021, 2021, false)).await.unwrap();

        assert_eq!(stats.unchanged, 1);
        assert!(abstracts.calls().is_empty());
        assert_eq!(storage.papers()[0].url, "");
    }

    // ===== Failure Handling Tests =====

    #[tokio::test]
    async fn test_missing_listing_is_skipped() {
        let storage = MockStorage::default();
        let provider = MockProvider::default()
            .with_listing(Conference::Pets, 2017, vec![entry("P.", None)]);
        let mut pipeline = pipeline(&storage, &provider, &MockAbstracts::default()).await;

        let stats = pipeline.run(&options(Conference::Pets, 2016, 2018, false)).await.unwrap();

        assert_eq!(provider.fetched(), vec!["PETS-2016", "PETS-2017", "PETS-2018"]);
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.failed_units, 0);
    }

    #[tokio::test]
    async fn test_failed_listing_does_not_abort_crawl() {
        let storage = MockStorage::default();
        let provider = MockProvider::default()
            .with_failure(Conference::Esorics, 2019)
            .with_listing(Conference::Esorics, 2020, vec![entry("E.", None)]);
        let mut pipeline = pipeline(&storage, &provider, &MockAbstracts::default()).await;

        let stats = pipeline.run(&options(Conference::Esorics, 2019, 2020, false)).await.unwrap();

        assert_eq!(stats.failed_units, 1);
        assert_eq!(stats.inserted, 1);
    }

    #[tokio::test]
    async fn test_storage_failure_is_fatal() {
        let storage = MockStorage::default().failing_inserts();
        let provider = MockProvider::default()
            .with_listing(Conference::Ndss, 2015, vec![entry("N.", None)]);
        let mut pipeline = pipeline(&storage, &provider, &MockAbstracts::default()).await;

        let result = pipeline.run(&options(Conference::Ndss, 2015, 2016, false)).await;

        assert!(matches!(result, Err(IngestionError::StorageError(_))));
        assert_eq!(provider.fetched(), vec!["NDSS-2015"]);
    }

    // ===== Planning Tests =====

    #[tokio::test]
    async fn test_plan_full_range() {
        let storage = MockStorage::default();
        let pipeline = pipeline(&storage, &MockProvider::default(), &MockAbstracts::default()).await;
        let opts = CrawlOptions {
            conferences: vec![Conference::Ndss, Conference::Ccs],
            years: YearRange::new(2020, 2021),
            ..CrawlOptions::default()
        };

        let units = pipeline.plan(&opts).await.unwrap();

        assert_eq!(
            units,
            vec![
                (Conference::Ndss, 2020),
                (Conference::Ndss, 2021),
                (Conference::Ccs, 2020),
                (Conference::Ccs, 2021),
            ]
        );
    }

    #[tokio::test]
    async fn test_plan_backfill_only_years_missing_abstracts() {
        let storage = MockStorage::default()
            .with_paper(Paper::new(Conference::Usenix, 2005, "a".into(), vec![]))
            .with_paper(Paper::new(Conference::Usenix, 2010, "b".into(), vec![]).with_abstract("x".into()))
            .with_paper(Paper::new(Conference::Usenix, 2012, "c".into(), vec![]))
            .with_paper(Paper::new(Conference::Usenix, 1999, "d".into(), vec![]));
        let pipeline = pipeline(&storage, &MockProvider::default(), &MockAbstracts::default()).await;
        let opts = CrawlOptions {
            conferences: vec![Conference::Usenix, Conference::Ccs],
            years: YearRange::new(2000, 2024),
            load_abstracts: true,
            missing_only: true,
        };

        let units = pipeline.plan(&opts).await.unwrap();

        assert_eq!(units, vec![(Conference::Usenix, 2005), (Conference::Usenix, 2012)]);
    }

    #[test]
    fn test_default_options() {
        let opts = CrawlOptions::default();
        assert_eq!(opts.conferences.len(), 10);
        assert_eq!(opts.years.start, FIRST_YEAR);
        assert_eq!(opts.years.end, current_year());
        assert!(!opts.load_abstracts);
        assert!(!opts.missing_only);
    }

    #[test]
    fn test_stats_merge() {
        let mut total = CrawlStats::new();
        let mut unit = CrawlStats::new();
        unit.record(EntryOutcome::Inserted);
        unit.record(EntryOutcome::Updated {
            abstract_filled: true,
            url_filled: false,
        });
        unit.record_failed_unit();
        total.merge(&unit);
        total.merge(&unit);
        assert_eq!(total.seen, 4);
        assert_eq!(total.inserted, 2);
        assert_eq!(total.abstracts_filled, 2);
        assert_eq!(total.failed_units, 2);
    }
}
