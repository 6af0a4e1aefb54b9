//! Query processing and ranking module.
//!
//! A query is a list of keywords. A paper matches when every keyword occurs
//! in its title or abstract (case-insensitively). In fuzzy mode a keyword
//! also matches when its word stems occur as a run of stems in the text, so
//! `exploiting` finds "exploit", "exploited" and "exploits".
//!
//! Matches are ranked newest first, with venue prestige breaking ties
//! inside a year.
//!
//! # Usage
//!
//! ```rust,no_run
//! use confgrep::query::{KeywordSearchEngine, SearchEngine, SearchQuery};
//! use confgrep::storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = SqliteStorage::new("papers.db");
//! let engine = KeywordSearchEngine::new(storage);
//!
//! let query = SearchQuery::new(vec!["kernel".into(), "fuzzing".into()], true, None);
//! for paper in engine.search(&query).await? {
//!     println!("{paper}");
//! }
//! # Ok(())
//! # }
//! ```

use std::cmp::Ordering;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use rust_stemmers::{Algorithm, Stemmer};
use thiserror::Error;

use crate::models::Paper;
use crate::storage::{PaperStorage, YearRange};

/// Errors that can occur during query processing.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Storage access failed
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Invalid query parameters
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

static STEMMER: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::English));

/// Search query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Keywords that must all match
    pub keywords: Vec<String>,

    /// Match on word stems as well as substrings
    pub fuzzy: bool,

    /// Optional publication year range filter
    pub year_range: Option<YearRange>,
}

impl SearchQuery {
    /// Create a new search query. Blank keywords are dropped.
    pub fn new(keywords: Vec<String>, fuzzy: bool, year_range: Option<YearRange>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            fuzzy,
            year_range,
        }
    }

    /// Split a comma-separated keyword list (`"kernel,fuzzing"`).
    pub fn parse_keywords(input: &str) -> Vec<String> {
        input
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

/// Lowercase words of `text`, split on anything that is not alphanumeric.
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Stemmed words of `text`.
pub fn stem_tokens(text: &str) -> Vec<String> {
    words(text).map(|w| STEMMER.stem(&w).into_owned()).collect()
}

/// Keyword matcher compiled once per query.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
    stemmed: Option<Vec<Vec<String>>>,
}

impl KeywordMatcher {
    pub fn new(query: &SearchQuery) -> Self {
        let keywords: Vec<String> = query.keywords.iter().map(|k| k.to_lowercase()).collect();
        let stemmed = query
            .fuzzy
            .then(|| keywords.iter().map(|k| stem_tokens(k)).collect());
        Self { keywords, stemmed }
    }

    /// Whether every keyword occurs in `title + " " + abstract`.
    pub fn matches(&self, paper: &Paper) -> bool {
        let text = format!("{} {}", paper.title, paper.abstract_text).to_lowercase();
        match &self.stemmed {
            None => self.keywords.iter().all(|k| text.contains(k.as_str())),
            Some(stemmed) => {
                let tokens = stem_tokens(&text);
                self.keywords
                    .iter()
                    .zip(stemmed)
                    .all(|(keyword, stems)| text.contains(keyword.as_str()) || contains_run(&tokens, stems))
            }
        }
    }
}

fn contains_run(tokens: &[String], run: &[String]) -> bool {
    !run.is_empty() && tokens.windows(run.len()).any(|window| window == run)
}

/// Sort papers newest first; within a year the more prestigious venue
/// first; then by title.
pub fn rank(papers: &mut [Paper]) {
    papers.sort_by(|a, b| {
        b.ranking_key()
            .partial_cmp(&a.ranking_key())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.title.cmp(&b.title))
    });
}

/// Trait for search engines.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Execute a search query and return ranked results.
    ///
    /// # Errors
    /// Returns `QueryError` if the search fails
    async fn search(&self, query: &SearchQuery) -> QueryResult<Vec<Paper>>;
}

/// Linear-scan keyword search over every stored paper.
pub struct KeywordSearchEngine<S>
where
    S: PaperStorage,
{
    storage: S,
}

impl<S> KeywordSearchEngine<S>
where
    S: PaperStorage,
{
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Every paper still missing an abstract, ranked like search results.
    pub async fn missing_abstracts(&self) -> QueryResult<Vec<Paper>> {
        let mut papers = self
            .storage
            .papers_missing_abstract()
            .await
            .map_err(|e| QueryError::StorageError(e.to_string()))?;
        rank(&mut papers);
        Ok(papers)
    }
}

#[async_trait]
impl<S> SearchEngine for KeywordSearchEngine<S>
where
    S: PaperStorage,
{
    async fn search(&self, query: &SearchQuery) -> QueryResult<Vec<Paper>> {
        if let Some(range) = query.year_range {
            if range.start > range.end {
                return Err(QueryError::InvalidQuery(format!(
                    "Year range {}-{} is empty",
                    range.start, range.end
                )));
            }
        }

        let papers = self
            .storage
            .get_all_papers(query.year_range)
            .await
            .map_err(|e| QueryError::StorageError(e.to_string()))?;

        let matcher = KeywordMatcher::new(query);
        let mut results: Vec<Paper> = papers.into_iter().filter(|p| matcher.matches(p)).collect();
        rank(&mut results);
        Ok(results)
    }
}
