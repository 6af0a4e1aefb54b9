//! Storage layer abstraction and implementations.
//!
//! This module defines the interface for persisting and retrieving paper
//! records. Records are keyed logically by `(conference, year, title)`; the
//! crawl pipeline relies on that key for deduplication and the query engine
//! reads the whole table back.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Conference, Paper};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query execution failed: {0}")]
    QueryError(String),

    /// Stored data could not be mapped back to a record
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Schema creation error
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Inclusive year range.
///
/// Used both for the crawl year loop and as a query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    /// Start year (inclusive)
    pub start: i32,

    /// End year (inclusive)
    pub end: i32,
}

impl YearRange {
    /// Create a new year range.
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Check if a year falls within this range.
    pub fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }

    /// Iterate over every year in the range, oldest first.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }
}

/// Trait for paper storage backends.
///
/// Every method is a self-contained unit of work: each write commits on its
/// own, so an interrupted crawl keeps everything written before the
/// interruption.
#[async_trait]
pub trait PaperStorage: Send + Sync {
    /// Create the table and index if missing. Idempotent.
    async fn initialize(&mut self) -> StorageResult<()>;

    /// Insert a new record and return its assigned id.
    ///
    /// No uniqueness check happens here; callers look the key up first.
    async fn insert_paper(&mut self, paper: &Paper) -> StorageResult<i64>;

    /// Look up the record for a `(conference, year, title)` key.
    async fn find_paper(
        &self,
        conference: Conference,
        year: i32,
        title: &str,
    ) -> StorageResult<Option<Paper>>;

    /// Overwrite the abstract of an existing record.
    ///
    /// # Errors
    /// Returns `StorageError::NotFound` if no row has this id
    async fn update_abstract(&mut self, id: i64, abstract_text: &str) -> StorageResult<()>;

    /// Overwrite the publisher url of an existing record.
    ///
    /// # Errors
    /// Returns `StorageError::NotFound` if no row has this id
    async fn update_url(&mut self, id: i64, url: &str) -> StorageResult<()>;

    /// Retrieve all papers, optionally restricted to a year range.
    async fn get_all_papers(&self, year_range: Option<YearRange>) -> StorageResult<Vec<Paper>>;

    /// All papers whose abstract is still empty.
    async fn papers_missing_abstract(&self) -> StorageResult<Vec<Paper>>;

    /// Distinct years (ascending) in which `conference` has at least one
    /// paper with an empty abstract. Drives backfill mode.
    async fn years_missing_abstract(&self, conference: Conference) -> StorageResult<Vec<i32>>;

    /// Get the total count of papers in storage.
    async fn count_papers(&self) -> StorageResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_range_is_inclusive() {
        let crawl = YearRange::new(2015, 2017);
        for year in [2015, 2016, 2017] {
            assert!(crawl.contains(year), "{year} should be inside");
        }
        assert!(!crawl.contains(2014));
        assert!(!crawl.contains(2018));
        assert!(YearRange::new(2021, 2021).contains(2021));
    }

    #[test]
    fn test_year_range_iteration() {
        let years: Vec<i32> = YearRange::new(2000, 2003).years().collect();
        assert_eq!(years, vec![2000, 2001, 2002, 2003]);
        assert_eq!(YearRange::new(2005, 2004).years().count(), 0);
    }
}
