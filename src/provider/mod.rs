//! Listing provider module.
//!
//! This module defines the interface for sourcing per-conference, per-year
//! listing pages and turning them into paper entries. The crawl pipeline
//! only depends on the [`ListingProvider`] trait; [`dblp::DblpProvider`] is
//! the implementation used in production.

use async_trait::async_trait;
use thiserror::Error;

use crate::fetch::FetchError;
use crate::models::Conference;

pub mod dblp;

/// Errors that can occur when fetching listings from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The listing page could not be fetched
    #[error("Fetch error: {0}")]
    FetchError(#[from] FetchError),

    /// The listing page could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// One paper entry parsed from a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub title: String,

    /// Authors in listing order
    pub authors: Vec<String>,

    /// Outbound publisher link, if the entry has one
    pub publisher_url: Option<String>,

    /// Raw HTML of the entry, handed to the abstract extractors
    pub fragment: String,
}

/// Trait for sourcing listing pages.
///
/// # Design Notes
///
/// - A conference-year may map to several listing pages (split volumes,
///   renamed venues); `listing_ids` returns all of them.
/// - A missing page is not an error: `fetch_listing` returns `Ok(None)` so
///   the pipeline can skip it with a warning.
#[async_trait]
pub trait ListingProvider: Send + Sync {
    /// Listing-page identifiers for one conference-year.
    fn listing_ids(&self, conference: Conference, year: i32) -> Vec<String>;

    /// Fetch and parse one listing page.
    ///
    /// # Returns
    /// `None` if the page does not exist (HTTP 404), otherwise every entry
    /// on the page in order
    ///
    /// # Errors
    /// Returns `ProviderError` for any other non-success status, network
    /// failure or unparsable page
    async fn fetch_listing(&self, listing_id: &str) -> ProviderResult<Option<Vec<ListingEntry>>>;

    /// Human-readable name, used in logs.
    fn name(&self) -> &str;
}
