//! Abstract resolution: publisher extractor first, title search second.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::fallback::{FallbackSource, FALLBACK_SPACING};
use super::ExtractorSet;
use crate::fetch::{RateLimit, Sleeper};
use crate::models::Conference;
use crate::provider::ListingEntry;

/// Anything that can produce an abstract for a listing entry.
///
/// Never fails: an abstract that cannot be found is an empty string.
#[async_trait]
pub trait AbstractSource: Send + Sync {
    async fn resolve(&self, conference: Conference, entry: &ListingEntry) -> String;
}

/// Production [`AbstractSource`].
pub struct AbstractResolver {
    extractors: ExtractorSet,
    fallback: Option<Box<dyn FallbackSource>>,
    rate_limit: RateLimit,
    sleeper: Arc<dyn Sleeper>,
}

impl AbstractResolver {
    pub fn new(extractors: ExtractorSet, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            extractors,
            fallback: None,
            rate_limit: RateLimit::new(FALLBACK_SPACING),
            sleeper,
        }
    }

    /// Enable the title-search fallback.
    pub fn with_fallback(mut self, fallback: Box<dyn FallbackSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    async fn from_fallback(&self, fallback: &dyn FallbackSource, title: &str) -> String {
        let result = fallback.find_abstract(title).await;
        self.rate_limit.pause(self.sleeper.as_ref()).await;
        match result {
            Ok(Some(text)) => {
                debug!("Fallback found abstract for '{}'", title);
                text
            }
            Ok(None) => String::new(),
            Err(e) => {
                warn!("Fallback lookup failed for '{}': {}", title, e);
                String::new()
            }
        }
    }
}

#[async_trait]
impl AbstractSource for AbstractResolver {
    async fn resolve(&self, conference: Conference, entry: &ListingEntry) -> String {
        let extractor = self.extractors.for_conference(conference);
        let text = extractor.extract(&entry.fragment, &entry.authors).await;
        if !text.is_empty() {
            return text;
        }

        match &self.fallback {
            Some(fallback) => self.from_fallback(fallback.as_ref(), &entry.title).await,
            None => {
                debug!("No abstract for '{}' ({} {})", entry.title, conference, extractor.publisher());
                String::new()
            }
        }
    }
}
