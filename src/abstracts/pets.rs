//! PETS / PoPETs pages.
//!
//! DOIs from the Springer era redirect to springer.com; everything later
//! lands on petsymposium.org, where the abstract is a single paragraph
//! starting with `Abstract:`.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use tracing::debug;

use super::html::{ancestor_of_text, trimmed_text};
use super::{springer, AbstractExtractor, ExtractError, ExtractResult, Publisher};
use crate::fetch::PageFetcher;

const MARKER: &str = "Abstract:";

fn is_springer(final_url: &str) -> bool {
    url::Url::parse(final_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == "springer.com" || h.ends_with(".springer.com")))
        .unwrap_or(false)
}

/// Scrape a petsymposium.org paper page.
pub fn parse_abstract(body: &str) -> ExtractResult<String> {
    let document = Html::parse_document(body);
    let paragraph = ancestor_of_text(&document, MARKER, "p")
        .ok_or_else(|| ExtractError::MissingElement("PETS abstract paragraph".to_string()))?;
    let text = trimmed_text(paragraph);
    let text = text.strip_prefix(MARKER).unwrap_or(&text);
    Ok(text.trim().to_string())
}

pub struct PetsExtractor {
    fetcher: Arc<dyn PageFetcher>,
}

impl PetsExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl AbstractExtractor for PetsExtractor {
    fn publisher(&self) -> Publisher {
        Publisher::Pets
    }

    async fn fetch_abstract(&self, url: &str, _authors: &[String]) -> ExtractResult<String> {
        debug!("URL: {}", url);
        let page = self.fetcher.get(url).await?.ensure_success()?;
        if is_springer(&page.url) {
            return springer::parse_abstract(&page.body);
        }
        parse_abstract(&page.body)
    }
}
