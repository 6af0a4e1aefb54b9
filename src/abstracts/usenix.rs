//! USENIX Security presentation pages.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use tracing::debug;

use super::html::{element_after_text, lines_text, text_after_heading};
use super::{AbstractExtractor, ExtractError, ExtractResult, Publisher};
use crate::fetch::PageFetcher;

/// Scrape a USENIX presentation page (current and legacy layouts).
pub fn parse_abstract(body: &str) -> ExtractResult<String> {
    let document = Html::parse_document(body);
    element_after_text(&document, "Abstract:")
        .map(lines_text)
        .or_else(|| text_after_heading(&document, "Abstract"))
        .map(|text| text.trim().to_string())
        .ok_or_else(|| ExtractError::MissingElement("USENIX abstract".to_string()))
}

pub struct UsenixExtractor {
    fetcher: Arc<dyn PageFetcher>,
}

impl UsenixExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl AbstractExtractor for UsenixExtractor {
    fn publisher(&self) -> Publisher {
        Publisher::Usenix
    }

    async fn fetch_abstract(&self, url: &str, _authors: &[String]) -> ExtractResult<String> {
        debug!("URL: {}", url);
        let page = self.fetcher.get(url).await?.ensure_success()?;
        parse_abstract(&page.body)
    }
}
