//! NDSS symposium pages.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;

use super::html::{element_after_text, lines_text, paragraphs};
use super::{AbstractExtractor, ExtractError, ExtractResult, Publisher};
use crate::fetch::PageFetcher;

static PAPER_DATA: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.paper-data").expect("Failed to parse paper-data selector"));

/// Scrape an NDSS paper page.
///
/// Newer pages wrap the abstract in `div.paper-data` together with the
/// author line, and older pages sometimes repeat paragraphs.
pub fn parse_abstract(body: &str, authors: &[String]) -> ExtractResult<String> {
    let document = Html::parse_document(body);

    if let Some(paper_data) = document.select(&PAPER_DATA).next() {
        let first_author = authors.first().map(String::as_str);
        let mut kept: Vec<String> = Vec::new();
        for paragraph in paragraphs(paper_data) {
            if first_author.is_some_and(|author| !author.is_empty() && paragraph.contains(author)) {
                continue;
            }
            if kept.iter().any(|prev| prev.contains(paragraph.as_str())) {
                continue;
            }
            kept.push(paragraph);
        }
        return Ok(kept.join("\n"));
    }

    element_after_text(&document, "Abstract:")
        .map(lines_text)
        .ok_or_else(|| ExtractError::MissingElement("NDSS abstract".to_string()))
}

pub struct NdssExtractor {
    fetcher: Arc<dyn PageFetcher>,
}

impl NdssExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl AbstractExtractor for NdssExtractor {
    fn publisher(&self) -> Publisher {
        Publisher::Ndss
    }

    async fn fetch_abstract(&self, url: &str, authors: &[String]) -> ExtractResult<String> {
        debug!("URL: {}", url);
        let page = self.fetcher.get(url).await?.ensure_success()?;
        parse_abstract(&page.body, authors)
    }
}
