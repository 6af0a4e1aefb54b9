//! Springer chapter pages (ESORICS, early PETS).

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;

use super::html::paragraphs;
use super::{AbstractExtractor, ExtractError, ExtractResult, Publisher};
use crate::fetch::PageFetcher;

static ABSTRACT_SECTION: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"section[data-title="Abstract"]"#)
        .expect("Failed to parse abstract section selector")
});

/// Paragraphs of the `Abstract` section, joined with newlines.
pub fn parse_abstract(body: &str) -> ExtractResult<String> {
    let document = Html::parse_document(body);
    let section = document
        .select(&ABSTRACT_SECTION)
        .next()
        .ok_or_else(|| ExtractError::MissingElement("Springer abstract section".to_string()))?;
    Ok(paragraphs(section).join("\n"))
}

pub struct SpringerExtractor {
    fetcher: Arc<dyn PageFetcher>,
}

impl SpringerExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl AbstractExtractor for SpringerExtractor {
    fn publisher(&self) -> Publisher {
        Publisher::Springer
    }

    async fn fetch_abstract(&self, url: &str, _authors: &[String]) -> ExtractResult<String> {
        debug!("URL: {}", url);
        let page = self.fetcher.get(url).await?.ensure_success()?;
        parse_abstract(&page.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abstract_section() {
        let body = r#"
            <section data-title="Abstract"><h2>Abstract</h2>
              <div class="c-article-section__content"><p>Side channels leak.</p><p> </p><p>We fix them.</p></div>
            </section>
            <section data-title="Introduction"><p>Not this.</p></section>"#;
        assert_eq!(parse_abstract(body).unwrap(), "Side channels leak.\nWe fix them.");
    }

    #[test]
    fn test_missing_section() {
        assert!(parse_abstract("<section data-title=\"Intro\"><p>x</p></section>").is_err());
    }
}
