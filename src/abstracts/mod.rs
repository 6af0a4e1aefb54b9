//! Abstract extraction from publisher sites.
//!
//! Every conference maps to one publisher family ([`Publisher`]). Each family
//! has an extractor that takes a DBLP listing fragment plus the author list,
//! follows the outbound publisher link and scrapes the abstract. Extraction
//! never fails from the caller's point of view: any error degrades to an
//! empty abstract and a warning.
//!
//! [`resolver::AbstractResolver`] ties the extractors together with the
//! Semantic Scholar fallback and is what the crawl pipeline talks to.

pub mod acm;
pub mod fallback;
mod html;
pub mod ieee;
pub mod ndss;
pub mod pets;
pub mod render;
pub mod resolver;
pub mod springer;
pub mod usenix;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fetch::{FetchError, PageFetcher, Sleeper};
use crate::models::Conference;
use render::Renderer;

pub use resolver::{AbstractResolver, AbstractSource};

/// Errors raised inside an extractor before they are degraded to "".
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The publisher page could not be fetched
    #[error("Fetch error: {0}")]
    FetchError(#[from] FetchError),

    /// The page did not have the expected structure
    #[error("Missing element: {0}")]
    MissingElement(String),

    /// The publisher link points at a host this extractor cannot handle
    #[error("Unsupported url: {0}")]
    UnsupportedUrl(String),

    /// The headless browser failed or is unreachable
    #[error("Render error: {0}")]
    RenderError(String),

    /// Rendering or fallback is not configured
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// File extensions that mark a publisher link as a document rather than a
/// landing page.
pub const DOCUMENT_EXTENSIONS: [&str; 10] = [
    "pdf", "ps", "zip", "gz", "tgz", "tar", "doc", "docx", "ppt", "pptx",
];

/// Pause after every headless-browser fetch.
pub const RENDER_COOLDOWN: Duration = Duration::from_secs(2);

static EE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("li.ee a[href]").expect("Failed to parse ee link selector"));

/// Publisher site family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Publisher {
    Ndss,
    Ieee,
    Usenix,
    Acm,
    Springer,
    Pets,
}

impl Publisher {
    /// Extractor family used for a conference.
    pub fn for_conference(conference: Conference) -> Self {
        match conference {
            Conference::Ndss => Publisher::Ndss,
            Conference::IeeeSp | Conference::IeeeEuroSp | Conference::Acsac => Publisher::Ieee,
            Conference::Usenix => Publisher::Usenix,
            Conference::Ccs | Conference::Raid | Conference::AsiaCcs => Publisher::Acm,
            Conference::Esorics => Publisher::Springer,
            Conference::Pets => Publisher::Pets,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Publisher::Ndss => "NDSS",
            Publisher::Ieee => "IEEE",
            Publisher::Usenix => "USENIX",
            Publisher::Acm => "ACM",
            Publisher::Springer => "Springer",
            Publisher::Pets => "PETS",
        }
    }
}

impl fmt::Display for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// First publisher link (`li.ee a[href]`) of a listing fragment.
pub fn publisher_url(fragment: &str) -> Option<String> {
    let html = Html::parse_fragment(fragment);
    let href = html.select(&EE_LINK).next()?.value().attr("href")?;
    let href = href.trim();
    (!href.is_empty()).then(|| href.to_string())
}

/// Whether a link points at a document or archive instead of an HTML page.
pub fn is_document_link(link: &str) -> bool {
    let path = match url::Url::parse(link) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => link.split(['?', '#']).next().unwrap_or(link).to_string(),
    };
    let Some((_, extension)) = path.rsplit_once('.') else {
        return false;
    };
    if extension.contains('/') {
        return false;
    }
    let extension = extension.to_ascii_lowercase();
    DOCUMENT_EXTENSIONS.contains(&extension.as_str())
}

/// Trait for publisher-specific abstract extractors.
///
/// Implementors only provide [`fetch_abstract`](Self::fetch_abstract); the
/// provided [`extract`](Self::extract) handles link discovery, document
/// links and error degradation.
#[async_trait]
pub trait AbstractExtractor: Send + Sync {
    /// Publisher family this extractor handles.
    fn publisher(&self) -> Publisher;

    /// Fetch the publisher page at `url` and scrape its abstract.
    ///
    /// # Errors
    /// Any fetch, render or structure failure
    async fn fetch_abstract(&self, url: &str, authors: &[String]) -> ExtractResult<String>;

    /// Resolve the abstract for a listing fragment.
    ///
    /// # Returns
    /// The abstract text, or an empty string if there is no publisher link,
    /// the link is a document, or extraction failed
    async fn extract(&self, fragment: &str, authors: &[String]) -> String {
        let Some(url) = publisher_url(fragment) else {
            debug!("No publisher link in listing fragment");
            return String::new();
        };
        if is_document_link(&url) {
            debug!("Publisher link is a document: {}", url);
            return String::new();
        }
        match self.fetch_abstract(&url, authors).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("{} abstract extraction failed for {}: {}", self.publisher(), url, e);
                String::new()
            }
        }
    }
}

/// One extractor per publisher family.
pub struct ExtractorSet {
    ndss: ndss::NdssExtractor,
    ieee: ieee::IeeeExtractor,
    usenix: usenix::UsenixExtractor,
    acm: acm::AcmExtractor,
    springer: springer::SpringerExtractor,
    pets: pets::PetsExtractor,
}

impl ExtractorSet {
    /// Build every extractor over shared collaborators.
    ///
    /// # Arguments
    /// * `fetcher` - Plain HTTP fetcher for static publisher pages
    /// * `renderer` - Headless browser for IEEE and ACM
    /// * `sleeper` - Used for the post-render cooldown
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        renderer: Arc<dyn Renderer>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            ndss: ndss::NdssExtractor::new(fetcher.clone()),
            ieee: ieee::IeeeExtractor::new(renderer.clone(), sleeper.clone()),
            usenix: usenix::UsenixExtractor::new(fetcher.clone()),
            acm: acm::AcmExtractor::new(renderer, sleeper),
            springer: springer::SpringerExtractor::new(fetcher.clone()),
            pets: pets::PetsExtractor::new(fetcher),
        }
    }

    pub fn get(&self, publisher: Publisher) -> &dyn AbstractExtractor {
        match publisher {
            Publisher::Ndss => &self.ndss,
            Publisher::Ieee => &self.ieee,
            Publisher::Usenix => &self.usenix,
            Publisher::Acm => &self.acm,
            Publisher::Springer => &self.springer,
            Publisher::Pets => &self.pets,
        }
    }

    pub fn for_conference(&self, conference: Conference) -> &dyn AbstractExtractor {
        self.get(Publisher::for_conference(conference))
    }
}
