//! IEEE pages (S&P, EuroS&P, ACSAC).
//!
//! DBLP links IEEE papers either through the Computer Society digital
//! library or through a DOI that resolves to IEEE Xplore. Both need a
//! rendered page.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::render::{render_with_cooldown, RenderPlan, Renderer};
use super::{AbstractExtractor, ExtractError, ExtractResult, Publisher, RENDER_COOLDOWN};
use crate::fetch::Sleeper;

const COMPUTER_SOCIETY_HOST: &str = "doi.ieeecomputersociety.org";
const XPLORE_HOSTS: [&str; 2] = ["doi.org", "ieeexplore.ieee.org"];

const COMPUTER_SOCIETY_WAIT: Duration = Duration::from_secs(3);
const XPLORE_WAIT: Duration = Duration::from_secs(2);

const XPLORE_PREFIX: &str = "Abstract:\n";
const XPLORE_SUFFIX: &str = "\n(Show Less)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IeeeSite {
    ComputerSociety,
    Xplore,
}

impl IeeeSite {
    /// Site behind a publisher link, by host.
    pub fn for_url(link: &str) -> ExtractResult<Self> {
        let parsed = url::Url::parse(link).map_err(|_| ExtractError::UnsupportedUrl(link.to_string()))?;
        match parsed.host_str() {
            Some(COMPUTER_SOCIETY_HOST) => Ok(IeeeSite::ComputerSociety),
            Some(host) if XPLORE_HOSTS.contains(&host) => Ok(IeeeSite::Xplore),
            _ => Err(ExtractError::UnsupportedUrl(link.to_string())),
        }
    }

    pub fn plan(&self, url: &str) -> RenderPlan {
        match self {
            IeeeSite::ComputerSociety => {
                RenderPlan::new(url, "article", COMPUTER_SOCIETY_WAIT, "article .article-content")
            }
            IeeeSite::Xplore => RenderPlan::new(url, ".abstract-text", XPLORE_WAIT, ".abstract-text")
                .with_expand(".abstract-text-view-all"),
        }
    }
}

/// Cut the Xplore abstract box down to the abstract itself.
pub fn clean_xplore_text(text: &str) -> String {
    let text = match text.find(XPLORE_PREFIX) {
        Some(start) => &text[start + XPLORE_PREFIX.len()..],
        None => text,
    };
    let text = match text.find(XPLORE_SUFFIX) {
        Some(end) => &text[..end],
        None => text,
    };
    text.trim().to_string()
}

pub struct IeeeExtractor {
    renderer: Arc<dyn Renderer>,
    sleeper: Arc<dyn Sleeper>,
}

impl IeeeExtractor {
    pub fn new(renderer: Arc<dyn Renderer>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { renderer, sleeper }
    }
}

#[async_trait]
impl AbstractExtractor for IeeeExtractor {
    fn publisher(&self) -> Publisher {
        Publisher::Ieee
    }

    async fn fetch_abstract(&self, url: &str, _authors: &[String]) -> ExtractResult<String> {
        // The cooldown follows every IEEE link, rendered or not.
        let site = match IeeeSite::for_url(url) {
            Ok(site) => site,
            Err(e) => {
                self.sleeper.sleep(RENDER_COOLDOWN).await;
                return Err(e);
            }
        };
        let plan = site.plan(url);
        let text =
            render_with_cooldown(self.renderer.as_ref(), self.sleeper.as_ref(), RENDER_COOLDOWN, &plan)
                .await?;
        Ok(match site {
            IeeeSite::ComputerSociety => text.trim().to_string(),
            IeeeSite::Xplore => clean_xplore_text(&text),
        })
    }
}
