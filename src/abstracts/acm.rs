//! ACM Digital Library pages (CCS, RAID, AsiaCCS).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::render::{render_with_cooldown, RenderPlan, Renderer};
use super::{AbstractExtractor, ExtractResult, Publisher, RENDER_COOLDOWN};
use crate::fetch::Sleeper;

const ARTICLE_WAIT: Duration = Duration::from_secs(3);
const NO_ABSTRACT: &str = "No abstract available.";

/// Strip the section heading; the DL placeholder text counts as missing.
pub fn clean_text(text: &str) -> String {
    let text = text.trim();
    let text = text.strip_prefix("Abstract").unwrap_or(text).trim();
    if text == NO_ABSTRACT {
        return String::new();
    }
    text.to_string()
}

pub struct AcmExtractor {
    renderer: Arc<dyn Renderer>,
    sleeper: Arc<dyn Sleeper>,
}

impl AcmExtractor {
    pub fn new(renderer: Arc<dyn Renderer>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { renderer, sleeper }
    }
}

#[async_trait]
impl AbstractExtractor for AcmExtractor {
    fn publisher(&self) -> Publisher {
        Publisher::Acm
    }

    async fn fetch_abstract(&self, url: &str, _authors: &[String]) -> ExtractResult<String> {
        let plan = RenderPlan::new(url, "article", ARTICLE_WAIT, "article #abstract");
        let text =
            render_with_cooldown(self.renderer.as_ref(), self.sleeper.as_ref(), RENDER_COOLDOWN, &plan)
                .await?;
        Ok(clean_text(&text))
    }
}
