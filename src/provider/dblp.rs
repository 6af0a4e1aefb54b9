//! DBLP listing provider.
//!
//! DBLP publishes one HTML table of contents per proceedings volume. Each
//! paper is an `li.entry` carrying the title in `span.title`, the authors
//! in `span[itemprop=author]` and outbound links under `li.ee`.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{ListingEntry, ListingProvider, ProviderError, ProviderResult};
use crate::fetch::PageFetcher;
use crate::models::Conference;

/// Root of the DBLP table-of-contents tree.
pub const DBLP_BASE_URL: &str = "https://dblp.org/db";

/// First year ESORICS proceedings are split into numbered volumes.
const ESORICS_SPLIT_YEAR: i32 = 2015;

/// Highest ESORICS volume number probed; missing volumes come back as 404.
const ESORICS_MAX_VOLUMES: u32 = 4;

/// First year PETS is published as the PoPETs journal.
const POPETS_FIRST_YEAR: i32 = 2015;

struct DblpSelectors {
    entry: Selector,
    title: Selector,
    author: Selector,
    ee_link: Selector,
}

static SELECTORS: Lazy<DblpSelectors> = Lazy::new(|| DblpSelectors {
    entry: Selector::parse("li.inproceedings, li.article")
        .expect("Failed to parse entry selector"),
    title: Selector::parse("span.title").expect("Failed to parse title selector"),
    author: Selector::parse(r#"span[itemprop="author"]"#)
        .expect("Failed to parse author selector"),
    ee_link: Selector::parse("li.ee a[href]").expect("Failed to parse ee link selector"),
});

/// Listing paths (relative to [`DBLP_BASE_URL`]) for one conference-year.
pub fn listing_paths(conference: Conference, year: i32) -> Vec<String> {
    let simple = |key: &str| vec![format!("conf/{key}/{key}{year}.html")];
    match conference {
        Conference::Ndss => simple("ndss"),
        Conference::IeeeSp => simple("sp"),
        Conference::Usenix => simple("uss"),
        Conference::Ccs => simple("ccs"),
        Conference::IeeeEuroSp => simple("eurosp"),
        Conference::Raid => simple("raid"),
        Conference::Acsac => simple("acsac"),
        Conference::AsiaCcs => vec![format!("conf/ccs/asiaccs{year}.html")],
        Conference::Esorics if year >= ESORICS_SPLIT_YEAR => (1..=ESORICS_MAX_VOLUMES)
            .map(|volume| format!("conf/esorics/esorics{year}-{volume}.html"))
            .collect(),
        Conference::Esorics => simple("esorics"),
        Conference::Pets if year >= POPETS_FIRST_YEAR => {
            vec![format!("journals/popets/popets{year}.html")]
        }
        Conference::Pets => simple("pet"),
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_entry(element: ElementRef<'_>) -> Option<ListingEntry> {
    let title = element
        .select(&SELECTORS.title)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())?;

    let authors = element
        .select(&SELECTORS.author)
        .map(element_text)
        .filter(|a| !a.is_empty())
        .collect();

    let publisher_url = element
        .select(&SELECTORS.ee_link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string);

    Some(ListingEntry {
        title,
        authors,
        publisher_url,
        fragment: element.html(),
    })
}

/// Parse every paper entry on a DBLP listing page, in page order.
pub fn parse_listing(html: &str) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    document
        .select(&SELECTORS.entry)
        .filter_map(|element| {
            let entry = parse_entry(element);
            if entry.is_none() {
                debug!("Skipping listing entry without a title");
            }
            entry
        })
        .collect()
}

/// Listing provider backed by dblp.org.
pub struct DblpProvider {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
}

impl DblpProvider {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self::with_base_url(fetcher, DBLP_BASE_URL)
    }

    /// Point the provider at a mirror (or a local test server).
    pub fn with_base_url(fetcher: Arc<dyn PageFetcher>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn listing_url(&self, listing_id: &str) -> String {
        format!("{}/{}", self.base_url, listing_id.trim_start_matches('/'))
    }
}

#[async_trait]
impl ListingProvider for DblpProvider {
    fn listing_ids(&self, conference: Conference, year: i32) -> Vec<String> {
        listing_paths(conference, year)
    }

    async fn fetch_listing(&self, listing_id: &str) -> ProviderResult<Option<Vec<ListingEntry>>> {
        let url = self.listing_url(listing_id);
        let page = self.fetcher.get(&url).await?;
        if page.status == 404 {
            return Ok(None);
        }
        let page = page.ensure_success().map_err(ProviderError::from)?;
        Ok(Some(parse_listing(&page.body)))
    }

    fn name(&self) -> &str {
        "dblp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
<html><body>
<ul class="publ-list">
  <li class="entry editor toc" id="conf/ccs/2023">
    <cite class="data"><span class="title">Proceedings of CCS 2023.</span></cite>
  </li>
  <li class="entry inproceedings" id="conf/ccs/Alice23">
    <nav class="publ"><ul>
      <li class="drop-down"><div class="head"><a href="https://doi.org/10.1145/3576915.3616615"><img alt=""></a></div></li>
      <li class="ee"><a href="https://doi.org/10.1145/3576915.3616615" itemprop="url">view</a></li>
    </ul></nav>
    <cite class="data" itemprop="headline">
      <span itemprop="author" itemscope><a href="https://dblp.org/pid/1"><span itemprop="name">Alice Smith</span></a></span>,
      <span itemprop="author" itemscope><a href="https://dblp.org/pid/2"><span itemprop="name">Bob Jones</span></a></span>:
      <span class="title" itemprop="name">Exploiting the   Kernel.</span>
    </cite>
  </li>
  <li class="entry inproceedings" id="conf/ccs/Carol23">
    <cite class="data">
      <span itemprop="author" itemscope><span itemprop="name">Carol White</span></span>:
      <span class="title" itemprop="name">No Links Here.</span>
    </cite>
  </li>
  <li class="entry inproceedings" id="conf/ccs/Broken23">
    <cite class="data"><span itemprop="author"><span itemprop="name">Nobody</span></span></cite>
  </li>
</ul>
</body></html>"#;

    #[test]
    fn test_parse_listing_entries() {
        let entries = parse_listing(LISTING);
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.title, "Exploiting the Kernel.");
        assert_eq!(first.authors, vec!["Alice Smith", "Bob Jones"]);
        assert_eq!(
            first.publisher_url.as_deref(),
            Some("https://doi.org/10.1145/3576915.3616615")
        );
        assert!(first.fragment.contains("class=\"ee\""));

        let second = &entries[1];
        assert_eq!(second.title, "No Links Here.");
        assert_eq!(second.authors, vec!["Carol White"]);
        assert!(second.publisher_url.is_none());
    }

    #[test]
    fn test_listing_paths_simple_and_aliased() {
        assert_eq!(listing_paths(Conference::Ndss, 2020), vec!["conf/ndss/ndss2020.html"]);
        assert_eq!(listing_paths(Conference::IeeeSp, 2019), vec!["conf/sp/sp2019.html"]);
        assert_eq!(listing_paths(Conference::Usenix, 2021), vec!["conf/uss/uss2021.html"]);
        assert_eq!(listing_paths(Conference::AsiaCcs, 2018), vec!["conf/ccs/asiaccs2018.html"]);
    }

    #[test]
    fn test_listing_paths_year_dependent() {
        assert_eq!(listing_paths(Conference::Esorics, 2010), vec!["conf/esorics/esorics2010.html"]);
        let volumes = listing_paths(Conference::Esorics, 2023);
        assert_eq!(volumes.len(), 4);
        assert_eq!(volumes[0], "conf/esorics/esorics2023-1.html");
        assert_eq!(volumes[3], "conf/esorics/esorics2023-4.html");

        assert_eq!(listing_paths(Conference::Pets, 2010), vec!["conf/pet/pet2010.html"]);
        assert_eq!(listing_paths(Conference::Pets, 2022), vec!["journals/popets/popets2022.html"]);
    }
}
