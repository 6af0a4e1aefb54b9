//! Semantic Scholar title search, used when a publisher page yields nothing.
//!
//! The search is fuzzy on the service side, so a candidate is only accepted
//! when its normalized title equals the normalized query title.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::ExtractResult;
use crate::fetch::{retry_with_backoff, FetchError, FetchResult, RetryPolicy, Sleeper, USER_AGENT};

/// Public Semantic Scholar API root.
pub const SEMANTIC_SCHOLAR_URL: &str = "https://api.semanticscholar.org";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "SEMANTIC_SCHOLAR_API_KEY";

/// Minimum spacing between two fallback calls.
pub const FALLBACK_SPACING: Duration = Duration::from_millis(1100);

const SEARCH_PATH: &str = "/graph/v1/paper/search";
const SEARCH_FIELDS: &str = "title,year,venue,abstract";

/// Lowercase a title and drop every non-word character (whitespace
/// included), so punctuation and spacing differences compare equal.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub year: Option<i32>,

    #[serde(default)]
    pub venue: Option<String>,

    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: u64,

    #[serde(default)]
    data: Vec<Candidate>,
}

/// First candidate whose normalized title equals the normalized `title`.
pub fn select_match<'a>(title: &str, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    let wanted = normalize_title(title);
    candidates.iter().find(|c| normalize_title(&c.title) == wanted)
}

/// Trait for secondary abstract sources keyed by title.
#[async_trait]
pub trait FallbackSource: Send + Sync {
    /// Look up an abstract by paper title.
    ///
    /// # Returns
    /// `None` when nothing matched confidently or the match has no abstract
    async fn find_abstract(&self, title: &str) -> ExtractResult<Option<String>>;
}

/// Semantic Scholar Graph API client.
pub struct SemanticScholarClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl SemanticScholarClient {
    pub fn new(api_key: impl Into<String>, sleeper: Arc<dyn Sleeper>) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: SEMANTIC_SCHOLAR_URL.to_string(),
            api_key: api_key.into(),
            retry: RetryPolicy::default(),
            sleeper,
        })
    }

    /// Build a client from `SEMANTIC_SCHOLAR_API_KEY`.
    ///
    /// # Returns
    /// `Ok(None)` when the variable is unset or blank
    pub fn from_env(sleeper: Arc<dyn Sleeper>) -> FetchResult<Option<Self>> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Self::new(key.trim(), sleeper).map(Some),
            _ => Ok(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn search_once(&self, title: &str) -> FetchResult<SearchResponse> {
        let url = format!("{}{}", self.base_url, SEARCH_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[("query", title), ("fields", SEARCH_FIELDS)])
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| FetchError::NetworkError(format!("{url}: {e}")))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(FetchError::StatusError { url, status });
        }
        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| FetchError::DecodeError(format!("Semantic Scholar response: {e}")))
    }

    /// Search by title with backoff on throttling and server errors.
    pub async fn search(&self, title: &str) -> FetchResult<Vec<Candidate>> {
        let response =
            retry_with_backoff(&self.retry, self.sleeper.as_ref(), || self.search_once(title)).await?;
        debug!("Semantic Scholar returned {} of {} hits for '{}'", response.data.len(), response.total, title);
        Ok(response.data)
    }
}

#[async_trait]
impl FallbackSource for SemanticScholarClient {
    async fn find_abstract(&self, title: &str) -> ExtractResult<Option<String>> {
        let candidates = self.search(title).await?;
        if candidates.is_empty() {
            warn!("Semantic Scholar has no results for '{}'", title);
            return Ok(None);
        }

        match select_match(title, &candidates) {
            Some(candidate) => Ok(candidate
                .abstract_text
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)),
            None => {
                let listed: Vec<&str> = candidates.iter().map(|c| c.title.as_str()).collect();
                warn!(
                    "No exact Semantic Scholar match for '{}'; candidates: {:?}",
                    title, listed
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstracts::test_support::RecordingSleeper;
    use crate::abstracts::ExtractError;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client(server: &Server, sleeper: &RecordingSleeper) -> SemanticScholarClient {
        SemanticScholarClient::new("test-key", Arc::new(sleeper.clone()))
            .unwrap()
            .with_base_url(server.url())
    }

    #[test]
    fn test_new_builds_client_for_public_api() {
        let sleeper = RecordingSleeper::default();
        let client = SemanticScholarClient::new("key", Arc::new(sleeper)).unwrap();
        assert_eq!(client.base_url(), SEMANTIC_SCHOLAR_URL);

        let local = client.with_base_url("http://127.0.0.1:1234/");
        assert_eq!(local.base_url(), "http://127.0.0.1:1234");
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("Attacking the Kernel!"), normalize_title("attacking the kernel"));
        assert_eq!(normalize_title("SoK: Side-Channels (2023)"), "soksidechannels2023");
        let once = normalize_title("A  B.c");
        assert_eq!(normalize_title(&once), once);
    }

    #[test]
    fn test_select_match_takes_first_exact() {
        let candidates = vec![
            Candidate {
                title: "Attacking the Kernel, Revisited".into(),
                year: Some(2021),
                venue: None,
                abstract_text: Some("wrong".into()),
            },
            Candidate {
                title: "Attacking the kernel.".into(),
                year: Some(2020),
                venue: Some("CCS".into()),
                abstract_text: Some("right".into()),
            },
        ];
        let matched = select_match("Attacking the Kernel!", &candidates).unwrap();
        assert_eq!(matched.abstract_text.as_deref(), Some("right"));
        assert!(select_match("Something else", &candidates).is_none());
    }

    #[tokio::test]
    async fn test_zero_results_makes_one_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::UrlEncoded("query".into(), "Attacking the Kernel".into()))
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"total": 0, "offset": 0, "data": []}).to_string())
            .expect(1)
            .create_async()
            .await;

        let sleeper = RecordingSleeper::default();
        let result = client(&server, &sleeper).find_abstract("Attacking the Kernel").await.unwrap();

        assert!(result.is_none());
        mock.assert_async().await;
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exact_match_returns_abstract() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "total": 2,
                    "data": [
                        {"paperId": "a", "title": "Unrelated", "year": 2019, "venue": "", "abstract": "no"},
                        {"paperId": "b", "title": "attacking the kernel", "year": 2020, "venue": "CCS", "abstract": "Kernel abstract."}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let sleeper = RecordingSleeper::default();
        let result = client(&server, &sleeper).find_abstract("Attacking the Kernel!").await.unwrap();
        assert_eq!(result.as_deref(), Some("Kernel abstract."));
    }

    #[tokio::test]
    async fn test_matched_paper_without_abstract() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"total": 1, "data": [{"title": "T", "abstract": null}]}).to_string())
            .create_async()
            .await;

        let sleeper = RecordingSleeper::default();
        assert!(client(&server, &sleeper).find_abstract("T").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_throttling_is_retried_with_backoff() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let result = client(&server, &sleeper)
            .with_retry_policy(policy)
            .find_abstract("T")
            .await;

        match result {
            Err(ExtractError::FetchError(e)) => assert_eq!(e.status(), Some(429)),
            other => panic!("Expected throttling error, got {other:?}"),
        }
        mock.assert_async().await;
        assert_eq!(
            *sleeper.slept.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }
}
