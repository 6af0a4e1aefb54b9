//! HTTP plumbing shared by the listing provider, the publisher extractors
//! and the fallback resolver.
//!
//! Everything that touches the network goes through [`PageFetcher`], and
//! everything that waits goes through [`Sleeper`], so tests can run the
//! crawl against canned pages without real delays.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("confgrep/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS or timeout failure
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The server answered with an unexpected status
    #[error("HTTP {status} from {url}")]
    StatusError { url: String, status: u16 },

    /// The body could not be read or decoded
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// The client could not be built
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl FetchError {
    /// Status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::StatusError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// A fetched page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Response body as text
    pub body: String,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx page into a `StatusError`.
    pub fn ensure_success(self) -> FetchResult<Page> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::StatusError {
                url: self.url,
                status: self.status,
            })
        }
    }
}

/// Trait for plain HTTP page retrieval.
///
/// Implementations return the page for any status code; deciding what a
/// 404 means is up to the caller.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get(&self, url: &str) -> FetchResult<Page>;
}

/// reqwest-backed page fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the crate user agent and a request timeout.
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> FetchResult<Page> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::NetworkError(format!("{url}: {e}")))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::DecodeError(format!("{url}: {e}")))?;
        Ok(Page {
            url: final_url,
            status,
            body,
        })
    }
}

/// Something that can pause the current task.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Capped exponential backoff configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles for every further attempt
    pub base_delay: Duration,

    /// Upper bound for a single delay
    pub max_delay: Duration,

    /// Response statuses worth another attempt
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retry_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether an error is transient under this policy.
    pub fn is_retryable(&self, error: &FetchError) -> bool {
        match error {
            FetchError::NetworkError(_) => true,
            FetchError::StatusError { status, .. } => self.retry_statuses.contains(status),
            FetchError::DecodeError(_) | FetchError::ConfigError(_) => false,
        }
    }
}

/// Minimum spacing enforced after every call to a rate-limited service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    pub min_interval: Duration,
}

impl RateLimit {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval }
    }

    /// Pause for the configured interval.
    pub async fn pause(&self, sleeper: &dyn Sleeper) {
        sleeper.sleep(self.min_interval).await;
    }
}

/// Execute an operation with capped exponential backoff.
///
/// Only errors the policy classifies as retryable trigger another attempt;
/// the last error is returned once attempts run out.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> FetchResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = FetchResult<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < attempts && policy.is_retryable(&e) => {
                let delay = policy.delay_for(attempt);
                debug!("Attempt {} failed ({}), retrying in {:?}", attempt + 1, e, delay);
                sleeper.sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
