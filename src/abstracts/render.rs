//! Headless-browser rendering for script-heavy publisher pages.
//!
//! IEEE Xplore, the IEEE Computer Society digital library and the ACM DL
//! only show the abstract after client-side scripts run. The extractors
//! describe what they need as a [`RenderPlan`] and hand it to a
//! [`Renderer`]. [`WebDriverRenderer`] drives any W3C WebDriver endpoint
//! (chromedriver, geckodriver) over plain HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ExtractError, ExtractResult};
use crate::fetch::Sleeper;

/// Default chromedriver endpoint.
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Key under which WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// What to do with a page once it is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub url: String,

    /// CSS selector that must appear before anything is read
    pub wait_for: String,

    /// How long to wait for `wait_for`
    pub timeout: Duration,

    /// Optional "show more" control to click once the page is ready
    pub expand: Option<String>,

    /// CSS selector whose visible text is returned
    pub extract: String,
}

impl RenderPlan {
    pub fn new(url: impl Into<String>, wait_for: &str, timeout: Duration, extract: &str) -> Self {
        Self {
            url: url.into(),
            wait_for: wait_for.to_string(),
            timeout,
            expand: None,
            extract: extract.to_string(),
        }
    }

    pub fn with_expand(mut self, selector: &str) -> Self {
        self.expand = Some(selector.to_string());
        self
    }
}

/// Trait for headless page renderers.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Load `plan.url`, wait for the page to settle and return the visible
    /// text of `plan.extract`.
    ///
    /// # Errors
    /// Returns `ExtractError::RenderError` if the browser is unreachable,
    /// the wait times out or the extract element is missing
    async fn render(&self, plan: &RenderPlan) -> ExtractResult<String>;
}

/// Renderer used when no browser is available; every render fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRenderer;

#[async_trait]
impl Renderer for DisabledRenderer {
    async fn render(&self, plan: &RenderPlan) -> ExtractResult<String> {
        Err(ExtractError::ConfigError(format!(
            "No WebDriver endpoint configured, cannot render {}",
            plan.url
        )))
    }
}

/// Render a plan and then pause for `cooldown`, whether or not rendering
/// succeeded.
pub async fn render_with_cooldown(
    renderer: &dyn Renderer,
    sleeper: &dyn Sleeper,
    cooldown: Duration,
    plan: &RenderPlan,
) -> ExtractResult<String> {
    let result = renderer.render(plan).await;
    sleeper.sleep(cooldown).await;
    result
}

/// W3C WebDriver client.
///
/// A fresh browser session is created for every render and deleted
/// afterwards, including on failure.
#[derive(Debug, Clone)]
pub struct WebDriverRenderer {
    client: reqwest::Client,
    endpoint: String,
    headless: bool,
}

impl WebDriverRenderer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            headless: true,
        }
    }

    /// Show the browser window (useful when debugging selectors).
    pub fn headed(mut self) -> Self {
        self.headless = false;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn capabilities(&self) -> Value {
        let mut args = vec!["--disable-gpu", "--window-size=1280,1024"];
        if self.headless {
            args.push("--headless=new");
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }

    /// Send one WebDriver command and return its `value`, or `None` for a
    /// "no such element" answer.
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> ExtractResult<Option<Value>> {
        let url = format!("{}{}", self.endpoint, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ExtractError::RenderError(format!("WebDriver unreachable at {url}: {e}")))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ExtractError::RenderError(format!("Invalid WebDriver response from {url}: {e}")))?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(Some(value));
        }
        let error = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
        if error == "no such element" {
            return Ok(None);
        }
        let message = value.get("message").and_then(Value::as_str).unwrap_or("");
        Err(ExtractError::RenderError(format!("WebDriver {error}: {message}")))
    }

    async fn new_session(&self) -> ExtractResult<String> {
        let value = self
            .command(Method::POST, "/session", Some(self.capabilities()))
            .await?
            .unwrap_or(Value::Null);
        value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ExtractError::RenderError("WebDriver did not return a session id".to_string()))
    }

    async fn delete_session(&self, session: &str) {
        if let Err(e) = self
            .command(Method::DELETE, &format!("/session/{session}"), None)
            .await
        {
            warn!("Failed to close WebDriver session {}: {}", session, e);
        }
    }

    async fn set_implicit_wait(&self, session: &str, wait: Duration) -> ExtractResult<()> {
        self.command(
            Method::POST,
            &format!("/session/{session}/timeouts"),
            Some(json!({ "implicit": wait.as_millis() as u64 })),
        )
        .await?;
        Ok(())
    }

    async fn find_element(&self, session: &str, selector: &str) -> ExtractResult<Option<String>> {
        let value = self
            .command(
                Method::POST,
                &format!("/session/{session}/element"),
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;
        Ok(value.and_then(|v| v.get(ELEMENT_KEY).and_then(Value::as_str).map(str::to_string)))
    }

    async fn element_text(&self, session: &str, element: &str) -> ExtractResult<String> {
        let value = self
            .command(Method::GET, &format!("/session/{session}/element/{element}/text"), None)
            .await?;
        Ok(value
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn click(&self, session: &str, element: &str) -> ExtractResult<()> {
        self.command(
            Method::POST,
            &format!("/session/{session}/execute/sync"),
            Some(json!({
                "script": "arguments[0].scrollIntoView(true);",
                "args": [{ ELEMENT_KEY: element }]
            })),
        )
        .await?;
        self.command(
            Method::POST,
            &format!("/session/{session}/element/{element}/click"),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    async fn run_plan(&self, session: &str, plan: &RenderPlan) -> ExtractResult<String> {
        self.set_implicit_wait(session, plan.timeout).await?;
        self.command(
            Method::POST,
            &format!("/session/{session}/url"),
            Some(json!({ "url": plan.url })),
        )
        .await?;

        if self.find_element(session, &plan.wait_for).await?.is_none() {
            return Err(ExtractError::RenderError(format!(
                "Timed out after {:?} waiting for '{}' on {}",
                plan.timeout, plan.wait_for, plan.url
            )));
        }

        self.set_implicit_wait(session, Duration::ZERO).await?;
        if let Some(expand) = &plan.expand {
            if let Some(button) = self.find_element(session, expand).await? {
                debug!("Expanding '{}'", expand);
                self.click(session, &button).await?;
            }
        }

        let element = self
            .find_element(session, &plan.extract)
            .await?
            .ok_or_else(|| ExtractError::MissingElement(format!("'{}' on {}", plan.extract, plan.url)))?;
        self.element_text(session, &element).await
    }
}

#[async_trait]
impl Renderer for WebDriverRenderer {
    async fn render(&self, plan: &RenderPlan) -> ExtractResult<String> {
        debug!("Rendering {}", plan.url);
        let session = self.new_session().await?;
        let result = self.run_plan(&session, plan).await;
        self.delete_session(&session).await;
        result
    }
}
