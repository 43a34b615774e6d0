//! [`PageOpener`] / [`ListingPage`] on top of a WebDriver endpoint
//! (chromedriver or a remote grid) via `fantoccini`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::key::Key;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Value};

use crate::error::ScraperError;
use crate::page::{ListingPage, PageOpener};
use crate::scripts;

const WINDOW_WIDTH: u32 = 1366;
const WINDOW_HEIGHT: u32 = 900;
const LOAD_POLL: Duration = Duration::from_millis(100);

/// Settings shared by every page session a [`WebDriverBrowser`] opens.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: Option<String>,
    /// Bound on every individual command except navigation.
    pub command_timeout: Duration,
    pub navigation_timeout: Duration,
}

/// Opens one Chrome session per [`PageOpener::open`] call.
pub struct WebDriverBrowser {
    options: BrowserOptions,
}

impl WebDriverBrowser {
    #[must_use]
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    fn capabilities(&self) -> serde_json::Map<String, Value> {
        let mut args = vec![
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!("--window-size={WINDOW_WIDTH},{WINDOW_HEIGHT}"),
        ];
        if self.options.headless {
            args.push("--headless=new".to_string());
        }
        if let Some(ua) = &self.options.user_agent {
            args.push(format!("--user-agent={ua}"));
        }

        let mut caps = serde_json::Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        caps
    }
}

#[async_trait]
impl PageOpener for WebDriverBrowser {
    async fn open(&self) -> Result<Box<dyn ListingPage>, ScraperError> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());
        let connect = builder.connect(&self.options.webdriver_url);
        let client = tokio::time::timeout(self.options.navigation_timeout, connect)
            .await
            .map_err(|_| ScraperError::Timeout {
                operation: "open browser session".to_string(),
                ms: millis(self.options.navigation_timeout),
            })??;

        tracing::debug!(
            webdriver_url = %self.options.webdriver_url,
            headless = self.options.headless,
            "opened browser session"
        );

        Ok(Box::new(WebDriverPage {
            client,
            command_timeout: self.options.command_timeout,
            navigation_timeout: self.options.navigation_timeout,
        }))
    }
}

/// One browser session.
pub struct WebDriverPage {
    client: Client,
    command_timeout: Duration,
    navigation_timeout: Duration,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn missing_element(selector: &str, e: &CmdError) -> ScraperError {
    ScraperError::Script {
        reason: format!("no usable element for '{selector}': {e}"),
    }
}

impl WebDriverPage {
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T, ScraperError>
    where
        F: Future<Output = Result<T, CmdError>> + Send,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => result.map_err(ScraperError::from),
            Err(_) => Err(ScraperError::Timeout {
                operation: operation.to_string(),
                ms: millis(self.command_timeout),
            }),
        }
    }

    async fn find(&self, selector: &str) -> Result<fantoccini::elements::Element, ScraperError> {
        match tokio::time::timeout(
            self.command_timeout,
            self.client.find(Locator::Css(selector)),
        )
        .await
        {
            Ok(Ok(element)) => Ok(element),
            Ok(Err(e)) => Err(missing_element(selector, &e)),
            Err(_) => Err(ScraperError::Timeout {
                operation: format!("find {selector}"),
                ms: millis(self.command_timeout),
            }),
        }
    }
}

#[async_trait]
impl ListingPage for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<(), ScraperError> {
        match tokio::time::timeout(self.navigation_timeout, self.client.goto(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ScraperError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ScraperError::Timeout {
                operation: format!("navigate to {url}"),
                ms: millis(self.navigation_timeout),
            }),
        }
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<(), ScraperError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state = self.evaluate(scripts::READY_STATE, vec![]).await?;
            if matches!(state.as_str(), Some("interactive" | "complete")) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ScraperError::Timeout {
                    operation: "document load".to_string(),
                    ms: millis(timeout),
                });
            }
            tokio::time::sleep(LOAD_POLL).await;
        }
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value, ScraperError> {
        self.bounded("evaluate script", self.client.execute(script, args))
            .await
    }

    async fn count_first_match(&self, selectors: &[String]) -> Result<usize, ScraperError> {
        let value = self
            .evaluate(scripts::COUNT_FIRST_MATCH, vec![json!(selectors)])
            .await?;
        Ok(value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0))
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, ScraperError> {
        let value = self
            .evaluate(scripts::IS_VISIBLE, vec![json!(selector)])
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &str) -> Result<(), ScraperError> {
        let native = match self.find(selector).await {
            Ok(element) => self.bounded("click", element.click()).await,
            Err(e) => Err(e),
        };
        if native.is_ok() {
            return Ok(());
        }

        // Overlays and sticky headers intercept native clicks; a DOM click
        // still fires the handler.
        let clicked = self.evaluate(scripts::CLICK, vec![json!(selector)]).await?;
        if clicked.as_bool() == Some(true) {
            Ok(())
        } else {
            native
        }
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), ScraperError> {
        let element = self.find(selector).await?;
        self.bounded("clear input", element.clear())
            .await
            .map_err(|_| ScraperError::Script {
                reason: format!("could not clear '{selector}'"),
            })?;
        self.bounded("type into input", element.send_keys(text))
            .await
            .map_err(|_| ScraperError::Script {
                reason: format!("could not type into '{selector}'"),
            })
    }

    async fn press_enter(&self, selector: &str) -> Result<(), ScraperError> {
        let element = self.find(selector).await?;
        let enter = char::from(Key::Enter).to_string();
        self.bounded("press enter", element.send_keys(&enter))
            .await
            .map_err(|_| ScraperError::Script {
                reason: format!("could not submit '{selector}'"),
            })
    }

    async fn scroll_by(&self, containers: &[String], delta_y: i64) -> Result<(), ScraperError> {
        self.evaluate(scripts::SCROLL_BY, vec![json!(containers), json!(delta_y)])
            .await
            .map(|_| ())
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, ScraperError> {
        let value = self.evaluate(scripts::TEXT_OF, vec![json!(selector)]).await?;
        Ok(value
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string))
    }

    async fn content(&self) -> Result<String, ScraperError> {
        self.bounded("read page source", self.client.source()).await
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        self.bounded("read current url", self.client.current_url())
            .await
            .map(|url| url.to_string())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, ScraperError> {
        self.bounded("screenshot", self.client.screenshot()).await
    }

    async fn close(&self) -> Result<(), ScraperError> {
        self.bounded("close session", self.client.clone().close())
            .await
    }
}
