//! Headless browser access.
//!
//! Scraping code talks to [`Browser`] / [`PageSession`] only. The real
//! implementation drives chromedriver over WebDriver; tests swap in an
//! in-memory page set.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use fantoccini::wd::Capabilities;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tracing::{debug, warn};

#[async_trait]
pub trait Browser: Send + Sync {
    /// Start a new session and navigate it to `url`.
    async fn open(&self, url: &str) -> Result<Box<dyn PageSession>>;
}

#[async_trait]
pub trait PageSession: Send + Sync {
    /// Visible text of the element at `xpath`.
    async fn text(&self, xpath: &str) -> Result<String>;

    /// `href` of every element matching `xpath`, in document order.
    /// No match is an empty list, not an error.
    async fn hrefs(&self, xpath: &str) -> Result<Vec<Option<String>>>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// A session that is closed on every exit path.
///
/// Call [`ScopedSession::close`] to close it and see the outcome. If the
/// value is dropped instead (early return, panic, cancelled task) the close
/// is handed to the runtime in the background.
pub struct ScopedSession {
    inner: Option<Box<dyn PageSession>>,
}

impl ScopedSession {
    pub async fn open<B: Browser + ?Sized>(browser: &B, url: &str) -> Result<Self> {
        let session = browser.open(url).await?;
        Ok(Self {
            inner: Some(session),
        })
    }

    pub async fn text(&self, xpath: &str) -> Result<String> {
        match &self.inner {
            Some(session) => session.text(xpath).await,
            None => Err(anyhow!("session already closed")),
        }
    }

    pub async fn hrefs(&self, xpath: &str) -> Result<Vec<Option<String>>> {
        match &self.inner {
            Some(session) => session.hrefs(xpath).await,
            None => Err(anyhow!("session already closed")),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        match self.inner.take() {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        let Some(session) = self.inner.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!("Background session close failed: {:#}", e);
                    }
                });
            }
            Err(_) => warn!("Browser session dropped outside a runtime; left open"),
        }
    }
}

// ── WebDriver ──

/// Headless Chrome behind a running chromedriver.
pub struct WebDriver {
    endpoint: String,
    capabilities: Capabilities,
}

impl WebDriver {
    pub fn headless(endpoint: &str) -> Self {
        let mut capabilities = Capabilities::new();
        capabilities.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": ["--headless=new", "--disable-gpu"] }),
        );
        Self {
            endpoint: endpoint.to_string(),
            capabilities,
        }
    }
}

#[async_trait]
impl Browser for WebDriver {
    async fn open(&self, url: &str) -> Result<Box<dyn PageSession>> {
        let client = ClientBuilder::native()
            .capabilities(self.capabilities.clone())
            .connect(&self.endpoint)
            .await
            .with_context(|| format!("Failed to start a WebDriver session at {}", self.endpoint))?;

        if let Err(e) = client.goto(url).await {
            if let Err(close_err) = client.close().await {
                debug!("Close after failed navigation: {}", close_err);
            }
            return Err(e).with_context(|| format!("Failed to load {url}"));
        }

        Ok(Box::new(WebDriverSession { client }))
    }
}

struct WebDriverSession {
    client: Client,
}

#[async_trait]
impl PageSession for WebDriverSession {
    async fn text(&self, xpath: &str) -> Result<String> {
        let element = self.client.find(Locator::XPath(xpath)).await?;
        Ok(element.text().await?)
    }

    async fn hrefs(&self, xpath: &str) -> Result<Vec<Option<String>>> {
        let elements = self.client.find_all(Locator::XPath(xpath)).await?;
        let mut hrefs = Vec::with_capacity(elements.len());
        for element in elements {
            hrefs.push(element.attr("href").await?);
        }
        Ok(hrefs)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client.close().await.context("Failed to close WebDriver session")
    }
}


#[cfg(test)]
mod tests {
    use super::fake::{FakeBrowser, FakePage};
    use super::*;

    #[tokio::test]
    async fn scoped_close_runs_once() {
        let browser = FakeBrowser::default().page("https://example.com", FakePage::default());
        let session = ScopedSession::open(&browser, "https://example.com").await.unwrap();
        assert!(session.text("/html/body").await.is_err());
        session.close().await.unwrap();
        assert_eq!(browser.opened(), 1);
        assert_eq!(browser.closed(), 1);
    }

    #[tokio::test]
    async fn dropped_session_closes_in_background() {
        let browser = FakeBrowser::default().page("https://example.com", FakePage::default());
        {
            let _session = ScopedSession::open(&browser, "https://example.com").await.unwrap();
        }
        for _ in 0..50 {
            if browser.closed() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(browser.closed(), 1);
    }

    #[tokio::test]
    async fn failed_open_leaves_nothing_open() {
        let browser = FakeBrowser::default();
        assert!(ScopedSession::open(&browser, "https://missing").await.is_err());
        assert_eq!(browser.opened(), 0);
        assert_eq!(browser.closed(), 0);
    }
}
