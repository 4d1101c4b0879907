use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::app::{Result, SeedwatchError};
use crate::scraper::config::ScraperConfig;
use crate::scraper::extractor::PageExtractor;
use crate::source::{DetailResolver, ItemDetails, ListingPage, ListingSource};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One headless browser shared by the listing source and the detail resolver.
pub struct ChromeSession {
    browser: Browser,
    config: ScraperConfig,
    semaphore: Arc<Semaphore>,
}

/// A browser tab that holds a concurrency permit until closed.
struct OpenPage {
    page: Page,
    _permit: OwnedSemaphorePermit,
}

impl ChromeSession {
    /// Launch a browser with the given configuration
    pub async fn launch(config: ScraperConfig) -> Result<Arc<Self>> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer");

        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| SeedwatchError::Scraper(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            SeedwatchError::Scraper(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));

        Ok(Arc::new(Self {
            browser,
            config,
            semaphore,
        }))
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    async fn open(&self, url: &str) -> Result<OpenPage> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| SeedwatchError::Scraper(format!("Semaphore error: {}", e)))?;

        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| SeedwatchError::Scraper(format!("Failed to create page: {}", e)))?;

        if let Some(ref ua) = self.config.user_agent {
            page.set_user_agent(ua)
                .await
                .map_err(|e| SeedwatchError::Scraper(format!("Failed to set user agent: {}", e)))?;
        }

        page.wait_for_navigation()
            .await
            .map_err(|e| SeedwatchError::Scraper(format!("Navigation failed: {}", e)))?;

        tokio::time::sleep(self.config.wait_after_load()).await;

        Ok(OpenPage {
            page,
            _permit: permit,
        })
    }

    /// Poll until `selector` matches or the configured wait runs out.
    async fn wait_for_selector(&self, page: &Page, selector: &str) -> bool {
        let deadline = Instant::now() + self.config.selector_timeout();
        loop {
            if page.find_element(selector).await.is_ok() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn evaluate(&self, page: &Page, script: String) -> Result<serde_json::Value> {
        page.evaluate(script)
            .await
            .map_err(|e| SeedwatchError::Scraper(format!("Script execution failed: {}", e)))?
            .into_value()
            .map_err(|e| SeedwatchError::Scraper(format!("Failed to parse result: {:?}", e)))
    }
}

/// Market listing pages rendered in the browser
pub struct ChromeListingSource {
    session: Arc<ChromeSession>,
    market_url: String,
    extractor: PageExtractor,
}

impl ChromeListingSource {
    pub fn new(session: Arc<ChromeSession>, market_url: impl Into<String>) -> Self {
        let extractor = PageExtractor::new(session.config().clone());
        Self {
            session,
            market_url: market_url.into(),
            extractor,
        }
    }

    pub fn page_url(&self, page: u32) -> String {
        format!("{}#p{}_popular_desc", self.market_url, page)
    }

    async fn extract(&self, page: &Page) -> Result<ListingPage> {
        let config = self.session.config();
        let rows_present = self
            .session
            .wait_for_selector(page, &config.listing_row_selector)
            .await;

        let value = self
            .session
            .evaluate(page, self.extractor.listing_script())
            .await
            .map_err(|e| SeedwatchError::ParseFailure(e.to_string()))?;

        if !rows_present {
            tracing::debug!(
                "Selector {} never appeared, relying on total counter",
                config.listing_row_selector
            );
        }

        PageExtractor::parse_listing_result(&value)
    }
}

#[async_trait]
impl ListingSource for ChromeListingSource {
    async fn fetch_page(&self, page_number: u32) -> Result<ListingPage> {
        let url = self.page_url(page_number);
        let open = self
            .session
            .open(&url)
            .await
            .map_err(|e| SeedwatchError::SourceUnavailable(e.to_string()))?;

        let result = self.extract(&open.page).await;
        let _ = open.page.close().await;
        result
    }
}

/// Float/seed lookups through a checker web page
pub struct ChromeDetailResolver {
    session: Arc<ChromeSession>,
    extractor: PageExtractor,
}

impl ChromeDetailResolver {
    pub fn new(session: Arc<ChromeSession>) -> Self {
        let extractor = PageExtractor::new(session.config().clone());
        Self { session, extractor }
    }

    async fn lookup(&self, inspect_link: &str) -> Result<ItemDetails> {
        let config = self.session.config();
        let url = config.detail_url(inspect_link);

        let open = self
            .session
            .open(&url)
            .await
            .map_err(|e| SeedwatchError::ResolutionFailure(e.to_string()))?;

        let result = async {
            if !self
                .session
                .wait_for_selector(&open.page, &config.condition_selector)
                .await
            {
                return Err(SeedwatchError::ResolutionFailure(format!(
                    "{} not found",
                    config.condition_selector
                )));
            }
            let value = self
                .session
                .evaluate(&open.page, self.extractor.detail_script())
                .await
                .map_err(|e| SeedwatchError::ResolutionFailure(e.to_string()))?;
            PageExtractor::parse_detail_result(&value)
        }
        .await;

        let _ = open.page.close().await;
        result
    }
}

#[async_trait]
impl DetailResolver for ChromeDetailResolver {
    async fn resolve(&self, inspect_link: &str, timeout: Duration) -> Result<ItemDetails> {
        tokio::time::timeout(timeout, self.lookup(inspect_link))
            .await
            .map_err(|_| SeedwatchError::ResolutionTimeout(timeout))?
    }
}
