use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::rate_limiter::RateLimiter;
use super::Page;
use crate::config::selectors::PageSelectors;
use crate::config::ScrapingConfig;
use crate::error::{ScrapeError, ScrapeResult};

/// Resolves target identifiers to addresses and loads them.
#[derive(Clone)]
pub struct Navigator {
    base: Url,
    product_path: String,
    listing_path: String,
    body_selector: String,
    lazy_load_marker: String,
    auto_scroll: bool,
    settle_delay: Duration,
    rate_limiter: RateLimiter,
}

impl Navigator {
    pub fn new(config: &ScrapingConfig, selectors: &PageSelectors, rate_limiter: RateLimiter) -> ScrapeResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ScrapeError::config(format!("invalid base_url '{}': {}", config.base_url, e)))?;

        Ok(Self {
            base,
            product_path: config.product_path.clone(),
            listing_path: config.listing_path.clone(),
            body_selector: selectors.body.clone(),
            lazy_load_marker: selectors.lazy_load_marker.clone(),
            auto_scroll: config.auto_scroll,
            settle_delay: config.settle_delay(),
            rate_limiter,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Product page address for `target`
    pub fn product_url(&self, target: &str) -> ScrapeResult<Url> {
        let target = target.trim();
        if target.is_empty() || target.contains(['/', '?', '#', '\\']) || target.contains(char::is_whitespace) {
            return Err(ScrapeError::InvalidTarget {
                target: target.to_string(),
                message: "identifiers must be a single path segment".to_string(),
            });
        }

        self.join(&self.product_path.replace("{id}", target), target)
    }

    /// Listing page address for product discovery
    pub fn listing_url(&self, page: u32) -> ScrapeResult<Url> {
        self.join(&self.listing_path.replace("{page}", &page.to_string()), &format!("listing page {}", page))
    }

    /// Make `href` absolute against the base address; empty input stays empty
    pub fn absolutize(&self, href: &str) -> String {
        let href = href.trim();
        if href.is_empty() {
            return String::new();
        }
        self.base
            .join(href)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| href.to_string())
    }

    fn join(&self, path: &str, target: &str) -> ScrapeResult<Url> {
        self.base.join(path).map_err(|e| ScrapeError::InvalidTarget {
            target: target.to_string(),
            message: e.to_string(),
        })
    }

    /// Load the product page of `target` and return its address
    pub async fn load<P: Page>(&self, page: &P, target: &str) -> ScrapeResult<Url> {
        let url = self.product_url(target)?;
        self.open(page, &url).await?;
        Ok(url)
    }

    /// Load `url`, check the page body is there, then trigger lazy content
    pub async fn open<P: Page>(&self, page: &P, url: &Url) -> ScrapeResult<()> {
        let host = url.host_str().unwrap_or("");
        self.rate_limiter.wait_for_domain(host).await;

        info!("Loading {}", url);
        debug!("Navigation {} to {}", self.rate_limiter.get_domain_request_count(host).await, host);
        page.goto(url).await?;

        page.find_one(&self.body_selector).await.map_err(|e| match e {
            ScrapeError::ElementNotFound { .. } => ScrapeError::navigation(url.as_str(), "page has no body"),
            other => other,
        })?;

        if self.auto_scroll {
            self.trigger_lazy_content(page).await;
        }

        Ok(())
    }

    async fn trigger_lazy_content<P: Page>(&self, page: &P) {
        match page.find_one(&self.lazy_load_marker).await {
            Ok(marker) => {
                if let Err(e) = page.scroll_into_view(&marker).await {
                    debug!("Scrolling to lazy-load marker failed: {}", e);
                    return;
                }
                tokio::time::sleep(self.settle_delay).await;
            }
            Err(_) => debug!("Lazy-load marker '{}' not present", self.lazy_load_marker),
        }
    }
}
