use tracing::debug;

use crate::config::selectors::SelectorSet;
use crate::config::{AppConfig, ScrapingConfig};
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::{extract_product_fields, extract_product_meta, extract_size_chart, CoordinateWalker};
use crate::models::{ProductMeta, ProductRecord};
use crate::scraper::rate_limiter::RateLimiter;
use crate::scraper::{Locator, Navigator, Page};

/// Scrapes one target: load, extract, walk coordinated items, assemble.
pub struct ProductPipeline {
    scraping: ScrapingConfig,
    selectors: SelectorSet,
    navigator: Navigator,
}

impl ProductPipeline {
    pub fn new(config: &AppConfig, rate_limiter: RateLimiter) -> ScrapeResult<Self> {
        Ok(Self {
            navigator: Navigator::new(&config.scraping, &config.selectors.page, rate_limiter)?,
            scraping: config.scraping.clone(),
            selectors: config.selectors.clone(),
        })
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Errors returned here cost this target only, except session errors.
    pub async fn scrape<P: Page>(&self, page: &P, target: &str) -> ScrapeResult<ProductRecord> {
        let target = target.trim();
        self.navigator.load(page, target).await?;

        let locator = Locator::with_timing(page, self.scraping.element_timeout(), self.scraping.poll_interval());

        let fields = extract_product_fields(&locator, &self.selectors.product, &self.navigator).await;
        if fields.name.is_empty() {
            return Err(ScrapeError::MissingRequiredField {
                field: "Name".to_string(),
                target: target.to_string(),
            });
        }

        let size_chart = extract_size_chart(&locator, &self.selectors.size_chart).await;

        let product_meta = if self.scraping.include_reviews {
            extract_product_meta(&locator, &self.selectors.reviews).await
        } else {
            ProductMeta::default()
        };

        // Last: direct mode navigates away from the product page
        let walk = CoordinateWalker::new(&self.scraping, &self.selectors, &self.navigator)
            .walk(&locator)
            .await;

        debug!(
            "{}: {} coordinated items, {} skipped",
            target,
            walk.records().len(),
            walk.skipped()
        );

        Ok(ProductRecord::assemble(target, fields, size_chart, product_meta, walk.records()))
    }
}
