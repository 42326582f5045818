use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use super::discovery::discover_product_ids;
use super::pipeline::ProductPipeline;
use super::worker_pool::WorkerPool;
use crate::config::AppConfig;
use crate::error::ScrapeResult;
use crate::export::{ExportManager, ExportOutcome};
use crate::logging::{LogContext, PerformanceLogger, RunIdGenerator};
use crate::models::ProductRecord;
use crate::scraper::rate_limiter::RateLimiter;
use crate::scraper::{Page, SessionFactory};
use crate::utils::format_duration;
use crate::{log_error, log_info};

/// A target that produced no record
#[derive(Debug, Clone, Serialize)]
pub struct TargetFailure {
    pub target: String,
    pub category: &'static str,
    pub message: String,
}

/// Everything one run produced
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub records: Vec<ProductRecord>,
    pub failures: Vec<TargetFailure>,
    pub export: ExportOutcome,
}

impl RunReport {
    pub fn saved(&self) -> usize {
        self.records.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} saved, {} failed, completed in {}",
            self.saved(),
            self.failures.len(),
            format_duration(self.elapsed)
        )
    }
}

/// Owns the record accumulator for a run: scrapes every target, then hands
/// the finished records to the sinks.
pub struct Orchestrator {
    config: AppConfig,
    run_id: String,
}

impl Orchestrator {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            run_id: RunIdGenerator::generate(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn pipeline(&self) -> ScrapeResult<ProductPipeline> {
        ProductPipeline::new(&self.config, RateLimiter::new(self.config.scraping.request_delay()))
    }

    /// Scrape `targets` and export the results.
    ///
    /// Per-target failures are collected in the report; only a run where no
    /// session could be started returns an error.
    pub async fn run<F: SessionFactory>(&self, factory: &F, targets: &[String]) -> ScrapeResult<RunReport> {
        let started_at = Utc::now();
        let context = LogContext::new("orchestrator", "run")
            .with_run_id(self.run_id.clone())
            .with_number_field("targets", targets.len() as i64)
            .with_number_field("workers", self.config.scraping.workers as i64);
        log_info!(context, "Starting run");
        let perf = PerformanceLogger::new(context.clone());

        let pipeline = self.pipeline()?;
        let outcomes = WorkerPool::new(factory, &pipeline, self.config.scraping.workers)
            .with_dispatch_delay(self.config.scraping.dispatch_delay())
            .with_run_id(self.run_id.clone())
            .run(targets)
            .await?;

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(record) => records.push(record),
                Err(e) => failures.push(TargetFailure {
                    target: outcome.target,
                    category: e.category(),
                    message: e.to_string(),
                }),
            }
        }

        let export = ExportManager::new(&self.config.export).export(&records).await;
        for sink_error in &export.failures {
            let context = context.clone().with_error_category(sink_error.category());
            log_error!(context, sink_error, "Sink failed; its file may be missing this batch");
        }

        let report = RunReport {
            run_id: self.run_id.clone(),
            started_at,
            elapsed: perf.finish_with_status("Run finished", if failures.is_empty() { "complete" } else { "partial" }),
            records,
            failures,
            export,
        };

        info!("{}", report.summary());
        Ok(report)
    }

    /// Walk `pages` listing pages on one session and return the product ids found
    pub async fn discover<F: SessionFactory>(&self, factory: &F, pages: u32) -> ScrapeResult<Vec<String>> {
        let pipeline = self.pipeline()?;
        let session = factory.open().await?;

        let result = discover_product_ids(&session, pipeline.navigator(), &self.config.selectors.listing, pages).await;

        if let Err(e) = session.close().await {
            warn!("Closing discovery session failed: {}", e);
        }

        let ids = result?;
        info!("Discovered {} products on {} listing pages", ids.len(), pages);
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::testing::{product_dom, test_config, FakeDom, FakeSessionFactory, FakeSite};

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut config = test_config();
        config.export.json_path = dir.join("json").join("products.json");
        config.export.sheet_path = dir.join("sheets").join("products.xml");
        config
    }

    #[tokio::test]
    async fn test_run_scrapes_and_exports() {
        let dir = tempfile::tempdir().unwrap();
        let site = FakeSite::new()
            .page("https://shop.example.com/products/IE3439/", product_dom("Sample Shoe"))
            .failing("https://shop.example.com/products/IF9280/");
        let factory = FakeSessionFactory::new(site);

        let orchestrator = Orchestrator::new(config_in(dir.path()));
        let report = orchestrator
            .run(&factory, &["IF9280".to_string(), "IE3439".to_string()])
            .await
            .unwrap();

        assert_eq!(report.saved(), 1);
        assert_eq!(report.records[0].id, "IE3439");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].target, "IF9280");
        assert_eq!(report.failures[0].category, "navigation");
        assert!(report.export.is_complete());
        assert!(report.summary().starts_with("1 saved, 1 failed"));

        let json = tokio::fs::read_to_string(dir.path().join("json").join("products.json")).await.unwrap();
        let saved: Vec<ProductRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(saved.len(), 1);
        assert!(dir.path().join("sheets").join("products.xml").exists());
    }

    #[tokio::test]
    async fn test_run_without_records_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeSessionFactory::new(FakeSite::new());

        let report = Orchestrator::new(config_in(dir.path()))
            .run(&factory, &["IE3439".to_string()])
            .await
            .unwrap();

        assert_eq!(report.saved(), 0);
        assert_eq!(report.failures[0].category, "network");
        assert!(!dir.path().join("json").join("products.json").exists());
    }

    #[tokio::test]
    async fn test_discover() {
        let mut listing = FakeDom::new();
        let card = listing.add(".itemCardArea-cards", "");
        let link = listing.add_child(card, ".image_link", "");
        listing.set_attr(link, "data-ga-eec-product-id", "IE3439");

        let site = FakeSite::new().page(
            "https://shop.example.com/item/?order=11&gender=mens&limit=100&page=1",
            listing,
        );
        let factory = FakeSessionFactory::new(site);

        let orchestrator = Orchestrator::new(test_config());
        let ids = orchestrator.discover(&factory, 2).await.unwrap();
        assert_eq!(ids, vec!["IE3439"]);
        assert!(orchestrator.run_id().starts_with("run-"));
    }
}
