use reqwest::{header::{HeaderMap, HeaderValue}, Client};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::config::ScrapingConfig;
use crate::error::{ScrapeError, ScrapeResult};

/// HTTP client wrapper with connection pooling and request counters
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    metrics: Arc<HttpMetrics>,
}

#[derive(Debug, Default)]
struct HttpMetrics {
    success_count: AtomicU64,
    error_count: AtomicU64,
    total_bytes: AtomicU64,
    total_millis: AtomicU64,
}

/// HTTP statistics
#[derive(Debug, Clone, PartialEq)]
pub struct HttpStats {
    pub total_requests: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub total_bytes: u64,
    pub avg_response_time: Duration,
}

impl HttpClient {
    pub fn new(config: &ScrapingConfig) -> ScrapeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"));
        headers.insert("Accept-Language", HeaderValue::from_static("ja,en-US;q=0.7,en;q=0.5"));
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));

        let client = Client::builder()
            .timeout(config.page_load_timeout())
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            metrics: Arc::new(HttpMetrics::default()),
        })
    }

    /// GET `url` and return the body. Non-success statuses are errors.
    pub async fn get_html(&self, url: &Url, user_agent: &str) -> ScrapeResult<String> {
        let start_time = Instant::now();
        debug!("HTTP GET {}", url);

        let result = self.fetch(url, user_agent).await;
        let elapsed = start_time.elapsed().as_millis() as u64;
        self.metrics.total_millis.fetch_add(elapsed, Ordering::Relaxed);

        match &result {
            Ok(body) => {
                self.metrics.success_count.fetch_add(1, Ordering::Relaxed);
                self.metrics.total_bytes.fetch_add(body.len() as u64, Ordering::Relaxed);
            }
            Err(e) => {
                self.metrics.error_count.fetch_add(1, Ordering::Relaxed);
                warn!("HTTP GET {} failed: {}", url, e);
            }
        }

        result
    }

    async fn fetch(&self, url: &Url, user_agent: &str) -> ScrapeResult<String> {
        let response = self.client
            .get(url.as_str())
            .header("User-Agent", user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }

    pub fn stats(&self) -> HttpStats {
        let success_count = self.metrics.success_count.load(Ordering::Relaxed);
        let error_count = self.metrics.error_count.load(Ordering::Relaxed);
        let total_requests = success_count + error_count;
        let total_millis = self.metrics.total_millis.load(Ordering::Relaxed);

        HttpStats {
            total_requests,
            success_count,
            error_count,
            total_bytes: self.metrics.total_bytes.load(Ordering::Relaxed),
            avg_response_time: if total_requests > 0 {
                Duration::from_millis(total_millis / total_requests)
            } else {
                Duration::ZERO
            },
        }
    }
}
