use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Minimum interval between navigations to the same host.
///
/// Shared between pooled workers so the interval holds across sessions.
#[derive(Clone)]
pub struct RateLimiter {
    domain_limits: Arc<RwLock<HashMap<String, DomainLimiter>>>,
    default_delay: Duration,
}

/// Per-domain rate limiting state
struct DomainLimiter {
    next_slot: Instant,
    request_count: usize,
    delay: Duration,
}

impl RateLimiter {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            domain_limits: Arc::new(RwLock::new(HashMap::new())),
            default_delay,
        }
    }

    /// Wait for rate limit before navigating to domain
    pub async fn wait_for_domain(&self, domain: &str) {
        if self.default_delay.is_zero() {
            return;
        }

        let now = Instant::now();
        let required_delay = {
            let mut limits = self.domain_limits.write().await;
            let limiter = limits.entry(domain.to_string()).or_insert_with(|| DomainLimiter {
                next_slot: now,
                request_count: 0,
                delay: self.default_delay,
            });

            let required_delay = limiter.next_slot.saturating_duration_since(now);

            // Reserve the slot before sleeping so concurrent callers queue up behind it
            limiter.next_slot = now + required_delay + limiter.delay;
            limiter.request_count += 1;

            required_delay
        };

        if !required_delay.is_zero() {
            debug!("Rate limiting: waiting {}ms for domain {}", required_delay.as_millis(), domain);
            tokio::time::sleep(required_delay).await;
        }
    }

    /// Number of navigations granted for a domain
    pub async fn get_domain_request_count(&self, domain: &str) -> usize {
        let limits = self.domain_limits.read().await;
        limits.get(domain).map(|l| l.request_count).unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}
