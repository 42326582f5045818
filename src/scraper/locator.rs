use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::Page;
use crate::error::{ScrapeError, ScrapeResult};

/// Selector-level helpers over a [`Page`].
///
/// Optional lookups never fail: a missing node reads as an empty string or an
/// empty list. Only [`Locator::find_one`] and [`Locator::wait_for`] report
/// `ElementNotFound`, for callers that treat the node as required.
pub struct Locator<'a, P: Page> {
    page: &'a P,
    element_timeout: Duration,
    poll_interval: Duration,
}

impl<'a, P: Page> Locator<'a, P> {
    pub fn new(page: &'a P) -> Self {
        Self::with_timing(page, Duration::from_millis(3000), Duration::from_millis(250))
    }

    pub fn with_timing(page: &'a P, element_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            page,
            element_timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn page(&self) -> &'a P {
        self.page
    }

    pub async fn find_one(&self, selector: &str) -> ScrapeResult<P::Node> {
        self.page.find_one(selector).await
    }

    pub async fn find_all(&self, selector: &str) -> Vec<P::Node> {
        match self.page.find_all(selector).await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!("Lookup of '{}' failed: {}", selector, e);
                Vec::new()
            }
        }
    }

    pub async fn find_all_in(&self, scope: &P::Node, selector: &str) -> Vec<P::Node> {
        match self.page.find_all_in(scope, selector).await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!("Scoped lookup of '{}' failed: {}", selector, e);
                Vec::new()
            }
        }
    }

    pub async fn text(&self, node: &P::Node) -> String {
        self.page.text(node).await.unwrap_or_else(|e| {
            debug!("Reading text failed: {}", e);
            String::new()
        })
    }

    pub async fn attribute(&self, node: &P::Node, name: &str) -> Option<String> {
        self.page.attribute(node, name).await.unwrap_or_else(|e| {
            debug!("Reading attribute '{}' failed: {}", name, e);
            None
        })
    }

    /// Text of the first match, empty when nothing matches
    pub async fn text_of(&self, selector: &str) -> String {
        match self.page.find_one(selector).await {
            Ok(node) => self.text(&node).await,
            Err(e) => {
                log_missing(selector, &e);
                String::new()
            }
        }
    }

    /// Text of every match in document order
    pub async fn texts_of(&self, selector: &str) -> Vec<String> {
        let mut texts = Vec::new();
        for node in self.find_all(selector).await {
            texts.push(self.text(&node).await);
        }
        texts
    }

    /// Attribute of the first match, empty when the node or the attribute is missing
    pub async fn attribute_of(&self, selector: &str, name: &str) -> String {
        match self.page.find_one(selector).await {
            Ok(node) => self.attribute(&node, name).await.unwrap_or_default(),
            Err(e) => {
                log_missing(selector, &e);
                String::new()
            }
        }
    }

    pub async fn text_in(&self, scope: &P::Node, selector: &str) -> String {
        match self.page.find_one_in(scope, selector).await {
            Ok(node) => self.text(&node).await,
            Err(e) => {
                log_missing(selector, &e);
                String::new()
            }
        }
    }

    pub async fn texts_in(&self, scope: &P::Node, selector: &str) -> Vec<String> {
        let mut texts = Vec::new();
        for node in self.find_all_in(scope, selector).await {
            texts.push(self.text(&node).await);
        }
        texts
    }

    pub async fn attribute_in(&self, scope: &P::Node, selector: &str, name: &str) -> String {
        match self.page.find_one_in(scope, selector).await {
            Ok(node) => self.attribute(&node, name).await.unwrap_or_default(),
            Err(e) => {
                log_missing(selector, &e);
                String::new()
            }
        }
    }

    /// Poll for `selector` every poll interval until the element timeout runs out.
    pub async fn wait_for(&self, selector: &str) -> ScrapeResult<P::Node> {
        let deadline = Instant::now() + self.element_timeout;

        loop {
            match self.page.find_one(selector).await {
                Ok(node) => return Ok(node),
                Err(ScrapeError::ElementNotFound { .. }) => {
                    if Instant::now() >= deadline {
                        debug!("Gave up waiting for '{}' after {:?}", selector, self.element_timeout);
                        return Err(ScrapeError::not_found(selector));
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn log_missing(selector: &str, error: &ScrapeError) {
    match error {
        ScrapeError::ElementNotFound { .. } => debug!("Optional element '{}' not found", selector),
        other => warn!("Lookup of '{}' failed: {}", selector, other),
    }
}
