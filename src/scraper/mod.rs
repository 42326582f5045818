//! Page capability and the primitives built on top of it.
//!
//! The pipeline only talks to a [`Page`]: load an address, query nodes by CSS
//! selector, read text and attributes, scroll and click. Backends implement
//! it over a real browser or over fetched HTML.

use async_trait::async_trait;
use url::Url;

use crate::error::ScrapeResult;

pub mod browser;
pub mod http_client;
pub mod locator;
pub mod navigator;
pub mod rate_limiter;
pub mod static_page;
pub mod user_agent;

#[cfg(test)]
pub mod testing;

pub use locator::Locator;
pub use navigator::Navigator;

/// One browsing session with exactly one active page.
///
/// Handles are not required to be `Send`; a session is owned by a single
/// logical flow at a time.
#[async_trait(?Send)]
pub trait Page {
    /// Handle to a node of the current document
    type Node: Clone;

    /// Navigate to `url`, replacing the current document
    async fn goto(&self, url: &Url) -> ScrapeResult<()>;

    /// First node matching `selector`, `ElementNotFound` when there is none
    async fn find_one(&self, selector: &str) -> ScrapeResult<Self::Node>;

    /// All nodes matching `selector` in document order
    async fn find_all(&self, selector: &str) -> ScrapeResult<Vec<Self::Node>>;

    async fn find_one_in(&self, scope: &Self::Node, selector: &str) -> ScrapeResult<Self::Node>;

    async fn find_all_in(&self, scope: &Self::Node, selector: &str) -> ScrapeResult<Vec<Self::Node>>;

    /// Visible text of the node, trimmed
    async fn text(&self, node: &Self::Node) -> ScrapeResult<String>;

    async fn attribute(&self, node: &Self::Node, name: &str) -> ScrapeResult<Option<String>>;

    async fn scroll_into_view(&self, node: &Self::Node) -> ScrapeResult<()>;

    async fn scroll_to_bottom(&self) -> ScrapeResult<()>;

    /// Simulate a user click; may mutate the current document in place
    async fn click(&self, node: &Self::Node) -> ScrapeResult<()>;

    /// Release the session
    async fn close(&self) -> ScrapeResult<()>;
}

/// Opens independent sessions, one per worker.
#[async_trait(?Send)]
pub trait SessionFactory {
    type Session: Page;

    async fn open(&self) -> ScrapeResult<Self::Session>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}
