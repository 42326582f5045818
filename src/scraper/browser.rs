//! Headless Chromium backend driven through Playwright.
//!
//! Only built with the `browser` feature. Without it the factory refuses to
//! start, which is a session error and ends the run.

#[cfg(feature = "browser")]
pub use enabled::{BrowserPage, BrowserSessionFactory};

#[cfg(not(feature = "browser"))]
pub use disabled::{BrowserPage, BrowserSessionFactory};

use crate::config::ScrapingConfig;

/// Chromium command line for `config`. Blink takes a single
/// `--blink-settings` switch, so every disabled setting shares it.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn launch_args(config: &ScrapingConfig) -> Vec<String> {
    let mut args = vec![format!("--window-size={},{}", config.window_width, config.window_height)];

    let mut blink = Vec::new();
    if config.disable_images {
        blink.push("imagesEnabled=false");
    }
    if config.disable_css {
        blink.push("cssEnabled=false");
    }
    if !blink.is_empty() {
        args.push(format!("--blink-settings={}", blink.join(",")));
    }
    args
}

#[cfg(feature = "browser")]
mod enabled {
    use async_trait::async_trait;
    use playwright::api::{Browser, BrowserContext, ElementHandle, Viewport};
    use playwright::Playwright;
    use std::rc::Rc;
    use tracing::{debug, info, warn};
    use url::Url;

    use crate::config::ScrapingConfig;
    use crate::error::{ScrapeError, ScrapeResult};
    use crate::scraper::user_agent::UserAgentRotator;
    use crate::scraper::{Page, SessionFactory};
    use crate::utils::normalize_text;

    /// Launches one Chromium instance per session
    pub struct BrowserSessionFactory {
        config: ScrapingConfig,
        playwright: Playwright,
        user_agents: UserAgentRotator,
    }

    impl BrowserSessionFactory {
        pub async fn new(config: &ScrapingConfig) -> ScrapeResult<Self> {
            debug!("Initializing Playwright driver");

            let playwright = Playwright::initialize()
                .await
                .map_err(|e| ScrapeError::session(format!("failed to start Playwright: {}", e)))?;
            playwright
                .prepare()
                .map_err(|e| ScrapeError::session(format!("failed to install browsers: {}", e)))?;

            Ok(Self {
                config: config.clone(),
                playwright,
                user_agents: UserAgentRotator::new(&config.user_agents),
            })
        }
    }

    #[async_trait(?Send)]
    impl SessionFactory for BrowserSessionFactory {
        type Session = BrowserPage;

        async fn open(&self) -> ScrapeResult<BrowserPage> {
            let args = super::launch_args(&self.config);
            let browser = self.playwright
                .chromium()
                .launcher()
                .headless(self.config.headless)
                .args(&args)
                .launch()
                .await
                .map_err(|e| ScrapeError::session(format!("failed to launch Chromium: {}", e)))?;

            let context = browser
                .context_builder()
                .user_agent(self.user_agents.get_random_user_agent())
                .viewport(Some(Viewport {
                    width: self.config.window_width as i32,
                    height: self.config.window_height as i32,
                }))
                .build()
                .await
                .map_err(|e| ScrapeError::session(e.to_string()))?;

            let page = context
                .new_page()
                .await
                .map_err(|e| ScrapeError::session(e.to_string()))?;

            info!("Browser session started (headless: {})", self.config.headless);

            Ok(BrowserPage {
                browser,
                _context: context,
                page,
                timeout_ms: self.config.page_load_timeout().as_millis() as f64,
            })
        }

        fn name(&self) -> &'static str {
            "browser"
        }
    }

    /// One Chromium instance with a single page
    pub struct BrowserPage {
        browser: Browser,
        _context: BrowserContext,
        page: playwright::api::Page,
        timeout_ms: f64,
    }

    fn interaction(e: impl std::fmt::Display) -> ScrapeError {
        ScrapeError::interaction(e.to_string())
    }

    #[async_trait(?Send)]
    impl Page for BrowserPage {
        type Node = Rc<ElementHandle>;

        async fn goto(&self, url: &Url) -> ScrapeResult<()> {
            self.page
                .goto_builder(url.as_str())
                .timeout(self.timeout_ms)
                .goto()
                .await
                .map_err(|e| ScrapeError::navigation(url.as_str(), e.to_string()))?;
            Ok(())
        }

        async fn find_one(&self, selector: &str) -> ScrapeResult<Self::Node> {
            self.page
                .query_selector(selector)
                .await
                .map_err(interaction)?
                .map(Rc::new)
                .ok_or_else(|| ScrapeError::not_found(selector))
        }

        async fn find_all(&self, selector: &str) -> ScrapeResult<Vec<Self::Node>> {
            let handles = self.page.query_selector_all(selector).await.map_err(interaction)?;
            Ok(handles.into_iter().map(Rc::new).collect())
        }

        async fn find_one_in(&self, scope: &Self::Node, selector: &str) -> ScrapeResult<Self::Node> {
            scope
                .query_selector(selector)
                .await
                .map_err(interaction)?
                .map(Rc::new)
                .ok_or_else(|| ScrapeError::not_found(selector))
        }

        async fn find_all_in(&self, scope: &Self::Node, selector: &str) -> ScrapeResult<Vec<Self::Node>> {
            let handles = scope.query_selector_all(selector).await.map_err(interaction)?;
            Ok(handles.into_iter().map(Rc::new).collect())
        }

        async fn text(&self, node: &Self::Node) -> ScrapeResult<String> {
            let text = node.inner_text().await.map_err(interaction)?;
            Ok(normalize_text(&text))
        }

        async fn attribute(&self, node: &Self::Node, name: &str) -> ScrapeResult<Option<String>> {
            node.get_attribute(name).await.map_err(interaction)
        }

        async fn scroll_into_view(&self, node: &Self::Node) -> ScrapeResult<()> {
            node.scroll_into_view_if_needed(Some(self.timeout_ms))
                .await
                .map_err(interaction)
        }

        async fn scroll_to_bottom(&self) -> ScrapeResult<()> {
            self.page
                .evaluate::<(), ()>("window.scrollTo(0, document.body.scrollHeight)", ())
                .await
                .map_err(interaction)
        }

        async fn click(&self, node: &Self::Node) -> ScrapeResult<()> {
            node.click_builder()
                .timeout(self.timeout_ms)
                .click()
                .await
                .map_err(interaction)
        }

        async fn close(&self) -> ScrapeResult<()> {
            if let Err(e) = self.browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            Ok(())
        }
    }
}

#[cfg(not(feature = "browser"))]
mod disabled {
    use async_trait::async_trait;
    use url::Url;

    use crate::config::ScrapingConfig;
    use crate::error::{ScrapeError, ScrapeResult};
    use crate::scraper::{Page, SessionFactory};

    /// Stand-in when the `browser` feature is disabled; never constructed
    pub struct BrowserSessionFactory {
        _private: (),
    }

    impl BrowserSessionFactory {
        pub async fn new(_config: &ScrapingConfig) -> ScrapeResult<Self> {
            Err(ScrapeError::session(
                "browser backend not compiled in; rebuild with `--features browser` or use `--backend static`",
            ))
        }
    }

    /// Uninhabited: no session can exist without the feature
    pub enum BrowserPage {}

    #[async_trait(?Send)]
    impl SessionFactory for BrowserSessionFactory {
        type Session = BrowserPage;

        async fn open(&self) -> ScrapeResult<BrowserPage> {
            Err(ScrapeError::session("browser feature not enabled"))
        }

        fn name(&self) -> &'static str {
            "browser"
        }
    }

    #[async_trait(?Send)]
    impl Page for BrowserPage {
        type Node = ();

        async fn goto(&self, _url: &Url) -> ScrapeResult<()> {
            match *self {}
        }

        async fn find_one(&self, _selector: &str) -> ScrapeResult<()> {
            match *self {}
        }

        async fn find_all(&self, _selector: &str) -> ScrapeResult<Vec<()>> {
            match *self {}
        }

        async fn find_one_in(&self, _scope: &(), _selector: &str) -> ScrapeResult<()> {
            match *self {}
        }

        async fn find_all_in(&self, _scope: &(), _selector: &str) -> ScrapeResult<Vec<()>> {
            match *self {}
        }

        async fn text(&self, _node: &()) -> ScrapeResult<String> {
            match *self {}
        }

        async fn attribute(&self, _node: &(), _name: &str) -> ScrapeResult<Option<String>> {
            match *self {}
        }

        async fn scroll_into_view(&self, _node: &()) -> ScrapeResult<()> {
            match *self {}
        }

        async fn scroll_to_bottom(&self) -> ScrapeResult<()> {
            match *self {}
        }

        async fn click(&self, _node: &()) -> ScrapeResult<()> {
            match *self {}
        }

        async fn close(&self) -> ScrapeResult<()> {
            match *self {}
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_factory_refuses_without_feature() {
            let err = BrowserSessionFactory::new(&ScrapingConfig::default()).await.err().unwrap();
            assert_eq!(err.category(), "session");
        }
    }
}
