use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

use super::http_client::HttpClient;
use super::user_agent::UserAgentRotator;
use super::{Page, SessionFactory};
use crate::config::ScrapingConfig;
use crate::error::{ScrapeError, ScrapeResult};
use crate::utils::normalize_text;

/// Page backed by fetched HTML. No scripts run, so clicks fail and scrolling
/// is a no-op; everything the server renders is queryable.
pub struct HtmlPage {
    source: HtmlSource,
    user_agent: String,
    document: RefCell<Option<String>>,
}

enum HtmlSource {
    Http(HttpClient),
    Fixtures(HashMap<String, String>),
}

/// Snapshot of an element taken at query time.
///
/// `index` is the element's position in document order and anchors scoped
/// queries on the next parse.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlNode {
    index: usize,
    text: String,
    attributes: HashMap<String, String>,
}

impl HtmlPage {
    pub fn new(client: HttpClient, user_agent: impl Into<String>) -> Self {
        Self {
            source: HtmlSource::Http(client),
            user_agent: user_agent.into(),
            document: RefCell::new(None),
        }
    }

    /// Serve documents from memory, keyed by address
    pub fn from_fixtures(fixtures: HashMap<String, String>) -> Self {
        Self {
            source: HtmlSource::Fixtures(fixtures),
            user_agent: String::new(),
            document: RefCell::new(None),
        }
    }

    /// Page with `html` already loaded
    pub fn from_html(html: &str) -> Self {
        let page = Self::from_fixtures(HashMap::new());
        *page.document.borrow_mut() = Some(html.to_string());
        page
    }

    fn parse_selector(selector: &str) -> ScrapeResult<Selector> {
        Selector::parse(selector).map_err(|e| ScrapeError::InvalidSelector {
            selector: selector.to_string(),
            message: format!("{:?}", e),
        })
    }

    fn document(&self) -> ScrapeResult<Html> {
        let document = self.document.borrow();
        let html = document
            .as_deref()
            .ok_or_else(|| ScrapeError::session("no document loaded"))?;
        Ok(Html::parse_document(html))
    }

    fn query(&self, scope: Option<&HtmlNode>, selector: &str) -> ScrapeResult<Vec<HtmlNode>> {
        let selector = Self::parse_selector(selector)?;
        let document = self.document()?;

        let elements: Vec<ElementRef> = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect();
        let order: HashMap<_, usize> = elements
            .iter()
            .enumerate()
            .map(|(index, el)| (el.id(), index))
            .collect();

        let matches: Vec<ElementRef> = match scope {
            Some(scope) => {
                let root = elements
                    .get(scope.index)
                    .ok_or_else(|| ScrapeError::interaction("node no longer in document"))?;
                root.select(&selector).collect()
            }
            None => document.select(&selector).collect(),
        };

        Ok(matches
            .into_iter()
            .filter_map(|el| {
                let index = *order.get(&el.id())?;
                Some(HtmlNode {
                    index,
                    text: normalize_text(&el.text().collect::<String>()),
                    attributes: el
                        .value()
                        .attrs()
                        .map(|(name, value)| (name.to_string(), value.to_string()))
                        .collect(),
                })
            })
            .collect())
    }

    fn first(nodes: Vec<HtmlNode>, selector: &str) -> ScrapeResult<HtmlNode> {
        nodes
            .into_iter()
            .next()
            .ok_or_else(|| ScrapeError::not_found(selector))
    }
}

#[async_trait(?Send)]
impl Page for HtmlPage {
    type Node = HtmlNode;

    async fn goto(&self, url: &Url) -> ScrapeResult<()> {
        let html = match &self.source {
            HtmlSource::Http(client) => client.get_html(url, &self.user_agent).await?,
            HtmlSource::Fixtures(fixtures) => fixtures
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| ScrapeError::HttpStatus { url: url.to_string(), status: 404 })?,
        };

        debug!("Fetched {} bytes from {}", html.len(), url);
        *self.document.borrow_mut() = Some(html);
        Ok(())
    }

    async fn find_one(&self, selector: &str) -> ScrapeResult<HtmlNode> {
        Self::first(self.query(None, selector)?, selector)
    }

    async fn find_all(&self, selector: &str) -> ScrapeResult<Vec<HtmlNode>> {
        self.query(None, selector)
    }

    async fn find_one_in(&self, scope: &HtmlNode, selector: &str) -> ScrapeResult<HtmlNode> {
        Self::first(self.query(Some(scope), selector)?, selector)
    }

    async fn find_all_in(&self, scope: &HtmlNode, selector: &str) -> ScrapeResult<Vec<HtmlNode>> {
        self.query(Some(scope), selector)
    }

    async fn text(&self, node: &HtmlNode) -> ScrapeResult<String> {
        Ok(node.text.clone())
    }

    async fn attribute(&self, node: &HtmlNode, name: &str) -> ScrapeResult<Option<String>> {
        Ok(node.attributes.get(name).cloned())
    }

    async fn scroll_into_view(&self, _node: &HtmlNode) -> ScrapeResult<()> {
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> ScrapeResult<()> {
        Ok(())
    }

    async fn click(&self, _node: &HtmlNode) -> ScrapeResult<()> {
        Err(ScrapeError::interaction("static pages do not run client-side scripts"))
    }

    async fn close(&self) -> ScrapeResult<()> {
        *self.document.borrow_mut() = None;
        Ok(())
    }
}

/// Opens [`HtmlPage`] sessions sharing one HTTP client
pub struct StaticSessionFactory {
    client: HttpClient,
    user_agents: UserAgentRotator,
}

impl StaticSessionFactory {
    pub fn new(config: &ScrapingConfig) -> ScrapeResult<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            user_agents: UserAgentRotator::new(&config.user_agents),
        })
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

#[async_trait(?Send)]
impl SessionFactory for StaticSessionFactory {
    type Session = HtmlPage;

    async fn open(&self) -> ScrapeResult<HtmlPage> {
        Ok(HtmlPage::new(self.client.clone(), self.user_agents.get_random_user_agent()))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
