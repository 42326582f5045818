//! Scripted in-memory page for pipeline tests.
//!
//! Selectors are matched by exact string, not parsed. A document is a list of
//! `(selector, node)` entries in document order; nodes carry text, attributes,
//! scoped children and what a click does to the document.

use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use url::Url;

use super::{Page, SessionFactory};
use crate::config::AppConfig;
use crate::error::{ScrapeError, ScrapeResult};
use crate::utils::normalize_text;

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub enum ClickBehavior {
    Inert,
    Fails,
    /// Replace the revealed region of the document with these entries
    Reveals(Vec<(String, NodeId)>),
}

#[derive(Debug, Clone)]
struct FakeElement {
    text: String,
    attrs: HashMap<String, String>,
    children: Vec<(String, NodeId)>,
    on_click: ClickBehavior,
}

#[derive(Debug, Clone, Default)]
pub struct FakeDom {
    elements: Vec<FakeElement>,
    entries: Vec<(String, NodeId)>,
    revealed: Vec<(String, NodeId)>,
}

impl FakeDom {
    pub fn new() -> Self {
        let mut dom = Self::default();
        dom.add("body", "");
        dom
    }

    /// Detached node, reachable only through `add_child` or a click reveal
    pub fn element(&mut self, text: &str) -> NodeId {
        self.elements.push(FakeElement {
            text: text.to_string(),
            attrs: HashMap::new(),
            children: Vec::new(),
            on_click: ClickBehavior::Inert,
        });
        self.elements.len() - 1
    }

    pub fn add(&mut self, selector: &str, text: &str) -> NodeId {
        let id = self.element(text);
        self.entries.push((selector.to_string(), id));
        id
    }

    pub fn add_child(&mut self, parent: NodeId, selector: &str, text: &str) -> NodeId {
        let id = self.element(text);
        self.elements[parent].children.push((selector.to_string(), id));
        id
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        self.elements[id].attrs.insert(name.to_string(), value.to_string());
    }

    pub fn on_click(&mut self, id: NodeId, behavior: ClickBehavior) {
        self.elements[id].on_click = behavior;
    }

    /// Remove every entry for `selector`, e.g. to drop the page body
    pub fn remove(&mut self, selector: &str) {
        self.entries.retain(|(s, _)| s != selector);
    }

    /// Carousel entry using the default coordinate selectors. Clicking it
    /// reveals its detail pane, or fails when `clickable` is false.
    pub fn add_coordinated_item(&mut self, name: &str, price: &str, article_id: &str, clickable: bool) -> NodeId {
        let item = self.add(".coordinateItems .carouselListitem", "");
        let tile = self.add_child(item, ".coordinate_item_tile", "");
        self.set_attr(tile, "data-articleid", article_id);

        if !clickable {
            self.on_click(item, ClickBehavior::Fails);
            return item;
        }

        let title = self.element(name);
        let price_node = self.element(price);
        let detail_tile = self.element("");
        self.set_attr(detail_tile, "data-articleid", article_id);
        let image = self.element("");
        self.set_attr(image, "src", &format!("/images/{}_01.jpg", article_id));
        let link = self.element(name);
        self.set_attr(link, "href", &format!("/products/{}/", article_id));

        self.on_click(
            item,
            ClickBehavior::Reveals(vec![
                (".coordinate_item_container .title".to_string(), title),
                (".coordinate_item_container .price-value".to_string(), price_node),
                (".coordinate_item_tile".to_string(), detail_tile),
                (".coordinate_image_body.test-img".to_string(), image),
                (".coordinate_item_container .test-link_a".to_string(), link),
            ]),
        );
        item
    }

    fn matching(&self, selector: &str) -> Vec<NodeId> {
        self.entries
            .iter()
            .chain(self.revealed.iter())
            .filter(|(s, _)| s == selector)
            .map(|(_, id)| *id)
            .collect()
    }

    fn matching_in(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        self.elements
            .get(scope)
            .map(|el| {
                el.children
                    .iter()
                    .filter(|(s, _)| s == selector)
                    .map(|(_, id)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Documents by address, plus addresses that fail to load or drop the session
#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    pages: HashMap<String, FakeDom>,
    failing: HashSet<String>,
    session_lost: HashSet<String>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, dom: FakeDom) -> Self {
        self.pages.insert(url.to_string(), dom);
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Navigating to `url` kills the session, like a crashed browser
    pub fn session_lost(mut self, url: &str) -> Self {
        self.session_lost.insert(url.to_string());
        self
    }
}

pub struct FakePage {
    site: FakeSite,
    current: RefCell<Option<FakeDom>>,
    visited: RefCell<Vec<String>>,
    lookups: RefCell<HashMap<String, usize>>,
    clicks: RefCell<Vec<NodeId>>,
    scrolls: Cell<usize>,
    closed: Cell<bool>,
}

impl FakePage {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site,
            current: RefCell::new(None),
            visited: RefCell::new(Vec::new()),
            lookups: RefCell::new(HashMap::new()),
            clicks: RefCell::new(Vec::new()),
            scrolls: Cell::new(0),
            closed: Cell::new(false),
        }
    }

    pub fn with_dom(url: &str, dom: FakeDom) -> Self {
        Self::new(FakeSite::new().page(url, dom))
    }

    pub async fn goto_str(&self, url: &str) {
        let url = Url::parse(url).expect("test url");
        self.goto(&url).await.expect("test page loads");
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.borrow().clone()
    }

    pub fn clicks(&self) -> Vec<NodeId> {
        self.clicks.borrow().clone()
    }

    pub fn lookups(&self, selector: &str) -> usize {
        self.lookups.borrow().get(selector).copied().unwrap_or(0)
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls.get()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn with_dom_ref<T>(&self, f: impl FnOnce(&FakeDom) -> T) -> ScrapeResult<T> {
        let current = self.current.borrow();
        let dom = current
            .as_ref()
            .ok_or_else(|| ScrapeError::session("no page loaded"))?;
        Ok(f(dom))
    }

    fn count_lookup(&self, selector: &str) {
        *self.lookups.borrow_mut().entry(selector.to_string()).or_insert(0) += 1;
    }
}

#[async_trait(?Send)]
impl Page for FakePage {
    type Node = NodeId;

    async fn goto(&self, url: &Url) -> ScrapeResult<()> {
        let address = url.to_string();
        self.visited.borrow_mut().push(address.clone());

        if self.site.session_lost.contains(&address) {
            return Err(ScrapeError::session("browser disconnected"));
        }
        if self.site.failing.contains(&address) {
            return Err(ScrapeError::navigation(address, "connection reset"));
        }

        match self.site.pages.get(&address) {
            Some(dom) => {
                *self.current.borrow_mut() = Some(dom.clone());
                Ok(())
            }
            None => Err(ScrapeError::HttpStatus { url: address, status: 404 }),
        }
    }

    async fn find_one(&self, selector: &str) -> ScrapeResult<NodeId> {
        self.count_lookup(selector);
        self.with_dom_ref(|dom| dom.matching(selector).first().copied())?
            .ok_or_else(|| ScrapeError::not_found(selector))
    }

    async fn find_all(&self, selector: &str) -> ScrapeResult<Vec<NodeId>> {
        self.count_lookup(selector);
        self.with_dom_ref(|dom| dom.matching(selector))
    }

    async fn find_one_in(&self, scope: &NodeId, selector: &str) -> ScrapeResult<NodeId> {
        self.with_dom_ref(|dom| dom.matching_in(*scope, selector).first().copied())?
            .ok_or_else(|| ScrapeError::not_found(selector))
    }

    async fn find_all_in(&self, scope: &NodeId, selector: &str) -> ScrapeResult<Vec<NodeId>> {
        self.with_dom_ref(|dom| dom.matching_in(*scope, selector))
    }

    async fn text(&self, node: &NodeId) -> ScrapeResult<String> {
        self.with_dom_ref(|dom| dom.elements.get(*node).map(|el| normalize_text(&el.text)))?
            .ok_or_else(|| ScrapeError::interaction("stale node"))
    }

    async fn attribute(&self, node: &NodeId, name: &str) -> ScrapeResult<Option<String>> {
        self.with_dom_ref(|dom| dom.elements.get(*node).and_then(|el| el.attrs.get(name).cloned()))
    }

    async fn scroll_into_view(&self, _node: &NodeId) -> ScrapeResult<()> {
        self.scrolls.set(self.scrolls.get() + 1);
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> ScrapeResult<()> {
        self.scrolls.set(self.scrolls.get() + 1);
        Ok(())
    }

    async fn click(&self, node: &NodeId) -> ScrapeResult<()> {
        self.clicks.borrow_mut().push(*node);
        let mut current = self.current.borrow_mut();
        let dom = current
            .as_mut()
            .ok_or_else(|| ScrapeError::session("no page loaded"))?;

        let behavior = dom
            .elements
            .get(*node)
            .map(|el| el.on_click.clone())
            .ok_or_else(|| ScrapeError::interaction("element detached"))?;

        match behavior {
            ClickBehavior::Inert => Ok(()),
            ClickBehavior::Fails => Err(ScrapeError::interaction("click intercepted")),
            ClickBehavior::Reveals(entries) => {
                dom.revealed = entries;
                Ok(())
            }
        }
    }

    async fn close(&self) -> ScrapeResult<()> {
        self.closed.set(true);
        Ok(())
    }
}

/// Hands out fresh pages over the same site; fails once `max_sessions` are open
pub struct FakeSessionFactory {
    site: FakeSite,
    max_sessions: Option<usize>,
    opened: Cell<usize>,
}

impl FakeSessionFactory {
    pub fn new(site: FakeSite) -> Self {
        Self { site, max_sessions: None, opened: Cell::new(0) }
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.get()
    }
}

#[async_trait(?Send)]
impl SessionFactory for FakeSessionFactory {
    type Session = FakePage;

    async fn open(&self) -> ScrapeResult<FakePage> {
        if let Some(max) = self.max_sessions {
            if self.opened.get() >= max {
                return Err(ScrapeError::session("driver refused a new session"));
            }
        }
        self.opened.set(self.opened.get() + 1);
        Ok(FakePage::new(self.site.clone()))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Configuration for tests: no sleeps, short element waits
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.scraping.base_url = "https://shop.example.com".to_string();
    config.scraping.settle_delay_ms = 0;
    config.scraping.element_timeout_ms = 20;
    config.scraping.poll_interval_ms = 5;
    config.scraping.dispatch_delay_ms = 0;
    config
}

/// Product page using the default product selectors
pub fn product_dom(name: &str) -> FakeDom {
    let mut dom = FakeDom::new();
    dom.add(".categoryName", "Shoes");
    dom.add(".itemTitle", name);
    dom.add(".price-value", "¥12,000");
    dom.add(".sizeSelectorListItemButton", "25.0");
    dom.add(".sizeSelectorListItemButton", "25.5");
    dom.add(".sizeSelectorListItemButton", "disable");
    dom
}
