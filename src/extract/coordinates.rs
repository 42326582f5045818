use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::selectors::SelectorSet;
use crate::config::{CoordinateMode, ScrapingConfig};
use crate::error::{ScrapeError, ScrapeResult};
use crate::models::CoordinatedItemRecord;
use crate::scraper::{Locator, Navigator, Page};

/// Where one coordinated item ended up
#[derive(Debug, Clone, PartialEq)]
pub enum ItemState {
    Pending,
    Activated,
    Extracted(CoordinatedItemRecord),
    Skipped(String),
}

/// What the detail pane showed before an item was clicked, and which
/// article the item itself points at
#[derive(Debug, Default)]
struct PaneWatch {
    expected_id: String,
    before: CoordinatedItemRecord,
}

impl PaneWatch {
    /// The pane belongs to the clicked item: its own article id when the item
    /// carries one, otherwise any change from what was shown before the click.
    fn is_switched(&self, pane: &CoordinatedItemRecord) -> bool {
        if pane.name.is_empty() {
            return false;
        }
        if self.expected_id.is_empty() {
            return *pane != self.before;
        }
        pane.product_number == self.expected_id || pane.page_url.contains(&format!("/{}/", self.expected_id))
    }
}

/// Outcome of one walk, in input order
#[derive(Debug, Default)]
pub struct WalkReport {
    pub states: Vec<ItemState>,
}

impl WalkReport {
    pub fn records(&self) -> Vec<CoordinatedItemRecord> {
        self.states
            .iter()
            .filter_map(|state| match state {
                ItemState::Extracted(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn skipped(&self) -> usize {
        self.states.iter().filter(|s| matches!(s, ItemState::Skipped(_))).count()
    }
}

/// Visits every coordinated item on the current product page once.
///
/// Carousel mode clicks each item and re-reads the shared detail pane.
/// Direct mode reads each item's product id and loads that product's page,
/// which leaves the session on the last coordinated page.
pub struct CoordinateWalker<'a> {
    selectors: &'a SelectorSet,
    navigator: &'a Navigator,
    mode: CoordinateMode,
    settle_delay: Duration,
    element_timeout: Duration,
    poll_interval: Duration,
}

impl<'a> CoordinateWalker<'a> {
    pub fn new(config: &ScrapingConfig, selectors: &'a SelectorSet, navigator: &'a Navigator) -> Self {
        Self {
            selectors,
            navigator,
            mode: config.coordinate_mode,
            settle_delay: config.settle_delay(),
            element_timeout: config.element_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn with_mode(mut self, mode: CoordinateMode) -> Self {
        self.mode = mode;
        self
    }

    pub async fn walk<P: Page>(&self, locator: &Locator<'_, P>) -> WalkReport {
        let items = locator.find_all(&self.selectors.coordinates.items).await;
        if items.is_empty() {
            debug!("No coordinated items on page");
            return WalkReport::default();
        }

        info!("Walking {} coordinated items ({:?} mode)", items.len(), self.mode);

        let report = match self.mode {
            CoordinateMode::Carousel => self.walk_carousel(locator, &items).await,
            CoordinateMode::Direct => self.walk_direct(locator, &items).await,
        };

        if report.skipped() > 0 {
            warn!("Skipped {} of {} coordinated items", report.skipped(), items.len());
        }
        report
    }

    async fn walk_carousel<P: Page>(&self, locator: &Locator<'_, P>, items: &[P::Node]) -> WalkReport {
        let mut report = WalkReport::default();

        for (index, item) in items.iter().enumerate() {
            let mut state = ItemState::Pending;
            let mut watch = PaneWatch::default();

            loop {
                state = match state {
                    ItemState::Pending => match self.activate(locator, item).await {
                        Ok(w) => {
                            watch = w;
                            ItemState::Activated
                        }
                        Err(e) => ItemState::Skipped(e.to_string()),
                    },
                    ItemState::Activated => match self.await_detail_pane(locator, &watch).await {
                        Ok(record) => ItemState::Extracted(record),
                        Err(e) => ItemState::Skipped(e.to_string()),
                    },
                    done => break report.states.push(done),
                };
            }

            if let Some(ItemState::Skipped(reason)) = report.states.last() {
                debug!("Coordinated item {} skipped: {}", index, reason);
            }
        }

        report
    }

    async fn activate<P: Page>(&self, locator: &Locator<'_, P>, item: &P::Node) -> ScrapeResult<PaneWatch> {
        let selectors = &self.selectors.coordinates;
        let watch = PaneWatch {
            expected_id: locator.attribute_in(item, &selectors.tile, &selectors.id_attribute).await,
            before: self.read_detail_pane(locator).await,
        };

        let page = locator.page();
        if let Err(e) = page.scroll_into_view(item).await {
            debug!("Scroll into view failed: {}", e);
        }
        page.click(item).await?;
        Ok(watch)
    }

    /// Re-read the shared pane until it shows the clicked item. Still showing
    /// the previous item at the element timeout is an error.
    async fn await_detail_pane<P: Page>(&self, locator: &Locator<'_, P>, watch: &PaneWatch) -> ScrapeResult<CoordinatedItemRecord> {
        if self.element_timeout.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let deadline = Instant::now() + self.element_timeout;
        loop {
            let pane = self.read_detail_pane(locator).await;
            if watch.is_switched(&pane) {
                return Ok(pane);
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::interaction(format!(
                    "detail pane did not switch to {} within {}ms",
                    if watch.expected_id.is_empty() { "the clicked item" } else { watch.expected_id.as_str() },
                    self.element_timeout.as_millis()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn read_detail_pane<P: Page>(&self, locator: &Locator<'_, P>) -> CoordinatedItemRecord {
        let selectors = &self.selectors.coordinates;
        CoordinatedItemRecord {
            name: locator.text_of(&selectors.name).await,
            price: locator.text_of(&selectors.price).await,
            product_number: locator.attribute_of(&selectors.tile, &selectors.id_attribute).await,
            image_url: self.navigator.absolutize(&locator.attribute_of(&selectors.image, "src").await),
            page_url: self.navigator.absolutize(&locator.attribute_of(&selectors.link, "href").await),
        }
    }

    async fn walk_direct<P: Page>(&self, locator: &Locator<'_, P>, items: &[P::Node]) -> WalkReport {
        let selectors = &self.selectors.coordinates;

        // Read every id before leaving the parent page
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let mut id = locator.attribute_in(item, &selectors.tile, &selectors.id_attribute).await;
            if id.is_empty() {
                id = locator.attribute(item, &selectors.id_attribute).await.unwrap_or_default();
            }
            ids.push(id);
        }

        let mut report = WalkReport::default();
        for id in ids {
            let state = if id.is_empty() {
                let missing = ScrapeError::AttributeMissing {
                    selector: selectors.tile.clone(),
                    attribute: selectors.id_attribute.clone(),
                };
                ItemState::Skipped(missing.to_string())
            } else {
                match self.load_coordinated_page(locator, &id).await {
                    Ok(record) => ItemState::Extracted(record),
                    Err(e) => {
                        debug!("Coordinated product {} skipped: {}", id, e);
                        ItemState::Skipped(e.to_string())
                    }
                }
            };
            report.states.push(state);
        }

        report
    }

    async fn load_coordinated_page<P: Page>(&self, locator: &Locator<'_, P>, id: &str) -> ScrapeResult<CoordinatedItemRecord> {
        let url = self.navigator.product_url(id)?;
        self.navigator.open(locator.page(), &url).await?;

        let product = &self.selectors.product;
        let name = match locator.wait_for(&product.name).await {
            Ok(node) => locator.text(&node).await,
            Err(_) => String::new(),
        };
        if name.is_empty() {
            return Err(ScrapeError::MissingRequiredField {
                field: "Name".to_string(),
                target: id.to_string(),
            });
        }

        Ok(CoordinatedItemRecord {
            name,
            price: locator.text_of(&product.price).await,
            product_number: id.to_string(),
            image_url: self.navigator.absolutize(&locator.attribute_of(&product.images, "src").await),
            page_url: url.to_string(),
        })
    }
}
