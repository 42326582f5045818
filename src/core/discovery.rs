use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::selectors::ListingSelectors;
use crate::error::ScrapeResult;
use crate::scraper::{Locator, Navigator, Page};

/// Collect product identifiers from listing pages `1..=pages`, in listing
/// order and without duplicates.
///
/// Each listing page is scrolled to the bottom to load every card, then cards
/// are scrolled into view one by one so lazily rendered links get their
/// attributes. Cards without an identifier are skipped. A listing page that
/// fails to load is logged and skipped; an empty page ends the walk early.
pub async fn discover_product_ids<P: Page>(
    page: &P,
    navigator: &Navigator,
    selectors: &ListingSelectors,
    pages: u32,
) -> ScrapeResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for page_number in 1..=pages {
        let url = navigator.listing_url(page_number)?;
        if let Err(e) = navigator.open(page, &url).await {
            if !e.skips_target() {
                return Err(e);
            }
            warn!("Listing page {} failed: {}", page_number, e);
            continue;
        }

        if let Err(e) = page.scroll_to_bottom().await {
            debug!("Could not scroll listing page {}: {}", page_number, e);
        }

        let locator = Locator::new(page);
        let cards = locator.find_all(&selectors.card).await;
        if cards.is_empty() {
            info!("Listing page {} has no products, stopping", page_number);
            break;
        }

        let mut found = 0;
        for card in &cards {
            if let Err(e) = page.scroll_into_view(card).await {
                debug!("Could not scroll card into view: {}", e);
            }

            let id = locator.attribute_in(card, &selectors.link, &selectors.id_attribute).await;
            if id.is_empty() {
                continue;
            }
            found += 1;
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }

        info!("Listing page {}: {} cards, {} identifiers", page_number, cards.len(), found);
    }

    Ok(ids)
}
