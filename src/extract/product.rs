use tracing::debug;

use crate::config::selectors::ProductSelectors;
use crate::models::ProductFields;
use crate::scraper::{Locator, Navigator, Page};

/// Read the primary-product fields off the loaded page.
///
/// Every field is optional here; the caller decides whether an empty name
/// invalidates the record.
pub async fn extract_product_fields<P: Page>(
    locator: &Locator<'_, P>,
    selectors: &ProductSelectors,
    navigator: &Navigator,
) -> ProductFields {
    let fields = ProductFields {
        category: locator.text_of(&selectors.category).await,
        name: locator.text_of(&selectors.name).await,
        price: locator.text_of(&selectors.price).await,
        sizes: extract_sizes(locator, selectors).await,
        breadcrumbs: locator.texts_of(&selectors.breadcrumbs).await,
        description_title: locator.text_of(&selectors.description_title).await,
        description_main_text: locator.text_of(&selectors.description_main_text).await,
        description_itemization: locator.texts_of(&selectors.description_items).await,
        image_urls: extract_image_urls(locator, selectors, navigator).await,
        size_fit: locator.text_of(&selectors.size_fit).await,
    };

    debug!(
        "Extracted '{}' with {} sizes, {} breadcrumbs, {} images",
        fields.name,
        fields.sizes.len(),
        fields.breadcrumbs.len(),
        fields.image_urls.len()
    );
    fields
}

/// Size labels in page order, without disabled options
pub async fn extract_sizes<P: Page>(locator: &Locator<'_, P>, selectors: &ProductSelectors) -> Vec<String> {
    locator
        .texts_of(&selectors.sizes)
        .await
        .into_iter()
        .filter(|size| !size.is_empty() && *size != selectors.disabled_size)
        .collect()
}

async fn extract_image_urls<P: Page>(
    locator: &Locator<'_, P>,
    selectors: &ProductSelectors,
    navigator: &Navigator,
) -> Vec<String> {
    let mut urls = Vec::new();
    for image in locator.find_all(&selectors.images).await {
        if let Some(src) = locator.attribute(&image, "src").await {
            let url = navigator.absolutize(&src);
            if !url.is_empty() && !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}
