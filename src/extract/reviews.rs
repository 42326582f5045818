use tracing::debug;

use crate::config::selectors::{ReviewSelectors, ReviewerIdSource};
use crate::models::{ItemRating, ProductMeta, Review};
use crate::scraper::{Locator, Page};

/// Rating summary and reviews. A page without the overall rating has no
/// review block at all and yields an empty `ProductMeta`.
pub async fn extract_product_meta<P: Page>(locator: &Locator<'_, P>, selectors: &ReviewSelectors) -> ProductMeta {
    let overall = match locator.find_one(&selectors.overall_rating).await {
        Ok(node) => locator.text(&node).await,
        Err(_) => {
            debug!("No rating block on page");
            return ProductMeta::default();
        }
    };

    let mut item_ratings = Vec::new();
    for entry in locator.find_all(&selectors.item_rating).await {
        item_ratings.push(ItemRating {
            label: locator.text_in(&entry, &selectors.item_rating_label).await,
            rating: locator
                .attribute_in(&entry, &selectors.item_rating_value, &selectors.item_rating_value_attribute)
                .await,
        });
    }

    let mut user_reviews = Vec::new();
    for node in locator.find_all(&selectors.review).await {
        let raw_id = match &selectors.reviewer_id {
            ReviewerIdSource::Id { .. } => locator.attribute(&node, "id").await.unwrap_or_default(),
            ReviewerIdSource::Href { selector, .. } => locator.attribute_in(&node, selector, "href").await,
        };

        user_reviews.push(Review {
            date: locator.text_in(&node, &selectors.review_date).await,
            rating: locator.text_in(&node, &selectors.review_rating).await,
            title: locator.text_in(&node, &selectors.review_title).await,
            description: locator.text_in(&node, &selectors.review_text).await,
            reviewer_id: parse_reviewer_id(&selectors.reviewer_id, &raw_id),
        });
    }

    ProductMeta {
        overall_rating: overall,
        number_of_reviews: locator.text_of(&selectors.review_count).await,
        recommended_rate: locator.text_of(&selectors.recommended_rate).await,
        item_ratings,
        user_reviews,
    }
}

/// Cut the reviewer id out of an attribute value by position.
///
/// `Id` takes the last segment, or the whole value when the separator does
/// not occur. `Href` takes the second-to-last segment and yields an empty
/// string when there are fewer than two. Neither checks that the segment
/// actually is an id.
pub fn parse_reviewer_id(source: &ReviewerIdSource, value: &str) -> String {
    match source {
        ReviewerIdSource::Id { separator } => {
            if separator.is_empty() {
                return value.to_string();
            }
            value.rsplit(separator.as_str()).next().unwrap_or_default().to_string()
        }
        ReviewerIdSource::Href { separator, .. } => {
            if separator.is_empty() {
                return String::new();
            }
            let parts: Vec<&str> = value.split(separator.as_str()).collect();
            if parts.len() < 2 {
                return String::new();
            }
            parts[parts.len() - 2].to_string()
        }
    }
}
