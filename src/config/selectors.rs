use serde::{Deserialize, Serialize};

/// CSS selectors for every extracted field. Site-specific, so they live in
/// configuration and default to the layout the pipeline was first written for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    pub page: PageSelectors,
    pub product: ProductSelectors,
    pub size_chart: SizeChartSelectors,
    pub reviews: ReviewSelectors,
    pub coordinates: CoordinateSelectors,
    pub listing: ListingSelectors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSelectors {
    /// Must exist on every loaded page, otherwise the target is skipped
    pub body: String,
    /// Scrolled into view after load so lazy sections render
    pub lazy_load_marker: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductSelectors {
    pub breadcrumbs: String,
    pub category: String,
    pub name: String,
    pub price: String,
    pub sizes: String,
    /// Text of a size button that cannot be selected
    pub disabled_size: String,
    pub description_title: String,
    pub description_main_text: String,
    pub description_items: String,
    pub images: String,
    pub size_fit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeChartSelectors {
    pub header_cell: String,
    pub row: String,
    /// Scoped to each row
    pub cell: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSelectors {
    pub overall_rating: String,
    pub review_count: String,
    pub recommended_rate: String,
    pub item_rating: String,
    pub item_rating_label: String,
    pub item_rating_value: String,
    pub item_rating_value_attribute: String,
    pub review: String,
    pub review_date: String,
    pub review_title: String,
    pub review_text: String,
    pub review_rating: String,
    pub reviewer_id: ReviewerIdSource,
}

/// Where the reviewer id is cut out of. Both variants rely on the position of
/// the id inside the attribute value and are not validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum ReviewerIdSource {
    /// Last segment of the review node's `id`
    Id { separator: String },
    /// Second-to-last segment of the `href` of a link inside the review
    Href { selector: String, separator: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinateSelectors {
    pub items: String,
    pub tile: String,
    pub id_attribute: String,
    pub name: String,
    pub price: String,
    pub image: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    pub card: String,
    pub link: String,
    pub id_attribute: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            body: "body".to_string(),
            lazy_load_marker: ".js-articlePromotion".to_string(),
        }
    }
}

impl Default for ProductSelectors {
    fn default() -> Self {
        Self {
            breadcrumbs: ".breadcrumbListItemLink".to_string(),
            category: ".categoryName".to_string(),
            name: ".itemTitle".to_string(),
            price: ".price-value".to_string(),
            sizes: ".sizeSelectorListItemButton".to_string(),
            disabled_size: "disable".to_string(),
            description_title: ".itemFeature".to_string(),
            description_main_text: ".commentItem-mainText".to_string(),
            description_items: ".articleFeaturesItem.test-feature".to_string(),
            images: ".selectableImageListItem img".to_string(),
            size_fit: ".sizeFitBar .label".to_string(),
        }
    }
}

impl Default for SizeChartSelectors {
    fn default() -> Self {
        Self {
            header_cell: ".sizeChartTHeaderCell".to_string(),
            row: ".sizeChartTRow".to_string(),
            cell: ".sizeChartTCell".to_string(),
        }
    }
}

impl Default for ReviewSelectors {
    fn default() -> Self {
        Self {
            overall_rating: ".BVRRRatingNormalOutOf .BVRRNumber.BVRRRatingNumber".to_string(),
            review_count: ".BVRRNumber.BVRRBuyAgainTotal".to_string(),
            recommended_rate: ".BVRRNumber.BVRRBuyAgainRecommend".to_string(),
            item_rating: ".BVRRSecondaryRatingsContainer .BVRRRatingEntry".to_string(),
            item_rating_label: ".BVRRLabel".to_string(),
            item_rating_value: ".BVRRRatingRadioImage img".to_string(),
            item_rating_value_attribute: "title".to_string(),
            review: ".BVRRContentReview".to_string(),
            review_date: ".BVRRReviewDate".to_string(),
            review_title: ".BVRRValue.BVRRReviewTitle".to_string(),
            review_text: ".BVRRReviewTextContainer".to_string(),
            review_rating: ".BVRRNumber.BVRRRatingNumber".to_string(),
            reviewer_id: ReviewerIdSource::default(),
        }
    }
}

impl Default for ReviewerIdSource {
    fn default() -> Self {
        Self::Id { separator: "_".to_string() }
    }
}

impl Default for CoordinateSelectors {
    fn default() -> Self {
        Self {
            items: ".coordinateItems .carouselListitem".to_string(),
            tile: ".coordinate_item_tile".to_string(),
            id_attribute: "data-articleid".to_string(),
            name: ".coordinate_item_container .title".to_string(),
            price: ".coordinate_item_container .price-value".to_string(),
            image: ".coordinate_image_body.test-img".to_string(),
            link: ".coordinate_item_container .test-link_a".to_string(),
        }
    }
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            card: ".itemCardArea-cards".to_string(),
            link: ".image_link".to_string(),
            id_attribute: "data-ga-eec-product-id".to_string(),
        }
    }
}

impl SelectorSet {
    /// Selectors that must be non-empty for the pipeline to run.
    pub(crate) fn required(&self) -> [(&'static str, &str); 4] {
        [
            ("page.body", self.page.body.as_str()),
            ("product.name", self.product.name.as_str()),
            ("coordinates.items", self.coordinates.items.as_str()),
            ("size_chart.row", self.size_chart.row.as_str()),
        ]
    }
}
