//! Product records produced by the extraction pipeline.
//!
//! Field names serialize in PascalCase so the persisted JSON matches the
//! column headers of the spreadsheet sink.

use serde::{Deserialize, Serialize};

/// One scraped product page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductRecord {
    #[serde(rename = "ID")]
    pub id: String,
    pub category: String,
    pub name: String,
    pub price: String,
    pub sizes: Vec<String>,
    pub breadcrumbs: Vec<String>,
    pub description_title: String,
    pub description_main_text: String,
    pub description_itemization: Vec<String>,
    #[serde(rename = "ImageURLs", default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub size_fit: String,
    pub size_chart: SizeChart,
    pub product_meta: ProductMeta,
    pub coordinates: Vec<CoordinatedItemRecord>,
}

/// A cross-sell item shown next to the primary product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CoordinatedItemRecord {
    pub name: String,
    pub price: String,
    pub product_number: String,
    #[serde(rename = "ImageURL")]
    pub image_url: String,
    #[serde(rename = "ProductPageURL")]
    pub page_url: String,
}

/// Size chart table. `measurements[0]` is the header row when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SizeChart {
    #[serde(rename = "CategoryNames")]
    pub column_headers: Vec<String>,
    pub measurements: Vec<Vec<String>>,
}

impl SizeChart {
    /// Data rows, without the header row.
    pub fn data_rows(&self) -> &[Vec<String>] {
        if self.measurements.is_empty() {
            &[]
        } else {
            &self.measurements[1..]
        }
    }

    /// Rows whose cell count differs from the header. Extraction tolerates these.
    pub fn ragged_rows(&self) -> usize {
        let width = self.column_headers.len();
        self.data_rows().iter().filter(|row| row.len() != width).count()
    }

    /// Flat text used for the spreadsheet cell.
    pub fn to_cell_text(&self) -> String {
        self.measurements
            .iter()
            .map(|row| row.join(" | "))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Rating and review block of a product page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductMeta {
    pub overall_rating: String,
    pub number_of_reviews: String,
    pub recommended_rate: String,
    pub item_ratings: Vec<ItemRating>,
    pub user_reviews: Vec<Review>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemRating {
    pub label: String,
    pub rating: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Review {
    pub date: String,
    pub rating: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "ReviewerID")]
    pub reviewer_id: String,
}

/// Primary-product fields gathered by the field extractors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFields {
    pub category: String,
    pub name: String,
    pub price: String,
    pub sizes: Vec<String>,
    pub breadcrumbs: Vec<String>,
    pub description_title: String,
    pub description_main_text: String,
    pub description_itemization: Vec<String>,
    pub image_urls: Vec<String>,
    pub size_fit: String,
}

impl ProductRecord {
    /// Assemble the final record for one target. Pure construction.
    pub fn assemble(
        id: impl Into<String>,
        fields: ProductFields,
        size_chart: SizeChart,
        product_meta: ProductMeta,
        coordinates: Vec<CoordinatedItemRecord>,
    ) -> Self {
        Self {
            id: id.into(),
            category: fields.category,
            name: fields.name,
            price: fields.price,
            sizes: fields.sizes,
            breadcrumbs: fields.breadcrumbs,
            description_title: fields.description_title,
            description_main_text: fields.description_main_text,
            description_itemization: fields.description_itemization,
            image_urls: fields.image_urls,
            size_fit: fields.size_fit,
            size_chart,
            product_meta,
            coordinates,
        }
    }
}
