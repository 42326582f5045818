//! Field extractors: named rules built from locator calls.
//!
//! Optional fields that are missing come back empty and never abort the
//! rest of the record.

pub mod coordinates;
pub mod product;
pub mod reviews;
pub mod size_chart;

pub use coordinates::{CoordinateWalker, ItemState, WalkReport};
pub use product::{extract_product_fields, extract_sizes};
pub use reviews::{extract_product_meta, parse_reviewer_id};
pub use size_chart::extract_size_chart;
