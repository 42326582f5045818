use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{replace_file, SinkStats};
use crate::error::{ScrapeError, ScrapeResult};
use crate::models::ProductRecord;

/// Column order of the `Products` sheet
pub const HEADERS: [&str; 18] = [
    "ID",
    "Category",
    "Name",
    "Price",
    "Sizes",
    "Breadcrumbs",
    "Coordinates",
    "Description Title",
    "Description MainText",
    "Description Itemization",
    "SizeChart",
    "OverallRating",
    "NumberOfReviews",
    "RecommendedRate",
    "ItemRatings",
    "UserReviews",
    "ImageURLs",
    "SizeFit",
];

const SHEET_NAME: &str = "Products";
const TABLE_CLOSE: &str = "    </Table>\n";

/// Spreadsheet sink writing SpreadsheetML 2003 XML, which Excel and
/// LibreOffice open as a workbook.
///
/// The file is opened or created; the header row is only written on
/// creation. Rows are appended, never deduplicated.
pub struct SpreadsheetSink {
    path: PathBuf,
}

impl SpreadsheetSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, message: impl std::fmt::Display) -> ScrapeError {
        ScrapeError::sink("spreadsheet", self.path.display().to_string(), message.to_string())
    }

    pub async fn append(&self, records: &[ProductRecord]) -> ScrapeResult<SinkStats> {
        let start_time = std::time::Instant::now();

        let mut rows = String::new();
        for record in records {
            rows.push_str(&render_row(&record_cells(record)?));
        }

        let document = if self.path.exists() {
            let existing = tokio::fs::read_to_string(&self.path).await.map_err(|e| self.error(e))?;
            let at = existing
                .rfind("</Table>")
                .ok_or_else(|| self.error("existing file has no worksheet table"))?;
            let line_start = existing[..at].rfind('\n').map(|i| i + 1).unwrap_or(at);
            let insert_at = if existing[line_start..at].trim().is_empty() { line_start } else { at };

            let mut document = String::with_capacity(existing.len() + rows.len());
            document.push_str(&existing[..insert_at]);
            document.push_str(&rows);
            document.push_str(&existing[insert_at..]);
            document
        } else {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| self.error(e))?;
            }
            debug!("Creating workbook {}", self.path.display());

            let header: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
            let mut document = String::new();
            document.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
            document.push_str("<Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\"\n");
            document.push_str("          xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n");
            document.push_str(&format!("  <Worksheet ss:Name=\"{}\">\n", SHEET_NAME));
            document.push_str("    <Table>\n");
            document.push_str(&render_row(&header));
            document.push_str(&rows);
            document.push_str(TABLE_CLOSE);
            document.push_str("  </Worksheet>\n");
            document.push_str("</Workbook>\n");
            document
        };

        replace_file(&self.path, document.as_bytes()).await.map_err(|e| self.error(e))?;

        info!("Spreadsheet sink: appended {} rows to {}", records.len(), self.path.display());

        Ok(SinkStats {
            sink: "spreadsheet",
            file_path: self.path.display().to_string(),
            record_count: records.len(),
            file_size_bytes: document.len() as u64,
            duration_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}

/// Cell values in header order; nested values are embedded as JSON
pub fn record_cells(record: &ProductRecord) -> ScrapeResult<Vec<String>> {
    let meta = &record.product_meta;
    Ok(vec![
        record.id.clone(),
        record.category.clone(),
        record.name.clone(),
        record.price.clone(),
        serde_json::to_string(&record.sizes)?,
        serde_json::to_string(&record.breadcrumbs)?,
        serde_json::to_string(&record.coordinates)?,
        record.description_title.clone(),
        record.description_main_text.clone(),
        serde_json::to_string(&record.description_itemization)?,
        record.size_chart.to_cell_text(),
        meta.overall_rating.clone(),
        meta.number_of_reviews.clone(),
        meta.recommended_rate.clone(),
        serde_json::to_string(&meta.item_ratings)?,
        serde_json::to_string(&meta.user_reviews)?,
        serde_json::to_string(&record.image_urls)?,
        record.size_fit.clone(),
    ])
}

fn render_row(cells: &[String]) -> String {
    let mut row = String::from("      <Row>");
    for cell in cells {
        let escaped = html_escape::encode_text(cell).replace('\n', "&#10;");
        row.push_str(&format!("<Cell><Data ss:Type=\"String\">{}</Data></Cell>", escaped));
    }
    row.push_str("</Row>\n");
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CoordinatedItemRecord, SizeChart};

    fn record(id: &str) -> ProductRecord {
        ProductRecord {
            id: id.to_string(),
            name: "Tom & Jerry <Tee>".to_string(),
            sizes: vec!["S".to_string(), "M".to_string()],
            size_chart: SizeChart {
                column_headers: vec!["Size".to_string()],
                measurements: vec![vec!["Size".to_string()], vec!["S".to_string()]],
            },
            coordinates: vec![CoordinatedItemRecord {
                name: "Pants".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_cells_follow_header_order() {
        let cells = record_cells(&record("IE3439")).unwrap();
        assert_eq!(cells.len(), HEADERS.len());
        assert_eq!(cells[0], "IE3439");
        assert_eq!(cells[4], "[\"S\",\"M\"]");
        assert!(cells[6].contains("\"Name\":\"Pants\""));
        assert_eq!(cells[10], "Size\nS");
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheets").join("products.xml");
        let sink = SpreadsheetSink::new(&path);

        sink.append(&[record("IE3439")]).await.unwrap();
        sink.append(&[record("IF9280"), record("IE3439")]).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.matches("<Row>").count(), 4);
        assert_eq!(content.matches(">ID<").count(), 1);
        assert_eq!(content.matches("ss:Name=\"Products\"").count(), 1);
        assert!(content.contains("Tom &amp; Jerry &lt;Tee&gt;"));
        assert!(content.contains("Size&#10;S"));
        assert!(content.trim_end().ends_with("</Workbook>"));

        let first = content.find("IE3439").unwrap();
        let second = content.find("IF9280").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.xml");
        tokio::fs::write(&path, "not a workbook").await.unwrap();

        let err = SpreadsheetSink::new(&path).append(&[record("IE3439")]).await.unwrap_err();
        assert_eq!(err.category(), "sink");
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.xml");
        let sink = SpreadsheetSink::new(&path);
        sink.append(&[record("IE3439")]).await.unwrap();
        let before = tokio::fs::read_to_string(&path).await.unwrap();

        let staged = crate::export::staging_path(&path);
        tokio::fs::create_dir(&staged).await.unwrap();
        assert!(sink.append(&[record("IF9280")]).await.is_err());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), before);

        tokio::fs::remove_dir(&staged).await.unwrap();
        sink.append(&[record("IF9280")]).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.matches("<Row>").count(), 3);
        assert!(!staged.exists());
    }
}
