use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub mod json_exporter;
pub mod xlsx_exporter;

pub use json_exporter::JsonSink;
pub use xlsx_exporter::SpreadsheetSink;

use crate::config::ExportConfig;
use crate::error::ScrapeError;
use crate::models::ProductRecord;

/// `products.json` is staged as `products.json.tmp` in the same directory
pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Move a fully written staging file over `path`. The rename is atomic on
/// the same filesystem, so `path` is either the old file or the new one.
pub(crate) async fn commit_staged(staged: &Path, path: &Path) -> std::io::Result<()> {
    if let Err(e) = tokio::fs::rename(staged, path).await {
        discard_staged(staged).await;
        return Err(e);
    }
    Ok(())
}

pub(crate) async fn discard_staged(staged: &Path) {
    if let Err(e) = tokio::fs::remove_file(staged).await {
        debug!("Could not remove {}: {}", staged.display(), e);
    }
}

/// Write `content` to `path` through a staging file
pub(crate) async fn replace_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let staged = staging_path(path);
    if let Err(e) = tokio::fs::write(&staged, content).await {
        discard_staged(&staged).await;
        return Err(e);
    }
    commit_staged(&staged, path).await
}

/// Export statistics for one sink
#[derive(Debug, Clone, Serialize)]
pub struct SinkStats {
    pub sink: &'static str,
    pub file_path: String,
    pub record_count: usize,
    pub file_size_bytes: u64,
    pub duration_ms: u64,
}

/// What each sink did with one batch
#[derive(Debug, Default)]
pub struct ExportOutcome {
    pub stats: Vec<SinkStats>,
    pub failures: Vec<ScrapeError>,
}

impl ExportOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Writes finished records to the JSON and spreadsheet sinks.
///
/// The sinks are independent: a failure in one is reported and the other
/// still runs.
pub struct ExportManager {
    json: JsonSink,
    sheet: SpreadsheetSink,
}

impl ExportManager {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            json: JsonSink::new(&config.json_path, config.per_product_dir.clone()),
            sheet: SpreadsheetSink::new(&config.sheet_path),
        }
    }

    pub async fn export(&self, records: &[ProductRecord]) -> ExportOutcome {
        let mut outcome = ExportOutcome::default();

        if records.is_empty() {
            info!("No records to export");
            return outcome;
        }

        info!("Exporting {} records", records.len());

        match self.json.append(records).await {
            Ok(stats) => outcome.stats.push(stats),
            Err(e) => {
                error!("JSON export failed: {}", e);
                outcome.failures.push(e);
            }
        }

        for record in records {
            if let Err(e) = self.json.write_per_product(record).await {
                error!("Per-product export of {} failed: {}", record.id, e);
                outcome.failures.push(e);
            }
        }

        match self.sheet.append(records).await {
            Ok(stats) => outcome.stats.push(stats),
            Err(e) => {
                error!("Spreadsheet export failed: {}", e);
                outcome.failures.push(e);
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> ProductRecord {
        ProductRecord {
            id: id.to_string(),
            name: "Sample Shoe".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sinks_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let broken_sheet = dir.path().join("products.xml");
        tokio::fs::write(&broken_sheet, "garbage").await.unwrap();

        let config = ExportConfig {
            json_path: dir.path().join("products.json"),
            sheet_path: broken_sheet,
            per_product_dir: Some(dir.path().join("per_product")),
        };
        let manager = ExportManager::new(&config);

        let outcome = manager.export(&[record("IE3439"), record("IF9280")]).await;

        assert!(!outcome.is_complete());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.stats.len(), 1);
        assert_eq!(outcome.stats[0].sink, "json");
        assert_eq!(outcome.stats[0].record_count, 2);
        assert!(dir.path().join("per_product").join("product_IF9280.json").exists());
    }

    #[test]
    fn test_staging_path_is_a_sibling() {
        let staged = staging_path(Path::new("dist/json/products.json"));
        assert_eq!(staged, PathBuf::from("dist/json/products.json.tmp"));
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_the_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.xml");
        tokio::fs::write(&path, "old").await.unwrap();
        tokio::fs::create_dir(staging_path(&path)).await.unwrap();

        assert!(replace_file(&path, b"new").await.is_err());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "old");

        tokio::fs::remove_dir(staging_path(&path)).await.unwrap();
        replace_file(&path, b"new").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "new");
        assert!(!staging_path(&path).exists());
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            json_path: dir.path().join("products.json"),
            sheet_path: dir.path().join("products.xml"),
            per_product_dir: None,
        };

        let outcome = ExportManager::new(&config).export(&[]).await;
        assert!(outcome.is_complete());
        assert!(!config.json_path.exists());
        assert!(!config.sheet_path.exists());
    }
}
