use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info};

use super::{commit_staged, discard_staged, replace_file, staging_path, SinkStats};
use crate::error::{ScrapeError, ScrapeResult};
use crate::models::ProductRecord;
use crate::utils::sanitize_filename;

/// How far back from the end of the file the closing bracket is searched for
const TAIL_WINDOW: u64 = 4096;

/// Append-only JSON array file.
///
/// New records are added by cutting the closing `]` and writing the objects
/// behind the existing ones, so earlier runs are never re-serialized. The
/// edit happens on a staged copy that is renamed over the file once complete.
/// There is no deduplication.
pub struct JsonSink {
    path: PathBuf,
    per_product_dir: Option<PathBuf>,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>, per_product_dir: Option<PathBuf>) -> Self {
        Self {
            path: path.into(),
            per_product_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, message: impl std::fmt::Display) -> ScrapeError {
        ScrapeError::sink("json", self.path.display().to_string(), message.to_string())
    }

    pub async fn append(&self, records: &[ProductRecord]) -> ScrapeResult<SinkStats> {
        let start_time = std::time::Instant::now();

        if !records.is_empty() {
            let objects = records
                .iter()
                .map(serde_json::to_string_pretty)
                .collect::<Result<Vec<_>, _>>()?
                .join(",\n");

            let existing_len = match tokio::fs::metadata(&self.path).await {
                Ok(meta) => meta.len(),
                Err(_) => 0,
            };

            if existing_len == 0 {
                self.create(&objects).await?;
            } else {
                self.append_to_existing(&objects, existing_len).await?;
            }
        }

        let file_size = tokio::fs::metadata(&self.path).await.map(|m| m.len()).unwrap_or(0);
        info!("JSON sink: appended {} records to {} ({} bytes)", records.len(), self.path.display(), file_size);

        Ok(SinkStats {
            sink: "json",
            file_path: self.path.display().to_string(),
            record_count: records.len(),
            file_size_bytes: file_size,
            duration_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    async fn create(&self, objects: &str) -> ScrapeResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| self.error(e))?;
        }

        debug!("Creating {}", self.path.display());
        replace_file(&self.path, format!("[\n{}\n]", objects).as_bytes())
            .await
            .map_err(|e| self.error(e))
    }

    async fn append_to_existing(&self, objects: &str, len: u64) -> ScrapeResult<()> {
        let staged = staging_path(&self.path);
        if let Err(e) = tokio::fs::copy(&self.path, &staged).await {
            discard_staged(&staged).await;
            return Err(self.error(e));
        }

        match self.append_in_place(&staged, objects, len).await {
            Ok(()) => commit_staged(&staged, &self.path).await.map_err(|e| self.error(e)),
            Err(e) => {
                discard_staged(&staged).await;
                Err(e)
            }
        }
    }

    async fn append_in_place(&self, path: &Path, objects: &str, len: u64) -> ScrapeResult<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .await
            .map_err(|e| self.error(e))?;

        let window = len.min(TAIL_WINDOW);
        let window_start = len - window;
        file.seek(SeekFrom::Start(window_start)).await.map_err(|e| self.error(e))?;
        let mut tail = vec![0u8; window as usize];
        file.read_exact(&mut tail).await.map_err(|e| self.error(e))?;

        let close = tail
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .filter(|&i| tail[i] == b']')
            .ok_or_else(|| self.error("existing file is not a JSON array"))?;

        let empty_array = match tail[..close].iter().rposition(|b| !b.is_ascii_whitespace()) {
            Some(i) => tail[i] == b'[',
            None if window_start == 0 => return Err(self.error("existing file is not a JSON array")),
            None => false,
        };
        let separator = if empty_array { "\n" } else { ",\n" };

        file.set_len(window_start + close as u64).await.map_err(|e| self.error(e))?;
        file.seek(SeekFrom::End(0)).await.map_err(|e| self.error(e))?;
        file.write_all(format!("{}{}\n]", separator, objects).as_bytes())
            .await
            .map_err(|e| self.error(e))?;
        file.flush().await.map_err(|e| self.error(e))?;
        file.sync_all().await.map_err(|e| self.error(e))?;

        Ok(())
    }

    /// Write `product_<id>.json` into the per-product directory, when configured
    pub async fn write_per_product(&self, record: &ProductRecord) -> ScrapeResult<Option<PathBuf>> {
        let Some(dir) = &self.per_product_dir else {
            return Ok(None);
        };

        let path = dir.join(format!("product_{}.json", sanitize_filename(&record.id)));
        let to_sink_error = |e: std::io::Error| ScrapeError::sink("json", path.display().to_string(), e.to_string());

        tokio::fs::create_dir_all(dir).await.map_err(to_sink_error)?;
        let content = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, content).await.map_err(to_sink_error)?;

        debug!("Wrote {}", path.display());
        Ok(Some(path))
    }
}
