//! Text, path and target-list helpers.

use anyhow::Result;
use std::path::Path;

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Format duration in human readable format
pub fn format_duration(duration: std::time::Duration) -> String {
    let total_seconds = duration.as_secs();

    if total_seconds < 60 {
        format!("{}.{:03}s", total_seconds, duration.subsec_millis())
    } else if total_seconds < 3600 {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        format!("{}m {}s", minutes, seconds)
    } else {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        format!("{}h {}m {}s", hours, minutes, seconds)
    }
}

/// Sanitize filename for filesystem
pub fn sanitize_filename(filename: &str) -> String {
    let invalid_chars = ['<', '>', ':', '"', '|', '?', '*', '/', '\\'];
    let mut sanitized = filename.trim().to_string();

    for &ch in &invalid_chars {
        sanitized = sanitized.replace(ch, "_");
    }

    if sanitized.len() > 200 {
        let mut cut = 200;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
    }

    sanitized
}

/// Parse a target list: one identifier per line, blank lines and `#` comments ignored
pub fn parse_target_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a target list file
pub async fn read_target_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path.as_ref()).await.map_err(|e| {
        anyhow::anyhow!("Failed to read targets file {}: {}", path.as_ref().display(), e)
    })?;
    Ok(parse_target_list(&content))
}
