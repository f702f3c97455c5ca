use std::path::Path;

use actions_watch_core::models::WatcherSummary;
use anyhow::{Context, Result};

/// Write the summary as pretty JSON, replacing any existing file.
pub fn write_summary(path: impl AsRef<Path>, summary: &WatcherSummary) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
    json.push('\n');
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    tracing::info!("Wrote summary to {}", path.display());
    Ok(())
}
