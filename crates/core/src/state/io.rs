//! # IO Utilities
//!
//! File system helpers for the `.dexcache` data directory, which holds the
//! SQLite database and `config.json`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "DEXCACHE_DATA_DIR";

/// Get the data directory path (.dexcache)
pub fn get_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".dexcache")
}

/// Ensure the data directory exists
pub async fn ensure_data_dir() -> Result<PathBuf> {
    let path = get_data_dir();
    fs::create_dir_all(&path)
        .await
        .with_context(|| format!("Failed to create data directory: {:?}", path))?;
    Ok(path)
}

/// Read a file from the data directory, `None` if it does not exist
pub async fn read_data_file(relative_path: impl AsRef<Path>) -> Result<Option<String>> {
    let path = get_data_dir().join(relative_path.as_ref());
    if !file_exists(relative_path).await {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read file: {:?}", path))?;
    Ok(Some(content))
}

/// Write a file to the data directory.
///
/// The content goes to a sibling temp file first and is renamed into place,
/// so a reader never sees a truncated file.
pub async fn write_data_file(relative_path: impl AsRef<Path>, content: &str) -> Result<()> {
    let path = get_data_dir().join(relative_path);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)
        .await
        .with_context(|| format!("Failed to write file: {:?}", tmp))?;
    fs::rename(&tmp, &path)
        .await
        .with_context(|| format!("Failed to move {:?} into place", tmp))
}

/// Check if a data file exists
pub async fn file_exists(relative_path: impl AsRef<Path>) -> bool {
    let path = get_data_dir().join(relative_path);
    fs::metadata(&path).await.is_ok()
}
