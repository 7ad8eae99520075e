//! # Errors
//!
//! Typed failures surfaced by the stores and the remote source.
//! Record-level parse failures never show up here: the stores skip or reset
//! unreadable payloads and log a warning instead.

use thiserror::Error;

/// Convenience alias for store and remote operations.
pub type DexResult<T> = std::result::Result<T, DexError>;

#[derive(Debug, Error)]
pub enum DexError {
    /// The storage backend could not be read (I/O, SQLite, poisoned lock).
    #[error("failed to read '{key}' from storage: {reason}")]
    StorageRead { key: String, reason: String },

    /// The storage backend rejected a write. Nothing was committed.
    #[error("failed to write '{key}' to storage: {reason}")]
    StorageWrite { key: String, reason: String },

    /// Network failure, non-2xx status or undecodable body from the remote source.
    #[error("remote fetch from {url} failed: {reason}")]
    RemoteFetch { url: String, reason: String },

    /// The referenced catalog item does not exist.
    #[error("catalog item {0} not found")]
    NotFound(u32),

    /// The item violates the catalog data model.
    #[error("invalid catalog item: {0}")]
    InvalidItem(String),
}

impl DexError {
    pub(crate) fn read(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::StorageRead {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::StorageWrite {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn remote(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::RemoteFetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether a caller should offer the user a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteFetch { .. } | Self::StorageWrite { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(DexError::remote("http://x", "timeout").is_retryable());
        assert!(DexError::write("favorites", "disk full").is_retryable());
        assert!(!DexError::NotFound(7).is_retryable());
        assert!(!DexError::read("pokemon_1", "io").is_retryable());
    }

    #[test]
    fn test_display_includes_context() {
        let err = DexError::NotFound(42);
        assert_eq!(err.to_string(), "catalog item 42 not found");

        let err = DexError::write("favorites", "disk full");
        assert!(err.to_string().contains("favorites"));
        assert!(err.to_string().contains("disk full"));
    }
}
