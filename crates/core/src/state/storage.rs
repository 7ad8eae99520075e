//! # Key-Value Storage
//!
//! The persistence seam under both stores: string keys mapped to string
//! values, plus atomic write batches. A batch is applied entirely or not at
//! all, and a prefix scan observes a single consistent state.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{DexError, DexResult};

/// One mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Set { key: String, value: String },
    Remove { key: String },
    RemovePrefix { prefix: String },
}

impl WriteOp {
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Set { key, .. } | WriteOp::Remove { key } => key,
            WriteOp::RemovePrefix { prefix } => prefix,
        }
    }
}

/// Ordered list of mutations committed as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(WriteOp::Set {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.ops.push(WriteOp::Remove { key: key.into() });
        self
    }

    pub fn remove_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ops.push(WriteOp::RemovePrefix {
            prefix: prefix.into(),
        });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Key used to label errors for this batch.
    pub(crate) fn label(&self) -> String {
        match self.ops.as_slice() {
            [] => String::new(),
            [op] => op.key().to_string(),
            [first, ..] => format!("{} (+{} more)", first.key(), self.ops.len() - 1),
        }
    }
}

/// Async key-value persistence used by the catalog and favorites stores.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Read a single value.
    async fn get_item(&self, key: &str) -> DexResult<Option<String>>;

    /// Read every `(key, value)` whose key starts with `prefix`, ordered by key.
    async fn scan_prefix(&self, prefix: &str) -> DexResult<Vec<(String, String)>>;

    /// Commit a batch atomically.
    async fn apply(&self, batch: WriteBatch) -> DexResult<()>;

    async fn set_item(&self, key: &str, value: String) -> DexResult<()> {
        self.apply(WriteBatch::new().set(key, value)).await
    }

    async fn remove_item(&self, key: &str) -> DexResult<()> {
        self.apply(WriteBatch::new().remove(key)).await
    }
}

/// In-memory storage backed by a `BTreeMap`.
///
/// Clone-friendly via Arc; clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get_item(&self, key: &str) -> DexResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| DexError::read(key, "lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    async fn scan_prefix(&self, prefix: &str) -> DexResult<Vec<(String, String)>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| DexError::read(prefix, "lock poisoned"))?;

        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn apply(&self, batch: WriteBatch) -> DexResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DexError::write(batch.label(), "lock poisoned"))?;

        for op in batch.ops {
            match op {
                WriteOp::Set { key, value } => {
                    entries.insert(key, value);
                }
                WriteOp::Remove { key } => {
                    entries.remove(&key);
                }
                WriteOp::RemovePrefix { prefix } => {
                    entries.retain(|k, _| !k.starts_with(&prefix));
                }
            }
        }

        Ok(())
    }
}

/// Memory storage whose writes can be switched to fail, for error-path tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct FlakyStorage {
    pub(crate) inner: MemoryStorage,
    fail_writes: Arc<std::sync::atomic::AtomicBool>,
}

#[cfg(test)]
impl FlakyStorage {
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
#[async_trait]
impl KeyValueStorage for FlakyStorage {
    async fn get_item(&self, key: &str) -> DexResult<Option<String>> {
        self.inner.get_item(key).await
    }

    async fn scan_prefix(&self, prefix: &str) -> DexResult<Vec<(String, String)>> {
        self.inner.scan_prefix(prefix).await
    }

    async fn apply(&self, batch: WriteBatch) -> DexResult<()> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(DexError::write(batch.label(), "injected write failure"));
        }
        self.inner.apply(batch).await
    }
}
