//! # Catalog Store
//!
//! Authoritative catalog persistence. Each item lives under its own
//! `pokemon_<id>` key; a `catalog_meta` record remembers the last full
//! replacement. Mutations are serialized through a FIFO lock so a caller's
//! writes land in issue order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::storage::{KeyValueStorage, WriteBatch};
use crate::error::{DexError, DexResult};
use crate::model::CatalogItem;

/// Key prefix shared by every catalog record
pub const ITEM_KEY_PREFIX: &str = "pokemon_";

/// Key of the metadata written by [`CatalogStore::replace_all`]
pub const CATALOG_META_KEY: &str = "catalog_meta";

/// Bookkeeping about the last full catalog replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMeta {
    pub refreshed_at: DateTime<Utc>,
    pub item_count: usize,
}

fn item_key(id: u32) -> String {
    format!("{}{}", ITEM_KEY_PREFIX, id)
}

fn encode(item: &CatalogItem) -> DexResult<String> {
    serde_json::to_string(item).map_err(|e| DexError::write(item_key(item.id), e))
}

/// Decode a stored record, `None` if it is unreadable or filed under the wrong key.
fn decode(key: &str, value: &str) -> Option<CatalogItem> {
    let item = match serde_json::from_str::<CatalogItem>(value) {
        Ok(item) => item,
        Err(e) => {
            warn!(key = %key, error = %e, "Skipping unreadable catalog record");
            return None;
        }
    };

    if item_key(item.id) != key {
        warn!(key = %key, item_id = item.id, "Skipping catalog record filed under the wrong key");
        return None;
    }
    if let Err(e) = item.validate() {
        warn!(key = %key, error = %e, "Skipping invalid catalog record");
        return None;
    }

    Some(item)
}

/// Persistent catalog of [`CatalogItem`]s
#[derive(Clone)]
pub struct CatalogStore {
    storage: Arc<dyn KeyValueStorage>,
    write_lock: Arc<Mutex<()>>,
}

impl CatalogStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Load the persisted catalog, sorted by id.
    ///
    /// Returns an empty list when nothing is stored. Unreadable records are
    /// skipped so one bad entry never hides the rest of the catalog.
    pub async fn load(&self) -> DexResult<Vec<CatalogItem>> {
        let records = self.storage.scan_prefix(ITEM_KEY_PREFIX).await?;
        let total = records.len();

        let mut items: Vec<CatalogItem> = records
            .iter()
            .filter_map(|(key, value)| decode(key, value))
            .collect();
        items.sort_by_key(|item| item.id);

        if items.len() < total {
            warn!(
                skipped = total - items.len(),
                loaded = items.len(),
                "Catalog loaded with unreadable records"
            );
        }

        Ok(items)
    }

    /// Fetch a single item, `None` if absent or unreadable.
    pub async fn get(&self, id: u32) -> DexResult<Option<CatalogItem>> {
        let key = item_key(id);
        Ok(self
            .storage
            .get_item(&key)
            .await?
            .and_then(|value| decode(&key, &value)))
    }

    /// Overwrite the whole catalog in one atomic batch.
    ///
    /// Every item is validated first; a rejected item leaves storage untouched.
    pub async fn replace_all(&self, items: Vec<CatalogItem>) -> DexResult<()> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            item.validate()?;
            if !seen.insert(item.id) {
                return Err(DexError::InvalidItem(format!(
                    "duplicate id {} in catalog replacement",
                    item.id
                )));
            }
        }

        let meta = CatalogMeta {
            refreshed_at: Utc::now(),
            item_count: items.len(),
        };
        let meta_json =
            serde_json::to_string(&meta).map_err(|e| DexError::write(CATALOG_META_KEY, e))?;

        let mut batch = WriteBatch::new().remove_prefix(ITEM_KEY_PREFIX);
        for item in &items {
            batch = batch.set(item_key(item.id), encode(item)?);
        }
        batch = batch.set(CATALOG_META_KEY, meta_json);

        let _guard = self.write_lock.lock().await;
        self.storage.apply(batch).await?;

        info!(items = items.len(), "Catalog replaced");
        Ok(())
    }

    /// Insert the item, or replace the stored item with the same id.
    pub async fn upsert(&self, item: CatalogItem) -> DexResult<()> {
        item.validate()?;
        let value = encode(&item)?;

        let _guard = self.write_lock.lock().await;
        self.storage.set_item(&item_key(item.id), value).await?;

        debug!(item_id = item.id, "Catalog item upserted");
        Ok(())
    }

    /// Edit an existing item in place and persist the result.
    ///
    /// Fails with [`DexError::NotFound`] if no readable item has this id.
    /// The closure may not change the id.
    pub async fn update<F>(&self, id: u32, mutate: F) -> DexResult<CatalogItem>
    where
        F: FnOnce(&mut CatalogItem) + Send,
    {
        let key = item_key(id);
        let _guard = self.write_lock.lock().await;

        let mut item = self
            .storage
            .get_item(&key)
            .await?
            .and_then(|value| decode(&key, &value))
            .ok_or(DexError::NotFound(id))?;

        mutate(&mut item);
        if item.id != id {
            return Err(DexError::InvalidItem(format!(
                "update of item {} tried to change its id to {}",
                id, item.id
            )));
        }
        item.validate()?;

        self.storage.set_item(&key, encode(&item)?).await?;

        debug!(item_id = id, "Catalog item updated");
        Ok(item)
    }

    /// Remove an item. Removing an absent id is a no-op.
    pub async fn delete(&self, id: u32) -> DexResult<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.remove_item(&item_key(id)).await?;

        debug!(item_id = id, "Catalog item deleted");
        Ok(())
    }

    /// Metadata of the last [`replace_all`](Self::replace_all), if any.
    pub async fn meta(&self) -> DexResult<Option<CatalogMeta>> {
        let Some(value) = self.storage.get_item(CATALOG_META_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&value) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable catalog metadata");
                Ok(None)
            }
        }
    }

    pub async fn last_refreshed(&self) -> DexResult<Option<DateTime<Utc>>> {
        Ok(self.meta().await?.map(|m| m.refreshed_at))
    }
}
