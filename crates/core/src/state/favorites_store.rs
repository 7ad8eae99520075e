//! # Favorites Store
//!
//! The favorited set is persisted as one JSON array under the `favorites`
//! key. Read-modify-write cycles run under the store's lock, so rapid repeated
//! calls for the same id cannot lose an update.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::storage::KeyValueStorage;
use crate::error::{DexError, DexResult};
use crate::model::{CatalogItem, FavoriteEntry};

/// Storage key of the favorites set
pub const FAVORITES_KEY: &str = "favorites";

/// Persistent set of [`FavoriteEntry`]s, independent of the catalog.
///
/// An entry may outlive its catalog item; readers must tolerate that.
#[derive(Clone)]
pub struct FavoritesStore {
    storage: Arc<dyn KeyValueStorage>,
    write_lock: Arc<Mutex<()>>,
}

impl FavoritesStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn read_entries(&self) -> DexResult<Vec<FavoriteEntry>> {
        let Some(value) = self.storage.get_item(FAVORITES_KEY).await? else {
            return Ok(Vec::new());
        };

        let records: Vec<serde_json::Value> = match serde_json::from_str(&value) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Favorites payload unreadable, treating as empty");
                return Ok(Vec::new());
            }
        };

        let mut seen = HashSet::with_capacity(records.len());
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_value::<FavoriteEntry>(record) {
                Ok(entry) if seen.insert(entry.item_id) => entries.push(entry),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Skipping unreadable favorite entry"),
            }
        }
        Ok(entries)
    }

    async fn write_entries(&self, entries: &[FavoriteEntry]) -> DexResult<()> {
        let json = serde_json::to_string(entries).map_err(|e| DexError::write(FAVORITES_KEY, e))?;
        self.storage.set_item(FAVORITES_KEY, json).await
    }

    /// Current favorites. Order carries no meaning.
    pub async fn list(&self) -> DexResult<Vec<FavoriteEntry>> {
        self.read_entries().await
    }

    /// Ids of every favorited item.
    pub async fn ids(&self) -> DexResult<HashSet<u32>> {
        Ok(self
            .read_entries()
            .await?
            .into_iter()
            .map(|entry| entry.item_id)
            .collect())
    }

    pub async fn is_favorite(&self, id: u32) -> DexResult<bool> {
        Ok(self
            .read_entries()
            .await?
            .iter()
            .any(|entry| entry.item_id == id))
    }

    /// Favorite an item. Already favorited is a no-op.
    pub async fn add(&self, item: &CatalogItem) -> DexResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read_entries().await?;
        if entries.iter().any(|entry| entry.item_id == item.id) {
            debug!(item_id = item.id, "Already a favorite");
            return Ok(());
        }

        entries.push(FavoriteEntry::from_item(item));
        self.write_entries(&entries).await?;

        debug!(item_id = item.id, "Favorite added");
        Ok(())
    }

    /// Unfavorite an id. Not favorited is a no-op.
    pub async fn remove(&self, id: u32) -> DexResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read_entries().await?;
        let before = entries.len();
        entries.retain(|entry| entry.item_id != id);
        if entries.len() == before {
            return Ok(());
        }

        self.write_entries(&entries).await?;

        debug!(item_id = id, "Favorite removed");
        Ok(())
    }

    /// Flip the favorite state of an item and return the new state.
    pub async fn toggle(&self, item: &CatalogItem) -> DexResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read_entries().await?;
        let now_favorite = match entries.iter().position(|e| e.item_id == item.id) {
            Some(index) => {
                entries.remove(index);
                false
            }
            None => {
                entries.push(FavoriteEntry::from_item(item));
                true
            }
        };

        self.write_entries(&entries).await?;

        debug!(item_id = item.id, favorite = now_favorite, "Favorite toggled");
        Ok(now_favorite)
    }
}
