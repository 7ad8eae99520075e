//! # Dex
//!
//! Entry point the CLI and the HTTP server talk to. Owns one
//! [`CatalogStore`], one [`FavoritesStore`] and the [`RemoteSource`], and
//! joins them into the views the presentation layer renders.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{DexConfig, StorageBackend, DEFAULT_FETCH_LIMIT};
use crate::error::{DexError, DexResult};
use crate::grouping::{self, AnnotatedItem, GroupOrder, GroupedCatalog};
use crate::model::{CatalogItem, FavoriteEntry};
use crate::remote::{HttpRemoteSource, RemoteSource};
use crate::state::{
    CatalogStore, DexDb, FavoritesStore, KeyValueStorage, MemoryStorage, SqliteStorage,
};

#[derive(Clone)]
pub struct Dex {
    catalog: CatalogStore,
    favorites: FavoritesStore,
    remote: Arc<dyn RemoteSource>,
    fetch_limit: usize,
}

impl Dex {
    /// Build both stores on one storage backend.
    pub fn new(
        storage: Arc<dyn KeyValueStorage>,
        remote: Arc<dyn RemoteSource>,
        fetch_limit: usize,
    ) -> Self {
        Self {
            catalog: CatalogStore::new(Arc::clone(&storage)),
            favorites: FavoritesStore::new(storage),
            remote,
            fetch_limit,
        }
    }

    /// Wire up storage and the HTTP remote source from config.
    pub fn open(config: &DexConfig) -> Result<Self> {
        let storage: Arc<dyn KeyValueStorage> = match config.storage {
            StorageBackend::Sqlite => {
                let path = config.database_path();
                let db = DexDb::open_at(&path)
                    .with_context(|| format!("Failed to open catalog database {:?}", path))?;
                Arc::new(SqliteStorage::new(&db))
            }
            StorageBackend::Memory => {
                warn!("Using in-memory storage, nothing will be persisted");
                Arc::new(MemoryStorage::new())
            }
        };

        let remote = HttpRemoteSource::new(&config.remote_endpoint, config.request_timeout())
            .context("Failed to set up remote source")?;

        Ok(Self::new(storage, Arc::new(remote), config.fetch_limit))
    }

    /// Ephemeral instance over [`MemoryStorage`].
    pub fn in_memory(remote: Arc<dyn RemoteSource>) -> Self {
        Self::new(Arc::new(MemoryStorage::new()), remote, DEFAULT_FETCH_LIMIT)
    }

    pub fn with_fetch_limit(mut self, fetch_limit: usize) -> Self {
        self.fetch_limit = fetch_limit;
        self
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    pub fn fetch_limit(&self) -> usize {
        self.fetch_limit
    }

    /// Replace the catalog with a fresh remote fetch.
    ///
    /// On a failed fetch the persisted catalog is left as it was.
    pub async fn refresh(&self) -> DexResult<usize> {
        let items = self.remote.fetch_catalog(self.fetch_limit).await?;
        let count = items.len();
        self.catalog.replace_all(items).await?;

        info!(items = count, "Catalog refreshed from remote");
        Ok(count)
    }

    /// Re-fetch one item and upsert it.
    pub async fn refresh_item(&self, id: u32) -> DexResult<CatalogItem> {
        let item = self.remote.fetch_one(id).await?;
        self.catalog.upsert(item.clone()).await?;
        Ok(item)
    }

    /// Flat list, sorted by id, with favorite flags.
    pub async fn catalog_view(&self) -> DexResult<Vec<AnnotatedItem>> {
        let items = self.catalog.load().await?;
        let favorites = self.favorites.ids().await?;
        Ok(grouping::annotate(&items, &favorites))
    }

    pub async fn grouped_view(&self, order: GroupOrder) -> DexResult<GroupedCatalog> {
        let items = self.catalog.load().await?;
        let favorites = self.favorites.ids().await?;
        Ok(grouping::group_with_order(&items, &favorites, order))
    }

    pub async fn item_view(&self, id: u32) -> DexResult<AnnotatedItem> {
        let item = self.catalog.get(id).await?.ok_or(DexError::NotFound(id))?;
        let favorites = self.favorites.ids().await?;
        Ok(AnnotatedItem::new(item, &favorites))
    }

    pub async fn favorites_list(&self) -> DexResult<Vec<FavoriteEntry>> {
        self.favorites.list().await
    }

    /// Flip an item's favorite state and return the new state.
    ///
    /// Unfavoriting works for items that already left the catalog; favoriting
    /// an id the catalog does not know is [`DexError::NotFound`].
    pub async fn toggle_favorite(&self, id: u32) -> DexResult<bool> {
        if let Some(item) = self.catalog.get(id).await? {
            return self.favorites.toggle(&item).await;
        }

        if self.favorites.is_favorite(id).await? {
            self.favorites.remove(id).await?;
            return Ok(false);
        }

        Err(DexError::NotFound(id))
    }

    pub async fn favorite(&self, id: u32) -> DexResult<()> {
        let item = self.catalog.get(id).await?.ok_or(DexError::NotFound(id))?;
        self.favorites.add(&item).await
    }

    pub async fn unfavorite(&self, id: u32) -> DexResult<()> {
        self.favorites.remove(id).await
    }

    /// Change an item's display name.
    pub async fn rename(&self, id: u32, name: &str) -> DexResult<CatalogItem> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DexError::InvalidItem(format!(
                "item {} cannot be given a blank name",
                id
            )));
        }

        let name = name.to_string();
        self.catalog
            .update(id, move |item| item.display_name = name)
            .await
    }

    pub async fn upsert(&self, item: CatalogItem) -> DexResult<()> {
        self.catalog.upsert(item).await
    }

    /// Drop an item from the catalog. A favorite pointing at it is kept.
    pub async fn delete(&self, id: u32) -> DexResult<()> {
        self.catalog.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample_item;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Remote that serves a fixed list and can be switched into failure.
    #[derive(Default)]
    struct StaticRemote {
        items: Vec<CatalogItem>,
        offline: AtomicBool,
    }

    impl StaticRemote {
        fn with_items(items: Vec<CatalogItem>) -> Arc<Self> {
            Arc::new(Self {
                items,
                offline: AtomicBool::new(false),
            })
        }

        fn go_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }

        fn check(&self) -> DexResult<()> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(DexError::remote("http://static.test", "connection refused"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteSource for StaticRemote {
        async fn fetch_catalog(&self, limit: usize) -> DexResult<Vec<CatalogItem>> {
            self.check()?;
            Ok(self.items.iter().take(limit).cloned().collect())
        }

        async fn fetch_one(&self, id: u32) -> DexResult<CatalogItem> {
            self.check()?;
            self.items
                .iter()
                .find(|item| item.id == id)
                .cloned()
                .ok_or(DexError::NotFound(id))
        }
    }

    fn fire_water() -> Vec<CatalogItem> {
        vec![
            sample_item(1, &["fire"]),
            sample_item(2, &["water"]),
            sample_item(3, &["fire"]),
        ]
    }

    #[tokio::test]
    async fn test_refresh_then_views() {
        let dex = Dex::in_memory(StaticRemote::with_items(fire_water()));
        assert_eq!(dex.refresh().await.unwrap(), 3);

        dex.favorite(3).await.unwrap();

        let list = dex.catalog_view().await.unwrap();
        assert_eq!(list.iter().map(|a| a.item.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(list[2].is_favorite);

        let grouped = dex.grouped_view(GroupOrder::FirstSeen).await.unwrap();
        let fire: Vec<u32> = grouped.get("fire").unwrap().iter().map(|a| a.item.id).collect();
        assert_eq!(fire, vec![1, 3]);
        assert!(dex.catalog().last_refreshed().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_refresh_respects_fetch_limit() {
        let dex = Dex::in_memory(StaticRemote::with_items(fire_water())).with_fetch_limit(2);
        assert_eq!(dex.refresh().await.unwrap(), 2);
        assert_eq!(dex.catalog().load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_catalog() {
        let remote = StaticRemote::with_items(fire_water());
        let dex = Dex::in_memory(remote.clone());
        dex.refresh().await.unwrap();

        remote.go_offline();
        let err = dex.refresh().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(dex.catalog().load().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_in_memory_uses_configured_default_limit() {
        let dex = Dex::in_memory(StaticRemote::with_items(Vec::new()));
        assert_eq!(dex.fetch_limit(), DexConfig::default().fetch_limit);
    }

    #[tokio::test]
    async fn test_unusable_remote_payload_keeps_catalog() {
        use axum::{routing::get, Json, Router};
        use serde_json::json;
        use std::time::Duration;

        let app = Router::new().route(
            "/pokemon",
            get(|| async { Json(vec![json!({ "id": 1, "name": "x" }), json!("junk")]) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let remote =
            HttpRemoteSource::new(format!("http://{addr}/pokemon"), Duration::from_secs(5))
                .unwrap();
        let dex = Dex::in_memory(Arc::new(remote));
        dex.upsert(sample_item(1, &["fire"])).await.unwrap();
        dex.upsert(sample_item(2, &["water"])).await.unwrap();

        let err = dex.refresh().await.unwrap_err();
        assert!(matches!(err, DexError::RemoteFetch { .. }));
        assert_eq!(dex.catalog().load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_toggle_favorite() {
        let dex = Dex::in_memory(StaticRemote::with_items(fire_water()));
        dex.refresh().await.unwrap();

        assert!(dex.toggle_favorite(2).await.unwrap());
        assert!(dex.item_view(2).await.unwrap().is_favorite);
        assert!(!dex.toggle_favorite(2).await.unwrap());

        assert!(matches!(
            dex.toggle_favorite(99).await,
            Err(DexError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_orphaned_favorite_can_be_toggled_off() {
        let dex = Dex::in_memory(StaticRemote::with_items(fire_water()));
        dex.refresh().await.unwrap();
        dex.favorite(1).await.unwrap();
        dex.delete(1).await.unwrap();

        assert_eq!(dex.favorites_list().await.unwrap().len(), 1);
        assert!(!dex.toggle_favorite(1).await.unwrap());
        assert!(dex.favorites_list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rename() {
        let dex = Dex::in_memory(StaticRemote::with_items(fire_water()));
        dex.refresh().await.unwrap();

        let renamed = dex.rename(2, "  Squirtle ").await.unwrap();
        assert_eq!(renamed.display_name, "Squirtle");
        assert_eq!(dex.item_view(2).await.unwrap().item.display_name, "Squirtle");

        assert!(matches!(dex.rename(2, "   ").await, Err(DexError::InvalidItem(_))));
        assert!(matches!(dex.rename(40, "Ghost").await, Err(DexError::NotFound(40))));
    }

    #[tokio::test]
    async fn test_refresh_item_upserts() {
        let dex = Dex::in_memory(StaticRemote::with_items(fire_water()));
        assert!(dex.catalog().load().await.unwrap().is_empty());

        dex.refresh_item(2).await.unwrap();
        assert_eq!(dex.catalog().load().await.unwrap().len(), 1);
        assert!(matches!(
            dex.refresh_item(8).await,
            Err(DexError::NotFound(8))
        ));
    }
}
