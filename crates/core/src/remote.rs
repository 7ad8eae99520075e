//! # Remote Catalog Source
//!
//! HTTP ingestion of catalog records. Remote payloads come in several nested
//! shapes (`name: {english}`, `base: {"Sp. Attack": ..}`, `image: {hires}`);
//! they are flattened into [`CatalogItem`] here, before anything reaches the
//! stores.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DexError, DexResult};
use crate::model::{canonical_stat_name, CatalogItem, Classification, RawImage, RawName};

/// Source of catalog records outside the device.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch up to `limit` normalized items.
    async fn fetch_catalog(&self, limit: usize) -> DexResult<Vec<CatalogItem>>;

    /// Fetch a single item by id.
    async fn fetch_one(&self, id: u32) -> DexResult<CatalogItem>;
}

/// A catalog record as the remote endpoint sends it.
#[derive(Debug, Deserialize)]
struct RawItem {
    id: u32,
    name: RawName,
    #[serde(rename = "type", alias = "types", alias = "classification", default)]
    types: Vec<String>,
    #[serde(alias = "stats", alias = "attributes", default)]
    base: BTreeMap<String, i64>,
    #[serde(default)]
    image: Option<RawImage>,
    #[serde(rename = "localImage", default)]
    local_image: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RawItem {
    fn into_item(self) -> DexResult<CatalogItem> {
        let display_name = self.name.into_text();

        let classification =
            Classification::try_from(self.types).map_err(|e| {
                DexError::InvalidItem(format!("item {}: {}", self.id, e))
            })?;

        let image_ref = self
            .image
            .and_then(RawImage::best)
            .or(self.local_image)
            .unwrap_or_default();

        let mut attributes = BTreeMap::new();
        for (label, value) in self.base {
            match canonical_stat_name(&label) {
                Some(stat) => {
                    attributes.insert(stat.to_string(), value);
                }
                None => debug!(item_id = self.id, stat = %label, "Dropping unknown stat"),
            }
        }

        let item = CatalogItem {
            id: self.id,
            display_name,
            image_ref,
            classification,
            attributes,
            description: self.description.filter(|d| !d.trim().is_empty()),
        };
        item.validate()?;
        Ok(item)
    }
}

/// Normalize one remote JSON record.
pub fn normalize_record(value: serde_json::Value) -> DexResult<CatalogItem> {
    let raw: RawItem = serde_json::from_value(value)
        .map_err(|e| DexError::InvalidItem(format!("unrecognized record shape: {}", e)))?;
    raw.into_item()
}

/// Normalize a remote batch, skipping records that cannot be normalized and
/// repeated ids (first occurrence wins).
pub fn normalize_batch(values: Vec<serde_json::Value>, limit: usize) -> Vec<CatalogItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(values.len().min(limit));

    for value in values {
        if items.len() >= limit {
            break;
        }
        match normalize_record(value) {
            Ok(item) if seen.insert(item.id) => items.push(item),
            Ok(item) => warn!(item_id = item.id, "Skipping repeated remote record"),
            Err(e) => warn!(error = %e, "Skipping remote record"),
        }
    }

    items
}

/// [`RemoteSource`] backed by a JSON HTTP endpoint.
///
/// `GET <endpoint>?limit=<n>` returns the list, `GET <endpoint>/<id>` one record.
#[derive(Clone)]
pub struct HttpRemoteSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRemoteSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> DexResult<Self> {
        let endpoint = endpoint.into();
        let client = reqwest::Client::builder()
            .user_agent(concat!("dexcache/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| DexError::remote(&endpoint, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn item_url(&self, id: u32) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), id)
    }
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn fetch_catalog(&self, limit: usize) -> DexResult<Vec<CatalogItem>> {
        let url = &self.endpoint;
        let response = self
            .client
            .get(url)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| DexError::remote(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DexError::remote(url, format!("HTTP {}", status)));
        }

        let records: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| DexError::remote(url, format!("expected a JSON array: {}", e)))?;

        let received = records.len();
        let items = normalize_batch(records, limit);
        if received > 0 && items.is_empty() && limit > 0 {
            return Err(DexError::remote(
                url,
                format!("none of the {} records could be normalized", received),
            ));
        }
        info!(
            url = %url,
            received,
            accepted = items.len(),
            "Fetched remote catalog"
        );

        Ok(items)
    }

    async fn fetch_one(&self, id: u32) -> DexResult<CatalogItem> {
        let url = self.item_url(id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DexError::remote(&url, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(DexError::NotFound(id)),
            status if !status.is_success() => {
                return Err(DexError::remote(&url, format!("HTTP {}", status)))
            }
            _ => {}
        }

        let record: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DexError::remote(&url, e))?;

        let item = normalize_record(record).map_err(|e| DexError::remote(&url, e))?;
        if item.id != id {
            return Err(DexError::remote(
                &url,
                format!("asked for item {} but received {}", id, item.id),
            ));
        }
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query},
        http::StatusCode as AxumStatus,
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn bulbasaur() -> serde_json::Value {
        json!({
            "id": 1,
            "name": { "english": "Bulbasaur", "japanese": "フシギダネ" },
            "type": ["Grass", "Poison"],
            "base": {
                "HP": 45, "Attack": 49, "Defense": 49,
                "Sp. Attack": 65, "Sp. Defense": 65, "Speed": 45
            },
            "description": "A strange seed was planted on its back at birth.",
            "image": { "sprite": "s/001.png", "thumbnail": "t/001.png", "hires": "h/001.png" }
        })
    }

    #[test]
    fn test_normalize_nested_record() {
        let item = normalize_record(bulbasaur()).unwrap();

        assert_eq!(item.id, 1);
        assert_eq!(item.display_name, "Bulbasaur");
        assert_eq!(item.image_ref, "h/001.png");
        assert_eq!(item.classification.primary(), "Grass");
        assert_eq!(item.classification.secondary(), Some("Poison"));
        assert_eq!(item.attributes.len(), 6);
        assert_eq!(item.attributes["sp_attack"], 65);
        assert_eq!(item.attributes["hp"], 45);
        assert!(item.description.is_some());
    }

    #[test]
    fn test_normalize_flat_record() {
        let item = normalize_record(json!({
            "id": 25,
            "name": "Pikachu",
            "types": ["Electric"],
            "stats": { "speed": 90, "luck": 7 },
            "localImage": "file:///pikachu.png"
        }))
        .unwrap();

        assert_eq!(item.display_name, "Pikachu");
        assert_eq!(item.image_ref, "file:///pikachu.png");
        assert_eq!(item.classification.secondary(), None);
        assert_eq!(item.attributes.len(), 1);
        assert_eq!(item.attributes["speed"], 90);
    }

    #[test]
    fn test_normalize_rejects_missing_type() {
        let err = normalize_record(json!({ "id": 3, "name": "Nameless" })).unwrap_err();
        assert!(matches!(err, DexError::InvalidItem(_)));
    }

    #[test]
    fn test_normalize_batch_skips_bad_and_repeated_records() {
        let records = vec![
            bulbasaur(),
            json!({ "id": 0, "name": "Zero", "type": ["Normal"] }),
            json!("garbage"),
            bulbasaur(),
            json!({ "id": 4, "name": "Charmander", "type": ["Fire"] }),
        ];

        let items = normalize_batch(records, 10);
        let ids: Vec<u32> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 4]);

        let limited = normalize_batch(vec![bulbasaur(), json!({ "id": 4, "name": "C", "type": ["Fire"] })], 1);
        assert_eq!(limited.len(), 1);
    }

    /// Bind to port 0 and return the base URL.
    async fn start_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn catalog_app() -> Router {
        Router::new()
            .route(
                "/pokemon",
                get(|Query(params): Query<HashMap<String, usize>>| async move {
                    let limit = params.get("limit").copied().unwrap_or(usize::MAX);
                    let all = vec![
                        bulbasaur(),
                        json!({ "id": 4, "name": { "english": "Charmander" }, "type": ["Fire"] }),
                        json!({ "id": 7, "name": { "english": "Squirtle" }, "type": ["Water"] }),
                    ];
                    Json(all.into_iter().take(limit).collect::<Vec<_>>())
                }),
            )
            .route(
                "/pokemon/:id",
                get(|Path(id): Path<u32>| async move {
                    if id == 1 {
                        Ok(Json(bulbasaur()))
                    } else {
                        Err(AxumStatus::NOT_FOUND)
                    }
                }),
            )
            .route(
                "/junk",
                get(|| async { Json(vec![json!({ "id": 1, "name": "x" }), json!("junk")]) }),
            )
            .route(
                "/broken",
                get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
            )
    }

    #[tokio::test]
    async fn test_fetch_catalog_passes_limit() {
        let base = start_server(catalog_app()).await;
        let source =
            HttpRemoteSource::new(format!("{base}/pokemon"), Duration::from_secs(5)).unwrap();

        let items = source.fetch_catalog(2).await.unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.display_name.as_str()).collect();
        assert_eq!(names, vec!["Bulbasaur", "Charmander"]);
    }

    #[tokio::test]
    async fn test_fetch_one_and_not_found() {
        let base = start_server(catalog_app()).await;
        let source =
            HttpRemoteSource::new(format!("{base}/pokemon/"), Duration::from_secs(5)).unwrap();

        assert_eq!(source.fetch_one(1).await.unwrap().display_name, "Bulbasaur");
        assert!(matches!(
            source.fetch_one(99).await,
            Err(DexError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_non_success_status_is_remote_error() {
        let base = start_server(catalog_app()).await;
        let source =
            HttpRemoteSource::new(format!("{base}/broken"), Duration::from_secs(5)).unwrap();

        let err = source.fetch_catalog(10).await.unwrap_err();
        assert!(matches!(err, DexError::RemoteFetch { .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_all_records_unusable_is_remote_error() {
        let base = start_server(catalog_app()).await;
        let source =
            HttpRemoteSource::new(format!("{base}/junk"), Duration::from_secs(5)).unwrap();

        let err = source.fetch_catalog(10).await.unwrap_err();
        assert!(matches!(err, DexError::RemoteFetch { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_remote_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source =
            HttpRemoteSource::new(format!("http://{addr}/pokemon"), Duration::from_secs(2))
                .unwrap();
        assert!(matches!(
            source.fetch_catalog(10).await,
            Err(DexError::RemoteFetch { .. })
        ));
    }
}
