//! # Catalog API
//!
//! Endpoints for the cached catalog, single items and the grouped view.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use dexcache_core::{CatalogItem, Classification, DexError, GroupOrder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::{ApiResponse, ApiResult, ItemResponse};
use crate::SharedState;

/// Full item payload for `PUT /catalog/{id}`
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpsertItemRequest {
    pub display_name: String,
    #[serde(default)]
    pub image_ref: String,
    /// One or two classification tags, primary first
    pub types: Vec<String>,
    /// Stat values; `HP`, `Sp. Attack` and similar labels are accepted
    #[serde(default)]
    pub attributes: BTreeMap<String, i64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl UpsertItemRequest {
    fn into_item(self, id: u32) -> Result<CatalogItem, DexError> {
        let classification =
            Classification::try_from(self.types).map_err(DexError::InvalidItem)?;

        let mut item = CatalogItem::new(id, self.display_name, self.image_ref, classification);
        for (name, value) in &self.attributes {
            item = item.with_attribute(name, *value);
        }
        if let Some(description) = self.description {
            item = item.with_description(description);
        }
        Ok(item)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameRequest {
    pub display_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub success: bool,
    pub items: usize,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GroupResponse {
    pub tag: String,
    pub items: Vec<ItemResponse>,
}

#[derive(Debug, Deserialize)]
pub struct GroupsQuery {
    #[serde(default)]
    pub order: GroupOrder,
}

pub fn catalog_routes() -> Router<SharedState> {
    Router::new()
        .route("/catalog", get(list_catalog))
        .route("/catalog/refresh", post(refresh_catalog))
        .route(
            "/catalog/:id",
            get(get_item)
                .put(upsert_item)
                .patch(rename_item)
                .delete(delete_item),
        )
        .route("/catalog/:id/refresh", post(refresh_item))
        .route("/groups", get(list_groups))
}

/// List the cached catalog, sorted by id
#[utoipa::path(
    get,
    path = "/api/v1/catalog",
    tag = "catalog",
    responses(
        (status = 200, description = "Cached catalog with favorite flags", body = Vec<ItemResponse>),
        (status = 500, description = "Storage failure", body = super::ErrorResponse)
    )
)]
pub async fn list_catalog(State(state): State<SharedState>) -> ApiResult<Vec<ItemResponse>> {
    let items = state.dex.catalog_view().await?;
    Ok(Json(items.into_iter().map(ItemResponse::from).collect()))
}

/// Get one cached item
#[utoipa::path(
    get,
    path = "/api/v1/catalog/{id}",
    tag = "catalog",
    params(("id" = u32, Path, description = "Catalog item id")),
    responses(
        (status = 200, description = "Catalog item", body = ItemResponse),
        (status = 404, description = "Unknown id", body = super::ErrorResponse)
    )
)]
pub async fn get_item(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
) -> ApiResult<ItemResponse> {
    Ok(Json(state.dex.item_view(id).await?.into()))
}

/// Insert or replace an item
#[utoipa::path(
    put,
    path = "/api/v1/catalog/{id}",
    tag = "catalog",
    params(("id" = u32, Path, description = "Catalog item id")),
    request_body = UpsertItemRequest,
    responses(
        (status = 200, description = "Stored item", body = ItemResponse),
        (status = 400, description = "Item violates the data model", body = super::ErrorResponse)
    )
)]
pub async fn upsert_item(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
    Json(req): Json<UpsertItemRequest>,
) -> ApiResult<ItemResponse> {
    let item = req.into_item(id)?;
    state.dex.upsert(item).await?;
    Ok(Json(state.dex.item_view(id).await?.into()))
}

/// Rename an existing item
#[utoipa::path(
    patch,
    path = "/api/v1/catalog/{id}",
    tag = "catalog",
    params(("id" = u32, Path, description = "Catalog item id")),
    request_body = RenameRequest,
    responses(
        (status = 200, description = "Renamed item", body = ItemResponse),
        (status = 400, description = "Blank name", body = super::ErrorResponse),
        (status = 404, description = "Unknown id", body = super::ErrorResponse)
    )
)]
pub async fn rename_item(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
    Json(req): Json<RenameRequest>,
) -> ApiResult<ItemResponse> {
    state.dex.rename(id, &req.display_name).await?;
    Ok(Json(state.dex.item_view(id).await?.into()))
}

/// Remove an item from the catalog
#[utoipa::path(
    delete,
    path = "/api/v1/catalog/{id}",
    tag = "catalog",
    params(("id" = u32, Path, description = "Catalog item id")),
    responses(
        (status = 200, description = "Item removed (or was already absent)", body = ApiResponse)
    )
)]
pub async fn delete_item(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
) -> ApiResult<ApiResponse> {
    state.dex.delete(id).await?;
    Ok(Json(ApiResponse {
        success: true,
        message: format!("Item {} deleted", id),
    }))
}

/// Replace the catalog with a fresh fetch from the remote source
#[utoipa::path(
    post,
    path = "/api/v1/catalog/refresh",
    tag = "catalog",
    responses(
        (status = 200, description = "Catalog replaced", body = RefreshResponse),
        (status = 502, description = "Remote source failed; cached catalog kept", body = super::ErrorResponse)
    )
)]
pub async fn refresh_catalog(State(state): State<SharedState>) -> ApiResult<RefreshResponse> {
    let items = state.dex.refresh().await?;
    Ok(Json(RefreshResponse {
        success: true,
        items,
        message: format!("Fetched {} items", items),
    }))
}

/// Re-fetch a single item from the remote source
#[utoipa::path(
    post,
    path = "/api/v1/catalog/{id}/refresh",
    tag = "catalog",
    params(("id" = u32, Path, description = "Catalog item id")),
    responses(
        (status = 200, description = "Item refreshed", body = ItemResponse),
        (status = 404, description = "Remote source does not know this id", body = super::ErrorResponse),
        (status = 502, description = "Remote source failed", body = super::ErrorResponse)
    )
)]
pub async fn refresh_item(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
) -> ApiResult<ItemResponse> {
    state.dex.refresh_item(id).await?;
    Ok(Json(state.dex.item_view(id).await?.into()))
}

/// Catalog grouped by primary classification tag
#[utoipa::path(
    get,
    path = "/api/v1/groups",
    tag = "catalog",
    params(("order" = Option<String>, Query, description = "first_seen (default) or alphabetical")),
    responses(
        (status = 200, description = "Groups with their items", body = Vec<GroupResponse>)
    )
)]
pub async fn list_groups(
    State(state): State<SharedState>,
    Query(query): Query<GroupsQuery>,
) -> ApiResult<Vec<GroupResponse>> {
    let grouped = state.dex.grouped_view(query.order).await?;
    Ok(Json(
        grouped
            .into_groups()
            .into_iter()
            .map(|group| GroupResponse {
                tag: group.tag,
                items: group.items.into_iter().map(ItemResponse::from).collect(),
            })
            .collect(),
    ))
}
