//! # Favorites API

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::{ApiResponse, ApiResult, FavoriteResponse};
use crate::SharedState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleResponse {
    pub item_id: u32,
    pub is_favorite: bool,
}

pub fn favorites_routes() -> Router<SharedState> {
    Router::new()
        .route("/favorites", get(list_favorites))
        .route("/favorites/:id", post(add_favorite).delete(remove_favorite))
        .route("/favorites/:id/toggle", post(toggle_favorite))
}

/// List favorited items
#[utoipa::path(
    get,
    path = "/api/v1/favorites",
    tag = "favorites",
    responses(
        (status = 200, description = "Favorite entries", body = Vec<FavoriteResponse>)
    )
)]
pub async fn list_favorites(State(state): State<SharedState>) -> ApiResult<Vec<FavoriteResponse>> {
    let entries = state.dex.favorites_list().await?;
    Ok(Json(entries.into_iter().map(FavoriteResponse::from).collect()))
}

/// Favorite a catalog item
#[utoipa::path(
    post,
    path = "/api/v1/favorites/{id}",
    tag = "favorites",
    params(("id" = u32, Path, description = "Catalog item id")),
    responses(
        (status = 200, description = "Item is a favorite", body = ApiResponse),
        (status = 404, description = "Unknown id", body = super::ErrorResponse)
    )
)]
pub async fn add_favorite(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
) -> ApiResult<ApiResponse> {
    state.dex.favorite(id).await?;
    Ok(Json(ApiResponse {
        success: true,
        message: format!("Item {} favorited", id),
    }))
}

/// Unfavorite an item
#[utoipa::path(
    delete,
    path = "/api/v1/favorites/{id}",
    tag = "favorites",
    params(("id" = u32, Path, description = "Catalog item id")),
    responses(
        (status = 200, description = "Item is not a favorite", body = ApiResponse)
    )
)]
pub async fn remove_favorite(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
) -> ApiResult<ApiResponse> {
    state.dex.unfavorite(id).await?;
    Ok(Json(ApiResponse {
        success: true,
        message: format!("Item {} unfavorited", id),
    }))
}

/// Flip the favorite state of an item
#[utoipa::path(
    post,
    path = "/api/v1/favorites/{id}/toggle",
    tag = "favorites",
    params(("id" = u32, Path, description = "Catalog item id")),
    responses(
        (status = 200, description = "New favorite state", body = ToggleResponse),
        (status = 404, description = "Unknown id", body = super::ErrorResponse)
    )
)]
pub async fn toggle_favorite(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
) -> ApiResult<ToggleResponse> {
    let is_favorite = state.dex.toggle_favorite(id).await?;
    Ok(Json(ToggleResponse {
        item_id: id,
        is_favorite,
    }))
}
