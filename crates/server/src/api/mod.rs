//! # HTTP API
//!
//! Handlers under `/api/v1`. Every handler returns `Result<Json<_>, ApiError>`;
//! [`ApiError`] turns a [`DexError`] into a status code and an
//! [`ErrorResponse`] body.

pub mod catalog;
pub mod favorites;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dexcache_core::{AnnotatedItem, DexError, FavoriteEntry};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

/// Body of every non-2xx response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    /// Whether the same request may succeed if repeated
    pub retryable: bool,
}

/// A catalog item with its favorite flag.
#[derive(Debug, Serialize, ToSchema)]
pub struct ItemResponse {
    pub id: u32,
    pub display_name: String,
    pub image_ref: String,
    /// Primary tag first, optional secondary tag second
    pub types: Vec<String>,
    pub attributes: BTreeMap<String, i64>,
    pub description: Option<String>,
    pub is_favorite: bool,
}

impl From<AnnotatedItem> for ItemResponse {
    fn from(annotated: AnnotatedItem) -> Self {
        let AnnotatedItem { item, is_favorite } = annotated;
        Self {
            id: item.id,
            types: item.classification.tags().map(str::to_string).collect(),
            display_name: item.display_name,
            image_ref: item.image_ref,
            attributes: item.attributes,
            description: item.description,
            is_favorite,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FavoriteResponse {
    pub item_id: u32,
    pub display_name: String,
    pub image_ref: String,
    /// RFC 3339 timestamp
    pub favorited_at: String,
}

impl From<FavoriteEntry> for FavoriteResponse {
    fn from(entry: FavoriteEntry) -> Self {
        Self {
            item_id: entry.item_id,
            display_name: entry.display_name,
            image_ref: entry.image_ref,
            favorited_at: entry.favorited_at.to_rfc3339(),
        }
    }
}

/// Error returned by API handlers.
#[derive(Debug)]
pub struct ApiError(pub DexError);

impl From<DexError> for ApiError {
    fn from(e: DexError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DexError::NotFound(_) => StatusCode::NOT_FOUND,
            DexError::InvalidItem(_) => StatusCode::BAD_REQUEST,
            DexError::RemoteFetch { .. } => StatusCode::BAD_GATEWAY,
            DexError::StorageRead { .. } | DexError::StorageWrite { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }

        let body = ErrorResponse {
            success: false,
            message: self.0.to_string(),
            retryable: self.0.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
