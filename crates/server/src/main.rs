//! Dexcache Server
//!
//! Command line front end and Axum server over the catalog cache in
//! `dexcache_core`. Without a subcommand the HTTP API is served.

mod api;

use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use clap::{Parser, Subcommand};
use dexcache_core::{ConfigPatch, Dex, DexConfig, GroupOrder, StorageBackend};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utoipa::{OpenApi, ToSchema};

use api::{ErrorResponse, ItemResponse};

/// Application state
pub struct AppState {
    dex: Dex,
}

pub type SharedState = Arc<AppState>;

#[derive(Parser, Clone)]
#[command(author, version, about = "Dexcache - offline creature catalog cache")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
enum CliCommand {
    /// Start the HTTP API (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Replace the cached catalog with a fresh remote fetch
    Refresh,
    /// Print the cached catalog
    List,
    /// Print the catalog grouped by primary type
    Groups {
        /// Sort groups by tag instead of first appearance
        #[arg(long)]
        alphabetical: bool,
    },
    /// Print favorites
    Favorites,
    /// Favorite an item
    Favorite { id: u32 },
    /// Unfavorite an item
    Unfavorite { id: u32 },
    /// Remove an item from the cached catalog
    Delete { id: u32 },
    /// Change an item's display name
    Rename { id: u32, name: String },
}

// === Config API Types ===

#[derive(Debug, Serialize, ToSchema)]
struct ConfigView {
    remote_endpoint: String,
    fetch_limit: usize,
    request_timeout_secs: u64,
    /// `sqlite` or `memory`
    storage: String,
    database_file: String,
}

impl From<&DexConfig> for ConfigView {
    fn from(config: &DexConfig) -> Self {
        let storage = match config.storage {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::Memory => "memory",
        };
        Self {
            remote_endpoint: config.remote_endpoint.clone(),
            fetch_limit: config.fetch_limit,
            request_timeout_secs: config.request_timeout_secs,
            storage: storage.to_string(),
            database_file: config.database_file.clone(),
        }
    }
}

/// Partial config update. Absent fields are left unchanged.
#[derive(Debug, Deserialize, ToSchema)]
struct ConfigPatchRequest {
    remote_endpoint: Option<String>,
    fetch_limit: Option<usize>,
    request_timeout_secs: Option<u64>,
    #[schema(value_type = Option<String>)]
    storage: Option<StorageBackend>,
    database_file: Option<String>,
}

impl From<ConfigPatchRequest> for ConfigPatch {
    fn from(req: ConfigPatchRequest) -> Self {
        Self {
            remote_endpoint: req.remote_endpoint,
            fetch_limit: req.fetch_limit,
            request_timeout_secs: req.request_timeout_secs,
            storage: req.storage,
            database_file: req.database_file,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
struct ConfigResponse {
    config: ConfigView,
    defaults: ConfigView,
    /// Changes apply the next time the server starts
    restart_required: bool,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dexcache API",
        version = "1.0.0",
        description = "Offline-first creature catalog with favorites and grouping"
    ),
    paths(
        api::catalog::list_catalog,
        api::catalog::get_item,
        api::catalog::upsert_item,
        api::catalog::rename_item,
        api::catalog::delete_item,
        api::catalog::refresh_catalog,
        api::catalog::refresh_item,
        api::catalog::list_groups,
        api::favorites::list_favorites,
        api::favorites::add_favorite,
        api::favorites::remove_favorite,
        api::favorites::toggle_favorite,
        get_config,
        update_config
    ),
    components(
        schemas(
            api::ApiResponse,
            ErrorResponse,
            ItemResponse,
            api::FavoriteResponse,
            api::catalog::UpsertItemRequest,
            api::catalog::RenameRequest,
            api::catalog::RefreshResponse,
            api::catalog::GroupResponse,
            api::favorites::ToggleResponse,
            ConfigView,
            ConfigPatchRequest,
            ConfigResponse
        )
    ),
    tags(
        (name = "catalog", description = "Cached catalog and grouped view"),
        (name = "favorites", description = "Favorite items"),
        (name = "config", description = "Configuration management")
    )
)]
struct ApiDoc;

/// Get current configuration
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Current configuration and defaults", body = ConfigResponse),
        (status = 500, description = "Config could not be read", body = ErrorResponse)
    )
)]
async fn get_config() -> Result<Json<ConfigResponse>, (StatusCode, Json<ErrorResponse>)> {
    let config = DexConfig::load().await.map_err(internal_error)?;
    Ok(Json(ConfigResponse {
        config: ConfigView::from(&config),
        defaults: ConfigView::from(&DexConfig::default()),
        restart_required: false,
    }))
}

/// Update configuration (partial merge)
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body = ConfigPatchRequest,
    responses(
        (status = 200, description = "Updated configuration", body = ConfigResponse),
        (status = 500, description = "Config could not be saved", body = ErrorResponse)
    )
)]
async fn update_config(
    Json(updates): Json<ConfigPatchRequest>,
) -> Result<Json<ConfigResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut config = DexConfig::load().await.map_err(internal_error)?;
    config.merge(updates.into());
    config.save().await.map_err(internal_error)?;

    info!("Configuration updated");
    Ok(Json(ConfigResponse {
        config: ConfigView::from(&config),
        defaults: ConfigView::from(&DexConfig::default()),
        restart_required: true,
    }))
}

fn internal_error(e: anyhow::Error) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!(error = ?e, "Config request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            success: false,
            message: format!("{:#}", e),
            retryable: false,
        }),
    )
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn health(State(state): State<SharedState>) -> Json<api::ApiResponse> {
    let (success, message) = match state.dex.catalog().meta().await {
        Ok(Some(meta)) => (
            true,
            format!(
                "{} items, refreshed {}",
                meta.item_count,
                meta.refreshed_at.to_rfc3339()
            ),
        ),
        Ok(None) => (true, "catalog never refreshed".to_string()),
        Err(e) => (false, e.to_string()),
    };
    Json(api::ApiResponse { success, message })
}

/// Build the application router.
pub fn build_router(state: SharedState) -> Router {
    let api_routes = Router::new()
        .merge(api::catalog::catalog_routes())
        .merge(api::favorites::favorites_routes())
        .route("/config", get(get_config).patch(update_config))
        .route("/health", get(health))
        .route("/openapi.json", get(serve_openapi));

    Router::new().nest("/api/v1", api_routes).with_state(state)
}

pub async fn run_server(dex: Dex, port: u16) -> anyhow::Result<()> {
    let state: SharedState = Arc::new(AppState { dex });
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Dexcache server running at http://{}", addr);
    info!("   Catalog:   /api/v1/catalog, /catalog/refresh, /groups");
    info!("   Favorites: /api/v1/favorites, /favorites/:id/toggle");
    info!("   Config:    /api/v1/config (GET, PATCH)");

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dexcache_core=debug"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn print_item(item: &dexcache_core::AnnotatedItem) {
    let star = if item.is_favorite { "*" } else { " " };
    println!(
        "{} #{:03} {:<16} {}",
        star, item.item.id, item.item.display_name, item.item.classification
    );
}

/// Run a CLI command against the cache. `serve` blocks until shutdown.
async fn run_command(dex: &Dex, command: CliCommand) -> anyhow::Result<()> {
    match command {
        CliCommand::Serve { port } => run_server(dex.clone(), port).await?,
        CliCommand::Refresh => {
            let count = dex.refresh().await?;
            println!("Fetched {} items", count);
        }
        CliCommand::List => {
            let items = dex.catalog_view().await?;
            if items.is_empty() {
                println!("Catalog is empty. Run `dexcache refresh` first.");
            }
            for item in &items {
                print_item(item);
            }
        }
        CliCommand::Groups { alphabetical } => {
            let order = if alphabetical {
                GroupOrder::Alphabetical
            } else {
                GroupOrder::FirstSeen
            };
            for group in dex.grouped_view(order).await?.groups() {
                println!("{} ({})", group.tag, group.items.len());
                for item in &group.items {
                    print_item(item);
                }
            }
        }
        CliCommand::Favorites => {
            let favorites = dex.favorites_list().await?;
            if favorites.is_empty() {
                println!("No favorites yet.");
            }
            for entry in favorites {
                println!("#{:03} {}", entry.item_id, entry.display_name);
            }
        }
        CliCommand::Favorite { id } => {
            dex.favorite(id).await?;
            println!("Favorited #{:03}", id);
        }
        CliCommand::Unfavorite { id } => {
            dex.unfavorite(id).await?;
            println!("Unfavorited #{:03}", id);
        }
        CliCommand::Delete { id } => {
            dex.delete(id).await?;
            println!("Deleted #{:03}", id);
        }
        CliCommand::Rename { id, name } => {
            let item = dex.rename(id, &name).await?;
            println!("#{:03} is now {}", item.id, item.display_name);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_logging();

    let args = Args::parse();
    let config = DexConfig::load().await.context("Failed to load config")?;
    let dex = Dex::open(&config)?;

    let command = args.command.unwrap_or(CliCommand::Serve { port: 8080 });
    run_command(&dex, command).await
}
