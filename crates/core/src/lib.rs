//! # Dexcache Core
//!
//! Offline-first catalog cache: contains the data model, persistent stores,
//! the grouping projection and remote ingestion.
//!
//! ## Architecture
//!
//! - `model` - Catalog items, classifications and favorite entries
//! - `state/` - Key-value storage backends and the catalog/favorites stores
//! - `grouping` - Read-time views (flat list, grouped by primary tag)
//! - `remote` - HTTP source and normalization of remote records
//! - `dex` - Facade tying the stores and the remote source together
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dexcache_core::{Dex, DexConfig, GroupOrder};
//!
//! let config = DexConfig::load().await?;
//! let dex = Dex::open(&config)?;
//! dex.refresh().await?;
//! let groups = dex.grouped_view(GroupOrder::FirstSeen).await?;
//! ```

pub mod config;
pub mod dex;
pub mod error;
pub mod grouping;
pub mod model;
pub mod remote;
pub mod state;

pub use config::{ConfigPatch, DexConfig, StorageBackend};
pub use dex::Dex;
pub use error::{DexError, DexResult};
pub use grouping::{AnnotatedItem, Group, GroupOrder, GroupedCatalog};
pub use model::{CatalogItem, Classification, FavoriteEntry};
pub use remote::{HttpRemoteSource, RemoteSource};
