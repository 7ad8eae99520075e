pub mod catalog_store;
pub mod db;
pub mod favorites_store;
pub mod io;
pub mod storage;

pub use db::{DexDb, SqliteStorage};

pub use catalog_store::{CatalogMeta, CatalogStore};
pub use favorites_store::FavoritesStore;
pub use storage::{KeyValueStorage, MemoryStorage, WriteBatch, WriteOp};
