//! # Dexcache Database
//!
//! Single SQLite database holding every persisted value as a key-value row in
//! `.dexcache/dexcache.db`. Stores reach it through [`SqliteStorage`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::io;
use super::storage::{KeyValueStorage, WriteBatch, WriteOp};
use crate::error::{DexError, DexResult};

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// Default database file name inside the data directory
pub const DEFAULT_DB_FILE: &str = "dexcache.db";

/// Database manager owning the shared connection
pub struct DexDb {
    conn: Arc<Mutex<Connection>>,
}

impl DexDb {
    /// Open or create the database at `.dexcache/dexcache.db`
    pub fn open() -> Result<Self> {
        Self::open_at(io::get_data_dir().join(DEFAULT_DB_FILE))
    }

    /// Open database at a specific path (useful for testing)
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open dexcache database {:?}", path.as_ref()))?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Get a shared connection for use by other modules
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Run schema migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .context("Failed to read schema version")?;

        if current_version < 1 {
            Self::migrate_v1(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [1],
            )?;
        }

        Ok(())
    }

    /// Migration to version 1 - key-value table
    fn migrate_v1(conn: &Connection) -> Result<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            [],
        )?;

        tracing::info!(
            "DexDb initialized with schema version {}",
            SCHEMA_VERSION
        );

        Ok(())
    }
}

/// [`KeyValueStorage`] over the shared `DexDb` connection.
///
/// Every batch runs inside one SQLite transaction.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Create from shared DexDb connection
    pub fn new(db: &DexDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Run `f` against the connection on the blocking thread pool.
    ///
    /// `key` labels lock and join failures; `on_error` picks the error kind.
    async fn with_conn<T, F>(
        &self,
        key: String,
        on_error: fn(String, String) -> DexError,
        f: F,
    ) -> DexResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let label = key.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| on_error(key.clone(), format!("Lock error: {}", e)))?;
            f(&mut conn).map_err(|e| on_error(key, e.to_string()))
        })
        .await
        .map_err(|e| on_error(label, format!("Storage task failed: {}", e)))?
    }
}

fn apply_batch(conn: &mut Connection, batch: &WriteBatch) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;

    for op in batch.ops() {
        match op {
            WriteOp::Set { key, value } => {
                tx.execute(
                    r#"
                    INSERT INTO kv_store (key, value, updated_at)
                    VALUES (?1, ?2, datetime('now'))
                    ON CONFLICT(key) DO UPDATE SET
                        value = ?2,
                        updated_at = datetime('now')
                    "#,
                    params![key, value],
                )?;
            }
            WriteOp::Remove { key } => {
                tx.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
            }
            WriteOp::RemovePrefix { prefix } => {
                tx.execute(
                    "DELETE FROM kv_store WHERE substr(key, 1, length(?1)) = ?1",
                    params![prefix],
                )?;
            }
        }
    }

    tx.commit()
}

#[async_trait]
impl KeyValueStorage for SqliteStorage {
    async fn get_item(&self, key: &str) -> DexResult<Option<String>> {
        let owned = key.to_string();
        self.with_conn(key.to_string(), |k, r| DexError::read(k, r), move |conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![owned],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    async fn scan_prefix(&self, prefix: &str) -> DexResult<Vec<(String, String)>> {
        let owned = prefix.to_string();
        self.with_conn(prefix.to_string(), |k, r| DexError::read(k, r), move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT key, value FROM kv_store
                WHERE substr(key, 1, length(?1)) = ?1
                ORDER BY key
                "#,
            )?;
            let rows = stmt
                .query_map(params![owned], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn apply(&self, batch: WriteBatch) -> DexResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.len();
        self.with_conn(batch.label(), |k, r| DexError::write(k, r), move |conn| {
            apply_batch(conn, &batch)
        })
        .await?;
        tracing::trace!(ops, "Committed storage batch");
        Ok(())
    }
}
