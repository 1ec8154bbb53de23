//! SQLite-backed session store
//!
//! One row per user id holding the session as JSON. Writes are a single
//! upsert, so a write is atomic per key.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

use super::{SessionStore, StoreError};
use crate::session::SessionRecord;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

mod embedded {
    use refinery::embed_migrations;

    embed_migrations!("./migrations");
}

/// Creates a connection pool for the session database and brings the schema up to date.
///
/// # Arguments
///
/// * `database_path` - SQLite file, created if missing
///
/// # Returns
///
/// * `Ok(DbPool)` - Pool ready for use
/// * `Err(StoreError)` - Database could not be opened or migrated
pub fn create_pool(database_path: &Path) -> Result<DbPool, StoreError> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
    });
    let pool = Pool::builder().max_size(4).build(manager)?;

    let mut conn = pool.get()?;
    embedded::migrations::runner()
        .run(&mut *conn)
        .map_err(|e| StoreError::Migration(e.to_string()))?;

    Ok(pool)
}

/// [`SessionStore`] over an r2d2 SQLite pool. Queries run on the blocking thread pool.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: DbPool,
}

impl SqliteSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn read(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let data: Option<String> = conn
                .query_row("SELECT data FROM sessions WHERE user_id = ?1", params![user_id], |row| {
                    row.get(0)
                })
                .optional()?;

            data.map(|json| serde_json::from_str(&json).map_err(|source| StoreError::Corrupt { user_id, source }))
                .transpose()
        })
        .await?
    }

    async fn write(&self, user_id: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        let data = serde_json::to_string(record).map_err(StoreError::Encode)?;

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO sessions (user_id, data, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
                params![user_id, data, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await?
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, StoreError> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare("SELECT user_id FROM sessions ORDER BY user_id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
        .await?
    }
}
