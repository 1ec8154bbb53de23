//! Durable per-user session storage
//!
//! The dispatcher only relies on two guarantees: `read` returns the last value
//! written for a key (or `None` if never written), and `write` is atomic per
//! key. Distinct keys never contend.

mod memory;
mod retry;
mod sqlite;

pub use memory::MemorySessionStore;
pub use retry::RetryingStore;
pub use sqlite::{create_pool, DbConnection, DbPool, SqliteSessionStore};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::config::{StoreConfig, StoreKind};
use crate::session::SessionRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not get a connection from the pool
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Stored JSON no longer decodes into a session
    #[error("stored session for user {user_id} is corrupted: {source}")]
    Corrupt {
        user_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode session: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("schema migration failed: {0}")]
    Migration(String),

    /// Blocking task panicked or was cancelled
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether another attempt may succeed. Data and schema errors are permanent.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            StoreError::Corrupt { .. } | StoreError::Encode(_) | StoreError::Migration(_)
        )
    }
}

/// Key-value contract for sessions, keyed by Telegram user id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Last written record for `user_id`, or `None` if never written.
    async fn read(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Replaces the record for `user_id` atomically.
    async fn write(&self, user_id: &str, record: &SessionRecord) -> Result<(), StoreError>;

    /// All user ids with a stored record, sorted.
    async fn list_user_ids(&self) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn read(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        (**self).read(user_id).await
    }

    async fn write(&self, user_id: &str, record: &SessionRecord) -> Result<(), StoreError> {
        (**self).write(user_id, record).await
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_user_ids().await
    }
}

/// Builds the configured store, wrapped in the retry adapter.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn SessionStore>, StoreError> {
    let store: Arc<dyn SessionStore> = match config.kind {
        StoreKind::Sqlite => {
            let pool = create_pool(&config.database_path)?;
            tracing::info!(path = %config.database_path.display(), "Using SQLite session store");
            Arc::new(RetryingStore::new(SqliteSessionStore::new(pool), config.max_retries))
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory session store; sessions are lost on restart");
            Arc::new(MemorySessionStore::new())
        }
    };
    Ok(store)
}
