use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;

use crate::error::Result;
use crate::models::{SelectionPreferences, ServerRecord};

pub mod sqlite_repo;

pub use sqlite_repo::SqliteServerStore;

/// Cached server list snapshots.
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// Records of the last stored snapshot, in insertion order. Snapshots are
    /// ordered by when they were stored, not by their timestamps.
    async fn get_most_recent_servers(&self) -> Result<Vec<ServerRecord>>;

    /// Timestamp of the last stored snapshot, if any.
    async fn get_most_recent_date(&self) -> Result<Option<OffsetDateTime>>;

    /// Store a single record as a snapshot of its own.
    async fn create_server(&self, server: &ServerRecord) -> Result<i64>;

    async fn get_server(&self, id: i64) -> Result<Option<ServerRecord>>;

    /// Store a whole snapshot atomically; returns the assigned ids in order.
    /// An empty slice stores nothing.
    async fn insert_snapshot(&self, servers: &[ServerRecord]) -> Result<Vec<i64>>;
}

/// Persisted selection settings.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn load(&self) -> Result<SelectionPreferences>;

    async fn save(&self, prefs: &SelectionPreferences) -> Result<()>;
}

pub async fn create_pool(database_url: &str) -> std::result::Result<SqlitePool, sqlx::Error> {
    let opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .pragma("journal_mode", "WAL");

    SqlitePoolOptions::new()
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(opts)
        .await
}
