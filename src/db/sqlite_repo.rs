use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use time::OffsetDateTime;

use crate::error::{AppError, Result};
use crate::models::{BoundingBox, Coordinates, SelectionPreferences, ServerRecord};

use super::{PreferenceStore, ServerStore};

const PREF_AUTO_DETECT: &str = "auto_detect_server";
const PREF_CUSTOM_SERVER_URL: &str = "custom_server_url";
const PREF_SELECTED_SERVER: &str = "selected_server";
const PREF_SELECTED_CUSTOM_SERVER: &str = "selected_custom_server";
const PREF_CUSTOM_SERVER_URL_VALID: &str = "custom_server_url_is_valid";

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ServerRow {
    id: i64,
    region: String,
    updated_at: i64, // unix millis
    min_lat: Option<f64>,
    max_lat: Option<f64>,
    min_lng: Option<f64>,
    max_lng: Option<f64>,
    center_lat: Option<f64>,
    center_lng: Option<f64>,
    base_url: String,
}

impl ServerRow {
    fn into_server(self) -> ServerRecord {
        let bounds = match (self.min_lat, self.max_lat, self.min_lng, self.max_lng) {
            (Some(min_lat), Some(max_lat), Some(min_lng), Some(max_lng)) => Some(BoundingBox {
                min_lat,
                max_lat,
                min_lng,
                max_lng,
            }),
            _ => None,
        };

        let center = match (self.center_lat, self.center_lng) {
            (Some(lat), Some(lng)) => Coordinates::new(lat, lng)
                .map_err(|e| {
                    tracing::warn!(
                        "Invalid center for server '{}' (id: {}): {}. Ignoring.",
                        self.region,
                        self.id,
                        e
                    );
                })
                .ok(),
            _ => None,
        };

        ServerRecord {
            id: Some(self.id),
            updated_at: millis_to_datetime(self.updated_at),
            region: self.region,
            bounds,
            center,
            base_url: self.base_url,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn datetime_to_millis(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000_000) as i64
}

fn millis_to_datetime(millis: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000).unwrap_or_else(|e| {
        tracing::warn!("Invalid stored timestamp {}: {}. Using epoch.", millis, e);
        OffsetDateTime::UNIX_EPOCH
    })
}

fn parse_flag(values: &HashMap<String, String>, key: &str, default: bool) -> bool {
    match values.get(key).map(String::as_str) {
        Some("true") => true,
        Some("false") => false,
        Some(other) => {
            tracing::warn!("Invalid boolean '{}' for preference '{}'", other, key);
            default
        }
        None => default,
    }
}

const SELECT_COLUMNS: &str = "id, region, updated_at, min_lat, max_lat, min_lng, max_lng,
                              center_lat, center_lng, base_url";

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

pub struct SqliteServerStore {
    pool: SqlitePool,
}

impl SqliteServerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the SQLite schema. Idempotent.
    pub async fn create_schema(pool: &SqlitePool) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS servers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_id INTEGER NOT NULL REFERENCES snapshots(id),
                region TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                min_lat REAL,
                max_lat REAL,
                min_lng REAL,
                max_lng REAL,
                center_lat REAL,
                center_lng REAL,
                base_url TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_servers_snapshot ON servers(snapshot_id)")
            .execute(pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS preferences (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn insert_one(
        conn: &mut SqliteConnection,
        snapshot_id: i64,
        server: &ServerRecord,
    ) -> std::result::Result<i64, sqlx::Error> {
        let bounds = server.bounds.as_ref();
        let center = server.center.as_ref();

        let result = sqlx::query(
            "INSERT INTO servers (snapshot_id, region, updated_at, min_lat, max_lat, min_lng,
                                  max_lng, center_lat, center_lng, base_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(snapshot_id)
        .bind(&server.region)
        .bind(datetime_to_millis(server.updated_at))
        .bind(bounds.map(|b| b.min_lat))
        .bind(bounds.map(|b| b.max_lat))
        .bind(bounds.map(|b| b.min_lng))
        .bind(bounds.map(|b| b.max_lng))
        .bind(center.map(|c| c.lat))
        .bind(center.map(|c| c.lng))
        .bind(&server.base_url)
        .execute(&mut *conn)
        .await?;

        Ok(result.last_insert_rowid())
    }
}

#[async_trait]
impl ServerStore for SqliteServerStore {
    async fn get_most_recent_servers(&self) -> Result<Vec<ServerRecord>> {
        let rows: Vec<ServerRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM servers
             WHERE snapshot_id = (SELECT MAX(id) FROM snapshots)
             ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!("Loaded {} servers from most recent snapshot", rows.len());

        Ok(rows.into_iter().map(ServerRow::into_server).collect())
    }

    async fn get_most_recent_date(&self) -> Result<Option<OffsetDateTime>> {
        let millis: Option<i64> =
            sqlx::query_scalar("SELECT updated_at FROM snapshots ORDER BY id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(millis.map(millis_to_datetime))
    }

    async fn create_server(&self, server: &ServerRecord) -> Result<i64> {
        let ids = self.insert_snapshot(std::slice::from_ref(server)).await?;
        ids.first()
            .copied()
            .ok_or_else(|| AppError::Internal("server insert returned no id".to_string()))
    }

    async fn get_server(&self, id: i64) -> Result<Option<ServerRecord>> {
        let row: Option<ServerRow> =
            sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM servers WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(ServerRow::into_server))
    }

    async fn insert_snapshot(&self, servers: &[ServerRecord]) -> Result<Vec<i64>> {
        let Some(updated_at) = servers.iter().map(|s| s.updated_at).max() else {
            return Ok(Vec::new());
        };

        let mut tx = self.pool.begin().await?;
        let snapshot_id = sqlx::query("INSERT INTO snapshots (updated_at) VALUES (?1)")
            .bind(datetime_to_millis(updated_at))
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        let mut ids = Vec::with_capacity(servers.len());
        for server in servers {
            ids.push(Self::insert_one(&mut tx, snapshot_id, server).await?);
        }

        tx.commit().await?;
        tracing::debug!(snapshot_id, "Stored snapshot of {} servers", ids.len());
        Ok(ids)
    }
}

#[async_trait]
impl PreferenceStore for SqliteServerStore {
    async fn load(&self) -> Result<SelectionPreferences> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM preferences")
            .fetch_all(&self.pool)
            .await?;
        let values: HashMap<String, String> = rows.into_iter().collect();
        let defaults = SelectionPreferences::default();

        let selected_server_id = values.get(PREF_SELECTED_SERVER).and_then(|v| {
            v.parse::<i64>()
                .map_err(|_| tracing::warn!("Invalid selected server id '{}'", v))
                .ok()
        });

        Ok(SelectionPreferences {
            auto_detect: parse_flag(&values, PREF_AUTO_DETECT, defaults.auto_detect),
            custom_server_url: values.get(PREF_CUSTOM_SERVER_URL).cloned(),
            selected_server_id,
            custom_server_selected: parse_flag(
                &values,
                PREF_SELECTED_CUSTOM_SERVER,
                defaults.custom_server_selected,
            ),
            custom_server_url_valid: parse_flag(
                &values,
                PREF_CUSTOM_SERVER_URL_VALID,
                defaults.custom_server_url_valid,
            ),
        })
    }

    async fn save(&self, prefs: &SelectionPreferences) -> Result<()> {
        let entries: [(&str, Option<String>); 5] = [
            (PREF_AUTO_DETECT, Some(prefs.auto_detect.to_string())),
            (PREF_CUSTOM_SERVER_URL, prefs.custom_server_url.clone()),
            (
                PREF_SELECTED_SERVER,
                prefs.selected_server_id.map(|id| id.to_string()),
            ),
            (
                PREF_SELECTED_CUSTOM_SERVER,
                Some(prefs.custom_server_selected.to_string()),
            ),
            (
                PREF_CUSTOM_SERVER_URL_VALID,
                Some(prefs.custom_server_url_valid.to_string()),
            ),
        ];

        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            match value {
                Some(value) => {
                    sqlx::query("INSERT OR REPLACE INTO preferences (key, value) VALUES (?1, ?2)")
                        .bind(key)
                        .bind(value)
                        .execute(&mut *tx)
                        .await?;
                }
                None => {
                    sqlx::query("DELETE FROM preferences WHERE key = ?1")
                        .bind(key)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "sqlite_repo_tests.rs"]
mod sqlite_repo_tests;
