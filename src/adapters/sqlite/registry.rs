//! SQLite implementation of the drone registry.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::domain::errors::{RegistryError, RegistryResult};
use crate::domain::models::DroneRecord;
use crate::domain::ports::DroneRegistry;

/// Durable drone registry backed by SQLite (WAL mode).
///
/// The connection pool serializes writes; each drone actor issues its own
/// upserts in program order, which keeps the recorded history monotonic per
/// drone.
#[derive(Clone)]
pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    /// Open the registry database at `path`, creating file and schema if
    /// needed.
    pub async fn open(path: impl AsRef<Path>) -> RegistryResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|err| RegistryError::Database(err.to_string()))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let registry = Self { pool };
        registry.ensure_schema().await?;
        Ok(registry)
    }

    /// In-memory registry for tests.
    pub async fn in_memory() -> RegistryResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|err| RegistryError::Database(err.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let registry = Self { pool };
        registry.ensure_schema().await?;
        Ok(registry)
    }

    async fn ensure_schema(&self) -> RegistryResult<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS drones (
                drone_uuid TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                site TEXT NOT NULL,
                resource_id TEXT,
                dns_name TEXT,
                resource_status TEXT,
                last_seen TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct DroneRow {
    drone_uuid: String,
    state: String,
    site: String,
    resource_id: Option<String>,
    dns_name: Option<String>,
    resource_status: Option<String>,
    last_seen: String,
}

impl TryFrom<DroneRow> for DroneRecord {
    type Error = RegistryError;

    fn try_from(row: DroneRow) -> Result<Self, Self::Error> {
        let last_seen = DateTime::parse_from_rfc3339(&row.last_seen)
            .map_err(|err| RegistryError::Serialization(err.to_string()))?
            .with_timezone(&Utc);
        Ok(DroneRecord {
            drone_uuid: row.drone_uuid,
            state: row.state,
            site: row.site,
            resource_id: row.resource_id,
            dns_name: row.dns_name,
            resource_status: row.resource_status,
            last_seen,
        })
    }
}

#[async_trait]
impl DroneRegistry for SqliteRegistry {
    async fn get_resource_state(&self, drone_uuid: &str) -> RegistryResult<Option<String>> {
        let state: Option<(String,)> =
            sqlx::query_as("SELECT state FROM drones WHERE drone_uuid = ?")
                .bind(drone_uuid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(state.map(|(state,)| state))
    }

    async fn get_resources(&self) -> RegistryResult<Vec<DroneRecord>> {
        let rows: Vec<DroneRow> = sqlx::query_as("SELECT * FROM drones ORDER BY drone_uuid")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn upsert(&self, record: &DroneRecord) -> RegistryResult<()> {
        sqlx::query(
            r#"INSERT INTO drones
                 (drone_uuid, state, site, resource_id, dns_name, resource_status, last_seen)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(drone_uuid) DO UPDATE SET
                 state = excluded.state,
                 resource_id = excluded.resource_id,
                 dns_name = excluded.dns_name,
                 resource_status = excluded.resource_status,
                 last_seen = excluded.last_seen"#,
        )
        .bind(&record.drone_uuid)
        .bind(&record.state)
        .bind(&record.site)
        .bind(&record.resource_id)
        .bind(&record.dns_name)
        .bind(&record.resource_status)
        .bind(record.last_seen.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
