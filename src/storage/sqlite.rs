use crate::models::{Hit, NavigationTiming};
use crate::storage::{HitStore, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

/// Row layout of the `hits` table. Timestamps are epoch milliseconds and
/// the timing payload is JSON text.
#[derive(Debug, sqlx::FromRow)]
struct HitRow {
    path: Option<String>,
    hostname: Option<String>,
    referrer: Option<String>,
    referrer_hostname: Option<String>,
    created_at: i64,
    updated_at: i64,
    navigation_timing: Option<String>,
}

fn from_millis(millis: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::Corrupt(format!("timestamp {millis} out of range")))
}

impl TryFrom<HitRow> for Hit {
    type Error = StorageError;

    fn try_from(row: HitRow) -> StorageResult<Self> {
        let navigation_timing = row
            .navigation_timing
            .as_deref()
            .map(serde_json::from_str::<NavigationTiming>)
            .transpose()
            .map_err(|e| StorageError::Corrupt(format!("navigation timing: {e}")))?;

        Ok(Hit {
            path: row.path,
            hostname: row.hostname,
            referrer: row.referrer,
            referrer_hostname: row.referrer_hostname,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
            navigation_timing,
        })
    }
}

#[async_trait]
impl HitStore for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hostname TEXT NOT NULL,
                path TEXT,
                referrer TEXT,
                referrer_hostname TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                navigation_timing TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_hits_host_created ON hits(hostname, created_at)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn insert_hit(&self, hit: &Hit) -> StorageResult<()> {
        let hostname = hit
            .hostname
            .as_deref()
            .filter(|hostname| !hostname.is_empty())
            .ok_or(StorageError::MissingHostname)?;

        let navigation_timing = hit
            .navigation_timing
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StorageError::Other(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO hits (hostname, path, referrer, referrer_hostname, created_at, updated_at, navigation_timing)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(hostname)
        .bind(hit.path.as_deref())
        .bind(hit.referrer.as_deref())
        .bind(hit.referrer_hostname.as_deref())
        .bind(hit.created_at.timestamp_millis())
        .bind(hit.updated_at.timestamp_millis())
        .bind(navigation_timing)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        Ok(())
    }

    async fn hits_for_host(
        &self,
        hostname: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Hit>> {
        let rows = sqlx::query_as::<_, HitRow>(
            r#"
            SELECT path, hostname, referrer, referrer_hostname, created_at, updated_at, navigation_timing
            FROM hits
            WHERE hostname = ? AND created_at >= ? AND created_at <= ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(hostname)
        .bind(start.timestamp_millis())
        .bind(end.timestamp_millis())
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        rows.into_iter().map(Hit::try_from).collect()
    }

    async fn hostnames(&self) -> Result<Vec<String>> {
        let hostnames = sqlx::query_as::<_, (String,)>(
            "SELECT DISTINCT hostname FROM hits ORDER BY hostname ASC",
        )
        .fetch_all(self.pool.as_ref())
        .await?
        .into_iter()
        .map(|(hostname,)| hostname)
        .collect();

        Ok(hostnames)
    }
}
