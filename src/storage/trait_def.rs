use crate::models::Hit;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("hit has no hostname")]
    MissingHostname,
    #[error("stored hit is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Source of hit records for aggregation.
///
/// The store only selects hits; all aggregation happens in
/// [`crate::reduce`] over what it returns.
#[async_trait]
pub trait HitStore: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Persist one hit. Hits without a hostname are rejected.
    async fn insert_hit(&self, hit: &Hit) -> StorageResult<()>;

    /// Hits recorded for `hostname` with `createdAt` in `start..=end`,
    /// oldest first.
    async fn hits_for_host(
        &self,
        hostname: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Hit>>;

    /// Distinct hostnames that have at least one hit.
    async fn hostnames(&self) -> Result<Vec<String>>;
}
