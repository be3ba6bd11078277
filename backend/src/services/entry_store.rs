use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    models::{EntryStats, FilterOptions, LogEntry, NewLogEntry, Page, Pagination, StatusGroupCount},
    repositories::log_entry::{self as log_entry_repo, DateRange, LogEntryFilters},
    utils::time::retention_cutoff,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence boundary for log entries: append, filtered reads,
/// aggregates and bulk deletes. Entries are never updated.
#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn create(&self, entry: NewLogEntry) -> Result<i64, StoreError>;

    async fn find(&self, id: i64) -> Result<Option<LogEntry>, StoreError>;

    /// Most recent first.
    async fn query(
        &self,
        filters: &LogEntryFilters,
        pagination: Pagination,
    ) -> Result<Page<LogEntry>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    async fn count_before(&self, cutoff: DateTime<Utc>) -> Result<i64, StoreError>;

    /// Removes entries with `created_at` strictly before `cutoff`.
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn delete_range(&self, range: DateRange) -> Result<u64, StoreError>;

    async fn delete_all(&self) -> Result<u64, StoreError>;

    async fn stats(&self) -> Result<EntryStats, StoreError>;

    async fn status_groups(&self) -> Result<Vec<StatusGroupCount>, StoreError>;

    async fn filter_options(&self) -> Result<FilterOptions, StoreError>;

    async fn delete_older_than(&self, days: u32) -> Result<u64, StoreError> {
        self.delete_before(retention_cutoff(Utc::now(), days)).await
    }

    async fn count_older_than(&self, days: u32) -> Result<i64, StoreError> {
        self.count_before(retention_cutoff(Utc::now(), days)).await
    }
}

/// Postgres-backed store over the `logbook_entries` table.
#[derive(Debug, Clone)]
pub struct PgEntryStore {
    pool: PgPool,
}

impl PgEntryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EntryStore for PgEntryStore {
    async fn create(&self, entry: NewLogEntry) -> Result<i64, StoreError> {
        Ok(log_entry_repo::insert_log_entry(&self.pool, &entry).await?)
    }

    async fn find(&self, id: i64) -> Result<Option<LogEntry>, StoreError> {
        Ok(log_entry_repo::fetch_log_entry(&self.pool, id).await?)
    }

    async fn query(
        &self,
        filters: &LogEntryFilters,
        pagination: Pagination,
    ) -> Result<Page<LogEntry>, StoreError> {
        let (items, total) =
            log_entry_repo::list_log_entries(&self.pool, filters, pagination).await?;
        Ok(Page::new(items, total, pagination))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(log_entry_repo::count_log_entries(&self.pool).await?)
    }

    async fn count_before(&self, cutoff: DateTime<Utc>) -> Result<i64, StoreError> {
        Ok(log_entry_repo::count_log_entries_before(&self.pool, cutoff).await?)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(log_entry_repo::delete_log_entries_before(&self.pool, cutoff).await?)
    }

    async fn delete_range(&self, range: DateRange) -> Result<u64, StoreError> {
        Ok(log_entry_repo::delete_log_entries_between(&self.pool, range).await?)
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        Ok(log_entry_repo::delete_all_log_entries(&self.pool).await?)
    }

    async fn stats(&self) -> Result<EntryStats, StoreError> {
        Ok(log_entry_repo::fetch_stats(&self.pool).await?)
    }

    async fn status_groups(&self) -> Result<Vec<StatusGroupCount>, StoreError> {
        Ok(log_entry_repo::fetch_status_groups(&self.pool).await?)
    }

    async fn filter_options(&self) -> Result<FilterOptions, StoreError> {
        Ok(log_entry_repo::fetch_filter_options(&self.pool).await?)
    }
}
