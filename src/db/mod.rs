pub mod memory;
pub mod models;
pub mod postgres;
pub mod query;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use self::{
    models::{NewReading, Reading},
    query::{
        ComplianceCounts, ComplianceQuery, DailyGroup, DailySummaryQuery, PageRequest,
        ReadingFilter,
    },
};

pub use self::{memory::MemoryReadingStore, postgres::PgReadingStore};

/// Persistence for sensor readings.
///
/// Readings are insert-only. Every read is either a filtered find or a
/// read-only aggregation described by a `query` descriptor.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist one reading; the store assigns `id` and `created_at`.
    async fn insert(&self, reading: NewReading) -> Result<Reading>;

    async fn count(&self, filter: &ReadingFilter) -> Result<u64>;

    /// Matching readings, newest first.
    async fn find(&self, filter: &ReadingFilter, page: PageRequest) -> Result<Vec<Reading>>;

    async fn latest(&self, filter: &ReadingFilter) -> Result<Option<Reading>>;

    /// Day buckets ordered by day ascending.
    async fn daily_summary(&self, query: &DailySummaryQuery) -> Result<Vec<DailyGroup>>;

    async fn compliance(&self, query: &ComplianceQuery) -> Result<ComplianceCounts>;

    /// Round-trip to the backend.
    async fn ping(&self) -> Result<()>;
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
