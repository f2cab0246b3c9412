//! Store adapter
//!
//! All SQL goes through [`Store`]: ingestion upserts, KPI aggregate
//! queries and the memory engine's full-table reads. Pooling and
//! transaction discipline are centralized here — each logical write runs
//! in one scoped transaction (commit on success, rollback on drop) and
//! the connection returns to the pool on every exit path.

pub mod customers;
pub mod init;
pub mod orders;

pub use customers::Customer;
pub use orders::Order;

use crate::config::PoolConfig;
use crate::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

/// Timestamp storage format; lexicographic comparison matches
/// chronological order and `strftime` can group by it.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Per-table row count, for the status surface
#[derive(Debug, Clone, Serialize)]
pub struct TableStats {
    pub name: String,
    pub row_count: i64,
}

/// Handle over the connection pool, constructed once at process start
/// and passed into pipelines and engines.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database at `db_path`.
    pub async fn open(db_path: &Path, pool_config: &PoolConfig) -> Result<Self> {
        let pool = init::init_database(db_path, pool_config).await?;
        Ok(Self { pool })
    }

    /// Wrap an already-initialized pool (test seam).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Pre-flight liveness check.
    pub async fn ping(&self) -> Result<bool> {
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(one == 1)
    }

    /// Row counts for the customers and orders tables.
    pub async fn table_stats(&self) -> Result<Vec<TableStats>> {
        let mut stats = Vec::with_capacity(2);
        for name in ["customers", "orders"] {
            let row_count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {name}"))
                .fetch_one(&self.pool)
                .await?;
            stats.push(TableStats {
                name: name.to_string(),
                row_count,
            });
        }
        Ok(stats)
    }

    /// Close all pooled connections. Process-scoped teardown.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connections closed");
    }
}
