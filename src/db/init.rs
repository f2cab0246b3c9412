//! Database initialization
//!
//! Creates the SQLite file on first run, applies connection pragmas and
//! the table schema. Safe to call repeatedly; schema creation is
//! idempotent.

use crate::config::PoolConfig;
use crate::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection pool and create tables if needed.
///
/// The pool is bounded and recycles aged connections; every acquired
/// connection is liveness-checked before use.
pub async fn init_database(db_path: &Path, pool_config: &PoolConfig) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc creates the database file when missing
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(pool_config.max_connections)
        .min_connections(pool_config.min_connections)
        .max_lifetime(Duration::from_secs(pool_config.max_lifetime_secs))
        .acquire_timeout(Duration::from_secs(pool_config.acquire_timeout_secs))
        .test_before_acquire(true)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_customers_table(&pool).await?;
    create_orders_table(&pool).await?;

    Ok(pool)
}

async fn create_customers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            customer_id   TEXT PRIMARY KEY,
            customer_name TEXT NOT NULL,
            mobile_number TEXT NOT NULL,
            region        TEXT NOT NULL,
            created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // mobile_number is the join key for every customer-facing KPI
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_customers_mobile ON customers(mobile_number)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_orders_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            order_id        TEXT PRIMARY KEY,
            mobile_number   TEXT NOT NULL,
            order_date_time TEXT NOT NULL,
            sku_id          TEXT NOT NULL,
            sku_count       INTEGER NOT NULL,
            total_amount    REAL NOT NULL,
            created_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_mobile ON orders(mobile_number)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_date ON orders(order_date_time)")
        .execute(pool)
        .await?;

    Ok(())
}
