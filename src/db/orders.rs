//! Order persistence
//!
//! `mobile_number` joins orders to customers but is deliberately not a
//! declared foreign key; orphan orders are allowed and each KPI decides
//! how to treat them (LEFT vs INNER join).

use super::{Store, DATETIME_FORMAT};
use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::Row;
use tracing::info;

/// Cleaned order record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub order_id: String,
    pub mobile_number: String,
    pub order_date_time: NaiveDateTime,
    pub sku_id: String,
    pub sku_count: i64,
    pub total_amount: f64,
}

const UPSERT_ORDER: &str = r#"
    INSERT INTO orders (order_id, mobile_number, order_date_time, sku_id, sku_count, total_amount)
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT(order_id) DO UPDATE SET
        sku_count = excluded.sku_count,
        total_amount = excluded.total_amount,
        updated_at = CURRENT_TIMESTAMP
"#;

impl Store {
    /// Upsert a batch of orders in one transaction.
    pub async fn upsert_orders(&self, orders: &[Order]) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        for order in orders {
            sqlx::query(UPSERT_ORDER)
                .bind(&order.order_id)
                .bind(&order.mobile_number)
                .bind(order.order_date_time.format(DATETIME_FORMAT).to_string())
                .bind(&order.sku_id)
                .bind(order.sku_count)
                .bind(order.total_amount)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!("Upserted {} order records", orders.len());
        Ok(())
    }

    /// Delete all existing orders, then upsert the batch, atomically.
    pub async fn replace_orders(&self, orders: &[Order]) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM orders").execute(&mut *tx).await?;
        for order in orders {
            sqlx::query(UPSERT_ORDER)
                .bind(&order.order_id)
                .bind(&order.mobile_number)
                .bind(order.order_date_time.format(DATETIME_FORMAT).to_string())
                .bind(&order.sku_id)
                .bind(order.sku_count)
                .bind(order.total_amount)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!("Replaced order table with {} records", orders.len());
        Ok(())
    }

    /// Full-table read for the memory engine's frames.
    pub async fn fetch_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT order_id, mobile_number, order_date_time, sku_id, sku_count, total_amount \
             FROM orders ORDER BY order_id",
        )
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                let raw_dt: String = row.get("order_date_time");
                let order_date_time = NaiveDateTime::parse_from_str(&raw_dt, DATETIME_FORMAT)
                    .map_err(|e| {
                        Error::Kpi(format!("unparseable order_date_time '{raw_dt}': {e}"))
                    })?;
                Ok(Order {
                    order_id: row.get("order_id"),
                    mobile_number: row.get("mobile_number"),
                    order_date_time,
                    sku_id: row.get("sku_id"),
                    sku_count: row.get("sku_count"),
                    total_amount: row.get("total_amount"),
                })
            })
            .collect()
    }

    pub async fn count_orders(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}
