//! Customer persistence
//!
//! Customers are created only through the ingestion pipeline (bulk
//! upsert) or removed by bulk delete; there is no per-record update API.

use super::Store;
use crate::Result;
use serde::Serialize;
use sqlx::Row;
use tracing::info;

/// Cleaned customer record as the pipelines and KPI engines see it.
/// `created_at`/`updated_at` are store-managed and not part of the
/// in-memory model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub customer_id: String,
    pub customer_name: String,
    pub mobile_number: String,
    pub region: String,
}

const UPSERT_CUSTOMER: &str = r#"
    INSERT INTO customers (customer_id, customer_name, mobile_number, region)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(customer_id) DO UPDATE SET
        customer_name = excluded.customer_name,
        mobile_number = excluded.mobile_number,
        region = excluded.region,
        updated_at = CURRENT_TIMESTAMP
"#;

impl Store {
    /// Upsert a batch of customers in one transaction. Mutable fields
    /// are overwritten on conflict; `customer_id` is never changed.
    pub async fn upsert_customers(&self, customers: &[Customer]) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        for customer in customers {
            sqlx::query(UPSERT_CUSTOMER)
                .bind(&customer.customer_id)
                .bind(&customer.customer_name)
                .bind(&customer.mobile_number)
                .bind(&customer.region)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!("Upserted {} customer records", customers.len());
        Ok(())
    }

    /// Delete all existing customers, then upsert the batch, atomically.
    /// A failure anywhere rolls the delete back too.
    pub async fn replace_customers(&self, customers: &[Customer]) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM customers").execute(&mut *tx).await?;
        for customer in customers {
            sqlx::query(UPSERT_CUSTOMER)
                .bind(&customer.customer_id)
                .bind(&customer.customer_name)
                .bind(&customer.mobile_number)
                .bind(&customer.region)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!("Replaced customer table with {} records", customers.len());
        Ok(())
    }

    /// Full-table read for the memory engine's frames.
    pub async fn fetch_customers(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query(
            "SELECT customer_id, customer_name, mobile_number, region \
             FROM customers ORDER BY customer_id",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Customer {
                customer_id: row.get("customer_id"),
                customer_name: row.get("customer_name"),
                mobile_number: row.get("mobile_number"),
                region: row.get("region"),
            })
            .collect())
    }

    pub async fn count_customers(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}
