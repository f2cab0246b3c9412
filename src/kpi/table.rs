//! Table-based KPI engine
//!
//! Each KPI is one aggregate query executed against the store. Joins are
//! on `mobile_number`; Regional Revenue LEFT-joins so regions with zero
//! orders still appear (COALESCE to 0, matching the memory engine's
//! fill-with-zero behavior).

use super::report::{rows_to_maps, JsonMap, KpiMethod, KpiReport};
use super::{
    monthly_metadata, regional_metadata, repeat_metadata, top_metadata, KpiEngine, KpiKind,
    KpiParams, MonthlyTrendRow, RegionalRevenueRow, RepeatCustomerRow, TopCustomerRow,
};
use crate::db::{Store, DATETIME_FORMAT};
use crate::Result;
use chrono::{Duration, Utc};
use sqlx::Row;
use tracing::{error, info};

/// SQL execution path; reads the store directly on every call.
pub struct TableKpiEngine {
    store: Store,
}

impl TableKpiEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    async fn repeat_customers(&self) -> Result<(Vec<JsonMap>, JsonMap)> {
        let rows = sqlx::query(
            r#"
            SELECT c.customer_id,
                   c.customer_name,
                   COUNT(o.order_id) AS order_count,
                   SUM(o.total_amount) AS total_spent
            FROM customers c
            INNER JOIN orders o ON o.mobile_number = c.mobile_number
            GROUP BY c.customer_id, c.customer_name
            HAVING COUNT(o.order_id) > 1
            ORDER BY order_count DESC, total_spent DESC
            "#,
        )
        .fetch_all(self.store.pool())
        .await?;

        let rows: Vec<RepeatCustomerRow> = rows
            .into_iter()
            .map(|row| RepeatCustomerRow {
                customer_id: row.get("customer_id"),
                customer_name: row.get("customer_name"),
                order_count: row.get("order_count"),
                total_spent: row.get("total_spent"),
            })
            .collect();

        info!("Repeat Customers KPI (sql): {} customers found", rows.len());
        Ok((rows_to_maps(&rows), repeat_metadata(&rows)))
    }

    async fn monthly_trends(&self) -> Result<(Vec<JsonMap>, JsonMap)> {
        let rows = sqlx::query(
            r#"
            SELECT strftime('%Y-%m', order_date_time) AS month_year,
                   COUNT(order_id) AS total_orders,
                   SUM(total_amount) AS total_revenue,
                   AVG(total_amount) AS avg_order_value,
                   COUNT(DISTINCT mobile_number) AS unique_customers
            FROM orders
            GROUP BY month_year
            ORDER BY month_year ASC
            "#,
        )
        .fetch_all(self.store.pool())
        .await?;

        let rows: Vec<MonthlyTrendRow> = rows
            .into_iter()
            .map(|row| MonthlyTrendRow {
                month_year: row.get("month_year"),
                total_orders: row.get("total_orders"),
                total_revenue: row.get("total_revenue"),
                avg_order_value: row.get("avg_order_value"),
                unique_customers: row.get("unique_customers"),
            })
            .collect();

        info!("Monthly Trends KPI (sql): {} months analyzed", rows.len());
        Ok((rows_to_maps(&rows), monthly_metadata(&rows)))
    }

    async fn regional_revenue(&self) -> Result<(Vec<JsonMap>, JsonMap)> {
        let rows = sqlx::query(
            r#"
            SELECT c.region,
                   COUNT(DISTINCT c.customer_id) AS customer_count,
                   COUNT(o.order_id) AS total_orders,
                   COALESCE(SUM(o.total_amount), 0.0) AS total_revenue,
                   COALESCE(AVG(o.total_amount), 0.0) AS avg_order_value
            FROM customers c
            LEFT JOIN orders o ON o.mobile_number = c.mobile_number
            GROUP BY c.region
            ORDER BY total_revenue DESC
            "#,
        )
        .fetch_all(self.store.pool())
        .await?;

        let rows: Vec<RegionalRevenueRow> = rows
            .into_iter()
            .map(|row| RegionalRevenueRow {
                region: row.get("region"),
                customer_count: row.get("customer_count"),
                total_orders: row.get("total_orders"),
                total_revenue: row.get("total_revenue"),
                avg_order_value: row.get("avg_order_value"),
            })
            .collect();

        info!("Regional Revenue KPI (sql): {} regions analyzed", rows.len());
        Ok((rows_to_maps(&rows), regional_metadata(&rows)))
    }

    async fn top_customers(&self, days: i64, limit: i64) -> Result<(Vec<JsonMap>, JsonMap)> {
        // Window cutoff is evaluated at call time, not query-plan time
        let cutoff = (Utc::now().naive_utc() - Duration::days(days))
            .format(DATETIME_FORMAT)
            .to_string();

        let rows = sqlx::query(
            r#"
            SELECT c.customer_id,
                   c.customer_name,
                   c.region,
                   COUNT(o.order_id) AS order_count,
                   SUM(o.total_amount) AS total_spend,
                   AVG(o.total_amount) AS avg_order_value,
                   MAX(o.order_date_time) AS last_order_date
            FROM customers c
            INNER JOIN orders o ON o.mobile_number = c.mobile_number
            WHERE o.order_date_time >= ?
            GROUP BY c.customer_id, c.customer_name, c.region
            ORDER BY total_spend DESC
            LIMIT ?
            "#,
        )
        .bind(&cutoff)
        .bind(limit)
        .fetch_all(self.store.pool())
        .await?;

        let rows: Vec<TopCustomerRow> = rows
            .into_iter()
            .map(|row| TopCustomerRow {
                customer_id: row.get("customer_id"),
                customer_name: row.get("customer_name"),
                region: row.get("region"),
                order_count: row.get("order_count"),
                total_spend: row.get("total_spend"),
                avg_order_value: row.get("avg_order_value"),
                last_order_date: row.get("last_order_date"),
            })
            .collect();

        info!(
            "Top Customers KPI (sql): {} customers in last {days} days",
            rows.len()
        );
        Ok((rows_to_maps(&rows), top_metadata(days, &rows)))
    }
}

impl KpiEngine for TableKpiEngine {
    fn method(&self) -> KpiMethod {
        KpiMethod::Sql
    }

    async fn calculate(&self, kind: KpiKind, params: &KpiParams) -> KpiReport {
        let outcome = match kind {
            KpiKind::RepeatCustomers => self.repeat_customers().await,
            KpiKind::MonthlyTrends => self.monthly_trends().await,
            KpiKind::RegionalRevenue => self.regional_revenue().await,
            KpiKind::TopCustomers => self.top_customers(params.days, params.limit).await,
        };

        match outcome {
            Ok((data, metadata)) => KpiReport::success(kind, KpiMethod::Sql, data, metadata),
            Err(e) => {
                error!("Error calculating {} (sql): {e}", kind.name());
                KpiReport::failure(kind, KpiMethod::Sql, e.to_string())
            }
        }
    }
}
