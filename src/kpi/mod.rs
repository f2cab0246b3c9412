//! KPI computation layer
//!
//! Four fixed KPIs, enumerated in [`KpiKind`], computed by two
//! interchangeable engines implementing [`KpiEngine`]:
//! [`table::TableKpiEngine`] (one aggregate SQL query per KPI) and
//! [`memory::MemoryKpiEngine`] (in-memory aggregation over cached table
//! frames). Both produce the same row field names and semantically equal
//! values over the same logical data.

pub mod memory;
pub mod report;
pub mod table;

pub use memory::MemoryKpiEngine;
pub use report::{JsonMap, KpiMethod, KpiOutcome, KpiReport};
pub use table::TableKpiEngine;

use serde::Serialize;
use std::collections::BTreeMap;

/// The fixed KPI registry. Enumerated, not inherited; adding a KPI means
/// adding a variant here plus one computation per engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KpiKind {
    RepeatCustomers,
    MonthlyTrends,
    RegionalRevenue,
    TopCustomers,
}

impl KpiKind {
    pub const ALL: [KpiKind; 4] = [
        KpiKind::RepeatCustomers,
        KpiKind::MonthlyTrends,
        KpiKind::RegionalRevenue,
        KpiKind::TopCustomers,
    ];

    /// Stable key used at the call surface and in `calculate_all` maps
    pub fn key(self) -> &'static str {
        match self {
            KpiKind::RepeatCustomers => "repeat_customers",
            KpiKind::MonthlyTrends => "monthly_trends",
            KpiKind::RegionalRevenue => "regional_revenue",
            KpiKind::TopCustomers => "top_customers",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KpiKind::RepeatCustomers => "Repeat Customers",
            KpiKind::MonthlyTrends => "Monthly Order Trends",
            KpiKind::RegionalRevenue => "Regional Revenue",
            KpiKind::TopCustomers => "Top Customers",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            KpiKind::RepeatCustomers => "Customers who have placed more than one order",
            KpiKind::MonthlyTrends => "Orders and revenue aggregated by month",
            KpiKind::RegionalRevenue => "Total revenue by customer region",
            KpiKind::TopCustomers => "Top customers by spending in a recent time window",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.key() == key)
    }
}

/// Parameters recognized by the KPI call surface. Only TopCustomers
/// reads them; the others ignore both.
#[derive(Debug, Clone, Copy)]
pub struct KpiParams {
    /// Look-back window in days for TopCustomers
    pub days: i64,
    /// Maximum number of rows for TopCustomers
    pub limit: i64,
}

impl Default for KpiParams {
    fn default() -> Self {
        Self { days: 30, limit: 10 }
    }
}

/// Catalog entry for the KPI listing surface
#[derive(Debug, Clone, Serialize)]
pub struct KpiInfo {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// List every registered KPI
pub fn kpi_catalog() -> Vec<KpiInfo> {
    KpiKind::ALL
        .iter()
        .map(|kind| KpiInfo {
            key: kind.key(),
            name: kind.name(),
            description: kind.description(),
        })
        .collect()
}

/// Capability interface shared by both engines. A failing KPI yields a
/// failure envelope for that KPI alone; `calculate_all` always returns
/// one envelope per registered KPI.
#[allow(async_fn_in_trait)]
pub trait KpiEngine {
    fn method(&self) -> KpiMethod;

    async fn calculate(&self, kind: KpiKind, params: &KpiParams) -> KpiReport;

    /// Resolve a KPI by its surface key; an unknown key yields a failure
    /// envelope listing the recognized keys.
    async fn calculate_by_key(&self, key: &str, params: &KpiParams) -> KpiReport {
        match KpiKind::from_key(key) {
            Some(kind) => self.calculate(kind, params).await,
            None => {
                let available: Vec<&str> = KpiKind::ALL.iter().map(|k| k.key()).collect();
                KpiReport::failure_named(
                    key.to_string(),
                    String::new(),
                    self.method(),
                    format!("Unknown KPI: {key}. Available: {}", available.join(", ")),
                )
            }
        }
    }

    async fn calculate_all(&self, params: &KpiParams) -> BTreeMap<&'static str, KpiReport> {
        let mut results = BTreeMap::new();
        for kind in KpiKind::ALL {
            results.insert(kind.key(), self.calculate(kind, params).await);
        }
        results
    }
}

// ---------------------------------------------------------------------
// Row shapes, shared verbatim by both engines so field names can never
// drift apart.

#[derive(Debug, Clone, Serialize)]
pub struct RepeatCustomerRow {
    pub customer_id: String,
    pub customer_name: String,
    pub order_count: i64,
    pub total_spent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyTrendRow {
    /// Calendar month, `YYYY-MM`
    pub month_year: String,
    pub total_orders: i64,
    pub total_revenue: f64,
    pub avg_order_value: f64,
    pub unique_customers: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionalRevenueRow {
    pub region: String,
    pub customer_count: i64,
    pub total_orders: i64,
    /// 0.0 for regions with no matching orders
    pub total_revenue: f64,
    pub avg_order_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopCustomerRow {
    pub customer_id: String,
    pub customer_name: String,
    pub region: String,
    pub order_count: i64,
    pub total_spend: f64,
    pub avg_order_value: f64,
    /// `%Y-%m-%d %H:%M:%S`, matching store representation
    pub last_order_date: String,
}

// ---------------------------------------------------------------------
// Metadata derivation, shared so both engines stay internally consistent
// with their data rows by construction.

pub(crate) fn repeat_metadata(rows: &[RepeatCustomerRow]) -> JsonMap {
    report::metadata([
        ("total_repeat_customers", (rows.len() as i64).into()),
        (
            "total_orders",
            rows.iter().map(|r| r.order_count).sum::<i64>().into(),
        ),
        (
            "total_revenue",
            rows.iter().map(|r| r.total_spent).sum::<f64>().into(),
        ),
    ])
}

pub(crate) fn monthly_metadata(rows: &[MonthlyTrendRow]) -> JsonMap {
    let total_orders: i64 = rows.iter().map(|r| r.total_orders).sum();
    let avg_monthly_orders = if rows.is_empty() {
        0.0
    } else {
        total_orders as f64 / rows.len() as f64
    };
    report::metadata([
        ("total_months", (rows.len() as i64).into()),
        ("total_orders", total_orders.into()),
        (
            "total_revenue",
            rows.iter().map(|r| r.total_revenue).sum::<f64>().into(),
        ),
        ("avg_monthly_orders", avg_monthly_orders.into()),
    ])
}

pub(crate) fn regional_metadata(rows: &[RegionalRevenueRow]) -> JsonMap {
    report::metadata([
        ("total_regions", (rows.len() as i64).into()),
        (
            "total_revenue",
            rows.iter().map(|r| r.total_revenue).sum::<f64>().into(),
        ),
        (
            "highest_revenue_region",
            rows.first()
                .map(|r| r.region.clone().into())
                .unwrap_or(serde_json::Value::Null),
        ),
    ])
}

pub(crate) fn top_metadata(days: i64, rows: &[TopCustomerRow]) -> JsonMap {
    let total: f64 = rows.iter().map(|r| r.total_spend).sum();
    let avg = if rows.is_empty() {
        0.0
    } else {
        total / rows.len() as f64
    };
    report::metadata([
        ("time_period_days", days.into()),
        ("top_customer_count", (rows.len() as i64).into()),
        ("total_revenue_top_customers", total.into()),
        ("avg_spend_top_customers", avg.into()),
    ])
}
