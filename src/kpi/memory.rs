//! Memory-based KPI engine
//!
//! Loads the full customers and orders tables into frames once per
//! [`MemoryKpiEngine::load_data`] call, then computes each KPI as an
//! in-memory grouped aggregation. Join semantics mirror the SQL engine
//! exactly, including row duplication when a mobile number is shared by
//! several customers. Frames are cached behind an RwLock so a reload
//! cannot interleave with a concurrent read; an explicit reload is
//! required to observe new store data.

use super::report::{rows_to_maps, JsonMap, KpiMethod, KpiReport};
use super::{
    monthly_metadata, regional_metadata, repeat_metadata, top_metadata, KpiEngine, KpiKind,
    KpiParams, MonthlyTrendRow, RegionalRevenueRow, RepeatCustomerRow, TopCustomerRow,
};
use crate::db::{Customer, Order, Store, DATETIME_FORMAT};
use crate::{Error, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::info;

/// Cached table snapshots
struct Frames {
    customers: Vec<Customer>,
    orders: Vec<Order>,
    loaded_at: DateTime<Utc>,
}

impl Frames {
    /// Index orders by join key; each KPI walks customers and picks up
    /// every matching order, which reproduces SQL join multiplicity.
    fn orders_by_mobile(&self) -> HashMap<&str, Vec<&Order>> {
        let mut index: HashMap<&str, Vec<&Order>> = HashMap::new();
        for order in &self.orders {
            index.entry(order.mobile_number.as_str()).or_default().push(order);
        }
        index
    }
}

/// In-memory execution path over cached frames.
pub struct MemoryKpiEngine {
    store: Store,
    frames: RwLock<Option<Frames>>,
}

impl MemoryKpiEngine {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            frames: RwLock::new(None),
        }
    }

    /// Load (or reload) both tables into memory. Returns the loaded
    /// (customer, order) counts.
    pub async fn load_data(&self) -> Result<(usize, usize)> {
        info!("Loading data into memory...");
        let customers = self.store.fetch_customers().await?;
        let orders = self.store.fetch_orders().await?;
        let counts = (customers.len(), orders.len());

        let mut guard = self.frames.write().await;
        *guard = Some(Frames {
            customers,
            orders,
            loaded_at: Utc::now(),
        });
        info!("Data loaded: {} customers, {} orders", counts.0, counts.1);
        Ok(counts)
    }

    /// When the frames were last loaded, if ever.
    pub async fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.frames.read().await.as_ref().map(|f| f.loaded_at)
    }

    /// Run a computation against the frames, lazily loading them on
    /// first use. The read guard is held for the whole computation.
    async fn with_frames<T>(&self, f: impl FnOnce(&Frames) -> T) -> Result<T> {
        {
            let guard = self.frames.read().await;
            if let Some(frames) = guard.as_ref() {
                return Ok(f(frames));
            }
        }
        self.load_data().await?;
        let guard = self.frames.read().await;
        let frames = guard
            .as_ref()
            .ok_or_else(|| Error::Kpi("frames unavailable after load".to_string()))?;
        Ok(f(frames))
    }

    async fn repeat_customers(&self) -> Result<(Vec<JsonMap>, JsonMap)> {
        let rows = self
            .with_frames(|frames| {
                let index = frames.orders_by_mobile();
                let mut rows: Vec<RepeatCustomerRow> = frames
                    .customers
                    .iter()
                    .filter_map(|customer| {
                        let matched = index.get(customer.mobile_number.as_str())?;
                        if matched.len() <= 1 {
                            return None;
                        }
                        Some(RepeatCustomerRow {
                            customer_id: customer.customer_id.clone(),
                            customer_name: customer.customer_name.clone(),
                            order_count: matched.len() as i64,
                            total_spent: matched.iter().map(|o| o.total_amount).sum(),
                        })
                    })
                    .collect();

                rows.sort_by(|a, b| {
                    b.order_count
                        .cmp(&a.order_count)
                        .then(compare_f64_desc(a.total_spent, b.total_spent))
                });
                rows
            })
            .await?;

        info!("Repeat Customers KPI (memory): {} customers found", rows.len());
        Ok((rows_to_maps(&rows), repeat_metadata(&rows)))
    }

    async fn monthly_trends(&self) -> Result<(Vec<JsonMap>, JsonMap)> {
        let rows = self
            .with_frames(|frames| {
                struct MonthAcc<'a> {
                    order_count: i64,
                    revenue: f64,
                    mobiles: HashSet<&'a str>,
                }

                let mut months: BTreeMap<String, MonthAcc> = BTreeMap::new();
                for order in &frames.orders {
                    let key = order.order_date_time.format("%Y-%m").to_string();
                    let acc = months.entry(key).or_insert_with(|| MonthAcc {
                        order_count: 0,
                        revenue: 0.0,
                        mobiles: HashSet::new(),
                    });
                    acc.order_count += 1;
                    acc.revenue += order.total_amount;
                    acc.mobiles.insert(order.mobile_number.as_str());
                }

                // BTreeMap iteration is already ascending by month
                months
                    .into_iter()
                    .map(|(month_year, acc)| MonthlyTrendRow {
                        month_year,
                        total_orders: acc.order_count,
                        total_revenue: acc.revenue,
                        avg_order_value: acc.revenue / acc.order_count as f64,
                        unique_customers: acc.mobiles.len() as i64,
                    })
                    .collect::<Vec<_>>()
            })
            .await?;

        info!("Monthly Trends KPI (memory): {} months analyzed", rows.len());
        Ok((rows_to_maps(&rows), monthly_metadata(&rows)))
    }

    async fn regional_revenue(&self) -> Result<(Vec<JsonMap>, JsonMap)> {
        let rows = self
            .with_frames(|frames| {
                struct RegionAcc<'a> {
                    customer_ids: HashSet<&'a str>,
                    order_count: i64,
                    revenue: f64,
                }

                let index = frames.orders_by_mobile();
                let mut regions: BTreeMap<&str, RegionAcc> = BTreeMap::new();
                for customer in &frames.customers {
                    let acc = regions
                        .entry(customer.region.as_str())
                        .or_insert_with(|| RegionAcc {
                            customer_ids: HashSet::new(),
                            order_count: 0,
                            revenue: 0.0,
                        });
                    acc.customer_ids.insert(customer.customer_id.as_str());
                    if let Some(matched) = index.get(customer.mobile_number.as_str()) {
                        acc.order_count += matched.len() as i64;
                        acc.revenue += matched.iter().map(|o| o.total_amount).sum::<f64>();
                    }
                }

                let mut rows: Vec<RegionalRevenueRow> = regions
                    .into_iter()
                    .map(|(region, acc)| RegionalRevenueRow {
                        region: region.to_string(),
                        customer_count: acc.customer_ids.len() as i64,
                        total_orders: acc.order_count,
                        total_revenue: acc.revenue,
                        // Regions with no matching orders fill with 0,
                        // matching the SQL LEFT JOIN + COALESCE shape
                        avg_order_value: if acc.order_count > 0 {
                            acc.revenue / acc.order_count as f64
                        } else {
                            0.0
                        },
                    })
                    .collect();

                rows.sort_by(|a, b| compare_f64_desc(a.total_revenue, b.total_revenue));
                rows
            })
            .await?;

        info!("Regional Revenue KPI (memory): {} regions analyzed", rows.len());
        Ok((rows_to_maps(&rows), regional_metadata(&rows)))
    }

    async fn top_customers(&self, days: i64, limit: i64) -> Result<(Vec<JsonMap>, JsonMap)> {
        // Cutoff is evaluated at call time, not at frame-load time; two
        // calls at different instants can return different result sets.
        let cutoff: NaiveDateTime = Utc::now().naive_utc() - Duration::days(days);

        let rows = self
            .with_frames(|frames| {
                let mut index: HashMap<&str, Vec<&Order>> = HashMap::new();
                for order in frames.orders.iter().filter(|o| o.order_date_time >= cutoff) {
                    index.entry(order.mobile_number.as_str()).or_default().push(order);
                }

                let mut rows: Vec<TopCustomerRow> = frames
                    .customers
                    .iter()
                    .filter_map(|customer| {
                        let matched = index.get(customer.mobile_number.as_str())?;
                        let total_spend: f64 = matched.iter().map(|o| o.total_amount).sum();
                        let last_order = matched
                            .iter()
                            .map(|o| o.order_date_time)
                            .max()
                            .unwrap_or(cutoff);
                        Some(TopCustomerRow {
                            customer_id: customer.customer_id.clone(),
                            customer_name: customer.customer_name.clone(),
                            region: customer.region.clone(),
                            order_count: matched.len() as i64,
                            total_spend,
                            avg_order_value: total_spend / matched.len() as f64,
                            last_order_date: last_order.format(DATETIME_FORMAT).to_string(),
                        })
                    })
                    .collect();

                rows.sort_by(|a, b| compare_f64_desc(a.total_spend, b.total_spend));
                rows.truncate(limit.max(0) as usize);
                rows
            })
            .await?;

        info!(
            "Top Customers KPI (memory): {} customers in last {days} days",
            rows.len()
        );
        Ok((rows_to_maps(&rows), top_metadata(days, &rows)))
    }
}

/// Descending float ordering; NaN sorts last either way.
fn compare_f64_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

impl KpiEngine for MemoryKpiEngine {
    fn method(&self) -> KpiMethod {
        KpiMethod::Memory
    }

    async fn calculate(&self, kind: KpiKind, params: &KpiParams) -> KpiReport {
        let outcome = match kind {
            KpiKind::RepeatCustomers => self.repeat_customers().await,
            KpiKind::MonthlyTrends => self.monthly_trends().await,
            KpiKind::RegionalRevenue => self.regional_revenue().await,
            KpiKind::TopCustomers => self.top_customers(params.days, params.limit).await,
        };

        match outcome {
            Ok((data, metadata)) => KpiReport::success(kind, KpiMethod::Memory, data, metadata),
            Err(e) => {
                tracing::error!("Error calculating {} (memory): {e}", kind.name());
                KpiReport::failure(kind, KpiMethod::Memory, e.to_string())
            }
        }
    }
}
