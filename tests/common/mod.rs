//! Shared fixtures for integration tests
#![allow(dead_code)]

use chrono::{Duration, NaiveDateTime, Utc};
use ordermetrics::config::PoolConfig;
use ordermetrics::db::{Customer, Order, Store};
use tempfile::TempDir;

pub async fn open_store(dir: &TempDir) -> Store {
    Store::open(&dir.path().join("test.db"), &PoolConfig::default())
        .await
        .expect("store should open")
}

pub fn customer(id: &str, name: &str, mobile: &str, region: &str) -> Customer {
    Customer {
        customer_id: id.to_string(),
        customer_name: name.to_string(),
        mobile_number: mobile.to_string(),
        region: region.to_string(),
    }
}

pub fn order(id: &str, mobile: &str, when: NaiveDateTime, amount: f64) -> Order {
    Order {
        order_id: id.to_string(),
        mobile_number: mobile.to_string(),
        order_date_time: when,
        sku_id: "SKU-1".to_string(),
        sku_count: 1,
        total_amount: amount,
    }
}

/// A timestamp `n` days in the past, truncated to whole seconds the way
/// the store represents datetimes.
pub fn days_ago(n: i64) -> NaiveDateTime {
    use chrono::Timelike;
    let dt = Utc::now().naive_utc() - Duration::days(n);
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Seed a small dataset exercising every KPI branch:
/// - two repeat customers (C001 with 3 orders, C002 with 2)
/// - one single-order customer (C004)
/// - one orderless customer in a shared region (C003)
/// - one orderless customer alone in its region (C005, region East)
pub async fn seed_reference_dataset(store: &Store) {
    let customers = vec![
        customer("C001", "Asha Verma", "+919876543210", "North"),
        customer("C002", "Bilal Khan", "+919812345678", "North"),
        customer("C003", "Chitra Rao", "9844001122", "South"),
        customer("C004", "Divya Nair", "9855667788", "South"),
        customer("C005", "Evan Dsouza", "9866778899", "East"),
    ];
    store.upsert_customers(&customers).await.expect("seed customers");

    let orders = vec![
        order("O001", "+919876543210", days_ago(5), 120.0),
        order("O002", "+919876543210", days_ago(15), 80.5),
        order("O003", "+919876543210", days_ago(70), 200.0),
        order("O004", "+919812345678", days_ago(3), 300.0),
        order("O005", "+919812345678", days_ago(45), 50.0),
        order("O006", "9855667788", days_ago(10), 75.25),
        // orphan order, mobile matches no customer
        order("O007", "9700000000", days_ago(2), 999.0),
    ];
    store.upsert_orders(&orders).await.expect("seed orders");
}

pub const EPSILON: f64 = 1e-6;

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}
