//! Ingestion pipeline semantics: replace idempotency, append upsert,
//! batch-abort validation and load failures.

mod common;

use common::open_store;
use ordermetrics::ingest::{CustomerPipeline, LoadMode, OrderPipeline};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write fixture");
    path
}

const VALID_CSV: &str = "\
customer_id,customer_name,mobile_number,region
C001,Asha Verma,+91 98765 43210,North
C002,Bilal Khan,98123 45678,North
007,Omkar Joshi,9844001122,South
";

fn valid_xml() -> String {
    "<orders>
        <order>
            <order_id>O001</order_id>
            <mobile_number>+91 98765 43210</mobile_number>
            <order_date_time>2024-03-15 10:30:00</order_date_time>
            <sku_id>SKU-7</sku_id>
            <sku_count>2</sku_count>
            <total_amount>120.50</total_amount>
        </order>
        <order>
            <order_id>O002</order_id>
            <mobile_number>9812345678</mobile_number>
            <order_date_time>15/03/2024</order_date_time>
            <sku_id>SKU-9</sku_id>
            <sku_count>1</sku_count>
            <total_amount>80</total_amount>
        </order>
    </orders>"
        .to_string()
}

#[tokio::test]
async fn csv_replace_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let path = write_file(&dir, "customers.csv", VALID_CSV);
    let pipeline = CustomerPipeline::new(store.clone());

    let first = pipeline.process(&path, LoadMode::Replace).await;
    assert!(first.success, "errors: {:?}", first.errors);
    assert_eq!(first.records_loaded, 3);
    assert_eq!(store.count_customers().await.unwrap(), 3);

    let second = pipeline.process(&path, LoadMode::Replace).await;
    assert!(second.success);
    assert_eq!(second.records_loaded, 3);
    assert_eq!(store.count_customers().await.unwrap(), 3);
    assert!(second.duration_seconds >= 0.0);
}

#[tokio::test]
async fn csv_append_upserts_instead_of_duplicating() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let pipeline = CustomerPipeline::new(store.clone());

    let path = write_file(&dir, "customers.csv", VALID_CSV);
    assert!(pipeline.process(&path, LoadMode::Append).await.success);
    assert_eq!(store.count_customers().await.unwrap(), 3);

    // Same ids again with a changed mutable field: row count stays, the
    // region is overwritten
    let updated = VALID_CSV.replace("C001,Asha Verma,+91 98765 43210,North",
                                    "C001,Asha Verma,+91 98765 43210,South");
    let path2 = write_file(&dir, "customers2.csv", &updated);
    assert!(pipeline.process(&path2, LoadMode::Append).await.success);
    assert_eq!(store.count_customers().await.unwrap(), 3);

    let customers = store.fetch_customers().await.unwrap();
    let c001 = customers.iter().find(|c| c.customer_id == "C001").unwrap();
    assert_eq!(c001.region, "South");
}

#[tokio::test]
async fn csv_preserves_leading_zeros_and_normalizes_mobiles() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let path = write_file(&dir, "customers.csv", VALID_CSV);

    let report = CustomerPipeline::new(store.clone())
        .process(&path, LoadMode::Replace)
        .await;
    assert!(report.success);

    let customers = store.fetch_customers().await.unwrap();
    assert!(customers.iter().any(|c| c.customer_id == "007"));
    let c001 = customers.iter().find(|c| c.customer_id == "C001").unwrap();
    assert_eq!(c001.mobile_number, "+919876543210");
}

#[tokio::test]
async fn csv_validation_aborts_whole_batch_and_reports_every_row() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let bad = "\
customer_id,customer_name,mobile_number,region
C001,Asha Verma,+91 98765 43210,North
C002,B,9812345678,North
C003,Chitra Rao,12345,South
";
    let path = write_file(&dir, "customers.csv", bad);

    let report = CustomerPipeline::new(store.clone())
        .process(&path, LoadMode::Replace)
        .await;
    assert!(!report.success);
    assert_eq!(report.records_loaded, 0);
    // Both bad rows reported; header-offset row numbering
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors[0].starts_with("Row 3:"));
    assert!(report.errors[1].starts_with("Row 4:"));
    // No partial load
    assert_eq!(store.count_customers().await.unwrap(), 0);
}

#[tokio::test]
async fn csv_missing_column_and_missing_file_are_load_errors() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let pipeline = CustomerPipeline::new(store.clone());

    let path = write_file(&dir, "no_region.csv", "customer_id,customer_name,mobile_number\nC1,Asha,9876543210\n");
    let report = pipeline.process(&path, LoadMode::Replace).await;
    assert!(!report.success);
    assert!(report.errors[0].contains("Missing required columns"));
    assert!(report.errors[0].contains("region"));

    let report = pipeline
        .process(&dir.path().join("absent.csv"), LoadMode::Replace)
        .await;
    assert!(!report.success);
    assert_eq!(report.records_loaded, 0);
    assert!(report.errors[0].contains("File not found"));
}

#[tokio::test]
async fn csv_duplicate_ids_keep_first_occurrence() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let dup = "\
customer_id,customer_name,mobile_number,region
C001,First Entry,9876543210,North
C001,Second Entry,9876543210,South
";
    let path = write_file(&dir, "dup.csv", dup);

    let report = CustomerPipeline::new(store.clone())
        .process(&path, LoadMode::Replace)
        .await;
    assert!(report.success);
    assert_eq!(report.records_loaded, 1);

    let customers = store.fetch_customers().await.unwrap();
    assert_eq!(customers[0].customer_name, "First Entry");
}

#[tokio::test]
async fn xml_pipeline_loads_and_parses_date_branches() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let path = write_file(&dir, "orders.xml", &valid_xml());

    let report = OrderPipeline::new(store.clone())
        .process(&path, LoadMode::Replace)
        .await;
    assert!(report.success, "errors: {:?}", report.errors);
    assert_eq!(report.records_loaded, 2);

    let orders = store.fetch_orders().await.unwrap();
    let o001 = orders.iter().find(|o| o.order_id == "O001").unwrap();
    assert_eq!(o001.mobile_number, "+919876543210");
    assert_eq!(o001.order_date_time.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-03-15 10:30:00");
    // DD/MM/YYYY branch parses to midnight
    let o002 = orders.iter().find(|o| o.order_id == "O002").unwrap();
    assert_eq!(o002.order_date_time.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-03-15 00:00:00");
}

#[tokio::test]
async fn xml_replace_is_idempotent_and_append_upserts() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let path = write_file(&dir, "orders.xml", &valid_xml());
    let pipeline = OrderPipeline::new(store.clone());

    assert!(pipeline.process(&path, LoadMode::Replace).await.success);
    assert!(pipeline.process(&path, LoadMode::Replace).await.success);
    assert_eq!(store.count_orders().await.unwrap(), 2);

    // Append with a changed amount updates in place
    let updated = valid_xml().replace("<total_amount>120.50</total_amount>",
                                      "<total_amount>999.99</total_amount>");
    let path2 = write_file(&dir, "orders2.xml", &updated);
    assert!(pipeline.process(&path2, LoadMode::Append).await.success);
    assert_eq!(store.count_orders().await.unwrap(), 2);

    let orders = store.fetch_orders().await.unwrap();
    let o001 = orders.iter().find(|o| o.order_id == "O001").unwrap();
    assert!((o001.total_amount - 999.99).abs() < 1e-9);
}

#[tokio::test]
async fn xml_validation_aggregates_all_bad_orders() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let bad = "<orders>
        <order>
            <order_id>O001</order_id>
            <mobile_number>123</mobile_number>
            <order_date_time>not-a-date</order_date_time>
            <sku_id>SKU-1</sku_id>
            <sku_count>2</sku_count>
            <total_amount>10</total_amount>
        </order>
        <order>
            <order_id>O002</order_id>
            <mobile_number>9812345678</mobile_number>
            <order_date_time>2024-01-01</order_date_time>
            <sku_id>SKU-2</sku_id>
            <sku_count>-4</sku_count>
            <total_amount>-1</total_amount>
        </order>
    </orders>";
    let path = write_file(&dir, "orders.xml", bad);

    let report = OrderPipeline::new(store.clone())
        .process(&path, LoadMode::Replace)
        .await;
    assert!(!report.success);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors[0].starts_with("Order 1:"));
    assert!(report.errors[0].contains("mobile_number"));
    assert!(report.errors[0].contains("order_date_time"));
    assert!(report.errors[1].starts_with("Order 2:"));
    assert!(report.errors[1].contains("sku_count"));
    assert_eq!(store.count_orders().await.unwrap(), 0);
}

#[tokio::test]
async fn xml_missing_field_reported_and_fractional_sku_count_dropped_in_clean() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let missing = "<orders><order><order_id>O001</order_id></order></orders>";
    let path = write_file(&dir, "missing.xml", missing);
    let report = OrderPipeline::new(store.clone())
        .process(&path, LoadMode::Replace)
        .await;
    assert!(!report.success);
    assert!(report.errors[0].contains("Missing fields"));
    assert!(report.errors[0].contains("mobile_number"));

    // A fractional sku_count screens as a positive number but fails the
    // integer coercion during cleaning; the order is dropped, not fatal
    let fractional = valid_xml().replace("<sku_count>2</sku_count>", "<sku_count>2.5</sku_count>");
    let path2 = write_file(&dir, "fractional.xml", &fractional);
    let report = OrderPipeline::new(store.clone())
        .process(&path2, LoadMode::Replace)
        .await;
    assert!(report.success);
    assert_eq!(report.records_loaded, 1);
}

#[tokio::test]
async fn xml_unparseable_content_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let path = write_file(&dir, "broken.xml", "<orders><order><order_id>O1</order");

    let report = OrderPipeline::new(store.clone())
        .process(&path, LoadMode::Replace)
        .await;
    assert!(!report.success);
    assert_eq!(report.records_loaded, 0);
}
