//! Order XML pipeline
//!
//! Expects a root element containing repeated `<order>` elements whose
//! children are text-only: `order_id, mobile_number, order_date_time,
//! sku_id, sku_count, total_amount`.

use super::{IngestReport, LoadMode};
use crate::db::{Order, Store};
use crate::validate;
use crate::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

const REQUIRED_FIELDS: [&str; 6] = [
    "order_id",
    "mobile_number",
    "order_date_time",
    "sku_id",
    "sku_count",
    "total_amount",
];

/// Raw order as loaded from the file; a missing child element is None.
#[derive(Debug, Clone, Default)]
pub struct RawOrder {
    pub order_id: Option<String>,
    pub mobile_number: Option<String>,
    pub order_date_time: Option<String>,
    pub sku_id: Option<String>,
    pub sku_count: Option<String>,
    pub total_amount: Option<String>,
}

impl RawOrder {
    fn set(&mut self, field: &str, value: String) {
        match field {
            "order_id" => self.order_id = Some(value),
            "mobile_number" => self.mobile_number = Some(value),
            "order_date_time" => self.order_date_time = Some(value),
            "sku_id" => self.sku_id = Some(value),
            "sku_count" => self.sku_count = Some(value),
            "total_amount" => self.total_amount = Some(value),
            _ => {}
        }
    }

    fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "order_id" => &self.order_id,
            "mobile_number" => &self.mobile_number,
            "order_date_time" => &self.order_date_time,
            "sku_id" => &self.sku_id,
            "sku_count" => &self.sku_count,
            "total_amount" => &self.total_amount,
            _ => &None,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }
}

/// XML → orders pipeline
pub struct OrderPipeline {
    store: Store,
}

impl OrderPipeline {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Complete pipeline: load → validate → clean → load-to-store.
    /// Never returns Err; all failures are folded into the report.
    pub async fn process(&self, path: &Path, mode: LoadMode) -> IngestReport {
        let started = Instant::now();
        info!("Processing order XML {} (mode: {})", path.display(), mode);

        let orders = match self.load(path) {
            Ok(orders) => orders,
            Err(e) => {
                error!("Order XML load failed: {e}");
                return IngestReport::finish_failed(e.into_messages(), started);
            }
        };

        if let Err(e) = self.validate(&orders) {
            error!("Order XML validation failed");
            return IngestReport::finish_failed(e.into_messages(), started);
        }

        let cleaned = self.clean(orders);

        match self.load_to_store(&cleaned, mode).await {
            Ok(()) => {
                info!("Order XML processing complete: {} records", cleaned.len());
                IngestReport::finish_ok(cleaned.len(), started)
            }
            Err(e) => {
                error!("Order load-to-store failed: {e}");
                IngestReport::finish_failed(e.into_messages(), started)
            }
        }
    }

    /// Stage 1: event-parse the XML into raw orders.
    pub fn load(&self, path: &Path) -> Result<Vec<RawOrder>> {
        if !path.exists() {
            return Err(Error::Load(format!("File not found: {}", path.display())));
        }

        let mut reader = Reader::from_file(path)
            .map_err(|e| Error::Load(format!("Cannot open XML: {e}")))?;
        reader.config_mut().trim_text(true);

        let mut orders = Vec::new();
        let mut current: Option<RawOrder> = None;
        let mut current_field: Option<String> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if name == "order" {
                        current = Some(RawOrder::default());
                    } else if current.is_some() {
                        current_field = Some(name);
                    }
                }
                Ok(Event::Text(t)) => {
                    if let (Some(order), Some(field)) = (current.as_mut(), current_field.as_ref())
                    {
                        let text = t
                            .unescape()
                            .map_err(|e| Error::Load(format!("XML parsing error: {e}")))?;
                        order.set(field, text.into_owned());
                    }
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if name == "order" {
                        if let Some(order) = current.take() {
                            orders.push(order);
                        }
                    } else if current_field.as_deref() == Some(name.as_str()) {
                        current_field = None;
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(Error::Load(format!("XML parsing error: {e}"))),
            }
            buf.clear();
        }

        info!("Loaded {} orders from XML", orders.len());
        Ok(orders)
    }

    /// Stage 2: per-order field validation, 1-indexed messages. An order
    /// with missing fields reports only the missing-field error.
    pub fn validate(&self, orders: &[RawOrder]) -> Result<()> {
        if orders.is_empty() {
            return Err(Error::Validation(vec![
                "No orders found in XML file".to_string(),
            ]));
        }

        let mut errors = Vec::new();
        for (idx, order) in orders.iter().enumerate() {
            let missing: Vec<&str> = REQUIRED_FIELDS
                .iter()
                .filter(|f| order.get(f).is_none())
                .copied()
                .collect();
            if !missing.is_empty() {
                errors.push(format!(
                    "Order {}: Missing fields: {}",
                    idx + 1,
                    missing.join(", ")
                ));
                continue;
            }

            let mut row_errors = Vec::new();
            let field = |name: &str| order.get(name).unwrap_or("");

            let order_id = field("order_id").trim();
            if order_id.is_empty() || order_id.chars().count() > 25 {
                row_errors.push(format!(
                    "Invalid order_id: {order_id} (must be 1-25 characters)"
                ));
            }
            if !validate::screen_mobile_number(field("mobile_number")) {
                row_errors.push(format!(
                    "Invalid mobile_number: {} (must be 8-15 digits)",
                    field("mobile_number")
                ));
            }
            if validate::validate_datetime(field("order_date_time"), None).is_none() {
                row_errors.push(format!(
                    "Invalid order_date_time: {}",
                    field("order_date_time")
                ));
            }
            if !validate::validate_string(field("sku_id"), 1, 255) {
                row_errors.push(format!("Invalid sku_id: {}", field("sku_id")));
            }
            if !validate::validate_positive_number(field("sku_count")) {
                row_errors.push(format!("Invalid sku_count: {}", field("sku_count")));
            }
            if !validate::validate_non_negative_number(field("total_amount")) {
                row_errors.push(format!("Invalid total_amount: {}", field("total_amount")));
            }

            if !row_errors.is_empty() {
                errors.push(format!("Order {}: {}", idx + 1, row_errors.join(", ")));
            }
        }

        if errors.is_empty() {
            info!("XML validation successful");
            Ok(())
        } else {
            warn!("XML validation failed with {} errors", errors.len());
            Err(Error::Validation(errors))
        }
    }

    /// Stage 3: coerce types, drop orders that fail any conversion,
    /// de-duplicate by order_id keeping the first occurrence.
    pub fn clean(&self, orders: Vec<RawOrder>) -> Vec<Order> {
        info!("Cleaning order data...");

        let mut cleaned = Vec::with_capacity(orders.len());
        for raw in orders {
            let order_id = raw
                .get("order_id")
                .map(|v| v.trim().to_string())
                .unwrap_or_default();
            let mobile = raw
                .get("mobile_number")
                .and_then(validate::normalize_mobile_number);
            let date_time = raw
                .get("order_date_time")
                .and_then(|v| validate::validate_datetime(v, None));
            let sku_id = raw.get("sku_id").map(|v| v.trim().to_string());
            // sku_count must be a whole number; "3.5" fails the coercion
            let sku_count = raw.get("sku_count").and_then(|v| v.trim().parse::<i64>().ok());
            let total_amount = raw
                .get("total_amount")
                .and_then(|v| v.trim().parse::<f64>().ok());

            match (mobile, date_time, sku_id, sku_count, total_amount) {
                (Some(mobile_number), Some(order_date_time), Some(sku_id), Some(sku_count), Some(total_amount))
                    if !order_id.is_empty() =>
                {
                    cleaned.push(Order {
                        order_id,
                        mobile_number,
                        order_date_time,
                        sku_id,
                        sku_count,
                        total_amount,
                    });
                }
                _ => {
                    warn!("Skipping order {order_id} due to invalid data");
                }
            }
        }

        let initial_count = cleaned.len();
        let mut seen_ids = HashSet::new();
        cleaned.retain(|order| seen_ids.insert(order.order_id.clone()));
        let duplicates = initial_count - cleaned.len();
        if duplicates > 0 {
            warn!("Removed {duplicates} duplicate order records");
        }

        info!("Cleaning complete. {} valid records", cleaned.len());
        cleaned
    }

    /// Stage 4: replace clears the table first (atomically with the
    /// insert); append upserts in place.
    async fn load_to_store(&self, orders: &[Order], mode: LoadMode) -> Result<()> {
        match mode {
            LoadMode::Replace => self.store.replace_orders(orders).await,
            LoadMode::Append => self.store.upsert_orders(orders).await,
        }
    }
}
