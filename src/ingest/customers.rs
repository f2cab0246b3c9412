//! Customer CSV pipeline
//!
//! The CSV must carry a header row with at least
//! `customer_id, customer_name, mobile_number, region`. Every field is
//! read as a raw string so identifiers keep leading zeros.

use super::{IngestReport, LoadMode};
use crate::db::{Customer, Store};
use crate::validate;
use crate::{Error, Result};
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

const REQUIRED_COLUMNS: [&str; 4] = ["customer_id", "customer_name", "mobile_number", "region"];

/// Raw row as loaded from the file, before validation
#[derive(Debug, Clone)]
pub struct RawCustomer {
    pub customer_id: String,
    pub customer_name: String,
    pub mobile_number: String,
    pub region: String,
}

/// CSV → customers pipeline. Stateless over the store; the store handle
/// is injected at construction.
pub struct CustomerPipeline {
    store: Store,
}

impl CustomerPipeline {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Complete pipeline: load → validate → clean → load-to-store.
    /// Never returns Err; all failures are folded into the report.
    pub async fn process(&self, path: &Path, mode: LoadMode) -> IngestReport {
        let started = Instant::now();
        info!("Processing customer CSV {} (mode: {})", path.display(), mode);

        let rows = match self.load(path) {
            Ok(rows) => rows,
            Err(e) => {
                error!("Customer CSV load failed: {e}");
                return IngestReport::finish_failed(e.into_messages(), started);
            }
        };

        if let Err(e) = self.validate(&rows) {
            error!("Customer CSV validation failed");
            return IngestReport::finish_failed(e.into_messages(), started);
        }

        let cleaned = self.clean(rows);

        match self.load_to_store(&cleaned, mode).await {
            Ok(()) => {
                info!("Customer CSV processing complete: {} records", cleaned.len());
                IngestReport::finish_ok(cleaned.len(), started)
            }
            Err(e) => {
                error!("Customer load-to-store failed: {e}");
                IngestReport::finish_failed(e.into_messages(), started)
            }
        }
    }

    /// Stage 1: parse the file into raw rows. Missing file, unreadable
    /// content or a missing required column is a load error.
    pub fn load(&self, path: &Path) -> Result<Vec<RawCustomer>> {
        if !path.exists() {
            return Err(Error::Load(format!("File not found: {}", path.display())));
        }

        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| Error::Load(format!("Cannot open CSV: {e}")))?;

        let headers = reader
            .headers()
            .map_err(|e| Error::Load(format!("Cannot read CSV header: {e}")))?
            .clone();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| !headers.iter().any(|h| h == **col))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(Error::Load(format!(
                "Missing required columns: {}",
                missing.join(", ")
            )));
        }

        let column_index = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .unwrap_or(usize::MAX)
        };
        let idx_id = column_index("customer_id");
        let idx_name = column_index("customer_name");
        let idx_mobile = column_index("mobile_number");
        let idx_region = column_index("region");

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| Error::Load(format!("CSV parse error: {e}")))?;
            let field = |idx: usize| record.get(idx).unwrap_or("").to_string();
            rows.push(RawCustomer {
                customer_id: field(idx_id),
                customer_name: field(idx_name),
                mobile_number: field(idx_mobile),
                region: field(idx_region),
            });
        }

        info!("Loaded {} rows from CSV", rows.len());
        Ok(rows)
    }

    /// Stage 2: per-row field validation. Row numbers in messages are
    /// 1-indexed and offset by one for the header row.
    pub fn validate(&self, rows: &[RawCustomer]) -> Result<()> {
        if rows.is_empty() {
            return Err(Error::Validation(vec!["CSV file is empty".to_string()]));
        }

        let mut errors = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            let mut row_errors = Vec::new();

            let customer_id = row.customer_id.trim();
            if customer_id.is_empty() || customer_id.chars().count() > 25 {
                row_errors.push(format!(
                    "Invalid customer_id: {} (must be 1-25 characters)",
                    row.customer_id
                ));
            }
            if !validate::validate_string(&row.customer_name, 2, 255) {
                row_errors.push(format!("Invalid customer_name: {}", row.customer_name));
            }
            if !validate::screen_mobile_number(&row.mobile_number) {
                row_errors.push(format!(
                    "Invalid mobile_number: {} (must be 8-15 digits)",
                    row.mobile_number
                ));
            }
            if !validate::validate_string(&row.region, 2, 255) {
                row_errors.push(format!("Invalid region: {}", row.region));
            }

            if !row_errors.is_empty() {
                // +2: 1-indexed plus the header row
                errors.push(format!("Row {}: {}", idx + 2, row_errors.join(", ")));
            }
        }

        if errors.is_empty() {
            info!("CSV validation successful");
            Ok(())
        } else {
            warn!("CSV validation failed with {} errors", errors.len());
            Err(Error::Validation(errors))
        }
    }

    /// Stage 3: trim, normalize mobiles, drop rows that lose a required
    /// field, de-duplicate by customer_id keeping the first occurrence.
    pub fn clean(&self, rows: Vec<RawCustomer>) -> Vec<Customer> {
        info!("Cleaning customer data...");

        let mut seen_ids = HashSet::new();
        let mut duplicates = 0usize;
        let mut cleaned = Vec::with_capacity(rows.len());

        for row in rows {
            let Some(mobile_number) = validate::normalize_mobile_number(&row.mobile_number)
            else {
                warn!(
                    "Dropping customer {} with unnormalizable mobile number",
                    row.customer_id.trim()
                );
                continue;
            };

            let customer = Customer {
                customer_id: row.customer_id.trim().to_string(),
                customer_name: row.customer_name.trim().to_string(),
                mobile_number,
                region: row.region.trim().to_string(),
            };

            if !seen_ids.insert(customer.customer_id.clone()) {
                duplicates += 1;
                continue;
            }
            cleaned.push(customer);
        }

        if duplicates > 0 {
            warn!("Removed {duplicates} duplicate customer records");
        }
        info!("Cleaning complete. {} valid records", cleaned.len());
        cleaned
    }

    /// Stage 4: replace clears the table first (atomically with the
    /// insert); append upserts in place.
    async fn load_to_store(&self, customers: &[Customer], mode: LoadMode) -> Result<()> {
        match mode {
            LoadMode::Replace => self.store.replace_customers(customers).await,
            LoadMode::Append => self.store.upsert_customers(customers).await,
        }
    }
}
