//! # ordermetrics
//!
//! Batch analytics over customer and order records:
//! - CSV (customers) and XML (orders) ingestion pipelines with
//!   validate/clean/load semantics and replace/append load modes
//! - SQLite store behind a single pooled adapter
//! - Four business KPIs computed by two interchangeable engines:
//!   one SQL aggregate query per KPI, and one in-memory aggregation
//!   over cached table frames

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod kpi;
pub mod validate;

pub use error::{Error, Result};
