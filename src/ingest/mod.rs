//! Ingestion pipelines
//!
//! Two structurally identical pipelines: CSV for customers and XML for
//! orders. Each runs load → validate → clean → load-to-store, short-
//! circuiting on the first failed stage. Validation never fails fast on
//! the first bad row; the whole batch is checked and every violating row
//! is reported, then the batch is rejected as a unit.

pub mod customers;
pub mod orders;

pub use customers::CustomerPipeline;
pub use orders::OrderPipeline;

use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Load-to-store mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Delete all existing rows of the target table, then upsert
    Replace,
    /// Upsert without clearing; rows sharing a primary key are updated,
    /// not duplicated
    Append,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Replace => write!(f, "replace"),
            LoadMode::Append => write!(f, "append"),
        }
    }
}

impl std::str::FromStr for LoadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(LoadMode::Replace),
            "append" => Ok(LoadMode::Append),
            other => Err(format!("unknown load mode '{other}' (expected replace|append)")),
        }
    }
}

/// Structured outcome of one pipeline run. Duration is wall-clock time
/// for the whole pipeline, recorded regardless of outcome.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub success: bool,
    pub records_loaded: usize,
    pub errors: Vec<String>,
    pub duration_seconds: f64,
}

impl IngestReport {
    pub(crate) fn finish_ok(records_loaded: usize, started: Instant) -> Self {
        Self {
            success: true,
            records_loaded,
            errors: Vec::new(),
            duration_seconds: started.elapsed().as_secs_f64(),
        }
    }

    pub(crate) fn finish_failed(errors: Vec<String>, started: Instant) -> Self {
        Self {
            success: false,
            records_loaded: 0,
            errors,
            duration_seconds: started.elapsed().as_secs_f64(),
        }
    }
}
