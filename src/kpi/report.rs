//! Uniform KPI result envelope
//!
//! Both engines wrap every computation in the same envelope shape:
//! `{kpi_name, description, method, calculated_at, success, data,
//! metadata}` on success, `{.., success: false, error}` on failure.

use super::KpiKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Row-mapping and metadata-mapping representation
pub type JsonMap = serde_json::Map<String, Value>;

/// Which execution model produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiMethod {
    Sql,
    Memory,
}

impl fmt::Display for KpiMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpiMethod::Sql => write!(f, "sql"),
            KpiMethod::Memory => write!(f, "memory"),
        }
    }
}

/// Tagged outcome: data plus metadata, or an error message
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum KpiOutcome {
    Success { data: Vec<JsonMap>, metadata: JsonMap },
    Failure { error: String },
}

/// One KPI computation result
#[derive(Debug, Clone, Serialize)]
pub struct KpiReport {
    pub kpi_name: String,
    pub description: String,
    pub method: KpiMethod,
    pub calculated_at: DateTime<Utc>,
    pub success: bool,
    #[serde(flatten)]
    pub outcome: KpiOutcome,
}

impl KpiReport {
    pub fn success(kind: KpiKind, method: KpiMethod, data: Vec<JsonMap>, metadata: JsonMap) -> Self {
        Self {
            kpi_name: kind.name().to_string(),
            description: kind.description().to_string(),
            method,
            calculated_at: Utc::now(),
            success: true,
            outcome: KpiOutcome::Success { data, metadata },
        }
    }

    pub fn failure(kind: KpiKind, method: KpiMethod, error: String) -> Self {
        Self::failure_named(
            kind.name().to_string(),
            kind.description().to_string(),
            method,
            error,
        )
    }

    /// Failure envelope for a KPI that could not be resolved to a
    /// registered kind (unknown surface key).
    pub fn failure_named(
        kpi_name: String,
        description: String,
        method: KpiMethod,
        error: String,
    ) -> Self {
        Self {
            kpi_name,
            description,
            method,
            calculated_at: Utc::now(),
            success: false,
            outcome: KpiOutcome::Failure { error },
        }
    }

    pub fn data(&self) -> Option<&[JsonMap]> {
        match &self.outcome {
            KpiOutcome::Success { data, .. } => Some(data),
            KpiOutcome::Failure { .. } => None,
        }
    }

    pub fn metadata(&self) -> Option<&JsonMap> {
        match &self.outcome {
            KpiOutcome::Success { metadata, .. } => Some(metadata),
            KpiOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            KpiOutcome::Failure { error } => Some(error),
            KpiOutcome::Success { .. } => None,
        }
    }
}

/// Serialize typed rows into the envelope's row-mapping form, keeping
/// row order.
pub fn rows_to_maps<T: Serialize>(rows: &[T]) -> Vec<JsonMap> {
    rows.iter()
        .filter_map(|row| match serde_json::to_value(row) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
        .collect()
}

/// Build a metadata map from literal entries, keeping insertion order.
pub fn metadata<const N: usize>(entries: [(&str, Value); N]) -> JsonMap {
    let mut map = JsonMap::new();
    for (key, value) in entries {
        map.insert(key.to_string(), value);
    }
    map
}
