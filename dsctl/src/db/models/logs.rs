//! Database models for `metadata.logs`.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct LogDBResponse {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub level: String,
    pub category: Option<String>,
    pub function: Option<String>,
    pub message: String,
    pub db_engine: Option<String>,
}

/// Distinct values present in the log table, for populating filter dropdowns.
#[derive(Debug, Clone, Default)]
pub struct LogFacetsDBResponse {
    pub levels: Vec<String>,
    pub categories: Vec<String>,
    pub functions: Vec<String>,
}
