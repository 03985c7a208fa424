//! Database models for `metadata.catalog`.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One replicated table as tracked by the sync engine.
#[derive(Debug, Clone, FromRow)]
pub struct CatalogDBResponse {
    pub schema_name: String,
    pub table_name: String,
    pub db_engine: String,
    pub connection_string: Option<String>,
    pub cluster_name: Option<String>,
    pub status: String,
    pub active: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_sync_column: Option<String>,
    pub pk_strategy: Option<String>,
    pub table_size: Option<i64>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Operator edits to a catalog row. Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct CatalogUpdateDBRequest {
    pub active: Option<bool>,
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CatalogMetricsDBResponse {
    pub total: i64,
    pub active: i64,
    pub by_status: Vec<super::GroupCount>,
    pub by_engine: Vec<super::GroupCount>,
}
