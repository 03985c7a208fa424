//! API request/response models for the replication catalog.

use super::pagination::Pagination;
use super::GroupCountResponse;
use crate::db::models::catalog::{CatalogDBResponse, CatalogMetricsDBResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Engines the sync engine replicates from.
pub const DB_ENGINES: &[&str] = &["PostgreSQL", "MariaDB", "MSSQL", "Oracle", "MongoDB"];

/// Lifecycle states a catalog row can be in.
pub const CATALOG_STATUSES: &[&str] = &[
    "PENDING",
    "FULL_LOAD",
    "LISTENING_CHANGES",
    "NO_DATA",
    "SKIP",
    "RESET",
    "ERROR",
];

pub const CATALOG_SORT_COLUMNS: &[&str] = &[
    "schema_name",
    "table_name",
    "db_engine",
    "status",
    "last_sync_time",
    "table_size",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CatalogEntry {
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

impl From<CatalogDBResponse> for CatalogEntry {
    fn from(db: CatalogDBResponse) -> Self {
        Self {
            schema_name: db.schema_name,
            table_name: db.table_name,
            db_engine: db.db_engine,
            connection_string: db.connection_string,
            cluster_name: db.cluster_name,
            status: db.status,
            active: db.active,
            last_sync_time: db.last_sync_time,
            last_sync_column: db.last_sync_column,
            pk_strategy: db.pk_strategy,
            table_size: db.table_size,
            notes: db.notes,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing the catalog
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListCatalogQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only rows from this engine
    pub engine: Option<String>,
    pub status: Option<String>,
    /// `true` or `false`
    pub active: Option<String>,
    pub schema_name: Option<String>,
    /// Substring match on schema, table or cluster name
    pub search: Option<String>,
    /// One of schema_name, table_name, db_engine, status, last_sync_time, table_size
    pub sort_by: Option<String>,
    /// `asc` or `desc`
    pub sort_order: Option<String>,
}

/// Operator edit of one catalog row, addressed by its natural key.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogUpdate {
    pub schema_name: String,
    pub table_name: String,
    pub db_engine: String,
    pub active: Option<bool>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogMetrics {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub by_status: Vec<GroupCountResponse>,
    pub by_engine: Vec<GroupCountResponse>,
}

impl From<CatalogMetricsDBResponse> for CatalogMetrics {
    fn from(db: CatalogMetricsDBResponse) -> Self {
        Self {
            total: db.total,
            active: db.active,
            inactive: db.total - db.active,
            by_status: db.by_status.into_iter().map(Into::into).collect(),
            by_engine: db.by_engine.into_iter().map(Into::into).collect(),
        }
    }
}
