//! API request/response models for the data governance catalogs.

use super::GroupCountResponse;
use super::pagination::Pagination;
use crate::db::models::governance::{GovernanceDBResponse, GovernanceMetricsDBResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const HEALTH_STATUSES: &[&str] = &["HEALTHY", "WARNING", "CRITICAL"];

pub const ACCESS_FREQUENCIES: &[&str] = &["HIGH", "MEDIUM", "LOW", "RARE", "ARCHIVE"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GovernanceEntry {
    pub id: i64,
    pub server_name: String,
    pub database_name: String,
    pub schema_name: String,
    pub table_name: String,
    pub row_count: Option<i64>,
    pub table_size_mb: Option<f64>,
    pub index_count: Option<i32>,
    pub health_status: Option<String>,
    pub access_frequency: Option<String>,
    pub last_analyzed: Option<DateTime<Utc>>,
    pub recommendation: Option<String>,
}

impl From<GovernanceDBResponse> for GovernanceEntry {
    fn from(db: GovernanceDBResponse) -> Self {
        Self {
            id: db.id,
            server_name: db.server_name,
            database_name: db.database_name,
            schema_name: db.schema_name,
            table_name: db.table_name,
            row_count: db.row_count,
            table_size_mb: db.table_size_mb,
            index_count: db.index_count,
            health_status: db.health_status,
            access_frequency: db.access_frequency,
            last_analyzed: db.last_analyzed,
            recommendation: db.recommendation,
        }
    }
}

/// Query parameters for listing a governance catalog
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListGovernanceQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub server_name: Option<String>,
    pub database_name: Option<String>,
    /// HEALTHY, WARNING or CRITICAL
    pub health_status: Option<String>,
    pub access_frequency: Option<String>,
    /// Substring match on schema, table or database name
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GovernanceMetrics {
    pub total_tables: i64,
    pub total_size_mb: f64,
    pub total_rows: i64,
    pub by_health_status: Vec<GroupCountResponse>,
}

impl From<GovernanceMetricsDBResponse> for GovernanceMetrics {
    fn from(db: GovernanceMetricsDBResponse) -> Self {
        Self {
            total_tables: db.total,
            total_size_mb: db.total_size_mb,
            total_rows: db.total_rows,
            by_health_status: db.by_health.into_iter().map(Into::into).collect(),
        }
    }
}
