//! API request/response models for maintenance tasks.

use super::GroupCountResponse;
use super::pagination::Pagination;
use crate::db::models::maintenance::{MaintenanceDBResponse, MaintenanceMetricsDBResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const MAINTENANCE_TYPES: &[&str] = &["VACUUM", "ANALYZE", "REINDEX", "CLUSTER", "OPTIMIZE", "UPDATE_STATISTICS"];

pub const MAINTENANCE_STATUSES: &[&str] = &["PENDING", "RUNNING", "COMPLETED", "FAILED", "SKIPPED"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceTask {
    pub id: i64,
    pub maintenance_type: String,
    pub db_engine: String,
    pub schema_name: String,
    pub object_name: String,
    pub object_type: Option<String>,
    pub status: String,
    pub priority: i32,
    pub last_maintenance_date: Option<DateTime<Utc>>,
    pub next_maintenance_date: Option<DateTime<Utc>>,
    pub space_reclaimed_mb: Option<f64>,
    pub performance_improvement_pct: Option<f64>,
    pub result_message: Option<String>,
}

impl From<MaintenanceDBResponse> for MaintenanceTask {
    fn from(db: MaintenanceDBResponse) -> Self {
        Self {
            id: db.id,
            maintenance_type: db.maintenance_type,
            db_engine: db.db_engine,
            schema_name: db.schema_name,
            object_name: db.object_name,
            object_type: db.object_type,
            status: db.status,
            priority: db.priority,
            last_maintenance_date: db.last_maintenance_date,
            next_maintenance_date: db.next_maintenance_date,
            space_reclaimed_mb: db.space_reclaimed_mb,
            performance_improvement_pct: db.performance_improvement_pct,
            result_message: db.result_message,
        }
    }
}

/// Query parameters for listing maintenance tasks
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListMaintenanceQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub maintenance_type: Option<String>,
    pub status: Option<String>,
    pub db_engine: Option<String>,
    /// Substring match on schema or object name
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceMetrics {
    pub total: i64,
    pub by_status: Vec<GroupCountResponse>,
    pub total_space_reclaimed_mb: f64,
    pub avg_improvement_pct: Option<f64>,
}

impl From<MaintenanceMetricsDBResponse> for MaintenanceMetrics {
    fn from(db: MaintenanceMetricsDBResponse) -> Self {
        Self {
            total: db.total,
            by_status: db.by_status.into_iter().map(Into::into).collect(),
            total_space_reclaimed_mb: db.total_space_reclaimed_mb,
            avg_improvement_pct: db.avg_improvement_pct,
        }
    }
}
