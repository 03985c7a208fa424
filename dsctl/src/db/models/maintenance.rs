//! Database models for `metadata.maintenance_control`.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::GroupCount;

#[derive(Debug, Clone, FromRow)]
pub struct MaintenanceDBResponse {
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

#[derive(Debug, Clone)]
pub struct MaintenanceMetricsDBResponse {
    pub total: i64,
    pub by_status: Vec<GroupCount>,
    pub total_space_reclaimed_mb: f64,
    /// `None` when no completed task reported an improvement
    pub avg_improvement_pct: Option<f64>,
}
