//! API request/response models for sync engine logs.

use super::pagination::Pagination;
use crate::db::models::logs::{LogDBResponse, LogFacetsDBResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LogEntry {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub level: String,
    pub category: Option<String>,
    pub function: Option<String>,
    pub message: String,
    pub db_engine: Option<String>,
}

impl From<LogDBResponse> for LogEntry {
    fn from(db: LogDBResponse) -> Self {
        Self {
            id: db.id,
            ts: db.ts,
            level: db.level,
            category: db.category,
            function: db.function,
            message: db.message,
            db_engine: db.db_engine,
        }
    }
}

/// Query parameters for listing logs
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListLogsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub level: Option<String>,
    pub category: Option<String>,
    pub function: Option<String>,
    pub db_engine: Option<String>,
    /// Substring match on the message
    pub search: Option<String>,
    /// RFC 3339 timestamp, inclusive
    pub start_date: Option<String>,
    /// RFC 3339 timestamp, inclusive
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LogFilters {
    pub levels: Vec<String>,
    pub categories: Vec<String>,
    pub functions: Vec<String>,
}

impl From<LogFacetsDBResponse> for LogFilters {
    fn from(db: LogFacetsDBResponse) -> Self {
        Self {
            levels: db.levels,
            categories: db.categories,
            functions: db.functions,
        }
    }
}

/// Query parameters for log cleanup
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DeleteLogsQuery {
    /// Keep entries newer than this many days. Omit to delete everything.
    #[param(minimum = 0, maximum = 36500)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub older_than_days: Option<i32>,
}
