//! Database models for `metadata.catalog_locks`.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A lock row, with liveness evaluated against the database clock.
#[derive(Debug, Clone, FromRow)]
pub struct LockDBResponse {
    pub lock_name: String,
    pub acquired_by: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub session_id: Option<String>,
    /// `expires_at > NOW()` at query time
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct LockStatsDBResponse {
    pub total: i64,
    pub active: i64,
    pub expired: i64,
}
