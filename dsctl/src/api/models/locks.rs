//! API request/response models for sync engine locks.

use super::pagination::Pagination;
use crate::db::models::locks::{LockDBResponse, LockStatsDBResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    Active,
    Expired,
}

impl LockStatus {
    pub const NAMES: &'static [&'static str] = &["active", "expired"];

    pub fn from_active(active: bool) -> Self {
        if active { LockStatus::Active } else { LockStatus::Expired }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LockResponse {
    pub lock_name: String,
    pub acquired_by: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub session_id: Option<String>,
    pub status: LockStatus,
}

impl From<LockDBResponse> for LockResponse {
    fn from(db: LockDBResponse) -> Self {
        Self {
            lock_name: db.lock_name,
            acquired_by: db.acquired_by,
            acquired_at: db.acquired_at,
            expires_at: db.expires_at,
            session_id: db.session_id,
            status: LockStatus::from_active(db.is_active),
        }
    }
}

/// Query parameters for listing locks
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListLocksQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// `active` or `expired`
    pub status: Option<String>,
    /// Substring match on lock name or holder
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LockStats {
    pub total: i64,
    pub active: i64,
    pub expired: i64,
}

impl From<LockStatsDBResponse> for LockStats {
    fn from(db: LockStatsDBResponse) -> Self {
        Self {
            total: db.total,
            active: db.active,
            expired: db.expired,
        }
    }
}
