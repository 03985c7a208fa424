//! API request and response data models.
//!
//! These are kept separate from [`crate::db::models`] so the wire format can evolve
//! independently of the tables. All of them derive `utoipa::ToSchema` for the generated docs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::GroupCount;

pub mod auth;
pub mod catalog;
pub mod config;
pub mod governance;
pub mod health;
pub mod locks;
pub mod logs;
pub mod maintenance;
pub mod pagination;
pub mod uploads;
pub mod users;

/// One bucket of a grouped count, e.g. catalog rows per status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupCountResponse {
    pub key: String,
    pub count: i64,
}

impl From<GroupCount> for GroupCountResponse {
    fn from(db: GroupCount) -> Self {
        Self {
            key: db.key,
            count: db.count,
        }
    }
}

/// Acknowledgement for bulk operations.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AffectedRowsResponse {
    pub success: bool,
    pub message: String,
    /// Rows changed or removed
    pub affected: u64,
}

impl AffectedRowsResponse {
    pub fn new(message: impl Into<String>, affected: u64) -> Self {
        Self {
            success: true,
            message: message.into(),
            affected,
        }
    }
}
