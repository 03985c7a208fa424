//! API request/response models for sync engine configuration.

use super::pagination::Pagination;
use crate::db::models::config::ConfigDBResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConfigDBResponse> for ConfigEntry {
    fn from(db: ConfigDBResponse) -> Self {
        Self {
            key: db.key,
            value: db.value,
            description: db.description,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfigCreate {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

/// Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ConfigUpdate {
    pub value: Option<String>,
    pub description: Option<String>,
}

/// Query parameters for listing configuration entries
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListConfigQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Substring match on key, value or description
    pub search: Option<String>,
}
