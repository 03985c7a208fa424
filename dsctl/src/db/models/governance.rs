//! Database models for the per-engine data governance catalogs.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::GroupCount;

/// Source engine of a governance catalog. Each engine has its own table with identical columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GovernanceEngine {
    MariaDb,
    Mssql,
    Oracle,
}

impl GovernanceEngine {
    pub const ALL: [GovernanceEngine; 3] = [GovernanceEngine::MariaDb, GovernanceEngine::Mssql, GovernanceEngine::Oracle];

    /// Fully qualified table name. Only ever interpolated from this match.
    pub fn table(&self) -> &'static str {
        match self {
            GovernanceEngine::MariaDb => "metadata.data_governance_catalog_mariadb",
            GovernanceEngine::Mssql => "metadata.data_governance_catalog_mssql",
            GovernanceEngine::Oracle => "metadata.data_governance_catalog_oracle",
        }
    }

    /// Path segment used in `/api/governance-catalog-{slug}`.
    pub fn slug(&self) -> &'static str {
        match self {
            GovernanceEngine::MariaDb => "mariadb",
            GovernanceEngine::Mssql => "mssql",
            GovernanceEngine::Oracle => "oracle",
        }
    }
}

impl fmt::Display for GovernanceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct GovernanceDBResponse {
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

#[derive(Debug, Clone)]
pub struct GovernanceMetricsDBResponse {
    pub total: i64,
    pub total_size_mb: f64,
    pub total_rows: i64,
    pub by_health: Vec<GroupCount>,
}
