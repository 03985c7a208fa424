//! Database repository for the governance catalogs.
//!
//! One repository serves all three engines; the engine picks the table.

use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::{
        GroupCount,
        governance::{GovernanceDBResponse, GovernanceEngine, GovernanceMetricsDBResponse},
    },
};

const GOVERNANCE_COLUMNS: &str = "id, server_name, database_name, schema_name, table_name, row_count, table_size_mb, \
     index_count, health_status, access_frequency, last_analyzed, recommendation";

#[derive(Debug, Clone, Default)]
pub struct GovernanceFilter {
    pub offset: i64,
    pub limit: i64,
    pub server_name: Option<String>,
    pub database_name: Option<String>,
    pub health_status: Option<String>,
    pub access_frequency: Option<String>,
    pub search: Option<String>,
}

impl GovernanceFilter {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push(" WHERE TRUE");
        if let Some(server_name) = &self.server_name {
            query.push(" AND server_name = ").push_bind(server_name.clone());
        }
        if let Some(database_name) = &self.database_name {
            query.push(" AND database_name = ").push_bind(database_name.clone());
        }
        if let Some(health_status) = &self.health_status {
            query.push(" AND health_status = ").push_bind(health_status.clone());
        }
        if let Some(access_frequency) = &self.access_frequency {
            query.push(" AND access_frequency = ").push_bind(access_frequency.clone());
        }
        if let Some(search) = &self.search {
            let pattern = format!("%{search}%");
            query
                .push(" AND (schema_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR table_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR database_name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

pub struct Governance<'c> {
    db: &'c mut PgConnection,
    engine: GovernanceEngine,
}

impl<'c> Governance<'c> {
    pub fn new(db: &'c mut PgConnection, engine: GovernanceEngine) -> Self {
        Self { db, engine }
    }

    #[instrument(skip(self, filter), fields(engine = %self.engine, offset = filter.offset, limit = filter.limit), err)]
    pub async fn list(&mut self, filter: &GovernanceFilter) -> Result<Vec<GovernanceDBResponse>> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {GOVERNANCE_COLUMNS} FROM {}", self.engine.table()));
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY server_name, database_name, schema_name, table_name LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows = query.build_query_as::<GovernanceDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    #[instrument(skip(self, filter), fields(engine = %self.engine), err)]
    pub async fn count(&mut self, filter: &GovernanceFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", self.engine.table()));
        filter.push_conditions(&mut query);
        let total = query.build_query_scalar::<i64>().fetch_one(&mut *self.db).await?;
        Ok(total)
    }

    #[instrument(skip(self), fields(engine = %self.engine), err)]
    pub async fn metrics(&mut self) -> Result<GovernanceMetricsDBResponse> {
        let table = self.engine.table();
        let (total, total_size_mb, total_rows): (i64, f64, i64) = sqlx::query_as(&format!(
            "SELECT COUNT(*), COALESCE(SUM(table_size_mb), 0)::DOUBLE PRECISION, COALESCE(SUM(row_count), 0)::BIGINT
             FROM {table}"
        ))
        .fetch_one(&mut *self.db)
        .await?;

        let by_health = sqlx::query_as::<_, GroupCount>(&format!(
            "SELECT COALESCE(health_status, 'UNKNOWN') AS key, COUNT(*) AS count
             FROM {table} GROUP BY 1 ORDER BY count DESC, key"
        ))
        .fetch_all(&mut *self.db)
        .await?;

        Ok(GovernanceMetricsDBResponse {
            total,
            total_size_mb,
            total_rows,
            by_health,
        })
    }
}
