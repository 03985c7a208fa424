//! Database repository for maintenance tasks scheduled by the sync engine.

use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::{
        GroupCount,
        maintenance::{MaintenanceDBResponse, MaintenanceMetricsDBResponse},
    },
};

const MAINTENANCE_COLUMNS: &str = "id, maintenance_type, db_engine, schema_name, object_name, object_type, status, \
     priority, last_maintenance_date, next_maintenance_date, space_reclaimed_mb, performance_improvement_pct, \
     result_message";

#[derive(Debug, Clone, Default)]
pub struct MaintenanceFilter {
    pub offset: i64,
    pub limit: i64,
    pub maintenance_type: Option<String>,
    pub status: Option<String>,
    pub db_engine: Option<String>,
    pub search: Option<String>,
}

impl MaintenanceFilter {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push(" WHERE TRUE");
        if let Some(maintenance_type) = &self.maintenance_type {
            query.push(" AND maintenance_type = ").push_bind(maintenance_type.clone());
        }
        if let Some(status) = &self.status {
            query.push(" AND status = ").push_bind(status.clone());
        }
        if let Some(db_engine) = &self.db_engine {
            query.push(" AND db_engine = ").push_bind(db_engine.clone());
        }
        if let Some(search) = &self.search {
            let pattern = format!("%{search}%");
            query
                .push(" AND (schema_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR object_name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

pub struct Maintenance<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Maintenance<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Highest priority first, then soonest due.
    #[instrument(skip(self, filter), fields(offset = filter.offset, limit = filter.limit), err)]
    pub async fn list(&mut self, filter: &MaintenanceFilter) -> Result<Vec<MaintenanceDBResponse>> {
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {MAINTENANCE_COLUMNS} FROM metadata.maintenance_control"));
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY priority DESC, next_maintenance_date ASC NULLS LAST, id LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows = query.build_query_as::<MaintenanceDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &MaintenanceFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM metadata.maintenance_control");
        filter.push_conditions(&mut query);
        let total = query.build_query_scalar::<i64>().fetch_one(&mut *self.db).await?;
        Ok(total)
    }

    #[instrument(skip(self), err)]
    pub async fn metrics(&mut self) -> Result<MaintenanceMetricsDBResponse> {
        let (total, total_space_reclaimed_mb, avg_improvement_pct): (i64, f64, Option<f64>) = sqlx::query_as(
            "SELECT COUNT(*),
                    COALESCE(SUM(space_reclaimed_mb), 0)::DOUBLE PRECISION,
                    AVG(performance_improvement_pct)::DOUBLE PRECISION
             FROM metadata.maintenance_control",
        )
        .fetch_one(&mut *self.db)
        .await?;

        let by_status = sqlx::query_as::<_, GroupCount>(
            "SELECT status AS key, COUNT(*) AS count FROM metadata.maintenance_control
             GROUP BY status ORDER BY count DESC, key",
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(MaintenanceMetricsDBResponse {
            total,
            by_status,
            total_space_reclaimed_mb,
            avg_improvement_pct,
        })
    }
}
