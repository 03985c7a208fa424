//! Database repository for the replication catalog.

use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

use crate::{
    api::validation::SortDirection,
    db::{
        errors::{DbError, Result},
        models::{
            GroupCount,
            catalog::{CatalogDBResponse, CatalogMetricsDBResponse, CatalogUpdateDBRequest},
        },
    },
    types::CatalogKey,
};

const CATALOG_COLUMNS: &str = "schema_name, table_name, db_engine, connection_string, cluster_name, status, active, \
     last_sync_time, last_sync_column, pk_strategy, table_size, notes, updated_at";

/// Status the sync engine gives tables it has decided not to replicate.
pub const SKIP_STATUS: &str = "SKIP";

/// Filter for listing catalog rows. Sort column must come from an allow-list.
#[derive(Debug, Clone)]
pub struct CatalogFilter {
    pub offset: i64,
    pub limit: i64,
    pub engine: Option<String>,
    pub status: Option<String>,
    pub active: Option<bool>,
    pub schema_name: Option<String>,
    /// Escaped LIKE fragment matched against schema, table and cluster names
    pub search: Option<String>,
    pub sort_by: &'static str,
    pub sort_order: SortDirection,
}

impl CatalogFilter {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            engine: None,
            status: None,
            active: None,
            schema_name: None,
            search: None,
            sort_by: "schema_name",
            sort_order: SortDirection::Asc,
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push(" WHERE TRUE");
        if let Some(engine) = &self.engine {
            query.push(" AND db_engine = ").push_bind(engine.clone());
        }
        if let Some(status) = &self.status {
            query.push(" AND status = ").push_bind(status.clone());
        }
        if let Some(active) = self.active {
            query.push(" AND active = ").push_bind(active);
        }
        if let Some(schema_name) = &self.schema_name {
            query.push(" AND schema_name = ").push_bind(schema_name.clone());
        }
        if let Some(search) = &self.search {
            let pattern = format!("%{search}%");
            query
                .push(" AND (schema_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR table_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR cluster_name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

pub struct Catalog<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Catalog<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), fields(offset = filter.offset, limit = filter.limit), err)]
    pub async fn list(&mut self, filter: &CatalogFilter) -> Result<Vec<CatalogDBResponse>> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {CATALOG_COLUMNS} FROM metadata.catalog"));
        filter.push_conditions(&mut query);
        query
            .push(format!(
                " ORDER BY {} {} NULLS LAST, schema_name, table_name, db_engine",
                filter.sort_by,
                filter.sort_order.as_sql()
            ))
            .push(" LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows = query.build_query_as::<CatalogDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &CatalogFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM metadata.catalog");
        filter.push_conditions(&mut query);
        let total = query.build_query_scalar::<i64>().fetch_one(&mut *self.db).await?;
        Ok(total)
    }

    #[instrument(skip(self), err)]
    pub async fn get(&mut self, key: &CatalogKey) -> Result<Option<CatalogDBResponse>> {
        let row = sqlx::query_as::<_, CatalogDBResponse>(&format!(
            "SELECT {CATALOG_COLUMNS} FROM metadata.catalog
             WHERE schema_name = $1 AND table_name = $2 AND db_engine = $3"
        ))
        .bind(&key.schema_name)
        .bind(&key.table_name)
        .bind(&key.db_engine)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(row)
    }

    /// Apply operator edits to one row. Fails with `NotFound` when the key matches nothing.
    #[instrument(skip(self, request), err)]
    pub async fn update(&mut self, key: &CatalogKey, request: &CatalogUpdateDBRequest) -> Result<CatalogDBResponse> {
        let row = sqlx::query_as::<_, CatalogDBResponse>(&format!(
            "UPDATE metadata.catalog SET
                active = COALESCE($4, active),
                status = COALESCE($5, status),
                updated_at = NOW()
             WHERE schema_name = $1 AND table_name = $2 AND db_engine = $3
             RETURNING {CATALOG_COLUMNS}"
        ))
        .bind(&key.schema_name)
        .bind(&key.table_name)
        .bind(&key.db_engine)
        .bind(request.active)
        .bind(&request.status)
        .fetch_optional(&mut *self.db)
        .await?;

        row.ok_or(DbError::NotFound)
    }

    /// Deactivate every active row the sync engine marked as skipped.
    #[instrument(skip(self), err)]
    pub async fn deactivate_skipped(&mut self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE metadata.catalog SET active = FALSE, updated_at = NOW()
             WHERE status = $1 AND active = TRUE",
        )
        .bind(SKIP_STATUS)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    pub async fn metrics(&mut self) -> Result<CatalogMetricsDBResponse> {
        let (total, active): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(*) FILTER (WHERE active) FROM metadata.catalog")
                .fetch_one(&mut *self.db)
                .await?;

        let by_status = sqlx::query_as::<_, GroupCount>(
            "SELECT status AS key, COUNT(*) AS count FROM metadata.catalog GROUP BY status ORDER BY count DESC, key",
        )
        .fetch_all(&mut *self.db)
        .await?;

        let by_engine = sqlx::query_as::<_, GroupCount>(
            "SELECT db_engine AS key, COUNT(*) AS count FROM metadata.catalog GROUP BY db_engine ORDER BY count DESC, key",
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(CatalogMetricsDBResponse {
            total,
            active,
            by_status,
            by_engine,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sqlx::PgPool;

    pub(crate) async fn insert_catalog_row(pool: &PgPool, schema: &str, table: &str, engine: &str, status: &str, size: i64) {
        sqlx::query(
            "INSERT INTO metadata.catalog (schema_name, table_name, db_engine, cluster_name, status, active, table_size)
             VALUES ($1, $2, $3, 'cluster-a', $4, TRUE, $5)",
        )
        .bind(schema)
        .bind(table)
        .bind(engine)
        .bind(status)
        .bind(size)
        .execute(pool)
        .await
        .expect("Failed to insert catalog row");
    }

    fn key(schema: &str, table: &str, engine: &str) -> CatalogKey {
        CatalogKey {
            schema_name: schema.to_string(),
            table_name: table.to_string(),
            db_engine: engine.to_string(),
        }
    }

    #[sqlx::test]
    async fn test_list_filters_and_sorting(pool: PgPool) {
        insert_catalog_row(&pool, "sales", "orders", "PostgreSQL", "LISTENING_CHANGES", 300).await;
        insert_catalog_row(&pool, "sales", "customers", "PostgreSQL", "FULL_LOAD", 100).await;
        insert_catalog_row(&pool, "hr", "employees", "MariaDB", "SKIP", 200).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Catalog::new(&mut conn);

        let mut filter = CatalogFilter::new(0, 10);
        filter.engine = Some("PostgreSQL".to_string());
        filter.sort_by = "table_size";
        filter.sort_order = SortDirection::Desc;
        let rows = repo.list(&filter).await.unwrap();
        assert_eq!(
            rows.iter().map(|r| r.table_name.as_str()).collect::<Vec<_>>(),
            vec!["orders", "customers"]
        );
        assert_eq!(repo.count(&filter).await.unwrap(), 2);

        let mut filter = CatalogFilter::new(0, 10);
        filter.search = Some("employ".to_string());
        let rows = repo.list(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].schema_name, "hr");
    }

    #[sqlx::test]
    async fn test_search_wildcards_are_literal(pool: PgPool) {
        insert_catalog_row(&pool, "app", "user_events", "PostgreSQL", "FULL_LOAD", 1).await;
        insert_catalog_row(&pool, "app", "userxevents", "PostgreSQL", "FULL_LOAD", 1).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Catalog::new(&mut conn);
        let mut filter = CatalogFilter::new(0, 10);
        filter.search = crate::api::validation::sanitize_search(Some("user_e"));

        let rows = repo.list(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].table_name, "user_events");
    }

    #[sqlx::test]
    async fn test_update_and_not_found(pool: PgPool) {
        insert_catalog_row(&pool, "sales", "orders", "PostgreSQL", "FULL_LOAD", 1).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Catalog::new(&mut conn);

        let updated = repo
            .update(
                &key("sales", "orders", "PostgreSQL"),
                &CatalogUpdateDBRequest {
                    active: Some(false),
                    status: None,
                },
            )
            .await
            .unwrap();
        assert!(!updated.active);
        assert_eq!(updated.status, "FULL_LOAD");

        let missing = repo
            .update(&key("sales", "orders", "Oracle"), &CatalogUpdateDBRequest::default())
            .await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    async fn test_deactivate_skipped_and_metrics(pool: PgPool) {
        insert_catalog_row(&pool, "a", "t1", "PostgreSQL", "SKIP", 1).await;
        insert_catalog_row(&pool, "a", "t2", "MariaDB", "SKIP", 1).await;
        insert_catalog_row(&pool, "a", "t3", "MariaDB", "FULL_LOAD", 1).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Catalog::new(&mut conn);
        assert_eq!(repo.deactivate_skipped().await.unwrap(), 2);
        assert_eq!(repo.deactivate_skipped().await.unwrap(), 0);

        let metrics = repo.metrics().await.unwrap();
        assert_eq!(metrics.total, 3);
        assert_eq!(metrics.active, 1);
        assert_eq!(
            metrics.by_status[0],
            GroupCount {
                key: "SKIP".to_string(),
                count: 2
            }
        );
        assert_eq!(metrics.by_engine[0].key, "MariaDB");
    }
}
