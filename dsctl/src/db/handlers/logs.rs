//! Database repository for sync engine logs.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::logs::{LogDBResponse, LogFacetsDBResponse},
};

const LOG_COLUMNS: &str = "id, ts, level, category, function, message, db_engine";

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub offset: i64,
    pub limit: i64,
    /// Compared case-insensitively
    pub level: Option<String>,
    pub category: Option<String>,
    pub function: Option<String>,
    pub db_engine: Option<String>,
    /// Escaped LIKE fragment matched against the message
    pub search: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl LogFilter {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push(" WHERE TRUE");
        if let Some(level) = &self.level {
            query.push(" AND UPPER(level) = UPPER(").push_bind(level.clone()).push(")");
        }
        if let Some(category) = &self.category {
            query.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(function) = &self.function {
            query.push(" AND function = ").push_bind(function.clone());
        }
        if let Some(db_engine) = &self.db_engine {
            query.push(" AND db_engine = ").push_bind(db_engine.clone());
        }
        if let Some(search) = &self.search {
            query.push(" AND message ILIKE ").push_bind(format!("%{search}%"));
        }
        if let Some(start) = self.start {
            query.push(" AND ts >= ").push_bind(start);
        }
        if let Some(end) = self.end {
            query.push(" AND ts <= ").push_bind(end);
        }
    }
}

pub struct Logs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Logs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Newest first.
    #[instrument(skip(self, filter), fields(offset = filter.offset, limit = filter.limit), err)]
    pub async fn list(&mut self, filter: &LogFilter) -> Result<Vec<LogDBResponse>> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {LOG_COLUMNS} FROM metadata.logs"));
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY ts DESC, id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows = query.build_query_as::<LogDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &LogFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM metadata.logs");
        filter.push_conditions(&mut query);
        let total = query.build_query_scalar::<i64>().fetch_one(&mut *self.db).await?;
        Ok(total)
    }

    #[instrument(skip(self), err)]
    pub async fn facets(&mut self) -> Result<LogFacetsDBResponse> {
        let levels = sqlx::query_scalar::<_, String>("SELECT DISTINCT level FROM metadata.logs ORDER BY level")
            .fetch_all(&mut *self.db)
            .await?;
        let categories = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM metadata.logs WHERE category IS NOT NULL ORDER BY category",
        )
        .fetch_all(&mut *self.db)
        .await?;
        let functions = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT function FROM metadata.logs WHERE function IS NOT NULL ORDER BY function",
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(LogFacetsDBResponse {
            levels,
            categories,
            functions,
        })
    }

    /// Delete entries older than `older_than_days`, or every entry when `None`.
    #[instrument(skip(self), err)]
    pub async fn delete_older_than(&mut self, older_than_days: Option<i32>) -> Result<u64> {
        let result = match older_than_days {
            Some(days) => {
                sqlx::query("DELETE FROM metadata.logs WHERE ts < NOW() - make_interval(days => $1)")
                    .bind(days)
                    .execute(&mut *self.db)
                    .await?
            }
            None => sqlx::query("DELETE FROM metadata.logs").execute(&mut *self.db).await?,
        };
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sqlx::PgPool;

    pub(crate) async fn insert_log(pool: &PgPool, level: &str, category: Option<&str>, message: &str, age_days: i32) {
        sqlx::query(
            "INSERT INTO metadata.logs (ts, level, category, function, message, db_engine)
             VALUES (NOW() - make_interval(days => $1), $2, $3, 'sync_table', $4, 'PostgreSQL')",
        )
        .bind(age_days)
        .bind(level)
        .bind(category)
        .bind(message)
        .execute(pool)
        .await
        .expect("Failed to insert log");
    }

    #[sqlx::test]
    async fn test_list_newest_first_with_filters(pool: PgPool) {
        insert_log(&pool, "INFO", Some("sync"), "old entry", 3).await;
        insert_log(&pool, "ERROR", Some("sync"), "connection refused", 1).await;
        insert_log(&pool, "info", Some("maintenance"), "vacuum done", 0).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Logs::new(&mut conn);

        let rows = repo.list(&LogFilter::new(0, 10)).await.unwrap();
        assert_eq!(
            rows.iter().map(|r| r.message.as_str()).collect::<Vec<_>>(),
            vec!["vacuum done", "connection refused", "old entry"]
        );

        let mut filter = LogFilter::new(0, 10);
        filter.level = Some("INFO".to_string());
        assert_eq!(repo.count(&filter).await.unwrap(), 2);

        let mut filter = LogFilter::new(0, 10);
        filter.start = Some(Utc::now() - chrono::Duration::days(2));
        filter.search = Some("refused".to_string());
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }

    #[sqlx::test]
    async fn test_facets_and_cleanup(pool: PgPool) {
        insert_log(&pool, "INFO", Some("sync"), "a", 40).await;
        insert_log(&pool, "WARNING", None, "b", 10).await;
        insert_log(&pool, "INFO", Some("auth"), "c", 0).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Logs::new(&mut conn);

        let facets = repo.facets().await.unwrap();
        assert_eq!(facets.levels, vec!["INFO", "WARNING"]);
        assert_eq!(facets.categories, vec!["auth", "sync"]);
        assert_eq!(facets.functions, vec!["sync_table"]);

        assert_eq!(repo.delete_older_than(Some(30)).await.unwrap(), 1);
        assert_eq!(repo.delete_older_than(None).await.unwrap(), 2);
        assert_eq!(repo.count(&LogFilter::new(0, 10)).await.unwrap(), 0);
    }
}
