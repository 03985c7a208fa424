//! Database repository for sync engine configuration entries.

use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::config::{ConfigCreateDBRequest, ConfigDBResponse, ConfigUpdateDBRequest},
    },
    types::ConfigKey,
};

const CONFIG_COLUMNS: &str = "key, value, description, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct ConfigFilter {
    pub offset: i64,
    pub limit: i64,
    /// Escaped LIKE fragment matched against key, value and description
    pub search: Option<String>,
}

impl ConfigFilter {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            search: None,
        }
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search;
        self
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(search) = &self.search {
            let pattern = format!("%{search}%");
            query
                .push(" WHERE (key ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR value ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

pub struct ConfigEntries<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ConfigEntries<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for ConfigEntries<'c> {
    type CreateRequest = ConfigCreateDBRequest;
    type UpdateRequest = ConfigUpdateDBRequest;
    type Response = ConfigDBResponse;
    type Id = ConfigKey;
    type Filter = ConfigFilter;

    /// Insert a new entry. A duplicate key surfaces as `DbError::UniqueViolation`.
    #[instrument(skip(self, request), fields(key = %request.key), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let entry = sqlx::query_as::<_, ConfigDBResponse>(&format!(
            "INSERT INTO metadata.config (key, value, description)
             VALUES ($1, $2, $3)
             RETURNING {CONFIG_COLUMNS}"
        ))
        .bind(&request.key)
        .bind(&request.value)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(entry)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, key: Self::Id) -> Result<Option<Self::Response>> {
        let entry = sqlx::query_as::<_, ConfigDBResponse>(&format!("SELECT {CONFIG_COLUMNS} FROM metadata.config WHERE key = $1"))
            .bind(key)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(entry)
    }

    #[instrument(skip(self, filter), fields(offset = filter.offset, limit = filter.limit), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {CONFIG_COLUMNS} FROM metadata.config"));
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY key LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let entries = query.build_query_as::<ConfigDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(entries)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM metadata.config");
        filter.push_conditions(&mut query);
        let total = query.build_query_scalar::<i64>().fetch_one(&mut *self.db).await?;
        Ok(total)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, key: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM metadata.config WHERE key = $1")
            .bind(key)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, key: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let entry = sqlx::query_as::<_, ConfigDBResponse>(&format!(
            "UPDATE metadata.config SET
                value = COALESCE($2, value),
                description = COALESCE($3, description),
                updated_at = NOW()
             WHERE key = $1
             RETURNING {CONFIG_COLUMNS}"
        ))
        .bind(key)
        .bind(&request.value)
        .bind(&request.description)
        .fetch_optional(&mut *self.db)
        .await?;

        entry.ok_or(DbError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn create(key: &str, value: &str) -> ConfigCreateDBRequest {
        ConfigCreateDBRequest {
            key: key.to_string(),
            value: value.to_string(),
            description: None,
        }
    }

    #[sqlx::test]
    async fn test_crud(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ConfigEntries::new(&mut conn);

        repo.create(&create("batch_size", "1000")).await.unwrap();
        repo.create(&create("chunk_size", "50")).await.unwrap();

        let listed = repo.list(&ConfigFilter::new(0, 10)).await.unwrap();
        assert_eq!(listed.iter().map(|e| e.key.as_str()).collect::<Vec<_>>(), vec!["batch_size", "chunk_size"]);

        let updated = repo
            .update(
                "batch_size".to_string(),
                &ConfigUpdateDBRequest {
                    value: Some("2000".to_string()),
                    description: Some("Rows per batch".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.value, "2000");
        assert!(updated.updated_at >= updated.created_at);

        assert!(repo.delete("chunk_size".to_string()).await.unwrap());
        assert!(repo.get_by_id("chunk_size".to_string()).await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn test_duplicate_key_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ConfigEntries::new(&mut conn);

        repo.create(&create("batch_size", "1000")).await.unwrap();
        let err = repo.create(&create("batch_size", "5")).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[sqlx::test]
    async fn test_update_missing(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ConfigEntries::new(&mut conn);

        let err = repo
            .update("nope".to_string(), &ConfigUpdateDBRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[sqlx::test]
    async fn test_search(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ConfigEntries::new(&mut conn);
        repo.create(&create("batch_size", "1000")).await.unwrap();
        repo.create(&create("log_level", "info")).await.unwrap();

        let filter = ConfigFilter::new(0, 10).with_search(Some("LOG".to_string()));
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }
}
