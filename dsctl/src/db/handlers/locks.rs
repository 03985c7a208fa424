//! Database repository for sync engine locks.
//!
//! This service never takes a lock. It lists what the sync engine holds and lets an admin
//! break a lock or sweep expired ones.

use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::locks::{LockDBResponse, LockStatsDBResponse},
};

const LOCK_COLUMNS: &str = "lock_name, acquired_by, acquired_at, expires_at, session_id, (expires_at > NOW()) AS is_active";

#[derive(Debug, Clone, Default)]
pub struct LockFilter {
    pub offset: i64,
    pub limit: i64,
    /// `Some(true)` for live locks, `Some(false)` for expired ones
    pub active: Option<bool>,
    pub search: Option<String>,
}

impl LockFilter {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push(" WHERE TRUE");
        match self.active {
            Some(true) => {
                query.push(" AND expires_at > NOW()");
            }
            Some(false) => {
                query.push(" AND expires_at <= NOW()");
            }
            None => {}
        }
        if let Some(search) = &self.search {
            let pattern = format!("%{search}%");
            query
                .push(" AND (lock_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR acquired_by ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

pub struct Locks<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Locks<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), fields(offset = filter.offset, limit = filter.limit), err)]
    pub async fn list(&mut self, filter: &LockFilter) -> Result<Vec<LockDBResponse>> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {LOCK_COLUMNS} FROM metadata.catalog_locks"));
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY acquired_at DESC, lock_name LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let locks = query.build_query_as::<LockDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(locks)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &LockFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM metadata.catalog_locks");
        filter.push_conditions(&mut query);
        let total = query.build_query_scalar::<i64>().fetch_one(&mut *self.db).await?;
        Ok(total)
    }

    #[instrument(skip(self), err)]
    pub async fn stats(&mut self) -> Result<LockStatsDBResponse> {
        let stats = sqlx::query_as::<_, LockStatsDBResponse>(
            "SELECT COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE expires_at > NOW()) AS active,
                    COUNT(*) FILTER (WHERE expires_at <= NOW()) AS expired
             FROM metadata.catalog_locks",
        )
        .fetch_one(&mut *self.db)
        .await?;
        Ok(stats)
    }

    /// Break one lock. Returns whether it existed.
    #[instrument(skip(self), err)]
    pub async fn delete(&mut self, lock_name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM metadata.catalog_locks WHERE lock_name = $1")
            .bind(lock_name)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every expired lock. Returns how many were removed.
    #[instrument(skip(self), err)]
    pub async fn clean_expired(&mut self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM metadata.catalog_locks WHERE expires_at <= NOW()")
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sqlx::PgPool;

    /// Insert a lock expiring `expires_in_secs` from now (negative for already expired).
    pub(crate) async fn insert_lock(pool: &PgPool, name: &str, expires_in_secs: i64) {
        sqlx::query(
            "INSERT INTO metadata.catalog_locks (lock_name, acquired_by, acquired_at, expires_at, session_id)
             VALUES ($1, 'sync-worker-1', NOW() - INTERVAL '1 minute', NOW() + make_interval(secs => $2), 'session-1')",
        )
        .bind(name)
        .bind(expires_in_secs as f64)
        .execute(pool)
        .await
        .expect("Failed to insert lock");
    }

    #[sqlx::test]
    async fn test_status_is_computed(pool: PgPool) {
        insert_lock(&pool, "catalog_sync", 600).await;
        insert_lock(&pool, "stale_lock", -600).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Locks::new(&mut conn);

        let all = repo.list(&LockFilter::new(0, 10)).await.unwrap();
        let live: Vec<_> = all.iter().filter(|l| l.is_active).map(|l| l.lock_name.as_str()).collect();
        assert_eq!(live, vec!["catalog_sync"]);

        let mut expired = LockFilter::new(0, 10);
        expired.active = Some(false);
        assert_eq!(repo.count(&expired).await.unwrap(), 1);

        assert_eq!(
            repo.stats().await.unwrap(),
            LockStatsDBResponse {
                total: 2,
                active: 1,
                expired: 1
            }
        );
    }

    #[sqlx::test]
    async fn test_delete_and_clean(pool: PgPool) {
        insert_lock(&pool, "a", 600).await;
        insert_lock(&pool, "b", -1).await;
        insert_lock(&pool, "c", -100).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Locks::new(&mut conn);

        assert!(repo.delete("a").await.unwrap());
        assert!(!repo.delete("a").await.unwrap());
        assert_eq!(repo.clean_expired().await.unwrap(), 2);
        assert_eq!(repo.stats().await.unwrap().total, 0);
    }
}
