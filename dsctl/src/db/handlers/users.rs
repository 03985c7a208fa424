//! Database repository for users.

use crate::types::UserId;
use crate::{
    api::models::users::Role,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

/// Filter for listing users
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub offset: i64,
    pub limit: i64,
    /// Escaped LIKE fragment matched against username and email
    pub search: Option<String>,
    pub role: Option<Role>,
}

impl UserFilter {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search;
        self
    }

    pub fn with_role(mut self, role: Option<Role>) -> Self {
        self.role = role;
        self
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        query.push(" WHERE TRUE");
        if let Some(search) = &self.search {
            let pattern = format!("%{search}%");
            query
                .push(" AND (username ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(role) = self.role {
            query.push(" AND role = ").push_bind(role.as_str());
        }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl TryFrom<User> for UserDBResponse {
    type Error = DbError;

    fn try_from(user: User) -> Result<Self> {
        let role = user
            .role
            .parse::<Role>()
            .map_err(|e| DbError::Other(anyhow::anyhow!("user {} has unreadable role: {e}", user.id)))?;
        Ok(Self {
            id: user.id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role,
            active: user.active,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login: user.last_login,
        })
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, active, created_at, updated_at, last_login";

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Look a user up by username or email.
    ///
    /// Usernames match exactly, emails case-insensitively. An exact username match wins over an
    /// email match, so a username that happens to equal someone else's email still resolves to
    /// its owner.
    #[instrument(skip(self), err)]
    pub async fn get_by_identifier(&mut self, identifier: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM metadata.users
             WHERE username = $1 OR lower(email) = lower($1)
             ORDER BY (username = $1) DESC
             LIMIT 1"
        ))
        .bind(identifier)
        .fetch_optional(&mut *self.db)
        .await?;

        user.map(UserDBResponse::try_from).transpose()
    }

    /// Stamp a successful authentication.
    #[instrument(skip(self), err)]
    pub async fn record_login(&mut self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE metadata.users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username, role = %request.role), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        // No existence pre-check: the unique constraints decide, and a duplicate surfaces as
        // DbError::UniqueViolation.
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO metadata.users (username, email, password_hash, role, active)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(request.role.as_str())
        .bind(request.active)
        .fetch_one(&mut *self.db)
        .await?;

        user.try_into()
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM metadata.users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        user.map(UserDBResponse::try_from).transpose()
    }

    #[instrument(skip(self, filter), fields(offset = filter.offset, limit = filter.limit), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM metadata.users"));
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let users = query.build_query_as::<User>().fetch_all(&mut *self.db).await?;
        users.into_iter().map(UserDBResponse::try_from).collect()
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM metadata.users");
        filter.push_conditions(&mut query);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM metadata.users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Atomic update with conditional field updates
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE metadata.users SET
                email = COALESCE($2, email),
                role = COALESCE($3, role),
                active = COALESCE($4, active),
                password_hash = COALESCE($5, password_hash),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(request.email.as_deref())
        .bind(request.role.map(|r| r.as_str()))
        .bind(request.active)
        .bind(request.password_hash.as_deref())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        user.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ensure_users_table;
    use sqlx::PgPool;

    fn create_request(username: &str, role: Role) -> UserCreateDBRequest {
        UserCreateDBRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "$2b$04$placeholderplaceholderplaceholderplaceholderplacehol".to_string(),
            role,
            active: true,
        }
    }

    #[sqlx::test]
    async fn test_create_and_get_user(pool: PgPool) {
        ensure_users_table(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let created = repo.create(&create_request("alice", Role::Viewer)).await.unwrap();
        assert_eq!(created.username, "alice");
        assert_eq!(created.role, Role::Viewer);
        assert!(created.active);
        assert!(created.last_login.is_none());

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.email, "alice@example.com");
    }

    #[sqlx::test]
    async fn test_duplicate_username_is_unique_violation(pool: PgPool) {
        ensure_users_table(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        repo.create(&create_request("bob", Role::User)).await.unwrap();

        let mut duplicate = create_request("bob", Role::User);
        duplicate.email = "other@example.com".to_string();
        let err = repo.create(&duplicate).await.unwrap_err();
        assert!(err.is_unique_violation());

        let mut duplicate_email = create_request("bobby", Role::User);
        duplicate_email.email = "bob@example.com".to_string();
        assert!(repo.create(&duplicate_email).await.unwrap_err().is_unique_violation());
    }

    #[sqlx::test]
    async fn test_get_by_identifier_matches_username_or_email(pool: PgPool) {
        ensure_users_table(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let created = repo.create(&create_request("carol", Role::User)).await.unwrap();

        let by_name = repo.get_by_identifier("carol").await.unwrap().unwrap();
        let by_email = repo.get_by_identifier("carol@example.com").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert_eq!(by_email.id, created.id);
        let by_mixed_case_email = repo.get_by_identifier("Carol@Example.com").await.unwrap().unwrap();
        assert_eq!(by_mixed_case_email.id, created.id);
        assert!(repo.get_by_identifier("CAROL").await.unwrap().is_none());
        assert!(repo.get_by_identifier("nobody").await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn test_list_with_search_role_and_count(pool: PgPool) {
        ensure_users_table(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        for i in 0..5 {
            repo.create(&create_request(&format!("ops{i}"), Role::User)).await.unwrap();
        }
        repo.create(&create_request("auditor", Role::Viewer)).await.unwrap();

        let ops = UserFilter::new(0, 3).with_search(Some("ops".to_string()));
        assert_eq!(repo.list(&ops).await.unwrap().len(), 3);
        assert_eq!(repo.count(&ops).await.unwrap(), 5);

        let viewers = UserFilter::new(0, 10).with_role(Some(Role::Viewer));
        let listed = repo.list(&viewers).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].username, "auditor");
    }

    #[sqlx::test]
    async fn test_update_and_delete(pool: PgPool) {
        ensure_users_table(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let created = repo.create(&create_request("dave", Role::User)).await.unwrap();

        let updated = repo
            .update(
                created.id,
                &UserUpdateDBRequest {
                    role: Some(Role::Admin),
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert!(!updated.active);
        assert_eq!(updated.email, created.email);
        assert_eq!(updated.password_hash, created.password_hash);

        assert!(matches!(
            repo.update(999_999, &UserUpdateDBRequest::default()).await,
            Err(DbError::NotFound)
        ));

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }

    #[sqlx::test]
    async fn test_record_login(pool: PgPool) {
        ensure_users_table(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let created = repo.create(&create_request("erin", Role::User)).await.unwrap();

        repo.record_login(created.id).await.unwrap();
        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert!(fetched.last_login.is_some());
    }
}
