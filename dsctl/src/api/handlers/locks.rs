use axum::extract::State;
use tracing::info;

use crate::api::extract::{Json, Path, Query};
use crate::{
    AppState,
    api::{
        models::{
            AffectedRowsResponse,
            auth::MessageResponse,
            locks::{ListLocksQuery, LockResponse, LockStats, LockStatus},
            pagination::PaginatedResponse,
        },
        validation::{sanitize_search, validate_optional_enum},
    },
    auth::roles::{Admin, Reader, RequiresRole},
    db::handlers::locks::{LockFilter, Locks},
    errors::{Error, Result},
    types::LockName,
};

/// GET /api/locks - List locks with their computed status
#[utoipa::path(
    get,
    path = "/api/locks",
    tag = "locks",
    summary = "List locks",
    params(ListLocksQuery),
    responses(
        (status = 200, description = "Page of locks", body = PaginatedResponse<LockResponse>),
        (status = 400, description = "Invalid status filter"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_locks(
    State(state): State<AppState>,
    Query(query): Query<ListLocksQuery>,
    _: RequiresRole<Reader>,
) -> Result<Json<PaginatedResponse<LockResponse>>> {
    let mut filter = LockFilter::new(query.pagination.offset(), query.pagination.limit());
    filter.active = validate_optional_enum(query.status.as_deref(), LockStatus::NAMES, "status")?.map(|s| s == "active");
    filter.search = sanitize_search(query.search.as_deref());

    let mut conn = state.db.acquire().await?;
    let mut repo = Locks::new(&mut conn);
    let locks = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        locks.into_iter().map(LockResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

/// GET /api/locks/stats - Lock counts
#[utoipa::path(
    get,
    path = "/api/locks/stats",
    tag = "locks",
    summary = "Lock statistics",
    responses(
        (status = 200, description = "Total, active and expired counts", body = LockStats),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn lock_stats(State(state): State<AppState>, _: RequiresRole<Reader>) -> Result<Json<LockStats>> {
    let mut conn = state.db.acquire().await?;
    let stats = Locks::new(&mut conn).stats().await?;
    Ok(Json(stats.into()))
}

/// DELETE /api/locks/{lock_name} - Break a lock
#[utoipa::path(
    delete,
    path = "/api/locks/{lock_name}",
    tag = "locks",
    summary = "Unlock",
    params(("lock_name" = String, Path, description = "Lock to remove")),
    responses(
        (status = 200, description = "Lock removed", body = MessageResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "No such lock"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn unlock(
    State(state): State<AppState>,
    Path(lock_name): Path<LockName>,
    RequiresRole(user, _): RequiresRole<Admin>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await?;
    if !Locks::new(&mut conn).delete(&lock_name).await? {
        return Err(Error::NotFound {
            resource: "Lock".to_string(),
            id: lock_name,
        });
    }

    info!(user_id = user.id, %lock_name, "lock removed by admin");
    Ok(Json(MessageResponse::new(format!("Lock {lock_name} released"))))
}

/// POST /api/locks/clean-expired - Sweep expired locks
#[utoipa::path(
    post,
    path = "/api/locks/clean-expired",
    tag = "locks",
    summary = "Remove expired locks",
    responses(
        (status = 200, description = "Number of locks removed", body = AffectedRowsResponse),
        (status = 403, description = "Admin only"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn clean_expired(
    State(state): State<AppState>,
    RequiresRole(user, _): RequiresRole<Admin>,
) -> Result<Json<AffectedRowsResponse>> {
    let mut conn = state.db.acquire().await?;
    let removed = Locks::new(&mut conn).clean_expired().await?;
    info!(user_id = user.id, removed, "expired locks cleaned");

    Ok(Json(AffectedRowsResponse::new(format!("{removed} expired lock(s) removed"), removed)))
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::Role;
    use crate::db::handlers::locks::tests::insert_lock;
    use crate::test_utils::{auth_header, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_list_and_stats(pool: PgPool) {
        insert_lock(&pool, "live", 300).await;
        insert_lock(&pool, "dead", -300).await;
        let viewer = create_test_user(&pool, Role::Viewer).await;
        let server = create_test_app(pool).await;
        let (name, value) = auth_header(&viewer);

        let body: Value = server.get("/api/locks?status=expired").add_header(&name, &value).await.json();
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["lock_name"], "dead");
        assert_eq!(body["data"][0]["status"], "expired");

        let stats: Value = server.get("/api/locks/stats").add_header(&name, &value).await.json();
        assert_eq!(stats, json!({ "total": 2, "active": 1, "expired": 1 }));
    }

    #[sqlx::test]
    async fn test_unlock_permissions_and_missing(pool: PgPool) {
        insert_lock(&pool, "live", 300).await;
        let user = create_test_user(&pool, Role::User).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let server = create_test_app(pool).await;

        let (name, value) = auth_header(&user);
        server
            .delete("/api/locks/live")
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = auth_header(&admin);
        server.delete("/api/locks/live").add_header(&name, &value).await.assert_status_ok();
        let response = server.delete("/api/locks/live").add_header(&name, &value).await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["error"], "Lock not found");
    }

    #[sqlx::test]
    async fn test_clean_expired(pool: PgPool) {
        insert_lock(&pool, "live", 300).await;
        insert_lock(&pool, "dead", -5).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let server = create_test_app(pool).await;
        let (name, value) = auth_header(&admin);

        let body: Value = server.post("/api/locks/clean-expired").add_header(&name, &value).await.json();
        assert_eq!(body["affected"], 1);

        let stats: Value = server.get("/api/locks/stats").add_header(&name, &value).await.json();
        assert_eq!(stats["total"], 1);
    }
}
