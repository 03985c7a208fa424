//! Handlers shared by the three governance catalog routers.
//!
//! Each router is nested at `/api/governance-catalog-{engine}` with its engine attached as an
//! [`Extension`].

use axum::{Extension, extract::State};

use crate::api::extract::{Json, Query};
use crate::{
    AppState,
    api::{
        models::{
            governance::{ACCESS_FREQUENCIES, GovernanceEntry, GovernanceMetrics, HEALTH_STATUSES, ListGovernanceQuery},
            pagination::PaginatedResponse,
        },
        validation::{non_empty, sanitize_search, validate_optional_enum},
    },
    auth::roles::{Reader, RequiresRole},
    db::{
        handlers::governance::{Governance, GovernanceFilter},
        models::governance::GovernanceEngine,
    },
    errors::Result,
};

/// GET /api/governance-catalog-{engine} - List governance rows for one engine
#[utoipa::path(
    get,
    path = "/api/governance-catalog-{engine}",
    tag = "governance",
    summary = "List governance catalog",
    params(
        ("engine" = GovernanceEngine, Path, description = "mariadb, mssql or oracle"),
        ListGovernanceQuery,
    ),
    responses(
        (status = 200, description = "Page of governance rows", body = PaginatedResponse<GovernanceEntry>),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_governance(
    State(state): State<AppState>,
    Extension(engine): Extension<GovernanceEngine>,
    Query(query): Query<ListGovernanceQuery>,
    _: RequiresRole<Reader>,
) -> Result<Json<PaginatedResponse<GovernanceEntry>>> {
    let mut filter = GovernanceFilter::new(query.pagination.offset(), query.pagination.limit());
    filter.server_name = non_empty(query.server_name.as_deref());
    filter.database_name = non_empty(query.database_name.as_deref());
    filter.health_status =
        validate_optional_enum(query.health_status.as_deref(), HEALTH_STATUSES, "health_status")?.map(str::to_string);
    filter.access_frequency =
        validate_optional_enum(query.access_frequency.as_deref(), ACCESS_FREQUENCIES, "access_frequency")?
            .map(str::to_string);
    filter.search = sanitize_search(query.search.as_deref());

    let mut conn = state.db.acquire().await?;
    let mut repo = Governance::new(&mut conn, engine);
    let rows = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        rows.into_iter().map(GovernanceEntry::from).collect(),
        total,
        &query.pagination,
    )))
}

/// GET /api/governance-catalog-{engine}/metrics - Totals for one engine
#[utoipa::path(
    get,
    path = "/api/governance-catalog-{engine}/metrics",
    tag = "governance",
    summary = "Governance catalog metrics",
    params(("engine" = GovernanceEngine, Path, description = "mariadb, mssql or oracle")),
    responses(
        (status = 200, description = "Totals and health breakdown", body = GovernanceMetrics),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn governance_metrics(
    State(state): State<AppState>,
    Extension(engine): Extension<GovernanceEngine>,
    _: RequiresRole<Reader>,
) -> Result<Json<GovernanceMetrics>> {
    let mut conn = state.db.acquire().await?;
    let metrics = Governance::new(&mut conn, engine).metrics().await?;
    Ok(Json(metrics.into()))
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::Role;
    use crate::db::handlers::governance::tests::insert_governance_row;
    use crate::db::models::governance::GovernanceEngine;
    use crate::test_utils::{auth_header, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use serde_json::Value;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_each_engine_has_its_own_router(pool: PgPool) {
        insert_governance_row(&pool, GovernanceEngine::MariaDb, "maria-1", "orders", "HEALTHY", 3.0).await;
        insert_governance_row(&pool, GovernanceEngine::Oracle, "ora-1", "ledger", "CRITICAL", 4.0).await;
        insert_governance_row(&pool, GovernanceEngine::Oracle, "ora-1", "journal", "HEALTHY", 1.0).await;
        let viewer = create_test_user(&pool, Role::Viewer).await;
        let server = create_test_app(pool).await;
        let (name, value) = auth_header(&viewer);

        let body: Value = server.get("/api/governance-catalog-mariadb").add_header(&name, &value).await.json();
        assert_eq!(body["pagination"]["total"], 1);
        assert_eq!(body["data"][0]["table_name"], "orders");

        let body: Value = server.get("/api/governance-catalog-mssql").add_header(&name, &value).await.json();
        assert_eq!(body["pagination"]["total"], 0);

        let body: Value = server
            .get("/api/governance-catalog-oracle?health_status=critical")
            .add_header(&name, &value)
            .await
            .json();
        assert_eq!(body["pagination"]["total"], 1);
        assert_eq!(body["data"][0]["table_name"], "ledger");

        let metrics: Value = server
            .get("/api/governance-catalog-oracle/metrics")
            .add_header(&name, &value)
            .await
            .json();
        assert_eq!(metrics["total_tables"], 2);
        assert_eq!(metrics["total_size_mb"], 5.0);
    }

    #[sqlx::test]
    async fn test_rejects_unknown_health_status(pool: PgPool) {
        let viewer = create_test_user(&pool, Role::Viewer).await;
        let server = create_test_app(pool).await;
        let (name, value) = auth_header(&viewer);

        server
            .get("/api/governance-catalog-mssql?health_status=sick")
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .get("/api/governance-catalog-db2")
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
