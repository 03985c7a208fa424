use axum::extract::State;
use tracing::info;

use crate::api::extract::{Json, Query};
use crate::{
    AppState,
    api::{
        models::{
            AffectedRowsResponse,
            catalog::{
                CATALOG_SORT_COLUMNS, CATALOG_STATUSES, CatalogEntry, CatalogMetrics, CatalogUpdate, DB_ENGINES,
                ListCatalogQuery,
            },
            pagination::PaginatedResponse,
        },
        validation::{
            SortDirection, non_empty, parse_bool_filter, sanitize_search, validate_enum, validate_identifier,
            validate_optional_enum, validate_sort,
        },
    },
    auth::roles::{Admin, Reader, RequiresRole, Writer},
    db::{
        errors::DbError,
        handlers::catalog::{Catalog, CatalogFilter},
        models::catalog::CatalogUpdateDBRequest,
    },
    errors::{Error, Result},
    types::CatalogKey,
};

/// GET /api/catalog - List replicated tables
#[utoipa::path(
    get,
    path = "/api/catalog",
    tag = "catalog",
    summary = "List catalog entries",
    params(ListCatalogQuery),
    responses(
        (status = 200, description = "Page of catalog entries", body = PaginatedResponse<CatalogEntry>),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_catalog(
    State(state): State<AppState>,
    Query(query): Query<ListCatalogQuery>,
    _: RequiresRole<Reader>,
) -> Result<Json<PaginatedResponse<CatalogEntry>>> {
    let mut filter = CatalogFilter::new(query.pagination.offset(), query.pagination.limit());
    filter.engine = validate_optional_enum(query.engine.as_deref(), DB_ENGINES, "engine")?.map(str::to_string);
    filter.status = validate_optional_enum(query.status.as_deref(), CATALOG_STATUSES, "status")?.map(str::to_string);
    filter.active = parse_bool_filter(query.active.as_deref(), "active")?;
    filter.schema_name = non_empty(query.schema_name.as_deref());
    filter.search = sanitize_search(query.search.as_deref());
    filter.sort_by = validate_sort(query.sort_by.as_deref(), CATALOG_SORT_COLUMNS, "schema_name")?;
    filter.sort_order = match query.sort_order.as_deref() {
        Some(order) => SortDirection::parse(Some(order))?,
        None => SortDirection::Asc,
    };

    let mut conn = state.db.acquire().await?;
    let mut repo = Catalog::new(&mut conn);
    let rows = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        rows.into_iter().map(CatalogEntry::from).collect(),
        total,
        &query.pagination,
    )))
}

/// GET /api/catalog/metrics - Catalog totals
#[utoipa::path(
    get,
    path = "/api/catalog/metrics",
    tag = "catalog",
    summary = "Catalog metrics",
    responses(
        (status = 200, description = "Totals by status and engine", body = CatalogMetrics),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn catalog_metrics(State(state): State<AppState>, _: RequiresRole<Reader>) -> Result<Json<CatalogMetrics>> {
    let mut conn = state.db.acquire().await?;
    let metrics = Catalog::new(&mut conn).metrics().await?;
    Ok(Json(metrics.into()))
}

/// PATCH /api/catalog - Toggle a table or override its status
#[utoipa::path(
    patch,
    path = "/api/catalog",
    tag = "catalog",
    summary = "Update a catalog entry",
    request_body = CatalogUpdate,
    responses(
        (status = 200, description = "Updated entry", body = CatalogEntry),
        (status = 400, description = "Invalid key or status"),
        (status = 403, description = "Viewers cannot edit the catalog"),
        (status = 404, description = "No such catalog entry"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_catalog(
    State(state): State<AppState>,
    RequiresRole(user, _): RequiresRole<Writer>,
    Json(update): Json<CatalogUpdate>,
) -> Result<Json<CatalogEntry>> {
    let key = CatalogKey {
        schema_name: validate_identifier(&update.schema_name, "schema_name")?.to_string(),
        table_name: validate_identifier(&update.table_name, "table_name")?.to_string(),
        db_engine: validate_enum(&update.db_engine, DB_ENGINES, "db_engine")?.to_string(),
    };
    let status = update
        .status
        .as_deref()
        .map(|s| validate_enum(s, CATALOG_STATUSES, "status"))
        .transpose()?;

    if update.active.is_none() && status.is_none() {
        return Err(Error::BadRequest {
            message: "Nothing to update: provide active and/or status".to_string(),
        });
    }

    let mut conn = state.db.acquire().await?;
    let row = Catalog::new(&mut conn)
        .update(
            &key,
            &CatalogUpdateDBRequest {
                active: update.active,
                status: status.map(str::to_string),
            },
        )
        .await
        .map_err(|e| match e {
            DbError::NotFound => Error::NotFound {
                resource: "Catalog entry".to_string(),
                id: key.to_string(),
            },
            other => other.into(),
        })?;

    info!(user_id = user.id, %key, active = ?update.active, ?status, "catalog entry updated");
    Ok(Json(row.into()))
}

/// POST /api/catalog/deactivate-skipped - Deactivate every SKIP row
#[utoipa::path(
    post,
    path = "/api/catalog/deactivate-skipped",
    tag = "catalog",
    summary = "Deactivate skipped tables",
    responses(
        (status = 200, description = "Number of rows deactivated", body = AffectedRowsResponse),
        (status = 403, description = "Admin only"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn deactivate_skipped(
    State(state): State<AppState>,
    RequiresRole(user, _): RequiresRole<Admin>,
) -> Result<Json<AffectedRowsResponse>> {
    let mut conn = state.db.acquire().await?;
    let affected = Catalog::new(&mut conn).deactivate_skipped().await?;
    info!(user_id = user.id, affected, "deactivated skipped catalog entries");

    Ok(Json(AffectedRowsResponse::new(
        format!("{affected} skipped table(s) deactivated"),
        affected,
    )))
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::Role;
    use crate::db::handlers::catalog::tests::insert_catalog_row;
    use crate::test_utils::{auth_header, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_list_paginates(pool: PgPool) {
        for i in 0..25 {
            insert_catalog_row(&pool, "sales", &format!("table_{i:02}"), "PostgreSQL", "FULL_LOAD", i).await;
        }
        let viewer = create_test_user(&pool, Role::Viewer).await;
        let server = create_test_app(pool).await;
        let (name, value) = auth_header(&viewer);

        let response = server
            .get("/api/catalog?page=2&limit=10&sort_by=table_name&sort_order=asc")
            .add_header(&name, &value)
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"].as_array().unwrap().len(), 10);
        assert_eq!(body["data"][0]["table_name"], "table_10");
        assert_eq!(
            body["pagination"],
            json!({
                "total": 25,
                "totalPages": 3,
                "currentPage": 2,
                "limit": 10,
                "hasNextPage": true,
                "hasPreviousPage": true
            })
        );
    }

    #[sqlx::test]
    async fn test_list_rejects_bad_filters(pool: PgPool) {
        let viewer = create_test_user(&pool, Role::Viewer).await;
        let server = create_test_app(pool).await;
        let (name, value) = auth_header(&viewer);

        for query in ["engine=DB2", "sort_by=password_hash", "active=maybe", "sort_order=up"] {
            let response = server.get(&format!("/api/catalog?{query}")).add_header(&name, &value).await;
            response.assert_status(StatusCode::BAD_REQUEST);
        }

        let response = server.get("/api/catalog?page=abc").add_header(&name, &value).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["error"].is_string());
    }

    #[sqlx::test]
    async fn test_update_requires_writer(pool: PgPool) {
        insert_catalog_row(&pool, "sales", "orders", "PostgreSQL", "FULL_LOAD", 1).await;
        let viewer = create_test_user(&pool, Role::Viewer).await;
        let user = create_test_user(&pool, Role::User).await;
        let server = create_test_app(pool).await;
        let body = json!({ "schema_name": "sales", "table_name": "orders", "db_engine": "postgresql", "active": false });

        let (name, value) = auth_header(&viewer);
        let response = server.patch("/api/catalog").add_header(&name, &value).json(&body).await;
        response.assert_status(StatusCode::FORBIDDEN);

        let (name, value) = auth_header(&user);
        let response = server.patch("/api/catalog").add_header(&name, &value).json(&body).await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["active"], false);

        let missing = json!({ "schema_name": "sales", "table_name": "ghosts", "db_engine": "PostgreSQL", "active": true });
        let response = server.patch("/api/catalog").add_header(&name, &value).json(&missing).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    async fn test_deactivate_skipped_is_admin_only(pool: PgPool) {
        insert_catalog_row(&pool, "a", "t1", "PostgreSQL", "SKIP", 1).await;
        let user = create_test_user(&pool, Role::User).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let server = create_test_app(pool).await;

        let (name, value) = auth_header(&user);
        server
            .post("/api/catalog/deactivate-skipped")
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = auth_header(&admin);
        let response = server.post("/api/catalog/deactivate-skipped").add_header(&name, &value).await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["affected"], 1);

        let metrics: Value = server.get("/api/catalog/metrics").add_header(&name, &value).await.json();
        assert_eq!(metrics["total"], 1);
        assert_eq!(metrics["inactive"], 1);
    }
}
