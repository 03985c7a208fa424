use axum::extract::State;

use crate::api::extract::{Json, Query};
use crate::{
    AppState,
    api::{
        models::{
            catalog::DB_ENGINES,
            maintenance::{
                ListMaintenanceQuery, MAINTENANCE_STATUSES, MAINTENANCE_TYPES, MaintenanceMetrics, MaintenanceTask,
            },
            pagination::PaginatedResponse,
        },
        validation::{sanitize_search, validate_optional_enum},
    },
    auth::roles::{Reader, RequiresRole},
    db::handlers::maintenance::{Maintenance, MaintenanceFilter},
    errors::Result,
};

/// GET /api/maintenance - List maintenance tasks
#[utoipa::path(
    get,
    path = "/api/maintenance",
    tag = "maintenance",
    summary = "List maintenance tasks",
    params(ListMaintenanceQuery),
    responses(
        (status = 200, description = "Page of tasks, highest priority first", body = PaginatedResponse<MaintenanceTask>),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_maintenance(
    State(state): State<AppState>,
    Query(query): Query<ListMaintenanceQuery>,
    _: RequiresRole<Reader>,
) -> Result<Json<PaginatedResponse<MaintenanceTask>>> {
    let mut filter = MaintenanceFilter::new(query.pagination.offset(), query.pagination.limit());
    filter.maintenance_type =
        validate_optional_enum(query.maintenance_type.as_deref(), MAINTENANCE_TYPES, "maintenance_type")?
            .map(str::to_string);
    filter.status =
        validate_optional_enum(query.status.as_deref(), MAINTENANCE_STATUSES, "status")?.map(str::to_string);
    filter.db_engine = validate_optional_enum(query.db_engine.as_deref(), DB_ENGINES, "db_engine")?.map(str::to_string);
    filter.search = sanitize_search(query.search.as_deref());

    let mut conn = state.db.acquire().await?;
    let mut repo = Maintenance::new(&mut conn);
    let rows = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        rows.into_iter().map(MaintenanceTask::from).collect(),
        total,
        &query.pagination,
    )))
}

/// GET /api/maintenance/metrics - Status counts and reclaimed space
#[utoipa::path(
    get,
    path = "/api/maintenance/metrics",
    tag = "maintenance",
    summary = "Maintenance metrics",
    responses(
        (status = 200, description = "Totals", body = MaintenanceMetrics),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn maintenance_metrics(
    State(state): State<AppState>,
    _: RequiresRole<Reader>,
) -> Result<Json<MaintenanceMetrics>> {
    let mut conn = state.db.acquire().await?;
    let metrics = Maintenance::new(&mut conn).metrics().await?;
    Ok(Json(metrics.into()))
}
