use axum::extract::State;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::api::extract::{Json, Query};
use crate::{
    AppState,
    api::{
        models::{
            AffectedRowsResponse,
            catalog::DB_ENGINES,
            logs::{DeleteLogsQuery, ListLogsQuery, LogEntry, LogFilters},
            pagination::PaginatedResponse,
        },
        validation::{non_empty, sanitize_search, validate_optional_enum},
    },
    auth::roles::{Admin, Reader, RequiresRole},
    db::handlers::logs::{LogFilter, Logs},
    errors::{Error, Result},
};

fn parse_timestamp(value: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => DateTime::parse_from_rfc3339(v)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|_| Error::BadRequest {
                message: format!("Invalid {field} '{v}'. Expected an RFC 3339 timestamp"),
            }),
    }
}

/// GET /api/logs - Query sync engine logs
#[utoipa::path(
    get,
    path = "/api/logs",
    tag = "logs",
    summary = "List logs",
    params(ListLogsQuery),
    responses(
        (status = 200, description = "Page of log entries, newest first", body = PaginatedResponse<LogEntry>),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<ListLogsQuery>,
    _: RequiresRole<Reader>,
) -> Result<Json<PaginatedResponse<LogEntry>>> {
    let mut filter = LogFilter::new(query.pagination.offset(), query.pagination.limit());
    filter.level = non_empty(query.level.as_deref());
    filter.category = non_empty(query.category.as_deref());
    filter.function = non_empty(query.function.as_deref());
    filter.db_engine = validate_optional_enum(query.db_engine.as_deref(), DB_ENGINES, "db_engine")?.map(str::to_string);
    filter.search = sanitize_search(query.search.as_deref());
    filter.start = parse_timestamp(query.start_date.as_deref(), "start_date")?;
    filter.end = parse_timestamp(query.end_date.as_deref(), "end_date")?;

    if let (Some(start), Some(end)) = (filter.start, filter.end) {
        if start > end {
            return Err(Error::BadRequest {
                message: "start_date must not be after end_date".to_string(),
            });
        }
    }

    let mut conn = state.db.acquire().await?;
    let mut repo = Logs::new(&mut conn);
    let rows = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        rows.into_iter().map(LogEntry::from).collect(),
        total,
        &query.pagination,
    )))
}

/// GET /api/logs/filters - Distinct levels, categories and functions
#[utoipa::path(
    get,
    path = "/api/logs/filters",
    tag = "logs",
    summary = "Log filter values",
    responses(
        (status = 200, description = "Values present in the log table", body = LogFilters),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn log_filters(State(state): State<AppState>, _: RequiresRole<Reader>) -> Result<Json<LogFilters>> {
    let mut conn = state.db.acquire().await?;
    let facets = Logs::new(&mut conn).facets().await?;
    Ok(Json(facets.into()))
}

/// Longest retention `DELETE /api/logs` accepts. Postgres timestamps cannot go much further back.
pub const MAX_RETENTION_DAYS: i32 = 36_500;

/// DELETE /api/logs - Remove old log entries
#[utoipa::path(
    delete,
    path = "/api/logs",
    tag = "logs",
    summary = "Clean up logs",
    params(DeleteLogsQuery),
    responses(
        (status = 200, description = "Number of entries removed", body = AffectedRowsResponse),
        (status = 400, description = "Retention out of range"),
        (status = 403, description = "Admin only"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_logs(
    State(state): State<AppState>,
    Query(query): Query<DeleteLogsQuery>,
    RequiresRole(user, _): RequiresRole<Admin>,
) -> Result<Json<AffectedRowsResponse>> {
    if query.older_than_days.is_some_and(|days| !(0..=MAX_RETENTION_DAYS).contains(&days)) {
        return Err(Error::BadRequest {
            message: format!("older_than_days must be between 0 and {MAX_RETENTION_DAYS}"),
        });
    }

    let mut conn = state.db.acquire().await?;
    let affected = Logs::new(&mut conn).delete_older_than(query.older_than_days).await?;
    info!(user_id = user.id, older_than_days = ?query.older_than_days, affected, "logs cleaned up");

    let message = match query.older_than_days {
        Some(days) => format!("Deleted {affected} log entries older than {days} days"),
        None => format!("Deleted all {affected} log entries"),
    };
    Ok(Json(AffectedRowsResponse::new(message, affected)))
}

#[cfg(test)]
mod tests {
    use super::{MAX_RETENTION_DAYS, parse_timestamp};
    use crate::api::models::users::Role;
    use crate::db::handlers::logs::tests::insert_log;
    use crate::test_utils::{auth_header, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use serde_json::Value;
    use sqlx::PgPool;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp(None, "start_date").unwrap(), None);
        assert_eq!(parse_timestamp(Some(" "), "start_date").unwrap(), None);
        let ts = parse_timestamp(Some("2025-06-01T12:00:00+02:00"), "start_date").unwrap().unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-06-01T10:00:00+00:00");
        assert!(parse_timestamp(Some("yesterday"), "start_date").is_err());
    }

    #[sqlx::test]
    async fn test_list_and_filters(pool: PgPool) {
        insert_log(&pool, "ERROR", Some("sync"), "timeout talking to replica", 0).await;
        insert_log(&pool, "INFO", Some("sync"), "batch complete", 0).await;
        let viewer = create_test_user(&pool, Role::Viewer).await;
        let server = create_test_app(pool).await;
        let (name, value) = auth_header(&viewer);

        let body: Value = server.get("/api/logs?level=error").add_header(&name, &value).await.json();
        assert_eq!(body["pagination"]["total"], 1);
        assert_eq!(body["data"][0]["message"], "timeout talking to replica");

        let facets: Value = server.get("/api/logs/filters").add_header(&name, &value).await.json();
        assert_eq!(facets["levels"], serde_json::json!(["ERROR", "INFO"]));

        server
            .get("/api/logs?start_date=2025-02-01T00:00:00Z&end_date=2025-01-01T00:00:00Z")
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    async fn test_cleanup_is_admin_only(pool: PgPool) {
        insert_log(&pool, "INFO", None, "ancient", 90).await;
        insert_log(&pool, "INFO", None, "recent", 1).await;
        let user = create_test_user(&pool, Role::User).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let server = create_test_app(pool).await;

        let (name, value) = auth_header(&user);
        server
            .delete("/api/logs?older_than_days=30")
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = auth_header(&admin);
        server
            .delete("/api/logs?older_than_days=-1")
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        for days in ["36501", "2000000000", "lots"] {
            let response = server
                .delete(&format!("/api/logs?older_than_days={days}"))
                .add_header(&name, &value)
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
            assert!(response.json::<Value>()["error"].is_string());
        }

        let body: Value = server
            .delete(&format!("/api/logs?older_than_days={MAX_RETENTION_DAYS}"))
            .add_header(&name, &value)
            .await
            .json();
        assert_eq!(body["affected"], 0);

        let body: Value = server
            .delete("/api/logs?older_than_days=30")
            .add_header(&name, &value)
            .await
            .json();
        assert_eq!(body["affected"], 1);

        let body: Value = server.delete("/api/logs").add_header(&name, &value).await.json();
        assert_eq!(body["affected"], 1);
    }
}
