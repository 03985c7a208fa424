use axum::{extract::State, http::StatusCode};
use tracing::warn;

use crate::api::extract::Json;
use crate::{
    AppState,
    api::models::health::{DatabaseStatus, HealthResponse, HealthStatus},
};

/// GET /api/health - Liveness and database reachability
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Database reachable", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => DatabaseStatus::Connected,
        Err(e) => {
            warn!(error = %e, "health check could not reach the database");
            DatabaseStatus::Disconnected
        }
    };

    let (code, status) = match database {
        DatabaseStatus::Connected => (StatusCode::OK, HealthStatus::Ok),
        DatabaseStatus::Disconnected => (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::Unavailable),
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            users_table_ready: state.users_table.is_ready(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use crate::test_utils::create_test_app;
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_health_is_public(pool: PgPool) {
        let server = create_test_app(pool).await;

        let response = server.get("/api/health").await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>(),
            json!({ "status": "ok", "database": "connected", "users_table_ready": false })
        );

        // Logging in bootstraps the users table
        server
            .post("/api/auth/login")
            .json(&json!({ "username": "ADMIN", "password": "ADMIN" }))
            .await
            .assert_status_ok();
        let body: Value = server.get("/api/health").await.json();
        assert_eq!(body["users_table_ready"], true);
    }

    #[sqlx::test]
    async fn test_health_reports_closed_pool(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        pool.close().await;

        let response = server.get("/api/health").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.json::<Value>()["database"], "disconnected");
    }
}
