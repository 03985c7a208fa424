use axum::extract::State;
use tracing::info;

use crate::api::extract::Json;
use crate::{
    AppState,
    api::models::{
        auth::{ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse},
        users::{CurrentUser, UserResponse},
    },
    auth::credentials,
    db::handlers::{Repository, Users},
    errors::{Error, Result},
};

/// POST /api/auth/login - Exchange a username or email and password for a session token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials or inactive account"),
        (status = 429, description = "Too many login attempts"),
        (status = 503, description = "User store not ready"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(Error::BadRequest {
            message: "Username and password are required".to_string(),
        });
    }

    state.users_table.ensure().await?;
    let session = credentials::authenticate_user(&state.db, &state.config, &request.username, &request.password).await?;

    Ok(Json(LoginResponse {
        success: true,
        user: session.user,
        token: session.token,
    }))
}

/// POST /api/auth/logout - End the session
///
/// Tokens are stateless, so this only acknowledges; the client discards its token.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout acknowledged", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn logout(current_user: CurrentUser) -> Json<MessageResponse> {
    info!(user_id = current_user.id, "user logged out");
    Json(MessageResponse::new("Logged out successfully"))
}

/// GET /api/auth/me - The caller's own account
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Account no longer exists"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    state.users_table.ensure().await?;

    let mut conn = state.db.acquire().await?;
    let user = Users::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: current_user.id.to_string(),
        })?;

    Ok(Json(user.into()))
}

/// POST /api/auth/change-password - Change the caller's password
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Current password is incorrect or new password is invalid"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state.users_table.ensure().await?;
    credentials::change_password(
        &state.db,
        &state.config,
        current_user.id,
        &request.current_password,
        &request.new_password,
    )
    .await?;

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::Role;
    use crate::auth::bootstrap::BOOTSTRAP_ADMIN_USERNAME;
    use crate::auth::credentials::{INACTIVE_ACCOUNT_MESSAGE, INVALID_CREDENTIALS_MESSAGE, WRONG_CURRENT_PASSWORD_MESSAGE};
    use crate::test_utils::{TEST_PASSWORD, auth_header, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_bootstrap_admin_can_log_in(pool: PgPool) {
        let server = create_test_app(pool).await;

        let response = server
            .post("/api/auth/login")
            .json(&json!({ "username": BOOTSTRAP_ADMIN_USERNAME, "password": "ADMIN" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["role"], "admin");
        assert!(body["user"].get("password_hash").is_none());

        let token = body["token"].as_str().unwrap();
        let me: Value = server
            .get("/api/auth/me")
            .add_header("authorization", format!("Bearer {token}"))
            .await
            .json();
        assert_eq!(me["username"], BOOTSTRAP_ADMIN_USERNAME);
        assert!(!me["last_login"].is_null());
    }

    #[sqlx::test]
    async fn test_login_failures(pool: PgPool) {
        let user = create_test_user(&pool, Role::User).await;
        sqlx::query("UPDATE metadata.users SET active = FALSE WHERE id = $1")
            .bind(user.id)
            .execute(&pool)
            .await
            .unwrap();
        let server = create_test_app(pool).await;

        let response = server
            .post("/api/auth/login")
            .json(&json!({ "username": "nobody", "password": "whatever" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"], INVALID_CREDENTIALS_MESSAGE);

        let response = server
            .post("/api/auth/login")
            .json(&json!({ "username": user.username, "password": TEST_PASSWORD }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"], INACTIVE_ACCOUNT_MESSAGE);

        server
            .post("/api/auth/login")
            .json(&json!({ "username": "  ", "password": "" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    async fn test_login_with_missing_fields_is_bad_request(pool: PgPool) {
        let server = create_test_app(pool).await;

        for body in [json!({ "username": "ADMIN" }), json!({ "password": "ADMIN" }), json!({})] {
            let response = server.post("/api/auth/login").json(&body).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(response.json::<Value>()["error"], "Username and password are required");
        }

        let response = server.post("/api/auth/login").text("username=ADMIN").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["error"].is_string());
    }

    #[sqlx::test]
    async fn test_change_password_flow(pool: PgPool) {
        let user = create_test_user(&pool, Role::Viewer).await;
        let server = create_test_app(pool).await;
        let (name, value) = auth_header(&user);

        let response = server
            .post("/api/auth/change-password")
            .add_header(&name, &value)
            .json(&json!({ "current_password": "not-it", "new_password": "a-new-password" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], WRONG_CURRENT_PASSWORD_MESSAGE);

        server
            .post("/api/auth/change-password")
            .add_header(&name, &value)
            .json(&json!({ "currentPassword": TEST_PASSWORD, "newPassword": "a-new-password" }))
            .await
            .assert_status_ok();

        server
            .post("/api/auth/login")
            .json(&json!({ "username": user.username, "password": TEST_PASSWORD }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post("/api/auth/login")
            .json(&json!({ "username": user.email, "password": "a-new-password" }))
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    async fn test_logout_requires_token(pool: PgPool) {
        let user = create_test_user(&pool, Role::Viewer).await;
        let server = create_test_app(pool).await;

        server.post("/api/auth/logout").await.assert_status(StatusCode::UNAUTHORIZED);

        let (name, value) = auth_header(&user);
        let body: Value = server.post("/api/auth/logout").add_header(&name, &value).await.json();
        assert_eq!(body["success"], true);
    }
}
