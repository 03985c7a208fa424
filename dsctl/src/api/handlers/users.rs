//! Admin-only user management under `/api/auth/users`.

use axum::{extract::State, http::StatusCode};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::api::extract::{Json, Path, Query};
use crate::{
    AppState,
    api::{
        models::{
            auth::MessageResponse,
            pagination::PaginatedResponse,
            users::{ListUsersQuery, ResetPasswordRequest, Role, UserCreate, UserResponse, UserUpdate},
        },
        validation::sanitize_search,
    },
    auth::{
        password,
        roles::{Admin, RequiresRole},
    },
    db::{
        errors::DbError,
        handlers::{Repository, Users, users::UserFilter},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::UserId,
};

static USERNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,50}$").expect("username regex"));

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

fn user_not_found(id: UserId) -> Error {
    Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    }
}

fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    if !USERNAME.is_match(username) {
        return Err(Error::BadRequest {
            message: "Username must be 3-50 characters of letters, digits, '_', '.' or '-'".to_string(),
        });
    }
    Ok(username.to_string())
}

fn validate_email(email: &str) -> Result<String> {
    let email = email.trim();
    if email.len() > 255 || !EMAIL.is_match(email) {
        return Err(Error::BadRequest {
            message: "Invalid email address".to_string(),
        });
    }
    Ok(email.to_lowercase())
}

/// GET /api/auth/users - List users
#[utoipa::path(
    get,
    path = "/api/auth/users",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Page of users, newest first", body = PaginatedResponse<UserResponse>),
        (status = 400, description = "Invalid role filter"),
        (status = 403, description = "Admin only"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    _: RequiresRole<Admin>,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let role = query
        .role
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .map(str::parse::<Role>)
        .transpose()
        .map_err(|message| Error::BadRequest { message })?;

    state.users_table.ensure().await?;
    let filter = UserFilter::new(query.pagination.offset(), query.pagination.limit())
        .with_search(sanitize_search(query.search.as_deref()))
        .with_role(role);

    let mut conn = state.db.acquire().await?;
    let mut repo = Users::new(&mut conn);
    let users = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

/// GET /api/auth/users/{id} - Get one user
#[utoipa::path(
    get,
    path = "/api/auth/users/{id}",
    tag = "users",
    summary = "Get user",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "The user", body = UserResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "No such user"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    _: RequiresRole<Admin>,
) -> Result<Json<UserResponse>> {
    state.users_table.ensure().await?;
    let mut conn = state.db.acquire().await?;
    let user = Users::new(&mut conn).get_by_id(id).await?.ok_or_else(|| user_not_found(id))?;
    Ok(Json(user.into()))
}

/// POST /api/auth/users - Create a user
#[utoipa::path(
    post,
    path = "/api/auth/users",
    tag = "users",
    summary = "Create user",
    request_body = UserCreate,
    responses(
        (status = 201, description = "Created", body = UserResponse),
        (status = 400, description = "Invalid username, email or password"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Username or email already exists"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    RequiresRole(admin, _): RequiresRole<Admin>,
    Json(create): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let username = validate_username(&create.username)?;
    let email = validate_email(&create.email)?;
    password::validate_password(&create.password, &state.config.auth.password)?;

    state.users_table.ensure().await?;
    let password_hash = password::hash_password_blocking(create.password, state.config.auth.bcrypt_cost).await?;

    let mut conn = state.db.acquire().await?;
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            username,
            email,
            password_hash,
            role: create.role,
            active: true,
        })
        .await?;

    info!(admin_id = admin.id, user_id = user.id, role = %user.role, "user created");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// PATCH /api/auth/users/{id} - Change email, role or active flag
#[utoipa::path(
    patch,
    path = "/api/auth/users/{id}",
    tag = "users",
    summary = "Update user",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Invalid email, or an admin deactivating themselves"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "No such user"),
        (status = 409, description = "Email already in use"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    RequiresRole(admin, _): RequiresRole<Admin>,
    Json(mut update): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    if id == admin.id && update.active == Some(false) {
        return Err(Error::BadRequest {
            message: "You cannot deactivate your own account".to_string(),
        });
    }
    update.email = update.email.as_deref().map(validate_email).transpose()?;

    state.users_table.ensure().await?;
    let mut conn = state.db.acquire().await?;
    let user = Users::new(&mut conn)
        .update(id, &UserUpdateDBRequest::new(update))
        .await
        .map_err(|e| match e {
            DbError::NotFound => user_not_found(id),
            other => other.into(),
        })?;

    info!(admin_id = admin.id, user_id = id, "user updated");
    Ok(Json(user.into()))
}

/// DELETE /api/auth/users/{id} - Delete a user
#[utoipa::path(
    delete,
    path = "/api/auth/users/{id}",
    tag = "users",
    summary = "Delete user",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 400, description = "An admin deleting themselves"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "No such user"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    RequiresRole(admin, _): RequiresRole<Admin>,
) -> Result<Json<MessageResponse>> {
    if id == admin.id {
        return Err(Error::BadRequest {
            message: "You cannot delete your own account".to_string(),
        });
    }

    state.users_table.ensure().await?;
    let mut conn = state.db.acquire().await?;
    if !Users::new(&mut conn).delete(id).await? {
        return Err(user_not_found(id));
    }

    info!(admin_id = admin.id, user_id = id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

/// POST /api/auth/users/{id}/reset-password - Overwrite a user's password
#[utoipa::path(
    post,
    path = "/api/auth/users/{id}/reset-password",
    tag = "users",
    summary = "Reset user password",
    params(("id" = i64, Path, description = "User ID")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid password"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "No such user"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    RequiresRole(admin, _): RequiresRole<Admin>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    password::validate_password(&request.new_password, &state.config.auth.password)?;

    state.users_table.ensure().await?;
    let hash = password::hash_password_blocking(request.new_password, state.config.auth.bcrypt_cost).await?;

    let mut conn = state.db.acquire().await?;
    Users::new(&mut conn)
        .update(id, &UserUpdateDBRequest::password(hash))
        .await
        .map_err(|e| match e {
            DbError::NotFound => user_not_found(id),
            other => other.into(),
        })?;

    info!(admin_id = admin.id, user_id = id, "password reset by admin");
    Ok(Json(MessageResponse::new("Password reset successfully")))
}
