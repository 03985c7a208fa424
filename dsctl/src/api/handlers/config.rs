use axum::{extract::State, http::StatusCode};
use tracing::info;

use crate::api::extract::{Json, Path, Query};
use crate::{
    AppState,
    api::{
        models::{
            auth::MessageResponse,
            config::{ConfigCreate, ConfigEntry, ConfigUpdate, ListConfigQuery},
            pagination::PaginatedResponse,
        },
        validation::{sanitize_search, validate_config_key},
    },
    auth::roles::{Admin, Reader, RequiresRole},
    db::{
        errors::DbError,
        handlers::{Repository, config::{ConfigEntries, ConfigFilter}},
        models::config::{ConfigCreateDBRequest, ConfigUpdateDBRequest},
    },
    errors::{Error, Result},
    types::ConfigKey,
};

fn config_not_found(key: &str) -> Error {
    Error::NotFound {
        resource: "Configuration key".to_string(),
        id: key.to_string(),
    }
}

/// GET /api/config - List configuration entries
#[utoipa::path(
    get,
    path = "/api/config",
    tag = "config",
    summary = "List configuration entries",
    params(ListConfigQuery),
    responses(
        (status = 200, description = "Page of entries ordered by key", body = PaginatedResponse<ConfigEntry>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_config(
    State(state): State<AppState>,
    Query(query): Query<ListConfigQuery>,
    _: RequiresRole<Reader>,
) -> Result<Json<PaginatedResponse<ConfigEntry>>> {
    let filter = ConfigFilter::new(query.pagination.offset(), query.pagination.limit())
        .with_search(sanitize_search(query.search.as_deref()));

    let mut conn = state.db.acquire().await?;
    let mut repo = ConfigEntries::new(&mut conn);
    let entries = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        entries.into_iter().map(ConfigEntry::from).collect(),
        total,
        &query.pagination,
    )))
}

/// GET /api/config/{key} - Get one entry
#[utoipa::path(
    get,
    path = "/api/config/{key}",
    tag = "config",
    summary = "Get configuration entry",
    params(("key" = String, Path, description = "Configuration key")),
    responses(
        (status = 200, description = "The entry", body = ConfigEntry),
        (status = 404, description = "No such key"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_config(
    State(state): State<AppState>,
    Path(key): Path<ConfigKey>,
    _: RequiresRole<Reader>,
) -> Result<Json<ConfigEntry>> {
    let mut conn = state.db.acquire().await?;
    let entry = ConfigEntries::new(&mut conn)
        .get_by_id(key.clone())
        .await?
        .ok_or_else(|| config_not_found(&key))?;
    Ok(Json(entry.into()))
}

/// POST /api/config - Create an entry
#[utoipa::path(
    post,
    path = "/api/config",
    tag = "config",
    summary = "Create configuration entry",
    request_body = ConfigCreate,
    responses(
        (status = 201, description = "Created", body = ConfigEntry),
        (status = 400, description = "Invalid key"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Key already exists"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_config(
    State(state): State<AppState>,
    RequiresRole(user, _): RequiresRole<Admin>,
    Json(create): Json<ConfigCreate>,
) -> Result<(StatusCode, Json<ConfigEntry>)> {
    let key = validate_config_key(&create.key)?.to_string();

    let mut conn = state.db.acquire().await?;
    let entry = ConfigEntries::new(&mut conn)
        .create(&ConfigCreateDBRequest {
            key,
            value: create.value,
            description: create.description,
        })
        .await?;

    info!(user_id = user.id, key = %entry.key, "configuration entry created");
    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// PATCH /api/config/{key} - Update value and/or description
#[utoipa::path(
    patch,
    path = "/api/config/{key}",
    tag = "config",
    summary = "Update configuration entry",
    params(("key" = String, Path, description = "Configuration key")),
    request_body = ConfigUpdate,
    responses(
        (status = 200, description = "Updated entry", body = ConfigEntry),
        (status = 403, description = "Admin only"),
        (status = 404, description = "No such key"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_config(
    State(state): State<AppState>,
    Path(key): Path<ConfigKey>,
    RequiresRole(user, _): RequiresRole<Admin>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<ConfigEntry>> {
    let mut conn = state.db.acquire().await?;
    let entry = ConfigEntries::new(&mut conn)
        .update(
            key.clone(),
            &ConfigUpdateDBRequest {
                value: update.value,
                description: update.description,
            },
        )
        .await
        .map_err(|e| match e {
            DbError::NotFound => config_not_found(&key),
            other => other.into(),
        })?;

    info!(user_id = user.id, %key, "configuration entry updated");
    Ok(Json(entry.into()))
}

/// DELETE /api/config/{key} - Remove an entry
#[utoipa::path(
    delete,
    path = "/api/config/{key}",
    tag = "config",
    summary = "Delete configuration entry",
    params(("key" = String, Path, description = "Configuration key")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "No such key"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_config(
    State(state): State<AppState>,
    Path(key): Path<ConfigKey>,
    RequiresRole(user, _): RequiresRole<Admin>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await?;
    if !ConfigEntries::new(&mut conn).delete(key.clone()).await? {
        return Err(config_not_found(&key));
    }

    info!(user_id = user.id, %key, "configuration entry deleted");
    Ok(Json(MessageResponse::new(format!("Configuration key {key} deleted"))))
}
