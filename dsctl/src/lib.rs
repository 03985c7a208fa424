//! # dsctl: DataSync Console API
//!
//! `dsctl` is the operations backend of the DataSync console. The DataSync sync engine
//! replicates tables from PostgreSQL, MariaDB, MSSQL, Oracle and MongoDB sources and records
//! what it is doing in a `metadata` schema: a catalog of replicated tables, the locks it holds,
//! its settings, per-engine governance snapshots, scheduled maintenance and its logs. This crate
//! exposes those tables to operators over a JSON API with accounts, roles and rate limiting.
//!
//! ## Request flow
//!
//! Every request passes, outermost first, through CORS, HTTP tracing, optional Prometheus
//! metrics, the per-IP [rate limiter](limits::rate_limit) and the
//! [authentication gate](auth::middleware::require_auth). The gate lets `/api/auth/login` and
//! `/api/health` through and demands a bearer session token everywhere else under `/api`.
//! Handlers then check the caller's role with [`auth::roles::RequiresRole`], run parameterized
//! SQL through a repository in [`db::handlers`] and answer with an API model from
//! [`api::models`].
//!
//! ## Users table bootstrap
//!
//! `metadata.users` is created on demand, and seeded with an `ADMIN` account, by
//! [`auth::bootstrap::UsersTable`]. Every handler that reads users awaits it, so the first login
//! after a deploy never races the seed. The server also kicks it off at startup.
//!
//! ## Roles
//!
//! - `admin`: everything, including user management and destructive operations
//! - `user`: read everything, edit catalog rows, upload files
//! - `viewer`: read only
//!
//! ## Configuration
//!
//! See [`config`] for the layering of defaults, environment and `config.json`.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod limits;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::{net::SocketAddr, time::Duration};

use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    auth::{bootstrap::UsersTable, middleware::PublicPaths},
    config::CorsOrigin,
    db::models::governance::GovernanceEngine,
    limits::Limiters,
    openapi::ApiDoc,
};

pub use config::Config;

/// How often idle rate-limit buckets are swept.
const LIMITER_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool.clone())
///     .config(config.clone())
///     .users_table(UsersTable::new(pool, "ADMIN", 12))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Readiness gate for `metadata.users`
    pub users_table: UsersTable,
    #[builder(default)]
    pub limiters: Limiters,
    #[builder(default)]
    pub public_paths: PublicPaths,
}

/// Get the dsctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect the pool and bring the `metadata` schema up to date.
#[instrument(skip_all)]
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));
    if settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
    }
    if settings.max_lifetime_secs > 0 {
        options = options.max_lifetime(Duration::from_secs(settings.max_lifetime_secs));
    }

    let pool = options.connect_with(config.database.connect_options()?).await?;
    info!(
        host = %config.database.host,
        database = %config.database.database,
        max_connections = settings.max_connections,
        "connected to database"
    );

    migrator().run(&pool).await?;
    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors = &config.cors;

    let allow_origin = if cors.allowed_origins.contains(&CorsOrigin::Wildcard) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::with_capacity(cors.allowed_origins.len());
        for origin in &cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Browsers send origins without a trailing slash
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut layer = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(cors.allow_credentials);

    if let Some(max_age) = cors.max_age {
        layer = layer.max_age(Duration::from_secs(max_age));
    }

    Ok(layer)
}

fn governance_router(engine: GovernanceEngine) -> Router<AppState> {
    Router::new()
        .route("/", get(api::handlers::governance::list_governance))
        .route("/metrics", get(api::handlers::governance::governance_metrics))
        .layer(Extension(engine))
}

/// Build the application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let mut api_routes = Router::new()
        .route("/api/health", get(api::handlers::health::health))
        // Authentication
        .route("/api/auth/login", post(api::handlers::auth::login))
        .route("/api/auth/logout", post(api::handlers::auth::logout))
        .route("/api/auth/me", get(api::handlers::auth::me))
        .route("/api/auth/change-password", post(api::handlers::auth::change_password))
        // User management
        .route(
            "/api/auth/users",
            get(api::handlers::users::list_users).post(api::handlers::users::create_user),
        )
        .route(
            "/api/auth/users/{id}",
            get(api::handlers::users::get_user)
                .patch(api::handlers::users::update_user)
                .delete(api::handlers::users::delete_user),
        )
        .route("/api/auth/users/{id}/reset-password", post(api::handlers::users::reset_password))
        // Catalog
        .route(
            "/api/catalog",
            get(api::handlers::catalog::list_catalog).patch(api::handlers::catalog::update_catalog),
        )
        .route("/api/catalog/metrics", get(api::handlers::catalog::catalog_metrics))
        .route("/api/catalog/deactivate-skipped", post(api::handlers::catalog::deactivate_skipped))
        // Locks
        .route("/api/locks", get(api::handlers::locks::list_locks))
        .route("/api/locks/stats", get(api::handlers::locks::lock_stats))
        .route("/api/locks/clean-expired", post(api::handlers::locks::clean_expired))
        .route("/api/locks/{lock_name}", delete(api::handlers::locks::unlock))
        // Config
        .route(
            "/api/config",
            get(api::handlers::config::list_config).post(api::handlers::config::create_config),
        )
        .route(
            "/api/config/{key}",
            get(api::handlers::config::get_config)
                .patch(api::handlers::config::update_config)
                .delete(api::handlers::config::delete_config),
        )
        // Maintenance
        .route("/api/maintenance", get(api::handlers::maintenance::list_maintenance))
        .route("/api/maintenance/metrics", get(api::handlers::maintenance::maintenance_metrics))
        // Logs
        .route(
            "/api/logs",
            get(api::handlers::logs::list_logs).delete(api::handlers::logs::delete_logs),
        )
        .route("/api/logs/filters", get(api::handlers::logs::log_filters))
        // Uploads are streamed to disk, so the default body limit does not apply
        .route(
            "/api/uploads/csv",
            post(api::handlers::uploads::upload_csv).layer(DefaultBodyLimit::disable()),
        );

    for engine in GovernanceEngine::ALL {
        api_routes = api_routes.nest(&format!("/api/governance-catalog-{}", engine.slug()), governance_router(engine));
    }

    let router = api_routes
        .route("/api-docs/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    // Innermost first: authentication runs after rate limiting
    let mut router = router
        .layer(from_fn_with_state(state.clone(), auth::middleware::require_auth))
        .layer(from_fn_with_state(state.clone(), limits::rate_limit));

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router.layer(create_cors_layer(&state.config)?))
}

pub struct Application {
    router: Router,
    app_state: AppState,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance, connecting to the configured database.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create a new application instance, optionally on an existing pool (tests pass one).
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!(environment = %config.environment, bind = %config.bind_address(), "starting DataSync console");
        errors::set_expose_details(!config.is_production());

        let pool = match pool {
            Some(pool) => {
                migrator().run(&pool).await?;
                pool
            }
            None => setup_database(&config).await?,
        };

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .users_table(UsersTable::new(
                pool.clone(),
                config.bootstrap_admin_password(),
                config.auth.bcrypt_cost,
            ))
            .limiters(Limiters::new(&config.rate_limits))
            .build();

        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            app_state,
            config,
            pool,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "DataSync console listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        // Bootstrap the users table now rather than on the first login
        let users_table = self.app_state.users_table.clone();
        tokio::spawn(async move {
            if let Err(e) = users_table.ensure().await {
                warn!("users table not ready at startup, will retry on demand: {e}");
            }
        });

        let purge_task = self.app_state.limiters.spawn_purge_task(LIMITER_PURGE_INTERVAL);

        axum::serve(listener, self.router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(task) = purge_task {
            task.abort();
        }

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
