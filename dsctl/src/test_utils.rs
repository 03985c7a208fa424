//! Shared fixtures for the `#[sqlx::test]` suites.

use std::sync::atomic::{AtomicU64, Ordering};

use axum_test::TestServer;
use once_cell::sync::Lazy;
use sqlx::PgPool;

use crate::{
    api::models::users::{CurrentUser, Role, UserResponse},
    auth::{bootstrap, password, session},
    config::{Config, PoolSettings, RateLimitConfig, StorageConfig},
    db::{
        handlers::{Repository, Users},
        models::users::UserCreateDBRequest,
    },
};

/// Password given to every user made by [`create_test_user`].
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Lowest bcrypt cost, so tests spend their time on the database rather than hashing.
pub const TEST_BCRYPT_COST: u32 = 4;

static TEST_PASSWORD_HASH: Lazy<String> =
    Lazy::new(|| password::hash_password(TEST_PASSWORD, TEST_BCRYPT_COST).expect("Failed to hash test password"));

static USER_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn create_test_config() -> Config {
    let upload_dir = std::env::temp_dir().join(format!("dsctl-test-uploads-{}", std::process::id()));

    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        admin_password: Some("ADMIN".to_string()),
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        enable_metrics: false,
        rate_limits: RateLimitConfig {
            enabled: false,
            ..Default::default()
        },
        storage: StorageConfig { upload_dir },
        ..Default::default()
    };
    config.database.pool = PoolSettings {
        max_connections: 2,
        min_connections: 0,
        ..Default::default()
    };
    config.auth.bcrypt_cost = TEST_BCRYPT_COST;
    config
}

/// Build the full router against a test pool.
pub async fn create_test_app(pool: PgPool) -> TestServer {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, config: Config) -> TestServer {
    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");
    app.into_test_server()
}

/// Run the users table bootstrap, as the server would on first login.
pub async fn ensure_users_table(pool: &PgPool) {
    bootstrap::initialize_users_table(pool, "ADMIN", TEST_BCRYPT_COST)
        .await
        .expect("Failed to bootstrap users table");
}

/// Create an active user with [`TEST_PASSWORD`].
pub async fn create_test_user(pool: &PgPool, role: Role) -> UserResponse {
    ensure_users_table(pool).await;

    let n = USER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let username = format!("test_{}_{n}", role.as_str());
    let email = format!("{username}@example.com");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users = Users::new(&mut conn);
    let user = users
        .create(&UserCreateDBRequest {
            username,
            email,
            password_hash: TEST_PASSWORD_HASH.clone(),
            role,
            active: true,
        })
        .await
        .expect("Failed to create test user");
    UserResponse::from(user)
}

/// `Authorization` header carrying a session token for `user`.
pub fn auth_header(user: &UserResponse) -> (String, String) {
    let current = CurrentUser {
        id: user.id,
        username: user.username.clone(),
        role: user.role,
    };
    let token = session::create_session_token(&current, &create_test_config()).expect("Failed to sign test token");
    ("authorization".to_string(), format!("Bearer {token}"))
}
