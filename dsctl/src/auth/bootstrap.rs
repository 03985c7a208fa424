//! Users table bootstrap and readiness.
//!
//! The users table is owned by this service rather than by migrations, because the sync engine
//! shares the `metadata` schema and older deployments created the table by hand. Bootstrap is
//! idempotent: it creates the table and indexes when absent and seeds the `ADMIN` account when
//! neither its username nor its email is taken.
//!
//! Several replicas may boot against the same database at once. Postgres reports a lost
//! `CREATE ... IF NOT EXISTS` race, or a lost seed insert, as a duplicate-key error (`23505`);
//! those are treated as "already exists".
//!
//! [`UsersTable`] turns bootstrap into a shared initialization future. Every caller of
//! [`UsersTable::ensure`] waits on the same in-flight attempt; a failed attempt leaves the cell
//! empty so the next caller retries.

use std::sync::Arc;

use sqlx::{Executor, PgPool};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument};

use crate::auth::password;
use crate::db::errors::DbError;
use crate::errors::{Error, Result};

pub const BOOTSTRAP_ADMIN_USERNAME: &str = "ADMIN";
pub const BOOTSTRAP_ADMIN_EMAIL: &str = "admin@datasync.local";

const USERS_TABLE_DDL: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS metadata",
    r#"CREATE TABLE IF NOT EXISTS metadata.users (
        id BIGSERIAL PRIMARY KEY,
        username VARCHAR(100) NOT NULL UNIQUE,
        email VARCHAR(255) NOT NULL UNIQUE,
        password_hash VARCHAR(255) NOT NULL,
        role VARCHAR(20) NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'user', 'viewer')),
        active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        last_login TIMESTAMPTZ
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_users_username ON metadata.users (username)",
    "CREATE INDEX IF NOT EXISTS idx_users_email ON metadata.users (email)",
    "CREATE INDEX IF NOT EXISTS idx_users_role ON metadata.users (role)",
];

/// SQLSTATEs a concurrent `IF NOT EXISTS` can still raise: unique_violation on the catalog,
/// duplicate_table, duplicate_object.
fn lost_ddl_race(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => matches!(db_err.code().as_deref(), Some("23505" | "42P07" | "42710")),
        _ => false,
    }
}

/// Outcome of seeding the bootstrap admin account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminSeed {
    Created,
    AlreadyPresent,
}

/// Create the users table if needed and seed the `ADMIN` account.
#[instrument(skip_all, err)]
pub async fn initialize_users_table(db: &PgPool, admin_password: &str, bcrypt_cost: u32) -> Result<AdminSeed> {
    for statement in USERS_TABLE_DDL {
        match db.execute(*statement).await {
            Ok(_) => {}
            Err(e) if lost_ddl_race(&e) => debug!("users table DDL raced another instance: {e}"),
            Err(e) => return Err(Error::Database(e.into())),
        }
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM metadata.users WHERE username = $1 OR email = $2)")
        .bind(BOOTSTRAP_ADMIN_USERNAME)
        .bind(BOOTSTRAP_ADMIN_EMAIL)
        .fetch_one(db)
        .await?;
    if exists {
        debug!("bootstrap admin already present");
        return Ok(AdminSeed::AlreadyPresent);
    }

    let password_hash = password::hash_password_blocking(admin_password.to_string(), bcrypt_cost).await?;

    let inserted = sqlx::query(
        "INSERT INTO metadata.users (username, email, password_hash, role, active)
         VALUES ($1, $2, $3, 'admin', TRUE)
         ON CONFLICT DO NOTHING",
    )
    .bind(BOOTSTRAP_ADMIN_USERNAME)
    .bind(BOOTSTRAP_ADMIN_EMAIL)
    .bind(password_hash)
    .execute(db)
    .await
    .map_err(DbError::from);

    match inserted {
        Ok(result) if result.rows_affected() == 1 => {
            info!("created bootstrap admin account {BOOTSTRAP_ADMIN_USERNAME}");
            Ok(AdminSeed::Created)
        }
        Ok(_) => Ok(AdminSeed::AlreadyPresent),
        Err(e) if e.is_unique_violation() => Ok(AdminSeed::AlreadyPresent),
        Err(e) => Err(e.into()),
    }
}

/// Readiness gate for everything that reads `metadata.users`.
#[derive(Clone)]
pub struct UsersTable {
    db: PgPool,
    admin_password: Arc<str>,
    bcrypt_cost: u32,
    ready: Arc<OnceCell<()>>,
}

impl UsersTable {
    pub fn new(db: PgPool, admin_password: &str, bcrypt_cost: u32) -> Self {
        Self {
            db,
            admin_password: Arc::from(admin_password),
            bcrypt_cost,
            ready: Arc::new(OnceCell::new()),
        }
    }

    /// Wait until the users table exists, running bootstrap if nobody has yet.
    pub async fn ensure(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                initialize_users_table(&self.db, &self.admin_password, self.bcrypt_cost)
                    .await
                    .map(|_| ())
            })
            .await
            .map(|_| ())
            .map_err(|e| {
                error!("users table initialization failed: {e:#}");
                Error::ServiceUnavailable {
                    message: "User store is not ready, please retry shortly".to_string(),
                }
            })
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }
}
