//! Credential checks: login and self-service password change.

use sqlx::PgPool;
use tracing::{debug, info, instrument};

use crate::{
    api::models::users::{CurrentUser, UserResponse},
    auth::{password, session},
    config::Config,
    db::{
        handlers::{Repository, Users},
        models::users::UserUpdateDBRequest,
    },
    errors::{Error, Result},
    types::UserId,
};

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";
pub const INACTIVE_ACCOUNT_MESSAGE: &str = "User account is inactive";
pub const WRONG_CURRENT_PASSWORD_MESSAGE: &str = "Current password is incorrect";

/// A freshly authenticated user and the token that proves it.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserResponse,
    pub token: String,
}

fn rejected(message: &str) -> Error {
    Error::Unauthenticated {
        message: Some(message.to_string()),
    }
}

/// Check a username-or-email and password, and issue a session token on success.
#[instrument(skip(db, config, password), err)]
pub async fn authenticate_user(db: &PgPool, config: &Config, identifier: &str, password: &str) -> Result<Session> {
    let mut conn = db.acquire().await?;
    let mut users = Users::new(&mut conn);

    let Some(user) = users.get_by_identifier(identifier.trim()).await? else {
        debug!("no user matches login identifier");
        return Err(rejected(INVALID_CREDENTIALS_MESSAGE));
    };

    if !user.active {
        return Err(rejected(INACTIVE_ACCOUNT_MESSAGE));
    }

    if !password::verify_password_blocking(password.to_string(), user.password_hash.clone()).await? {
        debug!(user_id = user.id, "password mismatch");
        return Err(rejected(INVALID_CREDENTIALS_MESSAGE));
    }

    users.record_login(user.id).await?;
    let user = users.get_by_id(user.id).await?.ok_or_else(|| rejected(INVALID_CREDENTIALS_MESSAGE))?;

    let current = CurrentUser {
        id: user.id,
        username: user.username.clone(),
        role: user.role,
    };
    let token = session::create_session_token(&current, config)?;
    info!(user_id = user.id, "user logged in");

    Ok(Session {
        user: user.into(),
        token,
    })
}

/// Replace a user's password after verifying the current one.
///
/// A wrong current password is a 400, not a 401: the caller's session is fine, only the form
/// input is wrong.
#[instrument(skip(db, config, current_password, new_password), err)]
pub async fn change_password(
    db: &PgPool,
    config: &Config,
    user_id: UserId,
    current_password: &str,
    new_password: &str,
) -> Result<()> {
    let mut conn = db.acquire().await?;
    let mut users = Users::new(&mut conn);

    let user = users.get_by_id(user_id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: user_id.to_string(),
    })?;

    if !password::verify_password_blocking(current_password.to_string(), user.password_hash).await? {
        return Err(Error::BadRequest {
            message: WRONG_CURRENT_PASSWORD_MESSAGE.to_string(),
        });
    }

    password::validate_password(new_password, &config.auth.password)?;
    let hash = password::hash_password_blocking(new_password.to_string(), config.auth.bcrypt_cost).await?;
    users.update(user_id, &UserUpdateDBRequest::password(hash)).await?;
    info!(user_id, "password changed");

    Ok(())
}
