//! Role gates as extractors.
//!
//! A handler states who may call it in its signature:
//!
//! ```ignore
//! async fn delete_lock(RequiresRole(user, _): RequiresRole<Admin>, ...) -> Result<...>
//! ```
//!
//! The extractor reads the caller attached by the auth middleware, answers 401 when there is
//! none and 403 when the caller's role is not in the set.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    errors::{Error, Result},
};

/// A fixed set of roles allowed through a [`RequiresRole`] gate.
pub trait RoleSet: Send + Sync + 'static {
    const ALLOWED: &'static [Role];

    fn allows(role: Role) -> bool {
        Self::ALLOWED.contains(&role)
    }
}

/// Administrators only.
pub struct Admin;

/// Roles that may change data: admins and regular users.
pub struct Writer;

/// Every authenticated role.
pub struct Reader;

impl RoleSet for Admin {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

impl RoleSet for Writer {
    const ALLOWED: &'static [Role] = &[Role::Admin, Role::User];
}

impl RoleSet for Reader {
    const ALLOWED: &'static [Role] = &Role::ALL;
}

/// The authenticated caller, checked against the role set `R`.
pub struct RequiresRole<R: RoleSet>(pub CurrentUser, pub PhantomData<R>);

impl<R: RoleSet> RequiresRole<R> {
    pub fn check(user: CurrentUser) -> Result<Self> {
        if R::allows(user.role) {
            Ok(Self(user, PhantomData))
        } else {
            Err(Error::InsufficientPermissions {
                role: user.role,
                allowed: R::ALLOWED,
            })
        }
    }

    pub fn user(&self) -> &CurrentUser {
        &self.0
    }

    pub fn into_inner(self) -> CurrentUser {
        self.0
    }
}

impl<R: RoleSet> FromRequestParts<AppState> for RequiresRole<R> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        Self::check(user)
    }
}
