//! Extractor for the caller attached by [`require_auth`](crate::auth::middleware::require_auth).

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::instrument;

use crate::{
    AppState,
    api::models::users::CurrentUser,
    errors::{Error, Result},
};

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self> {
        // Routes mounted outside the gate never see a user; treat that as unauthenticated
        // rather than a server fault.
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(Error::Unauthenticated { message: None })
    }
}
