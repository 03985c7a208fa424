//! The global bearer-token gate in front of `/api`.

use axum::{
    extract::{Request, State},
    http::{Method, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::trace;

use crate::{AppState, auth::session, errors::Error};

/// Paths reachable without a token.
pub const PUBLIC_PATHS: &[&str] = &["/api/auth/login", "/api/health"];

/// Canonical form used for every path comparison: query dropped, trailing slashes trimmed,
/// ASCII lowercased. `/` stays `/`.
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

/// Allow-list of unauthenticated paths, compared after [`normalize_path`].
#[derive(Debug, Clone)]
pub struct PublicPaths {
    paths: Vec<String>,
}

impl PublicPaths {
    pub fn new<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            paths: paths.into_iter().map(normalize_path).collect(),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.paths.iter().any(|p| *p == path)
    }

    /// Whether a path needs a token: it is under `/api` and not on the allow-list.
    pub fn requires_auth(&self, path: &str) -> bool {
        let normalized = normalize_path(path);
        let under_api = normalized == "/api" || normalized.starts_with("/api/");
        under_api && !self.paths.iter().any(|p| *p == normalized)
    }
}

impl Default for PublicPaths {
    fn default() -> Self {
        Self::new(PUBLIC_PATHS.iter().copied())
    }
}

fn bearer_token(request: &Request) -> Result<&str, Error> {
    let header = request.headers().get(AUTHORIZATION).ok_or(Error::Unauthenticated { message: None })?;
    let value = header.to_str().map_err(|_| Error::Unauthenticated {
        message: Some(session::INVALID_TOKEN_MESSAGE.to_string()),
    })?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    token.ok_or(Error::Unauthenticated { message: None })
}

/// Reject unauthenticated `/api` requests and attach the caller to the request.
///
/// Preflight `OPTIONS` requests pass through so the CORS layer can answer them.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, Error> {
    if request.method() == Method::OPTIONS || !state.public_paths.requires_auth(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let user = session::verify_session_token(bearer_token(&request)?, &state.config)?;
    trace!(user_id = user.id, role = %user.role, "authenticated request");
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
