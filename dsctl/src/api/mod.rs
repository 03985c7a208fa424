//! API layer for HTTP request handling and data models.
//!
//! - **[`extract`]**: `Json`, `Query` and `Path` extractors that reject with the JSON error body
//! - **[`handlers`]**: Axum route handlers for every endpoint
//! - **[`models`]**: Request/response data structures
//! - **[`validation`]**: Input checks shared by the handlers
//!
//! # API Structure
//!
//! - **Authentication** (`/api/auth/*`): login, logout, current user, password change
//! - **Users** (`/api/auth/users/*`): admin user management
//! - **Catalog** (`/api/catalog/*`): replicated tables and their sync status
//! - **Locks** (`/api/locks/*`): sync engine locks
//! - **Config** (`/api/config/*`): sync engine key/value settings
//! - **Governance** (`/api/governance-catalog-{mariadb,mssql,oracle}`): per-engine table health
//! - **Maintenance** (`/api/maintenance/*`): scheduled maintenance tasks
//! - **Logs** (`/api/logs/*`): sync engine logs
//! - **Uploads** (`/api/uploads/csv`): CSV file intake
//!
//! API documentation is served at `/docs`, with the raw document at `/api-docs/openapi.json`.

pub mod extract;
pub mod handlers;
pub mod models;
pub mod validation;
