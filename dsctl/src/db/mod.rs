//! Database layer over the `metadata` schema.
//!
//! ```text
//! handlers (api)  ->  db::handlers (repositories)  ->  db::models  ->  PostgreSQL
//! ```
//!
//! Every repository wraps a `&mut PgConnection` and builds its SQL at runtime with bound
//! parameters. Identifiers that end up in SQL text (sort columns, governance table names) come
//! only from fixed allow-lists.
//!
//! - [`handlers`]: repositories, one per table
//! - [`models`]: row types and write requests
//! - [`errors`]: [`errors::DbError`], a classification of `sqlx::Error`

pub mod errors;
pub mod handlers;
pub mod models;
