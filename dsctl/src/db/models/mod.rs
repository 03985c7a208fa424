//! Database record models matching table schemas.
//!
//! Rows derive `sqlx::FromRow` and are converted into API models at the handler boundary, so
//! the storage layout can change without touching the JSON contract.

use sqlx::FromRow;

pub mod catalog;
pub mod config;
pub mod governance;
pub mod locks;
pub mod logs;
pub mod maintenance;
pub mod users;

/// A `GROUP BY` bucket: some column value and how many rows carry it.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct GroupCount {
    pub key: String,
    pub count: i64,
}
