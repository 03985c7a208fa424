//! Repository implementations for database access.
//!
//! - [`Users`]: console accounts (implements [`Repository`])
//! - [`config::ConfigEntries`]: sync engine settings (implements [`Repository`])
//! - [`catalog::Catalog`], [`locks::Locks`], [`governance::Governance`],
//!   [`maintenance::Maintenance`], [`logs::Logs`]: views over tables the sync engine owns,
//!   with the few write operations operators need
//!
//! ```ignore
//! let mut conn = state.db.acquire().await?;
//! let mut repo = Users::new(&mut conn);
//! let user = repo.get_by_id(id).await?;
//! ```

pub mod catalog;
pub mod config;
pub mod governance;
pub mod locks;
pub mod logs;
pub mod maintenance;
pub mod repository;
pub mod users;

pub use repository::Repository;
pub use users::Users;
