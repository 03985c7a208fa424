//! HTTP request handlers for all API endpoints.
//!
//! Handlers follow one shape: extract and validate input, check the caller's role with
//! [`crate::auth::roles::RequiresRole`], call a repository from [`crate::db::handlers`], and
//! map the result onto an API model.
//!
//! Every `/api` route except login and health sits behind
//! [`crate::auth::middleware::require_auth`].

pub mod auth;
pub mod catalog;
pub mod config;
pub mod governance;
pub mod health;
pub mod locks;
pub mod logs;
pub mod maintenance;
pub mod uploads;
pub mod users;
