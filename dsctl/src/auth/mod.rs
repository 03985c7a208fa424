//! Authentication and authorization.
//!
//! Users log in at `/api/auth/login` with a username or email and receive a signed session
//! token. Every other `/api` route, apart from the health check, requires that token as
//! `Authorization: Bearer <token>`.
//!
//! - [`bootstrap`]: creates `metadata.users` and seeds the `ADMIN` account
//! - [`credentials`]: login and password change
//! - [`middleware`]: the global token gate
//! - [`current_user`] and [`roles`]: extractors for handlers
//! - [`password`]: bcrypt hashing on the blocking pool
//! - [`session`]: JWT issue and verification

pub mod bootstrap;
pub mod credentials;
pub mod current_user;
pub mod middleware;
pub mod password;
pub mod roles;
pub mod session;
