//! lms-axum: axum adapter for lms-core.
//!
//! Resolves the tenant of every request from its headers, exposes
//! tenant-scoped CRUD routes over any [`lms_core::Repository`], and maps
//! [`lms_core::LmsError`] onto HTTP responses.

pub mod app;
mod error;
pub mod middlewares;
pub mod rest;
pub mod state;

pub use app::{axum, listen_addr, AxumApp};
pub use error::{BadRequest, LmsAxumError};
pub use middlewares::{resolve_tenant, CurrentTenant};
pub use state::RepositoryState;
