//! Middleware for the Casting API.
//!
//! # Components
//!
//! - `auth` - Bearer-token authorization for protected routes
//! - `http_metrics` - HTTP metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_permission, AuthState, PermissionGuard};
pub use http_metrics::http_metrics_middleware;
