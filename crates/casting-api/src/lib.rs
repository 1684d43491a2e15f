//! Casting API Service Library
//!
//! A movies and actors catalog whose every resource route is gated on a
//! permission carried in a bearer token issued by an external identity
//! provider:
//!
//! - Key-set cache over the issuer's JWKS endpoint (coalesced refresh on miss)
//! - Token verification (signature, expiry, issuer, audience)
//! - Per-route permission gate
//! - Movie and actor CRUD over Postgres
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> handlers/*.rs -> repositories/*.rs
//!                        |
//!                  auth/jwt.rs -> auth/keyset.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Key-set cache, token verifier, claim set, permission gate
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authorization and HTTP metrics middleware
//! - `models` - Rows, payloads and validation
//! - `observability` - Prometheus metrics
//! - `repositories` - Catalog storage (Postgres and in-memory)
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
