//! Observability for the Casting API.
//!
//! Provides metric definitions recorded by the auth layer and HTTP middleware.

pub mod metrics;
