//! Repository layer for the Casting API.
//!
//! Handlers depend on the [`CatalogRepository`] trait. Production uses the
//! Postgres implementation; tests and the harness use the in-memory one.

pub mod catalog;
pub mod postgres;

pub use catalog::{CatalogRepository, InMemoryCatalogRepository};
pub use postgres::PgCatalogRepository;
