//! # Casting Test Utilities
//!
//! Shared test utilities for the Casting API.
//!
//! This crate provides:
//! - Deterministic Ed25519 keypairs published as JWKs (`TestKeypair`)
//! - Claim builders for signed and deliberately broken tokens (`TestTokenBuilder`)
//! - Server test harness with a mocked JWKS endpoint (`TestCastingServer`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use casting_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestCastingServer::spawn().await?;
//!
//!     let token = TestTokenBuilder::new()
//!         .with_permissions(&["get:movies"])
//!         .sign(server.keypair())?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/movies", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
