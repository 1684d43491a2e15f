//! Token authentication and permission checks.
//!
//! # Components
//!
//! - `keyset` - JWKS fetching and the coalescing key-set cache
//! - `jwt` - Token verification against cached keys
//! - `claims` - Verified claim set handed to handlers
//! - `permissions` - Route permissions and the permission gate

pub mod claims;
pub mod jwt;
pub mod keyset;
pub mod permissions;

pub use claims::ClaimSet;
pub use jwt::{TokenVerifier, VerificationError, VerifierSettings};
pub use keyset::{KeySetCache, KeySetError};
pub use permissions::{authorize, Denied, Permission};
