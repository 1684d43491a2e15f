//! Common utilities shared by the casting API and its test tooling.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for bearer-token envelope helpers (size limits, header decoding, iat checks)
pub mod jwt;
