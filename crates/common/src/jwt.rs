//! Bearer-token envelope helpers.
//!
//! Everything in this module operates on the *unverified* compact JWS form of a
//! token: `base64url(header).base64url(payload).base64url(signature)`. Nothing
//! here checks a signature. Callers use it to reject garbage cheaply and to
//! select a verification key before doing any cryptography.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - The decoded header is untrusted and must only be used for key selection
//! - Error messages are generic; details go to debug-level logs
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_header, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! let header = decode_header(token)?;
//! let kid = header.kid.as_deref().ok_or(...)?;
//! // ... resolve key, verify signature ...
//! validate_iat(iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed token size in bytes (8KB).
///
/// Tokens larger than this are rejected before any base64 decoding or
/// signature work. Identity-provider access tokens with a few dozen
/// permissions are well under 2KB.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default clock skew tolerance for the `iat` claim (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Upper bound for a configured clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while inspecting a token envelope.
///
/// All variants share one display text so nothing about the failure reaches
/// the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtEnvelopeError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Not three segments, bad base64url, or a header that is not a JSON object
    /// with a string `alg`.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// `iat` lies further in the future than the clock skew allows.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Header
// =============================================================================

/// Unverified JOSE header of a compact token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Declared signing algorithm, exactly as written in the header.
    pub alg: String,

    /// Key identifier. Empty strings are normalized to `None`.
    #[serde(default)]
    pub kid: Option<String>,

    /// Media type, usually `JWT`.
    #[serde(default)]
    pub typ: Option<String>,
}

/// The three raw segments of a compact token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSegments<'a> {
    pub header: &'a str,
    pub payload: &'a str,
    pub signature: &'a str,
}

/// Split a compact token into its three segments.
///
/// # Errors
///
/// - `TokenTooLarge` if the token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` if the token is empty, does not have exactly three
///   segments, or the header segment is empty
pub fn split_token(token: &str) -> Result<TokenSegments<'_>, JwtEnvelopeError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtEnvelopeError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: not a three-segment JWS");
        return Err(JwtEnvelopeError::MalformedToken);
    };

    if header.is_empty() {
        return Err(JwtEnvelopeError::MalformedToken);
    }

    Ok(TokenSegments {
        header,
        payload,
        signature,
    })
}

/// Decode the header of a compact token without verifying anything.
///
/// # Errors
///
/// Returns `TokenTooLarge` or `MalformedToken`; see [`split_token`]. Bad
/// base64url, non-JSON headers and headers without a string `alg` are
/// `MalformedToken`.
pub fn decode_header(token: &str) -> Result<TokenHeader, JwtEnvelopeError> {
    let segments = split_token(token)?;

    let header_bytes = URL_SAFE_NO_PAD.decode(segments.header).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtEnvelopeError::MalformedToken
    })?;

    let mut header: TokenHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtEnvelopeError::MalformedToken
    })?;

    if header.kid.as_deref().is_some_and(str::is_empty) {
        header.kid = None;
    }

    Ok(header)
}

// =============================================================================
// Claims helpers
// =============================================================================

/// Validate the `iat` (issued-at) claim against the wall clock.
///
/// # Errors
///
/// Returns `IatTooFarInFuture` when `iat` is more than `clock_skew` ahead of now.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtEnvelopeError> {
    validate_iat_at(iat, clock_skew, chrono::Utc::now().timestamp())
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
///
/// # Errors
///
/// Returns `IatTooFarInFuture` when `iat > now + clock_skew`.
pub fn validate_iat_at(iat: i64, clock_skew: Duration, now: i64) -> Result<(), JwtEnvelopeError> {
    // clock_skew is bounded by MAX_CLOCK_SKEW in configuration
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtEnvelopeError::IatTooFarInFuture);
    }

    Ok(())
}

/// Decode a base64url (unpadded) JWK member such as `n`, `e` or `x`.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the value is not valid base64url.
pub fn decode_jwk_base64url(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(value)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    fn token_with_header(header: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        format!("{header_b64}.payload.signature")
    }

    #[test]
    fn test_constants() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
        assert_eq!(MAX_CLOCK_SKEW, Duration::from_secs(600));
    }

    // -------------------------------------------------------------------------
    // split_token
    // -------------------------------------------------------------------------

    #[test]
    fn test_split_token_three_segments() {
        let segments = split_token("aaa.bbb.ccc").unwrap();
        assert_eq!(segments.header, "aaa");
        assert_eq!(segments.payload, "bbb");
        assert_eq!(segments.signature, "ccc");
    }

    #[test]
    fn test_split_token_rejects_wrong_segment_counts() {
        assert_eq!(split_token(""), Err(JwtEnvelopeError::MalformedToken));
        assert_eq!(split_token("single"), Err(JwtEnvelopeError::MalformedToken));
        assert_eq!(split_token("only.two"), Err(JwtEnvelopeError::MalformedToken));
        assert_eq!(
            split_token("not.a.valid.jwt"),
            Err(JwtEnvelopeError::MalformedToken)
        );
    }

    #[test]
    fn test_split_token_rejects_empty_header() {
        assert_eq!(
            split_token(".payload.signature"),
            Err(JwtEnvelopeError::MalformedToken)
        );
    }

    #[test]
    fn test_split_token_oversized() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(split_token(&oversized), Err(JwtEnvelopeError::TokenTooLarge));
    }

    #[test]
    fn test_split_token_at_size_limit() {
        let remaining = MAX_JWT_SIZE_BYTES - 2 - 3;
        let token = format!("aaa.{}.", "b".repeat(remaining));
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);
        assert!(split_token(&token).is_ok());
    }

    // -------------------------------------------------------------------------
    // decode_header
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_header_valid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"key-01"}"#);
        let header = decode_header(&token).unwrap();

        assert_eq!(header.alg, "RS256");
        assert_eq!(header.kid.as_deref(), Some("key-01"));
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_decode_header_without_kid() {
        let token = token_with_header(r#"{"alg":"RS256"}"#);
        let header = decode_header(&token).unwrap();
        assert!(header.kid.is_none());
    }

    #[test]
    fn test_decode_header_empty_kid_is_absent() {
        let token = token_with_header(r#"{"alg":"RS256","kid":""}"#);
        let header = decode_header(&token).unwrap();
        assert!(header.kid.is_none());
    }

    #[test]
    fn test_decode_header_keeps_unknown_algorithms_verbatim() {
        let token = token_with_header(r#"{"alg":"none","kid":"k"}"#);
        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, "none");
    }

    #[test]
    fn test_decode_header_rejects_missing_alg() {
        let token = token_with_header(r#"{"typ":"JWT","kid":"k"}"#);
        assert_eq!(decode_header(&token), Err(JwtEnvelopeError::MalformedToken));
    }

    #[test]
    fn test_decode_header_rejects_numeric_kid() {
        let token = token_with_header(r#"{"alg":"RS256","kid":12345}"#);
        assert_eq!(decode_header(&token), Err(JwtEnvelopeError::MalformedToken));
    }

    #[test]
    fn test_decode_header_rejects_invalid_base64() {
        assert_eq!(
            decode_header("!!!invalid!!!.payload.signature"),
            Err(JwtEnvelopeError::MalformedToken)
        );
    }

    #[test]
    fn test_decode_header_rejects_invalid_json() {
        let token = token_with_header("not-json");
        assert_eq!(decode_header(&token), Err(JwtEnvelopeError::MalformedToken));
    }

    // -------------------------------------------------------------------------
    // validate_iat
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_past_and_present() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
        assert!(validate_iat(now - 3600, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_boundary() {
        let now = 1_700_000_000_i64;

        assert!(validate_iat_at(now + 300, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert_eq!(
            validate_iat_at(now + 301, DEFAULT_CLOCK_SKEW, now),
            Err(JwtEnvelopeError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_validate_iat_far_future() {
        let far_future = chrono::Utc::now().timestamp() + 86400;
        assert_eq!(
            validate_iat(far_future, DEFAULT_CLOCK_SKEW),
            Err(JwtEnvelopeError::IatTooFarInFuture)
        );
    }

    // -------------------------------------------------------------------------
    // decode_jwk_base64url
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_jwk_base64url() {
        // "AQAB" is the conventional RSA public exponent 65537
        assert_eq!(decode_jwk_base64url("AQAB").unwrap(), vec![1, 0, 1]);
        assert!(decode_jwk_base64url("!!!").is_err());
    }
}
