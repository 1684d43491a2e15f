//! Builder patterns for test token construction
//!
//! Provides a fluent API over the claims the Casting API verifies, plus
//! helpers for tokens no real issuer would produce (unsigned, HMAC-signed).

use crate::crypto_fixtures::{FixtureError, TestKeypair};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Issuer the test server trusts.
pub const TEST_ISSUER: &str = "https://casting.test/";

/// Audience the test server expects.
pub const TEST_AUDIENCE: &str = "casting";

/// Builder for test JWT claims
///
/// Defaults produce a token the test server accepts: trusted issuer and
/// audience, one hour until expiry, issued now, no permissions.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_subject("auth0|director")
///     .with_permissions(&["get:movies", "post:movie"])
///     .expires_in(600)
///     .sign(&keypair)?;
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    permissions_claim: String,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("aud".to_string(), json!(TEST_AUDIENCE));
        claims.insert("sub".to_string(), json!("auth0|test-subject"));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert("permissions".to_string(), json!([]));

        Self {
            claims,
            permissions_claim: "permissions".to_string(),
        }
    }

    pub fn issuer(self, issuer: &str) -> Self {
        self.claim("iss", json!(issuer))
    }

    pub fn audience(self, audience: &str) -> Self {
        self.claim("aud", json!(audience))
    }

    /// Set `aud` to an array.
    pub fn audiences(self, audiences: &[&str]) -> Self {
        self.claim("aud", json!(audiences))
    }

    pub fn for_subject(self, subject: &str) -> Self {
        self.claim("sub", json!(subject))
    }

    /// Grant permissions as a JSON array.
    pub fn with_permissions(self, permissions: &[&str]) -> Self {
        let name = self.permissions_claim.clone();
        self.claim(&name, json!(permissions))
    }

    /// Grant permissions as a space-delimited string (`scope` style).
    pub fn with_permission_string(self, permissions: &str) -> Self {
        let name = self.permissions_claim.clone();
        self.claim(&name, json!(permissions))
    }

    /// Move the permissions to a differently named claim.
    pub fn permissions_claim(mut self, name: &str) -> Self {
        if let Some(value) = self.claims.remove(&self.permissions_claim) {
            self.claims.insert(name.to_string(), value);
        }
        self.permissions_claim = name.to_string();
        self
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(self, seconds: i64) -> Self {
        self.claim("exp", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.claim("iat", json!(timestamp))
    }

    /// Set any claim, replacing a previous value.
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim (`exp`, `sub`, `permissions`, ...).
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Sign with `keypair` (EdDSA, `kid` set).
    pub fn sign(self, keypair: &TestKeypair) -> Result<String, FixtureError> {
        keypair.sign(&self.build())
    }

    /// Sign with `keypair` but leave `kid` out of the header.
    pub fn sign_without_kid(self, keypair: &TestKeypair) -> Result<String, FixtureError> {
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        keypair.sign_with_header(&header, &self.build())
    }

    /// Sign with a shared secret under HS256, claiming `kid`.
    pub fn sign_hs256(self, secret: &[u8], kid: &str) -> Result<String, FixtureError> {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(&header, &self.build(), &EncodingKey::from_secret(secret))
            .map_err(|e| FixtureError::Signing(e.to_string()))
    }

    /// `alg: none` token with an empty signature segment.
    pub fn unsigned(self, kid: &str) -> String {
        let header = json!({"alg": "none", "typ": "JWT", "kid": kid});
        format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(self.build().to_string())
        )
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let claims = TestTokenBuilder::new().build();

        assert_eq!(claims["iss"], TEST_ISSUER);
        assert_eq!(claims["aud"], TEST_AUDIENCE);
        assert_eq!(claims["sub"], "auth0|test-subject");
        assert_eq!(claims["permissions"], json!([]));
        assert!(claims["exp"].as_i64().unwrap() > Utc::now().timestamp());
    }

    #[test]
    fn test_builder_permissions_claim_rename() {
        let claims = TestTokenBuilder::new()
            .with_permissions(&["get:movies"])
            .permissions_claim("scope")
            .build();

        assert!(claims.get("permissions").is_none());
        assert_eq!(claims["scope"], json!(["get:movies"]));
    }

    #[test]
    fn test_builder_without_removes_claim() {
        let claims = TestTokenBuilder::new().without("exp").without("sub").build();

        assert!(claims.get("exp").is_none());
        assert!(claims.get("sub").is_none());
    }

    #[test]
    fn test_unsigned_token_shape() {
        let token = TestTokenBuilder::new().unsigned("test-key-01");

        assert_eq!(token.split('.').count(), 3);
        assert!(token.ends_with('.'));
        let header = jsonwebtoken::decode_header(&token);
        // `none` is not an algorithm jsonwebtoken will parse
        assert!(header.is_err());
    }

    #[test]
    fn test_hs256_token_header() {
        let token = TestTokenBuilder::new()
            .sign_hs256(b"shared-secret", "test-key-01")
            .unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.kid.as_deref(), Some("test-key-01"));
    }
}
