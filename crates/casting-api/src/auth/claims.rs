//! Verified claim set.
//!
//! A `ClaimSet` only exists as the output of a successful token verification.
//! Its fields are private to this crate so no other code can assemble one from
//! untrusted input. The `sub` value and the raw claim map are redacted in
//! Debug output to keep identities out of logs.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Claims of a token whose signature, expiry, issuer and audience checked out.
#[derive(Clone, PartialEq, Serialize)]
pub struct ClaimSet {
    pub(crate) issuer: String,
    pub(crate) audience: Vec<String>,
    pub(crate) subject: String,
    pub(crate) expiry: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) issued_at: Option<i64>,
    pub(crate) permissions: BTreeSet<String>,
    #[serde(skip)]
    pub(crate) raw: Map<String, Value>,
}

impl ClaimSet {
    pub(crate) fn new(
        issuer: String,
        audience: Vec<String>,
        subject: String,
        expiry: i64,
        issued_at: Option<i64>,
        permissions: BTreeSet<String>,
        raw: Map<String, Value>,
    ) -> Self {
        Self {
            issuer,
            audience,
            subject,
            expiry,
            issued_at,
            permissions,
            raw,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Audiences the token was issued for (a single-string `aud` becomes one entry).
    pub fn audience(&self) -> &[String] {
        &self.audience
    }

    /// Subject identifier. Empty when the token carried no `sub`.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Expiry as Unix epoch seconds.
    pub fn expiry(&self) -> i64 {
        self.expiry
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.issued_at
    }

    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Exact membership test; no wildcard or prefix matching.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// All payload claims, including the ones surfaced as typed fields.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// Look up an additional claim by name.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }
}

impl fmt::Debug for ClaimSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimSet")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("subject", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .field("issued_at", &self.issued_at)
            .field("permissions", &self.permissions)
            .field("raw", &format_args!("[{} claims]", self.raw.len()))
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;

    /// Build a claim set directly, for tests of code downstream of the verifier.
    pub(crate) fn claim_set_with(permissions: &[&str]) -> ClaimSet {
        let mut raw = Map::new();
        raw.insert("sub".to_string(), Value::from("auth0|casting-director"));
        raw.insert("email".to_string(), Value::from("director@example.com"));

        ClaimSet::new(
            "https://casting.example.com/".to_string(),
            vec!["casting".to_string()],
            "auth0|casting-director".to_string(),
            1_900_000_000,
            Some(1_700_000_000),
            permissions.iter().map(|p| (*p).to_string()).collect(),
            raw,
        )
    }

    #[test]
    fn test_claim_set_debug_redacts_subject_and_raw() {
        let claims = claim_set_with(&["get:movies"]);
        let debug_str = format!("{claims:?}");

        assert!(
            !debug_str.contains("casting-director"),
            "Debug output should not contain the subject"
        );
        assert!(
            !debug_str.contains("director@example.com"),
            "Debug output should not contain raw claims"
        );
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("[2 claims]"));
        assert!(debug_str.contains("get:movies"));
    }

    #[test]
    fn test_has_permission_is_exact() {
        let claims = claim_set_with(&["get:movies", "post:movie"]);

        assert!(claims.has_permission("get:movies"));
        assert!(claims.has_permission("post:movie"));
        assert!(!claims.has_permission("get:movie"));
        assert!(!claims.has_permission("get:*"));
        assert!(!claims.has_permission("GET:MOVIES"));
    }

    #[test]
    fn test_accessors() {
        let claims = claim_set_with(&[]);

        assert_eq!(claims.issuer(), "https://casting.example.com/");
        assert_eq!(claims.audience(), ["casting".to_string()]);
        assert_eq!(claims.subject(), "auth0|casting-director");
        assert_eq!(claims.expiry(), 1_900_000_000);
        assert_eq!(claims.issued_at(), Some(1_700_000_000));
        assert!(claims.permissions().is_empty());
        assert_eq!(
            claims.claim("email").and_then(Value::as_str),
            Some("director@example.com")
        );
        assert!(claims.claim("missing").is_none());
    }

    #[test]
    fn test_serialize_omits_raw() {
        let claims = claim_set_with(&["get:actors"]);
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["permissions"], serde_json::json!(["get:actors"]));
        assert_eq!(json["sub"], Value::Null);
        assert!(json.get("raw").is_none());
        assert_eq!(json["subject"], "auth0|casting-director");
    }
}
