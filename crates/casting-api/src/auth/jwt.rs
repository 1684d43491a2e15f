//! Bearer-token verification.
//!
//! Verifies tokens issued by the identity provider against keys from the
//! [`KeySetCache`] and produces a [`ClaimSet`].
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Exactly one algorithm is accepted; `none` and HMAC never are
//! - The key's type must match the accepted algorithm
//! - `exp` must be strictly in the future; `iss` must match exactly; `aud` must
//!   contain the configured audience; `iat` may not exceed the clock skew
//! - Rejection reasons are logged at debug level; the token itself never is

use crate::auth::claims::ClaimSet;
use crate::auth::keyset::{KeySetCache, KeySetError};
use crate::observability::metrics::record_token_validation;
use common::jwt::{decode_header, validate_iat_at};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::instrument;

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("token is malformed")]
    Malformed,

    #[error("token algorithm is not accepted")]
    UnsupportedAlgorithm,

    #[error("token header has no key identifier")]
    MissingKeyId,

    #[error("token signing key is unknown")]
    UnknownKey,

    #[error("signing keys are unavailable")]
    KeySetUnavailable,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token issuer is not trusted")]
    InvalidIssuer,

    #[error("token audience does not match")]
    InvalidAudience,

    #[error("token was issued in the future")]
    IssuedInFuture,
}

impl VerificationError {
    /// Bounded label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            VerificationError::Malformed => "malformed",
            VerificationError::UnsupportedAlgorithm => "unsupported_algorithm",
            VerificationError::MissingKeyId => "missing_key_id",
            VerificationError::UnknownKey => "unknown_key",
            VerificationError::KeySetUnavailable => "key_set_unavailable",
            VerificationError::InvalidSignature => "invalid_signature",
            VerificationError::Expired => "expired",
            VerificationError::InvalidIssuer => "invalid_issuer",
            VerificationError::InvalidAudience => "invalid_audience",
            VerificationError::IssuedInFuture => "issued_in_future",
        }
    }
}

/// Verification policy, fixed at startup.
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    /// The single accepted signing algorithm.
    pub algorithm: Algorithm,

    /// Expected `iss`, compared exactly.
    pub issuer: String,

    /// Audience that must appear in `aud`.
    pub audience: String,

    /// Name of the claim carrying granted permissions.
    pub permissions_claim: String,

    /// Tolerance for `iat` values ahead of the local clock.
    pub clock_skew_seconds: u64,
}

/// Header-level algorithm name, as it appears in the `alg` member.
pub fn algorithm_name(algorithm: Algorithm) -> &'static str {
    match algorithm {
        Algorithm::HS256 => "HS256",
        Algorithm::HS384 => "HS384",
        Algorithm::HS512 => "HS512",
        Algorithm::ES256 => "ES256",
        Algorithm::ES384 => "ES384",
        Algorithm::RS256 => "RS256",
        Algorithm::RS384 => "RS384",
        Algorithm::RS512 => "RS512",
        Algorithm::PS256 => "PS256",
        Algorithm::PS384 => "PS384",
        Algorithm::PS512 => "PS512",
        Algorithm::EdDSA => "EdDSA",
    }
}

/// Verifies bearer tokens and extracts their claims.
pub struct TokenVerifier {
    key_set: Arc<KeySetCache>,
    settings: VerifierSettings,
}

impl TokenVerifier {
    pub fn new(key_set: Arc<KeySetCache>, settings: VerifierSettings) -> Self {
        Self { key_set, settings }
    }

    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    pub fn key_set(&self) -> &Arc<KeySetCache> {
        &self.key_set
    }

    /// Verify a token against the current time.
    ///
    /// # Errors
    ///
    /// Returns the first check that failed; see [`TokenVerifier::verify_at`].
    pub async fn verify(&self, raw_token: &str) -> Result<ClaimSet, VerificationError> {
        self.verify_at(raw_token, chrono::Utc::now().timestamp())
            .await
    }

    /// Verify a token as of `now` (Unix epoch seconds).
    ///
    /// # Checks, in order
    ///
    /// 1. Envelope: size limit, three segments, decodable header
    /// 2. Header `alg` equals the configured algorithm
    /// 3. Header carries a `kid`
    /// 4. The key set resolves the `kid`
    /// 5. The key can verify the configured algorithm
    /// 6. Signature
    /// 7. `exp`, `iss`, `aud`, `iat`, permissions
    ///
    /// # Errors
    ///
    /// One [`VerificationError`] kind per failed check.
    #[instrument(skip_all)]
    pub async fn verify_at(
        &self,
        raw_token: &str,
        now: i64,
    ) -> Result<ClaimSet, VerificationError> {
        let start = Instant::now();
        let result = self.run_checks(raw_token, now).await;

        match &result {
            Ok(_) => {
                tracing::debug!(target: "casting.auth.jwt", "Token validated successfully");
                record_token_validation("success", start.elapsed());
            }
            Err(e) => {
                tracing::debug!(target: "casting.auth.jwt", reason = e.as_label(), "Token rejected");
                record_token_validation(e.as_label(), start.elapsed());
            }
        }

        result
    }

    async fn run_checks(&self, raw_token: &str, now: i64) -> Result<ClaimSet, VerificationError> {
        let algorithm = self.settings.algorithm;

        let header = decode_header(raw_token).map_err(|e| {
            tracing::debug!(target: "casting.auth.jwt", error = ?e, "Token envelope rejected");
            VerificationError::Malformed
        })?;

        if header.alg != algorithm_name(algorithm) {
            tracing::debug!(
                target: "casting.auth.jwt",
                alg = %header.alg,
                "Token algorithm not accepted"
            );
            return Err(VerificationError::UnsupportedAlgorithm);
        }

        let kid = header.kid.ok_or(VerificationError::MissingKeyId)?;

        let key = self.key_set.resolve(&kid).await.map_err(|e| match e {
            KeySetError::NotFound => VerificationError::UnknownKey,
            KeySetError::FetchFailed(_) => VerificationError::KeySetUnavailable,
        })?;

        if !key.key_type().supports(algorithm) || key.algorithm().is_some_and(|a| a != algorithm)
        {
            tracing::warn!(
                target: "casting.auth.jwt",
                kid = %kid,
                key_type = ?key.key_type(),
                "Signing key cannot verify the accepted algorithm"
            );
            return Err(VerificationError::UnsupportedAlgorithm);
        }

        // Signature only; every claim is checked below against `now`.
        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let token_data = decode::<Map<String, Value>>(raw_token, key.decoding_key(), &validation)
            .map_err(|e| {
                tracing::debug!(target: "casting.auth.jwt", error = %e, "Token verification failed");
                match e.kind() {
                    ErrorKind::InvalidSignature => VerificationError::InvalidSignature,
                    ErrorKind::InvalidAlgorithm => VerificationError::UnsupportedAlgorithm,
                    ErrorKind::InvalidToken
                    | ErrorKind::Base64(_)
                    | ErrorKind::Json(_)
                    | ErrorKind::Utf8(_) => VerificationError::Malformed,
                    _ => VerificationError::InvalidSignature,
                }
            })?;

        self.validate_claims(token_data.claims, now)
    }

    /// Check the payload of a token whose signature already verified.
    fn validate_claims(
        &self,
        payload: Map<String, Value>,
        now: i64,
    ) -> Result<ClaimSet, VerificationError> {
        let expiry = match payload.get("exp") {
            Some(value) => numeric_date(value)?,
            None => {
                tracing::debug!(target: "casting.auth.jwt", "Token has no exp claim");
                return Err(VerificationError::Malformed);
            }
        };
        if expiry <= now {
            return Err(VerificationError::Expired);
        }

        let issuer = payload.get("iss").and_then(Value::as_str);
        if issuer != Some(self.settings.issuer.as_str()) {
            return Err(VerificationError::InvalidIssuer);
        }
        let issuer = self.settings.issuer.clone();

        let audience = audience_list(payload.get("aud"))?;
        if !audience.iter().any(|aud| *aud == self.settings.audience) {
            return Err(VerificationError::InvalidAudience);
        }

        let issued_at = match payload.get("iat") {
            Some(value) => {
                let iat = numeric_date(value)?;
                validate_iat_at(iat, Duration::from_secs(self.settings.clock_skew_seconds), now)
                    .map_err(|_| VerificationError::IssuedInFuture)?;
                Some(iat)
            }
            None => None,
        };

        let subject = match payload.get("sub") {
            Some(Value::String(sub)) => sub.clone(),
            None => String::new(),
            Some(_) => return Err(VerificationError::Malformed),
        };

        let permissions = permission_set(payload.get(&self.settings.permissions_claim))?;

        Ok(ClaimSet::new(
            issuer,
            audience,
            subject,
            expiry,
            issued_at,
            permissions,
            payload,
        ))
    }
}

/// JWT NumericDate: integral seconds; fractional values are truncated.
fn numeric_date(value: &Value) -> Result<i64, VerificationError> {
    if let Some(seconds) = value.as_i64() {
        return Ok(seconds);
    }
    match value.as_f64() {
        #[allow(clippy::cast_possible_truncation)]
        Some(seconds) if seconds.is_finite() => Ok(seconds.trunc() as i64),
        _ => Err(VerificationError::Malformed),
    }
}

/// `aud` may be a single string or an array of strings.
fn audience_list(value: Option<&Value>) -> Result<Vec<String>, VerificationError> {
    match value {
        Some(Value::String(aud)) => Ok(vec![aud.clone()]),
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or(VerificationError::InvalidAudience)
            })
            .collect(),
        _ => Err(VerificationError::InvalidAudience),
    }
}

/// Permissions may be an array of strings or one space-delimited string.
fn permission_set(value: Option<&Value>) -> Result<BTreeSet<String>, VerificationError> {
    match value {
        None | Some(Value::Null) => Ok(BTreeSet::new()),
        Some(Value::String(joined)) => Ok(joined.split_whitespace().map(str::to_string).collect()),
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or(VerificationError::Malformed)
            })
            .collect(),
        Some(_) => Err(VerificationError::Malformed),
    }
}
