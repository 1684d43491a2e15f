//! Key-set cache for the identity provider's published signing keys.
//!
//! The cache fetches the issuer's JWKS document (`/.well-known/jwks.json`) on
//! demand and keeps the resulting keys in an immutable [`KeySet`] snapshot.
//!
//! # Refresh model
//!
//! - A lookup that hits the current snapshot never touches the network
//! - A miss triggers one fetch; the new snapshot replaces the old one by
//!   swapping an `Arc`, so readers never see a half-built set
//! - Concurrent misses coalesce onto a single fetch and all observe its
//!   outcome, including a fetch failure
//! - A failed fetch is not remembered beyond the callers that waited on it;
//!   the next miss fetches again
//!
//! There is no TTL. Key rotation is picked up when a token names a key
//! identifier the current snapshot does not contain.

use crate::observability::metrics::record_key_set_fetch;
use chrono::{DateTime, Utc};
use common::jwt::decode_jwk_base64url;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default timeout for a single JWKS fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Ed25519 public keys are always 32 bytes.
const ED25519_PUBLIC_KEY_LEN: usize = 32;

// =============================================================================
// Wire format
// =============================================================================

/// JSON Web Key as published in the JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type: `RSA`, `EC` or `OKP`.
    pub kty: String,

    /// Key ID, matched against the token header's `kid`.
    pub kid: String,

    /// Intended algorithm, if the issuer pins one.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use; only `sig` (or absent) keys are accepted.
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve name for `EC` and `OKP` keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// Public key (OKP) or x coordinate (EC), base64url.
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS document returned by the issuer.
///
/// Entries stay untyped until [`KeySet::from_document`] so that one malformed
/// key cannot reject the whole document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSetDocument {
    pub keys: Vec<serde_json::Value>,
}

// =============================================================================
// Verification keys
// =============================================================================

/// Key families a [`VerificationKey`] can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Rsa,
    EllipticCurve,
    OctetKeyPair,
}

impl KeyType {
    /// Whether tokens signed with `algorithm` can be verified by a key of
    /// this type.
    pub fn supports(self, algorithm: Algorithm) -> bool {
        match self {
            KeyType::Rsa => matches!(
                algorithm,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            KeyType::EllipticCurve => matches!(algorithm, Algorithm::ES256 | Algorithm::ES384),
            KeyType::OctetKeyPair => algorithm == Algorithm::EdDSA,
        }
    }
}

/// A public key ready for signature verification.
///
/// Immutable once built; a refresh replaces whole [`KeySet`]s rather than
/// individual keys.
#[derive(Clone)]
pub struct VerificationKey {
    key_identifier: String,
    algorithm: Option<Algorithm>,
    key_type: KeyType,
    decoding_key: DecodingKey,
}

impl VerificationKey {
    /// Build a verification key from a published JWK.
    ///
    /// # Errors
    ///
    /// Returns a short reason when the JWK is not a usable signing key.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, String> {
        if let Some(key_use) = jwk.key_use.as_deref() {
            if key_use != "sig" {
                return Err(format!("key use '{key_use}' is not 'sig'"));
            }
        }

        let algorithm = match jwk.alg.as_deref() {
            Some(alg) => Some(
                Algorithm::from_str(alg).map_err(|_| format!("unrecognized algorithm '{alg}'"))?,
            ),
            None => None,
        };

        let (key_type, decoding_key) = match jwk.kty.as_str() {
            "RSA" => {
                let n = jwk.n.as_deref().ok_or("RSA key missing 'n'")?;
                let e = jwk.e.as_deref().ok_or("RSA key missing 'e'")?;
                let key = DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| format!("invalid RSA components: {e}"))?;
                (KeyType::Rsa, key)
            }
            "EC" => {
                let x = jwk.x.as_deref().ok_or("EC key missing 'x'")?;
                let y = jwk.y.as_deref().ok_or("EC key missing 'y'")?;
                let key = DecodingKey::from_ec_components(x, y)
                    .map_err(|e| format!("invalid EC components: {e}"))?;
                (KeyType::EllipticCurve, key)
            }
            "OKP" => {
                if jwk.crv.as_deref() != Some("Ed25519") {
                    return Err("OKP key is not on curve Ed25519".to_string());
                }
                let x = jwk.x.as_deref().ok_or("OKP key missing 'x'")?;
                let raw = decode_jwk_base64url(x).map_err(|e| format!("invalid 'x': {e}"))?;
                if raw.len() != ED25519_PUBLIC_KEY_LEN {
                    return Err(format!("Ed25519 key has {} bytes", raw.len()));
                }
                (KeyType::OctetKeyPair, DecodingKey::from_ed_der(&raw))
            }
            other => return Err(format!("unsupported key type '{other}'")),
        };

        if let Some(alg) = algorithm {
            if !key_type.supports(alg) {
                return Err(format!("algorithm {alg:?} does not match key type"));
            }
        }

        Ok(Self {
            key_identifier: jwk.kid.clone(),
            algorithm,
            key_type,
            decoding_key,
        })
    }

    pub fn key_identifier(&self) -> &str {
        &self.key_identifier
    }

    /// Algorithm pinned by the JWK's `alg` member, if any.
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("key_identifier", &self.key_identifier)
            .field("algorithm", &self.algorithm)
            .field("key_type", &self.key_type)
            .finish_non_exhaustive()
    }
}

/// An immutable snapshot of the issuer's keys, at most one per key identifier.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: HashMap<String, Arc<VerificationKey>>,
    generation: u64,
    fetched_at: Option<DateTime<Utc>>,
}

impl KeySet {
    /// Build a key set from a JWKS document.
    ///
    /// Unusable keys are skipped with a warning. When two keys share a key
    /// identifier the first one wins.
    pub fn from_document(document: JwkSetDocument, generation: u64) -> Self {
        let mut keys = HashMap::with_capacity(document.keys.len());

        for entry in document.keys {
            let jwk = match serde_json::from_value::<Jwk>(entry) {
                Ok(jwk) => jwk,
                Err(e) => {
                    tracing::warn!(
                        target: "casting.auth.jwks",
                        reason = %e,
                        "Skipping unusable JWK"
                    );
                    continue;
                }
            };

            if keys.contains_key(&jwk.kid) {
                tracing::warn!(
                    target: "casting.auth.jwks",
                    kid = %jwk.kid,
                    "Duplicate key identifier in JWKS, keeping the first key"
                );
                continue;
            }

            match VerificationKey::from_jwk(&jwk) {
                Ok(key) => {
                    keys.insert(jwk.kid.clone(), Arc::new(key));
                }
                Err(reason) => {
                    tracing::warn!(
                        target: "casting.auth.jwks",
                        kid = %jwk.kid,
                        kty = %jwk.kty,
                        reason = %reason,
                        "Skipping unusable JWK"
                    );
                }
            }
        }

        Self {
            keys,
            generation,
            fetched_at: Some(Utc::now()),
        }
    }

    pub fn get(&self, kid: &str) -> Option<&Arc<VerificationKey>> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key identifiers in this snapshot, sorted.
    pub fn key_identifiers(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }

    /// Number of successful fetches that preceded this snapshot (0 = never fetched).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Key-set lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySetError {
    /// The key identifier is not in the key set, even after a refresh.
    #[error("signing key not found")]
    NotFound,

    /// The JWKS endpoint was unreachable, timed out, or returned garbage.
    #[error("key set fetch failed: {0}")]
    FetchFailed(String),
}

/// Bookkeeping guarded by the refresh lock.
#[derive(Default)]
struct RefreshState {
    /// Completed fetch attempts, successful or not.
    attempts: u64,

    /// Outcome of the most recent attempt; `None` when it succeeded.
    last_error: Option<KeySetError>,

    /// Successful fetches so far, used as the next snapshot's generation.
    successes: u64,
}

/// Process-wide cache of the issuer's verification keys.
///
/// Created once at startup and shared behind an `Arc` by the token verifier.
pub struct KeySetCache {
    jwks_url: String,
    http_client: reqwest::Client,
    current: RwLock<Arc<KeySet>>,
    refresh: Mutex<RefreshState>,
    /// Mirror of `RefreshState::attempts` readable without the lock.
    attempts: AtomicU64,
}

impl KeySetCache {
    /// Create an empty cache for the given JWKS URL.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - The issuer's JWKS endpoint
    /// * `fetch_timeout` - Upper bound for one fetch; a timeout is a fetch failure
    pub fn new(jwks_url: String, fetch_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "casting.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            current: RwLock::new(Arc::new(KeySet::default())),
            refresh: Mutex::new(RefreshState::default()),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Number of JWKS fetches attempted so far.
    pub fn fetch_count(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Current key-set snapshot.
    pub async fn snapshot(&self) -> Arc<KeySet> {
        Arc::clone(&*self.current.read().await)
    }

    /// Resolve a key identifier to a verification key.
    ///
    /// Hits are served from the current snapshot. A miss fetches the JWKS
    /// once (coalesced with any concurrent misses) and looks again.
    ///
    /// # Errors
    ///
    /// - `KeySetError::NotFound` if the key is absent after the refresh
    /// - `KeySetError::FetchFailed` if the refresh this call waited on failed
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve(&self, kid: &str) -> Result<Arc<VerificationKey>, KeySetError> {
        // Read the attempt counter before the snapshot: a refresh publishes its
        // snapshot before bumping the counter.
        let observed = self.attempts.load(Ordering::Acquire);

        if let Some(key) = self.snapshot().await.get(kid) {
            tracing::debug!(target: "casting.auth.jwks", kid = %kid, "JWKS cache hit");
            return Ok(Arc::clone(key));
        }

        tracing::debug!(target: "casting.auth.jwks", kid = %kid, "JWKS cache miss");

        {
            let mut state = self.refresh.lock().await;

            if state.attempts == observed {
                self.fetch_and_publish(&mut state).await;
            } else {
                tracing::debug!(
                    target: "casting.auth.jwks",
                    kid = %kid,
                    "Adopting result of concurrent JWKS refresh"
                );
            }

            if let Some(err) = &state.last_error {
                return Err(err.clone());
            }
        }

        match self.snapshot().await.get(kid) {
            Some(key) => Ok(Arc::clone(key)),
            None => {
                tracing::warn!(target: "casting.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
                Err(KeySetError::NotFound)
            }
        }
    }

    /// Force a fetch regardless of what the snapshot contains.
    ///
    /// Used to warm the cache at startup. Returns the number of usable keys.
    ///
    /// # Errors
    ///
    /// Returns `KeySetError::FetchFailed` if the fetch fails; the previous
    /// snapshot stays in place.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<usize, KeySetError> {
        let mut state = self.refresh.lock().await;
        self.fetch_and_publish(&mut state).await;

        match &state.last_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.snapshot().await.len()),
        }
    }

    /// Fetch, publish on success, and record the attempt. Caller holds the
    /// refresh lock.
    async fn fetch_and_publish(&self, state: &mut RefreshState) {
        let start = Instant::now();
        let outcome = self.fetch_document().await;

        match outcome {
            Ok(document) => {
                state.successes += 1;
                let key_set = KeySet::from_document(document, state.successes);

                tracing::info!(
                    target: "casting.auth.jwks",
                    key_count = key_set.len(),
                    generation = key_set.generation(),
                    "JWKS cache refreshed"
                );

                *self.current.write().await = Arc::new(key_set);
                state.last_error = None;
                record_key_set_fetch("success", start.elapsed());
            }
            Err(err) => {
                state.last_error = Some(err);
                record_key_set_fetch("error", start.elapsed());
            }
        }

        state.attempts += 1;
        self.attempts.store(state.attempts, Ordering::Release);
    }

    async fn fetch_document(&self) -> Result<JwkSetDocument, KeySetError> {
        tracing::debug!(target: "casting.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "casting.auth.jwks", error = %e, "Failed to fetch JWKS");
                KeySetError::FetchFailed(if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    "request failed".to_string()
                })
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "casting.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(KeySetError::FetchFailed(format!(
                "endpoint returned {}",
                response.status().as_u16()
            )));
        }

        response.json::<JwkSetDocument>().await.map_err(|e| {
            tracing::error!(target: "casting.auth.jwks", error = %e, "Failed to parse JWKS response");
            KeySetError::FetchFailed("unparsable document".to_string())
        })
    }
}

impl std::fmt::Debug for KeySetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySetCache")
            .field("jwks_url", &self.jwks_url)
            .field("fetch_count", &self.fetch_count())
            .finish_non_exhaustive()
    }
}
