//! Casting API configuration.
//!
//! Configuration is loaded from environment variables. The database URL is
//! held as a secret and redacted in Debug output.

use crate::auth::jwt::{algorithm_name, VerifierSettings};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default signing algorithm accepted from the identity provider.
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::RS256;

/// Default claim carrying granted permissions.
pub const DEFAULT_PERMISSIONS_CLAIM: &str = "permissions";

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for the JWKS fetch timeout in seconds.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Casting API configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: SecretString,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Trusted token issuer, compared exactly against `iss`.
    pub auth_issuer: String,

    /// Audience that must appear in `aud`.
    pub auth_audience: String,

    /// Issuer's JWKS endpoint.
    pub auth_jwks_url: String,

    /// The one accepted signing algorithm.
    pub auth_algorithm: Algorithm,

    /// Claim carrying granted permissions.
    pub auth_permissions_claim: String,

    /// Tolerance for `iat` values ahead of the local clock.
    pub jwt_clock_skew_seconds: u64,

    /// Upper bound for a single JWKS fetch.
    pub jwks_fetch_timeout_seconds: u64,

    /// Greeting style for `GET /`.
    pub excited: bool,

    /// Seconds to keep serving after a shutdown signal.
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("auth_issuer", &self.auth_issuer)
            .field("auth_audience", &self.auth_audience)
            .field("auth_jwks_url", &self.auth_jwks_url)
            .field("auth_algorithm", &algorithm_name(self.auth_algorithm))
            .field("auth_permissions_claim", &self.auth_permissions_claim)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("jwks_fetch_timeout_seconds", &self.jwks_fetch_timeout_seconds)
            .field("excited", &self.excited)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid signing algorithm configuration: {0}")]
    InvalidAlgorithm(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidFetchTimeout(String),

    #[error("Invalid boolean configuration: {0}")]
    InvalidBoolean(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainSeconds(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = SecretString::from(required(vars, "DATABASE_URL")?);

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let auth_issuer = required(vars, "AUTH_ISSUER")?;
        let auth_audience = required(vars, "AUTH_AUDIENCE")?;

        let auth_jwks_url = vars.get("AUTH_JWKS_URL").cloned().unwrap_or_else(|| {
            format!(
                "{}/.well-known/jwks.json",
                auth_issuer.trim_end_matches('/')
            )
        });

        let auth_algorithm = match vars.get("AUTH_ALGORITHM") {
            Some(value) => parse_algorithm(value)?,
            None => DEFAULT_ALGORITHM,
        };

        let auth_permissions_claim = vars
            .get("AUTH_PERMISSIONS_CLAIM")
            .filter(|claim| !claim.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_PERMISSIONS_CLAIM.to_string());

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwtClockSkew(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got 0".to_string(),
                ));
            }

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {value}",
                    MAX_CLOCK_SKEW.as_secs()
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs()
        };

        let jwks_fetch_timeout_seconds =
            if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidFetchTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                    ))
                })?;

                if value == 0 || value > MAX_JWKS_FETCH_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidFetchTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be between 1 and {MAX_JWKS_FETCH_TIMEOUT_SECONDS}, got {value}"
                    )));
                }

                value
            } else {
                DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS
            };

        let excited = match vars.get("EXCITED") {
            Some(value) => parse_bool("EXCITED", value)?,
            None => false,
        };

        let drain_seconds = match vars.get("DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainSeconds(format!(
                    "DRAIN_SECONDS must be a non-negative integer, got '{value_str}': {e}"
                ))
            })?,
            None => 0,
        };

        Ok(Config {
            database_url,
            bind_address,
            auth_issuer,
            auth_audience,
            auth_jwks_url,
            auth_algorithm,
            auth_permissions_claim,
            jwt_clock_skew_seconds,
            jwks_fetch_timeout_seconds,
            excited,
            drain_seconds,
        })
    }

    /// Verification policy derived from this configuration.
    pub fn verifier_settings(&self) -> VerifierSettings {
        VerifierSettings {
            algorithm: self.auth_algorithm,
            issuer: self.auth_issuer.clone(),
            audience: self.auth_audience.clone(),
            permissions_claim: self.auth_permissions_claim.clone(),
            clock_skew_seconds: self.jwt_clock_skew_seconds,
        }
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

/// Asymmetric algorithms only; a shared secret has no place in a JWKS flow.
fn parse_algorithm(value: &str) -> Result<Algorithm, ConfigError> {
    let algorithm = Algorithm::from_str(value).map_err(|_| {
        ConfigError::InvalidAlgorithm(format!("AUTH_ALGORITHM '{value}' is not recognized"))
    })?;

    if matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    ) {
        return Err(ConfigError::InvalidAlgorithm(format!(
            "AUTH_ALGORITHM must be asymmetric, got '{value}'"
        )));
    }

    Ok(algorithm)
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBoolean(format!(
            "{name} must be true or false, got '{value}'"
        ))),
    }
}
