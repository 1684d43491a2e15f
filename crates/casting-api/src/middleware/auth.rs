//! Authorization middleware for protected routes.
//!
//! Every protected route declares the one permission it requires. For each
//! request the middleware runs, in order and stopping at the first failure:
//!
//! 1. Extract the `Authorization` header
//! 2. Parse `Bearer <token>`
//! 3. Verify the token
//! 4. Check the required permission
//!
//! On success the verified [`ClaimSet`] is stored in request extensions and
//! handlers take it as `Extension<ClaimSet>`.

use crate::auth::{authorize, ClaimSet, Permission, TokenVerifier};
use crate::errors::AuthError;
use crate::observability::metrics::record_auth_rejection;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authorization middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Token verifier with its key-set cache.
    pub verifier: Arc<TokenVerifier>,
}

impl AuthState {
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }

    /// Authorize a request's headers for `required`.
    ///
    /// # Errors
    ///
    /// - `AuthorizationHeaderMissing` when there is no `Authorization` header
    /// - `InvalidHeader` when it is not `Bearer <token>`, or the token's key is
    ///   unknown or unavailable
    /// - `InvalidToken` / `TokenExpired` when verification fails
    /// - `Unauthorized` when the token lacks `required`
    pub async fn enforce(
        &self,
        headers: &HeaderMap,
        required: &Permission,
    ) -> Result<ClaimSet, AuthError> {
        let token = extract_bearer_token(headers)?;

        let claims = self.verifier.verify(token).await.map_err(AuthError::from)?;

        authorize(&claims, required).map_err(|denied| {
            tracing::debug!(
                target: "casting.middleware.auth",
                required = %denied.required,
                "Permission not granted"
            );
            AuthError::Unauthorized
        })?;

        Ok(claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The value must split on single spaces into exactly two parts, the first
/// being `Bearer` (case-sensitive) and the second non-empty.
///
/// # Errors
///
/// `AuthorizationHeaderMissing` or `InvalidHeader`.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or_else(|| {
        tracing::debug!(target: "casting.middleware.auth", "Missing Authorization header");
        AuthError::AuthorizationHeaderMissing
    })?;

    let value = value.to_str().map_err(|_| {
        tracing::debug!(target: "casting.middleware.auth", "Authorization header is not visible ASCII");
        AuthError::InvalidHeader
    })?;

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(*token),
        _ => {
            tracing::debug!(target: "casting.middleware.auth", "Invalid Authorization header format");
            Err(AuthError::InvalidHeader)
        }
    }
}

/// Per-route middleware state: shared auth state plus the route's permission.
#[derive(Clone)]
pub struct PermissionGuard {
    pub auth: Arc<AuthState>,
    pub permission: Permission,
}

impl PermissionGuard {
    pub fn new(auth: Arc<AuthState>, permission: Permission) -> Self {
        Self { auth, permission }
    }
}

/// Authorization middleware, applied with `axum::middleware::from_fn_with_state`.
///
/// # Response
///
/// - 401 with `WWW-Authenticate` for missing, malformed, invalid or expired tokens
/// - 403 when the token lacks the route's permission
/// - Otherwise continues to the handler with the `ClaimSet` in extensions
#[instrument(skip_all, name = "casting.middleware.auth")]
pub async fn require_permission(
    State(guard): State<PermissionGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = guard
        .auth
        .enforce(req.headers(), &guard.permission)
        .await
        .inspect_err(|err| record_auth_rejection(err.code(), guard.permission.as_str()))?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
        assert_clone::<PermissionGuard>();
    }

    #[test]
    fn test_extract_bearer_token_valid() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_extract_bearer_token_missing() {
        assert_eq!(
            extract_bearer_token(&HeaderMap::new()).unwrap_err(),
            AuthError::AuthorizationHeaderMissing
        );
    }

    #[test]
    fn test_extract_bearer_token_malformed() {
        for value in [
            "Bearer",
            "Bearer ",
            "Basic abc",
            "bearer abc.def.ghi",
            "BEARER abc.def.ghi",
            "Bearer abc def",
            "Bearer  abc",
            " Bearer abc",
            "abc.def.ghi",
            "",
        ] {
            assert_eq!(
                extract_bearer_token(&headers_with(value)).unwrap_err(),
                AuthError::InvalidHeader,
                "{value:?}"
            );
        }
    }

    #[test]
    fn test_extract_bearer_token_non_ascii() {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap(),
        );
        assert_eq!(
            extract_bearer_token(&headers).unwrap_err(),
            AuthError::InvalidHeader
        );
    }
}
