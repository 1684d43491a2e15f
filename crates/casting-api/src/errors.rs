//! Casting API error types.
//!
//! Every error leaving a handler or the authorization middleware renders as
//!
//! ```json
//! {"success": false, "error": <status>, "message": <text>}
//! ```
//!
//! Authorization failures use their machine-readable code as the message.
//! Database details are logged server-side and never returned.

use crate::auth::jwt::VerificationError;
use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures raised by the authorization middleware.
///
/// Maps to HTTP status codes:
/// - AuthorizationHeaderMissing, InvalidHeader, InvalidToken, TokenExpired: 401
/// - Unauthorized: 403
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authorization_header_missing")]
    AuthorizationHeaderMissing,

    #[error("invalid_header")]
    InvalidHeader,

    #[error("invalid_token")]
    InvalidToken,

    #[error("token_expired")]
    TokenExpired,

    #[error("unauthorized")]
    Unauthorized,
}

impl AuthError {
    /// Machine-readable error code, returned as the response `message`.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::AuthorizationHeaderMissing => "authorization_header_missing",
            AuthError::InvalidHeader => "invalid_header",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::Unauthorized => "unauthorized",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthorized => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<VerificationError> for AuthError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::Expired => AuthError::TokenExpired,
            VerificationError::MissingKeyId
            | VerificationError::UnknownKey
            | VerificationError::KeySetUnavailable => AuthError::InvalidHeader,
            VerificationError::Malformed
            | VerificationError::UnsupportedAlgorithm
            | VerificationError::InvalidSignature
            | VerificationError::InvalidIssuer
            | VerificationError::InvalidAudience
            | VerificationError::IssuedInFuture => AuthError::InvalidToken,
        }
    }
}

/// Casting API error type.
///
/// Maps to HTTP status codes:
/// - Auth: 401 or 403 (see [`AuthError`])
/// - BadRequest: 400 Bad Request
/// - NotFound: 404 Not Found
/// - MethodNotAllowed: 405 Method Not Allowed
/// - Unprocessable: 422 Unprocessable Entity
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(auth) => auth.status_code(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Database(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: u16,
    message: &'a str,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = ErrorBody {
        success: false,
        error: status.as_u16(),
        message,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response = error_response(self.status_code(), self.code());

        if self.status_code() == StatusCode::UNAUTHORIZED {
            let challenge = format!("Bearer error=\"{}\"", self.code());
            if let Ok(header_value) = HeaderValue::from_str(&challenge) {
                response.headers_mut().insert(WWW_AUTHENTICATE, header_value);
            }
        }

        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            ApiError::Auth(auth) => auth.into_response(),
            ApiError::BadRequest(reason) => {
                tracing::debug!(target: "casting.errors", reason = %reason, "Bad request");
                error_response(status, "bad request")
            }
            ApiError::NotFound(resource) => {
                tracing::debug!(target: "casting.errors", resource = %resource, "Resource not found");
                error_response(status, "resource not found")
            }
            ApiError::MethodNotAllowed => error_response(status, "Method Not allowed"),
            ApiError::Unprocessable(reason) => {
                tracing::debug!(target: "casting.errors", reason = %reason, "Unprocessable request");
                error_response(status, "unprocessable")
            }
            ApiError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "casting.database", error = %err, "Database operation failed");
                error_response(status, "Internal server error")
            }
            ApiError::Internal => error_response(status, "Internal server error"),
        }
    }
}

/// Convert sqlx errors to ApiError
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_auth_error_codes() {
        assert_eq!(
            AuthError::AuthorizationHeaderMissing.code(),
            "authorization_header_missing"
        );
        assert_eq!(AuthError::InvalidHeader.code(), "invalid_header");
        assert_eq!(AuthError::InvalidToken.code(), "invalid_token");
        assert_eq!(AuthError::TokenExpired.code(), "token_expired");
        assert_eq!(AuthError::Unauthorized.code(), "unauthorized");
    }

    #[test]
    fn test_auth_error_display_matches_code() {
        for err in [
            AuthError::AuthorizationHeaderMissing,
            AuthError::InvalidHeader,
            AuthError::InvalidToken,
            AuthError::TokenExpired,
            AuthError::Unauthorized,
        ] {
            assert_eq!(err.to_string(), err.code());
        }
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            AuthError::AuthorizationHeaderMissing.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::InvalidHeader.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Unauthorized.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_verification_error_mapping() {
        use VerificationError as V;

        assert_eq!(AuthError::from(V::Expired), AuthError::TokenExpired);
        assert_eq!(AuthError::from(V::UnknownKey), AuthError::InvalidHeader);
        assert_eq!(AuthError::from(V::MissingKeyId), AuthError::InvalidHeader);
        assert_eq!(AuthError::from(V::KeySetUnavailable), AuthError::InvalidHeader);

        for kind in [
            V::Malformed,
            V::UnsupportedAlgorithm,
            V::InvalidSignature,
            V::InvalidIssuer,
            V::InvalidAudience,
            V::IssuedInFuture,
        ] {
            assert_eq!(AuthError::from(kind), AuthError::InvalidToken, "{kind:?}");
        }
    }

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::from(AuthError::Unauthorized).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::BadRequest("x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::MethodNotAllowed.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiError::Unprocessable("x".to_string()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Database("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Internal.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_into_response_missing_header() {
        let response = AuthError::AuthorizationHeaderMissing.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response.headers().get(WWW_AUTHENTICATE).unwrap();
        assert_eq!(
            www_auth.to_str().unwrap(),
            "Bearer error=\"authorization_header_missing\""
        );

        let body = read_body_json(response.into_body()).await;
        assert_eq!(
            body,
            serde_json::json!({
                "success": false,
                "error": 401,
                "message": "authorization_header_missing"
            })
        );
    }

    #[tokio::test]
    async fn test_into_response_forbidden_has_no_challenge() {
        let response = ApiError::from(AuthError::Unauthorized).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], 403);
        assert_eq!(body["message"], "unauthorized");
    }

    #[tokio::test]
    async fn test_into_response_not_found() {
        let response = ApiError::NotFound("movie 9999".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"], 404);
        assert_eq!(body["message"], "resource not found");
    }

    #[tokio::test]
    async fn test_into_response_unprocessable() {
        let response = ApiError::Unprocessable("missing title".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"], 422);
        assert_eq!(body["message"], "unprocessable");
    }

    #[tokio::test]
    async fn test_into_response_database_hides_details() {
        let response = ApiError::Database("relation \"movies\" does not exist".to_string())
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"], 500);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_sqlx_error_becomes_opaque_database_error() {
        let err = ApiError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(&err, ApiError::Database(detail) if detail.contains("timed out")));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_into_response_bad_request() {
        let response = ApiError::BadRequest("expected JSON".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["message"], "bad request");
    }

    #[tokio::test]
    async fn test_into_response_method_not_allowed() {
        let response = ApiError::MethodNotAllowed.into_response();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"], 405);
        assert_eq!(body["message"], "Method Not allowed");
    }
}
