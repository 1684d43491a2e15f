//! HTTP request handlers for the Casting API.

pub mod actors;
pub mod health;
pub mod metrics;
pub mod movies;

pub use actors::{create_actor, delete_actor, get_actor, list_actors, update_actor};
pub use health::{greeting, health_check};
pub use metrics::metrics_handler;
pub use movies::{create_movie, delete_movie, get_movie, list_movies, update_movie};

use crate::errors::ApiError;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::Json;

/// Unwrap a JSON body, turning extractor failures into API errors.
///
/// Well-formed JSON of the wrong shape is 422; anything that is not JSON at
/// all (syntax error, missing content type, unreadable body) is 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::JsonDataError(err)) => Err(ApiError::Unprocessable(err.body_text())),
        Err(err) => Err(ApiError::BadRequest(err.body_text())),
    }
}

/// Unwrap a numeric path id. A non-numeric id names no resource, so it is 404.
pub(crate) fn resource_id(
    resource: &str,
    id: Result<Path<i32>, PathRejection>,
) -> Result<i32, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|err| ApiError::NotFound(format!("{resource} '{}'", err.body_text())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::MoviePayload;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{header::CONTENT_TYPE, Request, StatusCode};

    async fn extract(content_type: Option<&str>, body: &str) -> Result<MoviePayload, ApiError> {
        let mut builder = Request::builder().method("POST").uri("/movies");
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        json_body(Json::<MoviePayload>::from_request(request, &()).await)
    }

    #[tokio::test]
    async fn test_json_body_accepts_valid_payload() {
        let payload = extract(Some("application/json"), r#"{"title":"Arrival"}"#)
            .await
            .unwrap();
        assert_eq!(payload.title.as_deref(), Some("Arrival"));
        assert!(payload.release_date.is_none());
    }

    #[tokio::test]
    async fn test_json_body_syntax_error_is_bad_request() {
        let err = extract(Some("application/json"), "{not json").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_json_body_missing_content_type_is_bad_request() {
        let err = extract(None, r#"{"title":"Arrival"}"#).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_json_body_wrong_shape_is_unprocessable() {
        let err = extract(Some("application/json"), r#"{"title":42}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
