//! HTTP routes for the Casting API.
//!
//! Defines the Axum router, application state and the per-route permission
//! declarations.

use crate::auth::permissions::{
    DELETE_ACTOR, DELETE_MOVIE, GET_ACTORS, GET_MOVIES, POST_ACTOR, POST_MOVIE, UPDATE_ACTOR,
    UPDATE_MOVIE,
};
use crate::auth::Permission;
use crate::config::Config;
use crate::errors::ApiError;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_permission, AuthState, PermissionGuard};
use crate::repositories::CatalogRepository;
use axum::{
    http::{
        header::{ALLOW, AUTHORIZATION, CONTENT_TYPE},
        Method, StatusCode,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Movie and actor storage.
    pub repository: Arc<dyn CatalogRepository>,

    /// Token verifier shared by every permission guard.
    pub auth: Arc<AuthState>,
}

/// Attaches a required permission to a route.
struct RouteGuard {
    auth: Arc<AuthState>,
}

impl RouteGuard {
    /// Wrap `route` so it only runs for tokens granting `permission`.
    ///
    /// The guard is a route layer: authorization runs before any extractor,
    /// so an unauthorized request never has its body parsed.
    fn require(
        &self,
        permission: Permission,
        route: MethodRouter<Arc<AppState>>,
    ) -> MethodRouter<Arc<AppState>> {
        route.route_layer(middleware::from_fn_with_state(
            PermissionGuard::new(self.auth.clone(), permission),
            require_permission,
        ))
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/` - Greeting - public
/// - `/health` - Liveness probe - public
/// - `/metrics` - Prometheus metrics - public
/// - `/movies`, `/movies/:id` - Movie CRUD, one permission per method
/// - `/actors`, `/actors/:id` - Actor CRUD, one permission per method
/// - JSON 404 fallback and JSON 405 responses
/// - TraceLayer, CORS, HTTP metrics middleware, 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let guard = RouteGuard {
        auth: state.auth.clone(),
    };

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/", get(handlers::greeting))
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (permission required per method)
    let protected_routes = Router::new()
        .route(
            "/movies",
            guard
                .require(GET_MOVIES, get(handlers::list_movies))
                .merge(guard.require(POST_MOVIE, post(handlers::create_movie))),
        )
        .route(
            "/movies/:id",
            guard
                .require(GET_MOVIES, get(handlers::get_movie))
                .merge(guard.require(UPDATE_MOVIE, patch(handlers::update_movie)))
                .merge(guard.require(DELETE_MOVIE, delete(handlers::delete_movie))),
        )
        .route(
            "/actors",
            guard
                .require(GET_ACTORS, get(handlers::list_actors))
                .merge(guard.require(POST_ACTOR, post(handlers::create_actor))),
        )
        .route(
            "/actors/:id",
            guard
                .require(GET_ACTORS, get(handlers::get_actor))
                .merge(guard.require(UPDATE_ACTOR, patch(handlers::update_actor)))
                .merge(guard.require(DELETE_ACTOR, delete(handlers::delete_actor))),
        )
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    // Merge routes and apply global middleware layers
    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. map_response - JSON body for 405
    // 3. CorsLayer - Preflight and response headers
    // 4. TraceLayer - Log request details
    // 5. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::map_response(method_not_allowed_as_json))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// Fallback for unknown paths.
async fn not_found() -> ApiError {
    ApiError::NotFound("route".to_string())
}

/// Give the router's bare 405 the standard error body, keeping `Allow`.
async fn method_not_allowed_as_json(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let allow = response.headers().get(ALLOW).cloned();
    let mut json_response = ApiError::MethodNotAllowed.into_response();
    if let Some(allow) = allow {
        json_response.headers_mut().insert(ALLOW, allow);
    }
    json_response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{KeySetCache, TokenVerifier};
    use crate::repositories::InMemoryCatalogRepository;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use jsonwebtoken::Algorithm;
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn test_app(excited: bool) -> Router {
        let mut vars = HashMap::new();
        vars.insert(
            "DATABASE_URL".to_string(),
            "postgresql://localhost/casting".to_string(),
        );
        vars.insert(
            "AUTH_ISSUER".to_string(),
            "https://casting.example.com/".to_string(),
        );
        vars.insert("AUTH_AUDIENCE".to_string(), "casting".to_string());
        vars.insert("EXCITED".to_string(), excited.to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.auth_algorithm, Algorithm::RS256);

        // Nothing listens on port 9; these tests never reach verification.
        let key_set = Arc::new(KeySetCache::new(
            "http://127.0.0.1:9/.well-known/jwks.json".to_string(),
            Duration::from_millis(200),
        ));
        let verifier = Arc::new(TokenVerifier::new(key_set, config.verifier_settings()));

        let state = Arc::new(AppState {
            config,
            repository: Arc::new(InMemoryCatalogRepository::new()),
            auth: Arc::new(AuthState::new(verifier)),
        });

        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();

        build_routes(state, handle)
    }

    async fn send(app: Router, method: &str, uri: &str) -> Response {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_greeting() {
        let response = send(test_app(false), "GET", "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, "Hello");

        let response = send(test_app(true), "GET", "/").await;
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, "Hello!!!!!");
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = send(test_app(false), "GET", "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_route_requires_header() {
        for (method, uri) in [
            ("GET", "/movies"),
            ("POST", "/movies"),
            ("GET", "/movies/1"),
            ("PATCH", "/movies/1"),
            ("DELETE", "/movies/1"),
            ("GET", "/actors"),
            ("POST", "/actors"),
            ("GET", "/actors/1"),
            ("PATCH", "/actors/1"),
            ("DELETE", "/actors/1"),
        ] {
            let response = send(test_app(false), method, uri).await;
            assert_eq!(
                response.status(),
                StatusCode::UNAUTHORIZED,
                "{method} {uri}"
            );
            let body = body_json(response).await;
            assert_eq!(body["message"], "authorization_header_missing");
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let response = send(test_app(false), "GET", "/directors").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({"success": false, "error": 404, "message": "resource not found"})
        );
    }

    #[tokio::test]
    async fn test_wrong_method_is_json_405() {
        let response = send(test_app(false), "PUT", "/movies").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.headers().get(ALLOW).is_some());

        let body = body_json(response).await;
        assert_eq!(body["error"], 405);
        assert_eq!(body["message"], "Method Not allowed");
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let response = test_app(false)
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/movies")
                    .header("Origin", "https://frontend.example.com")
                    .header("Access-Control-Request-Method", "PATCH")
                    .header("Access-Control-Request-Headers", "authorization,content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .unwrap(),
            "*"
        );
        let methods = response
            .headers()
            .get("access-control-allow-methods")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(methods.contains("PATCH"));
    }
}
