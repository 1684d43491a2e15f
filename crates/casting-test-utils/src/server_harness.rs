//! Test server harness for E2E testing
//!
//! Provides `TestCastingServer`: the real router over an in-memory catalog,
//! bound to a random port, trusting keys served by a wiremock JWKS endpoint.

use crate::crypto_fixtures::{jwks_document, TestKeypair};
use crate::token_builders::{TestTokenBuilder, TEST_AUDIENCE, TEST_ISSUER};
use casting_api::auth::{KeySetCache, TokenVerifier};
use casting_api::config::Config;
use casting_api::middleware::AuthState;
use casting_api::observability::metrics::init_metrics_recorder;
use casting_api::repositories::InMemoryCatalogRepository;
use casting_api::routes::{self, AppState};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock issuer serves its key set on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Global metrics handle for test servers
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Test harness for spawning the Casting API in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_list_movies() -> Result<()> {
///     let server = TestCastingServer::spawn().await?;
///     let token = server.token(&["get:movies"])?;
///
///     let response = reqwest::Client::new()
///         .get(format!("{}/movies", server.url()))
///         .bearer_auth(token)
///         .send()
///         .await?;
///     Ok(())
/// }
/// ```
pub struct TestCastingServer {
    addr: SocketAddr,
    config: Config,
    repository: Arc<InMemoryCatalogRepository>,
    key_set: Arc<KeySetCache>,
    mock_server: MockServer,
    keypair: TestKeypair,
    _handle: JoinHandle<()>,
}

impl TestCastingServer {
    /// Spawn a server whose JWKS endpoint publishes one key (`test-key-01`).
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(HashMap::new()).await
    }

    /// Spawn with extra or overriding environment variables (e.g. `EXCITED`).
    ///
    /// The server will:
    /// - Publish the default test key on a wiremock JWKS endpoint
    /// - Trust `TEST_ISSUER` / `TEST_AUDIENCE` and accept EdDSA
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    ///
    /// The key set is not warmed; the first token verified triggers the fetch.
    pub async fn spawn_with_vars(overrides: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let mock_server = MockServer::start().await;
        let keypair = TestKeypair::new(1, "test-key-01")?;

        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[&keypair])))
            .mount(&mock_server)
            .await;

        let mut vars = HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://test/test".to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("AUTH_ISSUER".to_string(), TEST_ISSUER.to_string()),
            ("AUTH_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
            (
                "AUTH_JWKS_URL".to_string(),
                format!("{}{}", mock_server.uri(), JWKS_PATH),
            ),
            ("AUTH_ALGORITHM".to_string(), "EdDSA".to_string()),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let key_set = Arc::new(KeySetCache::new(
            config.auth_jwks_url.clone(),
            Duration::from_secs(config.jwks_fetch_timeout_seconds),
        ));
        let verifier = Arc::new(TokenVerifier::new(
            key_set.clone(),
            config.verifier_settings(),
        ));
        let repository = Arc::new(InMemoryCatalogRepository::new());

        let state = Arc::new(AppState {
            config: config.clone(),
            repository: repository.clone(),
            auth: Arc::new(AuthState::new(verifier)),
        });

        let app = routes::build_routes(state, test_metrics_handle());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            repository,
            key_set,
            mock_server,
            keypair,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The catalog behind the server, for seeding and inspection.
    pub fn repository(&self) -> &Arc<InMemoryCatalogRepository> {
        &self.repository
    }

    /// The key published on the JWKS endpoint at spawn.
    pub fn keypair(&self) -> &TestKeypair {
        &self.keypair
    }

    pub fn mock_server(&self) -> &MockServer {
        &self.mock_server
    }

    /// Number of JWKS fetches the server has started.
    pub fn jwks_fetch_count(&self) -> u64 {
        self.key_set.fetch_count()
    }

    /// Valid token from the published key granting `permissions`.
    pub fn token(&self, permissions: &[&str]) -> Result<String, anyhow::Error> {
        Ok(TestTokenBuilder::new()
            .with_permissions(permissions)
            .sign(&self.keypair)?)
    }

    /// Replace the published key set (simulates issuer key rotation).
    pub async fn publish_keys(&self, keypairs: &[&TestKeypair]) {
        self.publish_jwks(jwks_document(keypairs)).await;
    }

    /// Replace the published key set with an arbitrary JWKS document.
    pub async fn publish_jwks(&self, document: serde_json::Value) {
        self.mock_server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .mount(&self.mock_server)
            .await;
    }
}

impl Drop for TestCastingServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
