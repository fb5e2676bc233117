//! Test helper utilities for integration tests

use gateway_core::{PolicyStore, ProviderKind, UsageSink};
use gateway_engine::{BatchConfig, Gateway, PolicyAdmin};
use gateway_providers::{HttpProvider, HttpProviderConfig, ProviderRegistry};
use gateway_resilience::{
    DispatcherConfig, ExecuteOptions, RateLimitedDispatcher, ResilienceWrapper, RetryConfig,
};
use gateway_routing::{ModelCatalog, OverrideResolver};
use gateway_server::{AppState, Server, ServerConfig};
use gateway_store::{schema, DatabasePool, SqlPolicyStore, SqlUsageSink};
use gateway_telemetry::{GatewayMetrics, RecorderConfig, UsageLedger, UsageRecorder};
use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Resilience settings for a test gateway
#[derive(Debug, Clone, Copy)]
pub struct TestResilience {
    /// Per-attempt deadline
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff delay
    pub base_delay: Duration,
    /// Dispatcher spacing
    pub min_interval: Duration,
}

impl Default for TestResilience {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            max_retries: 3,
            base_delay: Duration::from_millis(50),
            min_interval: Duration::from_millis(5),
        }
    }
}

/// Gateway wired the way the binary wires it, over in-memory SQLite
pub struct TestGateway {
    /// Invocation entry point
    pub gateway: Gateway,
    /// Policy administration
    pub admin: Arc<PolicyAdmin>,
    /// Persisted usage log
    pub usage: Arc<dyn UsageSink>,
    /// HTTP state built from the same parts
    pub state: AppState,
    /// Policy store, for simulating out-of-band writes
    pub policy_store: Arc<dyn PolicyStore>,
}

impl TestGateway {
    /// Build a gateway talking to the given provider sidecars
    pub async fn new(providers: &[(ProviderKind, String)], resilience: TestResilience) -> Self {
        let pool = Arc::new(DatabasePool::in_memory().await.expect("Failed to open database"));
        schema::bootstrap(&pool).await.expect("Failed to bootstrap schema");
        let policy_store: Arc<dyn PolicyStore> = Arc::new(SqlPolicyStore::new(Arc::clone(&pool)));
        let usage: Arc<dyn UsageSink> = Arc::new(SqlUsageSink::new(Arc::clone(&pool)));

        let registry = ProviderRegistry::new();
        for (kind, url) in providers {
            let provider = HttpProvider::new(
                HttpProviderConfig::new(*kind, url.as_str()).with_timeout(Duration::from_secs(5)),
            )
            .expect("Failed to create provider");
            registry.register(Arc::new(provider));
        }

        let resolver = Arc::new(OverrideResolver::new(
            Arc::new(ModelCatalog::standard()),
            registry.kinds(),
        ));
        let admin = Arc::new(PolicyAdmin::new(Arc::clone(&policy_store), Arc::clone(&resolver)));
        admin.load_at_boot().await;

        let metrics = Arc::new(GatewayMetrics::new().expect("Failed to create metrics"));
        let ledger = Arc::new(UsageLedger::new());
        let (recorder, _writer) = UsageRecorder::spawn(
            &RecorderConfig::default(),
            Arc::clone(&usage),
            Arc::clone(&ledger),
            Arc::clone(&metrics),
        );

        let wrapper = ResilienceWrapper::new(
            ExecuteOptions {
                timeout: resilience.timeout,
                max_retries: resilience.max_retries,
                base_delay: resilience.base_delay,
            },
            RetryConfig {
                max_retries: resilience.max_retries,
                base_delay: resilience.base_delay,
                ..RetryConfig::default()
            },
            RateLimitedDispatcher::new(DispatcherConfig {
                min_interval: resilience.min_interval,
            }),
        );
        let gateway = Gateway::new(resolver, registry, wrapper, recorder).with_batch_config(
            BatchConfig {
                batch_size: 2,
                spacing: Duration::from_millis(20),
            },
        );

        let state = AppState::builder()
            .gateway(gateway.clone())
            .admin(Arc::clone(&admin))
            .usage_sink(Arc::clone(&usage))
            .ledger(ledger)
            .metrics(metrics)
            .build()
            .expect("Failed to build state");

        Self {
            gateway,
            admin,
            usage,
            state,
            policy_store,
        }
    }

    /// Wait until every usage record submitted so far is persisted
    pub async fn flush_usage(&self) {
        self.gateway.recorder().flush().await;
    }
}

/// Test server wrapper for integration tests
pub struct TestServer {
    /// The server address
    pub addr: SocketAddr,
    /// HTTP client for making requests
    pub client: Client,
    /// Base URL for the server
    pub base_url: String,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Serve the given state on an ephemeral port
    pub async fn start(state: AppState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local addr");
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let server = Server::new(
            ServerConfig::new().with_shutdown_timeout(Duration::from_secs(1)),
            state,
        );
        tokio::spawn(async move {
            server
                .serve(listener, async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create client");

        Self {
            addr,
            client,
            base_url: format!("http://{addr}"),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the full URL for a path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    /// Make an admin POST request with JSON body
    pub async fn admin_post(&self, path: &str, body: &Value, actor: &str) -> Response {
        self.client
            .post(self.url(path))
            .header("x-admin-user", actor)
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    /// Make an admin DELETE request
    pub async fn admin_delete(&self, path: &str, actor: &str) -> Response {
        self.client
            .delete(self.url(path))
            .header("x-admin-user", actor)
            .send()
            .await
            .expect("Request failed")
    }

    /// Parse response body as JSON
    pub async fn json_body(response: Response) -> Value {
        response.json().await.expect("Failed to parse JSON")
    }

    /// Shutdown the test server
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Assert that a response has the expected status code
pub fn assert_status(response: &Response, expected: u16) {
    assert_eq!(
        response.status().as_u16(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}
