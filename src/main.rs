//! # AI Request Gateway
//!
//! Single choke point between internal features and external model providers.
//!
//! ## Features
//!
//! - Tier and purpose based model routing with admin overrides
//! - Global kill switch and per-feature toggles
//! - Deadlines, bounded retries and rate-limited dispatch
//! - Per-call usage and cost accounting
//! - Prometheus metrics and distributed tracing
//!
//! ## Usage
//!
//! ```bash
//! # Start with default configuration
//! ai-request-gateway
//!
//! # Start with a config file
//! GATEWAY_CONFIG=/path/to/gateway.yaml ai-request-gateway
//!
//! # Start with environment overrides
//! GATEWAY_PORT=9000 GATEWAY_DATABASE_URL=sqlite://gateway.db ai-request-gateway
//! ```

use anyhow::Context;
use gateway_config::{load_config, GatewayConfig};
use gateway_core::{PolicyStore, UsageSink};
use gateway_engine::{Gateway, PolicyAdmin};
use gateway_providers::{HttpProvider, HttpProviderConfig, ProviderRegistry};
use gateway_resilience::{
    DispatcherConfig, ExecuteOptions, RateLimitedDispatcher, ResilienceWrapper, RetryConfig,
};
use gateway_routing::{ModelCatalog, OverrideResolver};
use gateway_server::{AppState, Server, ServerConfig};
use gateway_store::{schema, DatabasePool, PoolConfig, SqlPolicyStore, SqlUsageSink};
use gateway_telemetry::{
    init_tracing, shutdown_tracing, GatewayMetrics, RecorderConfig, TracingConfig, UsageLedger,
    UsageRecorder,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Application entry point
#[tokio::main]
async fn main() {
    let config = match load_config().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let tracer = match init_tracing(&tracing_config(&config)) {
        Ok(tracer) => tracer,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            None
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting AI Request Gateway"
    );

    let result = run(config).await;
    shutdown_tracing(tracer);

    if let Err(e) = result {
        error!(error = %e, "Application failed");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    info!(
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded"
    );

    // Persistence
    let pool_config = PoolConfig::builder()
        .max_connections(config.store.max_connections)
        .connect_timeout(config.store.connect_timeout)
        .build();
    let pool = Arc::new(
        DatabasePool::connect(&config.store.url, &pool_config)
            .await
            .context("connecting to the policy database")?,
    );
    if config.store.bootstrap_schema {
        schema::bootstrap(&pool)
            .await
            .context("bootstrapping the database schema")?;
    }
    let policy_store: Arc<dyn PolicyStore> = Arc::new(SqlPolicyStore::new(Arc::clone(&pool)));
    let usage_sink: Arc<dyn UsageSink> = Arc::new(SqlUsageSink::new(Arc::clone(&pool)));

    // Usage recording
    let metrics = Arc::new(GatewayMetrics::new().context("registering metrics")?);
    let ledger = Arc::new(UsageLedger::new());
    let (recorder, writer) = UsageRecorder::spawn(
        &RecorderConfig {
            channel_capacity: config.usage.channel_capacity,
        },
        Arc::clone(&usage_sink),
        Arc::clone(&ledger),
        Arc::clone(&metrics),
    );

    // Providers and routing
    let registry = create_provider_registry(&config)?;
    info!(providers = registry.len(), "Provider registry initialized");
    if registry.is_empty() {
        warn!("No providers configured; every invocation will fail");
    }

    let resolver = Arc::new(OverrideResolver::new(
        Arc::new(ModelCatalog::standard()),
        registry.kinds(),
    ));
    let admin = Arc::new(PolicyAdmin::new(policy_store, Arc::clone(&resolver)));
    admin.load_at_boot().await;

    let resilience = ResilienceWrapper::new(
        ExecuteOptions {
            timeout: config.resilience.timeout,
            max_retries: config.resilience.max_retries,
            base_delay: config.resilience.base_delay,
        },
        RetryConfig {
            max_retries: config.resilience.max_retries,
            base_delay: config.resilience.base_delay,
            max_delay: config.resilience.max_delay,
            multiplier: config.resilience.multiplier,
            jitter: config.resilience.jitter,
        },
        RateLimitedDispatcher::new(DispatcherConfig {
            min_interval: config.dispatcher.min_interval,
        }),
    );

    let gateway = Gateway::new(resolver, registry, resilience, recorder.clone());

    // Build application state
    let state = AppState::builder()
        .gateway(gateway)
        .admin(admin)
        .usage_sink(usage_sink)
        .ledger(ledger)
        .metrics(metrics)
        .summary_limit(config.usage.summary_limit)
        .build()?;

    let server_config = ServerConfig::new()
        .with_host(&config.server.host)
        .with_port(config.server.port)
        .with_request_timeout(config.server.request_timeout)
        .with_shutdown_timeout(config.server.shutdown_timeout);

    Server::new(server_config, state).run().await?;

    // Drain pending usage records before closing the pool
    recorder.flush().await;
    drop(recorder);
    writer.abort();
    pool.close().await;

    Ok(())
}

/// Tracing settings from the telemetry section
fn tracing_config(config: &GatewayConfig) -> TracingConfig {
    TracingConfig {
        enabled: config.telemetry.tracing_enabled,
        service_name: config.telemetry.service_name.clone(),
        environment: config.telemetry.environment.clone(),
        sampling_rate: config.telemetry.sampling_rate,
        log_level: config.telemetry.log_level.clone(),
        json: config.telemetry.json,
        ..TracingConfig::default()
    }
}

/// Create provider registry from configuration
fn create_provider_registry(config: &GatewayConfig) -> anyhow::Result<ProviderRegistry> {
    let registry = ProviderRegistry::new();

    for provider_config in config.enabled_providers() {
        let mut http_config = HttpProviderConfig::new(provider_config.kind, &provider_config.base_url)
            .with_timeout(provider_config.timeout);
        match provider_config.resolve_api_key() {
            Some(api_key) => http_config = http_config.with_api_key(api_key),
            None => warn!(
                provider = %provider_config.kind,
                "Provider has no API key configured, sending unauthenticated requests"
            ),
        }

        let provider = HttpProvider::new(http_config)
            .with_context(|| format!("creating {} provider client", provider_config.kind))?;
        registry.register(Arc::new(provider));
    }

    Ok(registry)
}
