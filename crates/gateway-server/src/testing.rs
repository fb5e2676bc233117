//! Shared fixtures for router and server tests.

use crate::state::AppState;
use async_trait::async_trait;
use gateway_core::{
    Content, GatewayError, GenerateOutput, GenerateRequest, ModelProvider, OutputFormat,
    PolicyStore, ProviderKind, ProviderStream, StreamEvent, UsageSink,
};
use gateway_engine::{Gateway, PolicyAdmin};
use gateway_providers::ProviderRegistry;
use gateway_resilience::{
    DispatcherConfig, ExecuteOptions, RateLimitedDispatcher, ResilienceWrapper, RetryConfig,
};
use gateway_routing::{ModelCatalog, OverrideResolver};
use gateway_store::{InMemoryPolicyStore, InMemoryUsageSink};
use gateway_telemetry::{GatewayMetrics, RecorderConfig, UsageLedger, UsageRecorder};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct EchoProvider;

#[async_trait]
impl ModelProvider for EchoProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateOutput, GatewayError> {
        let content = match request.format {
            OutputFormat::Text => Content::Text(format!("echo: {}", request.prompt)),
            OutputFormat::Object { .. } => Content::Object(json!({"ok": true})),
            OutputFormat::Embedding => Content::Embedding(vec![0.25; 3]),
        };
        Ok(GenerateOutput {
            content,
            input_tokens: 100,
            output_tokens: 20,
        })
    }

    async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> Result<ProviderStream, GatewayError> {
        let events = vec![
            Ok(StreamEvent::Delta {
                text: "echo: ".to_string(),
            }),
            Ok(StreamEvent::Delta {
                text: request.prompt,
            }),
            Ok(StreamEvent::Done {
                input_tokens: 100,
                output_tokens: 20,
            }),
        ];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

pub(crate) struct TestApp {
    pub(crate) state: AppState,
    pub(crate) sink: Arc<InMemoryUsageSink>,
}

pub(crate) fn test_app() -> TestApp {
    let registry = ProviderRegistry::new().with_provider(Arc::new(EchoProvider));
    let resolver = Arc::new(OverrideResolver::new(
        Arc::new(ModelCatalog::standard()),
        registry.kinds(),
    ));
    let resilience = ResilienceWrapper::new(
        ExecuteOptions {
            timeout: Duration::from_secs(5),
            max_retries: 0,
            base_delay: Duration::from_millis(1),
        },
        RetryConfig::default(),
        RateLimitedDispatcher::new(DispatcherConfig {
            min_interval: Duration::from_millis(1),
        }),
    );
    let sink = Arc::new(InMemoryUsageSink::new());
    let ledger = Arc::new(UsageLedger::new());
    let metrics = Arc::new(GatewayMetrics::new().unwrap());
    let (recorder, _writer) = UsageRecorder::spawn(
        &RecorderConfig::default(),
        Arc::clone(&sink) as Arc<dyn UsageSink>,
        Arc::clone(&ledger),
        Arc::clone(&metrics),
    );
    let admin = Arc::new(PolicyAdmin::new(
        Arc::new(InMemoryPolicyStore::new()) as Arc<dyn PolicyStore>,
        Arc::clone(&resolver),
    ));
    let state = AppState::builder()
        .gateway(Gateway::new(resolver, registry, resilience, recorder))
        .admin(admin)
        .usage_sink(Arc::clone(&sink) as Arc<dyn UsageSink>)
        .ledger(ledger)
        .metrics(metrics)
        .build()
        .unwrap();
    TestApp { state, sink }
}
