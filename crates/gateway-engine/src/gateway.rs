//! Gateway entry point.
//!
//! `invoke` runs one feature request end to end:
//! resolver (may block) → provider client → resilience wrapper (deadline,
//! retry, dispatcher) → usage record. Exactly one usage record is emitted per
//! call whatever the outcome, including a caller that drops the call midway.

use crate::invocation::{
    estimate_tokens, EmbeddingBatch, Invocation, InvocationRequest, InvocationStream, Payload,
    StreamChunk, StreamSummary,
};
use futures::future::join_all;
use futures::StreamExt;
use gateway_core::{
    Content, GatewayError, GenerateOutput, GenerateRequest, OutputFormat, Purpose, StreamEvent,
    UsageRecord, UsageRecordBuilder,
};
use gateway_providers::ProviderRegistry;
use gateway_resilience::{ExecuteOptions, ResilienceWrapper};
use gateway_routing::{Decision, OverrideResolver, Resolution};
use gateway_telemetry::{invocation_span, UsageRecorder};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Embedding batch settings
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Texts embedded concurrently per batch
    pub batch_size: usize,
    /// Minimum spacing between batch starts
    pub spacing: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            spacing: Duration::from_secs(1),
        }
    }
}

/// The single entry point features call into
#[derive(Clone)]
pub struct Gateway {
    resolver: Arc<OverrideResolver>,
    providers: ProviderRegistry,
    resilience: ResilienceWrapper,
    recorder: UsageRecorder,
    batch: BatchConfig,
}

impl Gateway {
    /// Assemble a gateway from its parts
    #[must_use]
    pub fn new(
        resolver: Arc<OverrideResolver>,
        providers: ProviderRegistry,
        resilience: ResilienceWrapper,
        recorder: UsageRecorder,
    ) -> Self {
        Self {
            resolver,
            providers,
            resilience,
            recorder,
            batch: BatchConfig::default(),
        }
    }

    /// Override embedding batch settings
    #[must_use]
    pub fn with_batch_config(mut self, batch: BatchConfig) -> Self {
        self.batch = BatchConfig {
            batch_size: batch.batch_size.max(1),
            spacing: batch.spacing,
        };
        self
    }

    /// Resolver holding the live policy
    #[must_use]
    pub fn resolver(&self) -> &Arc<OverrideResolver> {
        &self.resolver
    }

    /// Registered provider clients
    #[must_use]
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Usage recorder handle
    #[must_use]
    pub fn recorder(&self) -> &UsageRecorder {
        &self.recorder
    }

    /// Invoke with the default resilience options
    ///
    /// # Errors
    /// `FeatureUnavailable` when policy blocks the call, configuration errors
    /// when the request cannot be routed, or the provider's last error
    pub async fn invoke(&self, request: InvocationRequest) -> Result<Invocation, GatewayError> {
        self.invoke_with(request, self.resilience.defaults()).await
    }

    /// Invoke with explicit resilience options
    ///
    /// # Errors
    /// See [`Gateway::invoke`]
    pub async fn invoke_with(
        &self,
        request: InvocationRequest,
        options: ExecuteOptions,
    ) -> Result<Invocation, GatewayError> {
        let span = invocation_span!(request.feature, request.purpose);
        self.run(request, options, span.clone()).instrument(span).await
    }

    async fn run(
        &self,
        request: InvocationRequest,
        options: ExecuteOptions,
        span: tracing::Span,
    ) -> Result<Invocation, GatewayError> {
        let mut usage =
            PendingUsage::start(&self.recorder, &request.feature, request.user_id.clone());

        let decision = match self.decide(&request) {
            Ok(decision) => decision,
            Err(err) => {
                usage.fail(&err);
                return Err(err);
            }
        };

        span.record("provider", decision.provider.as_str());
        span.record("model", decision.model.as_str());
        usage.target(&decision);

        match self.dispatch(&decision, &request.payload, options).await {
            Ok(output) => {
                let input_tokens = match output.content {
                    Content::Embedding(_) if output.input_tokens == 0 => {
                        estimate_tokens(&request.payload.prompt)
                    }
                    _ => output.input_tokens,
                };
                let estimated_cost = decision
                    .descriptor
                    .estimate_cost(input_tokens, output.output_tokens);
                let (usage_id, duration_ms) =
                    usage.succeed(input_tokens, output.output_tokens, estimated_cost);

                debug!(
                    input_tokens,
                    output_tokens = output.output_tokens,
                    estimated_cost,
                    duration_ms,
                    "AI request completed"
                );

                Ok(Invocation {
                    content: output.content,
                    provider: decision.provider,
                    model: decision.model,
                    tier: decision.tier,
                    model_overridden: decision.model_overridden,
                    input_tokens,
                    output_tokens: output.output_tokens,
                    estimated_cost,
                    duration_ms,
                    usage_id,
                })
            }
            Err(err) => {
                warn!(error = %err, kind = %err.kind(), "AI request failed");
                usage.fail(&err);
                Err(err)
            }
        }
    }

    fn decide(&self, request: &InvocationRequest) -> Result<Decision, GatewayError> {
        match self
            .resolver
            .resolve_decision(&request.feature, request.purpose, request.tier_hint)?
        {
            Resolution::Dispatch(decision) => Ok(decision),
            Resolution::Blocked { reason } => {
                info!(reason = %reason, "AI request blocked by policy");
                Err(GatewayError::unavailable(reason))
            }
        }
    }

    async fn dispatch(
        &self,
        decision: &Decision,
        payload: &Payload,
        options: ExecuteOptions,
    ) -> Result<GenerateOutput, GatewayError> {
        let provider = self.providers.require(decision.provider)?;
        let generate = build_request(decision, payload);
        let kind = decision.provider;

        self.resilience
            .execute_with(options, || {
                let provider = Arc::clone(&provider);
                let generate = generate.clone();
                async move {
                    let format = generate.format.clone();
                    let output = provider.generate(generate).await?;
                    if !output.content.matches(&format) {
                        return Err(GatewayError::provider(
                            kind,
                            "Provider returned content in the wrong format",
                            None,
                            false,
                        ));
                    }
                    Ok(output)
                }
            })
            .await
    }

    /// Generate free text
    ///
    /// # Errors
    /// See [`Gateway::invoke`]
    pub async fn generate_text(&self, mut request: InvocationRequest) -> Result<String, GatewayError> {
        request.payload.format = OutputFormat::Text;
        match self.invoke(request).await?.content {
            Content::Text(text) => Ok(text),
            _ => Err(GatewayError::internal("text invocation returned non-text content")),
        }
    }

    /// Generate a JSON object, optionally constrained by a schema
    ///
    /// # Errors
    /// See [`Gateway::invoke`]
    pub async fn generate_object(
        &self,
        mut request: InvocationRequest,
        schema: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, GatewayError> {
        request.payload.format = OutputFormat::Object { schema };
        match self.invoke(request).await?.content {
            Content::Object(value) => Ok(value),
            _ => Err(GatewayError::internal("object invocation returned non-object content")),
        }
    }

    /// Stream generated text.
    ///
    /// Policy and routing run exactly as for [`Gateway::invoke`]. Opening the
    /// upstream stream goes through the resilience wrapper, so its deadline
    /// and retries cover the time to first byte. The returned stream ends with
    /// a [`StreamChunk::Done`] summary; one usage record is written when the
    /// stream finishes, fails, or is dropped early.
    ///
    /// # Errors
    /// See [`Gateway::invoke`]; errors after the stream opened arrive as the
    /// stream's last item
    pub async fn generate_stream(
        &self,
        mut request: InvocationRequest,
    ) -> Result<InvocationStream, GatewayError> {
        request.payload.format = OutputFormat::Text;
        let span = invocation_span!(request.feature, request.purpose);
        self.open_stream(request, span.clone()).instrument(span).await
    }

    async fn open_stream(
        &self,
        request: InvocationRequest,
        span: tracing::Span,
    ) -> Result<InvocationStream, GatewayError> {
        let mut usage =
            PendingUsage::start(&self.recorder, &request.feature, request.user_id.clone());

        let decision = match self.decide(&request) {
            Ok(decision) => decision,
            Err(err) => {
                usage.fail(&err);
                return Err(err);
            }
        };

        span.record("provider", decision.provider.as_str());
        span.record("model", decision.model.as_str());
        usage.target(&decision);

        let provider = match self.providers.require(decision.provider) {
            Ok(provider) => provider,
            Err(err) => {
                usage.fail(&err);
                return Err(err);
            }
        };
        let generate = build_request(&decision, &request.payload);
        let opened = self
            .resilience
            .execute_with(self.resilience.defaults(), || {
                let provider = Arc::clone(&provider);
                let generate = generate.clone();
                async move { provider.generate_stream(generate).await }
            })
            .await;
        let mut upstream = match opened {
            Ok(upstream) => upstream,
            Err(err) => {
                warn!(error = %err, kind = %err.kind(), "AI stream failed to open");
                usage.fail(&err);
                return Err(err);
            }
        };

        let prompt = request.payload.prompt;
        let stream = async_stream::stream! {
            let mut generated = String::new();
            let mut reported = None;
            let mut failure = None;

            while let Some(event) = upstream.next().await {
                match event {
                    Ok(StreamEvent::Delta { text }) => {
                        generated.push_str(&text);
                        yield Ok(StreamChunk::Delta { text });
                    }
                    Ok(StreamEvent::Done { input_tokens, output_tokens }) => {
                        reported = Some((input_tokens, output_tokens));
                        break;
                    }
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }

            if let Some(err) = failure {
                warn!(error = %err, kind = %err.kind(), "AI stream failed");
                usage.fail(&err);
                yield Err(err);
            } else {
                let (input_tokens, output_tokens) = reported.unwrap_or_default();
                let input_tokens = match input_tokens {
                    0 => estimate_tokens(&prompt),
                    n => n,
                };
                let output_tokens = match output_tokens {
                    0 => estimate_tokens(&generated),
                    n => n,
                };
                let estimated_cost = decision
                    .descriptor
                    .estimate_cost(input_tokens, output_tokens);
                let (usage_id, duration_ms) =
                    usage.succeed(input_tokens, output_tokens, estimated_cost);

                debug!(
                    input_tokens,
                    output_tokens,
                    estimated_cost,
                    duration_ms,
                    "AI stream completed"
                );

                yield Ok(StreamChunk::Done(StreamSummary {
                    provider: decision.provider,
                    model: decision.model,
                    tier: decision.tier,
                    model_overridden: decision.model_overridden,
                    input_tokens,
                    output_tokens,
                    estimated_cost,
                    duration_ms,
                    usage_id,
                }));
            }
        };

        Ok(Box::pin(stream))
    }

    /// Embed one text
    ///
    /// # Errors
    /// See [`Gateway::invoke`]
    pub async fn embed(
        &self,
        feature: &str,
        text: impl Into<String>,
        user_id: Option<String>,
    ) -> Result<Vec<f32>, GatewayError> {
        let invocation = self.invoke(embedding_request(feature, text.into(), user_id)).await?;
        match invocation.content {
            Content::Embedding(vector) => Ok(vector),
            _ => Err(GatewayError::internal("embedding invocation returned non-embedding content")),
        }
    }

    /// Embed many texts in spaced batches.
    ///
    /// Policy and routing are checked once before any work starts; a refusal
    /// there is recorded once and returned without embedding anything. Each
    /// text is then its own invocation with its own usage record. Every text
    /// in a batch runs to completion before the first error, if any, is
    /// returned.
    ///
    /// # Errors
    /// Any error from the up-front check, or the first failed embedding in
    /// input order
    pub async fn embed_batch(
        &self,
        feature: &str,
        texts: &[String],
        user_id: Option<String>,
    ) -> Result<EmbeddingBatch, GatewayError> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch::default());
        }

        let check = InvocationRequest::new(feature, Purpose::Embedding, Payload::embedding(""));
        if let Err(err) = self.decide(&check) {
            self.recorder.record(UsageRecord::builder(feature).user(user_id.clone()).failed(&err));
            return Err(err);
        }

        let mut batch = EmbeddingBatch {
            embeddings: Vec::with_capacity(texts.len()),
            total_cost: 0.0,
        };
        let mut last_start: Option<Instant> = None;

        for chunk in texts.chunks(self.batch.batch_size.max(1)) {
            if let Some(last) = last_start {
                tokio::time::sleep_until(last + self.batch.spacing).await;
            }
            last_start = Some(Instant::now());

            let results = join_all(chunk.iter().map(|text| {
                self.invoke(embedding_request(feature, text.clone(), user_id.clone()))
            }))
            .await;

            for result in results {
                let invocation = result?;
                batch.total_cost += invocation.estimated_cost;
                match invocation.content {
                    Content::Embedding(vector) => batch.embeddings.push(vector),
                    _ => {
                        return Err(GatewayError::internal(
                            "embedding invocation returned non-embedding content",
                        ))
                    }
                }
            }
        }

        info!(
            feature = %feature,
            texts = texts.len(),
            total_cost = batch.total_cost,
            "Embedding batch complete"
        );
        Ok(batch)
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("providers", &self.providers)
            .field("resilience", &self.resilience)
            .field("batch", &self.batch)
            .finish_non_exhaustive()
    }
}

/// Usage record of one in-flight invocation.
///
/// Settling the call writes the record. If the owning future or stream is
/// dropped first, the record is written on drop as cancelled, so calls the
/// provider may already have billed are still accounted for.
struct PendingUsage {
    recorder: UsageRecorder,
    builder: UsageRecordBuilder,
    started: Instant,
    settled: bool,
}

impl PendingUsage {
    fn start(recorder: &UsageRecorder, feature: &str, user_id: Option<String>) -> Self {
        Self {
            recorder: recorder.clone(),
            builder: UsageRecord::builder(feature).user(user_id),
            started: Instant::now(),
            settled: false,
        }
    }

    fn target(&mut self, decision: &Decision) {
        self.builder = self
            .builder
            .clone()
            .tier(Some(decision.tier))
            .target(decision.provider, decision.model.clone());
    }

    fn succeed(
        &mut self,
        input_tokens: u32,
        output_tokens: u32,
        estimated_cost: f64,
    ) -> (Uuid, u64) {
        let record = self
            .finish()
            .tokens(input_tokens, output_tokens, estimated_cost)
            .succeeded();
        let settled = (record.id, record.duration_ms);
        self.recorder.record(record);
        settled
    }

    fn fail(&mut self, error: &GatewayError) {
        let record = self.finish().failed(error);
        self.recorder.record(record);
    }

    fn finish(&mut self) -> UsageRecordBuilder {
        self.settled = true;
        self.builder.clone().duration(self.started.elapsed())
    }
}

impl Drop for PendingUsage {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let record = self.finish().cancelled();
        warn!(
            feature = %record.feature,
            duration_ms = record.duration_ms,
            "AI request cancelled by caller"
        );
        self.recorder.record(record);
    }
}

fn embedding_request(feature: &str, text: String, user_id: Option<String>) -> InvocationRequest {
    InvocationRequest {
        feature: feature.to_string(),
        purpose: Purpose::Embedding,
        tier_hint: None,
        payload: Payload::embedding(text),
        user_id,
    }
}

/// Provider request for a decision.
///
/// Max tokens come from the payload or the purpose, capped by the model's
/// ceiling when it has one.
fn build_request(decision: &Decision, payload: &Payload) -> GenerateRequest {
    let requested = payload.max_tokens.unwrap_or(decision.profile.max_tokens);
    let ceiling = decision.descriptor.max_output_tokens;
    let max_tokens = if ceiling > 0 {
        requested.min(ceiling)
    } else {
        requested
    };

    GenerateRequest {
        model: decision.model.clone(),
        prompt: payload.prompt.clone(),
        system_prompt: payload.system_prompt.clone(),
        max_tokens,
        temperature: payload.temperature.unwrap_or(decision.profile.temperature),
        format: payload.format.clone(),
    }
}
