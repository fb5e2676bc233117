//! Invocation request and result types.

use futures::stream::BoxStream;
use gateway_core::{Content, GatewayError, OutputFormat, ProviderKind, Purpose, Tier};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the caller wants generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Prompt, or the text to embed
    pub prompt: String,
    /// Optional system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Output token ceiling; defaults to the purpose's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature; defaults to the purpose's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Expected output shape
    #[serde(default)]
    pub format: OutputFormat,
}

impl Payload {
    /// Free-text generation
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens: None,
            temperature: None,
            format: OutputFormat::Text,
        }
    }

    /// Structured generation, optionally constrained by a JSON schema
    pub fn object(prompt: impl Into<String>, schema: Option<serde_json::Value>) -> Self {
        Self {
            format: OutputFormat::Object { schema },
            ..Self::text(prompt)
        }
    }

    /// Embedding of a single text
    pub fn embedding(text: impl Into<String>) -> Self {
        Self {
            format: OutputFormat::Embedding,
            ..Self::text(text)
        }
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Set the output token ceiling
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// One call from a feature into the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Calling feature, used for policy and accounting
    pub feature: String,
    /// Task category
    pub purpose: Purpose,
    /// Preferred tier; feature pins win over it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_hint: Option<Tier>,
    /// What to generate
    pub payload: Payload,
    /// End user the call runs for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl InvocationRequest {
    /// Create a request
    pub fn new(feature: impl Into<String>, purpose: Purpose, payload: Payload) -> Self {
        Self {
            feature: feature.into(),
            purpose,
            tier_hint: None,
            payload,
            user_id: None,
        }
    }

    /// Set the tier hint
    #[must_use]
    pub const fn with_tier_hint(mut self, tier: Tier) -> Self {
        self.tier_hint = Some(tier);
        self
    }

    /// Set the user
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Result of a successful invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Generated content
    pub content: Content,
    /// Provider that served the call
    pub provider: ProviderKind,
    /// Model that served the call
    pub model: String,
    /// Effective tier
    pub tier: Tier,
    /// Whether the model came from an admin pin
    pub model_overridden: bool,
    /// Prompt tokens, estimated for embeddings that report none
    pub input_tokens: u32,
    /// Completion tokens
    pub output_tokens: u32,
    /// Estimated cost in USD
    pub estimated_cost: f64,
    /// Wall time including retries and queueing
    pub duration_ms: u64,
    /// Id of the usage record written for this call
    pub usage_id: Uuid,
}

/// Embeddings for a list of texts, in input order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingBatch {
    /// One vector per input text
    pub embeddings: Vec<Vec<f32>>,
    /// Summed estimated cost in USD
    pub total_cost: f64,
}

/// Accounting summary sent as the last chunk of a streamed invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSummary {
    /// Provider that served the call
    pub provider: ProviderKind,
    /// Model that served the call
    pub model: String,
    /// Effective tier
    pub tier: Tier,
    /// Whether the model came from an admin pin
    pub model_overridden: bool,
    /// Prompt tokens, estimated when the provider reports none
    pub input_tokens: u32,
    /// Completion tokens, estimated when the provider reports none
    pub output_tokens: u32,
    /// Estimated cost in USD
    pub estimated_cost: f64,
    /// Wall time from request to final chunk
    pub duration_ms: u64,
    /// Id of the usage record written for this call
    pub usage_id: Uuid,
}

/// One chunk of a streamed text invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Next piece of generated text
    Delta {
        /// Text fragment
        text: String,
    },
    /// Stream finished and was accounted for
    Done(StreamSummary),
}

/// Chunks of a streamed invocation; errors end the stream
pub type InvocationStream = BoxStream<'static, Result<StreamChunk, GatewayError>>;

/// Rough token estimate: one token per four characters
#[must_use]
pub fn estimate_tokens(text: &str) -> u32 {
    u32::try_from(text.chars().count().div_ceil(4)).unwrap_or(u32::MAX)
}
