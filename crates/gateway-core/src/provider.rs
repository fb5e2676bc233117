//! Uniform provider boundary.
//!
//! Every model provider is reached through [`ModelProvider::generate`]. Vendor
//! authentication and wire formats live behind the trait object; the gateway
//! only sees model ids, prompts, limits and token counts.

use crate::error::GatewayError;
use crate::types::ProviderKind;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Shape of output the caller expects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputFormat {
    /// Free text
    #[default]
    Text,
    /// JSON object, optionally constrained by a JSON schema
    Object {
        /// JSON schema the object must satisfy
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<serde_json::Value>,
    },
    /// Embedding vector
    Embedding,
}

/// Request sent to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Concrete model id
    pub model: String,
    /// User prompt or text to embed
    pub prompt: String,
    /// Optional system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Output token ceiling
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Expected output shape
    #[serde(default)]
    pub format: OutputFormat,
}

/// Content produced by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Content {
    /// Generated text
    Text(String),
    /// Generated JSON object
    Object(serde_json::Value),
    /// Embedding vector
    Embedding(Vec<f32>),
}

impl Content {
    /// Text content, if any
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Object content, if any
    #[must_use]
    pub fn as_object(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Object(value) => Some(value),
            _ => None,
        }
    }

    /// Embedding content, if any
    #[must_use]
    pub fn as_embedding(&self) -> Option<&[f32]> {
        match self {
            Self::Embedding(vector) => Some(vector),
            _ => None,
        }
    }

    /// Whether the content matches the requested format
    #[must_use]
    pub fn matches(&self, format: &OutputFormat) -> bool {
        matches!(
            (self, format),
            (Self::Text(_), OutputFormat::Text)
                | (Self::Object(_), OutputFormat::Object { .. })
                | (Self::Embedding(_), OutputFormat::Embedding)
        )
    }
}

/// Provider response with token accounting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOutput {
    /// Generated content
    pub content: Content,
    /// Prompt tokens consumed
    #[serde(default)]
    pub input_tokens: u32,
    /// Completion tokens produced
    #[serde(default)]
    pub output_tokens: u32,
}

impl GenerateOutput {
    /// Text output with token counts
    pub fn text(text: impl Into<String>, input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            content: Content::Text(text.into()),
            input_tokens,
            output_tokens,
        }
    }
}

/// One event of a streamed text generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Next piece of generated text
    Delta {
        /// Text fragment
        text: String,
    },
    /// Final event with token accounting
    Done {
        /// Prompt tokens consumed
        #[serde(default)]
        input_tokens: u32,
        /// Completion tokens produced
        #[serde(default)]
        output_tokens: u32,
    },
}

/// Stream of generation events from a provider
pub type ProviderStream = BoxStream<'static, Result<StreamEvent, GatewayError>>;

/// Opaque client handle for one provider
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Which provider this client talks to
    fn kind(&self) -> ProviderKind;

    /// Run one generation call
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateOutput, GatewayError>;

    /// Run one streamed text generation
    ///
    /// Providers without a streaming endpoint refuse with a configuration error.
    async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> Result<ProviderStream, GatewayError> {
        let _ = request;
        Err(GatewayError::configuration(format!(
            "provider {} does not support streaming",
            self.kind()
        )))
    }

    /// Cheap liveness probe; defaults to healthy
    async fn health_check(&self) -> bool {
        true
    }
}
