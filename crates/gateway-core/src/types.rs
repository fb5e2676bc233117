//! Domain enums shared across the gateway.
//!
//! Tiers, purposes and providers are closed sets. They are parsed once at the
//! boundary (HTTP bodies, store rows, config files) and travel as enums from
//! there on.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse cost/quality bucket used for model selection.
///
/// The first three variants are ordered by cost (`Cheap < Medium < Expensive`).
/// The remaining buckets are specialised and sort after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Fast, inexpensive models for classification and tagging
    Cheap,
    /// Mid-range models for summaries and insights
    Medium,
    /// Premium models for complex reasoning
    Expensive,
    /// Chat-optimised models
    Chat,
    /// Code-specialised models
    Code,
    /// Embedding models
    Embedding,
    /// Legacy fallback models
    Legacy,
}

impl Tier {
    /// All tiers in declaration order
    pub const ALL: [Self; 7] = [
        Self::Cheap,
        Self::Medium,
        Self::Expensive,
        Self::Chat,
        Self::Code,
        Self::Embedding,
        Self::Legacy,
    ];

    /// Canonical upper-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cheap => "CHEAP",
            Self::Medium => "MEDIUM",
            Self::Expensive => "EXPENSIVE",
            Self::Chat => "CHAT",
            Self::Code => "CODE",
            Self::Embedding => "EMBEDDING",
            Self::Legacy => "LEGACY",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == upper)
            .ok_or_else(|| GatewayError::configuration(format!("unknown tier: {s}")))
    }
}

/// External model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI direct access
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic direct access
    Anthropic,
    /// Unified upstream AI gateway fronting several vendors
    Gateway,
}

impl ProviderKind {
    /// All providers in the catalog's natural order
    pub const ALL: [Self; 3] = [Self::Gateway, Self::OpenAi, Self::Anthropic];

    /// Canonical lower-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gateway => "gateway",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "gateway" => Ok(Self::Gateway),
            other => Err(GatewayError::configuration(format!(
                "unknown provider: {other}"
            ))),
        }
    }
}

/// Task category a feature asks the gateway to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// Vector embeddings for similarity search
    Embedding,
    /// Note type classification
    Classification,
    /// Tag extraction
    Tagging,
    /// Short summaries of note streams
    Summarization,
    /// Weekly insight generation
    InsightGeneration,
    /// Chat-style generation
    Conversational,
}

impl Purpose {
    /// All purposes
    pub const ALL: [Self; 6] = [
        Self::Embedding,
        Self::Classification,
        Self::Tagging,
        Self::Summarization,
        Self::InsightGeneration,
        Self::Conversational,
    ];

    /// Canonical snake-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Classification => "classification",
            Self::Tagging => "tagging",
            Self::Summarization => "summarization",
            Self::InsightGeneration => "insight_generation",
            Self::Conversational => "conversational",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Purpose {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "chat" => Ok(Self::Conversational),
            "insights" | "insight" => Ok(Self::InsightGeneration),
            other => Self::ALL
                .into_iter()
                .find(|purpose| purpose.as_str() == other)
                .ok_or_else(|| GatewayError::UnknownPurpose {
                    purpose: s.to_string(),
                }),
        }
    }
}

/// Why the override policy refused to dispatch a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockReason {
    /// Global kill switch is active
    KillSwitch,
    /// The calling feature has been disabled by an admin
    FeatureDisabled,
}

impl BlockReason {
    /// Kebab-case reason string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::KillSwitch => "kill-switch",
            Self::FeatureDisabled => "feature-disabled",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
