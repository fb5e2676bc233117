//! Static model catalog.
//!
//! Maps `(tier, provider)` to a concrete model with limits and pricing, and
//! each purpose to its default tier and generation parameters. The catalog is
//! built once at start and never mutated; admin pins live in the override
//! policy instead.

use gateway_core::{GatewayError, ProviderKind, Purpose, Tier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One concrete model offering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Tier this model serves
    pub tier: Tier,
    /// Provider offering it
    pub provider: ProviderKind,
    /// Provider-side model id
    pub model_id: String,
    /// Output token ceiling
    pub max_output_tokens: u32,
    /// Default sampling temperature
    pub temperature: f32,
    /// USD per million prompt tokens
    pub cost_per_million_input_tokens: f64,
    /// USD per million completion tokens
    pub cost_per_million_output_tokens: f64,
}

impl ModelDescriptor {
    /// Create a descriptor with default limits
    pub fn new(tier: Tier, provider: ProviderKind, model_id: impl Into<String>) -> Self {
        Self {
            tier,
            provider,
            model_id: model_id.into(),
            max_output_tokens: 4096,
            temperature: 0.7,
            cost_per_million_input_tokens: 0.0,
            cost_per_million_output_tokens: 0.0,
        }
    }

    /// Set pricing per million tokens
    #[must_use]
    pub fn with_pricing(mut self, input_per_million: f64, output_per_million: f64) -> Self {
        self.cost_per_million_input_tokens = input_per_million;
        self.cost_per_million_output_tokens = output_per_million;
        self
    }

    /// Set the output token ceiling
    #[must_use]
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Estimated cost in USD for the given token counts
    #[must_use]
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input = f64::from(input_tokens) / 1_000_000.0 * self.cost_per_million_input_tokens;
        let output = f64::from(output_tokens) / 1_000_000.0 * self.cost_per_million_output_tokens;
        input + output
    }
}

/// Defaults a purpose brings to every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PurposeProfile {
    /// Purpose
    pub purpose: Purpose,
    /// Tier used when neither caller nor policy picks one
    pub default_tier: Tier,
    /// Default output token ceiling
    pub max_tokens: u32,
    /// Default sampling temperature
    pub temperature: f32,
}

impl PurposeProfile {
    /// Create a profile
    #[must_use]
    pub const fn new(purpose: Purpose, default_tier: Tier, max_tokens: u32, temperature: f32) -> Self {
        Self {
            purpose,
            default_tier,
            max_tokens,
            temperature,
        }
    }
}

/// Immutable catalog of models and purpose profiles
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    descriptors: Vec<ModelDescriptor>,
    profiles: HashMap<Purpose, PurposeProfile>,
}

impl ModelCatalog {
    /// Start an empty catalog
    #[must_use]
    pub fn builder() -> ModelCatalogBuilder {
        ModelCatalogBuilder::default()
    }

    /// Profile for a purpose
    ///
    /// # Errors
    /// Returns `UnknownPurpose` when the purpose has no profile
    pub fn profile(&self, purpose: Purpose) -> Result<&PurposeProfile, GatewayError> {
        self.profiles
            .get(&purpose)
            .ok_or_else(|| GatewayError::UnknownPurpose {
                purpose: purpose.to_string(),
            })
    }

    /// Resolve the default descriptor for a purpose.
    ///
    /// Uses the purpose's default tier when `tier` is `None`, and the first
    /// provider in natural order that serves the tier.
    ///
    /// # Errors
    /// Returns `UnknownPurpose` or `UnsupportedTier`
    pub fn resolve(&self, purpose: Purpose, tier: Option<Tier>) -> Result<&ModelDescriptor, GatewayError> {
        let profile = self.profile(purpose)?;
        let tier = tier.unwrap_or(profile.default_tier);
        self.providers_for(tier)
            .into_iter()
            .find_map(|provider| self.descriptor(tier, provider))
            .ok_or(GatewayError::UnsupportedTier { purpose, tier })
    }

    /// Descriptor for an exact `(tier, provider)` pair
    #[must_use]
    pub fn descriptor(&self, tier: Tier, provider: ProviderKind) -> Option<&ModelDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.tier == tier && d.provider == provider)
    }

    /// Providers serving a tier, in natural order
    #[must_use]
    pub fn providers_for(&self, tier: Tier) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|provider| self.descriptor(tier, *provider).is_some())
            .collect()
    }

    /// First descriptor carrying a model id, used to price pinned models
    #[must_use]
    pub fn find_model(&self, model_id: &str) -> Option<&ModelDescriptor> {
        self.descriptors.iter().find(|d| d.model_id == model_id)
    }

    /// All descriptors
    #[must_use]
    pub fn descriptors(&self) -> &[ModelDescriptor] {
        &self.descriptors
    }

    /// All purpose profiles
    pub fn profiles(&self) -> impl Iterator<Item = &PurposeProfile> {
        self.profiles.values()
    }
}

/// Builder for [`ModelCatalog`]
#[derive(Debug, Default)]
pub struct ModelCatalogBuilder {
    catalog: ModelCatalog,
}

impl ModelCatalogBuilder {
    /// Add or replace a descriptor
    #[must_use]
    pub fn model(mut self, descriptor: ModelDescriptor) -> Self {
        self.catalog
            .descriptors
            .retain(|d| !(d.tier == descriptor.tier && d.provider == descriptor.provider));
        self.catalog.descriptors.push(descriptor);
        self
    }

    /// Add or replace a purpose profile
    #[must_use]
    pub fn purpose(mut self, profile: PurposeProfile) -> Self {
        self.catalog.profiles.insert(profile.purpose, profile);
        self
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> ModelCatalog {
        self.catalog
    }
}

// (tier, provider, model, $/1M input, $/1M output)
const DEFAULT_MODELS: &[(Tier, ProviderKind, &str, f64, f64)] = &[
    (Tier::Cheap, ProviderKind::OpenAi, "gpt-4o-mini", 0.15, 0.6),
    (Tier::Cheap, ProviderKind::Anthropic, "claude-3-haiku-20240307", 0.25, 1.25),
    (Tier::Cheap, ProviderKind::Gateway, "openai/gpt-4o-mini", 0.15, 0.6),
    (Tier::Medium, ProviderKind::OpenAi, "gpt-4o", 2.5, 10.0),
    (Tier::Medium, ProviderKind::Anthropic, "claude-3-5-sonnet-20241022", 3.0, 15.0),
    (Tier::Medium, ProviderKind::Gateway, "openai/gpt-4o", 2.5, 10.0),
    (Tier::Expensive, ProviderKind::OpenAi, "gpt-4-turbo", 10.0, 30.0),
    (Tier::Expensive, ProviderKind::Anthropic, "claude-3-opus-20240229", 15.0, 75.0),
    (Tier::Expensive, ProviderKind::Gateway, "anthropic/claude-3-opus-20240229", 15.0, 75.0),
    (Tier::Chat, ProviderKind::OpenAi, "gpt-5", 3.0, 12.0),
    (Tier::Chat, ProviderKind::Anthropic, "claude-3-5-sonnet-20241022", 3.0, 15.0),
    (Tier::Chat, ProviderKind::Gateway, "openai/gpt-5", 3.0, 12.0),
    (Tier::Code, ProviderKind::OpenAi, "gpt-5.1-code", 3.5, 14.0),
    (Tier::Code, ProviderKind::Anthropic, "claude-3-opus-20240229", 15.0, 75.0),
    (Tier::Code, ProviderKind::Gateway, "openai/gpt-5.1-code", 3.5, 14.0),
    (Tier::Embedding, ProviderKind::OpenAi, "text-embedding-3-small", 0.02, 0.0),
    (Tier::Embedding, ProviderKind::Gateway, "openai/text-embedding-3-small", 0.02, 0.0),
    (Tier::Legacy, ProviderKind::OpenAi, "gpt-3.5-turbo", 0.5, 1.5),
    (Tier::Legacy, ProviderKind::Anthropic, "claude-3-haiku-20240307", 0.25, 1.25),
    (Tier::Legacy, ProviderKind::Gateway, "openai/gpt-3.5-turbo", 0.5, 1.5),
];

const DEFAULT_PROFILES: &[PurposeProfile] = &[
    PurposeProfile::new(Purpose::Embedding, Tier::Embedding, 0, 0.0),
    PurposeProfile::new(Purpose::Classification, Tier::Cheap, 500, 0.3),
    PurposeProfile::new(Purpose::Tagging, Tier::Cheap, 300, 0.3),
    PurposeProfile::new(Purpose::Summarization, Tier::Medium, 500, 0.7),
    PurposeProfile::new(Purpose::InsightGeneration, Tier::Medium, 1000, 0.7),
    PurposeProfile::new(Purpose::Conversational, Tier::Chat, 1000, 0.7),
];

impl ModelCatalog {
    /// Catalog shipped with the gateway
    #[must_use]
    pub fn standard() -> Self {
        let mut builder = Self::builder();
        for (tier, provider, model, input, output) in DEFAULT_MODELS {
            let max_output_tokens = if *tier == Tier::Embedding { 0 } else { 4096 };
            builder = builder.model(
                ModelDescriptor::new(*tier, *provider, *model)
                    .with_pricing(*input, *output)
                    .with_max_output_tokens(max_output_tokens),
            );
        }
        for profile in DEFAULT_PROFILES {
            builder = builder.purpose(*profile);
        }
        builder.build()
    }
}
