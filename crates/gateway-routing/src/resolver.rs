//! Override resolution.
//!
//! Turns `(feature, purpose, tier hint)` into a concrete routing decision by
//! applying the current [`OverridePolicy`] on top of the [`ModelCatalog`].
//! The policy is held in an [`ArcSwap`]; readers take a lock-free snapshot
//! and refreshes replace the whole value.

use crate::catalog::{ModelCatalog, ModelDescriptor, PurposeProfile};
use arc_swap::ArcSwap;
use gateway_core::{BlockReason, GatewayError, OverridePolicy, ProviderKind, Purpose, Tier};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Fully resolved routing target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// Chosen provider
    pub provider: ProviderKind,
    /// Model id sent to the provider
    pub model: String,
    /// Effective tier
    pub tier: Tier,
    /// Descriptor used for limits and cost
    pub descriptor: ModelDescriptor,
    /// Purpose defaults
    pub profile: PurposeProfile,
    /// Whether the model came from an admin pin
    pub model_overridden: bool,
}

/// Outcome of resolving a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    /// Send the request
    Dispatch(Decision),
    /// Refuse the request
    Blocked {
        /// Policy layer that refused
        reason: BlockReason,
    },
}

impl Resolution {
    /// The decision, if dispatching
    #[must_use]
    pub const fn decision(&self) -> Option<&Decision> {
        match self {
            Self::Dispatch(decision) => Some(decision),
            Self::Blocked { .. } => None,
        }
    }
}

/// Applies the admin override policy to catalog defaults
pub struct OverrideResolver {
    catalog: Arc<ModelCatalog>,
    policy: ArcSwap<OverridePolicy>,
    available: HashSet<ProviderKind>,
}

impl OverrideResolver {
    /// Create a resolver with an empty policy
    pub fn new(catalog: Arc<ModelCatalog>, available: impl IntoIterator<Item = ProviderKind>) -> Self {
        Self {
            catalog,
            policy: ArcSwap::from_pointee(OverridePolicy::empty()),
            available: available.into_iter().collect(),
        }
    }

    /// Catalog backing this resolver
    #[must_use]
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Current policy snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<OverridePolicy> {
        self.policy.load_full()
    }

    /// Replace the policy wholesale
    pub fn replace(&self, policy: OverridePolicy) {
        self.policy.store(Arc::new(policy));
    }

    /// Whether a provider has a registered client
    #[must_use]
    pub fn is_available(&self, provider: ProviderKind) -> bool {
        self.available.contains(&provider)
    }

    /// Resolve a request against the current snapshot
    ///
    /// # Errors
    /// `UnknownPurpose`, `UnsupportedTier`, or `ProviderNotConfigured` when no
    /// provider in the routing order can serve the request
    pub fn resolve_decision(
        &self,
        feature: &str,
        purpose: Purpose,
        tier_hint: Option<Tier>,
    ) -> Result<Resolution, GatewayError> {
        let policy = self.policy.load();

        if policy.kill_switch_enabled {
            return Ok(Resolution::Blocked {
                reason: BlockReason::KillSwitch,
            });
        }
        if policy.is_feature_disabled(feature) {
            return Ok(Resolution::Blocked {
                reason: BlockReason::FeatureDisabled,
            });
        }

        let profile = *self.catalog.profile(purpose)?;
        let tier = policy
            .tier_override_by_feature
            .get(feature)
            .copied()
            .or(tier_hint)
            .unwrap_or(profile.default_tier);
        let pinned = policy.model_override_by_tier.get(&tier).cloned();

        let natural = self.catalog.providers_for(tier);
        if pinned.is_none() && natural.is_empty() {
            return Err(GatewayError::UnsupportedTier { purpose, tier });
        }
        let order = if policy.provider_routing_order.is_empty() {
            if pinned.is_some() && natural.is_empty() {
                ProviderKind::ALL.to_vec()
            } else {
                natural
            }
        } else {
            policy.provider_routing_order.clone()
        };

        let usable = |provider: &ProviderKind| {
            self.is_available(*provider)
                && (pinned.is_some() || self.catalog.descriptor(tier, *provider).is_some())
        };
        let Some(provider) = order.iter().copied().find(usable) else {
            let provider = order.first().copied().unwrap_or(ProviderKind::Gateway);
            return Err(GatewayError::ProviderNotConfigured { provider });
        };

        let decision = match pinned {
            Some(model) => Decision {
                descriptor: self.pinned_descriptor(tier, provider, &model),
                provider,
                model,
                tier,
                profile,
                model_overridden: true,
            },
            None => {
                let descriptor = self
                    .catalog
                    .descriptor(tier, provider)
                    .cloned()
                    .ok_or(GatewayError::UnsupportedTier { purpose, tier })?;
                Decision {
                    provider,
                    model: descriptor.model_id.clone(),
                    tier,
                    descriptor,
                    profile,
                    model_overridden: false,
                }
            }
        };

        debug!(
            feature,
            purpose = %purpose,
            tier = %decision.tier,
            provider = %decision.provider,
            model = %decision.model,
            overridden = decision.model_overridden,
            "Resolved routing decision"
        );
        Ok(Resolution::Dispatch(decision))
    }

    // Limits come from the slot's own entry; pricing follows the pinned model id.
    fn pinned_descriptor(&self, tier: Tier, provider: ProviderKind, model: &str) -> ModelDescriptor {
        let mut descriptor = self
            .catalog
            .descriptor(tier, provider)
            .cloned()
            .unwrap_or_else(|| ModelDescriptor::new(tier, provider, model));
        descriptor.model_id = model.to_string();
        match self.catalog.find_model(model) {
            Some(known) => {
                descriptor.cost_per_million_input_tokens = known.cost_per_million_input_tokens;
                descriptor.cost_per_million_output_tokens = known.cost_per_million_output_tokens;
            }
            None => {
                descriptor.cost_per_million_input_tokens = 0.0;
                descriptor.cost_per_million_output_tokens = 0.0;
            }
        }
        descriptor
    }
}

impl std::fmt::Debug for OverrideResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideResolver")
            .field("policy", &self.policy.load())
            .field("available", &self.available)
            .finish_non_exhaustive()
    }
}
