//! Administrative override policy.
//!
//! [`OverridePolicy`] is an immutable value. The resolver holds one snapshot
//! at a time and replaces it wholesale on refresh, so nothing in here has
//! setters that mutate a live policy.

use crate::error::GatewayError;
use crate::types::{ProviderKind, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Snapshot of every admin override in effect
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverridePolicy {
    /// Global kill switch; wins over every other field
    #[serde(default)]
    pub kill_switch_enabled: bool,
    /// Features refused by admin
    #[serde(default)]
    pub disabled_features: BTreeSet<String>,
    /// Tier -> pinned model id
    #[serde(default)]
    pub model_override_by_tier: BTreeMap<Tier, String>,
    /// Feature -> pinned tier
    #[serde(default)]
    pub tier_override_by_feature: BTreeMap<String, Tier>,
    /// Preferred provider order; empty means catalog order
    #[serde(default)]
    pub provider_routing_order: Vec<ProviderKind>,
}

impl OverridePolicy {
    /// Policy with no overrides at all
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder-style kill switch
    #[must_use]
    pub fn with_kill_switch(mut self, enabled: bool) -> Self {
        self.kill_switch_enabled = enabled;
        self
    }

    /// Builder-style disabled feature
    #[must_use]
    pub fn with_disabled_feature(mut self, feature: impl Into<String>) -> Self {
        self.disabled_features.insert(feature.into());
        self
    }

    /// Builder-style model pin
    #[must_use]
    pub fn with_model_override(mut self, tier: Tier, model: impl Into<String>) -> Self {
        self.model_override_by_tier.insert(tier, model.into());
        self
    }

    /// Builder-style tier pin
    #[must_use]
    pub fn with_tier_override(mut self, feature: impl Into<String>, tier: Tier) -> Self {
        self.tier_override_by_feature.insert(feature.into(), tier);
        self
    }

    /// Builder-style routing order
    #[must_use]
    pub fn with_routing_order(mut self, order: Vec<ProviderKind>) -> Self {
        self.provider_routing_order = order;
        self
    }

    /// Whether a feature is disabled
    #[must_use]
    pub fn is_feature_disabled(&self, feature: &str) -> bool {
        self.disabled_features.contains(feature)
    }
}

/// Kind of persisted override row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideKind {
    /// Tier -> model pin
    Model,
    /// Feature -> tier pin
    Tier,
    /// Global provider order
    Routing,
}

impl OverrideKind {
    /// Persisted name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Tier => "tier",
            Self::Routing => "routing",
        }
    }
}

impl fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverrideKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(Self::Model),
            "tier" => Ok(Self::Tier),
            "routing" => Ok(Self::Routing),
            other => Err(GatewayError::store(format!("unknown override type: {other}"))),
        }
    }
}

/// Key used for the single global routing override row
pub const ROUTING_KEY: &str = "global";

/// One persisted override row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideEntry {
    /// Row id
    pub id: String,
    /// Override type
    pub kind: OverrideKind,
    /// Tier name, feature name, or `global` for routing
    pub key: String,
    /// Model id, tier name, or JSON provider list
    pub value: String,
    /// Disabled rows are kept for audit but ignored on load
    pub enabled: bool,
    /// Admin who wrote the row
    pub created_by: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Kill switch row as persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSwitchStatus {
    /// Whether the switch is on
    pub enabled: bool,
    /// Reason given on activation
    pub reason: Option<String>,
    /// Admin who activated it
    pub activated_by: Option<String>,
    /// Activation time
    pub activated_at: Option<DateTime<Utc>>,
}

/// Feature flag row as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlag {
    /// Feature name
    pub feature: String,
    /// Whether calls for the feature are allowed
    pub enabled: bool,
    /// Free-form note left by the admin
    pub description: Option<String>,
    /// Admin who last changed the row
    pub updated_by: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// A single write-through mutation against the policy store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyWrite {
    /// Flip the global kill switch
    KillSwitch {
        /// New state
        enabled: bool,
        /// Reason, required when enabling
        reason: Option<String>,
        /// Acting admin
        actor: String,
    },
    /// Enable or disable a feature
    Feature {
        /// Feature name
        feature: String,
        /// New state
        enabled: bool,
        /// Replacement description; `None` keeps the stored one
        description: Option<String>,
        /// Acting admin
        actor: String,
    },
    /// Upsert a model/tier/routing override
    Override {
        /// Override type
        kind: OverrideKind,
        /// Row key
        key: String,
        /// Row value
        value: String,
        /// Acting admin
        actor: String,
    },
}

impl PolicyWrite {
    /// Toggle a feature, keeping its stored description
    pub fn feature(feature: impl Into<String>, enabled: bool, actor: impl Into<String>) -> Self {
        Self::Feature {
            feature: feature.into(),
            enabled,
            description: None,
            actor: actor.into(),
        }
    }

    /// Pin a tier to a model
    pub fn model(tier: Tier, model: impl Into<String>, actor: impl Into<String>) -> Self {
        Self::Override {
            kind: OverrideKind::Model,
            key: tier.to_string(),
            value: model.into(),
            actor: actor.into(),
        }
    }

    /// Pin a feature to a tier
    pub fn tier(feature: impl Into<String>, tier: Tier, actor: impl Into<String>) -> Self {
        Self::Override {
            kind: OverrideKind::Tier,
            key: feature.into(),
            value: tier.to_string(),
            actor: actor.into(),
        }
    }

    /// Replace the provider routing order
    ///
    /// # Errors
    /// Returns error if the order cannot be serialized
    pub fn routing(order: &[ProviderKind], actor: impl Into<String>) -> Result<Self, GatewayError> {
        let value = serde_json::to_string(order)
            .map_err(|e| GatewayError::internal(format!("routing order: {e}")))?;
        Ok(Self::Override {
            kind: OverrideKind::Routing,
            key: ROUTING_KEY.to_string(),
            value,
            actor: actor.into(),
        })
    }
}

/// Accumulates persisted rows into a policy snapshot.
///
/// Both store implementations funnel their rows through here so they agree
/// on how malformed rows are treated: skipped with a warning, never fatal.
#[derive(Debug, Default)]
pub struct PolicyAssembler {
    policy: OverridePolicy,
}

impl PolicyAssembler {
    /// Start from an empty policy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the kill switch row
    pub fn kill_switch(&mut self, enabled: bool) -> &mut Self {
        self.policy.kill_switch_enabled = enabled;
        self
    }

    /// Apply a feature flag row
    pub fn feature(&mut self, feature: &str, enabled: bool) -> &mut Self {
        if enabled {
            self.policy.disabled_features.remove(feature);
        } else {
            self.policy.disabled_features.insert(feature.to_string());
        }
        self
    }

    /// Apply an override row; disabled rows are ignored
    pub fn entry(&mut self, entry: &OverrideEntry) -> &mut Self {
        if !entry.enabled {
            return self;
        }
        match entry.kind {
            OverrideKind::Model => match entry.key.parse::<Tier>() {
                Ok(tier) => {
                    self.policy
                        .model_override_by_tier
                        .insert(tier, entry.value.clone());
                }
                Err(e) => tracing::warn!(id = %entry.id, error = %e, "Skipping model override"),
            },
            OverrideKind::Tier => match entry.value.parse::<Tier>() {
                Ok(tier) => {
                    self.policy
                        .tier_override_by_feature
                        .insert(entry.key.clone(), tier);
                }
                Err(e) => tracing::warn!(id = %entry.id, error = %e, "Skipping tier override"),
            },
            OverrideKind::Routing => {
                self.policy.provider_routing_order = parse_routing_order(&entry.value);
            }
        }
        self
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> OverridePolicy {
        self.policy
    }
}

/// Parse a persisted routing order.
///
/// Unknown provider names are dropped; an unparseable value yields an empty
/// order, which falls back to the catalog's natural order.
#[must_use]
pub fn parse_routing_order(value: &str) -> Vec<ProviderKind> {
    let names: Vec<String> = match serde_json::from_str(value) {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(value = %value, error = %e, "Ignoring malformed routing order");
            return Vec::new();
        }
    };

    let mut order = Vec::with_capacity(names.len());
    for name in names {
        match name.parse::<ProviderKind>() {
            Ok(provider) if !order.contains(&provider) => order.push(provider),
            Ok(_) => {}
            Err(_) => tracing::warn!(provider = %name, "Dropping unknown provider from routing order"),
        }
    }
    order
}
