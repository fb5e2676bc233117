//! Policy administration.
//!
//! Every mutation is written to the policy store first and then followed by a
//! full reload that replaces the resolver's snapshot. The store is the source
//! of truth; the snapshot is a cache. Refreshes are serialized so an older
//! load can never overwrite a newer one.

use gateway_core::{
    FeatureFlag, GatewayError, KillSwitchStatus, OverrideEntry, OverridePolicy, PolicyStore, PolicyWrite,
    ProviderKind, Tier,
};
use gateway_routing::OverrideResolver;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Admin operations over the override policy
pub struct PolicyAdmin {
    store: Arc<dyn PolicyStore>,
    resolver: Arc<OverrideResolver>,
    refresh: Mutex<()>,
}

impl PolicyAdmin {
    /// Create an admin bound to a store and the resolver it refreshes
    pub fn new(store: Arc<dyn PolicyStore>, resolver: Arc<OverrideResolver>) -> Self {
        Self {
            store,
            resolver,
            refresh: Mutex::new(()),
        }
    }

    /// Current snapshot
    #[must_use]
    pub fn policy(&self) -> Arc<OverridePolicy> {
        self.resolver.snapshot()
    }

    /// Load the policy at startup. A failing store leaves the current
    /// (empty) policy in place.
    pub async fn load_at_boot(&self) -> bool {
        match self.reload().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Failed to load override policy, continuing with defaults");
                false
            }
        }
    }

    /// Reload the full policy from the store and swap it in
    ///
    /// # Errors
    /// Returns the store error; the previous snapshot stays active
    pub async fn reload(&self) -> Result<Arc<OverridePolicy>, GatewayError> {
        let _guard = self.refresh.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<Arc<OverridePolicy>, GatewayError> {
        let policy = self.store.load_policy().await?;
        info!(
            kill_switch = policy.kill_switch_enabled,
            disabled_features = policy.disabled_features.len(),
            model_overrides = policy.model_override_by_tier.len(),
            tier_overrides = policy.tier_override_by_feature.len(),
            routing_order = policy.provider_routing_order.len(),
            "Override policy refreshed"
        );
        self.resolver.replace(policy);
        Ok(self.resolver.snapshot())
    }

    async fn apply(&self, write: PolicyWrite) -> Result<Arc<OverridePolicy>, GatewayError> {
        let _guard = self.refresh.lock().await;
        self.store.write_policy_field(write).await?;
        self.refresh_locked().await
    }

    /// Block all traffic
    ///
    /// # Errors
    /// Returns error if the reason is blank or the store fails
    pub async fn activate_kill_switch(
        &self,
        reason: impl Into<String>,
        actor: impl Into<String>,
    ) -> Result<Arc<OverridePolicy>, GatewayError> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(GatewayError::configuration("kill switch reason is required"));
        }
        let actor = actor.into();
        warn!(actor = %actor, reason = %reason, "Activating AI kill switch");
        self.apply(PolicyWrite::KillSwitch {
            enabled: true,
            reason: Some(reason),
            actor,
        })
        .await
    }

    /// Resume traffic
    ///
    /// # Errors
    /// Returns error if the store fails
    pub async fn deactivate_kill_switch(
        &self,
        actor: impl Into<String>,
    ) -> Result<Arc<OverridePolicy>, GatewayError> {
        let actor = actor.into();
        info!(actor = %actor, "Deactivating AI kill switch");
        self.apply(PolicyWrite::KillSwitch {
            enabled: false,
            reason: None,
            actor,
        })
        .await
    }

    /// Enable or disable one feature
    ///
    /// # Errors
    /// Returns error if the feature name is blank or the store fails
    pub async fn toggle_feature(
        &self,
        feature: impl Into<String>,
        enabled: bool,
        actor: impl Into<String>,
    ) -> Result<Arc<OverridePolicy>, GatewayError> {
        self.set_feature(feature, enabled, None, actor).await
    }

    /// Enable or disable one feature, replacing its description when one is
    /// given
    ///
    /// # Errors
    /// Returns error if the feature name is blank or the store fails
    pub async fn set_feature(
        &self,
        feature: impl Into<String>,
        enabled: bool,
        description: Option<String>,
        actor: impl Into<String>,
    ) -> Result<Arc<OverridePolicy>, GatewayError> {
        let feature = non_blank(feature.into(), "feature")?;
        let actor = actor.into();
        info!(actor = %actor, feature = %feature, enabled, "Toggling AI feature");
        self.apply(PolicyWrite::Feature {
            feature,
            enabled,
            description: description.filter(|d| !d.trim().is_empty()),
            actor,
        })
        .await
    }

    /// Every feature flag row, ordered by name
    ///
    /// # Errors
    /// Returns error if the store fails
    pub async fn list_features(&self) -> Result<Vec<FeatureFlag>, GatewayError> {
        self.store.list_features().await
    }

    /// One feature flag row; `None` for a feature nobody has toggled
    ///
    /// # Errors
    /// Returns error if the store fails
    pub async fn feature(&self, feature: &str) -> Result<Option<FeatureFlag>, GatewayError> {
        Ok(self
            .list_features()
            .await?
            .into_iter()
            .find(|flag| flag.feature == feature))
    }

    /// Pin a tier to a model
    ///
    /// # Errors
    /// Returns error if the model is blank or the store fails
    pub async fn set_model_override(
        &self,
        tier: Tier,
        model: impl Into<String>,
        actor: impl Into<String>,
    ) -> Result<Arc<OverridePolicy>, GatewayError> {
        let model = non_blank(model.into(), "model")?;
        let actor = actor.into();
        info!(actor = %actor, tier = %tier, model = %model, "Setting model override");
        self.apply(PolicyWrite::model(tier, model, actor)).await
    }

    /// Pin a feature to a tier
    ///
    /// # Errors
    /// Returns error if the feature name is blank or the store fails
    pub async fn set_tier_override(
        &self,
        feature: impl Into<String>,
        tier: Tier,
        actor: impl Into<String>,
    ) -> Result<Arc<OverridePolicy>, GatewayError> {
        let feature = non_blank(feature.into(), "feature")?;
        let actor = actor.into();
        info!(actor = %actor, feature = %feature, tier = %tier, "Setting tier override");
        self.apply(PolicyWrite::tier(feature, tier, actor)).await
    }

    /// Replace the provider routing order; an empty order restores the
    /// catalog's natural order
    ///
    /// # Errors
    /// Returns error if the order repeats a provider or the store fails
    pub async fn set_routing_override(
        &self,
        order: &[ProviderKind],
        actor: impl Into<String>,
    ) -> Result<Arc<OverridePolicy>, GatewayError> {
        for (i, provider) in order.iter().enumerate() {
            if order[..i].contains(provider) {
                return Err(GatewayError::configuration(format!(
                    "provider {provider} appears twice in routing order"
                )));
            }
        }
        let actor = actor.into();
        info!(actor = %actor, order = ?order, "Setting routing override");
        self.apply(PolicyWrite::routing(order, actor)?).await
    }

    /// Disable an override row by id
    ///
    /// # Errors
    /// Returns error if the id is unknown or the store fails
    pub async fn remove_override(&self, id: &str) -> Result<Arc<OverridePolicy>, GatewayError> {
        let _guard = self.refresh.lock().await;
        self.store.remove_override(id).await?;
        info!(id = %id, "Removed override");
        self.refresh_locked().await
    }

    /// Enabled override rows, newest first
    ///
    /// # Errors
    /// Returns error if the store fails
    pub async fn list_overrides(&self) -> Result<Vec<OverrideEntry>, GatewayError> {
        self.store.list_overrides().await
    }

    /// Kill switch row with its audit fields
    ///
    /// # Errors
    /// Returns error if the store fails
    pub async fn kill_switch_status(&self) -> Result<KillSwitchStatus, GatewayError> {
        self.store.kill_switch_status().await
    }
}

impl std::fmt::Debug for PolicyAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyAdmin")
            .field("policy", &self.resolver.snapshot())
            .finish_non_exhaustive()
    }
}

fn non_blank(value: String, field: &str) -> Result<String, GatewayError> {
    if value.trim().is_empty() {
        return Err(GatewayError::configuration(format!("{field} must not be empty")));
    }
    Ok(value)
}
