//! Provider registry.
//!
//! Maps each [`ProviderKind`] to the client handle that serves it. The
//! resolver treats a provider as available exactly when it is registered here.

use dashmap::DashMap;
use gateway_core::{GatewayError, ModelProvider, ProviderKind};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Registered provider clients keyed by kind
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Arc<DashMap<ProviderKind, Arc<dyn ModelProvider>>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client, replacing any previous one for the same kind
    pub fn register(&self, provider: Arc<dyn ModelProvider>) {
        let kind = provider.kind();
        if self.providers.insert(kind, provider).is_some() {
            info!(provider = %kind, "Replaced provider client");
        } else {
            info!(provider = %kind, "Registered provider client");
        }
    }

    /// Builder-style registration
    #[must_use]
    pub fn with_provider(self, provider: Arc<dyn ModelProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Client for a provider, if registered
    #[must_use]
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ModelProvider>> {
        self.providers.get(&kind).map(|entry| Arc::clone(entry.value()))
    }

    /// Client for a provider, or `ProviderNotConfigured`
    pub fn require(&self, kind: ProviderKind) -> Result<Arc<dyn ModelProvider>, GatewayError> {
        self.get(kind)
            .ok_or(GatewayError::ProviderNotConfigured { provider: kind })
    }

    /// Registered kinds in the catalog's natural order
    #[must_use]
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.providers.contains_key(kind))
            .collect()
    }

    /// Registered kinds as a set
    #[must_use]
    pub fn available(&self) -> HashSet<ProviderKind> {
        self.kinds().into_iter().collect()
    }

    /// Whether a provider is registered
    #[must_use]
    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Number of registered providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Probe every registered provider
    pub async fn health(&self) -> Vec<(ProviderKind, bool)> {
        let mut report = Vec::with_capacity(self.len());
        for kind in self.kinds() {
            if let Some(provider) = self.get(kind) {
                report.push((kind, provider.health_check().await));
            }
        }
        report
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.kinds())
            .finish()
    }
}
