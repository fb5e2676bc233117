//! Shared application state.

use gateway_core::UsageSink;
use gateway_engine::{Gateway, PolicyAdmin};
use gateway_telemetry::{GatewayMetrics, UsageLedger};
use std::sync::Arc;
use std::time::Instant;

/// Default row cap for usage summaries
pub const DEFAULT_SUMMARY_LIMIT: usize = 10_000;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Invocation entry point
    pub gateway: Gateway,
    /// Policy administration
    pub admin: Arc<PolicyAdmin>,
    /// Usage log for queries
    pub usage: Arc<dyn UsageSink>,
    /// Live usage totals
    pub ledger: Arc<UsageLedger>,
    /// Prometheus collectors
    pub metrics: Arc<GatewayMetrics>,
    /// Row cap for usage summaries
    pub summary_limit: usize,
    /// Process start
    pub started_at: Instant,
}

impl AppState {
    /// Start building application state
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }

    /// Seconds since start
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("gateway", &self.gateway)
            .field("summary_limit", &self.summary_limit)
            .finish_non_exhaustive()
    }
}

/// State builder error
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A required component was not supplied
    #[error("Missing application state component: {0}")]
    Missing(&'static str),
}

/// Builder for [`AppState`]
#[derive(Default)]
pub struct AppStateBuilder {
    gateway: Option<Gateway>,
    admin: Option<Arc<PolicyAdmin>>,
    usage: Option<Arc<dyn UsageSink>>,
    ledger: Option<Arc<UsageLedger>>,
    metrics: Option<Arc<GatewayMetrics>>,
    summary_limit: Option<usize>,
}

impl AppStateBuilder {
    /// Set the gateway
    #[must_use]
    pub fn gateway(mut self, gateway: Gateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Set the policy admin
    #[must_use]
    pub fn admin(mut self, admin: Arc<PolicyAdmin>) -> Self {
        self.admin = Some(admin);
        self
    }

    /// Set the usage sink queried by the usage endpoints
    #[must_use]
    pub fn usage_sink(mut self, usage: Arc<dyn UsageSink>) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Set the live ledger
    #[must_use]
    pub fn ledger(mut self, ledger: Arc<UsageLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Set the metrics registry
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the summary row cap
    #[must_use]
    pub fn summary_limit(mut self, limit: usize) -> Self {
        self.summary_limit = Some(limit.max(1));
        self
    }

    /// Build the state
    ///
    /// # Errors
    /// Returns error if a required component is missing
    pub fn build(self) -> Result<AppState, StateError> {
        Ok(AppState {
            gateway: self.gateway.ok_or(StateError::Missing("gateway"))?,
            admin: self.admin.ok_or(StateError::Missing("admin"))?,
            usage: self.usage.ok_or(StateError::Missing("usage_sink"))?,
            ledger: self.ledger.ok_or(StateError::Missing("ledger"))?,
            metrics: self.metrics.ok_or(StateError::Missing("metrics"))?,
            summary_limit: self.summary_limit.unwrap_or(DEFAULT_SUMMARY_LIMIT),
            started_at: Instant::now(),
        })
    }
}
