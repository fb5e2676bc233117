//! Prometheus metrics.

use gateway_core::UsageRecord;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Latency buckets in seconds
const DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0];

/// Gateway metrics registry
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    invocations: IntCounterVec,
    duration: HistogramVec,
    cost: CounterVec,
    dropped: IntCounter,
}

impl GatewayMetrics {
    /// Create and register every collector
    ///
    /// # Errors
    /// Returns error if a collector cannot be registered
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let invocations = IntCounterVec::new(
            Opts::new("ai_gateway_invocations_total", "Gateway invocations by outcome"),
            &["feature", "outcome"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "ai_gateway_invocation_duration_seconds",
                "Wall time of gateway invocations",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["feature"],
        )?;
        let cost = CounterVec::new(
            Opts::new("ai_gateway_estimated_cost_usd_total", "Estimated spend in USD"),
            &["provider", "model"],
        )?;
        let dropped = IntCounter::new(
            "ai_gateway_usage_records_dropped_total",
            "Usage records dropped because the writer queue was full",
        )?;

        registry.register(Box::new(invocations.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(cost.clone()))?;
        registry.register(Box::new(dropped.clone()))?;

        Ok(Self {
            registry,
            invocations,
            duration,
            cost,
            dropped,
        })
    }

    /// Record one finished invocation
    #[allow(clippy::cast_precision_loss)]
    pub fn observe(&self, record: &UsageRecord) {
        let outcome = record
            .error_kind
            .map_or("success", |kind| kind.as_str());
        self.invocations
            .with_label_values(&[record.feature.as_str(), outcome])
            .inc();
        self.duration
            .with_label_values(&[record.feature.as_str()])
            .observe(record.duration_ms as f64 / 1000.0);

        if let (Some(provider), Some(model)) = (record.provider, &record.model) {
            if record.estimated_cost > 0.0 {
                self.cost
                    .with_label_values(&[provider.as_str(), model.as_str()])
                    .inc_by(record.estimated_cost);
            }
        }
    }

    /// Count a dropped usage record
    pub fn record_dropped(&self) {
        self.dropped.inc();
    }

    /// Dropped usage records so far
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }

    /// Invocations seen for a feature and outcome
    #[must_use]
    pub fn invocations(&self, feature: &str, outcome: &str) -> u64 {
        self.invocations.with_label_values(&[feature, outcome]).get()
    }

    /// Render in the Prometheus text format
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn render(&self) -> Result<String, MetricsError> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}

impl std::fmt::Debug for GatewayMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayMetrics")
            .field("dropped", &self.dropped.get())
            .finish_non_exhaustive()
    }
}

/// Metrics error
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Prometheus rejected a collector or failed to encode
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}
