//! # Gateway Telemetry
//!
//! Observability for the AI Request Gateway.
//!
//! This crate provides:
//! - Structured logging with optional OpenTelemetry export
//! - Prometheus metrics for invocations, latency and spend
//! - Usage summaries and a running cost ledger
//! - The fire-and-forget usage recorder

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ledger;
pub mod metrics;
pub mod recorder;
pub mod tracing_setup;

// Re-export main types
pub use ledger::{cost_history, CostBucket, CostPeriod, UsageLedger, UsageSummary};
pub use metrics::{GatewayMetrics, MetricsError};
pub use recorder::{RecorderConfig, UsageRecorder};
pub use tracing_setup::{init_tracing, shutdown_tracing, TracingConfig, TracingError};
