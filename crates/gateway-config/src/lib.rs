//! # Gateway Config
//!
//! Configuration management for the AI Request Gateway.
//!
//! - Typed sections for the server, resilience defaults, dispatch spacing,
//!   usage recording, the store, telemetry and provider endpoints
//! - YAML, TOML or JSON files with human-readable durations (`12s`, `100ms`)
//! - `GATEWAY_*` environment overrides
//! - Validation through `validator`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod loader;

// Re-export main types
pub use config::{
    DispatchConfig, GatewayConfig, ProviderConfig, ResilienceConfig, ServerConfig, StoreConfig,
    TelemetryConfig, UsageConfig,
};
pub use error::ConfigError;
pub use loader::{apply_env_overrides, load_config, ConfigFormat, ConfigLoader, CONFIG_ENV_VAR};
