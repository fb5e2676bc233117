//! Configuration types.

use gateway_core::ProviderKind;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Root gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server settings
    #[validate(nested)]
    pub server: ServerConfig,
    /// Deadline and retry defaults
    #[validate(nested)]
    pub resilience: ResilienceConfig,
    /// Dispatch spacing
    #[validate(nested)]
    pub dispatcher: DispatchConfig,
    /// Usage recording
    #[validate(nested)]
    pub usage: UsageConfig,
    /// Policy store and usage sink database
    #[validate(nested)]
    pub store: StoreConfig,
    /// Logging and tracing
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
    /// Provider endpoints
    #[validate(nested)]
    pub providers: Vec<ProviderConfig>,
}

impl GatewayConfig {
    /// Enabled provider endpoints
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    #[validate(length(min = 1))]
    pub host: String,
    /// Bind port
    #[validate(range(min = 1))]
    pub port: u16,
    /// Whole-request timeout enforced by the HTTP layer
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub request_timeout: Duration,
    /// Grace period for in-flight requests on shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(120),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Deadline and retry defaults applied to every invocation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Per-attempt deadline
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub timeout: Duration,
    /// Retries after the first attempt
    #[validate(range(max = 10))]
    pub max_retries: u32,
    /// First backoff delay
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Backoff ceiling
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Backoff multiplier
    #[validate(range(min = 1.0, max = 10.0))]
    pub multiplier: f64,
    /// Jitter factor
    #[validate(range(min = 0.0, max = 1.0))]
    pub jitter: f64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(12),
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }
}

/// Rate-limited dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DispatchConfig {
    /// Minimum spacing between dispatch starts
    #[serde(with = "humantime_serde")]
    pub min_interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(100),
        }
    }
}

/// Usage recording settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UsageConfig {
    /// Records buffered before new ones are dropped
    #[validate(range(min = 1))]
    pub channel_capacity: usize,
    /// Row cap applied to summary queries
    #[validate(range(min = 1))]
    pub summary_limit: usize,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            summary_limit: 10_000,
        }
    }
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection URL (`sqlite:` or `postgres:`)
    #[validate(length(min = 1))]
    pub url: String,
    /// Pool ceiling
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Create tables on boot
    pub bootstrap_schema: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(30),
            bootstrap_schema: true,
        }
    }
}

/// Logging and tracing settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Level used when `RUST_LOG` is unset
    #[validate(length(min = 1))]
    pub log_level: String,
    /// Emit JSON lines
    pub json: bool,
    /// Export spans through OpenTelemetry
    pub tracing_enabled: bool,
    /// Service name attached to spans
    pub service_name: String,
    /// Deployment environment
    pub environment: String,
    /// Trace sampling rate
    #[validate(range(min = 0.0, max = 1.0))]
    pub sampling_rate: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            tracing_enabled: false,
            service_name: "ai-request-gateway".to_string(),
            environment: "development".to_string(),
            sampling_rate: 1.0,
        }
    }
}

/// One provider endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProviderConfig {
    /// Provider served by the endpoint
    pub kind: ProviderKind,
    /// Base URL of the provider sidecar
    #[validate(custom(function = "http_base_url"))]
    pub base_url: String,
    /// Inline API key; prefer `api_key_env`
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,
    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Transport timeout
    #[serde(default = "default_provider_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Whether to register the provider
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderConfig {
    /// Create an enabled endpoint without credentials
    #[must_use]
    pub fn new(kind: ProviderKind, base_url: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            api_key: None,
            api_key_env: None,
            timeout: default_provider_timeout(),
            enabled: true,
        }
    }

    /// Resolve the API key: inline value first, then the named variable
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Resolve the API key with a custom variable lookup
    pub fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<SecretString> {
        self.api_key.clone().or_else(|| {
            self.api_key_env
                .as_deref()
                .and_then(lookup)
                .filter(|value| !value.is_empty())
                .map(SecretString::new)
        })
    }
}

fn default_provider_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_true() -> bool {
    true
}

fn http_base_url(value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => Err(ValidationError::new("http_base_url")),
    }
}

fn non_zero_duration(value: &Duration) -> Result<(), ValidationError> {
    if value.is_zero() {
        return Err(ValidationError::new("non_zero_duration"));
    }
    Ok(())
}
