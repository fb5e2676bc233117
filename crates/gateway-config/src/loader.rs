//! Configuration loading.
//!
//! Order of precedence, lowest first:
//! 1. Built-in defaults
//! 2. The config file (YAML, TOML or JSON, chosen by extension)
//! 3. `GATEWAY_*` environment variables
//!
//! The merged result is validated before it is returned.

use crate::config::GatewayConfig;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use validator::Validate;

/// Variable naming the config file
pub const CONFIG_ENV_VAR: &str = "GATEWAY_CONFIG";

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (`.yaml`, `.yml`)
    Yaml,
    /// TOML (`.toml`)
    Toml,
    /// JSON (`.json`)
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    ///
    /// # Errors
    /// Returns error for unknown extensions
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Yaml => "YAML",
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }

    /// Parse file contents
    ///
    /// # Errors
    /// Returns error if the content does not parse
    pub fn parse(self, content: &str) -> Result<GatewayConfig, ConfigError> {
        let parsed = match self {
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ConfigError::Parse {
            format: self.name(),
            message,
        })
    }
}

/// Builder-style configuration loader
#[derive(Debug, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    skip_env: bool,
}

impl ConfigLoader {
    /// Create a loader with defaults only
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this file on top of the defaults
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Ignore `GATEWAY_*` variables
    #[must_use]
    pub const fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Load, apply overrides and validate
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed, or validation fails
    pub async fn load(self) -> Result<GatewayConfig, ConfigError> {
        self.load_with(|name| std::env::var(name).ok()).await
    }

    /// Same as [`load`](Self::load) with a custom variable lookup
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed, or validation fails
    pub async fn load_with(
        self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<GatewayConfig, ConfigError> {
        let mut config = match &self.file {
            Some(path) => {
                let format = ConfigFormat::from_path(path)?;
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| ConfigError::Io {
                        path: path.clone(),
                        source,
                    })?;
                debug!(path = %path.display(), format = format.name(), "Parsing config file");
                format.parse(&content)?
            }
            None => GatewayConfig::default(),
        };

        if !self.skip_env {
            apply_env_overrides(&mut config, &lookup)?;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Apply `GATEWAY_*` overrides
///
/// # Errors
/// Returns error if a variable holds an unparsable value
pub fn apply_env_overrides(
    config: &mut GatewayConfig,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(host) = lookup("GATEWAY_HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("GATEWAY_PORT") {
        config.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
            var: "GATEWAY_PORT".to_string(),
            value: port.clone(),
        })?;
    }
    if let Some(url) = lookup("GATEWAY_DATABASE_URL") {
        config.store.url = url;
    }
    if let Some(level) = lookup("GATEWAY_LOG_LEVEL") {
        config.telemetry.log_level = level;
    }
    if let Some(json) = lookup("GATEWAY_LOG_JSON") {
        config.telemetry.json = parse_bool(&json).ok_or_else(|| ConfigError::InvalidEnv {
            var: "GATEWAY_LOG_JSON".to_string(),
            value: json.clone(),
        })?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Load configuration from `GATEWAY_CONFIG` (if set) plus the environment
///
/// # Errors
/// Returns error if loading or validation fails
pub async fn load_config() -> Result<GatewayConfig, ConfigError> {
    let mut loader = ConfigLoader::new();
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        info!(path = %path, "Loading configuration file");
        loader = loader.with_file(path);
    }
    loader.load().await
}
