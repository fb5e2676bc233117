//! Error taxonomy for the gateway.
//!
//! Errors keep their kind all the way to the feature caller so it can tell
//! "try again later" (`Timeout`, `RateLimited`, `Provider`) apart from
//! "deliberately unavailable" (`FeatureUnavailable`).

use crate::types::{BlockReason, ProviderKind, Purpose, Tier};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the workspace
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Administrative policy refused the request
    #[error("AI feature unavailable: {reason}")]
    FeatureUnavailable {
        /// Which policy layer blocked the request
        reason: BlockReason,
    },

    /// Deadline exceeded while waiting for the provider
    #[error("AI request timed out after {}ms", timeout.as_millis())]
    Timeout {
        /// Deadline that fired
        timeout: Duration,
    },

    /// Provider signalled a rate limit
    #[error("Rate limited by {provider}")]
    RateLimited {
        /// Provider that rejected the call
        provider: ProviderKind,
        /// Retry hint from the provider, if any
        retry_after: Option<Duration>,
    },

    /// Non-timeout failure reported by a provider, including malformed output
    #[error("Provider {provider} error: {message}")]
    Provider {
        /// Provider that failed
        provider: ProviderKind,
        /// Failure description
        message: String,
        /// Upstream status code, if the failure came over HTTP
        status_code: Option<u16>,
        /// Whether the provider considers this failure retryable
        retryable: bool,
    },

    /// Purpose has no catalog profile
    #[error("Unknown purpose: {purpose}")]
    UnknownPurpose {
        /// Purpose as requested
        purpose: String,
    },

    /// Tier has no model for any usable provider
    #[error("Tier {tier} is not supported for purpose {purpose}")]
    UnsupportedTier {
        /// Requested purpose
        purpose: Purpose,
        /// Resolved tier
        tier: Tier,
    },

    /// Decision picked a provider without a registered client
    #[error("Provider {provider} is not configured")]
    ProviderNotConfigured {
        /// Missing provider
        provider: ProviderKind,
    },

    /// Policy store or usage sink failure
    #[error("Store error: {message}")]
    Store {
        /// Failure description
        message: String,
    },

    /// Invalid configuration or admin input
    #[error("Configuration error: {message}")]
    Configuration {
        /// Failure description
        message: String,
    },

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    Internal {
        /// Failure description
        message: String,
    },
}

impl GatewayError {
    /// Create a timeout error
    #[must_use]
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    /// Create a rate limit error
    #[must_use]
    pub fn rate_limited(provider: ProviderKind, retry_after: Option<Duration>) -> Self {
        Self::RateLimited {
            provider,
            retry_after,
        }
    }

    /// Create a provider error
    pub fn provider(
        provider: ProviderKind,
        message: impl Into<String>,
        status_code: Option<u16>,
        retryable: bool,
    ) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            status_code,
            retryable,
        }
    }

    /// Create a blocked error
    #[must_use]
    pub fn unavailable(reason: BlockReason) -> Self {
        Self::FeatureUnavailable { reason }
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Transient conditions expected to clear with patience
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::RateLimited { .. })
    }

    /// Whether retrying could change the outcome at all.
    ///
    /// Policy and configuration errors are deterministic given the current
    /// policy and catalog. Provider failures that are not transient still
    /// qualify for a single grace retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. }
            | Self::RateLimited { .. }
            | Self::Provider { .. }
            | Self::Internal { .. } => true,
            Self::FeatureUnavailable { .. }
            | Self::UnknownPurpose { .. }
            | Self::UnsupportedTier { .. }
            | Self::ProviderNotConfigured { .. }
            | Self::Store { .. }
            | Self::Configuration { .. } => false,
        }
    }

    /// Whether administrative policy blocked the request
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::FeatureUnavailable { .. })
    }

    /// Accounting category for usage records
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FeatureUnavailable { .. } => ErrorKind::Blocked,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Provider { .. } => ErrorKind::ProviderError,
            Self::UnknownPurpose { .. }
            | Self::UnsupportedTier { .. }
            | Self::ProviderNotConfigured { .. }
            | Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Store { .. } | Self::Internal { .. } => ErrorKind::Internal,
        }
    }
}

/// Error category recorded on failed usage records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Kill switch or disabled feature
    Blocked,
    /// Deadline exceeded
    Timeout,
    /// Provider rate limit
    RateLimited,
    /// Other provider failure
    ProviderError,
    /// Catalog or provider configuration problem
    Configuration,
    /// Anything else
    Internal,
    /// Caller went away before the invocation finished
    Cancelled,
}

impl ErrorKind {
    /// Snake-case name as persisted
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::ProviderError => "provider_error",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a persisted name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blocked" => Some(Self::Blocked),
            "timeout" => Some(Self::Timeout),
            "rate_limited" => Some(Self::RateLimited),
            "provider_error" => Some(Self::ProviderError),
            "configuration" => Some(Self::Configuration),
            "internal" => Some(Self::Internal),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
