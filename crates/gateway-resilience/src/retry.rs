//! Retry policy with exponential backoff.
//!
//! Transient failures (timeouts and rate limits) back off exponentially up to
//! `max_retries`. Any other retryable failure gets a single grace retry after
//! the base delay. Errors that are not retryable return immediately.

use gateway_core::GatewayError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries
    pub max_retries: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub multiplier: f64,
    /// Jitter factor (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }
}

/// Why a failed attempt will be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    /// Exponential backoff for timeouts and rate limits
    Backoff,
    /// The single retry granted to other retryable failures
    Grace,
}

/// Retry policy implementation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Copy of this policy with a different retry budget and base delay
    #[must_use]
    pub fn with_budget(&self, max_retries: u32, base_delay: Duration) -> Self {
        let mut policy = self.clone();
        policy.config.max_retries = max_retries;
        policy.config.base_delay = base_delay;
        policy
    }

    /// Calculate delay for a given retry (0-indexed)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = (base * self.config.multiplier.powi(exponent))
            .min(self.config.max_delay.as_secs_f64());

        let jitter_range = delay * self.config.jitter;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        Duration::try_from_secs_f64((delay + jitter).max(0.0)).unwrap_or(self.config.max_delay)
    }

    /// Decide whether a failure is retried, given retries already spent
    #[must_use]
    pub fn classify(&self, error: &GatewayError, retries: u32, grace_used: bool) -> Option<RetryKind> {
        if !error.is_retryable() || retries >= self.config.max_retries {
            return None;
        }
        if error.is_transient() {
            Some(RetryKind::Backoff)
        } else if grace_used {
            None
        } else {
            Some(RetryKind::Grace)
        }
    }

    /// Execute an operation with retry logic
    ///
    /// # Errors
    /// Returns the last error unchanged once retries are exhausted, or the
    /// first non-retryable error
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut retries = 0;
        let mut grace_used = false;

        loop {
            let error = match operation().await {
                Ok(result) => {
                    if retries > 0 {
                        debug!(retries, "Retry succeeded");
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            let delay = match self.classify(&error, retries, grace_used) {
                Some(RetryKind::Backoff) => self.delay_for_attempt(retries),
                Some(RetryKind::Grace) => {
                    grace_used = true;
                    self.config.base_delay
                }
                None => return Err(error),
            };

            retries += 1;
            warn!(
                attempt = retries,
                max_retries = self.config.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Retrying after error"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }
}

/// Builder for retry policy
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    config: RetryConfig,
}

impl RetryPolicyBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max retries
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    /// Set base delay
    #[must_use]
    pub const fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    /// Set max delay
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.config.multiplier = multiplier;
        self
    }

    /// Set jitter factor
    #[must_use]
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.config.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Build the policy
    #[must_use]
    pub const fn build(self) -> RetryPolicy {
        RetryPolicy::new(self.config)
    }
}
